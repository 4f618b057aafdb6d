// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing runtime control.

use ordermap::OrderMap;
use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
#[allow(unused)]
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

use crate::targets::TRACING_TARGETS;
use crate::{DEFAULT_DEFAULT_LOGLEVEL, trace_target};

trace_target!("tracectl", LevelFilter::INFO, &[]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TraceCtlError {
    #[error("Invalid syntax '{0}': it should be tag=level")]
    Syntax(String),
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),
    #[error("Unknown tracing tag '{0}'")]
    UnknownTag(String),
}

#[derive(Debug, Clone)]
pub struct TargetCfg {
    pub target: &'static str,
    pub name: &'static str,
    pub level: LevelFilter,
    pub tags: Vec<&'static str>,
}
impl TargetCfg {
    fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        // a target can always be addressed by its name
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}
impl Display for TargetCfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>40} │ {:>8} │ {}",
            self.target,
            self.level,
            self.tags.join(",")
        )
    }
}

#[derive(Debug)]
struct TargetCfgDb {
    level: LevelFilter,
    targets: OrderMap<&'static str, TargetCfg>,
    tags: OrderMap<&'static str, HashSet<&'static str>>,
}

impl TargetCfgDb {
    fn new(level: LevelFilter) -> Self {
        let mut db = Self {
            level,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        };
        for target in TRACING_TARGETS {
            db.register(target.target, target.name, target.level, target.tags);
        }
        db
    }
    fn register(
        &mut self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) {
        let tconfig = TargetCfg::new(target, name, level, tags);
        for tag in &tconfig.tags {
            self.tags.entry(*tag).or_default().insert(target);
        }
        if let Some(exist) = self.targets.insert(target, tconfig) {
            warn!("Target {} has been multiply defined!", exist.target);
        }
    }
    fn env_filter(&self) -> EnvFilter {
        let mut f = EnvFilter::new(self.level.to_string());
        for target in self.targets.values() {
            match format!("{}={}", target.target, target.level).parse() {
                Ok(directive) => f = f.add_directive(directive),
                Err(e) => warn!("Skipping bad directive for target {}: {e}", target.target),
            }
        }
        f
    }
    fn tag_targets_mut(&mut self, tag: &str) -> impl Iterator<Item = &mut TargetCfg> {
        let members = self.tags.get(tag).cloned().unwrap_or_default();
        self.targets
            .values_mut()
            .filter(move |target| members.contains(target.target))
    }
    fn as_config_string(&self) -> String {
        let mut out = format!("default={}", self.level);
        for target in self.targets.values() {
            out += format!(",{}={}", target.name, target.level).as_str();
        }
        out
    }
}

impl Display for TargetCfgDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "──────── Tracing configuration per target ────────")?;
        for target in self.targets.values() {
            writeln!(f, "{target}")?;
        }
        write!(f, "{:>40} │ {:>8} │ --", "(default)", self.level)
    }
}

/// Process-wide tracing control. Use [`get_trace_ctl`] to access it.
#[derive(Debug)]
pub struct TracingControl {
    db: Mutex<TargetCfgDb>,
    reload_filter: reload::Handle<EnvFilter, Registry>,
}

static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get a reference to the static [`TracingControl`], initializing it if needed
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACING_CTL.get_or_init(TracingControl::new)
}

impl TracingControl {
    fn new() -> Self {
        let db = TargetCfgDb::new(DEFAULT_DEFAULT_LOGLEVEL);
        let (filter, reload_filter) = reload::Layer::new(db.env_filter());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_level(true);

        // another subscriber (e.g. tracing-test's) may already be installed
        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
        {
            warn!("Tracing subscriber not installed: {e}");
        }

        Self {
            db: Mutex::new(db),
            reload_filter,
        }
    }
    fn db(&self) -> MutexGuard<'_, TargetCfgDb> {
        // the db is only mutated under simple assignments: recover from poisoning
        self.db.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
    fn reload(&self, filter: EnvFilter) {
        if let Err(e) = self.reload_filter.reload(filter) {
            debug!("Could not reload tracing filter: {e}");
        }
    }

    /// Initialize the tracing subscriber, if not done yet
    pub fn init() {
        get_trace_ctl();
    }

    /// Set the level of all the targets that carry `tag`. Returns the number of targets changed.
    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) -> usize {
        let mut db = self.db();
        let mut changed = 0;
        for target in db.tag_targets_mut(tag) {
            if target.level != level {
                target.level = level;
                changed += 1;
            }
        }
        if changed > 0 {
            self.reload(db.env_filter());
        }
        info!("Changed log level for tag '{tag}' to {level}. Targets changed: {changed}");
        changed
    }
    pub fn set_level_all(&self, level: LevelFilter) {
        let mut db = self.db();
        for target in db.targets.values_mut() {
            target.level = level;
        }
        self.reload(db.env_filter());
    }
    pub fn set_default_level(&self, level: LevelFilter) {
        let mut db = self.db();
        if db.level != level {
            db.level = level;
            info!("Set default log level to {level}");
            self.reload(db.env_filter());
        }
    }
    #[must_use]
    pub fn get_default_level(&self) -> LevelFilter {
        self.db().level
    }
    #[must_use]
    pub fn get_target(&self, target: &str) -> Option<TargetCfg> {
        self.db().targets.get(target).cloned()
    }
    pub fn get_targets_by_tag(&self, tag: &str) -> impl Iterator<Item = TargetCfg> {
        let db = self.db();
        let members = db.tags.get(tag).cloned().unwrap_or_default();
        db.targets
            .values()
            .filter(|t| members.contains(t.target))
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Check that all the given tags are known. The pseudo-tags `default` and `all` are accepted.
    pub fn check_tags(&self, tags: &[&str]) -> Result<(), TraceCtlError> {
        let db = self.db();
        for tag in tags {
            if *tag != "default" && *tag != "all" && !db.tags.contains_key(tag) {
                return Err(TraceCtlError::UnknownTag((*tag).to_string()));
            }
        }
        Ok(())
    }

    /// Parse a string made of comma-separated tag=level, where level=off,error,warn,info,debug,trace
    pub fn parse_tracing_config(input: &str) -> Result<OrderMap<String, LevelFilter>, TraceCtlError> {
        let mut result = OrderMap::new();
        for item in input.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let Some((tag, level)) = item.split_once('=') else {
                return Err(TraceCtlError::Syntax(item.to_string()));
            };
            let level = LevelFilter::from_str(level.trim())
                .map_err(|_| TraceCtlError::InvalidLevel(level.trim().to_string()))?;
            result.insert(tag.trim().to_string(), level);
        }
        Ok(result)
    }

    /// Apply a tracing configuration string such as `default=error,all=info,chainid=debug`
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let config = Self::parse_tracing_config(input)?;
        if let Some(level) = config.get("default") {
            self.set_default_level(*level);
        }
        if let Some(level) = config.get("all") {
            self.set_level_all(*level);
        }
        // specific tags override "all"
        for (tag, level) in config
            .iter()
            .filter(|(tag, _)| *tag != "default" && *tag != "all")
        {
            self.set_tag_level(tag, *level);
        }
        Ok(())
    }

    pub fn dump(&self) {
        let db = self.db();
        info!("{db}");
    }
    #[must_use]
    pub fn as_config_string(&self) -> String {
        self.db().as_config_string()
    }
}
