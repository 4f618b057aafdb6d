// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing targets of every linked crate, gathered by the linker

use crate::LevelFilter;
use linkme::distributed_slice;

/// One [`trace_target!`] declaration
pub struct STarget {
    /// `target` of the events, by default the module path of the declaration
    pub(crate) target: &'static str,
    /// name shown to operators
    pub(crate) name: &'static str,
    pub(crate) level: LevelFilter,
    pub(crate) tags: &'static [&'static str],
}

impl STarget {
    #[doc(hidden)]
    #[must_use]
    pub const fn declare(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &'static [&'static str],
    ) -> Self {
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}

#[distributed_slice]
pub static TRACING_TARGETS: [STarget];

/// Declare a tracing target with its default level and the tags it can be configured by.
///
/// `trace_target!("renderer", LevelFilter::INFO, &["renderer"])` registers the module path of
/// the caller under the name `renderer`. `trace_target!(target: "audit", ...)` registers events
/// emitted with an explicit `target: "audit"` instead, under the same name.
///
/// Each expansion lives in its own anonymous const, so a crate may declare several targets.
#[macro_export]
macro_rules! trace_target {
    (target: $target:expr, $level:expr, $tags:expr) => {
        $crate::trace_target!(@declare $target, $target, $level, $tags);
    };
    (@declare $target:expr, $name:expr, $level:expr, $tags:expr) => {
        const _: () = {
            #[::linkme::distributed_slice($crate::targets::TRACING_TARGETS)]
            static __TRACE_TARGET: $crate::targets::STarget =
                $crate::targets::STarget::declare($target, $name, $level, $tags);
        };
    };
    ($name:expr, $level:expr, $tags:expr) => {
        $crate::trace_target!(@declare module_path!(), $name, $level, $tags);
    };
}
