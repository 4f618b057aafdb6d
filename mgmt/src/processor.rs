// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Processing of one path event: chain id, compilation, commit

use crate::errors::ProcessError;
use crate::stats;
use chainid::{ChainId, ChainIdAllocator};
use concurrency::sync::{Mutex, MutexGuard};
use flow::{FlowBatch, FlowBatchWriter};
use model::{PathEvent, PathEventKind, PathId, PathSnapshot};
use renderer::PipelineCompiler;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};
use topology::SharedTopology;
#[allow(unused)]
use tracing::{debug, error, info, warn};

/// What processing an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Installed {
        chain_id: ChainId,
        rules: usize,
        groups: usize,
    },
    /// The path had no chain id if it was never installed
    Removed { chain_id: Option<ChainId> },
}

/// Which path holds which chain id. A chain id has one owner, since the rules of two paths with
/// the same chain id would collide on the plane. A path owns the chain id it is installed with,
/// plus the one it is being rendered with if that differs.
#[derive(Debug, Default)]
struct Books {
    /// installed paths
    active: BTreeMap<PathId, ChainId>,
    owners: BTreeMap<ChainId, PathId>,
}

/// Renders path events onto a forwarding plane.
///
/// Events of one path must not be processed concurrently; the [`crate::PathSynchronizer`] takes
/// care of that. Events of different paths may be.
#[derive(Debug)]
pub struct PathProcessor {
    allocator: ChainIdAllocator,
    topology: Arc<SharedTopology>,
    compiler: PipelineCompiler,
    writer: FlowBatchWriter,
    books: Mutex<Books>,
}

impl PathProcessor {
    #[must_use]
    pub fn new(
        allocator: ChainIdAllocator,
        topology: Arc<SharedTopology>,
        compiler: PipelineCompiler,
        writer: FlowBatchWriter,
    ) -> Self {
        Self {
            allocator,
            topology,
            compiler,
            writer,
            books: Mutex::new(Books::default()),
        }
    }

    #[must_use]
    pub fn allocator(&self) -> &ChainIdAllocator {
        &self.allocator
    }
    #[must_use]
    pub fn topology(&self) -> &Arc<SharedTopology> {
        &self.topology
    }

    fn books(&self) -> MutexGuard<'_, Books> {
        self.books.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ids of the installed paths
    #[must_use]
    pub fn active_paths(&self) -> Vec<PathId> {
        self.books().active.keys().copied().collect()
    }
    #[must_use]
    pub fn chain_id_of(&self, path_id: PathId) -> Option<ChainId> {
        self.books().active.get(&path_id).copied()
    }

    pub fn process(&self, event: &PathEvent) -> Result<Rendered, ProcessError> {
        debug!("Processing {} of path {}", event.kind, event.path_id());
        match event.kind {
            PathEventKind::Create | PathEventKind::Update => self.install(&event.snapshot),
            PathEventKind::Delete => self.remove(event.path_id()),
        }
    }

    fn hold(&self, path_id: PathId, snapshot: &PathSnapshot) -> Result<ChainId, ProcessError> {
        let mut books = self.books();
        let allocation = self
            .allocator
            .acquire(snapshot.path.chain_key)
            .inspect_err(|e| {
                error!("No chain id for path {path_id}: {e}");
                stats::failed("chain-id");
            })?;
        let chain_id = allocation.chain_id;
        match books.owners.get(&chain_id).copied() {
            Some(owner) if owner != path_id => {
                error!("Path {path_id} refused: its chain id {chain_id} belongs to path {owner}");
                stats::failed("chain-id");
                return Err(ProcessError::ChainInUse { chain_id, owner });
            }
            Some(_) => {}
            None => {
                if allocation.fresh {
                    debug!("Path {path_id} gets new chain id {chain_id}");
                }
                books.owners.insert(chain_id, path_id);
            }
        }
        Ok(chain_id)
    }

    /// Release `chain_id` if `path_id` owns it
    fn unhold(&self, books: &mut Books, path_id: PathId, chain_id: ChainId) {
        if books.owners.get(&chain_id) != Some(&path_id) {
            return;
        }
        books.owners.remove(&chain_id);
        match self.allocator.release(chain_id) {
            Ok(key) => debug!("Chain id {chain_id} of key {key} released"),
            Err(e) => error!("Could not release chain id {chain_id}: {e}"),
        }
        stats::chain_ids_in_use(self.allocator.in_use());
    }

    /// Drop a hold taken for a rendering that failed, unless the path is installed with it
    fn abandon(&self, path_id: PathId, chain_id: ChainId) {
        let mut books = self.books();
        if books.active.get(&path_id) != Some(&chain_id) {
            self.unhold(&mut books, path_id, chain_id);
        }
    }

    fn install(&self, snapshot: &PathSnapshot) -> Result<Rendered, ProcessError> {
        let path_id = snapshot.path_id();
        let chain_id = self.hold(path_id, snapshot)?;

        let compiled = self
            .topology
            .read(|graph| self.compiler.compile(snapshot, chain_id, graph));
        let compiled = match compiled {
            Ok(compiled) => compiled,
            Err(e) => {
                error!("Could not render path {path_id}: {e}");
                stats::failed("render");
                self.abandon(path_id, chain_id);
                return Err(e.into());
            }
        };
        let rules = compiled.rule_count();
        let groups = compiled.group_count();
        if let Err(e) = self.writer.apply(path_id, compiled.into_batch()) {
            error!("Could not install path {path_id}: {e}");
            stats::failed("write");
            self.abandon(path_id, chain_id);
            return Err(e.into());
        }

        let mut books = self.books();
        let previous = books.active.insert(path_id, chain_id);
        if let Some(previous) = previous.filter(|previous| *previous != chain_id) {
            info!("Path {path_id} moved from chain id {previous} to {chain_id}");
            self.unhold(&mut books, path_id, previous);
        }
        stats::rendered();
        stats::chain_ids_in_use(self.allocator.in_use());
        info!("Path {path_id} installed with chain id {chain_id}: {rules} rules, {groups} groups");
        Ok(Rendered::Installed {
            chain_id,
            rules,
            groups,
        })
    }

    fn remove(&self, path_id: PathId) -> Result<Rendered, ProcessError> {
        self.writer
            .apply(path_id, FlowBatch::empty())
            .inspect_err(|e| {
                error!("Could not remove path {path_id}: {e}");
                stats::failed("write");
            })?;
        let mut books = self.books();
        let chain_id = books.active.remove(&path_id);
        if let Some(chain_id) = chain_id {
            self.unhold(&mut books, path_id, chain_id);
        }
        stats::removed();
        info!("Path {path_id} removed");
        Ok(Rendered::Removed { chain_id })
    }
}

#[cfg(test)]
mod tests {
    concurrency::with_std! {
        use super::*;
        use chainid::{AddressLayout, ChainIdEvent};
        use flow::{FlowPlane, MemoryPlane};
        use model::{ChainKey, PathEvent, RenderedPath, TransportKind};
        use pretty_assertions::assert_eq;
        use renderer::fixtures::{chain_fabric, four_hop_path};
        use renderer::{CompilerSettings, RenderError};
        use tracing_test::traced_test;

        fn processor(plane: Arc<MemoryPlane>) -> PathProcessor {
            let topology = Arc::new(SharedTopology::default());
            PathProcessor::new(
                ChainIdAllocator::new(AddressLayout::default()),
                topology,
                PipelineCompiler::new(AddressLayout::default(), CompilerSettings::default()),
                FlowBatchWriter::new(plane),
            )
        }

        fn snapshot(path: RenderedPath) -> PathSnapshot {
            chain_fabric(TransportKind::Vlan).snapshot(path)
        }

        /// `first@sff1 -> nat@sff2` on the chain named "shared", leaving through port 9
        fn on_shared_chain(path_id: u32, first: &str) -> RenderedPath {
            let name = format!("path-{path_id}");
            let mut path = RenderedPath::new(PathId(path_id), &name, TransportKind::Vlan)
                .hop("sff1", first)
                .hop("sff2", "nat")
                .with_egress(9);
            path.chain_key = ChainKey::from_name("shared");
            path
        }

        #[test]
        #[traced_test]
        fn create_update_delete() {
            let plane = Arc::new(MemoryPlane::new());
            let processor = processor(plane.clone());
            let path = four_hop_path(1, TransportKind::Vlan);

            let created = processor
                .process(&PathEvent::create(snapshot(path.clone())))
                .unwrap();
            let Rendered::Installed { chain_id, rules, .. } = created else {
                unreachable!("path should be installed");
            };
            assert_eq!(plane.rule_count(), rules);
            assert_eq!(processor.chain_id_of(PathId(1)), Some(chain_id));

            // same chain, now symmetric: same chain id, more rules
            let updated = processor
                .process(&PathEvent::update(snapshot(path.clone().symmetric(true))))
                .unwrap();
            assert!(matches!(
                updated,
                Rendered::Installed { chain_id: id, rules: more, .. } if id == chain_id && more > rules
            ));
            assert_eq!(processor.allocator().in_use(), 1);

            let removed = processor.process(&PathEvent::delete(snapshot(path))).unwrap();
            assert_eq!(removed, Rendered::Removed { chain_id: Some(chain_id) });
            assert_eq!(plane.rule_count(), 0);
            assert_eq!(processor.allocator().in_use(), 0);
            assert!(processor.active_paths().is_empty());
            assert!(logs_contain("Path 1 removed"));
        }

        #[test]
        fn delete_releases_exactly_once() {
            let (events, sink) = crossbeam_channel::unbounded();
            let plane = Arc::new(MemoryPlane::new());
            let processor = PathProcessor::new(
                ChainIdAllocator::new(AddressLayout::default()).with_events(events),
                Arc::new(SharedTopology::default()),
                PipelineCompiler::new(AddressLayout::default(), CompilerSettings::default()),
                FlowBatchWriter::new(plane),
            );
            let path = four_hop_path(3, TransportKind::Vlan);
            processor
                .process(&PathEvent::create(snapshot(path.clone())))
                .unwrap();
            let delete = PathEvent::delete(snapshot(path));
            processor.process(&delete).unwrap();
            assert_eq!(
                processor.process(&delete).unwrap(),
                Rendered::Removed { chain_id: None }
            );
            let released = sink
                .try_iter()
                .filter(|e| matches!(e, ChainIdEvent::Released { .. }))
                .count();
            assert_eq!(released, 1);
        }

        #[test]
        fn failed_creation_releases_its_chain_id() {
            let plane = Arc::new(MemoryPlane::new());
            let processor = processor(plane.clone());
            let broken = RenderedPath::new(PathId(2), "broken", TransportKind::Vlan)
                .hop("sff1", "fw")
                .hop("sff9", "nat");
            let result = processor.process(&PathEvent::create(snapshot(broken)));
            assert!(matches!(
                result,
                Err(ProcessError::Render(RenderError::UnresolvedHop { hop: 1, .. }))
            ));
            assert_eq!(processor.allocator().in_use(), 0);
            assert_eq!(plane.rule_count(), 0);
        }

        #[test]
        fn failed_update_keeps_the_installed_path() {
            let plane = Arc::new(MemoryPlane::new());
            let processor = processor(plane.clone());
            let path = four_hop_path(4, TransportKind::Vlan);
            processor
                .process(&PathEvent::create(snapshot(path.clone())))
                .unwrap();
            let before = plane.installed(PathId(4)).unwrap();
            let chain_id = processor.chain_id_of(PathId(4));

            plane.fail_after(0, 1);
            let result = processor.process(&PathEvent::update(snapshot(path.symmetric(true))));
            assert!(matches!(result, Err(ProcessError::Write(_))));
            assert_eq!(plane.installed(PathId(4)).unwrap(), before);
            assert_eq!(processor.chain_id_of(PathId(4)), chain_id);
            assert_eq!(processor.allocator().in_use(), 1);
        }

        #[test]
        fn renamed_path_moves_to_another_chain_id() {
            let plane = Arc::new(MemoryPlane::new());
            let processor = processor(plane);
            let path = four_hop_path(5, TransportKind::Vlan);
            processor
                .process(&PathEvent::create(snapshot(path.clone())))
                .unwrap();
            let first = processor.chain_id_of(PathId(5)).unwrap();

            let mut renamed = path;
            renamed.name = "renamed".to_string();
            renamed.chain_key = ChainKey::from_name("renamed");
            processor
                .process(&PathEvent::update(snapshot(renamed)))
                .unwrap();
            assert_ne!(processor.chain_id_of(PathId(5)), Some(first));
            assert_eq!(processor.allocator().in_use(), 1);
        }

        #[test]
        #[traced_test]
        fn chain_id_of_another_path_is_refused() {
            let plane = Arc::new(MemoryPlane::new());
            let processor = processor(plane.clone());
            processor
                .process(&PathEvent::create(snapshot(on_shared_chain(6, "fw"))))
                .unwrap();
            let chain_id = processor.chain_id_of(PathId(6)).unwrap();
            let installed = plane.installed(PathId(6)).unwrap();
            let rules = plane.rules();

            let refused = PathEvent::create(snapshot(on_shared_chain(7, "dpi")));
            let result = processor.process(&refused);
            assert_eq!(
                result,
                Err(ProcessError::ChainInUse {
                    chain_id,
                    owner: PathId(6)
                })
            );
            assert!(logs_contain("belongs to path 6"));
            assert_eq!(plane.installed(PathId(6)).unwrap(), installed);
            assert_eq!(plane.rules(), rules);
            assert_eq!(processor.chain_id_of(PathId(7)), None);
            assert_eq!(processor.allocator().in_use(), 1);

            // deleting the refused path leaves the owner programmed
            assert_eq!(
                processor
                    .process(&PathEvent::delete(snapshot(on_shared_chain(7, "dpi"))))
                    .unwrap(),
                Rendered::Removed { chain_id: None }
            );
            assert_eq!(plane.rules(), rules);
            assert_eq!(processor.chain_id_of(PathId(6)), Some(chain_id));
            assert_eq!(processor.allocator().in_use(), 1);

            // once the owner is gone, the chain is free for the other path
            processor
                .process(&PathEvent::delete(snapshot(on_shared_chain(6, "fw"))))
                .unwrap();
            assert_eq!(processor.allocator().in_use(), 0);
            let created = processor
                .process(&PathEvent::create(snapshot(on_shared_chain(7, "dpi"))))
                .unwrap();
            assert!(matches!(created, Rendered::Installed { .. }));
            assert_eq!(processor.active_paths(), vec![PathId(7)]);
        }

        #[test]
        fn rename_onto_a_taken_chain_keeps_the_old_one() {
            let plane = Arc::new(MemoryPlane::new());
            let processor = processor(plane.clone());
            processor
                .process(&PathEvent::create(snapshot(on_shared_chain(6, "fw"))))
                .unwrap();
            let path = four_hop_path(8, TransportKind::Vlan);
            processor
                .process(&PathEvent::create(snapshot(path.clone())))
                .unwrap();
            let own = processor.chain_id_of(PathId(8)).unwrap();
            let installed = plane.installed(PathId(8)).unwrap();

            let mut renamed = path;
            renamed.chain_key = ChainKey::from_name("shared");
            let result = processor.process(&PathEvent::update(snapshot(renamed)));
            assert!(matches!(
                result,
                Err(ProcessError::ChainInUse { owner: PathId(6), .. })
            ));
            assert_eq!(processor.chain_id_of(PathId(8)), Some(own));
            assert_eq!(plane.installed(PathId(8)).unwrap(), installed);
            assert_eq!(processor.allocator().in_use(), 2);
        }
    }
}
