// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Worker pool rendering path events

use crate::errors::{ProcessError, ServiceError};
use crate::processor::{PathProcessor, Rendered};
use crate::sync::{PathSynchronizer, PathTicket};
use chainid::ChainIdAllocator;
use config::RendererConfig;
use crossbeam_channel::{Receiver, Sender};
use flow::{FlowBatchWriter, FlowPlane};
use model::{PathEvent, PathEventKind, PathId, TopologyUpdate};
use renderer::PipelineCompiler;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use topology::SharedTopology;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Result of one submitted path event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathOutcome {
    pub path_id: PathId,
    /// sequence number returned by [`PathService::on_path_changed`]
    pub sequence: u64,
    pub kind: PathEventKind,
    pub result: Result<Rendered, ProcessError>,
}

struct Job {
    ticket: PathTicket,
    sequence: u64,
    event: PathEvent,
}

struct Submitter {
    /// `None` once the service is shut down
    jobs: Option<Sender<Job>>,
    next_sequence: u64,
}

/// The path renderer service.
///
/// Path events are queued to a pool of worker threads. Each event takes its place in the queue
/// of its path when submitted, so events of one path are rendered one at a time and in
/// submission order, while events of different paths are rendered in parallel.
pub struct PathService {
    processor: Arc<PathProcessor>,
    synchronizer: Arc<PathSynchronizer>,
    submitter: Mutex<Submitter>,
    outcomes: Receiver<PathOutcome>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for PathService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathService")
            .field("processor", &self.processor)
            .field("paths", &self.synchronizer.paths())
            .finish_non_exhaustive()
    }
}

impl PathService {
    /// Validate `config`, apply its tracing levels and start the workers, rendering onto `plane`
    pub fn start(config: &RendererConfig, plane: Arc<dyn FlowPlane>) -> Result<Self, ServiceError> {
        config.validate()?;
        config.apply_tracing()?;
        let mut settings = config.compiler_settings();
        if settings.weighted_groups && !plane.supports_weighted_groups() {
            warn!("The forwarding plane has no weighted groups, group hops use hash buckets");
            settings.weighted_groups = false;
        }
        let processor = Arc::new(PathProcessor::new(
            ChainIdAllocator::new(config.layout),
            Arc::new(SharedTopology::default()),
            PipelineCompiler::new(config.layout, settings),
            FlowBatchWriter::new(plane),
        ));
        let synchronizer = Arc::new(PathSynchronizer::new());
        let (jobs, queue) = crossbeam_channel::bounded::<Job>(config.queue_depth);
        let (report, outcomes) = crossbeam_channel::unbounded();

        let mut workers = Vec::with_capacity(config.workers);
        for n in 0..config.workers {
            let queue = queue.clone();
            let report = report.clone();
            let processor = processor.clone();
            let synchronizer = synchronizer.clone();
            let spawned = thread::Builder::new()
                .name(format!("sfc-worker-{n}"))
                .spawn(move || work(&queue, &report, &processor, &synchronizer));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!("Could not spawn worker {n}: {e}");
                    drop(jobs);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(ServiceError::Spawn(e.to_string()));
                }
            }
        }
        info!(
            "Path service started with {} workers and a queue of {}",
            config.workers, config.queue_depth
        );
        Ok(Self {
            processor,
            synchronizer,
            submitter: Mutex::new(Submitter {
                jobs: Some(jobs),
                next_sequence: 0,
            }),
            outcomes,
            workers: Mutex::new(workers),
        })
    }

    fn submitter(&self) -> MutexGuard<'_, Submitter> {
        self.submitter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a path event. Blocks while the queue is full. Returns the sequence number of the
    /// submission, found again in its [`PathOutcome`].
    pub fn on_path_changed(&self, event: PathEvent) -> Result<u64, ServiceError> {
        // Tickets are taken and queued under one lock, so the queue holds the tickets of
        // each path in order and no worker waits on a ticket queued behind its own.
        let mut submitter = self.submitter();
        let Some(jobs) = submitter.jobs.as_ref() else {
            warn!("Dropping {} of path {}: service is shut down", event.kind, event.path_id());
            return Err(ServiceError::ShutDown);
        };
        let sequence = submitter.next_sequence;
        let ticket = self.synchronizer.enqueue(event.path_id());
        trace!("Queueing {} of path {} as {ticket}", event.kind, event.path_id());
        jobs.send(Job {
            ticket,
            sequence,
            event,
        })
        .map_err(|_| ServiceError::ShutDown)?;
        submitter.next_sequence += 1;
        Ok(sequence)
    }

    /// Apply a topology change. Installed paths are not re-rendered.
    pub fn on_topology_update(&self, update: &TopologyUpdate) {
        info!("Topology update: {update}");
        self.processor.topology().apply(update);
    }

    /// Outcomes of the submitted events, in completion order
    #[must_use]
    pub fn outcomes(&self) -> &Receiver<PathOutcome> {
        &self.outcomes
    }
    #[must_use]
    pub fn processor(&self) -> &PathProcessor {
        &self.processor
    }
    #[must_use]
    pub fn topology(&self) -> &Arc<SharedTopology> {
        self.processor.topology()
    }

    /// Stop accepting events, let the workers drain the queue and wait for them
    pub fn shutdown(&self) {
        let Some(jobs) = self.submitter().jobs.take() else {
            return;
        };
        drop(jobs);
        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in workers {
            let name = handle.thread().name().unwrap_or("worker").to_owned();
            if handle.join().is_err() {
                error!("Worker {name} panicked");
            }
        }
        info!("Path service stopped");
    }
}

impl Drop for PathService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn work(
    queue: &Receiver<Job>,
    report: &Sender<PathOutcome>,
    processor: &PathProcessor,
    synchronizer: &PathSynchronizer,
) {
    while let Ok(Job {
        ticket,
        sequence,
        event,
    }) = queue.recv()
    {
        let path_id = event.path_id();
        let result = synchronizer.run(ticket, || processor.process(&event));
        let outcome = PathOutcome {
            path_id,
            sequence,
            kind: event.kind,
            result,
        };
        if report.send(outcome).is_err() {
            trace!("Outcome of submission {sequence} dropped: nobody listens");
        }
    }
    debug!("Worker done");
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow::MemoryPlane;
    use model::{RenderedPath, TransportKind};
    use renderer::fixtures::{chain_fabric, four_hop_path};
    use tracing_test::traced_test;

    concurrency::with_std! {
        #[test]
        #[traced_test]
        fn plane_without_weighted_groups_turns_them_off() {
            let plane = Arc::new(MemoryPlane::new().without_weighted_groups());
            let service = PathService::start(&RendererConfig::default(), plane.clone()).unwrap();
            assert!(logs_contain("group hops use hash buckets"));

            let fabric = chain_fabric(TransportKind::Vlan).group("pool", &[("fw", 1), ("dpi", 3)]);
            let path = RenderedPath::new(PathId(1), "pooled", TransportKind::Vlan)
                .group_hop("sff1", "pool")
                .hop("sff2", "nat");
            service
                .on_path_changed(PathEvent::create(fabric.snapshot(path)))
                .unwrap();
            let outcome = service.outcomes().recv().unwrap();
            assert!(outcome.result.is_ok(), "{outcome:?}");
            assert_eq!(plane.group_count(), 0);
            assert!(plane.rule_count() > 0);
        }

        #[test]
        fn invalid_configuration_is_refused() {
            let plane = Arc::new(MemoryPlane::new());
            let result = PathService::start(&RendererConfig::default().with_workers(0), plane);
            assert!(matches!(result, Err(ServiceError::Config(_))));
        }

        #[test]
        fn events_after_shutdown_are_refused() {
            let plane = Arc::new(MemoryPlane::new());
            let service = PathService::start(&RendererConfig::default(), plane).unwrap();
            service.shutdown();
            service.shutdown();
            let fabric = chain_fabric(TransportKind::Vlan);
            let event = PathEvent::create(fabric.snapshot(four_hop_path(1, TransportKind::Vlan)));
            assert_eq!(service.on_path_changed(event), Err(ServiceError::ShutDown));
        }
    }
}
