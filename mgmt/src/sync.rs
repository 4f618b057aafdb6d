// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-path serialization of work

use concurrency::sync::{Arc, Condvar, Mutex, MutexGuard};
use model::PathId;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::sync::PoisonError;
#[allow(unused)]
use tracing::{debug, trace, warn};

#[derive(Debug, Default)]
struct Turns {
    /// number handed to the next ticket
    issued: u64,
    /// number of the ticket allowed to run
    serving: u64,
    /// tickets dropped before their turn came
    abandoned: BTreeSet<u64>,
}

impl Turns {
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

/// Ticket dispenser of one path. Tickets run in the order they were issued.
#[derive(Debug)]
struct Turnstile {
    turns: Mutex<Turns>,
    turn: Condvar,
}

impl Turnstile {
    fn new() -> Self {
        Self {
            turns: Mutex::new(Turns::default()),
            turn: Condvar::new(),
        }
    }
    fn lock(&self) -> MutexGuard<'_, Turns> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn issue(&self) -> u64 {
        let mut turns = self.lock();
        let number = turns.issued;
        turns.issued += 1;
        number
    }
    fn wait_for(&self, number: u64) {
        let mut turns = self.lock();
        while turns.serving != number {
            turns = self
                .turn
                .wait(turns)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
    fn finish(&self, number: u64) {
        let mut turns = self.lock();
        if turns.serving == number {
            turns.advance();
            self.turn.notify_all();
        } else {
            turns.abandoned.insert(number);
        }
    }
}

/// A place in the queue of a path, obtained with [`PathSynchronizer::enqueue`].
///
/// A ticket is used up by [`PathSynchronizer::run`]. Dropping it unused gives its turn away, so
/// later tickets of the same path do not wait for it.
#[derive(Debug)]
#[must_use = "a ticket does nothing unless it is run"]
pub struct PathTicket {
    path_id: PathId,
    number: u64,
    turnstile: Arc<Turnstile>,
}

impl PathTicket {
    #[must_use]
    pub fn path_id(&self) -> PathId {
        self.path_id
    }
    /// Position of the ticket among the tickets of its path, starting at 0
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl Display for PathTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "path {} ticket {}", self.path_id, self.number)
    }
}

impl Drop for PathTicket {
    fn drop(&mut self) {
        self.turnstile.finish(self.number);
    }
}

/// Serializes work on each path while letting different paths proceed in parallel.
///
/// Each path gets a turnstile the first time it is seen. Turnstiles are never removed, so a
/// path cannot end up with two of them. The map lock is only held to look a turnstile up.
#[derive(Debug)]
pub struct PathSynchronizer {
    turnstiles: Mutex<HashMap<PathId, Arc<Turnstile>>>,
}

impl Default for PathSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathSynchronizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            turnstiles: Mutex::new(HashMap::new()),
        }
    }

    fn turnstile(&self, path_id: PathId) -> Arc<Turnstile> {
        let mut turnstiles = self
            .turnstiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        turnstiles
            .entry(path_id)
            .or_insert_with(|| {
                trace!("New turnstile for path {path_id}");
                Arc::new(Turnstile::new())
            })
            .clone()
    }

    /// Take the next place in the queue of `path_id`
    pub fn enqueue(&self, path_id: PathId) -> PathTicket {
        let turnstile = self.turnstile(path_id);
        let number = turnstile.issue();
        PathTicket {
            path_id,
            number,
            turnstile,
        }
    }

    /// Wait until every earlier ticket of the path is done, then run `f`. The turn passes to
    /// the next ticket when `f` returns or unwinds.
    pub fn run<R>(&self, ticket: PathTicket, f: impl FnOnce() -> R) -> R {
        ticket.turnstile.wait_for(ticket.number);
        debug!("Running {ticket}");
        let result = f();
        drop(ticket);
        result
    }

    /// Run `f` while holding the lock of `path_id`
    pub fn with_path_lock<R>(&self, path_id: PathId, f: impl FnOnce() -> R) -> R {
        let ticket = self.enqueue(path_id);
        self.run(ticket, f)
    }

    /// Number of paths seen so far
    #[must_use]
    pub fn paths(&self) -> usize {
        self.turnstiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    concurrency::with_std! {
        #[test]
        fn abandoned_tickets_give_their_turn_away() {
            let sync = PathSynchronizer::new();
            let first = sync.enqueue(PathId(1));
            let second = sync.enqueue(PathId(1));
            let third = sync.enqueue(PathId(1));
            assert_eq!((first.number(), third.number()), (0, 2));
            drop(second);
            assert_eq!(sync.run(first, || 1), 1);
            // would block forever if the second ticket still held its turn
            assert_eq!(sync.run(third, || 3), 3);
            assert_eq!(sync.with_path_lock(PathId(1), || 4), 4);
            assert_eq!(sync.with_path_lock(PathId(2), || 5), 5);
            assert_eq!(sync.paths(), 2);
        }

        #[test]
        fn tickets_run_in_submission_order() {
            use std::sync::Arc;
            use std::sync::Mutex;
            use std::thread;
            use std::time::Duration;

            let sync = Arc::new(PathSynchronizer::new());
            let log = Arc::new(Mutex::new(Vec::new()));
            let tickets: Vec<PathTicket> = (0..8).map(|_| sync.enqueue(PathId(7))).collect();
            // hand the tickets out in reverse order, so that later ones are tried first
            let handles: Vec<_> = tickets
                .into_iter()
                .rev()
                .map(|ticket| {
                    let sync = sync.clone();
                    let log = log.clone();
                    thread::spawn(move || {
                        let number = ticket.number();
                        sync.run(ticket, || {
                            thread::sleep(Duration::from_millis(1));
                            log.lock().unwrap().push(number);
                        });
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(*log.lock().unwrap(), (0..8).collect::<Vec<u64>>());
        }

        #[test]
        fn other_paths_are_not_blocked() {
            use std::sync::Arc;
            use std::sync::mpsc;
            use std::thread;

            let sync = Arc::new(PathSynchronizer::new());
            let (held_tx, held_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel::<()>();
            let holder = {
                let sync = sync.clone();
                thread::spawn(move || {
                    sync.with_path_lock(PathId(1), || {
                        held_tx.send(()).unwrap();
                        release_rx.recv().unwrap();
                    });
                })
            };
            held_rx.recv().unwrap();
            // path 1 is held, path 2 goes through
            assert_eq!(sync.with_path_lock(PathId(2), || 2), 2);
            release_tx.send(()).unwrap();
            holder.join().unwrap();
        }
    }

    concurrency::with_shuttle! {
        #[test]
        fn shuttle_same_path_is_exclusive() {
            use shuttle::sync::Arc;
            use shuttle::sync::atomic::{AtomicUsize, Ordering};
            use shuttle::thread;

            shuttle::check_random(
                || {
                    let sync = Arc::new(PathSynchronizer::new());
                    let inside = Arc::new(AtomicUsize::new(0));
                    let handles: Vec<_> = (0..3u32)
                        .map(|n| {
                            let sync = sync.clone();
                            let inside = inside.clone();
                            thread::spawn(move || {
                                // two threads on path 0, one on path 1
                                let path = PathId(n / 2);
                                sync.with_path_lock(path, || {
                                    if path == PathId(0) {
                                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                                        thread::yield_now();
                                        inside.fetch_sub(1, Ordering::SeqCst);
                                    }
                                });
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    assert_eq!(sync.paths(), 2);
                },
                500,
            );
        }

        #[test]
        fn shuttle_tickets_keep_their_order() {
            use shuttle::sync::{Arc, Mutex};
            use shuttle::thread;

            shuttle::check_random(
                || {
                    let sync = Arc::new(PathSynchronizer::new());
                    let order = Arc::new(Mutex::new(Vec::new()));
                    let tickets: Vec<PathTicket> =
                        (0..3).map(|_| sync.enqueue(PathId(9))).collect();
                    let handles: Vec<_> = tickets
                        .into_iter()
                        .map(|ticket| {
                            let sync = sync.clone();
                            let order = order.clone();
                            thread::spawn(move || {
                                let number = ticket.number();
                                sync.run(ticket, || order.lock().unwrap().push(number));
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
                },
                500,
            );
        }
    }
}
