//! Bounded worker pool for asynchronous path queries.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use log::{debug, info};
use skulk_core::{Capabilities, Point};
use thiserror::Error;

use crate::cache::PathKey;
use crate::engine::{Navigator, PathOutcome};
use crate::search::SearchSpace;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("path request queue is full")]
    Saturated,
    #[error("path workers are shut down")]
    ShutDown,
}

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(2);
        Self {
            workers,
            queue_capacity: 256,
        }
    }
}

struct Job {
    key: PathKey,
    cancel: Arc<AtomicBool>,
    reply: Sender<PathOutcome>,
}

/// Pending result of a submitted query. Dropping the handle cancels it.
#[derive(Debug)]
pub struct PathHandle {
    rx: Receiver<PathOutcome>,
    cancel: Arc<AtomicBool>,
    done: Option<PathOutcome>,
}

impl PathHandle {
    /// Non-blocking check. Returns the outcome once it is available.
    pub fn poll(&mut self) -> Option<&PathOutcome> {
        if self.done.is_none() {
            match self.rx.try_recv() {
                Ok(outcome) => self.done = Some(outcome),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => self.done = Some(PathOutcome::Cancelled),
            }
        }
        self.done.as_ref()
    }

    /// Block until the outcome is available.
    pub fn wait(mut self) -> PathOutcome {
        if let Some(done) = self.done.take() {
            return done;
        }
        self.rx.recv().unwrap_or(PathOutcome::Cancelled)
    }

    /// Ask the worker to drop this query. A result already delivered is
    /// kept.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

impl Drop for PathHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A fixed set of threads answering path queries against a shared
/// [`Navigator`].
///
/// Each worker owns its own search scratch. Queries are fed through a
/// bounded channel; [`submit`](Self::submit) never blocks.
pub struct PathWorkers {
    navigator: Arc<Navigator>,
    tx: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
}

impl PathWorkers {
    pub fn new(navigator: Arc<Navigator>, config: PoolConfig) -> io::Result<Self> {
        let workers = config.workers.max(1);
        let (tx, rx) = crossbeam_channel::bounded::<Job>(config.queue_capacity.max(1));
        let mut threads = Vec::with_capacity(workers);
        for i in 0..workers {
            let nav = Arc::clone(&navigator);
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("skulk-path-{i}"))
                .spawn(move || worker_loop(i, &nav, &rx))?;
            threads.push(handle);
        }
        info!(
            "path workers started: {workers} threads, queue capacity {}",
            config.queue_capacity.max(1)
        );
        Ok(Self {
            navigator,
            tx: Some(tx),
            threads,
        })
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    /// Queue a query without blocking.
    pub fn submit(
        &self,
        start: Point,
        goal: Point,
        caps: Capabilities,
    ) -> Result<PathHandle, SubmitError> {
        let tx = self.tx.as_ref().ok_or(SubmitError::ShutDown)?;
        let (reply, rx) = crossbeam_channel::bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let job = Job {
            key: PathKey::new(start, goal, caps),
            cancel: Arc::clone(&cancel),
            reply,
        };
        match tx.try_send(job) {
            Ok(()) => Ok(PathHandle {
                rx,
                cancel,
                done: None,
            }),
            Err(TrySendError::Full(_)) => Err(SubmitError::Saturated),
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::ShutDown),
        }
    }

    /// Stop accepting work, let queued jobs drain and join every thread.
    pub fn shutdown(&mut self) {
        if self.tx.take().is_none() {
            return;
        }
        let n = self.threads.len();
        for t in self.threads.drain(..) {
            let _ = t.join();
        }
        info!("path workers stopped ({n} threads)");
    }
}

impl Drop for PathWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, nav: &Navigator, rx: &Receiver<Job>) {
    let mut space = SearchSpace::new(nav.bounds());
    while let Ok(job) = rx.recv() {
        let outcome = if job.cancel.load(Ordering::Acquire) {
            PathOutcome::Cancelled
        } else {
            nav.resolve(&mut space, job.key, Some(&job.cancel))
        };
        if outcome == PathOutcome::Cancelled {
            debug!(
                "worker {id}: dropped cancelled query {} -> {}",
                job.key.start, job.key.goal
            );
        }
        // The handle may be gone already.
        let _ = job.reply.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use skulk_core::{LevelVersion, MazeBuilder, Movement, Range};

    fn open_nav(size: i32) -> Arc<Navigator> {
        let mut b = MazeBuilder::new(size, size, Movement::Octile).unwrap();
        b.carve(Range::new(0, 0, size, size));
        let g = b.build(LevelVersion::INITIAL).unwrap();
        Arc::new(Navigator::new(g, EngineConfig::default()))
    }

    #[test]
    fn results_match_synchronous_queries() {
        let nav = open_nav(12);
        let pool = PathWorkers::new(
            Arc::clone(&nav),
            PoolConfig {
                workers: 3,
                queue_capacity: 32,
            },
        )
        .unwrap();
        let handles: Vec<_> = (0..12)
            .map(|i| {
                pool.submit(Point::ZERO, Point::new(i, 11), Capabilities::NONE)
                    .unwrap()
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            let path = h.wait().into_path().unwrap();
            let expected = nav
                .find_path(Point::ZERO, Point::new(i as i32, 11), Capabilities::NONE)
                .unwrap();
            assert_eq!(path.cost(), expected.cost());
        }
    }

    #[test]
    fn cancelled_jobs_never_populate_the_cache() {
        let nav = open_nav(8);
        let (tx, rx) = crossbeam_channel::unbounded();
        let (reply, outcome) = crossbeam_channel::bounded(1);
        tx.send(Job {
            key: PathKey::new(Point::ZERO, Point::new(7, 7), Capabilities::NONE),
            cancel: Arc::new(AtomicBool::new(true)),
            reply,
        })
        .unwrap();
        drop(tx);
        worker_loop(0, &nav, &rx);
        assert_eq!(outcome.recv().unwrap(), PathOutcome::Cancelled);
        assert_eq!(nav.cache_len(), 0);

        let mut space = SearchSpace::new(nav.bounds());
        let flag = AtomicBool::new(true);
        let key = PathKey::new(Point::ZERO, Point::new(3, 3), Capabilities::NONE);
        assert_eq!(nav.resolve(&mut space, key, Some(&flag)), PathOutcome::Cancelled);
        assert_eq!(nav.cache_len(), 0);
        assert!(nav.resolve(&mut space, key, None).into_path().is_some());
        assert_eq!(nav.cache_len(), 1);
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let nav = open_nav(4);
        let mut pool = PathWorkers::new(nav, PoolConfig::default()).unwrap();
        pool.shutdown();
        assert_eq!(
            pool.submit(Point::ZERO, Point::ZERO, Capabilities::NONE)
                .unwrap_err(),
            SubmitError::ShutDown
        );
    }

    #[test]
    fn full_queue_reports_saturation() {
        let nav = open_nav(4);
        let pool = PathWorkers::new(
            Arc::clone(&nav),
            PoolConfig {
                workers: 1,
                queue_capacity: 1,
            },
        )
        .unwrap();
        // Block the worker on the graph lock so nothing drains.
        let guard = nav.graph_write_for_tests();
        let mut handles = Vec::new();
        let mut saturated = false;
        for _ in 0..4 {
            match pool.submit(Point::ZERO, Point::new(3, 3), Capabilities::NONE) {
                Ok(h) => handles.push(h),
                Err(e) => {
                    assert_eq!(e, SubmitError::Saturated);
                    saturated = true;
                }
            }
        }
        drop(guard);
        assert!(saturated);
        for h in handles {
            assert!(h.wait().into_path().is_some());
        }
    }

    #[test]
    fn dropped_handles_cancel() {
        let nav = open_nav(8);
        let pool = PathWorkers::new(Arc::clone(&nav), PoolConfig::default()).unwrap();
        let h = pool
            .submit(Point::ZERO, Point::new(5, 5), Capabilities::NONE)
            .unwrap();
        let flag = Arc::clone(&h.cancel);
        drop(h);
        assert!(flag.load(Ordering::Acquire));
    }
}
