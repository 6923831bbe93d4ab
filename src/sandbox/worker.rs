//! Worker-thread isolation and last-run-wins supervision.

use crate::error::SandboxError;
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

const WORKER_NAME: &str = "condwright-sandbox";

/// Spawns one dedicated thread per batch. The job builds its own interpreter on
/// that thread and sends exactly one message back.
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxWorker;

impl SandboxWorker {
    pub fn dispatch<T, F>(&self, job: F) -> Result<Pending<T>, SandboxError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new().name(WORKER_NAME.to_string()).spawn(move || {
            // The receiver may already be gone if the caller gave up on the batch.
            let _ = tx.send(job());
        })?;
        Ok(Pending { rx, handle: Some(handle), generation: 0 })
    }
}

/// A batch in flight on a worker thread.
#[derive(Debug)]
pub struct Pending<T> {
    rx: Receiver<T>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

impl<T> Pending<T> {
    /// Block until the worker reports.
    pub fn wait(mut self) -> Result<T, SandboxError> {
        match self.rx.recv() {
            Ok(value) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                Ok(value)
            }
            Err(_) => Err(self.lost()),
        }
    }

    /// The worker's message if it has already arrived.
    pub fn try_wait(&mut self) -> Option<Result<T, SandboxError>> {
        match self.rx.try_recv() {
            Ok(value) => Some(Ok(value)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.lost())),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn lost(&mut self) -> SandboxError {
        let reason = match self.handle.take().map(JoinHandle::join) {
            Some(Err(payload)) => panic_message(payload),
            _ => "worker exited without a result".to_string(),
        };
        SandboxError::WorkerLost(reason)
    }
}

/// Generation counter giving last-run-wins semantics.
///
/// Every submission takes the next generation; a result is delivered only if
/// no newer submission happened meanwhile. Superseded workers are left to
/// finish on their own and their reports are dropped.
#[derive(Debug, Clone, Default)]
pub struct RunSupervisor {
    latest: Arc<AtomicU64>,
}

impl RunSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit<T, F>(&self, job: F) -> Result<Pending<T>, SandboxError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pending = SandboxWorker.dispatch(job)?;
        pending.generation = generation;
        Ok(pending)
    }

    pub fn is_current(&self, pending: &Pending<impl Sized>) -> bool {
        pending.generation == self.latest.load(Ordering::SeqCst)
    }

    /// Wait for `pending`; `Ok(None)` when a newer run superseded it.
    pub fn collect<T>(&self, pending: Pending<T>) -> Result<Option<T>, SandboxError> {
        let generation = pending.generation;
        let value = pending.wait()?;
        if generation == self.latest.load(Ordering::SeqCst) { Ok(Some(value)) } else { Ok(None) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn job_result_comes_back_by_message() {
        let pending = SandboxWorker.dispatch(|| thread::current().name().map(str::to_string)).unwrap();
        assert_eq!(pending.wait().unwrap().as_deref(), Some(WORKER_NAME));
    }

    #[test]
    fn panicking_job_reports_lost_worker() {
        let pending = SandboxWorker.dispatch(|| -> u32 { panic!("boom") }).unwrap();
        match pending.wait() {
            Err(SandboxError::WorkerLost(reason)) => assert!(reason.contains("boom")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn superseded_run_is_dropped() {
        let supervisor = RunSupervisor::new();
        let first = supervisor
            .submit(|| {
                thread::sleep(Duration::from_millis(20));
                1
            })
            .unwrap();
        let second = supervisor.submit(|| 2).unwrap();

        assert!(!supervisor.is_current(&first));
        assert!(supervisor.is_current(&second));
        assert_eq!(supervisor.collect(first).unwrap(), None);
        assert_eq!(supervisor.collect(second).unwrap(), Some(2));
    }
}
