use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    task::{Context, Poll},
    thread,
};

use crossbeam_channel::Sender;
use futures::FutureExt;
use snafu::Snafu;
use tokio::sync::oneshot;

use super::WorkloadError;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WorkerError {
    #[snafu(display("worker thread panicked: {}", message))]
    Panicked { message: String },

    #[snafu(display("worker pool is shut down"))]
    PoolClosed,

    #[snafu(display("{}", source))]
    Workload { source: WorkloadError },
}

/// Fixed set of OS threads for CPU-bound work.
///
/// Jobs are handed over on a channel and their results come back through a
/// [`JobHandle`], which async code can await without blocking the runtime.
/// Shutting down, explicitly or by drop, closes the channel and joins every
/// thread, so work that was already submitted always runs to completion.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    threads: Vec<thread::JoinHandle<()>>,
    submitted: AtomicU64,
}

impl WorkerPool {
    pub fn new(size: usize) -> std::io::Result<Self> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();

        let threads = (0..size)
            .map(|index| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("tps-worker-{index}"))
                    .spawn(move || {
                        for job in receiver.iter() {
                            job();
                        }
                    })
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        debug!(message = "Worker pool started.", size);

        Ok(Self {
            sender: Some(sender),
            threads,
            submitted: AtomicU64::new(0),
        })
    }

    /// Queues `work` on the pool. A panic inside `work` is caught and surfaces as
    /// [`WorkerError::Panicked`]; the thread that ran it keeps serving jobs.
    pub fn submit<F, T>(&self, work: F) -> JobHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, receiver) = oneshot::channel();
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
                WorkerError::Panicked {
                    message: panic_message(payload.as_ref()),
                }
            });
            // The submitter may have stopped waiting; the result is simply dropped then.
            let _ = reply.send(outcome);
        });

        match &self.sender {
            Some(sender) if sender.send(job).is_ok() => {
                self.submitted.fetch_add(1, Ordering::Relaxed);
            }
            _ => warn!(message = "Job submitted to a closed worker pool."),
        }

        JobHandle { receiver }
    }

    pub fn size(&self) -> usize {
        self.threads.len()
    }

    /// Jobs accepted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Blocks until every submitted job has finished and all threads have exited.
    pub fn shutdown(mut self) {
        self.join_threads();
    }

    fn join_threads(&mut self) {
        // Dropping the only sender ends each thread's receive loop once the backlog is empty.
        self.sender.take();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!(message = "Worker thread terminated abnormally.");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join_threads();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size())
            .field("submitted", &self.submitted())
            .finish()
    }
}

/// Completion of one job submitted to a [`WorkerPool`].
#[derive(Debug)]
pub struct JobHandle<T> {
    receiver: oneshot::Receiver<Result<T, WorkerError>>,
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T, WorkerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match std::task::ready!(self.receiver.poll_unpin(cx)) {
            Ok(outcome) => Poll::Ready(outcome),
            Err(_) => Poll::Ready(Err(WorkerError::PoolClosed)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
