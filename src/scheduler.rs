//! Ambient worker-thread pool (§5/§6), grounded on the original's
//! `scheduler.c`: a fixed set of workers pulls jobs off a shared queue and
//! the submitter blocks until every job in its batch has finished.
//!
//! The original starts one dispatcher thread that hands jobs to idle
//! workers at random and tracks completion with a `job_group_t` (a count
//! plus a mutex/condvar pair). A raw channel with multiple consumers plays
//! the dispatcher's role here — whichever worker is free next claims the
//! job off the channel, no separate assignment step needed — and an
//! `Arc<(Mutex<usize>, Condvar)>` stands in for `job_group_t` directly.
//!
//! Nothing in the back end depends on this pool: a single function is
//! compiled by one thread start to finish (§5), and `Context::parse`
//! compiles functions sequentially because direct calls can only resolve
//! against already-compiled callees (see `isa::x64::lower` and
//! DESIGN.md). This pool exists for embedders who want to compile several
//! independent translation units — or several call-free functions — at
//! once, and is exercised here only by tests.

use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread;

struct Job(Box<dyn FnOnce() + Send>);

/// A small fixed-size thread pool that runs batches of independent
/// `'static` closures and blocks the caller until the whole batch drains.
pub struct Scheduler {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Spin up `num_threads` workers (clamped to at least one) sharing one
    /// job queue, mirroring `jitc_schedule_job`'s lazy pool init.
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..num_threads)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || loop {
                    let job = receiver.lock().unwrap().recv();
                    match job {
                        Ok(job) => (job.0)(),
                        Err(_) => break,
                    }
                })
            })
            .collect();
        Scheduler {
            sender: Some(sender),
            workers,
        }
    }

    /// One worker per host CPU, matching `sysconf(_SC_NPROCESSORS_ONLN)`.
    pub fn host_parallelism() -> usize {
        thread::available_parallelism().map(std::num::NonZeroUsize::get).unwrap_or(1)
    }

    /// A pool sized to the host's CPU count, the common case (and the
    /// original's lazy-init default).
    pub fn host() -> Self {
        Scheduler::new(Scheduler::host_parallelism())
    }

    /// Run every job in `jobs` across the pool and block until all have
    /// completed — the fork-join shape `jitc_schedule_job`'s caller gets
    /// for free by waiting on `group->counter`.
    pub fn run_batch<F>(&self, jobs: Vec<F>)
    where
        F: FnOnce() + Send + 'static,
    {
        if jobs.is_empty() {
            return;
        }
        let remaining = Arc::new((Mutex::new(jobs.len()), Condvar::new()));
        let sender = self.sender.as_ref().expect("scheduler workers are still running");
        for job in jobs {
            let remaining = Arc::clone(&remaining);
            let wrapped = Job(Box::new(move || {
                job();
                let (count, cvar) = &*remaining;
                let mut count = count.lock().unwrap();
                *count -= 1;
                if *count == 0 {
                    cvar.notify_all();
                }
            }));
            sender.send(wrapped).expect("workers outlive every batch submitted to them");
        }
        let (count, cvar) = &*remaining;
        let guard = count.lock().unwrap();
        let _ = cvar.wait_while(guard, |c| *c > 0).unwrap();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Dropping the sender closes the channel, so every worker's `recv`
        // returns `Err` and its loop exits on its own.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_batch_waits_for_every_job() {
        let scheduler = Scheduler::new(4);
        let done = Arc::new(AtomicUsize::new(0));
        let jobs: Vec<_> = (0..20)
            .map(|_| {
                let done = Arc::clone(&done);
                move || {
                    done.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();
        scheduler.run_batch(jobs);
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn empty_batch_returns_immediately() {
        let scheduler = Scheduler::new(2);
        scheduler.run_batch(Vec::<fn()>::new());
    }

    #[test]
    fn host_parallelism_is_at_least_one() {
        assert!(Scheduler::host_parallelism() >= 1);
    }
}
