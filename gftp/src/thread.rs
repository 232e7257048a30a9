//! Thread, mutex and condition variable handles used by the data transfer
//! workers.
//!
//! Every primitive is backed by the native `std` implementation. Creation
//! failures are returned to the caller and never abort the process.

use std::io;
use std::sync::{Arc, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    #[error("could not spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("thread {0} panicked")]
    Panicked(String),
    #[error("lock was poisoned by a panicking thread")]
    Poisoned,
}

pub enum TryLock<'a, T> {
    Acquired(MutexGuard<'a, T>),
    AlreadyLocked,
}

pub struct Mutex<T> {
    inner: std::sync::Mutex<T>,
}

impl<T> Mutex<T> {
    pub fn new(value: T) -> Mutex<T> {
        Mutex {
            inner: std::sync::Mutex::new(value),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, T>, ThreadError> {
        self.inner.lock().map_err(|_| ThreadError::Poisoned)
    }

    /// Never blocks. A mutex held by someone else is reported as
    /// `TryLock::AlreadyLocked`, not as an error.
    pub fn try_lock(&self) -> Result<TryLock<'_, T>, ThreadError> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(TryLock::Acquired(guard)),
            Err(TryLockError::WouldBlock) => Ok(TryLock::AlreadyLocked),
            Err(TryLockError::Poisoned(_)) => Err(ThreadError::Poisoned),
        }
    }

    pub fn unlock(guard: MutexGuard<'_, T>) {
        drop(guard);
    }

    pub fn into_inner(self) -> Result<T, ThreadError> {
        self.inner.into_inner().map_err(|_| ThreadError::Poisoned)
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Mutex::new(T::default())
    }
}

/// Monitor-style condition variable. The guard passed to the wait functions
/// must come from the mutex protecting the waited-on predicate, and callers
/// re-check that predicate after every wakeup.
#[derive(Default)]
pub struct CondVar {
    inner: std::sync::Condvar,
}

impl CondVar {
    pub fn new() -> CondVar {
        CondVar::default()
    }

    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> Result<MutexGuard<'a, T>, ThreadError> {
        self.inner.wait(guard).map_err(|_| ThreadError::Poisoned)
    }

    pub fn wait_while<'a, T, F>(
        &self,
        guard: MutexGuard<'a, T>,
        condition: F,
    ) -> Result<MutexGuard<'a, T>, ThreadError>
    where
        F: FnMut(&mut T) -> bool,
    {
        self.inner
            .wait_while(guard, condition)
            .map_err(|_| ThreadError::Poisoned)
    }

    /// Returns the reacquired guard and whether the wait timed out.
    pub fn wait_timeout<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        millis: u64,
    ) -> Result<(MutexGuard<'a, T>, bool), ThreadError> {
        let (guard, result) = self
            .inner
            .wait_timeout(guard, Duration::from_millis(millis))
            .map_err(|_| ThreadError::Poisoned)?;
        Ok((guard, result.timed_out()))
    }

    /// Waits while `condition` holds, for at most `millis` in total. Returns
    /// the reacquired guard and whether the wait timed out with the
    /// condition still holding.
    pub fn wait_timeout_while<'a, T, F>(
        &self,
        guard: MutexGuard<'a, T>,
        millis: u64,
        condition: F,
    ) -> Result<(MutexGuard<'a, T>, bool), ThreadError>
    where
        F: FnMut(&mut T) -> bool,
    {
        let (guard, result) = self
            .inner
            .wait_timeout_while(guard, Duration::from_millis(millis), condition)
            .map_err(|_| ThreadError::Poisoned)?;
        Ok((guard, result.timed_out()))
    }

    pub fn notify_one(&self) {
        self.inner.notify_one();
    }

    pub fn notify_all(&self) {
        self.inner.notify_all();
    }
}

#[derive(Default)]
struct Completion {
    finished: Mutex<bool>,
    cond: CondVar,
}

impl Completion {
    fn finish(&self) {
        if let Ok(mut finished) = self.finished.lock() {
            *finished = true;
        }
        self.cond.notify_all();
    }

    fn is_finished(&self) -> bool {
        self.finished.lock().map(|finished| *finished).unwrap_or(true)
    }
}

// Publishes completion even when the entry function unwinds.
struct FinishOnDrop(Arc<Completion>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// An OS thread with a liveness flag that flips to "finished" exactly once,
/// right after its entry function returns.
pub struct Thread {
    name: String,
    handle: JoinHandle<()>,
    completion: Arc<Completion>,
}

impl Thread {
    pub fn spawn<F>(name: impl Into<String>, entry: F) -> Result<Thread, ThreadError>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let completion = Arc::new(Completion::default());
        let guard = FinishOnDrop(completion.clone());
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = guard;
                entry();
            })
            .map_err(|source| ThreadError::Spawn {
                name: name.clone(),
                source,
            })?;
        log::trace!("Spawned thread {}", name);
        Ok(Thread {
            name,
            handle,
            completion,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !self.completion.is_finished()
    }

    /// Waits at most `millis` for the thread to finish. Returns `true` once
    /// the entry function has returned.
    pub fn wait_timeout(&self, millis: u64) -> Result<bool, ThreadError> {
        let finished = self.completion.finished.lock()?;
        let (finished, _) = self
            .completion
            .cond
            .wait_timeout_while(finished, millis, |finished| !*finished)?;
        Ok(*finished)
    }

    /// Blocks until the thread finishes and releases its handle.
    pub fn join(self) -> Result<(), ThreadError> {
        self.handle
            .join()
            .map_err(|_| ThreadError::Panicked(self.name))
    }
}

pub fn sleep(millis: u64) {
    thread::sleep(Duration::from_millis(millis));
}
