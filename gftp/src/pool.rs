use std::sync::Arc;

use crate::data_transfer::{TransferProgress, TransferState};
use crate::thread::{Mutex, Thread, ThreadError};

pub const FTP_MAX_DATA_THREADS: usize = 8;

pub type SharedProgress = Arc<Mutex<TransferProgress>>;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("all {0} data transfer slots are busy, try again later")]
    PoolExhausted(usize),
    #[error(transparent)]
    Thread(#[from] ThreadError),
}

#[derive(Default)]
struct Slot {
    thread: Option<Thread>,
    label: String,
    progress: SharedProgress,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    pub slot: usize,
    pub label: String,
    pub running: bool,
    pub progress: TransferProgress,
}

/// Fixed set of data transfer slots. A slot is free when it has no thread or
/// its thread has finished; finished threads are joined lazily when the slot
/// is reused.
pub struct DataThreadPool {
    slots: Vec<Slot>,
}

impl DataThreadPool {
    pub fn new(capacity: usize) -> DataThreadPool {
        DataThreadPool {
            slots: (0..capacity.max(1)).map(|_| Slot::default()).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn running(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.thread.as_ref().map_or(false, Thread::is_running))
            .count()
    }

    /// Finds a free slot without blocking.
    pub fn acquire(&mut self) -> Result<usize, ResourceError> {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.thread.as_ref().map_or(false, Thread::is_running))
            .ok_or(ResourceError::PoolExhausted(self.slots.len()))?;
        self.reap(index);
        Ok(index)
    }

    /// Runs `entry` on a new thread owning slot `index`, which must come from
    /// `acquire`.
    pub fn start<F>(
        &mut self,
        index: usize,
        label: &str,
        progress: SharedProgress,
        entry: F,
    ) -> Result<(), ResourceError>
    where
        F: FnOnce() + Send + 'static,
    {
        let thread = Thread::spawn(format!("gftp-data-{}", index), entry)?;
        let slot = &mut self.slots[index];
        slot.thread = Some(thread);
        slot.label = label.to_owned();
        slot.progress = progress;
        log::debug!("Slot {} now runs {}", index, label);
        Ok(())
    }

    pub fn reports(&self) -> Vec<TransferReport> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let thread = slot.thread.as_ref()?;
                let progress = slot.progress.lock().ok()?.clone();
                Some(TransferReport {
                    slot: index,
                    label: slot.label.clone(),
                    running: thread.is_running(),
                    progress,
                })
            })
            .collect()
    }

    /// Waits for every worker to finish.
    pub fn join_all(&mut self) {
        for index in 0..self.slots.len() {
            self.reap(index);
        }
    }

    fn reap(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        let thread = match slot.thread.take() {
            Some(thread) => thread,
            None => return,
        };
        if let Err(err) = thread.join() {
            log::error!("Transfer {} in slot {}: {}", slot.label, index, err);
            return;
        }
        match slot.progress.lock() {
            Ok(progress) => match &progress.error {
                Some(error) => log::warn!("Transfer {} failed: {}", slot.label, error),
                None if progress.state == TransferState::Closed => {
                    log::info!("Transfer {} finished, {} bytes", slot.label, progress.bytes)
                }
                None => log::warn!("Transfer {} stopped while {}", slot.label, progress.state),
            },
            Err(err) => log::error!("Transfer {} in slot {}: {}", slot.label, index, err),
        }
    }
}
