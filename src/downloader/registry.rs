//! Registry of active jobs keyed by name.

use crate::error::{Error, Result};
use crate::job::DownloadJob;
use crate::types::{Event, JobId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Active jobs, one per name
///
/// The lock is never held across an await point.
#[derive(Clone)]
pub(crate) struct JobRegistry {
    jobs: Arc<Mutex<HashMap<String, Arc<DownloadJob>>>>,
    event_tx: broadcast::Sender<Event>,
}

impl JobRegistry {
    pub(crate) fn new(event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            event_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<DownloadJob>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `job` under its name
    ///
    /// The returned lease removes the entry when dropped, unless the name was taken
    /// over by another job in between.
    pub(crate) fn register(&self, job: Arc<DownloadJob>) -> Result<RegistryLease> {
        let name = job.name().to_string();
        let id = job.id();

        let mut jobs = self.lock();
        if jobs.contains_key(&name) {
            return Err(Error::Duplicate(name));
        }
        jobs.insert(name.clone(), job);
        drop(jobs);

        tracing::debug!(job = %name, %id, "Registered job");
        Ok(RegistryLease {
            registry: self.clone(),
            name,
            id,
        })
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<Arc<DownloadJob>> {
        self.lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Remove `name` only while it still belongs to job `id`
    pub(crate) fn unregister(&self, name: &str, id: JobId) -> bool {
        let removed = {
            let mut jobs = self.lock();
            if jobs.get(name).is_some_and(|job| job.id() == id) {
                jobs.remove(name).is_some()
            } else {
                false
            }
        };
        if removed {
            self.removed(name);
        }
        removed
    }

    fn removed(&self, name: &str) {
        tracing::debug!(job = %name, "Unregistered job");
        self.event_tx
            .send(Event::Removed {
                name: name.to_string(),
            })
            .ok();
    }

    pub(crate) fn jobs(&self) -> Vec<Arc<DownloadJob>> {
        let mut jobs: Vec<_> = self.lock().values().cloned().collect();
        jobs.sort_by_key(|job| job.id());
        jobs
    }

    /// Remove and return every job
    pub(crate) fn drain(&self) -> Vec<Arc<DownloadJob>> {
        let drained: Vec<_> = self.lock().drain().collect();
        drained
            .into_iter()
            .map(|(name, job)| {
                self.removed(&name);
                job
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Keeps a registry entry alive; removes it on drop
pub(crate) struct RegistryLease {
    registry: JobRegistry,
    name: String,
    id: JobId,
}

impl Drop for RegistryLease {
    fn drop(&mut self) {
        self.registry.unregister(&self.name, self.id);
    }
}
