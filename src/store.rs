//! In-memory registry of jobs and uploaded files.
//!
//! The store is the only shared mutable state between job tasks. It is
//! injected as an `Arc<JobStore>` wherever needed — no ambient globals —
//! and guards its maps with `std::sync::RwLock`: every critical section is
//! a short map operation with no await point, so an async lock would buy
//! nothing.
//!
//! Mutation discipline: a job is written only by the orchestrator task that
//! owns its id, always as a full read-modify-write of the record. Entries
//! live for the process lifetime; there is no eviction and no persistence.

use crate::job::{FileId, FileRecord, Job, JobId};
use std::collections::HashMap;
use std::sync::RwLock;

/// Thread-safe map of job and file records, keyed by id.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    files: RwLock<HashMap<FileId, FileRecord>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uploaded file record.
    pub fn put_file(&self, record: FileRecord) {
        self.files.write().expect("file map poisoned").insert(record.id, record);
    }

    /// Look up a file record by id.
    pub fn get_file(&self, id: FileId) -> Option<FileRecord> {
        self.files.read().expect("file map poisoned").get(&id).cloned()
    }

    /// Remove a file record, returning it if present.
    pub fn delete_file(&self, id: FileId) -> Option<FileRecord> {
        self.files.write().expect("file map poisoned").remove(&id)
    }

    /// All registered file records, in unspecified order.
    pub fn list_files(&self) -> Vec<FileRecord> {
        self.files
            .read()
            .expect("file map poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Register a newly created job.
    pub fn put_job(&self, job: Job) {
        self.jobs.write().expect("job map poisoned").insert(job.id, job);
    }

    /// Look up a job by id.
    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.jobs.read().expect("job map poisoned").get(&id).cloned()
    }

    /// Replace the stored value for a job id.
    ///
    /// Callers must read-modify-write the full job so concurrent readers
    /// always observe a consistent record.
    pub fn update_job(&self, job: Job) {
        self.jobs.write().expect("job map poisoned").insert(job.id, job);
    }

    /// All registered jobs, in unspecified order.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.jobs
            .read()
            .expect("job map poisoned")
            .values()
            .cloned()
            .collect()
    }
}
