//! Result read side.
//!
//! Resolves result payloads for the boundary. A job row that exists while
//! its payload blob is gone means the TTL sweeper got there first; readers
//! see `Expired`, never a storage error.

use std::sync::Arc;

use binlift_domain::constants::storage::{decomp_result_key, translation_result_key};
use binlift_domain::entities::{DecompilationResult, Job, TranslationResult};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{BlobStore, JobRepository};
use binlift_domain::value_objects::JobId;

/// Read access to persisted results.
pub struct ResultsService {
    jobs: Arc<dyn JobRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl ResultsService {
    /// Create the service.
    #[must_use]
    pub fn new(jobs: Arc<dyn JobRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { jobs, blobs }
    }

    /// The job row itself (status, progress, timestamps).
    pub async fn job(&self, job_id: JobId) -> Result<Job> {
        self.jobs
            .get(&job_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("job {job_id}")))
    }

    /// The decompilation result payload.
    ///
    /// # Errors
    ///
    /// `NotFound` when the job does not exist or never produced a result;
    /// `Expired` when the payload outlived its TTL.
    pub async fn decompilation(&self, job_id: JobId) -> Result<DecompilationResult> {
        let job = self.job(job_id).await?;
        let key = decomp_result_key(&job_id);
        self.read_payload(&job, &key, "decompilation result").await
    }

    /// The translation result payload.
    ///
    /// Jobs submitted without a translation spec never produce one; those
    /// read as `NotFound` rather than `Expired`.
    pub async fn translation(&self, job_id: JobId) -> Result<TranslationResult> {
        let job = self.job(job_id).await?;
        if job.translation.is_none() {
            return Err(Error::not_found(format!(
                "translation result for job {job_id}"
            )));
        }
        let key = translation_result_key(&job_id);
        self.read_payload(&job, &key, "translation result").await
    }

    async fn read_payload<T: serde::de::DeserializeOwned>(
        &self,
        job: &Job,
        key: &str,
        what: &str,
    ) -> Result<T> {
        match self.blobs.get(key).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(Error::NotFound { .. }) => {
                // A completed job whose payload is gone was swept; anything
                // else simply never produced this payload.
                if job.status.is_terminal() && !job.result_present {
                    Err(Error::expired(format!("{what} for job {}", job.id)))
                } else {
                    Err(Error::not_found(format!("{what} for job {}", job.id)))
                }
            }
            Err(e) => Err(e),
        }
    }
}
