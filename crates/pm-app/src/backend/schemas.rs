use serde::{Deserialize, Serialize};
use pm_core::JobHandle;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitJobRequest {
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobAccepted {
    pub job_id: String,
    /// True when the job is simulated and will resolve to the fallback model.
    pub demo: bool,
}

impl From<JobHandle> for JobAccepted {
    fn from(job: JobHandle) -> Self {
        Self {
            demo: job.is_demo(),
            job_id: job.as_str().to_string(),
        }
    }
}
