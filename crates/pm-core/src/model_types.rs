use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PollerError;

/// Job ids starting with this prefix never reach the remote service.
pub const DEMO_JOB_PREFIX: &str = "demo-";

/// Identifies one requested model-generation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Result<Self, PollerError> {
        let job_id = job_id.into();
        if job_id.trim().is_empty() {
            return Err(PollerError::EmptyJobId);
        }
        Ok(Self(job_id))
    }

    /// Mint a fresh synthetic job for offline/demo operation
    pub fn demo() -> Self {
        Self(format!("{}{}", DEMO_JOB_PREFIX, uuid::Uuid::new_v4().simple()))
    }

    pub fn is_demo(&self) -> bool {
        self.0.starts_with(DEMO_JOB_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Idle,
    Processing,
    Completed,
    Failed,
}

impl PollStatus {
    pub fn label(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Processing => "Generating 3D model",
            Self::Completed => "Model ready",
            Self::Failed => "Generation failed",
        }
    }
}

/// Snapshot of the poller's view of the current job.
///
/// `result_url` is set only once `status` is [`PollStatus::Completed`], and
/// `progress` only reaches 100 at that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollState {
    pub job_id: Option<String>,
    pub status: PollStatus,
    pub progress: f32,
    pub attempt: u32,
    pub result_url: Option<String>,
    pub last_error: Option<String>,
}

impl PollState {
    pub fn idle() -> Self {
        Self {
            job_id: None,
            status: PollStatus::Idle,
            progress: 0.0,
            attempt: 0,
            result_url: None,
            last_error: None,
        }
    }

    pub fn processing(job: &JobHandle) -> Self {
        Self {
            job_id: Some(job.as_str().to_string()),
            status: PollStatus::Processing,
            ..Self::idle()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == PollStatus::Completed
    }
}

impl Default for PollState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Job state as reported by the remote generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteState {
    Queued,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl RemoteState {
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub state: RemoteState,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RemoteStatus {
    pub fn new(state: RemoteState) -> Self {
        Self {
            state,
            progress: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Default,
    Destructive,
}

/// User-facing toast message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Default,
        }
    }

    pub fn failure(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }
}
