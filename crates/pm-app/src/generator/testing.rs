//! Test doubles for the generator seams.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use pm_core::{JobHandle, Notification, PollState, RemoteState, RemoteStatus};
use tokio::time::Instant;

use crate::generator::api::{ApiError, ModelApi};
use crate::generator::notify::{Notifier, NotifyError};
use crate::generator::poller::ProgressObserver;

/// Replays scripted status responses, then reports `processing` forever.
#[derive(Default)]
pub struct ScriptedApi {
    statuses: Mutex<VecDeque<Result<RemoteStatus, ApiError>>>,
    download: Option<String>,
    created: Option<String>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedApi {
    pub fn new(statuses: Vec<Result<RemoteStatus, ApiError>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Default::default()
        }
    }

    pub fn with_download(mut self, url: &str) -> Self {
        self.download = Some(url.to_string());
        self
    }

    pub fn with_created(mut self, job_id: &str) -> Self {
        self.created = Some(job_id.to_string());
        self
    }

    pub fn status_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelApi for ScriptedApi {
    async fn create_job(&self, _image_url: &str) -> Result<JobHandle, ApiError> {
        match &self.created {
            Some(id) => Ok(JobHandle::new(id.clone()).unwrap()),
            None => Err(ApiError::Api {
                status: 500,
                body: "create failed".to_string(),
            }),
        }
    }

    async fn check_status(&self, _job: &JobHandle) -> Result<RemoteStatus, ApiError> {
        self.calls.lock().unwrap().push(Instant::now());
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RemoteStatus::new(RemoteState::Processing)))
    }

    async fn download_url(&self, _job: &JobHandle) -> Result<String, ApiError> {
        self.download.clone().ok_or_else(|| ApiError::Api {
            status: 404,
            body: "no asset".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<PollState>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<PollState> {
        self.states.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<f32> {
        self.states().iter().map(|state| state.progress).collect()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_update(&self, state: &PollState) {
        self.states.lock().unwrap().push(state.clone());
    }
}
