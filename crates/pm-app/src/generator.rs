use std::sync::Arc;

use pm_core::{ApiQuota, JobHandle, Notification, PollPolicy, PollState, PollerError};
use tokio::sync::watch;

use crate::config::ModelApiConfig;
use crate::error::AppError;
use crate::generator::api::{HttpModelApi, ModelApi, OfflineApi};
use crate::generator::notify::Notifier;
use crate::generator::api::ApiError;
use crate::generator::poller::{ModelJobPoller, ProgressObserver};

pub mod api;
pub mod notify;
pub mod poller;
#[cfg(test)]
pub(crate) mod testing;

/// Entry point for everything that needs a property model generated.
pub struct Generator {
    api: Option<Arc<dyn ModelApi>>,
    notifier: Arc<dyn Notifier>,
    poller: ModelJobPoller,
}

impl Generator {
    /// `api` is `None` when no generation service is configured; every
    /// submission then runs as a demo job.
    pub fn new(
        api: Option<Arc<dyn ModelApi>>,
        notifier: Arc<dyn Notifier>,
        policy: PollPolicy,
    ) -> Self {
        Self::build(api, notifier, policy, None)
    }

    /// Like [`Generator::new`], with `observer` seeing every progress update.
    pub fn with_observer(
        api: Option<Arc<dyn ModelApi>>,
        notifier: Arc<dyn Notifier>,
        policy: PollPolicy,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self::build(api, notifier, policy, Some(observer))
    }

    fn build(
        api: Option<Arc<dyn ModelApi>>,
        notifier: Arc<dyn Notifier>,
        policy: PollPolicy,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Self {
        let poll_api = api.clone().unwrap_or_else(|| Arc::new(OfflineApi));
        let poller = match observer {
            Some(observer) => {
                ModelJobPoller::with_observer(poll_api, notifier.clone(), policy, observer)
            }
            None => ModelJobPoller::new(poll_api, notifier.clone(), policy),
        };

        Self {
            api,
            notifier,
            poller,
        }
    }

    pub fn from_config(
        config: &ModelApiConfig,
        policy: PollPolicy,
        notifier: Arc<dyn Notifier>,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<Self, ApiError> {
        let api = match &config.base_url {
            Some(base_url) => {
                let quota = Arc::new(ApiQuota::new(config.daily_limit, config.min_interval));
                let api = HttpModelApi::new(base_url, config.api_key.clone(), quota)?;
                Some(Arc::new(api) as Arc<dyn ModelApi>)
            }
            None => {
                tracing::warn!("MODEL_API_URL not set, model generation runs in demo mode");
                None
            }
        };

        Ok(Self::build(api, notifier, policy, observer))
    }

    /// Request a model for the image at `image_url` and start polling it.
    ///
    /// Falls back to a demo job when the service is unavailable, so the
    /// caller always gets a job to watch.
    pub async fn submit(&self, image_url: &str) -> Result<JobHandle, AppError> {
        if image_url.trim().is_empty() {
            return Err(AppError::InvalidRequest("image_url must not be empty".to_string()));
        }

        let job = match &self.api {
            None => JobHandle::demo(),
            Some(api) => match api.create_job(image_url).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to create model job, using demo job");
                    if let Err(e) = self.notifier.notify(Notification::failure(
                        "3D model service unavailable",
                        "Showing a demo model while the service is unavailable.",
                    )) {
                        tracing::warn!(error = %e, "Failed to deliver notification");
                    }
                    JobHandle::demo()
                }
            },
        };

        Ok(self.poller.start(job.as_str())?)
    }

    /// Poll a job that was created elsewhere.
    pub fn track(&self, job_id: &str) -> Result<JobHandle, PollerError> {
        self.poller.start(job_id)
    }

    pub fn refresh(&self) -> Result<(), PollerError> {
        self.poller.refresh()
    }

    pub fn state(&self) -> PollState {
        self.poller.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.poller.subscribe()
    }
}
