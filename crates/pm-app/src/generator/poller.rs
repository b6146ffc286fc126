//! Drives one remote model-generation job to a terminal outcome.
//!
//! [`ModelJobPoller`] owns the [`PollState`] of a single active job. Each
//! call to [`ModelJobPoller::start`] or [`ModelJobPoller::refresh`] bumps an
//! epoch counter and spawns one tokio task for the job. The task checks the
//! epoch under the same lock it publishes with, so a superseded task can
//! never write over the state of the job that replaced it.
//!
//! Remote failures never surface as errors: a failed job, a transport error
//! or an exhausted attempt budget all end in `Completed` with the fallback
//! asset after a short simulated ramp.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use pm_core::{
    JobHandle, Notification, PollPolicy, PollState, PollStatus, PollerError, RemoteState,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::generator::api::ModelApi;
use crate::generator::notify::Notifier;

/// Receives every published snapshot, in order.
///
/// Called while the poller's state lock is held, so implementations must
/// not call back into [`ModelJobPoller::start`] or [`ModelJobPoller::refresh`].
pub trait ProgressObserver: Send + Sync {
    fn on_update(&self, state: &PollState);
}

/// Returned by the job task once its epoch has been superseded.
#[derive(Debug)]
struct Superseded;

pub struct ModelJobPoller {
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveJob>>,
}

struct ActiveJob {
    job: JobHandle,
    task: JoinHandle<()>,
}

struct Shared {
    api: Arc<dyn ModelApi>,
    notifier: Arc<dyn Notifier>,
    observer: Option<Arc<dyn ProgressObserver>>,
    policy: PollPolicy,
    epoch: Mutex<u64>,
    state: watch::Sender<PollState>,
}

impl ModelJobPoller {
    pub fn new(api: Arc<dyn ModelApi>, notifier: Arc<dyn Notifier>, policy: PollPolicy) -> Self {
        Self::build(api, notifier, policy, None)
    }

    pub fn with_observer(
        api: Arc<dyn ModelApi>,
        notifier: Arc<dyn Notifier>,
        policy: PollPolicy,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self::build(api, notifier, policy, Some(observer))
    }

    fn build(
        api: Arc<dyn ModelApi>,
        notifier: Arc<dyn Notifier>,
        policy: PollPolicy,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Self {
        let (state, _) = watch::channel(PollState::idle());
        Self {
            shared: Arc::new(Shared {
                api,
                notifier,
                observer,
                policy,
                epoch: Mutex::new(0),
                state,
            }),
            active: Mutex::new(None),
        }
    }

    /// Reset state and begin polling `job_id`, superseding any current job.
    ///
    /// An empty id is rejected without touching the current state. Must be
    /// called from within a tokio runtime.
    pub fn start(&self, job_id: &str) -> Result<JobHandle, PollerError> {
        let job = JobHandle::new(job_id)?;
        self.start_job(job.clone());
        Ok(job)
    }

    fn start_job(&self, job: JobHandle) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.task.abort();
        }

        let epoch = self.shared.arm(&job);
        tracing::info!(job_id = %job, epoch, "Polling model job");

        let shared = Arc::clone(&self.shared);
        let task_job = job.clone();
        let task = tokio::spawn(async move { shared.run(task_job, epoch).await });

        *active = Some(ActiveJob { job, task });
    }

    /// Re-run the protocol from scratch for the current job.
    pub fn refresh(&self) -> Result<(), PollerError> {
        let job = self.current_job().ok_or(PollerError::NoActiveJob)?;
        self.start_job(job);
        Ok(())
    }

    pub fn current_job(&self) -> Option<JobHandle> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|active| active.job.clone())
    }

    pub fn state(&self) -> PollState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.shared.state.subscribe()
    }
}

impl Drop for ModelJobPoller {
    fn drop(&mut self) {
        let active = self.active.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = active.take() {
            active.task.abort();
        }
    }
}

impl Shared {
    /// Start a new epoch for `job` and publish its fresh processing state.
    fn arm(&self, job: &JobHandle) -> u64 {
        let mut epoch = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;

        let fresh = PollState::processing(job);
        self.state.send_replace(fresh.clone());
        self.observe(&fresh);

        *epoch
    }

    fn publish(
        &self,
        epoch: u64,
        update: impl FnOnce(&mut PollState),
    ) -> Result<PollState, Superseded> {
        let current = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != epoch {
            return Err(Superseded);
        }

        self.state.send_modify(update);
        let snapshot = self.state.borrow().clone();
        self.observe(&snapshot);

        Ok(snapshot)
    }

    fn ensure_current(&self, epoch: u64) -> Result<(), Superseded> {
        let current = self.epoch.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == epoch { Ok(()) } else { Err(Superseded) }
    }

    fn observe(&self, snapshot: &PollState) {
        if let Some(observer) = &self.observer {
            observer.on_update(snapshot);
        }
    }

    fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(notification) {
            tracing::warn!(error = %e, "Failed to deliver notification");
        }
    }

    async fn run(self: Arc<Self>, job: JobHandle, epoch: u64) {
        let outcome = if job.is_demo() {
            self.simulate(&job, epoch).await
        } else {
            self.poll_remote(&job, epoch).await
        };

        if outcome.is_err() {
            tracing::debug!(job_id = %job, epoch, "Superseded model job stopped");
        }
    }

    async fn simulate(&self, job: &JobHandle, epoch: u64) -> Result<(), Superseded> {
        tracing::info!(job_id = %job, "Simulating demo model job");
        self.ramp(epoch, self.policy.demo_duration).await?;
        self.complete(epoch, self.policy.fallback_url.clone())?;
        Ok(())
    }

    async fn poll_remote(&self, job: &JobHandle, epoch: u64) -> Result<(), Superseded> {
        let mut attempt = 0u32;

        loop {
            self.ensure_current(epoch)?;

            let status = match self.api.check_status(job).await {
                Ok(status) => status,
                Err(e) => return self.fall_back(job, epoch, e.to_string()).await,
            };

            if status.state.is_in_progress() {
                let delay = self.policy.delay_for(attempt);
                let current = self.state.borrow().progress;
                let progress = self.policy.advance(current, attempt);
                attempt += 1;

                self.publish(epoch, |state| {
                    state.progress = progress;
                    state.attempt = attempt;
                })?;

                if self.policy.attempts_exhausted(attempt) {
                    let reason = format!("gave up after {attempt} status checks");
                    return self.fall_back(job, epoch, reason).await;
                }

                tracing::debug!(
                    job_id = %job,
                    attempt,
                    remote_state = ?status.state,
                    remote_progress = ?status.progress,
                    delay_ms = delay.as_millis() as u64,
                    "Model job still processing",
                );
                tokio::time::sleep(delay).await;
            } else if status.state == RemoteState::Completed {
                return self.finish_remote(job, epoch).await;
            } else {
                let reason = status
                    .error
                    .unwrap_or_else(|| "remote model generation failed".to_string());
                return self.fall_back(job, epoch, reason).await;
            }
        }
    }

    async fn finish_remote(&self, job: &JobHandle, epoch: u64) -> Result<(), Superseded> {
        match self.api.download_url(job).await {
            Ok(url) => {
                tracing::info!(job_id = %job, url = %url, "Model job completed");
                self.complete(epoch, url)?;
                self.notify(Notification::success(
                    "3D model ready",
                    "Your property model has been generated.",
                ));
                Ok(())
            }
            Err(e) => self.fall_back(job, epoch, e.to_string()).await,
        }
    }

    /// Mark the job failed, tell the user, then substitute the fallback asset.
    async fn fall_back(
        &self,
        job: &JobHandle,
        epoch: u64,
        reason: String,
    ) -> Result<(), Superseded> {
        tracing::warn!(
            job_id = %job,
            error = %reason,
            "Model generation failed, using fallback model",
        );

        self.publish(epoch, |state| {
            state.status = PollStatus::Failed;
            state.last_error = Some(reason);
        })?;
        self.notify(Notification::failure(
            "3D model generation failed",
            "We couldn't generate your model, so a demo model is shown instead.",
        ));

        self.ramp(epoch, self.policy.fallback_duration).await?;
        self.complete(epoch, self.policy.fallback_url.clone())?;
        Ok(())
    }

    async fn ramp(&self, epoch: u64, total: Duration) -> Result<(), Superseded> {
        let step = self.policy.step_delay(total);
        let from = self.state.borrow().progress;

        for progress in self.policy.ramp(from) {
            tokio::time::sleep(step).await;
            self.publish(epoch, |state| state.progress = progress)?;
        }
        Ok(())
    }

    fn complete(&self, epoch: u64, url: String) -> Result<(), Superseded> {
        self.publish(epoch, |state| {
            state.status = PollStatus::Completed;
            state.progress = 100.0;
            state.result_url = Some(url);
        })?;
        Ok(())
    }
}
