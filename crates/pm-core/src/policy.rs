//! Timing and progress rules for polling a model-generation job.
//!
//! Status checks back off exponentially: the wait before the next check is
//! `min(base_delay * multiplier^attempt, max_delay)`. Each in-progress
//! response advances the displayed progress by
//! `min(increment_base + increment_step * attempt, increment_cap)`, never
//! past [`PollPolicy::progress_ceiling`] until the job completes.

use std::time::Duration;

pub const DEFAULT_FALLBACK_MODEL_URL: &str = "/models/demo-property.glb";

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second status check.
    pub base_delay: Duration,
    /// Upper bound on the delay between checks.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each in-progress response.
    pub multiplier: f64,
    pub increment_base: f32,
    pub increment_step: f32,
    pub increment_cap: f32,
    /// Progress never exceeds this while the job is still processing.
    pub progress_ceiling: f32,
    /// Give up and substitute the fallback asset after this many checks.
    /// `None` polls until the remote reaches a terminal state.
    pub max_attempts: Option<u32>,
    /// Length of the simulated ramp for synthetic jobs.
    pub demo_duration: Duration,
    /// Length of the simulated ramp after a failure.
    pub fallback_duration: Duration,
    pub simulated_steps: u32,
    /// Simulated ramps stop short of this value until completion.
    pub simulated_target: f32,
    pub fallback_url: String,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 1.5,
            increment_base: 10.0,
            increment_step: 5.0,
            increment_cap: 20.0,
            progress_ceiling: 90.0,
            max_attempts: Some(40),
            demo_duration: Duration::from_millis(5000),
            fallback_duration: Duration::from_millis(1000),
            simulated_steps: 10,
            simulated_target: 95.0,
            fallback_url: DEFAULT_FALLBACK_MODEL_URL.to_string(),
        }
    }
}

impl PollPolicy {
    /// Wait before the status check that follows `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn increment_for(&self, attempt: u32) -> f32 {
        (self.increment_base + self.increment_step * attempt as f32).min(self.increment_cap)
    }

    /// Progress after an in-progress response on `attempt`.
    pub fn advance(&self, progress: f32, attempt: u32) -> f32 {
        let next = (progress + self.increment_for(attempt)).min(self.progress_ceiling);
        next.max(progress)
    }

    pub fn attempts_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }

    /// Progress values of a simulated ramp starting at `from`, one per step.
    pub fn ramp(&self, from: f32) -> Vec<f32> {
        let steps = self.simulated_steps.max(1);
        let target = self.simulated_target.max(from);
        (1..=steps)
            .map(|step| from + (target - from) * step as f32 / steps as f32)
            .collect()
    }

    pub fn step_delay(&self, total: Duration) -> Duration {
        total / self.simulated_steps.max(1)
    }
}
