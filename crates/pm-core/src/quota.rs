//! Call budget for the remote generation API.
//!
//! [`ApiQuota`] is handed to whatever issues remote calls. It tracks the
//! number of calls made on the current UTC day and the time of the last
//! call, so callers can both respect a daily cap and keep a minimum gap
//! between requests.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::QuotaError;

#[derive(Debug)]
pub struct ApiQuota {
    daily_limit: u32,
    min_interval: Duration,
    usage: Mutex<Usage>,
}

#[derive(Debug, Default)]
struct Usage {
    day: Option<NaiveDate>,
    count: u32,
    /// When the most recently reserved call is allowed to go out.
    last_slot: Option<DateTime<Utc>>,
}

impl ApiQuota {
    pub fn new(daily_limit: u32, min_interval: Duration) -> Self {
        Self {
            daily_limit,
            min_interval,
            usage: Mutex::new(Usage::default()),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(u32::MAX, Duration::ZERO)
    }

    pub fn reserve(&self) -> Result<Duration, QuotaError> {
        self.reserve_at(Utc::now())
    }

    /// Count one call made at `now` and return how long the caller should
    /// wait before issuing it.
    pub fn reserve_at(&self, now: DateTime<Utc>) -> Result<Duration, QuotaError> {
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);

        let today = now.date_naive();
        if usage.day != Some(today) {
            usage.day = Some(today);
            usage.count = 0;
        }

        if usage.count >= self.daily_limit {
            return Err(QuotaError::DailyLimitReached {
                limit: self.daily_limit,
            });
        }

        let min_interval =
            chrono::Duration::from_std(self.min_interval).unwrap_or(chrono::Duration::zero());
        let slot = match usage.last_slot {
            Some(last) => last
                .checked_add_signed(min_interval)
                .map_or(now, |earliest| now.max(earliest)),
            None => now,
        };

        usage.count += 1;
        usage.last_slot = Some(slot);

        Ok((slot - now).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn calls_today(&self) -> u32 {
        self.usage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .count
    }

    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }
}
