use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollerError {
    #[error("job id must not be empty")]
    EmptyJobId,
    #[error("no model job has been started")]
    NoActiveJob,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error("daily API quota of {limit} calls exhausted")]
    DailyLimitReached { limit: u32 },
}
