pub mod error;
pub mod policy;
pub mod quota;
mod model_types;

pub use error::{PollerError, QuotaError};
pub use model_types::{
    JobHandle, Notification, NotificationVariant, PollState, PollStatus, RemoteState,
    RemoteStatus, DEMO_JOB_PREFIX,
};
pub use policy::PollPolicy;
pub use quota::ApiQuota;
