pub mod error;
pub mod ids;
pub mod state;

pub use error::{Result, StoreError};
pub use ids::{APP_ATTEMPT_PREFIX, APPLICATION_PREFIX, ApplicationAttemptId, ApplicationId, IdParseError};
pub use state::{
    ApplicationState, AttemptState, DelegationKey, DelegationTokenId, RecoveredState,
    SecretManagerState,
};
