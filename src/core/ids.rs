use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Node names for applications start with this prefix.
pub const APPLICATION_PREFIX: &str = "application_";

/// Node names for application attempts start with this prefix.
pub const APP_ATTEMPT_PREFIX: &str = "appattempt_";

#[derive(Debug, Error)]
#[error("invalid {kind} id '{value}'")]
pub struct IdParseError {
    kind: &'static str,
    value: String,
}

impl IdParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Identifier of a submitted application.
///
/// Rendered as `application_<cluster_timestamp>_<id>`, which is also the name
/// of the application's node in the store namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId {
    cluster_timestamp: u64,
    id: u32,
}

impl ApplicationId {
    pub fn new(cluster_timestamp: u64, id: u32) -> Self {
        Self {
            cluster_timestamp,
            id,
        }
    }

    pub fn cluster_timestamp(&self) -> u64 {
        self.cluster_timestamp
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}_{:04}",
            APPLICATION_PREFIX, self.cluster_timestamp, self.id
        )
    }
}

impl FromStr for ApplicationId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(APPLICATION_PREFIX)
            .ok_or_else(|| IdParseError::new("application", s))?;
        let (ts, id) = rest
            .split_once('_')
            .ok_or_else(|| IdParseError::new("application", s))?;
        Ok(Self {
            cluster_timestamp: ts.parse().map_err(|_| IdParseError::new("application", s))?,
            id: id.parse().map_err(|_| IdParseError::new("application", s))?,
        })
    }
}

/// Identifier of one execution attempt of an application.
///
/// Rendered as `appattempt_<cluster_timestamp>_<id>_<attempt>`; the embedded
/// application id links the attempt node back to its parent application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationAttemptId {
    app_id: ApplicationId,
    attempt_id: u32,
}

impl ApplicationAttemptId {
    pub fn new(app_id: ApplicationId, attempt_id: u32) -> Self {
        Self { app_id, attempt_id }
    }

    pub fn app_id(&self) -> ApplicationId {
        self.app_id
    }

    pub fn attempt_id(&self) -> u32 {
        self.attempt_id
    }
}

impl fmt::Display for ApplicationAttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}_{:04}_{:06}",
            APP_ATTEMPT_PREFIX,
            self.app_id.cluster_timestamp,
            self.app_id.id,
            self.attempt_id
        )
    }
}

impl FromStr for ApplicationAttemptId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(APP_ATTEMPT_PREFIX)
            .ok_or_else(|| IdParseError::new("application attempt", s))?;
        let mut parts = rest.split('_');
        let (ts, id, attempt) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(ts), Some(id), Some(attempt), None) => (ts, id, attempt),
            _ => return Err(IdParseError::new("application attempt", s)),
        };
        let err = || IdParseError::new("application attempt", s);
        Ok(Self {
            app_id: ApplicationId {
                cluster_timestamp: ts.parse().map_err(|_| err())?,
                id: id.parse().map_err(|_| err())?,
            },
            attempt_id: attempt.parse().map_err(|_| err())?,
        })
    }
}
