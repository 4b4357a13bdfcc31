use std::fmt;

use clockify_core::Aggregate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::HttpStatus(code) => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    InvalidBody,
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::InvalidBody => write!(f, "invalid response body"),
            FailureKind::Decode => write!(f, "unexpected record shape"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// A listing a decision depends on stopped before its natural end.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{resource} listing incomplete: {reason}")]
pub struct IncompleteListing {
    pub resource: String,
    pub reason: String,
}

impl IncompleteListing {
    pub fn check<T>(resource: &str, listing: &Aggregate<T>) -> Result<(), Self> {
        if listing.is_complete() {
            return Ok(());
        }
        Err(Self {
            resource: resource.to_string(),
            reason: listing.stop.to_string(),
        })
    }
}
