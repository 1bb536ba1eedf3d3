use thiserror::Error;

/// Errors surfaced by the document store and the tracker operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Subscription setup or live-update delivery failed.
    #[error("Could not connect to collection '{collection}': {message}")]
    RemoteConnection { collection: String, message: String },

    /// A create, update or delete was rejected by the store.
    #[error("Write to '{collection}' failed: {message}")]
    RemoteWrite { collection: String, message: String },

    /// A client-side precondition was violated before any write was issued.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn connection(collection: &str, message: impl std::fmt::Display) -> Self {
        Self::RemoteConnection {
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn write(collection: &str, message: impl std::fmt::Display) -> Self {
        Self::RemoteWrite {
            collection: collection.to_string(),
            message: message.to_string(),
        }
    }

    /// The underlying failure without the collection prefix.
    pub(crate) fn reason(&self) -> String {
        match self {
            Self::RemoteConnection { message, .. } | Self::RemoteWrite { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }

    /// Guidance shown to the user next to the failure.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::RemoteConnection { .. } => Some(
                "Check that the database file is readable and that the collection is allowed by the store's access rules.",
            ),
            Self::RemoteWrite { .. } => {
                Some("The change was not saved. The current state shown is still authoritative.")
            }
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
