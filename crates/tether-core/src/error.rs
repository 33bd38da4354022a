use thiserror::Error;

use crate::NodeIdentity;

/// Boxed error returned by user-supplied update handlers.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// The peer library rejected the construction inputs.
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("invalid construction input: {0}")]
    InvalidInput(String),
    #[error("peer library rejected construction: {0}")]
    Rejected(#[source] BoxError),
}

impl ConstructionError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}

/// A deferred mutation reached a peer that is released or busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StaleMutationError {
    #[error("peer {identity} has been released")]
    Released { identity: NodeIdentity },
    #[error("peer {identity} is already borrowed")]
    Busy { identity: NodeIdentity },
}

/// Subscribe or unsubscribe reached a peer mid-teardown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} `{event}` on peer {identity}: {cause}")]
pub struct SubscriptionError {
    pub action: &'static str,
    pub event: String,
    pub identity: NodeIdentity,
    #[source]
    pub cause: StaleMutationError,
}

/// An update handler failed while reconciling one field.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler for `{field}` failed: {source}")]
    Failed {
        field: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("peer unavailable while updating `{field}`: {source}")]
    PeerUnavailable {
        field: &'static str,
        #[source]
        source: StaleMutationError,
    },
}

impl HandlerError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Failed { field, .. } | Self::PeerUnavailable { field, .. } => field,
        }
    }
}

/// Failure surfaced to the embedding application by a render.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to construct peer for node {identity}: {source}")]
    Construction {
        identity: NodeIdentity,
        #[source]
        source: ConstructionError,
    },
    #[error("node {identity} was unmounted and cannot render again")]
    Unmounted { identity: NodeIdentity },
}

impl RenderError {
    pub fn identity(&self) -> NodeIdentity {
        match self {
            Self::Construction { identity, .. } | Self::Unmounted { identity } => *identity,
        }
    }
}
