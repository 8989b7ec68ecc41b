use super::scheduler::ComponentId;

/// Misuse of a [`Host`](super::Host).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("flush called while the host is already flushing")]
    FlushInProgress,

    #[error("{id} was asked to render while it is rendering")]
    Reentrant { id: ComponentId },

    #[error("flush exceeded {limit} renders; a component is invalidating itself on every render")]
    RenderLimitExceeded { limit: usize },
}
