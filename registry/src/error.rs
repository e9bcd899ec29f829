use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Another caller is still waiting on this identifier.
    #[error("identifier {0:?} is already pending")]
    AlreadyPending(String),

    /// The record was removed without an outcome being delivered, e.g. the
    /// registry itself was dropped.
    #[error("signal for identifier {0:?} was dropped before an outcome arrived")]
    SignalDropped(String),
}
