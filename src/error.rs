use thiserror::Error;

/// Misuse of a deferred result's settlement or inspection API.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("deferred result is already settled")]
    AlreadySettled,
    #[error("deferred result is still pending")]
    Pending,
}
