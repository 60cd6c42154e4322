use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the gateway operations
///
/// Deliberately small: delivery outcomes are reported through
/// `DeliveryResult` rather than errors, transient channel failures are
/// absorbed by the dispatcher's retry loop, and store failures degrade
/// durability without surfacing here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("target not found")]
    NotFound,

    #[error("configuration error: {0}")]
    Config(String),
}
