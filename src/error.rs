//! Process-level failure classes
//!
//! Module errors stay specific to the module that raises them. The host and
//! target loops fold them into a [`LinkError`], which decides the exit code.

use crate::config::ConfigError;
use crate::controller::InputError;
use crate::pulse::PinError;
use crate::target::sink::SinkError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Wrong command line
    #[error("usage: {0}")]
    Usage(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A joystick, socket, GPIO line or device could not be opened
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("transmission failure: {0}")]
    TransmissionFailure(#[source] TransportError),

    #[error("sink failure: {0}")]
    Sink(#[from] SinkError),
}

impl LinkError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) => 3,
            Self::ResourceUnavailable(_) => 4,
            Self::TransmissionFailure(_) => 5,
            Self::Sink(_) => 6,
        }
    }

    pub fn resource(what: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::ResourceUnavailable(format!("{what}: {err}"))
    }
}

impl From<TransportError> for LinkError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Bind { .. } => Self::ResourceUnavailable(err.to_string()),
            other => Self::TransmissionFailure(other),
        }
    }
}

impl From<PinError> for LinkError {
    fn from(err: PinError) -> Self {
        Self::resource("gpio", err)
    }
}

impl From<InputError> for LinkError {
    fn from(err: InputError) -> Self {
        Self::resource("input", err)
    }
}
