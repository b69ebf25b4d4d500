//! Crate-wide error type.
//!
//! Each subsystem keeps its own error enum; this one wraps them all so the
//! boot path in `main` has a single type to propagate.

use core::fmt;

use crate::app::ports::ConfigError;
use crate::rpc::auth::AuthError;
use crate::rpc::engine::RegistryError;
use crate::rpc::pack::PackError;

#[derive(Debug)]
pub enum Error {
    /// Encoding or decoding a packed value failed.
    Pack(PackError),
    /// A signature trailer was rejected or a key is unusable.
    Auth(AuthError),
    /// The resource table is full.
    Registry(RegistryError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pack(e) => write!(f, "pack: {e}"),
            Self::Auth(e) => write!(f, "auth: {e}"),
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<PackError> for Error {
    fn from(e: PackError) -> Self {
        Self::Pack(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
