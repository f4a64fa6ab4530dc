use thiserror::Error;

/// Errors that can occur while constructing a [`crate::Dispatcher`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("dispatcher was constructed with no listeners")]
    NoListeners,
}

pub type Result<T> = std::result::Result<T, Error>;
