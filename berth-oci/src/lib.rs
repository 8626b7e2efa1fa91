//! Container engine client.
//!
//! A thin wrapper around [`bollard`] exposing just the operations the
//! service lifecycle needs: image pull plus container create, start,
//! stop, restart, remove and port inspection. Errors carry optional
//! context and keep the engine's "no such container" condition
//! distinguishable through [`Error::is_not_found`] so that callers can
//! branch on a typed condition instead of matching message text.

use std::fmt;

use bollard::Docker;

pub use bollard::auth::DockerCredentials as Credentials;
pub use bollard::errors::Error as ConnectionError;

mod container;
pub use container::Container;

mod image;
pub use image::Image;

#[derive(Debug, Clone)]
pub struct Client(Docker);

impl Client {
    /// Connect to the daemon based on the `DOCKER_HOST` environment variable.
    pub async fn connect() -> Result<Self> {
        let inner = Docker::connect_with_defaults()?;

        // Bollard doesn't actually connect with the `connect_*` call.
        // Do a /ping to ensure we can connect before proceeding.
        inner
            .ping()
            .await
            .map_err(Error::with_context("failed to connect to daemon"))?;

        Ok(Self(inner))
    }

    fn inner(&self) -> &Docker {
        &self.0
    }

    /// Exposes methods to work with images.
    #[inline]
    pub fn image(&self) -> Image<'_> {
        Image::new(self)
    }

    /// Exposes methods to work with containers.
    #[inline]
    pub fn container(&self) -> Container<'_> {
        Container::new(self)
    }
}

#[doc(hidden)]
type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
enum ClientError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Unexpected(#[from] BoxError),
}

#[derive(Debug, thiserror::Error)]
pub struct Error {
    context: Option<String>,
    source: ClientError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = &self.context {
            c.fmt(f)?;
            ": ".fmt(f)?;
        }
        self.source.fmt(f)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[inline]
    fn new(source: ClientError, context: Option<String>) -> Self {
        Self { source, context }
    }

    /// Create an ClientError::Unexpected from an input error
    pub(crate) fn unexpected<E: Into<BoxError>>(error: E) -> Self {
        Self {
            source: ClientError::Unexpected(error.into()),
            context: None,
        }
    }

    /// Returns an `Error` partial constructor with the given message as context.
    #[inline]
    pub fn with_context(msg: &'static str) -> impl FnOnce(ConnectionError) -> Self {
        move |source| Error {
            source: source.into(),
            context: Some(msg.to_owned()),
        }
    }

    /// Assigns context to this error.
    #[inline]
    pub fn context(mut self, msg: String) -> Self {
        self.context = Some(msg);
        self
    }

    /// Whether the engine reported the referenced object as absent.
    ///
    /// This maps the daemon's 404 responses, so "no such container" and
    /// "no such image" conditions can be handled without inspecting the
    /// error message.
    pub fn is_not_found(&self) -> bool {
        matches!(
            &self.source,
            ClientError::Connection(ConnectionError::DockerResponseServerError {
                status_code: 404,
                ..
            })
        )
    }
}

impl From<ConnectionError> for Error {
    #[inline]
    fn from(value: ConnectionError) -> Self {
        Self::new(value.into(), None)
    }
}

impl From<BoxError> for Error {
    #[inline]
    fn from(value: BoxError) -> Self {
        Self::new(value.into(), None)
    }
}

impl From<&str> for Error {
    #[inline]
    fn from(value: &str) -> Self {
        Error::unexpected(value)
    }
}

impl From<String> for Error {
    #[inline]
    fn from(value: String) -> Self {
        Error::unexpected(value)
    }
}

/// Adds methods to [`Result`][std::result::Result] to associate extra context with an [Error].
pub trait WithContext<T>: Sized {
    /// Associates extra context with the [Error], if `self` is [Err].
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Associates extra context with the [Error], if `self` is [Err].
    /// To provide a [String] as context, potentially with formatting, use
    /// [WithContext::with_context].
    #[inline]
    fn context(self, msg: &'static str) -> Result<T> {
        self.with_context(|| msg.to_owned())
    }
}

impl<T> WithContext<T> for Result<T> {
    #[inline]
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| err.context(f()))
    }
}
