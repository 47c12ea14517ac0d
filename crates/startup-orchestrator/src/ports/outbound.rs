//! Outbound ports: what the orchestrator calls into.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Error type returned by a service's start or stop routine.
pub type ServiceError = Box<dyn std::error::Error + Send + Sync>;

/// A service the orchestrator can bring up.
///
/// Only `start` is required. The routine is awaited once its dependencies
/// are Running; its error message is recorded verbatim as `last_error`.
#[async_trait]
pub trait Startable: Send + Sync {
    /// Bring the service up.
    async fn start(&self) -> Result<(), ServiceError>;

    /// Release resources during shutdown. Defaults to a no-op.
    async fn stop(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Adapter turning an async closure into a [`Startable`].
///
/// ```rust,ignore
/// let routine = FnStartable::new(|| async { Ok(()) });
/// ```
pub struct FnStartable<F> {
    start: F,
}

impl<F, Fut> FnStartable<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    pub fn new(start: F) -> Self {
        Self { start }
    }

    /// Wrap into the trait object the registration API takes.
    pub fn shared(start: F) -> Arc<dyn Startable> {
        Arc::new(Self::new(start))
    }
}

#[async_trait]
impl<F, Fut> Startable for FnStartable<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ServiceError>> + Send + 'static,
{
    async fn start(&self) -> Result<(), ServiceError> {
        (self.start)().await
    }
}
