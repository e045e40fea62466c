//! The executable body of a migration edge.

use crate::error::BoxError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;

/// A schema change applied through a live connection.
///
/// Operations are built by the discovery side and handed to the core as
/// opaque values; the core only ever calls [`Operation::run`].
#[async_trait]
pub trait Operation<C: Send + ?Sized>: Send + Sync {
    /// Apply the change.
    async fn run(&self, conn: &mut C) -> Result<(), BoxError>;

    /// Short description used in logs and plan listings.
    fn describe(&self) -> String {
        String::from("<operation>")
    }
}

type OperationFn<C> = dyn for<'c> Fn(&'c mut C) -> BoxFuture<'c, Result<(), BoxError>> + Send + Sync;

/// Operation backed by a closure returning a boxed future.
///
/// ```rust
/// use futures::FutureExt;
/// use trek_core::FnOperation;
///
/// let op = FnOperation::new("append", |log: &mut Vec<String>| {
///     async move {
///         log.push("created".to_string());
///         Ok::<(), trek_core::BoxError>(())
///     }
///     .boxed()
/// });
/// # let _ = op;
/// ```
pub struct FnOperation<C: Send + ?Sized> {
    name: String,
    func: Box<OperationFn<C>>,
}

impl<C: Send + ?Sized> FnOperation<C> {
    /// Wrap a closure.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: for<'c> Fn(&'c mut C) -> BoxFuture<'c, Result<(), BoxError>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl<C: Send + ?Sized> fmt::Debug for FnOperation<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<C: Send + ?Sized> Operation<C> for FnOperation<C> {
    async fn run(&self, conn: &mut C) -> Result<(), BoxError> {
        (self.func)(conn).await
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
