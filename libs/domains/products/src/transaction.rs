//! Explicit unit-of-work handle shared by the repository backends.
//!
//! A [`TransactionScope`] is opened with `ProductRepository::begin`, threaded
//! through write calls as `&mut TransactionScope`, and finished exactly once
//! with [`TransactionScope::commit`] or [`TransactionScope::rollback`]. A scope
//! dropped before either call discards its staged writes.

use std::any::Any;

use async_trait::async_trait;

use crate::error::{ProductError, ProductResult};

/// Backend side of a transaction.
#[async_trait]
pub trait Transaction: Send + Any {
    async fn commit(self: Box<Self>) -> ProductResult<()>;

    async fn rollback(self: Box<Self>) -> ProductResult<()>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub struct TransactionScope {
    inner: Option<Box<dyn Transaction>>,
}

impl TransactionScope {
    pub fn new(transaction: impl Transaction) -> Self {
        Self {
            inner: Some(Box::new(transaction)),
        }
    }

    /// Borrow the backend transaction as its concrete type.
    ///
    /// Fails when the scope was opened by another backend.
    pub fn backend_mut<T: Transaction>(&mut self) -> ProductResult<&mut T> {
        let transaction = self
            .inner
            .as_mut()
            .ok_or_else(|| ProductError::Transaction("transaction already finished".into()))?;

        transaction.as_any_mut().downcast_mut::<T>().ok_or_else(|| {
            ProductError::Internal("transaction scope belongs to a different backend".into())
        })
    }

    pub async fn commit(mut self) -> ProductResult<()> {
        match self.inner.take() {
            Some(transaction) => transaction.commit().await,
            None => Err(ProductError::Transaction(
                "transaction already finished".into(),
            )),
        }
    }

    pub async fn rollback(mut self) -> ProductResult<()> {
        match self.inner.take() {
            Some(transaction) => transaction.rollback().await,
            None => Ok(()),
        }
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.inner.is_some() {
            tracing::warn!("Transaction scope dropped without commit, staged writes discarded");
        }
    }
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("active", &self.inner.is_some())
            .finish()
    }
}
