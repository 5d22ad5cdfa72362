//! Unit of work with post-commit hooks.
//!
//! A [`UnitOfWork`] owns one storage transaction and an ordered list of
//! deferred actions. The actions run only after the storage engine has
//! confirmed the commit. A rollback, a failed commit, or dropping the unit of
//! work discards them unrun.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::error::DomainError;

/// Deferred action registered with [`UnitOfWork::after_commit`].
pub type PostCommitHook = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A storage transaction that can be committed or rolled back exactly once.
#[async_trait]
pub trait Transaction: Send {
    /// Durably commits the work done in this transaction.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discards the work done in this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

/// One transaction plus the actions to run once it has committed.
pub struct UnitOfWork<T: Transaction + ?Sized> {
    tx: Box<T>,
    hooks: Vec<PostCommitHook>,
}

impl<T: Transaction + ?Sized> UnitOfWork<T> {
    /// Wraps an open transaction.
    #[must_use]
    pub fn new(tx: Box<T>) -> Self {
        Self {
            tx,
            hooks: Vec::new(),
        }
    }

    /// The underlying transaction, for issuing reads and writes.
    pub fn tx(&mut self) -> &mut T {
        &mut self.tx
    }

    /// Registers `hook` to run after a successful commit.
    ///
    /// The future is not polled before then; anything it computes (such as a
    /// timestamp) is computed after the commit.
    pub fn after_commit<F>(&mut self, hook: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.hooks.push(Box::pin(hook));
    }

    /// Number of registered hooks that have not run yet.
    #[must_use]
    pub fn pending_hooks(&self) -> usize {
        self.hooks.len()
    }

    /// Commits the transaction, then runs the hooks in registration order.
    ///
    /// # Errors
    ///
    /// Returns the commit error unchanged. No hook runs in that case.
    pub async fn commit(self) -> Result<(), DomainError> {
        let Self { tx, hooks } = self;
        tx.commit().await?;
        for hook in hooks {
            hook.await;
        }
        Ok(())
    }

    /// Rolls the transaction back and drops the hooks unrun.
    ///
    /// # Errors
    ///
    /// Returns the rollback error from the storage engine.
    pub async fn rollback(self) -> Result<(), DomainError> {
        let Self { tx, hooks } = self;
        drop(hooks);
        tx.rollback().await
    }
}

impl<T: Transaction + ?Sized> fmt::Debug for UnitOfWork<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("pending_hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    struct FakeTransaction {
        committed: Arc<AtomicBool>,
        fail_commit: bool,
    }

    #[async_trait]
    impl Transaction for FakeTransaction {
        async fn commit(self: Box<Self>) -> Result<(), DomainError> {
            if self.fail_commit {
                return Err(DomainError::Infrastructure("commit refused".into()));
            }
            self.committed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
            Ok(())
        }
    }

    fn unit_of_work(fail_commit: bool) -> (UnitOfWork<FakeTransaction>, Arc<AtomicBool>) {
        let committed = Arc::new(AtomicBool::new(false));
        let tx = FakeTransaction {
            committed: Arc::clone(&committed),
            fail_commit,
        };
        (UnitOfWork::new(Box::new(tx)), committed)
    }

    #[tokio::test]
    async fn test_hooks_run_after_commit_in_registration_order() {
        // Arrange
        let (mut uow, committed) = unit_of_work(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        for n in 1..=3 {
            let seen = Arc::clone(&seen);
            let committed = Arc::clone(&committed);
            uow.after_commit(async move {
                seen.lock()
                    .unwrap()
                    .push((n, committed.load(Ordering::SeqCst)));
            });
        }

        // Act
        uow.commit().await.unwrap();

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec![(1, true), (2, true), (3, true)]);
    }

    #[tokio::test]
    async fn test_hooks_do_not_run_when_commit_fails() {
        let (mut uow, _) = unit_of_work(true);
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        uow.after_commit(async move { flag.store(true, Ordering::SeqCst) });

        let result = uow.commit().await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_hooks_do_not_run_on_rollback_or_drop() {
        let ran = Arc::new(AtomicBool::new(false));

        let (mut rolled_back, _) = unit_of_work(false);
        let flag = Arc::clone(&ran);
        rolled_back.after_commit(async move { flag.store(true, Ordering::SeqCst) });
        rolled_back.rollback().await.unwrap();

        let (mut dropped, _) = unit_of_work(false);
        let flag = Arc::clone(&ran);
        dropped.after_commit(async move { flag.store(true, Ordering::SeqCst) });
        assert_eq!(dropped.pending_hooks(), 1);
        drop(dropped);

        assert!(!ran.load(Ordering::SeqCst));
    }
}
