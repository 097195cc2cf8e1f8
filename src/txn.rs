//! Transaction Scope (§4.9): a unit-of-work holding one connection and one
//! transaction. Entering starts the transaction; a normal `commit()` ends it;
//! any other exit path — an error propagated with `?`, a panic — drops the
//! scope without committing, and `sea_orm::DatabaseTransaction`'s own `Drop`
//! issues the rollback. That RAII guarantee is what lets `AtomicCommitWriter`
//! (the §4.3 step-5 group: commit + manifest + schema) never partially
//! publish a commit without any explicit rollback bookkeeping here.

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::errors::Result;

pub struct TransactionScope {
    txn: DatabaseTransaction,
}

impl TransactionScope {
    pub async fn begin(pool: &DatabaseConnection) -> Result<Self> {
        let txn = pool.begin().await?;
        Ok(TransactionScope { txn })
    }

    /// The connection every repository operation inside this scope binds to.
    pub fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
