//! PostgreSQL transaction scope with savepoint-based nesting

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::indexing::{TransactionHost, TransactionScope};
use crate::{Error, Result};

/// Opens PostgreSQL transactions from a pool.
#[derive(Clone)]
pub struct PgTransactionHost {
    pool: PgPool,
}

impl PgTransactionHost {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TransactionHost for PgTransactionHost {
    type Scope = PgTransactionScope;

    async fn begin(&self) -> Result<PgTransactionScope> {
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        Ok(PgTransactionScope::new(tx))
    }
}

pub struct PgTransactionScope {
    tx: Option<Transaction<'static, Postgres>>,
    savepoints: Vec<String>,
    next_savepoint: u32,
}

impl PgTransactionScope {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Some(tx),
            savepoints: Vec::new(),
            next_savepoint: 1,
        }
    }

    fn tx_mut(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| Error::Transaction("Transaction already consumed".to_string()))
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        let tx = self.tx_mut()?;
        sqlx::query(sql)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    fn pop_savepoint(&mut self) -> Result<String> {
        self.savepoints
            .pop()
            .ok_or_else(|| Error::Transaction("No nested scope is open".to_string()))
    }

    /// Depth of currently open nested scopes.
    pub fn depth(&self) -> usize {
        self.savepoints.len()
    }
}

#[async_trait]
impl TransactionScope for PgTransactionScope {
    type Connection = PgConnection;

    fn connection(&mut self) -> Result<&mut PgConnection> {
        let tx = self.tx_mut()?;
        Ok(&mut **tx)
    }

    async fn begin_nested(&mut self) -> Result<()> {
        let name = format!("tessera_sp_{}", self.next_savepoint);
        self.execute(&format!("SAVEPOINT {}", name)).await?;
        self.next_savepoint += 1;
        self.savepoints.push(name);
        Ok(())
    }

    async fn complete_nested(&mut self) -> Result<()> {
        let name = self.pop_savepoint()?;
        self.execute(&format!("RELEASE SAVEPOINT {}", name)).await
    }

    async fn abort_nested(&mut self) -> Result<()> {
        let name = self.pop_savepoint()?;
        self.execute(&format!("ROLLBACK TO SAVEPOINT {}", name)).await
    }

    async fn commit(mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Transaction("Transaction already consumed".to_string()))?;
        tx.commit().await.map_err(Error::Database)
    }

    async fn rollback(mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Transaction("Transaction already consumed".to_string()))?;
        tx.rollback().await.map_err(Error::Database)
    }
}
