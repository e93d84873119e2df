//! Commit-or-rollback wrapper for multi-statement writes.
//!
//! Statements are staged on a [`Transaction`] and sent to SurrealDB as a
//! single `BEGIN TRANSACTION; ... COMMIT TRANSACTION;` query. If any
//! statement fails, SurrealDB cancels the whole block. Nothing is sent
//! until [`Transaction::commit`] runs, so dropping a transaction (or the
//! future driving it) before commit leaves the database untouched.

use bastion_core::error::{BastionError, BastionResult};
use serde_json::Value;
use surrealdb::{Connection, Surreal};
use tracing::{debug, warn};

use crate::error::{DbError, statement_error};

/// A staged set of statements with their parameter bindings.
///
/// Binding names share one namespace across all statements; binding the
/// same name twice keeps the last value.
#[derive(Debug, Default)]
pub struct Transaction {
    statements: Vec<String>,
    bindings: Vec<(String, Value)>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage one SurrealQL statement.
    pub fn statement(&mut self, sql: impl Into<String>) -> &mut Self {
        self.statements.push(sql.into());
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let name = name.into();
        self.bindings.retain(|(existing, _)| *existing != name);
        self.bindings.push((name, value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn render(&self) -> String {
        let mut sql = String::from("BEGIN TRANSACTION;\n");
        for statement in &self.statements {
            sql.push_str(statement.trim().trim_end_matches(';'));
            sql.push_str(";\n");
        }
        sql.push_str("COMMIT TRANSACTION;");
        sql
    }

    /// Execute every staged statement atomically.
    pub async fn commit<C: Connection>(self, db: &Surreal<C>) -> Result<(), DbError> {
        if self.is_empty() {
            return Ok(());
        }

        let statements = self.statements.len();
        let mut query = db.query(self.render());
        for binding in self.bindings {
            query = query.bind(binding);
        }

        query
            .await?
            .check()
            .map_err(|e| statement_error("transaction", e))?;

        debug!(statements, "transaction committed");
        Ok(())
    }
}

/// Stage statements with `build`, then commit them in one transaction.
///
/// Failures from either step are wrapped in
/// [`BastionError::Transaction`] with the inner cause preserved.
pub async fn run_in_transaction<C, F>(db: &Surreal<C>, build: F) -> BastionResult<()>
where
    C: Connection,
    F: FnOnce(&mut Transaction) -> BastionResult<()>,
{
    let mut tx = Transaction::new();
    if let Err(err) = build(&mut tx) {
        warn!(error = %err, "transaction aborted before commit");
        return Err(BastionError::Transaction(Box::new(err)));
    }

    tx.commit(db).await.map_err(|err| {
        warn!(error = %err, "transaction cancelled");
        BastionError::Transaction(Box::new(BastionError::from(err)))
    })
}

/// Whether a cancelled transaction lost a race against a concurrent
/// writer: a unique index already filled, or a commit conflict. Callers
/// that re-read and re-plan can try again.
pub fn lost_write_race(err: &BastionError) -> bool {
    let BastionError::Transaction(inner) = err else {
        return false;
    };
    if matches!(inner.downcast_ref::<BastionError>(), Some(BastionError::AlreadyExists { .. })) {
        return true;
    }
    let message = inner.to_string();
    ["already contains", "conflict", "failed transaction"]
        .iter()
        .any(|needle| message.contains(needle))
}
