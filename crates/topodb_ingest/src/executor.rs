//! Transactional executor with bounded retry on transient contention.

use std::thread;

use rusqlite::{Connection, TransactionBehavior};
use topodb_schema::SchemaRegistry;

use crate::config::IngestConfig;
use crate::error::{self, IngestError, IngestResult};
use crate::plan::DeferredOp;
use crate::result::OperationResult;

/// Observer of retry decisions, for the caller's counters.
pub trait RetryListener {
    /// Called after a failed attempt, before the backoff sleep.
    fn on_retry(&self, attempt: u32, max_attempts: u32, cause: &rusqlite::Error);
}

/// Runs a deferred-operation plan inside one transaction.
///
/// An empty plan is a no-op. Otherwise each attempt opens an immediate
/// (write-intent) transaction, applies every operation in order and
/// commits. Transient contention rolls the attempt back and retries with a
/// fixed backoff, up to `config.max_retry_attempts` total attempts; any
/// other failure aborts immediately. Either the whole plan commits or
/// nothing of it is visible.
pub fn execute(
    conn: &mut Connection,
    registry: &SchemaRegistry,
    ops: &[DeferredOp],
    config: &IngestConfig,
    listener: Option<&dyn RetryListener>,
) -> IngestResult<Vec<OperationResult>> {
    if ops.is_empty() {
        return Ok(Vec::new());
    }
    run_with_retry(config, listener, || run_attempt(conn, registry, ops))
}

/// The retry loop, separated from transaction handling so tests can drive
/// it with an injected attempt function.
pub(crate) fn run_with_retry<F>(
    config: &IngestConfig,
    listener: Option<&dyn RetryListener>,
    mut attempt_fn: F,
) -> IngestResult<Vec<OperationResult>>
where
    F: FnMut() -> IngestResult<Vec<OperationResult>>,
{
    let max_attempts = config.max_retry_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match attempt_fn() {
            Ok(results) => return Ok(results),
            Err(IngestError::Database(cause)) if error::is_transient(&cause) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        attempts = attempt,
                        "reached the maximum number of retry attempts for transient contention"
                    );
                    return Err(IngestError::ContentionExhausted { attempts: attempt });
                }
                tracing::warn!(
                    attempt,
                    max_attempts,
                    cause = %cause,
                    "transient contention during batch transaction, retrying"
                );
                if let Some(listener) = listener {
                    listener.on_retry(attempt, max_attempts, &cause);
                }
                thread::sleep(config.retry_backoff);
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}

fn run_attempt(
    conn: &mut Connection,
    registry: &SchemaRegistry,
    ops: &[DeferredOp],
) -> IngestResult<Vec<OperationResult>> {
    // Write intent up front: concurrent batches serialize on the writer
    // lock here instead of deadlocking mid-transaction.
    let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut results = Vec::new();
    for op in ops {
        op.apply(&mut tx, registry, &mut results)?;
    }
    tx.commit()?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;
    use rusqlite::ErrorCode;
    use std::cell::Cell;
    use std::time::Duration;

    struct CountingListener {
        retries: Cell<u32>,
    }

    impl RetryListener for CountingListener {
        fn on_retry(&self, _attempt: u32, _max_attempts: u32, _cause: &rusqlite::Error) {
            self.retries.set(self.retries.get() + 1);
        }
    }

    fn busy_error() -> IngestError {
        IngestError::Database(rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ErrorCode::DatabaseBusy,
                extended_code: 5,
            },
            Some("database is locked".into()),
        ))
    }

    fn fast_config(attempts: u32) -> IngestConfig {
        IngestConfig::new()
            .max_retry_attempts(attempts)
            .retry_backoff(Duration::from_millis(1))
    }

    #[test]
    fn transient_failure_then_success_is_invisible() {
        let listener = CountingListener {
            retries: Cell::new(0),
        };
        let attempts = Cell::new(0u32);
        let results = run_with_retry(&fast_config(3), Some(&listener), || {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                Err(busy_error())
            } else {
                Ok(vec![OperationResult::deletion("node-1", "Node")])
            }
        })
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(attempts.get(), 2);
        assert_eq!(listener.retries.get(), 1);
    }

    #[test]
    fn exhausted_retries_surface_as_contention() {
        let attempts = Cell::new(0u32);
        let err = run_with_retry(&fast_config(3), None, || {
            attempts.set(attempts.get() + 1);
            Err(busy_error())
        })
        .unwrap_err();

        assert!(matches!(
            err,
            IngestError::ContentionExhausted { attempts: 3 }
        ));
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn validation_errors_are_not_retried() {
        let attempts = Cell::new(0u32);
        let err = run_with_retry(&fast_config(3), None, || {
            attempts.set(attempts.get() + 1);
            Err(IngestError::cardinality_violation("over the limit"))
        })
        .unwrap_err();

        assert!(matches!(
            err,
            IngestError::MaximumCardinalityViolation { .. }
        ));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn empty_plan_is_a_no_op() {
        let registry = topodb_schema::SchemaRegistry::builder().build().unwrap();
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let results = execute(&mut conn, &registry, &[], &IngestConfig::default(), None).unwrap();
        assert!(results.is_empty());
    }
}
