//! Sequential compensation for work that spans systems without a shared
//! transaction.
//!
//! A [`Saga`] runs steps in order. Each completed step registers an undo
//! action built from its output. If a later step fails, the registered undo
//! actions run in reverse order before the failure is returned. Undo failures
//! are logged and never replace the original error.

use std::future::Future;
use std::pin::Pin;
use tracing::{info, warn};

/// Error type produced by compensating actions.
pub type CompensationError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by a compensating action.
pub type Compensation<'a> =
    Pin<Box<dyn Future<Output = Result<(), CompensationError>> + Send + 'a>>;

struct Undo<'a> {
    step: &'static str,
    action: Compensation<'a>,
}

/// An ordered sequence of steps that unwinds completed steps on failure.
pub struct Saga<'a> {
    name: String,
    completed: Vec<Undo<'a>>,
}

impl<'a> Saga<'a> {
    /// Creates an empty saga; `name` identifies it in logs.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completed: Vec::new(),
        }
    }

    /// Runs a step and, on success, registers `undo` built from its output.
    ///
    /// # Errors
    ///
    /// Returns the step's error after compensating every earlier step.
    pub async fn step<T, E, Fut, U>(
        &mut self,
        step: &'static str,
        run: Fut,
        undo: U,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        U: FnOnce(&T) -> Compensation<'a>,
    {
        match run.await {
            Ok(value) => {
                let action = undo(&value);
                self.completed.push(Undo { step, action });
                Ok(value)
            }
            Err(err) => {
                self.compensate(step).await;
                Err(err)
            }
        }
    }

    /// Runs the last step. On success the registered compensations are
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns the step's error after compensating every earlier step.
    pub async fn finish<T, E, Fut>(mut self, step: &'static str, run: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match run.await {
            Ok(value) => Ok(value),
            Err(err) => {
                self.compensate(step).await;
                Err(err)
            }
        }
    }

    async fn compensate(&mut self, failed_step: &'static str) {
        while let Some(undo) = self.completed.pop() {
            match undo.action.await {
                Ok(()) => info!(
                    saga = %self.name,
                    failed_step,
                    compensated_step = undo.step,
                    "compensated step"
                ),
                Err(err) => warn!(
                    saga = %self.name,
                    failed_step,
                    compensated_step = undo.step,
                    error = %err,
                    "compensation failed"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    fn record(journal: &Journal, entry: &str) {
        journal.lock().expect("journal lock").push(entry.to_owned());
    }

    fn undo_into(journal: &Journal, entry: &'static str) -> Compensation<'static> {
        let target = Arc::clone(journal);
        Box::pin(async move {
            record(&target, entry);
            Ok(())
        })
    }

    #[tokio::test]
    async fn failure_unwinds_completed_steps_in_reverse() {
        let journal = Journal::default();
        let mut saga = Saga::new("test");

        let first: Result<u8, String> = saga
            .step("first", async { Ok(1) }, |_| undo_into(&journal, "undo first"))
            .await;
        let second: Result<u8, String> = saga
            .step("second", async { Ok(2) }, |_| undo_into(&journal, "undo second"))
            .await;
        let last: Result<(), String> = saga.finish("third", async { Err("nope".to_owned()) }).await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
        assert_eq!(last, Err("nope".to_owned()));
        assert_eq!(
            *journal.lock().expect("journal lock"),
            vec!["undo second".to_owned(), "undo first".to_owned()]
        );
    }

    #[tokio::test]
    async fn success_discards_compensations() {
        let journal = Journal::default();
        let mut saga = Saga::new("test");
        let _: Result<(), String> = saga
            .step("first", async { Ok(()) }, |_| undo_into(&journal, "undo first"))
            .await;
        let done: Result<&str, String> = saga.finish("second", async { Ok("done") }).await;

        assert_eq!(done, Ok("done"));
        assert!(journal.lock().expect("journal lock").is_empty());
    }

    #[tokio::test]
    async fn failed_step_is_not_compensated_itself() {
        let journal = Journal::default();
        let mut saga = Saga::new("test");
        let result: Result<(), String> = saga
            .step("first", async { Err("broken".to_owned()) }, |_| {
                undo_into(&journal, "undo first")
            })
            .await;

        assert!(result.is_err());
        assert!(journal.lock().expect("journal lock").is_empty());
    }

    #[tokio::test]
    async fn undo_failure_keeps_original_error() {
        let mut saga = Saga::new("test");
        let _: Result<(), String> = saga
            .step("first", async { Ok(()) }, |_| {
                Box::pin(async { Err(CompensationError::from("undo broke")) })
            })
            .await;
        let result: Result<(), String> =
            saga.finish("second", async { Err("store down".to_owned()) }).await;

        assert_eq!(result, Err("store down".to_owned()));
    }
}
