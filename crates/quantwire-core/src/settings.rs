//! Evaluation-date context.
//!
//! The "today" against which term structures and instruments are valued is
//! an explicit, shared, observable object rather than process-wide state.
//! Objects that depend on it are handed an `Arc<Settings>` and register
//! with it like with any other observable.

use parking_lot::RwLock;

use crate::error::QuantResult;
use crate::observable::{Observable, ObserverRegistry};
use crate::time::Date;

/// Observable holder of the current evaluation date.
#[derive(Debug)]
pub struct Settings {
    registry: ObserverRegistry,
    evaluation_date: RwLock<Date>,
}

impl Settings {
    /// Creates a context valued as of `evaluation_date`.
    pub fn new(evaluation_date: Date) -> Self {
        Self {
            registry: ObserverRegistry::new("Settings"),
            evaluation_date: RwLock::new(evaluation_date),
        }
    }

    /// Returns the current evaluation date.
    pub fn evaluation_date(&self) -> Date {
        *self.evaluation_date.read()
    }

    /// Moves the evaluation date.
    ///
    /// Observers are notified only when the date actually changes; the new
    /// date is sent as the payload.
    pub fn set_evaluation_date(&self, date: Date) -> QuantResult<()> {
        {
            let mut current = self.evaluation_date.write();
            if *current == date {
                return Ok(());
            }
            *current = date;
        }

        tracing::debug!(evaluation_date = %date, "Evaluation date moved");
        let payload = serde_json::json!(date.to_string());
        self.notify_observers(Some(&payload))
    }

    /// Moves the evaluation date forward by `days` calendar days.
    ///
    /// # Errors
    ///
    /// Fails without notifying if the new date is out of range.
    pub fn advance(&self, days: i64) -> QuantResult<()> {
        let next = self.evaluation_date().add_days(days)?;
        self.set_evaluation_date(next)
    }
}

impl Observable for Settings {
    fn observers(&self) -> &ObserverRegistry {
        &self.registry
    }
}
