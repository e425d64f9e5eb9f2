//! Market quotes: the leaves of the notification graph.

use parking_lot::RwLock;

use crate::error::{QuantResult, QuantwireError};
use crate::observable::{Observable, ObserverRegistry};

/// An observable market datum.
pub trait Quote: Observable {
    /// Current value of the quote.
    ///
    /// # Errors
    ///
    /// Fails if the quote holds no valid value.
    fn value(&self) -> QuantResult<f64>;

    /// Returns true if [`Quote::value`] would succeed.
    fn is_valid(&self) -> bool;
}

/// A quote whose value is set by the host application.
#[derive(Debug)]
pub struct SimpleQuote {
    registry: ObserverRegistry,
    value: RwLock<Option<f64>>,
}

impl SimpleQuote {
    /// Creates a quote holding `value`.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            registry: ObserverRegistry::new(name),
            value: RwLock::new(Some(value)),
        }
    }

    /// Creates a quote with no value yet.
    pub fn unset(name: impl Into<String>) -> Self {
        Self {
            registry: ObserverRegistry::new(name),
            value: RwLock::new(None),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        self.registry.label()
    }

    /// Sets a new value and returns the previous one.
    ///
    /// Observers are notified only if the value changed.
    ///
    /// # Errors
    ///
    /// Rejects non-finite values; propagates observer failures.
    pub fn set_value(&self, value: f64) -> QuantResult<Option<f64>> {
        if !value.is_finite() {
            return Err(QuantwireError::invalid_input(format!(
                "{}: non-finite quote value {value}",
                self.name()
            )));
        }

        let previous = {
            let mut current = self.value.write();
            let previous = *current;
            if previous == Some(value) {
                return Ok(previous);
            }
            *current = Some(value);
            previous
        };

        tracing::debug!(quote = %self.name(), value, "Quote changed");
        self.notify_observers(None)?;
        Ok(previous)
    }

    /// Clears the value, notifying observers if one was set.
    pub fn reset(&self) -> QuantResult<()> {
        if self.value.write().take().is_some() {
            self.notify_observers(None)?;
        }
        Ok(())
    }
}

impl Quote for SimpleQuote {
    fn value(&self) -> QuantResult<f64> {
        self.value.read().ok_or_else(|| {
            QuantwireError::invalid_input(format!("{}: quote has no valid value", self.name()))
        })
    }

    fn is_valid(&self) -> bool {
        self.value.read().is_some()
    }
}

impl Observable for SimpleQuote {
    fn observers(&self) -> &ObserverRegistry {
        &self.registry
    }
}
