//! Error types for the Quantwire framework.
//!
//! Every failure in the notification graph surfaces as a [`QuantwireError`]
//! naming the object and operation involved. Nothing in the core recovers
//! to a default value.

use thiserror::Error;

/// A specialized Result type for Quantwire operations.
pub type QuantResult<T> = Result<T, QuantwireError>;

/// The main error type for Quantwire operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantwireError {
    /// A handle with no target was dereferenced.
    #[error("empty handle cannot be dereferenced: {context}")]
    EmptyHandle {
        /// The handle (or owner of the handle) that was dereferenced.
        context: String,
    },

    /// The concrete recalculation step of a lazy object failed.
    #[error("calculation of {object} failed: {reason}")]
    Calculation {
        /// Name of the object being calculated.
        object: String,
        /// Description of what went wrong.
        reason: String,
    },

    /// A lazy object re-entered its own calculation.
    #[error("cycle detected: {object} re-entered its own calculation")]
    CycleDetected {
        /// Name of the object whose calculation was re-entered.
        object: String,
    },

    /// An engine and an instrument disagree on the shape of the arguments.
    #[error("arguments type mismatch in {context}: expected {expected}, found {found}")]
    ArgumentsTypeMismatch {
        /// Where the mismatch was detected.
        context: String,
        /// Arguments kind the caller expected.
        expected: String,
        /// Arguments kind actually supplied.
        found: String,
    },

    /// An input value was invalid or missing.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of the invalid input.
        reason: String,
    },

    /// An observer rejected a notification.
    #[error("observer {observer} failed: {reason}")]
    ObserverFailed {
        /// Name of the failing observer.
        observer: String,
        /// Description of the failure.
        reason: String,
    },
}

impl QuantwireError {
    /// Creates an empty handle error.
    #[must_use]
    pub fn empty_handle(context: impl Into<String>) -> Self {
        Self::EmptyHandle {
            context: context.into(),
        }
    }

    /// Creates a calculation error.
    #[must_use]
    pub fn calculation(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Calculation {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Creates a cycle detected error.
    #[must_use]
    pub fn cycle_detected(object: impl Into<String>) -> Self {
        Self::CycleDetected {
            object: object.into(),
        }
    }

    /// Creates an arguments type mismatch error.
    #[must_use]
    pub fn arguments_mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        Self::ArgumentsTypeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Creates an observer failure error.
    #[must_use]
    pub fn observer_failed(observer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ObserverFailed {
            observer: observer.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying after an upstream correction can succeed.
    ///
    /// Type mismatches and cycles are wiring errors and will fail again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Calculation { .. } | Self::InvalidInput { .. } | Self::EmptyHandle { .. }
        )
    }
}
