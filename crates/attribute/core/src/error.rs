//! Common error infrastructure for attribute-core.
//!
//! Domain-specific errors (e.g., `ModifierError`, `CapacityError`) are defined in their
//! respective modules alongside the operations they validate. Every one of them is
//! local and recoverable by the caller: nothing in this crate aborts the process.
//!
//! # Design Principles
//!
//! - **Type Safety**: Each concern has its own error type with specific variants
//! - **Rejections are values**: A failed precondition (condition mismatch, tag filter,
//!   capacity bound) is an error value with [`ErrorSeverity::Recoverable`], never a panic
//! - **Severity Classification**: Errors are categorized for recovery strategies

/// Severity level of an error, used for categorization and recovery strategies.
///
/// Errors are classified by their recoverability and expected handling:
/// - **Recoverable**: A precondition failed; retry once the precondition holds
/// - **Validation**: Invalid input that should be rejected without retry
/// - **Internal**: Unexpected structural inconsistency that requires investigation
/// - **Fatal**: Reserved; nothing in this crate currently produces it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Recoverable rejection - the operation was a no-op.
    ///
    /// Examples: application conditions not met, tag filter mismatch
    Recoverable,

    /// Validation error - invalid input, should not retry without changes.
    ///
    /// Examples: negative usage delta, unknown entity id
    Validation,

    /// Internal error - unexpected structural inconsistency.
    ///
    /// Examples: a modifier chain that would close a cycle
    Internal,

    /// Fatal error - state corrupted, cannot continue.
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates an internal bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common trait for all attribute-core errors.
///
/// # Implementation Guidelines
///
/// - All error enums should implement this trait
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait AttributeSystemError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    ///
    /// Default implementation uses the error type name.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }

    /// Returns true when the failed operation left all state untouched because a
    /// precondition did not hold.
    fn is_rejection(&self) -> bool {
        self.severity().is_recoverable()
    }
}
