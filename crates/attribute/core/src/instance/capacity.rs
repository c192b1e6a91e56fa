//! Capacity usage - a bounded consumption counter tracked against the resolved value.
//!
//! Usage is only available on base attributes of numeric definitions that declare
//! capacity. The upper bound is the live resolved value (unless the definition allows
//! exceeding it); the lower bound is the definition's `min_capacity`.

use crate::error::{AttributeSystemError, ErrorSeverity};
use crate::events::AttributeEvent;
use crate::instance::InstanceId;
use crate::store::InstanceStore;

/// Errors that can occur while changing capacity usage.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum CapacityError {
    #[error("instance {0} not found")]
    UnknownInstance(InstanceId),

    #[error("instance {0} does not track capacity")]
    Unsupported(InstanceId),

    #[error("usage delta must be non-negative, got {0}")]
    NegativeAmount(f64),

    #[error("usage {requested} would fall below minimum capacity {min}")]
    BelowMinimum { requested: f64, min: f64 },
}

impl AttributeSystemError for CapacityError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Unsupported(_) | Self::BelowMinimum { .. } => ErrorSeverity::Recoverable,
            Self::UnknownInstance(_) | Self::NegativeAmount(_) => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownInstance(_) => "CAPACITY_UNKNOWN_INSTANCE",
            Self::Unsupported(_) => "CAPACITY_UNSUPPORTED",
            Self::NegativeAmount(_) => "CAPACITY_NEGATIVE_AMOUNT",
            Self::BelowMinimum { .. } => "CAPACITY_BELOW_MINIMUM",
        }
    }
}

impl InstanceStore {
    /// Consumes `amount` of capacity, returning the new usage.
    ///
    /// Usage above the resolved value is clamped down to it unless the definition
    /// allows exceeding capacity. A result below `min_capacity` is rejected.
    pub fn add_usage(&mut self, id: InstanceId, amount: f64) -> Result<f64, CapacityError> {
        check_amount(id, amount)?;
        let (previous, min_capacity, allow_exceed) = self.capacity_bounds(id)?;

        let mut next = previous + amount;
        if !allow_exceed {
            let ceiling = self.value(id);
            if next > ceiling {
                tracing::debug!(instance = %id, requested = next, ceiling, "clamping usage to capacity");
                next = ceiling;
            }
        }
        if next < min_capacity {
            return Err(CapacityError::BelowMinimum {
                requested: next,
                min: min_capacity,
            });
        }

        self.commit_usage(id, next, previous);
        Ok(next)
    }

    /// Releases `amount` of capacity, returning the new usage.
    ///
    /// The result is clamped up to `min_capacity` rather than rejected.
    pub fn remove_usage(&mut self, id: InstanceId, amount: f64) -> Result<f64, CapacityError> {
        check_amount(id, amount)?;
        let (previous, min_capacity, _) = self.capacity_bounds(id)?;

        let next = (previous - amount).max(min_capacity);
        self.commit_usage(id, next, previous);
        Ok(next)
    }

    /// Returns `(used, min_capacity, allow_exceed)` for a capacity-tracking instance.
    fn capacity_bounds(&self, id: InstanceId) -> Result<(f64, f64, bool), CapacityError> {
        let instance = self.get(id).ok_or(CapacityError::UnknownInstance(id))?;
        if !instance.can_use_capacity() {
            tracing::debug!(instance = %id, "capacity operation on non-capacity attribute");
            return Err(CapacityError::Unsupported(id));
        }
        let definition = instance
            .definition()
            .ok_or(CapacityError::Unsupported(id))?;
        Ok((
            instance.capacity_used(),
            definition.min_capacity,
            definition.allow_exceed_capacity,
        ))
    }

    fn commit_usage(&mut self, id: InstanceId, current: f64, previous: f64) {
        if let Some(instance) = self.get_mut(id) {
            instance.set_capacity_used(current);
        }
        self.events().publish(AttributeEvent::CapacityChanged {
            instance: id,
            current,
            previous,
        });
    }
}

fn check_amount(id: InstanceId, amount: f64) -> Result<(), CapacityError> {
    // NaN fails this comparison too.
    if amount >= 0.0 {
        return Ok(());
    }
    tracing::warn!(instance = %id, amount, "rejected negative usage delta");
    Err(CapacityError::NegativeAmount(amount))
}
