//! Optional configuration attribute with change detection
//!
//! `OptionalField<T>` is the type of every attribute of a policy-chain struct.
//! Absent means "this source has no opinion"; present carries a value.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A present value turned absent between two resolved states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regression;

/// Nullable configuration value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionalField<T>(Option<T>);

impl<T> Default for OptionalField<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> OptionalField<T> {
    /// Absent value
    pub const fn none() -> Self {
        Self(None)
    }

    /// Present value
    pub const fn some(value: T) -> Self {
        Self(Some(value))
    }

    pub fn has_value(&self) -> bool {
        self.0.is_some()
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the value, failing when absent
    ///
    /// Callers are expected to check `has_value()` first.
    pub fn value(&self) -> Result<&T> {
        self.0
            .as_ref()
            .ok_or_else(|| AppError::InvalidState("optional field has no value".to_string()))
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn set(&mut self, value: T) {
        self.0 = Some(value);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn into_option(self) -> Option<T> {
        self.0
    }
}

impl<T: Clone> OptionalField<T> {
    /// Copy `other` into `self` if `other` is present
    ///
    /// Returns whether anything was written.
    pub fn merge_from(&mut self, other: &Self) -> bool {
        match &other.0 {
            Some(v) => {
                self.0 = Some(v.clone());
                true
            }
            None => false,
        }
    }
}

impl<T: Copy> OptionalField<T> {
    /// Copy of the value, if present
    pub fn copied(&self) -> Option<T> {
        self.0
    }
}

impl<T: Clone + PartialEq> OptionalField<T> {
    /// What changed going from `lhs` to `rhs`
    ///
    /// Present only when consumers must react: the value is new, or differs
    /// from the previous one. A present `lhs` with an absent `rhs` never
    /// happens for a correctly populated chain and is reported as an error.
    pub fn diff(lhs: &Self, rhs: &Self) -> std::result::Result<Self, Regression> {
        match (&lhs.0, &rhs.0) {
            (Some(_), None) => Err(Regression),
            (Some(old), Some(new)) if old == new => Ok(Self::none()),
            (_, Some(new)) => Ok(Self::some(new.clone())),
            (None, None) => Ok(Self::none()),
        }
    }
}

impl<T> From<T> for OptionalField<T> {
    fn from(value: T) -> Self {
        Self(Some(value))
    }
}
