//! Generic layered configuration engine
//!
//! A `ConfigPolicyChain<T>` stores one snapshot of `T` per [`Priority`] and
//! keeps the merged ("final") value up to date on every write. Consumers pull
//! the fields that changed since they last looked with
//! [`ConfigPolicyChain::diff_by_last_set_value`].
//!
//! # Merge order
//!
//! ```text
//! Internal -> NormalServer -> User -> Script -> EmergencyServer -> Device -> Debug
//! (applied first)                                             (applied last, wins)
//! ```
//!
//! Each level only overwrites the fields it actually sets.

use tracing::{debug, error, trace};

use super::priority::{Priority, PRIORITY_COUNT};
use crate::error::{AppError, Result};

/// Per-type merge and diff strategy used by [`ConfigPolicyChain`]
///
/// Types declared with `policy_config!` get a field-by-field implementation.
/// The default methods merge nothing and report no differences.
pub trait PolicyConfig: Clone + Default {
    /// Copy every present field of `source` into `target`
    fn apply(_target: &mut Self, _source: &Self) -> bool {
        false
    }

    /// Fields of `new` that consumers must react to, compared with `old`
    fn diff(_old: &Self, _new: &Self) -> Result<Self> {
        Ok(Self::default())
    }

    /// Names of every field, in declaration order
    fn field_names() -> &'static [&'static str] {
        &[]
    }

    /// Names of the fields that carry a value
    fn present_fields(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }
}

/// Layered configuration resolver for one configuration type
///
/// Not synchronized; the owner serializes access.
#[derive(Debug, Clone)]
pub struct ConfigPolicyChain<T: PolicyConfig> {
    name: &'static str,
    levels: [T; PRIORITY_COUNT],
    final_value: T,
    old_final: T,
}

impl<T: PolicyConfig> ConfigPolicyChain<T> {
    /// Create a chain from its internal defaults and device-probed values
    ///
    /// `internal` must populate every field so the chain can never resolve
    /// to "nothing set".
    pub fn new(name: &'static str, internal: T, device: T) -> Result<Self> {
        let missing: Vec<&'static str> = T::field_names()
            .iter()
            .copied()
            .filter(|f| !internal.present_fields().iter().any(|present| present == f))
            .collect();
        if let Some(&field) = missing.first() {
            error!(
                "{}: internal defaults missing fields: {}",
                name,
                missing.join(", ")
            );
            return Err(AppError::InvariantViolation { field });
        }

        let mut levels: [T; PRIORITY_COUNT] = Default::default();
        levels[Priority::Internal.index()] = internal;
        levels[Priority::Device.index()] = device;

        let mut chain = Self {
            name,
            levels,
            final_value: T::default(),
            old_final: T::default(),
        };
        let resolved = chain.calculate(0);
        T::apply(&mut chain.final_value, &resolved);
        chain.old_final = chain.final_value.clone();
        debug!(
            "{} policy chain initialized with {} fields",
            name,
            T::field_names().len()
        );
        Ok(chain)
    }

    /// Chain name used in logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Store `value` at `priority` and re-resolve the final value
    ///
    /// Fields absent in `value` keep whatever the slot held before. Returns
    /// `false` without touching any state when `priority` is out of range.
    pub fn set_value<P>(&mut self, priority: P, value: T) -> bool
    where
        P: TryInto<Priority>,
    {
        let Ok(priority) = TryInto::<Priority>::try_into(priority) else {
            debug!("{}: rejected set_value with invalid priority", self.name);
            return false;
        };

        if !T::apply(&mut self.levels[priority.index()], &value) {
            return false;
        }

        let resolved = self.calculate(0);
        let applied = T::apply(&mut self.final_value, &resolved);
        debug!(
            "{}: set {:?} at {} priority",
            self.name,
            value.present_fields(),
            priority
        );
        applied
    }

    /// Last resolved value
    pub fn get_final(&self) -> &T {
        &self.final_value
    }

    /// What the final value would be if nothing above `priority` were set
    pub fn get_value<P>(&self, priority: P) -> T
    where
        P: TryInto<Priority>,
    {
        match TryInto::<Priority>::try_into(priority) {
            Ok(p) => self.calculate(p.index()),
            Err(_) => T::default(),
        }
    }

    /// Raw snapshot stored at `priority`
    pub fn snapshot(&self, priority: Priority) -> &T {
        &self.levels[priority.index()]
    }

    /// Highest-precedence level that currently sets `field`
    pub fn resolved_source(&self, field: &str) -> Option<Priority> {
        Priority::ALL
            .iter()
            .copied()
            .find(|p| {
                self.levels[p.index()]
                    .present_fields()
                    .iter()
                    .any(|present| *present == field)
            })
    }

    /// Changes since the previous call (or since construction)
    ///
    /// Consumes the change: a second call without an intervening write
    /// returns an empty value. Several writes between two calls accumulate
    /// into one diff.
    pub fn diff_by_last_set_value(&mut self) -> Result<T> {
        let result = T::diff(&self.old_final, &self.final_value);
        if let Err(ref e) = result {
            error!("{}: {}", self.name, e);
        }
        self.old_final = self.final_value.clone();
        if let Ok(ref diff) = result {
            trace!("{}: diff {:?}", self.name, diff.present_fields());
        }
        result
    }

    /// Fold levels from the lowest precedence up to `last_level`
    fn calculate(&self, last_level: usize) -> T {
        let mut result = T::default();
        for level in (last_level..PRIORITY_COUNT).rev() {
            T::apply(&mut result, &self.levels[level]);
        }
        result
    }
}
