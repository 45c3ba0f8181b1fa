use crate::models::asset::{Token, LOVELACE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A multi-asset amount keyed by unit (`"lovelace"` or policy id ++ asset name).
///
/// Zero quantities are never stored, so two values holding the same assets
/// always compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Value(BTreeMap<String, u64>);

impl Value {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lovelace(amount: u64) -> Self {
        Self::new().with(LOVELACE, amount)
    }

    pub fn with(mut self, unit: &str, amount: u64) -> Self {
        self.add(unit, amount);
        self
    }

    pub fn with_token(self, token: &Token, amount: u64) -> Self {
        self.with(&token.unit(), amount)
    }

    pub fn get(&self, unit: &str) -> u64 {
        self.0.get(unit).copied().unwrap_or(0)
    }

    pub fn amount_of(&self, token: &Token) -> u64 {
        self.get(&token.unit())
    }

    pub fn coins(&self) -> u64 {
        self.get(LOVELACE)
    }

    /// Add `amount` of `unit`, saturating at `u64::MAX`. Settlement code uses
    /// [`Value::checked_add`] instead.
    pub fn add(&mut self, unit: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let held = self.0.entry(unit.to_string()).or_insert(0);
        *held = held.saturating_add(amount);
    }

    /// Add `amount` of `unit`, or return `None` (leaving `self` untouched) when
    /// the total would not fit.
    pub fn checked_add(&mut self, unit: &str, amount: u64) -> Option<()> {
        if amount == 0 {
            return Some(());
        }
        let total = self.get(unit).checked_add(amount)?;
        self.0.insert(unit.to_string(), total);
        Some(())
    }

    /// Remove `amount` of `unit`, or return `None` (leaving `self` untouched)
    /// when not enough is held.
    pub fn checked_sub(&mut self, unit: &str, amount: u64) -> Option<()> {
        if amount == 0 {
            return Some(());
        }
        let held = self.get(unit);
        let left = held.checked_sub(amount)?;
        if left == 0 {
            self.0.remove(unit);
        } else {
            self.0.insert(unit.to_string(), left);
        }
        Some(())
    }

    pub fn merge(&mut self, other: &Value) {
        for (unit, amount) in other.iter() {
            self.add(unit, amount);
        }
    }

    /// Subtract every asset of `other`; `None` when any asset is short.
    pub fn checked_minus(&self, other: &Value) -> Option<Value> {
        let mut out = self.clone();
        for (unit, amount) in other.iter() {
            out.checked_sub(unit, amount)?;
        }
        Some(out)
    }

    pub fn covers(&self, other: &Value) -> bool {
        other.iter().all(|(unit, amount)| self.get(unit) >= amount)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(u, a)| (u.as_str(), *a))
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, u64)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut value = Value::new();
        for (unit, amount) in iter {
            value.add(&unit, amount);
        }
        value
    }
}
