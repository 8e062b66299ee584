use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::error::{TransitionError, ValidationError};
use crate::model::{Branch, Department, LeaveType, Role, UserId};

/// Remaining days per leave category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balances(BTreeMap<LeaveType, i32>);

impl Default for Balances {
    /// The default quota table.
    fn default() -> Self {
        LeaveType::iter()
            .map(|leave_type| (leave_type, leave_type.default_quota()))
            .collect()
    }
}

impl FromIterator<(LeaveType, i32)> for Balances {
    fn from_iter<T: IntoIterator<Item = (LeaveType, i32)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Balances {
    /// Upper bound for a manually set balance.
    pub const MAX_DAYS: i32 = 366;

    /// Manual overrides must stay within `0..=MAX_DAYS`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.iter().find(|(_, days)| !(0..=Self::MAX_DAYS).contains(days)) {
            Some((leave_type, days)) => Err(ValidationError::BalanceOutOfRange { leave_type, days }),
            None => Ok(()),
        }
    }

    pub fn remaining(&self, leave_type: LeaveType) -> i32 {
        self.0.get(&leave_type).copied().unwrap_or(0)
    }

    pub fn set(&mut self, leave_type: LeaveType, days: i32) {
        self.0.insert(leave_type, days);
    }

    pub fn debit(&mut self, leave_type: LeaveType, days: i32) -> Result<(), TransitionError> {
        let next = self
            .remaining(leave_type)
            .checked_sub(days)
            .ok_or(TransitionError::BalanceOverflow(leave_type))?;
        self.0.insert(leave_type, next);
        Ok(())
    }

    pub fn credit(&mut self, leave_type: LeaveType, days: i32) -> Result<(), TransitionError> {
        let next = self
            .remaining(leave_type)
            .checked_add(days)
            .ok_or(TransitionError::BalanceOverflow(leave_type))?;
        self.0.insert(leave_type, next);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (LeaveType, i32)> + '_ {
        self.0.iter().map(|(leave_type, days)| (*leave_type, *days))
    }
}

/// A validated four digit PIN, never stored in clear.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.len() == 4 && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ValidationError::PinFormat)
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pin(****)")
    }
}

/// Trimmed, non-empty display name.
pub fn normalize_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub department: Department,
    pub branch: Branch,
    pub is_active: bool,
    pub is_approved: bool,
    pub is_blocked: bool,
    pub pin_hash: String,
    pub failed_attempts: u32,
    pub last_login: Option<DateTime<Utc>>,
    pub balances: Balances,
    #[serde(default)]
    pub must_change_pin: bool,
}

impl User {
    /// Terminated accounts are kept for audit continuity but never sign in again.
    pub fn is_terminated(&self) -> bool {
        !self.is_active && self.is_blocked
    }

    /// Approved, active and not blocked.
    pub fn is_in_service(&self) -> bool {
        self.is_active && self.is_approved && !self.is_blocked
    }

    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

/// Data needed to put a new person on the roster.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub role: Role,
    pub department: Department,
    pub branch: Branch,
    pub pin_hash: String,
    /// Seeded from the default quota table when absent.
    pub balances: Option<Balances>,
}

/// Administrative edits to an existing user record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub department: Option<Department>,
    pub branch: Option<Branch>,
}
