use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::ValidationError;
use crate::model::{Branch, Department, RequestId, Role, UserId};

/// Longest range [`LeaveDates::from_range`] will expand.
pub const MAX_RANGE_DAYS: usize = 365;

#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum LeaveType {
    #[serde(rename = "Annual Leave")]
    #[strum(serialize = "Annual Leave")]
    Annual,
    #[serde(rename = "Sick Leave")]
    #[strum(serialize = "Sick Leave")]
    Sick,
    #[serde(rename = "Maternity Leave")]
    #[strum(serialize = "Maternity Leave")]
    Maternity,
    #[serde(rename = "Paternity Leave")]
    #[strum(serialize = "Paternity Leave")]
    Paternity,
}

impl LeaveType {
    /// Days granted per category to a freshly registered user.
    pub fn default_quota(self) -> i32 {
        match self {
            LeaveType::Annual => 21,
            LeaveType::Sick => 15,
            LeaveType::Maternity => 90,
            LeaveType::Paternity => 14,
        }
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

/// Non-empty, ordered set of distinct calendar days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LeaveDates(BTreeSet<NaiveDate>);

#[allow(clippy::len_without_is_empty)]
impl LeaveDates {
    pub fn new<I>(dates: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let set: BTreeSet<NaiveDate> = dates.into_iter().collect();
        if set.is_empty() {
            return Err(ValidationError::EmptyDates);
        }
        Ok(Self(set))
    }

    /// Every day from `start` to `end` inclusive, capped at [`MAX_RANGE_DAYS`].
    pub fn from_range(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange { start, end });
        }
        Self::new(
            start
                .iter_days()
                .take_while(|day| *day <= end)
                .take(MAX_RANGE_DAYS),
        )
    }

    pub fn start(&self) -> NaiveDate {
        match self.0.first() {
            Some(day) => *day,
            None => unreachable!("LeaveDates is never empty"),
        }
    }

    pub fn end(&self) -> NaiveDate {
        match self.0.last() {
            Some(day) => *day,
            None => unreachable!("LeaveDates is never empty"),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Day count as debited from a balance.
    pub fn days(&self) -> i32 {
        i32::try_from(self.0.len()).unwrap_or(i32::MAX)
    }

    pub fn contains(&self, day: &NaiveDate) -> bool {
        self.0.contains(day)
    }

    pub fn overlaps(&self, other: &LeaveDates) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NaiveDate> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for LeaveDates {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let dates = Vec::<NaiveDate>::deserialize(deserializer)?;
        LeaveDates::new(dates).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: RequestId,
    pub user_id: UserId,
    /// Owner details as they were at submission.
    pub user_name: String,
    pub user_role: Role,
    pub department: Department,
    pub branch: Branch,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub dates: LeaveDates,
    pub reason: String,
    pub status: LeaveStatus,
    pub manager_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LeaveRequest {
    pub fn start_date(&self) -> NaiveDate {
        self.dates.start()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.dates.end()
    }

    /// Rejected requests no longer hold their dates.
    pub fn holds_dates(&self) -> bool {
        self.status != LeaveStatus::Rejected
    }
}
