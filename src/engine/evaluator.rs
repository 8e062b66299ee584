//! Balance and conflict evaluation for leave applications.
//!
//! Balance is only consumed when a request is approved, so pending requests
//! never reserve quota here. Conflicts are scoped to the same branch,
//! department and leave category: two people of one team may be away on
//! different categories at the same time.

use crate::error::TransitionError;
use crate::model::{Branch, Department, LeaveDates, LeaveRequest, LeaveType, RequestId, User};

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Valid,
    InsufficientBalance { remaining: i32, requested: i32 },
    Conflict(Vec<LeaveRequest>),
}

impl Evaluation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Evaluation::Valid)
    }

    pub fn into_result(self) -> Result<(), TransitionError> {
        match self {
            Evaluation::Valid => Ok(()),
            Evaluation::InsufficientBalance {
                remaining,
                requested,
            } => Err(TransitionError::InsufficientBalance {
                remaining,
                requested,
            }),
            Evaluation::Conflict(requests) => Err(TransitionError::DateConflict(
                requests.into_iter().map(|r| r.id).collect(),
            )),
        }
    }
}

pub fn evaluate(
    user: &User,
    dates: &LeaveDates,
    leave_type: LeaveType,
    requests: &[LeaveRequest],
) -> Evaluation {
    evaluate_excluding(user, dates, leave_type, requests, None)
}

/// Same as [`evaluate`] but ignores `exclude`, the request being edited.
pub fn evaluate_excluding(
    user: &User,
    dates: &LeaveDates,
    leave_type: LeaveType,
    requests: &[LeaveRequest],
    exclude: Option<&RequestId>,
) -> Evaluation {
    let remaining = user.balances.remaining(leave_type);
    let requested = dates.days();
    if requested > remaining {
        return Evaluation::InsufficientBalance {
            remaining,
            requested,
        };
    }

    let conflicts: Vec<LeaveRequest> = find_conflicts(
        user.department,
        user.branch,
        dates,
        leave_type,
        requests,
        exclude,
    )
    .cloned()
    .collect();

    if conflicts.is_empty() {
        Evaluation::Valid
    } else {
        Evaluation::Conflict(conflicts)
    }
}

/// Requests of the same team and category still holding any of `dates`.
pub fn find_conflicts<'a>(
    department: Department,
    branch: Branch,
    dates: &'a LeaveDates,
    leave_type: LeaveType,
    requests: &'a [LeaveRequest],
    exclude: Option<&'a RequestId>,
) -> impl Iterator<Item = &'a LeaveRequest> + 'a {
    requests.iter().filter(move |r| {
        exclude != Some(&r.id)
            && r.department == department
            && r.branch == branch
            && r.leave_type == leave_type
            && r.holds_dates()
            && r.dates.overlaps(dates)
    })
}
