//! Fixtures shared by the unit tests.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};

use crate::auth::password::hash_pin;
use crate::model::{
    AppState, Balances, Branch, Department, LeaveDates, LeaveRequest, LeaveStatus, LeaveType,
    Pin, RequestId, Role, User, UserId,
};

pub const TEST_PIN: &str = "1234";

/// Hashing is slow, so every fixture user shares one credential.
pub static PIN_HASH: LazyLock<String> = LazyLock::new(|| {
    hash_pin(&Pin::parse(TEST_PIN).unwrap()).unwrap()
});

pub fn pin(raw: &str) -> Pin {
    Pin::parse(raw).unwrap()
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn dates(days: &[&str]) -> LeaveDates {
    LeaveDates::new(days.iter().map(|d| day(d))).unwrap()
}

/// `2025-06-01T09:00:00Z` style timestamps.
pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn user(name: &str, role: Role, branch: Branch, department: Department) -> User {
    User {
        id: UserId::from(format!("u-{}", name.to_lowercase().replace(' ', "-"))),
        name: name.to_string(),
        role,
        department,
        branch,
        is_active: true,
        is_approved: true,
        is_blocked: false,
        pin_hash: PIN_HASH.clone(),
        failed_attempts: 0,
        last_login: None,
        balances: Balances::default(),
        must_change_pin: false,
    }
}

pub fn staff(name: &str, branch: Branch, department: Department) -> User {
    user(name, Role::Staff, branch, department)
}

pub fn manager(name: &str, role: Role, branch: Branch) -> User {
    user(name, role, branch, Department::Management)
}

pub fn leave(owner: &User, leave_type: LeaveType, days: &[&str], status: LeaveStatus) -> LeaveRequest {
    LeaveRequest {
        id: RequestId::generate(),
        user_id: owner.id.clone(),
        user_name: owner.name.clone(),
        user_role: owner.role,
        department: owner.department,
        branch: owner.branch,
        leave_type,
        dates: dates(days),
        reason: "family matters".to_string(),
        status,
        manager_comment: None,
        created_at: at("2025-05-01T08:00:00Z"),
    }
}

pub fn state_with(users: Vec<User>) -> AppState {
    AppState {
        users,
        ..AppState::default()
    }
}
