use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::model::{Balances, Branch, LeaveStatus, LeaveType, RequestId};

/// Malformed input, rejected before it reaches the reducer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("PIN must be exactly 4 digits")]
    PinFormat,
    #[error("name must not be empty")]
    EmptyName,
    #[error("a leave application needs at least one date")]
    EmptyDates,
    #[error("range start {start} is after its end {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("leave dates must be in the future, {0} is not")]
    PastDate(NaiveDate),
    #[error("no requests selected")]
    EmptySelection,
    #[error("{leave_type} balance must be between 0 and {max} days, got {days}", max = Balances::MAX_DAYS)]
    BalanceOutOfRange { leave_type: LeaveType, days: i32 },
}

/// Policy or constraint violation raised by the reducer. State is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("user {0} not found")]
    UnknownUser(String),
    #[error("leave request {0} not found")]
    UnknownRequest(RequestId),
    #[error("notification {0} not found")]
    UnknownNotification(String),
    #[error("reset request {0} not found")]
    UnknownResetRequest(String),
    #[error("an actor may not approve or reject their own leave")]
    SelfApproval,
    #[error("not permitted: {0}")]
    Forbidden(String),
    #[error("account is not in service")]
    InactiveAccount,
    #[error("organizational constraint: only one active operations manager is allowed")]
    DuplicateOperationsManager,
    #[error("organizational constraint: {0} already has an active branch manager")]
    DuplicateBranchManager(Branch),
    #[error("the name {0} is already on the roster")]
    NameTaken(String),
    #[error("insufficient balance: {remaining} days remaining, {requested} requested")]
    InsufficientBalance { remaining: i32, requested: i32 },
    #[error("dates overlap with {} existing request(s)", .0.len())]
    DateConflict(Vec<RequestId>),
    #[error("cannot move a leave request from {from} to {to}")]
    InvalidTransition { from: LeaveStatus, to: LeaveStatus },
    #[error("{0} balance is out of range")]
    BalanceOverflow(LeaveType),
}

/// Failures of the system reset ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResetError {
    #[error("only the super administrator may reset the system")]
    NotPermitted,
    #[error("reset attempt frequency exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },
    #[error("session age exceeds the safety threshold, sign in again first")]
    StaleSession,
    #[error("no reset ceremony in progress")]
    NoCeremony,
    #[error("reset steps must be completed in order")]
    OutOfOrder,
    #[error("incorrect security PIN")]
    PinMismatch,
    #[error("one-time token mismatch")]
    TokenMismatch,
    #[error("confirmation phrase mismatch")]
    PhraseMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account blocked")]
    Blocked,
    #[error("account pending authorization")]
    PendingApproval,
    #[error("session expired")]
    SessionExpired,
}

/// Everything the service layer can surface to a caller.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Reset(#[from] ResetError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("credential hashing failed: {0}")]
    Credential(String),
}

impl ResponseError for DeskError {
    fn status_code(&self) -> StatusCode {
        match self {
            DeskError::Validation(_) => StatusCode::BAD_REQUEST,
            DeskError::Transition(err) => match err {
                TransitionError::Validation(_) => StatusCode::BAD_REQUEST,
                TransitionError::UnknownUser(_)
                | TransitionError::UnknownRequest(_)
                | TransitionError::UnknownNotification(_)
                | TransitionError::UnknownResetRequest(_) => StatusCode::NOT_FOUND,
                TransitionError::SelfApproval
                | TransitionError::Forbidden(_)
                | TransitionError::InactiveAccount => StatusCode::FORBIDDEN,
                TransitionError::InsufficientBalance { .. }
                | TransitionError::BalanceOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
                TransitionError::DuplicateOperationsManager
                | TransitionError::DuplicateBranchManager(_)
                | TransitionError::NameTaken(_)
                | TransitionError::DateConflict(_)
                | TransitionError::InvalidTransition { .. } => StatusCode::CONFLICT,
            },
            DeskError::Reset(err) => match err {
                ResetError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                ResetError::NoCeremony | ResetError::OutOfOrder => StatusCode::CONFLICT,
                _ => StatusCode::FORBIDDEN,
            },
            DeskError::Auth(err) => match err {
                AuthError::Blocked | AuthError::PendingApproval => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            },
            DeskError::Gateway(_) => StatusCode::BAD_GATEWAY,
            DeskError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            DeskError::Transition(TransitionError::DateConflict(ids)) => json!({
                "error": self.to_string(),
                "conflicts": ids,
            }),
            DeskError::Transition(TransitionError::InsufficientBalance { remaining, requested }) => {
                json!({
                    "error": self.to_string(),
                    "remaining": remaining,
                    "requested": requested,
                })
            }
            // internal details stay in the logs
            DeskError::Gateway(_) | DeskError::Credential(_) => {
                tracing::error!(error = %self, "request failed");
                json!({ "error": "Internal Server Error" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
