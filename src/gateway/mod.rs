//! Persistence and sync boundary.
//!
//! The desk applies every transition locally first and then forwards the
//! resulting [`SyncAction`]s here. Nothing a gateway returns ever rolls a
//! local transition back.

pub mod http;
pub mod mysql;
pub mod wire;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Pin;

pub use http::HttpGateway;
pub use mysql::MySqlGateway;
pub use wire::{
    AuditRecord, EntityRef, NotificationRecord, PurgeScope, RecordUpdate, RequestRecord,
    ResetRecord, Snapshot, UserRecord, WireError,
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway unavailable")]
    Unavailable,
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("sync rejected: {0}")]
    Rejected(String),
    #[error("mapping: {0}")]
    Mapping(#[from] WireError),
}

/// One change forwarded to the durable store, tagged `{ "type", "data" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    Register(UserRecord),
    AddRequest(RequestRecord),
    UpdateRequest(RecordUpdate),
    UpdateUser(RecordUpdate),
    DeleteUser(EntityRef),
    DeleteNotification(EntityRef),
    UpdateReset(EntityRef),
    AddNotification(NotificationRecord),
    AddReset(ResetRecord),
    AppendAudit(AuditRecord),
    PurgeActivity(PurgeScope),
}

impl SyncAction {
    /// The wire tag, as used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncAction::Register(_) => "REGISTER",
            SyncAction::AddRequest(_) => "ADD_REQUEST",
            SyncAction::UpdateRequest(_) => "UPDATE_REQUEST",
            SyncAction::UpdateUser(_) => "UPDATE_USER",
            SyncAction::DeleteUser(_) => "DELETE_USER",
            SyncAction::DeleteNotification(_) => "DELETE_NOTIFICATION",
            SyncAction::UpdateReset(_) => "UPDATE_RESET",
            SyncAction::AddNotification(_) => "ADD_NOTIFICATION",
            SyncAction::AddReset(_) => "ADD_RESET",
            SyncAction::AppendAudit(_) => "APPEND_AUDIT",
            SyncAction::PurgeActivity(_) => "PURGE_ACTIVITY",
        }
    }
}

pub trait SyncGateway: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch_all(&self) -> BoxFuture<'_, Result<Snapshot, GatewayError>>;

    fn sync(&self, action: SyncAction) -> BoxFuture<'_, Result<(), GatewayError>>;

    /// `Ok(None)` when the store does not recognise the credentials.
    fn verify<'a>(
        &'a self,
        name: &'a str,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, GatewayError>>;
}

/// Used when no durable store is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGateway;

impl SyncGateway for OfflineGateway {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn fetch_all(&self) -> BoxFuture<'_, Result<Snapshot, GatewayError>> {
        Box::pin(async { Err(GatewayError::Unavailable) })
    }

    fn sync(&self, _action: SyncAction) -> BoxFuture<'_, Result<(), GatewayError>> {
        Box::pin(async { Err(GatewayError::Unavailable) })
    }

    fn verify<'a>(
        &'a self,
        _name: &'a str,
        _pin: &'a Pin,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, GatewayError>> {
        Box::pin(async { Err(GatewayError::Unavailable) })
    }
}
