use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum Role {
    #[serde(rename = "SUPER_ADMIN")]
    #[strum(serialize = "SUPER_ADMIN")]
    SuperAdmin,
    #[serde(rename = "OPERATIONS_MANAGER")]
    #[strum(serialize = "OPERATIONS_MANAGER")]
    OperationsManager,
    #[serde(rename = "BRANCH_MANAGER")]
    #[strum(serialize = "BRANCH_MANAGER")]
    BranchManager,
    #[serde(rename = "STAFF")]
    #[strum(serialize = "STAFF")]
    Staff,
}

impl Role {
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Super admin, operations manager and branch managers.
    pub fn is_manager(self) -> bool {
        !matches!(self, Role::Staff)
    }

    /// Roles whose authority is not bound to a branch.
    pub fn is_global(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::OperationsManager)
    }
}
