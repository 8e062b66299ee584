use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Functional division within a branch.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum Department {
    Sales,
    #[serde(rename = "IT")]
    #[strum(serialize = "IT")]
    It,
    Procurement,
    Stores,
    Drivers,
    Management,
}
