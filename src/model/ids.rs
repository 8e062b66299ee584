use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

entity_id!(
    /// Identifies a user on the roster.
    UserId
);
entity_id!(
    /// Identifies a leave application.
    RequestId
);
entity_id!(NotificationId);
entity_id!(ResetRequestId);
entity_id!(AuditId);
