use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a workflow record.
///
/// Always randomly generated at creation time. Deriving it from the tracked
/// instrument would make a legitimate re-creation collide with the original,
/// so the source instrument gets its own [`SourceId`] and a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(Uuid);

impl WorkflowId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// A party identity (local owner or counterparty).
    NymId
);
string_id!(
    /// An asset account held at a notary.
    AccountId
);
string_id!(
    /// The notarizing counterparty service.
    NotaryId
);
string_id!(
    /// An instrument definition (currency/asset) identifier.
    UnitId
);
string_id!(
    /// A resolved address-book contact.
    ContactId
);
string_id!(
    /// The identifier of the source instrument a workflow tracks.
    SourceId
);
