// Newtypes for compile-time safety between the different kinds of ids.
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh time-ordered id.
            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(
    /// Id of a user account owned by the external account service.
    UserId
);
id_type!(ProfileId);
id_type!(RequestId);
id_type!(ConversationId);
id_type!(MessageId);

/// Unordered pair of profiles stored as (min, max) so that (A, B) and (B, A)
/// map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProfilePair {
    lo: ProfileId,
    hi: ProfileId,
}

impl ProfilePair {
    /// Returns None when both sides are the same profile.
    pub fn new(a: &ProfileId, b: &ProfileId) -> Option<Self> {
        match a.cmp(b) {
            std::cmp::Ordering::Less => Some(Self {
                lo: a.clone(),
                hi: b.clone(),
            }),
            std::cmp::Ordering::Greater => Some(Self {
                lo: b.clone(),
                hi: a.clone(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn lo(&self) -> &ProfileId {
        &self.lo
    }

    pub fn hi(&self) -> &ProfileId {
        &self.hi
    }

    pub fn contains(&self, id: &ProfileId) -> bool {
        &self.lo == id || &self.hi == id
    }
}
