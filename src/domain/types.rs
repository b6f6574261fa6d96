//! Identifier newtypes for domain entities.
//!
//! Each entity gets its own wrapper so a folder id can never be passed where
//! an email id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Unique identifier for a user account.
    UserId
);

string_id!(
    /// Unique identifier for a single email record.
    ///
    /// A delivered copy in another user's inbox has its own id; copies never
    /// share identity with the sender's record.
    EmailId
);

string_id!(
    /// Unique identifier for a folder.
    FolderId
);

string_id!(
    /// Unique identifier for an address-book entry.
    ContactId
);
