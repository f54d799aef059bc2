use std::fmt;

use serde::{Deserialize, Serialize};

/// Locally cached profile of the signed-in user.
///
/// Serialized with the field names the backend uses (`cpfOrEmail`, `name`) so
/// the persisted profile record and the wire payload share one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Identity {
    /// CPF or e-mail address; unique per account
    #[serde(rename = "cpfOrEmail")]
    pub subject_id: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Name to greet the user with, falling back to the subject id
    pub fn greeting_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.subject_id
        } else {
            &self.display_name
        }
    }
}

/// Opaque bearer token issued by the auth backend.
///
/// The client assumes no internal structure. `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
