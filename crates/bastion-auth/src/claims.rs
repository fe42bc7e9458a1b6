use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload carried inside a bearer token.
///
/// `usr` names the principal and is required. `exp` is optional while claims
/// are being assembled; [`crate::TokenCodec::issue`] fills it in and
/// [`crate::TokenCodec::validate`] refuses tokens without it. Unknown claims
/// survive a decode/re-issue cycle through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub usr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Claims bound to a principal and nothing else.
    pub fn for_principal(username: impl Into<String>) -> Self {
        Self {
            usr: username.into(),
            exp: None,
            extra: Map::new(),
        }
    }

    pub fn with_expiry(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// The same claims without an expiry, ready to be re-issued with a fresh window.
    pub fn without_expiry(mut self) -> Self {
        self.exp = None;
        self
    }
}
