use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Application user ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Subject, used when `user_id` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    /// Resolve the user identifier, preferring `user_id` over `sub`.
    /// Empty strings count as missing.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.sub.as_deref().filter(|id| !id.is_empty()))
    }
}
