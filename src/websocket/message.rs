use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Out-of-band control messages pushed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Error { message: String },
    Logout { message: String },
}

impl ControlMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Sent once to an upgrade that carried no usable credential
    pub fn auth_required() -> Self {
        Self::error("User ID required")
    }

    /// Broadcast to every session of a user that must terminate
    pub fn logout() -> Self {
        Self::Logout {
            message: "Logged in from another device".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logout_wire_format() {
        assert_eq!(
            ControlMessage::logout().to_json().unwrap(),
            r#"{"type":"logout","message":"Logged in from another device"}"#
        );
    }

    #[test]
    fn test_auth_required_wire_format() {
        assert_eq!(
            ControlMessage::auth_required().to_json().unwrap(),
            r#"{"type":"error","message":"User ID required"}"#
        );
    }

    #[test]
    fn test_parse_control_message() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"error","message":"nope"}"#).unwrap();
        assert_eq!(msg, ControlMessage::error("nope"));
    }
}
