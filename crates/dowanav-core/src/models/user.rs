use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Profile of the signed-in user as returned by the backend.
///
/// Only the fields the client reads are typed; everything else the server
/// sends is kept in `extra` so the cached record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Empty when the backend omits it.
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: None,
            display_name: None,
            role: None,
            extra: Map::new(),
        }
    }

    /// Display name if the server set one, username otherwise.
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_keeps_unknown_fields() {
        let json = r#"{"id": 42, "username": "ada", "email": "ada@example.com", "workspace": "lab", "quota": 3}"#;
        let user: UserProfile = serde_json::from_str(json).expect("Failed to parse profile JSON");

        assert_eq!(user.id, Some(Value::from(42)));
        assert_eq!(user.username, "ada");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        assert_eq!(user.extra.get("workspace"), Some(&Value::from("lab")));
        assert_eq!(user.extra.get("quota"), Some(&Value::from(3)));

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["workspace"], "lab");
        assert_eq!(back["quota"], 3);
    }

    #[test]
    fn test_parse_profile_without_username() {
        let json = r#"{"id": "u-7", "email": "ops@example.com"}"#;
        let user: UserProfile = serde_json::from_str(json).expect("Failed to parse profile JSON");

        assert_eq!(user.username, "");
        assert_eq!(user.email.as_deref(), Some("ops@example.com"));
        assert!(user.extra.is_empty());
    }

    #[test]
    fn test_name_prefers_display_name() {
        let mut user = UserProfile::new("ada");
        assert_eq!(user.name(), "ada");

        user.display_name = Some(String::new());
        assert_eq!(user.name(), "ada");

        user.display_name = Some("Ada Lovelace".to_string());
        assert_eq!(user.name(), "Ada Lovelace");
    }
}
