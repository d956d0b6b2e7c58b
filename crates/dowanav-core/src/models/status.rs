use serde::{Deserialize, Serialize};

/// Health report served by the host at `/dowa/navigation/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationStatus {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl NavigationStatus {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn supports(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        let json = r#"{"status": "active", "version": "1.0.0", "features": ["authentication", "templates", "shared_workflows", "user_settings"]}"#;
        let status: NavigationStatus = serde_json::from_str(json).unwrap();
        assert!(status.is_active());
        assert_eq!(status.version, "1.0.0");
        assert!(status.supports("authentication"));
        assert!(!status.supports("billing"));
    }
}
