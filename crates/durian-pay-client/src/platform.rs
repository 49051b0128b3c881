use serde::{Deserialize, Serialize};

/// Device class reported to the attestation SDK on init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Pc,
}

impl Platform {
    /// Classify a user agent string, case-insensitively.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("android") {
            Platform::Android
        } else if ua.contains("iphone") {
            Platform::Ios
        } else {
            Platform::Pc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Pc => "pc",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_user_agent() {
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8)"),
            Platform::Android
        );
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
            Platform::Ios
        );
        assert_eq!(
            Platform::from_user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)"),
            Platform::Pc
        );
        assert_eq!(Platform::from_user_agent(""), Platform::Pc);
    }

    #[test]
    fn test_android_wins_over_iphone() {
        assert_eq!(Platform::from_user_agent("android iphone"), Platform::Android);
    }

    #[test]
    fn test_ipad_is_pc() {
        assert_eq!(Platform::from_user_agent("Mozilla/5.0 (iPad; CPU OS 17_0)"), Platform::Pc);
    }
}
