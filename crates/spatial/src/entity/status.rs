use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Active,
    Idle,
    Alert,
    #[default]
    Unknown,
}

impl EntityStatus {
    pub fn classify(raw: &str) -> Self {
        match raw {
            "active" => Self::Active,
            "idle" => Self::Idle,
            "alert" => Self::Alert,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Alert => "alert",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&str> for EntityStatus {
    fn from(value: &str) -> Self {
        Self::classify(value)
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses() {
        assert_eq!(EntityStatus::classify("active"), EntityStatus::Active);
        assert_eq!(EntityStatus::classify("idle"), EntityStatus::Idle);
        assert_eq!(EntityStatus::classify("alert"), EntityStatus::Alert);
    }

    #[test]
    fn test_unrecognized_status_is_unknown() {
        assert_eq!(EntityStatus::classify("ACTIVE"), EntityStatus::Unknown);
        assert_eq!(EntityStatus::classify(""), EntityStatus::Unknown);
        assert_eq!(EntityStatus::classify("offline"), EntityStatus::Unknown);
    }
}
