use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cached session and rate-limit state for one user identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub vehicle_key: Option<String>,
    #[serde(default)]
    pub cookies: Vec<String>,
    #[serde(default)]
    pub authenticated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_command_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub command_count: u32,
}

impl SessionRecord {
    /// A cached session is usable when it carries a vehicle key
    pub fn has_session(&self) -> bool {
        self.vehicle_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Most recent of login and command activity
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        match (self.authenticated_at, self.last_command_at) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// True when nothing has happened for longer than `max_idle`
    pub fn is_idle(&self, max_idle: Duration, now: DateTime<Utc>) -> bool {
        match self.last_activity() {
            Some(at) => now - at > max_idle,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_session() {
        let mut record = SessionRecord::default();
        assert!(!record.has_session());
        record.vehicle_key = Some(String::new());
        assert!(!record.has_session());
        record.vehicle_key = Some("vk".to_string());
        assert!(record.has_session());
    }

    #[test]
    fn test_last_activity_picks_latest() {
        let now = Utc::now();
        let record = SessionRecord {
            authenticated_at: Some(now - Duration::hours(3)),
            last_command_at: Some(now - Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(record.last_activity(), Some(now - Duration::hours(1)));
    }

    #[test]
    fn test_is_idle() {
        let now = Utc::now();
        let record = SessionRecord {
            last_command_at: Some(now - Duration::days(10)),
            ..Default::default()
        };
        assert!(record.is_idle(Duration::days(7), now));
        assert!(!record.is_idle(Duration::days(30), now));
        assert!(SessionRecord::default().is_idle(Duration::days(30), now));
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let record: SessionRecord = serde_json::from_str(r#"{"vehicle_key":"vk"}"#).unwrap();
        assert_eq!(record.vehicle_key.as_deref(), Some("vk"));
        assert_eq!(record.command_count, 0);
        assert!(record.cookies.is_empty());
    }
}
