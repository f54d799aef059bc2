use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single home feed item.
///
/// Entries are immutable values. A feed is an ordered `Vec<FeedEntry>` in the
/// order the server returned it; the client never re-sorts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FeedEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(rename = "createdAt")]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl FeedEntry {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        subtitle: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: subtitle.into(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_entry() {
        let json = r#"{"id":"1","title":"Pix recebido","subtitle":"R$ 50,00 de Maria","createdAt":"2025-01-10T12:00:00Z"}"#;
        let entry: FeedEntry = serde_json::from_str(json).expect("parse feed entry");
        assert_eq!(entry.id, "1");
        assert_eq!(entry.subtitle, "R$ 50,00 de Maria");
        assert_eq!(entry.created_at.to_rfc3339(), "2025-01-10T12:00:00+00:00");
    }

    #[test]
    fn test_sequence_equality_is_order_sensitive() {
        let at = DateTime::from_timestamp(1_736_510_400, 0).unwrap_or_default();
        let a = FeedEntry::new("1", "A", "", at);
        let b = FeedEntry::new("2", "B", "", at);
        assert_eq!(vec![a.clone(), b.clone()], vec![a.clone(), b.clone()]);
        assert_ne!(vec![a.clone(), b.clone()], vec![b, a]);
    }
}
