use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A payload together with the time it was written to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_display(&self) -> String {
        age_display(self.cached_at, Utc::now())
    }
}

/// Human-readable age of a cache write relative to `now`.
pub fn age_display(cached_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - cached_at).num_minutes();
    if minutes < 1 {
        // Also covers clock skew (negative age)
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let remaining_mins = minutes % 60;
        if remaining_mins >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        let remaining_hours = (minutes % 1440) / 60;
        if remaining_hours >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_cached_data_age_display_just_now() {
        let cached = CachedData::new(vec![1, 2, 3]);
        assert_eq!(cached.age_display(), "just now");
    }

    #[test]
    fn test_age_display_buckets() {
        let now = Utc::now();
        assert_eq!(age_display(now + Duration::minutes(5), now), "just now");
        assert_eq!(age_display(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(age_display(now - Duration::minutes(90), now), "2h ago");
        assert_eq!(age_display(now - Duration::minutes(70), now), "1h ago");
        assert_eq!(age_display(now - Duration::hours(26), now), "1d ago");
        assert_eq!(age_display(now - Duration::hours(40), now), "2d ago");
    }
}
