use chrono::{DateTime, Utc};

/// Describe how long ago `since` was, e.g. "just now", "5m ago", "2h ago", "3d ago"
pub fn age_display(since: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - since).num_minutes();
    if minutes < 1 {
        // Includes negative ages from clock skew
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

/// Show only the last few characters of a secret, for logs and status output
pub fn mask_token(token: &str) -> String {
    const VISIBLE: usize = 4;
    let count = token.chars().count();
    if count <= VISIBLE * 2 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - VISIBLE).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_age_display_just_now() {
        assert_eq!(age_display(Utc::now()), "just now");
        assert_eq!(age_display(Utc::now() + Duration::minutes(5)), "just now");
    }

    #[test]
    fn test_age_display_minutes_and_hours() {
        assert_eq!(age_display(Utc::now() - Duration::minutes(5)), "5m ago");
        assert_eq!(age_display(Utc::now() - Duration::minutes(70)), "1h ago");
        assert_eq!(age_display(Utc::now() - Duration::minutes(95)), "2h ago");
    }

    #[test]
    fn test_age_display_days() {
        assert_eq!(age_display(Utc::now() - Duration::hours(30)), "1d ago");
        assert_eq!(age_display(Utc::now() - Duration::hours(40)), "2d ago");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9.payload.sig1234"), "...1234");
    }
}
