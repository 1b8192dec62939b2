use chrono::{DateTime, Duration, Utc};
use colored::*;

use crate::auth::TokenState;

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds().abs();
    if secs >= 86_400 {
        format!("{}d", secs / 86_400)
    } else if secs >= 3_600 {
        format!("{}h {}m", secs / 3_600, (secs % 3_600) / 60)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// "in 42m" / "3h 5m ago" relative to now.
pub fn format_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = expires_at.signed_duration_since(now);
    if remaining.num_seconds() >= 0 {
        format!("in {}", format_duration(remaining))
    } else {
        format!("{} ago", format_duration(remaining))
    }
}

pub fn format_state(state: TokenState) -> ColoredString {
    let label = state.to_string();
    match state {
        TokenState::Valid => label.green(),
        TokenState::NearExpiry | TokenState::Refreshing => label.yellow(),
        TokenState::Expired => label.red(),
        TokenState::Unauthenticated => label.dimmed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_expiry() {
        let now = Utc::now();
        assert_eq!(format_expiry(now + Duration::minutes(42), now), "in 42m");
        assert_eq!(
            format_expiry(now - Duration::minutes(185), now),
            "3h 5m ago"
        );
        assert_eq!(format_expiry(now + Duration::days(3), now), "in 3d");
    }
}
