//! Move-in deadline policy
//!
//! Pure functions: the verification deadline, the reminder bands around it and the
//! window in which a tenant may report an issue.

use chrono::{DateTime, Duration, Utc};

use crate::error::{ApiError, ApiResult};

/// Hours a tenant has after move-in to confirm or report
pub const VERIFICATION_PERIOD_HOURS: i64 = 24;

/// Hours before the deadline at which reminders go out
pub const REMINDER_THRESHOLDS_HOURS: [i64; 3] = [24, 12, 1];

pub const DEFAULT_REMINDER_WINDOW_MINUTES: i64 = 10;

/// Deadline for a move-in date: exactly 24 hours later
pub fn compute_verification_deadline(move_in_date: Option<DateTime<Utc>>) -> ApiResult<DateTime<Utc>> {
    let move_in_date = move_in_date
        .ok_or_else(|| ApiError::ValidationError("Move-in date is required".to_string()))?;

    Ok(move_in_date + Duration::hours(VERIFICATION_PERIOD_HOURS))
}

/// Parse an RFC 3339 move-in date and compute its deadline
pub fn deadline_from_str(move_in_date: &str) -> ApiResult<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(move_in_date.trim()).map_err(|e| {
        ApiError::ValidationError(format!("Invalid move-in date '{}': {}", move_in_date, e))
    })?;

    compute_verification_deadline(Some(parsed.with_timezone(&Utc)))
}

/// True when `now` falls in the band just before the `target_hours` threshold:
/// `target - window < deadline - now <= target`, and the deadline is still ahead.
pub fn is_within_reminder_window(
    deadline: DateTime<Utc>,
    now: DateTime<Utc>,
    target_hours: i64,
    window_minutes: i64,
) -> bool {
    let remaining = deadline - now;
    let target = Duration::hours(target_hours);
    let band_start = target - Duration::minutes(window_minutes);

    remaining > Duration::zero() && remaining <= target && remaining > band_start
}

/// Accept reports only in `[lease_start, deadline)`
pub fn check_reporting_window(lease_start: DateTime<Utc>, now: DateTime<Utc>) -> ApiResult<()> {
    let deadline = compute_verification_deadline(Some(lease_start))?;

    if now < lease_start {
        return Err(ApiError::WindowClosed(format!(
            "Issues can be reported from {}",
            lease_start.to_rfc3339()
        )));
    }
    if now >= deadline {
        return Err(ApiError::WindowExpired(format!(
            "The reporting window closed at {}",
            deadline.to_rfc3339()
        )));
    }

    Ok(())
}

/// Title of the tenant reminder for a threshold; also the dedup key
pub fn reminder_title(hours: i64) -> String {
    format!("Move-in verification reminder ({}h)", hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn move_in() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_deadline_is_exactly_24_hours_later() {
        for offset_minutes in [0, 1, 59, 60 * 13, 60 * 24 * 400] {
            let date = move_in() + Duration::minutes(offset_minutes);
            let deadline = compute_verification_deadline(Some(date)).unwrap();
            assert_eq!(deadline - date, Duration::hours(24));
        }
    }

    #[test]
    fn test_deadline_requires_a_date() {
        assert!(matches!(
            compute_verification_deadline(None),
            Err(ApiError::ValidationError(_))
        ));
        assert!(matches!(
            deadline_from_str("not-a-date"),
            Err(ApiError::ValidationError(_))
        ));
        assert_eq!(
            deadline_from_str("2026-03-01T14:30:00Z").unwrap(),
            move_in() + Duration::hours(24)
        );
    }

    #[test]
    fn test_reminder_window_bounds() {
        let deadline = move_in() + Duration::hours(24);

        // Exactly at the threshold counts
        assert!(is_within_reminder_window(deadline, deadline - Duration::hours(24), 24, 10));
        assert!(is_within_reminder_window(
            deadline,
            deadline - Duration::hours(23) - Duration::minutes(55),
            24,
            10
        ));
        // Band start is exclusive
        assert!(!is_within_reminder_window(
            deadline,
            deadline - Duration::hours(23) - Duration::minutes(50),
            24,
            10
        ));
        // Before the threshold
        assert!(!is_within_reminder_window(
            deadline,
            deadline - Duration::hours(24) - Duration::seconds(1),
            24,
            10
        ));
        assert!(is_within_reminder_window(deadline, deadline - Duration::minutes(55), 1, 10));
        // Past the deadline never fires
        assert!(!is_within_reminder_window(deadline, deadline, 1, 10));
        assert!(!is_within_reminder_window(deadline, deadline + Duration::minutes(1), 1, 120));
    }

    #[test]
    fn test_reporting_window() {
        let start = move_in();
        assert!(check_reporting_window(start, start).is_ok());
        assert!(check_reporting_window(start, start + Duration::hours(23)).is_ok());
        assert!(matches!(
            check_reporting_window(start, start - Duration::seconds(1)),
            Err(ApiError::WindowClosed(_))
        ));
        assert!(matches!(
            check_reporting_window(start, start + Duration::hours(24)),
            Err(ApiError::WindowExpired(_))
        ));
    }

    #[test]
    fn test_reminder_title() {
        assert_eq!(reminder_title(24), "Move-in verification reminder (24h)");
        assert!(reminder_title(1).contains("(1h)"));
    }
}
