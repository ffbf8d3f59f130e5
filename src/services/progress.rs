use crate::db::types::EnrollmentStatus;

/// round(100 * completed / total), half-up. An enrollment snapshotted from a
/// course with no lessons reports 0 rather than dividing by zero.
pub(crate) fn completion_percentage(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as i32
}

/// The only automatic transition: active -> completed at the 100% threshold.
/// Completed and dropped are terminal here; recomputation never reverts them.
pub(crate) fn next_status(current: EnrollmentStatus, percentage: i32) -> EnrollmentStatus {
    match current {
        EnrollmentStatus::Active if percentage >= 100 => EnrollmentStatus::Completed,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(completion_percentage(0, 3), 0);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 67);
        assert_eq!(completion_percentage(3, 3), 100);
        assert_eq!(completion_percentage(1, 8), 13); // 12.5 rounds up
        assert_eq!(completion_percentage(1, 40), 3); // 2.5 rounds up
        assert_eq!(completion_percentage(1, 6), 17);
    }

    #[test]
    fn percentage_of_empty_snapshot_is_zero() {
        assert_eq!(completion_percentage(0, 0), 0);
    }

    #[test]
    fn active_completes_at_threshold() {
        assert_eq!(next_status(EnrollmentStatus::Active, 99), EnrollmentStatus::Active);
        assert_eq!(next_status(EnrollmentStatus::Active, 100), EnrollmentStatus::Completed);
    }

    #[test]
    fn transition_is_one_way() {
        assert_eq!(next_status(EnrollmentStatus::Completed, 50), EnrollmentStatus::Completed);
        assert_eq!(next_status(EnrollmentStatus::Dropped, 100), EnrollmentStatus::Dropped);
    }
}
