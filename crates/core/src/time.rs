//! Timestamp helpers.

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at microsecond precision.
///
/// Postgres `timestamptz` stores microseconds; truncating here keeps the
/// values returned by a write identical to what a later read yields.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn now_has_no_sub_microsecond_component() {
        assert_eq!(now().nanosecond() % 1_000, 0);
    }
}
