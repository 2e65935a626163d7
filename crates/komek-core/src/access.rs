//! Chapter access policy.
//!
//! For a given viewer and chapter, the decision is one of three states,
//! first match wins: a pending opening date locks for everyone, a locked
//! access mode locks for non-admin non-subscribers, everything else is
//! open. Gating happens only at chapter granularity; lessons inside an
//! open chapter are always visible.

use chrono::{Datelike, NaiveDate};

use crate::content::{AccessMode, Chapter, OpeningDate};

/// The caller's standing with the subscription ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewer {
    pub is_admin: bool,
    pub is_subscriber: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Open,
    LockedBySubscription,
    LockedByDate(OpeningDate),
}

pub fn chapter_access(chapter: &Chapter, viewer: Viewer, today: NaiveDate) -> Access {
    if let Some(date) = chapter.opening_date {
        if opens_later(today, date) {
            return Access::LockedByDate(date);
        }
    }
    if chapter.access == AccessMode::Locked && !viewer.is_admin && !viewer.is_subscriber {
        return Access::LockedBySubscription;
    }
    Access::Open
}

/// Whether `today` is strictly before the next occurrence of the annually
/// recurring `opening` date.
///
/// The comparison is wrap-aware: the opening counts as "later" when its
/// next occurrence is less than half a year ahead, so 31/12 is before an
/// 01/01 opening while 02/01 is not. For same-year pairs this degrades to
/// the plain day/month comparison.
fn opens_later(today: NaiveDate, opening: OpeningDate) -> bool {
    let today = cycle_ordinal(today.month(), today.day());
    let opening = cycle_ordinal(opening.month, opening.day);
    let ahead = (opening - today).rem_euclid(366);
    ahead != 0 && ahead < 183
}

/// Day-of-year in a fixed leap year, so 29/02 has a slot.
fn cycle_ordinal(month: u32, day: u32) -> i64 {
    NaiveDate::from_ymd_opt(2000, month, day)
        .map(|d| i64::from(d.ordinal()))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(access: AccessMode, opening_date: Option<OpeningDate>) -> Chapter {
        Chapter {
            number: 3,
            name: "Дроби".to_string(),
            access,
            opening_date,
        }
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    const NOBODY: Viewer = Viewer {
        is_admin: false,
        is_subscriber: false,
    };

    #[test]
    fn date_gate_wraps_around_new_year() {
        let ch = chapter(AccessMode::Open, Some(OpeningDate { day: 1, month: 1 }));

        assert_eq!(
            chapter_access(&ch, NOBODY, date(2026, 12, 31)),
            Access::LockedByDate(OpeningDate { day: 1, month: 1 })
        );
        assert_eq!(chapter_access(&ch, NOBODY, date(2026, 1, 2)), Access::Open);
        assert_eq!(chapter_access(&ch, NOBODY, date(2026, 1, 1)), Access::Open);
    }

    #[test]
    fn date_gate_same_year_is_plain_comparison() {
        let ch = chapter(AccessMode::Open, Some(OpeningDate { day: 1, month: 9 }));

        assert!(matches!(
            chapter_access(&ch, NOBODY, date(2026, 3, 15)),
            Access::LockedByDate(_)
        ));
        assert_eq!(chapter_access(&ch, NOBODY, date(2026, 10, 15)), Access::Open);
    }

    #[test]
    fn date_gate_applies_even_to_admins() {
        let ch = chapter(AccessMode::Locked, Some(OpeningDate { day: 1, month: 9 }));
        let admin = Viewer {
            is_admin: true,
            is_subscriber: false,
        };

        assert!(matches!(
            chapter_access(&ch, admin, date(2026, 3, 15)),
            Access::LockedByDate(_)
        ));
    }

    #[test]
    fn locked_chapter_requires_subscription_or_admin() {
        let ch = chapter(AccessMode::Locked, None);
        let today = date(2026, 8, 4);

        assert_eq!(
            chapter_access(&ch, NOBODY, today),
            Access::LockedBySubscription
        );
        let subscriber = Viewer {
            is_admin: false,
            is_subscriber: true,
        };
        assert_eq!(chapter_access(&ch, subscriber, today), Access::Open);
        let admin = Viewer {
            is_admin: true,
            is_subscriber: false,
        };
        assert_eq!(chapter_access(&ch, admin, today), Access::Open);
    }

    #[test]
    fn open_chapter_is_open_to_everyone() {
        let ch = chapter(AccessMode::Open, None);
        assert_eq!(chapter_access(&ch, NOBODY, date(2026, 8, 4)), Access::Open);
    }
}
