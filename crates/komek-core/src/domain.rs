use std::fmt;

use crate::{errors::Error, Result};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric). Equal to the user id for private chats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// School-year cohort. All content and some access rules are partitioned by
/// grade; only grades 1 through 4 exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grade(u8);

impl Grade {
    pub const ALL: [Grade; 4] = [Grade(1), Grade(2), Grade(3), Grade(4)];

    pub fn new(n: u8) -> Result<Self> {
        if (1..=4).contains(&n) {
            Ok(Self(n))
        } else {
            Err(Error::Validation(format!("grade out of range: {n}")))
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let n: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("grade is not a number: {s:?}")))?;
        Self::new(n)
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite lesson key `l<chapter>_<lesson>`, as used in the lesson files
/// and the admin edit commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LessonKey {
    pub chapter: u32,
    pub lesson: u32,
}

impl LessonKey {
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || Error::Validation(format!("bad lesson key: {s:?}"));

        let rest = s.trim().strip_prefix('l').ok_or_else(bad)?;
        let (chapter, lesson) = rest.split_once('_').ok_or_else(bad)?;
        Ok(Self {
            chapter: chapter.parse().map_err(|_| bad())?,
            lesson: lesson.parse().map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for LessonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}_{}", self.chapter, self.lesson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_accepts_1_through_4_only() {
        assert!(Grade::new(1).is_ok());
        assert!(Grade::new(4).is_ok());
        assert!(Grade::new(0).is_err());
        assert!(Grade::new(5).is_err());
        assert!(Grade::parse("3").is_ok());
        assert!(Grade::parse("three").is_err());
    }

    #[test]
    fn lesson_key_round_trips() {
        let key = LessonKey::parse("l3_12").unwrap();
        assert_eq!(key.chapter, 3);
        assert_eq!(key.lesson, 12);
        assert_eq!(key.to_string(), "l3_12");

        assert!(LessonKey::parse("3_12").is_err());
        assert!(LessonKey::parse("l3").is_err());
        assert!(LessonKey::parse("l3_x").is_err());
    }
}
