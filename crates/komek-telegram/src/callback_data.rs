//! Typed callback-data wire format.
//!
//! Inline buttons carry a compact string; this module is the single place
//! that encodes and decodes it, so handlers never split strings ad hoc.

use komek_core::{domain::Grade, reports::ReportKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackData {
    /// Grade picked from the start menu.
    Grade(Grade),
    /// Chapter picked from the chapter menu.
    Chapter { grade: Grade, chapter: u32 },
    /// Lesson picked from the lesson menu.
    Lesson {
        grade: Grade,
        chapter: u32,
        lesson: u32,
    },
    /// A chapter rendered as locked behind the subscription.
    LockedChapter { grade: Grade, chapter: u32 },
    /// A chapter rendered as locked until its opening date.
    LockedByDate { grade: Grade, chapter: u32 },
    Subscribe,
    Extend,
    /// Extension period picked, in months.
    ExtendPeriod(u32),
    Report(ReportKind),
}

impl CallbackData {
    pub fn encode(&self) -> String {
        match self {
            CallbackData::Grade(g) => format!("grade{g}"),
            CallbackData::Chapter { grade, chapter } => format!("grade{grade}_chapter_{chapter}"),
            CallbackData::Lesson {
                grade,
                chapter,
                lesson,
            } => format!("grade{grade}_chapter_{chapter}_lesson_{lesson}"),
            CallbackData::LockedChapter { grade, chapter } => {
                format!("locked_chapter_{grade}_{chapter}")
            }
            CallbackData::LockedByDate { grade, chapter } => {
                format!("locked_due_date_{grade}_{chapter}")
            }
            CallbackData::Subscribe => "subscribe".to_string(),
            CallbackData::Extend => "extend".to_string(),
            CallbackData::ExtendPeriod(months) => format!("m{months}"),
            CallbackData::Report(ReportKind::Active) => "active".to_string(),
            CallbackData::Report(ReportKind::Expired) => "expired".to_string(),
            CallbackData::Report(ReportKind::OldExpired) => "expired_old".to_string(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "subscribe" => return Some(CallbackData::Subscribe),
            "extend" => return Some(CallbackData::Extend),
            "active" => return Some(CallbackData::Report(ReportKind::Active)),
            "expired" => return Some(CallbackData::Report(ReportKind::Expired)),
            "expired_old" => return Some(CallbackData::Report(ReportKind::OldExpired)),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix("locked_chapter_") {
            let (grade, chapter) = parse_grade_chapter(rest)?;
            return Some(CallbackData::LockedChapter { grade, chapter });
        }
        if let Some(rest) = data.strip_prefix("locked_due_date_") {
            let (grade, chapter) = parse_grade_chapter(rest)?;
            return Some(CallbackData::LockedByDate { grade, chapter });
        }
        if let Some(rest) = data.strip_prefix("grade") {
            let mut parts = rest.split('_');
            let grade = Grade::parse(parts.next()?).ok()?;
            return match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (None, ..) => Some(CallbackData::Grade(grade)),
                (Some("chapter"), Some(chapter), None, _) => Some(CallbackData::Chapter {
                    grade,
                    chapter: chapter.parse().ok()?,
                }),
                (Some("chapter"), Some(chapter), Some("lesson"), Some(lesson)) => {
                    Some(CallbackData::Lesson {
                        grade,
                        chapter: chapter.parse().ok()?,
                        lesson: lesson.parse().ok()?,
                    })
                }
                _ => None,
            };
        }
        if let Some(rest) = data.strip_prefix('m') {
            return rest.parse().ok().map(CallbackData::ExtendPeriod);
        }

        None
    }
}

fn parse_grade_chapter(rest: &str) -> Option<(Grade, u32)> {
    let (grade, chapter) = rest.split_once('_')?;
    Some((Grade::parse(grade).ok()?, chapter.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(n: u8) -> Grade {
        Grade::new(n).unwrap()
    }

    #[test]
    fn every_variant_round_trips() {
        let cases = [
            CallbackData::Grade(grade(2)),
            CallbackData::Chapter {
                grade: grade(2),
                chapter: 3,
            },
            CallbackData::Lesson {
                grade: grade(4),
                chapter: 1,
                lesson: 12,
            },
            CallbackData::LockedChapter {
                grade: grade(2),
                chapter: 3,
            },
            CallbackData::LockedByDate {
                grade: grade(1),
                chapter: 2,
            },
            CallbackData::Subscribe,
            CallbackData::Extend,
            CallbackData::ExtendPeriod(6),
            CallbackData::Report(ReportKind::Active),
            CallbackData::Report(ReportKind::Expired),
            CallbackData::Report(ReportKind::OldExpired),
        ];
        for case in cases {
            assert_eq!(CallbackData::parse(&case.encode()), Some(case));
        }
    }

    #[test]
    fn wire_strings_are_stable() {
        assert_eq!(CallbackData::Grade(grade(2)).encode(), "grade2");
        assert_eq!(
            CallbackData::Lesson {
                grade: grade(2),
                chapter: 3,
                lesson: 1
            }
            .encode(),
            "grade2_chapter_3_lesson_1"
        );
        assert_eq!(CallbackData::ExtendPeriod(3).encode(), "m3");
    }

    #[test]
    fn junk_does_not_parse() {
        assert_eq!(CallbackData::parse(""), None);
        assert_eq!(CallbackData::parse("grade9"), None);
        assert_eq!(CallbackData::parse("grade2_chapter_x"), None);
        assert_eq!(CallbackData::parse("menu"), None);
        assert_eq!(CallbackData::parse("locked_chapter_2"), None);
    }
}
