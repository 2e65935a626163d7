//! Tagged record types for the two flat-file formats, with their line
//! codecs. Parsing and serialization live here so they can be round-trip
//! tested independently of the access-policy logic.
//!
//! Chapter index lines: `<num>: <name>{<mode>}[<dd/mm>]`, where both the
//! `{}` and `[]` tags are optional. Lesson lines: `<num>: <name> (<url>)`,
//! with the `(<url>)` suffix optional.

use std::fmt;

use crate::{errors::Error, Result};

/// Whether a chapter is gated behind a paid subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccessMode {
    #[default]
    Open,
    Locked,
}

impl AccessMode {
    fn parse(tag: &str) -> Self {
        if tag.trim() == "locked" {
            AccessMode::Locked
        } else {
            AccessMode::Open
        }
    }
}

/// Annually recurring opening date (day/month, no year).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpeningDate {
    pub day: u32,
    pub month: u32,
}

impl OpeningDate {
    pub fn parse(s: &str) -> Result<Self> {
        let bad = || Error::Validation(format!("bad opening date: {s:?}"));

        let (day, month) = s.trim().split_once('/').ok_or_else(bad)?;
        let day: u32 = day.parse().map_err(|_| bad())?;
        let month: u32 = month.parse().map_err(|_| bad())?;

        // Validate against a leap year so 29/02 is representable.
        if chrono::NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(bad());
        }
        Ok(Self { day, month })
    }
}

impl fmt::Display for OpeningDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}", self.day, self.month)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chapter {
    pub number: u32,
    pub name: String,
    pub access: AccessMode,
    pub opening_date: Option<OpeningDate>,
}

impl Chapter {
    /// Decode one chapter record line. Returns the reason on malformed
    /// input; the store logs it and skips the line.
    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        let (number, rest) = line
            .split_once(':')
            .ok_or_else(|| "missing ':' separator".to_string())?;
        let number: u32 = number
            .trim()
            .parse()
            .map_err(|_| format!("bad chapter number {number:?}"))?;

        let rest = rest.trim();
        let name_end = rest.find(['{', '[']).unwrap_or(rest.len());
        let name = rest[..name_end].trim().to_string();

        let access = match slice_between(rest, '{', '}') {
            Some(tag) => AccessMode::parse(tag),
            None => AccessMode::Open,
        };

        let opening_date = match slice_between(rest, '[', ']') {
            Some(tag) => Some(OpeningDate::parse(tag).map_err(|e| e.to_string())?),
            None => None,
        };

        Ok(Self {
            number,
            name,
            access,
            opening_date,
        })
    }

    pub fn to_line(&self) -> String {
        let mut line = format!("{}: {}", self.number, self.name);
        if self.access == AccessMode::Locked {
            line.push_str("{locked}");
        }
        if let Some(date) = self.opening_date {
            line.push_str(&format!("[{date}]"));
        }
        line
    }
}

fn slice_between(s: &str, open: char, close: char) -> Option<&str> {
    let start = s.find(open)?;
    let rest = &s[start + open.len_utf8()..];
    let end = rest.find(close)?;
    Some(&rest[..end])
}

/// Readiness of a lesson's video link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoStatus<'a> {
    /// No URL set yet.
    NotReady,
    /// URL present and looks like a link.
    Ready(&'a str),
    /// URL present but has no path separator; an operator alert is due.
    Broken(&'a str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lesson {
    pub number: u32,
    pub name: String,
    pub url: Option<String>,
}

impl Lesson {
    pub fn parse_line(line: &str) -> std::result::Result<Self, String> {
        let (number, rest) = line
            .split_once(':')
            .ok_or_else(|| "missing ':' separator".to_string())?;
        let number: u32 = number
            .trim()
            .parse()
            .map_err(|_| format!("bad lesson number {number:?}"))?;

        let rest = rest.trim();
        let (name, url) = match rest.rsplit_once(" (") {
            Some((name, tail)) if tail.ends_with(')') => (
                name.trim().to_string(),
                Some(tail[..tail.len() - 1].trim().to_string()),
            ),
            _ => (rest.to_string(), None),
        };

        Ok(Self { number, name, url })
    }

    pub fn to_line(&self) -> String {
        match &self.url {
            Some(url) => format!("    {}: {} ({})", self.number, self.name, url),
            None => format!("    {}: {}", self.number, self.name),
        }
    }

    pub fn video(&self) -> VideoStatus<'_> {
        match self.url.as_deref() {
            None => VideoStatus::NotReady,
            Some(url) if url.contains('/') => VideoStatus::Ready(url),
            Some(url) => VideoStatus::Broken(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_line_with_all_tags() {
        let ch = Chapter::parse_line("3: Дроби{locked}[01/09]").unwrap();
        assert_eq!(ch.number, 3);
        assert_eq!(ch.name, "Дроби");
        assert_eq!(ch.access, AccessMode::Locked);
        assert_eq!(ch.opening_date, Some(OpeningDate { day: 1, month: 9 }));
        assert_eq!(ch.to_line(), "3: Дроби{locked}[01/09]");
    }

    #[test]
    fn chapter_line_without_tags_is_open() {
        let ch = Chapter::parse_line("1: Числа").unwrap();
        assert_eq!(ch.access, AccessMode::Open);
        assert_eq!(ch.opening_date, None);
        assert_eq!(ch.to_line(), "1: Числа");
    }

    #[test]
    fn chapter_line_unknown_mode_is_open() {
        let ch = Chapter::parse_line("2: Счет{vip}").unwrap();
        assert_eq!(ch.access, AccessMode::Open);
        assert_eq!(ch.name, "Счет");
    }

    #[test]
    fn malformed_chapter_lines_report_reason() {
        assert!(Chapter::parse_line("no separator here").is_err());
        assert!(Chapter::parse_line("x: Имя").is_err());
        assert!(Chapter::parse_line("4: Имя[99/99]").is_err());
    }

    #[test]
    fn opening_date_rejects_impossible_days() {
        assert!(OpeningDate::parse("29/02").is_ok());
        assert!(OpeningDate::parse("31/02").is_err());
        assert!(OpeningDate::parse("00/05").is_err());
        assert_eq!(OpeningDate::parse("1/9").unwrap().to_string(), "01/09");
    }

    #[test]
    fn lesson_line_with_url() {
        let lesson = Lesson::parse_line("    2: Сложение (https://vimeo.com/1)").unwrap();
        assert_eq!(lesson.number, 2);
        assert_eq!(lesson.name, "Сложение");
        assert_eq!(lesson.url.as_deref(), Some("https://vimeo.com/1"));
        assert_eq!(lesson.video(), VideoStatus::Ready("https://vimeo.com/1"));
    }

    #[test]
    fn lesson_line_without_url_is_not_ready() {
        let lesson = Lesson::parse_line("1: Вычитание").unwrap();
        assert_eq!(lesson.url, None);
        assert_eq!(lesson.video(), VideoStatus::NotReady);
        assert_eq!(lesson.to_line(), "    1: Вычитание");
    }

    #[test]
    fn lesson_url_without_path_is_broken() {
        let lesson = Lesson::parse_line("1: Урок (oops)").unwrap();
        assert_eq!(lesson.video(), VideoStatus::Broken("oops"));
    }
}
