use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{error, warn};

use crate::{
    domain::{Grade, LessonKey},
    errors::Error,
    Result,
};

use super::records::{Chapter, Lesson, OpeningDate};

/// Flat-file content store.
///
/// One shared chapter index (`chapters.txt`, sectioned by `Grade N`
/// headers) plus one lesson file per grade (`grade_N.txt`, sectioned by
/// `l<chapter>:` headers). A missing file reads as empty content; write
/// failures are logged and surfaced to the caller, not retried.
#[derive(Clone, Debug)]
pub struct ContentStore {
    chapters_file: PathBuf,
    lessons_dir: PathBuf,
}

impl ContentStore {
    pub fn new(chapters_file: PathBuf, lessons_dir: PathBuf) -> Self {
        Self {
            chapters_file,
            lessons_dir,
        }
    }

    fn lessons_file(&self, grade: Grade) -> PathBuf {
        self.lessons_dir.join(format!("grade_{grade}.txt"))
    }

    /// Chapters of one grade, in file order.
    pub fn chapters(&self, grade: Grade) -> Result<Vec<Chapter>> {
        let Some(text) = read_optional(&self.chapters_file)? else {
            return Ok(Vec::new());
        };

        let mut chapters = Vec::new();
        let mut in_section = false;
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(header) = header_grade(trimmed) {
                match header {
                    Some(n) => in_section = n == grade.number(),
                    None => {
                        warn!("incorrect grade header: {trimmed:?}");
                        in_section = false;
                    }
                }
                continue;
            }
            if !in_section {
                continue;
            }
            match Chapter::parse_line(trimmed) {
                Ok(ch) => chapters.push(ch),
                Err(reason) => warn!("skipping malformed chapter line {trimmed:?}: {reason}"),
            }
        }

        Ok(chapters)
    }

    pub fn chapter(&self, grade: Grade, number: u32) -> Result<Option<Chapter>> {
        Ok(self
            .chapters(grade)?
            .into_iter()
            .find(|ch| ch.number == number))
    }

    /// Rewrite one grade's section, preserving every other line of the
    /// index byte-for-byte.
    pub fn save_chapters(&self, grade: Grade, chapters: &[Chapter]) -> Result<()> {
        let existing = read_optional(&self.chapters_file)?.unwrap_or_default();
        let lines: Vec<&str> = existing.lines().collect();

        let mut out: Vec<String> = Vec::new();
        let mut found = false;
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if header_grade(line.trim()) == Some(Some(grade.number())) {
                found = true;
                out.push(line.to_string());
                out.extend(chapters.iter().map(Chapter::to_line));
                i += 1;
                while i < lines.len() && header_grade(lines[i].trim()).is_none() {
                    i += 1;
                }
                continue;
            }
            out.push(line.to_string());
            i += 1;
        }

        if !found {
            out.push(format!("Grade {grade}"));
            out.extend(chapters.iter().map(Chapter::to_line));
        }

        self.write_lines(&self.chapters_file, &out)
    }

    pub fn rename_chapter(&self, grade: Grade, number: u32, new_name: &str) -> Result<()> {
        let mut chapters = self.chapters(grade)?;
        let chapter = chapters
            .iter_mut()
            .find(|ch| ch.number == number)
            .ok_or_else(|| Error::NotFound(format!("chapter {number} in grade {grade}")))?;
        chapter.name = new_name.to_string();
        self.save_chapters(grade, &chapters)
    }

    pub fn set_opening_date(&self, grade: Grade, number: u32, date: OpeningDate) -> Result<()> {
        let mut chapters = self.chapters(grade)?;
        let chapter = chapters
            .iter_mut()
            .find(|ch| ch.number == number)
            .ok_or_else(|| Error::NotFound(format!("chapter {number} in grade {grade}")))?;
        chapter.opening_date = Some(date);
        self.save_chapters(grade, &chapters)
    }

    /// All lessons of a grade, keyed by chapter number.
    pub fn all_lessons(&self, grade: Grade) -> Result<BTreeMap<u32, Vec<Lesson>>> {
        let Some(text) = read_optional(&self.lessons_file(grade))? else {
            return Ok(BTreeMap::new());
        };

        let mut by_chapter: BTreeMap<u32, Vec<Lesson>> = BTreeMap::new();
        let mut current: Option<u32> = None;
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(section) = section_chapter(trimmed) {
                match section {
                    Some(n) => current = Some(n),
                    None => {
                        warn!("incorrect chapter section header: {trimmed:?}");
                        current = None;
                    }
                }
                continue;
            }
            let Some(chapter) = current else {
                continue;
            };
            match Lesson::parse_line(trimmed) {
                Ok(lesson) => by_chapter.entry(chapter).or_default().push(lesson),
                Err(reason) => warn!("skipping malformed lesson line {trimmed:?}: {reason}"),
            }
        }

        Ok(by_chapter)
    }

    pub fn lessons(&self, grade: Grade, chapter: u32) -> Result<Vec<Lesson>> {
        Ok(self
            .all_lessons(grade)?
            .remove(&chapter)
            .unwrap_or_default())
    }

    pub fn find_lesson(&self, grade: Grade, key: LessonKey) -> Result<Option<Lesson>> {
        Ok(self
            .lessons(grade, key.chapter)?
            .into_iter()
            .find(|l| l.number == key.lesson))
    }

    /// Rewrite a grade's lesson file wholesale: chapters in numeric order,
    /// lessons sorted by number within each chapter.
    pub fn save_lessons(&self, grade: Grade, by_chapter: &BTreeMap<u32, Vec<Lesson>>) -> Result<()> {
        let mut out = Vec::new();
        for (chapter, lessons) in by_chapter {
            out.push(format!("l{chapter}:"));
            let mut lessons = lessons.clone();
            lessons.sort_by_key(|l| l.number);
            out.extend(lessons.iter().map(Lesson::to_line));
        }
        self.write_lines(&self.lessons_file(grade), &out)
    }

    /// Append a lesson with the next free number in its chapter.
    pub fn add_lesson(
        &self,
        grade: Grade,
        chapter: u32,
        name: &str,
        url: Option<String>,
    ) -> Result<LessonKey> {
        let mut all = self.all_lessons(grade)?;
        let lessons = all.entry(chapter).or_default();
        let number = lessons.len() as u32 + 1;
        lessons.push(Lesson {
            number,
            name: name.to_string(),
            url,
        });
        self.save_lessons(grade, &all)?;
        Ok(LessonKey {
            chapter,
            lesson: number,
        })
    }

    pub fn rename_lesson(&self, grade: Grade, key: LessonKey, new_name: &str) -> Result<()> {
        let mut all = self.all_lessons(grade)?;
        let lesson = find_mut(&mut all, key)
            .ok_or_else(|| Error::NotFound(format!("lesson {key} in grade {grade}")))?;
        lesson.name = new_name.to_string();
        self.save_lessons(grade, &all)
    }

    pub fn set_lesson_url(&self, grade: Grade, key: LessonKey, url: &str) -> Result<()> {
        let mut all = self.all_lessons(grade)?;
        let lesson = find_mut(&mut all, key)
            .ok_or_else(|| Error::NotFound(format!("lesson {key} in grade {grade}")))?;
        lesson.url = Some(url.to_string());
        self.save_lessons(grade, &all)
    }

    fn write_lines(&self, path: &Path, lines: &[String]) -> Result<()> {
        let mut text = lines.join("\n");
        text.push('\n');
        fs::write(path, text).map_err(|e| {
            error!("failed to write {}: {e}", path.display());
            Error::from(e)
        })
    }
}

/// `Grade <n>` section header, if this line is one.
fn header_grade(line: &str) -> Option<Option<u8>> {
    let rest = line.strip_prefix("Grade")?;
    Some(rest.trim().parse::<u8>().ok())
}

/// `l<n>:` section header, if this line is one.
fn section_chapter(line: &str) -> Option<Option<u32>> {
    let rest = line.strip_prefix('l')?;
    let (number, _) = rest.split_once(':')?;
    Some(number.parse::<u32>().ok())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("{} not found", path.display());
            Ok(None)
        }
        Err(e) => {
            error!("failed to read {}: {e}", path.display());
            Err(e.into())
        }
    }
}
