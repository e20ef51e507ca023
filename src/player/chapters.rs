use crate::api::ScriptContent;
use serde::Serialize;

/// Offsets used when the backend supplies no chapter structure.
pub const FALLBACK_FRACTIONS: [f64; 6] = [0.0, 0.15, 0.35, 0.55, 0.75, 0.9];

pub const FALLBACK_TITLES: [&str; 6] = [
    "Introduction",
    "Background",
    "Key Findings",
    "Methodology",
    "Implications",
    "Conclusion",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub title: String,
    pub start_seconds: f64,
}

impl Chapter {
    pub fn new(title: impl Into<String>, start_seconds: f64) -> Self {
        Self {
            title: title.into(),
            start_seconds,
        }
    }
}

/// Where chapter boundaries come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ChapterSource {
    /// Already timed chapters.
    Explicit(Vec<Chapter>),
    /// Script sections, timed by word share once the duration is known.
    Script(ScriptContent),
    Fallback,
}

/// Six chapters at fixed fractions of `duration`.
pub fn fallback_chapters(duration: f64) -> Vec<Chapter> {
    FALLBACK_FRACTIONS
        .iter()
        .zip(FALLBACK_TITLES)
        .map(|(fraction, title)| Chapter::new(title, duration * fraction))
        .collect()
}

/// Section titles with starts proportional to the words spoken before them.
pub fn script_chapters(script: &ScriptContent, duration: f64) -> Vec<Chapter> {
    let counts: Vec<usize> = script.sections.iter().map(|s| s.word_count()).collect();
    let total: usize = counts.iter().sum();
    if script.sections.is_empty() {
        return Vec::new();
    }

    let mut elapsed = 0usize;
    script
        .sections
        .iter()
        .zip(counts)
        .map(|(section, words)| {
            let start = if total == 0 {
                0.0
            } else {
                duration * elapsed as f64 / total as f64
            };
            elapsed += words;
            Chapter::new(section.title.clone(), start)
        })
        .collect()
}

/// Sorted, first start pinned to zero, starts clamped into the track.
fn normalize(mut chapters: Vec<Chapter>, duration: f64) -> Vec<Chapter> {
    chapters.retain(|c| c.start_seconds.is_finite());
    chapters.sort_by(|a, b| a.start_seconds.total_cmp(&b.start_seconds));
    for chapter in chapters.iter_mut() {
        chapter.start_seconds = chapter.start_seconds.max(0.0);
        if duration > 0.0 {
            chapter.start_seconds = chapter.start_seconds.min(duration);
        }
    }
    if let Some(first) = chapters.first_mut() {
        first.start_seconds = 0.0;
    }
    chapters
}

/// Index of the chapter containing `time`: `start[i] <= time < start[i + 1]`,
/// the last chapter being open-ended.
pub fn chapter_index_at(chapters: &[Chapter], time: f64) -> Option<usize> {
    if chapters.is_empty() {
        return None;
    }
    let after = chapters.partition_point(|c| c.start_seconds <= time);
    Some(after.saturating_sub(1))
}

/// The chapter list currently in effect for one asset.
///
/// Resolution is redone whenever the duration changes, so the fallback picks
/// up the real length once metadata arrives.
#[derive(Debug, Clone)]
pub struct ChapterTimetable {
    source: ChapterSource,
    duration: f64,
    chapters: Vec<Chapter>,
}

impl ChapterTimetable {
    pub fn new(source: ChapterSource) -> Self {
        let mut timetable = Self {
            source,
            duration: 0.0,
            chapters: Vec::new(),
        };
        timetable.resolve();
        timetable
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn source(&self) -> &ChapterSource {
        &self.source
    }

    pub fn set_source(&mut self, source: ChapterSource) {
        self.source = source;
        self.resolve();
    }

    /// Returns true when the timetable was rebuilt.
    pub fn set_duration(&mut self, duration: f64) -> bool {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        if duration == self.duration {
            return false;
        }
        self.duration = duration;
        self.resolve();
        true
    }

    pub fn index_at(&self, time: f64) -> Option<usize> {
        chapter_index_at(&self.chapters, time)
    }

    fn resolve(&mut self) {
        let duration = self.duration;
        let chapters = match &self.source {
            ChapterSource::Explicit(list) if !list.is_empty() => list.clone(),
            ChapterSource::Script(script) if duration > 0.0 => {
                let chapters = script_chapters(script, duration);
                if chapters.is_empty() {
                    fallback_chapters(duration)
                } else {
                    chapters
                }
            }
            _ if duration > 0.0 => fallback_chapters(duration),
            _ => Vec::new(),
        };
        self.chapters = normalize(chapters, duration);
    }
}
