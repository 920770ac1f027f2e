//! Turns a provider's free-text answer to the standard prompt into the
//! four-section report.

use once_cell::sync::Lazy;
use regex::Regex;
use crate::models::{ProducedBy, StructuredResult};

/// Entries this short are dropped as noise.
const MIN_ENTRY_LEN: usize = 10;
/// Short lines are headings when they mention a keyword anywhere. Longer ones
/// only when a keyword opens the line and it does not end like a sentence.
const MAX_HEADING_WORDS: usize = 6;

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[#*\->•\s]+|\d+[.)](?:\s+|$))+").expect("valid list marker regex")
});

/// Words a long heading may open with before its keyword.
static LEADING_FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:a|an|the|comprehensive|overall|executive|brief|general)\s+)*")
        .expect("valid filler regex")
});

/// Heading keywords per section, checked in this order; first match wins.
static HEADINGS: Lazy<Vec<(Section, Regex)>> = Lazy::new(|| {
    [
        (Section::Insights, r"(?i)key insights|insights|patterns|trends"),
        (Section::Recommendations, r"(?i)recommendations|suggested actions|next steps"),
        (Section::DataQuality, r"(?i)data quality|improvements|issues|concerns"),
        (Section::Summary, r"(?i)summary|overview"),
    ]
    .into_iter()
    .map(|(section, pattern)| (section, Regex::new(pattern).expect("valid heading regex")))
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Summary,
    Insights,
    Recommendations,
    DataQuality,
}

/// Line-by-line classifier. `current` only changes on heading lines, and
/// heading lines are never stored.
#[derive(Debug)]
struct SectionParser {
    current: Section,
    summary: Vec<String>,
    insights: Vec<String>,
    recommendations: Vec<String>,
    data_quality: Vec<String>,
}

impl SectionParser {
    fn new() -> Self {
        Self {
            current: Section::Summary,
            summary: Vec::new(),
            insights: Vec::new(),
            recommendations: Vec::new(),
            data_quality: Vec::new(),
        }
    }

    fn feed(&mut self, raw: &str) {
        let line = clean_line(raw);
        if line.is_empty() {
            return;
        }
        if let Some(section) = heading_section(line) {
            self.current = section;
            return;
        }
        let bucket = match self.current {
            Section::Summary => &mut self.summary,
            Section::Insights => &mut self.insights,
            Section::Recommendations => &mut self.recommendations,
            Section::DataQuality => &mut self.data_quality,
        };
        bucket.push(line.to_string());
    }
}

/// Strips markdown decoration and list numbering. An empty result means the
/// line carried nothing but a marker.
fn clean_line(raw: &str) -> &str {
    let line = raw.trim();
    let line = match LIST_MARKER.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    };
    line.trim_end_matches(|c: char| c == '*' || c.is_whitespace())
}

/// Section a heading line switches to, or `None` for content lines.
pub fn heading_section(line: &str) -> Option<Section> {
    let title = line.trim_end_matches(|c: char| c == ':' || c == '*' || c.is_whitespace());
    if title.split_whitespace().count() <= MAX_HEADING_WORDS {
        return HEADINGS
            .iter()
            .find(|(_, re)| re.is_match(title))
            .map(|(section, _)| *section);
    }

    if title.ends_with(|c: char| matches!(c, '.' | '!' | '?')) {
        return None;
    }
    let lead = LEADING_FILLER.find(title).map_or(0, |m| m.end());
    let rest = &title[lead..];
    HEADINGS
        .iter()
        .find(|(_, re)| matches!(re.find(rest), Some(m) if m.start() == 0))
        .map(|(section, _)| *section)
}

fn keep_meaningful(entries: Vec<String>, placeholder: String) -> Vec<String> {
    let kept: Vec<String> = entries
        .into_iter()
        .filter(|e| e.chars().count() > MIN_ENTRY_LEN)
        .collect();
    if kept.is_empty() {
        vec![placeholder]
    } else {
        kept
    }
}

/// Splits provider text into summary, insights, recommendations and data
/// quality notes. List sections are never empty.
pub fn structure_response(text: &str, document_name: &str, produced_by: ProducedBy) -> StructuredResult {
    let mut parser = SectionParser::new();
    for line in text.lines() {
        parser.feed(line);
    }

    let summary = if parser.summary.is_empty() {
        format!("Analysis of \"{}\" completed.", document_name)
    } else {
        parser.summary.join(" ")
    };

    StructuredResult {
        summary,
        insights: keep_meaningful(
            parser.insights,
            format!("No specific insights were identified for \"{}\"; see the summary.", document_name),
        ),
        recommendations: keep_meaningful(
            parser.recommendations,
            format!("No specific recommendations were identified for \"{}\".", document_name),
        ),
        data_quality_issues: keep_meaningful(
            parser.data_quality,
            format!("No specific data quality issues were identified for \"{}\".", document_name),
        ),
        produced_by,
        note: None,
    }
}
