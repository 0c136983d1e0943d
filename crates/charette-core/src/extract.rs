//! Section extraction from free-form model output.
//!
//! The model is asked to answer with a fixed set of named sections, but its
//! output is not contractually structured: headings may be reworded,
//! reordered, or dropped. [`SectionExtractor`] recovers a name -> content
//! mapping from the raw text with a priority-ordered marker search and a
//! keyword-scan fallback. Extraction is pure and deterministic: the same
//! text and section list always produce the same result, so parsed sections
//! are re-derived on demand and never stored.

// ---------------------------------------------------------------------------
// Parsed sections
// ---------------------------------------------------------------------------

/// Minimum trimmed content length for a marker match to count as found.
const MIN_SECTION_LEN: usize = 10;

/// Maximum number of lines the keyword fallback will recover per section.
const MAX_KEYWORD_LINES: usize = 10;

/// How a section's content was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionContent {
    /// Found via a heading marker and carved out of the text.
    Extracted(String),
    /// Marker search failed (or yielded a degenerate sliver); content was
    /// recovered by scanning for lines mentioning the section's keywords.
    Recovered(String),
    /// Neither marker search nor keyword scan found anything relevant.
    Missing,
}

/// One requested section paired with whatever extraction recovered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSection {
    pub name: String,
    pub content: SectionContent,
}

impl ParsedSection {
    /// The content as display text, with an explicit sentinel for missing
    /// sections so callers can tell "model produced nothing relevant" from
    /// an extraction bug.
    pub fn text_or_sentinel(&self) -> String {
        match &self.content {
            SectionContent::Extracted(text) | SectionContent::Recovered(text) => text.clone(),
            SectionContent::Missing => {
                format!("[Section '{}' not found in the response]", self.name)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SectionExtractor
// ---------------------------------------------------------------------------

/// Stateless extractor: all logic in associated functions.
pub struct SectionExtractor;

impl SectionExtractor {
    /// Partition `text` into the requested sections, in request order.
    ///
    /// For section `i` (1-indexed), the marker variants are tried in priority
    /// order: `"## {i}. {name}"`, `"## {name}"`, `"{i}. {name}"`,
    /// `"### {name}"`, `"**{name}**"`, then the bare name. The first variant
    /// found *anywhere* in the text wins, regardless of position. Content
    /// runs from the end of the matched marker to the nearest marker of any
    /// later-indexed section found after it, or end-of-text.
    ///
    /// The end-boundary search only considers sections with index greater
    /// than `i` -- a later-indexed section the model rendered *before* its
    /// predecessor will not bound the predecessor. This asymmetry is
    /// deliberate compatibility with observed extraction behavior and is
    /// covered by a regression test.
    pub fn extract(text: &str, section_names: &[String]) -> Vec<ParsedSection> {
        section_names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let content = Self::extract_one(text, section_names, index);
                ParsedSection {
                    name: name.clone(),
                    content,
                }
            })
            .collect()
    }

    fn extract_one(text: &str, section_names: &[String], index: usize) -> SectionContent {
        let name = &section_names[index];

        let Some(content_start) = Self::find_marker(text, index, name) else {
            return Self::keyword_fallback(text, name);
        };

        let content_end = Self::find_end_boundary(text, section_names, index, content_start);
        let content = text[content_start..content_end].trim();

        if content.chars().count() >= MIN_SECTION_LEN {
            SectionContent::Extracted(content.to_string())
        } else {
            Self::keyword_fallback(text, name)
        }
    }

    /// Marker variants for the section at 0-based `index`, in priority order.
    fn marker_variants(index: usize, name: &str) -> [String; 6] {
        let position = index + 1;
        [
            format!("## {position}. {name}"),
            format!("## {name}"),
            format!("{position}. {name}"),
            format!("### {name}"),
            format!("**{name}**"),
            name.to_string(),
        ]
    }

    /// Find the first marker variant present anywhere in the text and return
    /// the byte offset just past it (the content start).
    ///
    /// Priority beats position: an exact `"## {i}. {name}"` heading late in
    /// the text wins over a bare mention early on.
    fn find_marker(text: &str, index: usize, name: &str) -> Option<usize> {
        Self::marker_variants(index, name)
            .iter()
            .find_map(|variant| text.find(variant.as_str()).map(|pos| pos + variant.len()))
    }

    /// Nearest later-section marker after `content_start`, or end-of-text.
    ///
    /// Only the five heading-shaped variants participate; a bare section
    /// name in running prose never terminates the previous section.
    fn find_end_boundary(
        text: &str,
        section_names: &[String],
        index: usize,
        content_start: usize,
    ) -> usize {
        let tail = &text[content_start..];
        let mut end = text.len();

        for (later_index, later_name) in section_names.iter().enumerate().skip(index + 1) {
            let variants = Self::marker_variants(later_index, later_name);
            for variant in &variants[..5] {
                if let Some(rel) = tail.find(variant.as_str()) {
                    end = end.min(content_start + rel);
                }
            }
        }
        end
    }

    /// Recover content by keyword scan: collect lines mentioning any
    /// lowercase token of the section name, up to [`MAX_KEYWORD_LINES`].
    fn keyword_fallback(text: &str, name: &str) -> SectionContent {
        let tokens: Vec<String> = name
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if tokens.is_empty() {
            return SectionContent::Missing;
        }

        let matches: Vec<&str> = text
            .lines()
            .filter(|line| {
                let lower = line.to_lowercase();
                tokens.iter().any(|token| lower.contains(token))
            })
            .take(MAX_KEYWORD_LINES)
            .collect();

        if matches.is_empty() {
            SectionContent::Missing
        } else {
            SectionContent::Recovered(matches.join("\n"))
        }
    }
}
