use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::Context as _;
use pulldown_cmark::{Event, HeadingLevel as MarkdownLevel, Options, Parser, Tag};

use crate::cli::TocArgs;
use crate::formats::{HeadingEntry, HeadingLevel};
use crate::output::write_output;

pub fn run(args: TocArgs) -> anyhow::Result<()> {
    let input_path = PathBuf::from(&args.input);
    let markdown = std::fs::read_to_string(&input_path)
        .with_context(|| format!("read markdown: {}", input_path.display()))?;

    let entries = build_table_of_contents(&markdown);
    tracing::debug!(headings = entries.len(), "built table of contents");

    write_output(&entries, &args.output).context("write table of contents")
}

/// Heading entries in document order. Level-2 and level-3 ATX headings only.
pub fn build_table_of_contents(markdown: &str) -> Vec<HeadingEntry> {
    let mut anchors = AnchorRegistry::new();
    scan_headings(markdown)
        .into_iter()
        .map(|scanned| HeadingEntry {
            id: anchors.assign(scanned.heading.text),
            text: scanned.heading.text.to_owned(),
            level: scanned.heading.level,
        })
        .collect()
}

/// Base anchor slug for a heading.
///
/// Lower-cases the text, drops everything except word characters, whitespace
/// and `-`, then joins the remaining whitespace-separated runs with `-`.
pub fn slugify(text: &str) -> String {
    let kept = text
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '_' || *ch == '-' || ch.is_whitespace())
        .collect::<String>();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Hands out document-unique anchors.
///
/// The first heading with a given base slug keeps it; the Nth gets `base-N`.
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    occurrences: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, heading_text: &str) -> String {
        let mut base = slugify(heading_text);
        if base.is_empty() {
            base.push_str("section");
        }

        let count = self.occurrences.entry(base.clone()).or_insert(0);
        loop {
            *count += 1;
            let candidate = if *count == 1 {
                base.clone()
            } else {
                format!("{base}-{count}")
            };
            // A literal heading like "Intro 2" can already own `intro-2`.
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Heading<'a> {
    pub level: HeadingLevel,
    pub text: &'a str,
}

/// A level-2 or level-3 heading the markdown renderer emits, located by its
/// source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScannedHeading<'a> {
    pub heading: Heading<'a>,
    pub line_start: usize,
    /// Just past the line's newline, or the end of input.
    pub line_end: usize,
}

pub(crate) fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Headings in document order, as pulldown-cmark parses them.
///
/// Code blocks, HTML blocks, quotes and list items never contribute, and only
/// plain `##`/`###` lines count, so the renderer and this scan agree on every
/// heading that carries an anchor.
pub(crate) fn scan_headings(markdown: &str) -> Vec<ScannedHeading<'_>> {
    Parser::new_ext(markdown, markdown_options())
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::Heading { level, .. }) => heading_at(markdown, range.start, level),
            _ => None,
        })
        .collect()
}

/// The heading on the line holding `offset`, provided that line is an ATX
/// heading of the level the parser reported.
pub(crate) fn heading_at(
    markdown: &str,
    offset: usize,
    parsed_level: MarkdownLevel,
) -> Option<ScannedHeading<'_>> {
    let line_start = markdown[..offset].rfind('\n').map_or(0, |idx| idx + 1);
    let line_end = markdown[line_start..]
        .find('\n')
        .map_or(markdown.len(), |idx| line_start + idx + 1);

    let heading = parse_heading(&markdown[line_start..line_end])?;
    let expected = match parsed_level {
        MarkdownLevel::H2 => HeadingLevel::H2,
        MarkdownLevel::H3 => HeadingLevel::H3,
        _ => return None,
    };
    (heading.level == expected).then_some(ScannedHeading {
        heading,
        line_start,
        line_end,
    })
}

pub(crate) fn parse_heading(line: &str) -> Option<Heading<'_>> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    let level = match hashes {
        2 => HeadingLevel::H2,
        3 => HeadingLevel::H3,
        _ => return None,
    };

    let rest = &line[hashes..];
    if !rest.starts_with([' ', '\t']) {
        return None;
    }

    let text = strip_closing_sequence(rest.trim());
    if text.is_empty() {
        return None;
    }
    Some(Heading { level, text })
}

/// `## Title ##` renders as "Title"; keep anchors in step with the renderer.
fn strip_closing_sequence(text: &str) -> &str {
    let without = text.trim_end_matches('#');
    if without.len() == text.len() {
        return text;
    }
    if without.is_empty() || without.ends_with([' ', '\t']) {
        return without.trim_end();
    }
    text
}
