use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::SectionsArgs;
use crate::formats::{HeadingLevel, Section};
use crate::output::write_output;
use crate::toc::{AnchorRegistry, scan_headings};

/// Title given to content that precedes the first level-2 heading.
pub const LEADING_SECTION_TITLE: &str = "Overview";

pub fn run(args: SectionsArgs) -> anyhow::Result<()> {
    let input_path = PathBuf::from(&args.input);
    let markdown = std::fs::read_to_string(&input_path)
        .with_context(|| format!("read markdown: {}", input_path.display()))?;

    let sections = split_into_sections(&markdown);
    tracing::debug!(sections = sections.len(), "split case study");

    write_output(&sections, &args.output).context("write sections")
}

/// Splits markdown at level-2 headings.
///
/// The heading line itself is not part of `content`; level-3 headings and body
/// text are. Sections without any non-blank line are dropped.
pub fn split_into_sections(markdown: &str) -> Vec<Section> {
    let mut anchors = AnchorRegistry::new();
    let mut sections = Vec::new();
    let mut current: Option<(&str, String)> = None;
    let mut body_start = 0;

    for scanned in scan_headings(markdown) {
        // Level-3 anchors share the document-wide counter.
        let anchor = anchors.assign(scanned.heading.text);
        if scanned.heading.level != HeadingLevel::H2 {
            continue;
        }
        push_section(
            &mut sections,
            current.take(),
            &markdown[body_start..scanned.line_start],
        );
        current = Some((scanned.heading.text, anchor));
        body_start = scanned.line_end;
    }
    push_section(&mut sections, current, &markdown[body_start..]);

    sections
}

fn push_section(sections: &mut Vec<Section>, heading: Option<(&str, String)>, body: &str) {
    let content = trim_blank_lines(body);
    if content.is_empty() {
        return;
    }

    let (title, anchor) = match heading {
        Some((title, anchor)) => (title.to_owned(), Some(anchor)),
        None => (LEADING_SECTION_TITLE.to_owned(), None),
    };
    sections.push(Section {
        title,
        anchor,
        content: content.to_owned(),
    });
}

/// Drops surrounding blank lines. The first line keeps its indentation, which
/// decides whether it parses as a heading or as indented code.
fn trim_blank_lines(text: &str) -> &str {
    let text = text.trim_end();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &text[start..]
}
