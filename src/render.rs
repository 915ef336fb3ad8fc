use std::path::PathBuf;

use anyhow::Context as _;
use pulldown_cmark::{CowStr, Event, HeadingLevel as MarkdownLevel, Parser, Tag};

use crate::case_study::CaseStudy;
use crate::cli::RenderArgs;
use crate::formats::{HeadingEntry, HeadingLevel};
use crate::output::write_text;
use crate::toc::{heading_at, markdown_options};

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let input_path = PathBuf::from(&args.input);
    let markdown = std::fs::read_to_string(&input_path)
        .with_context(|| format!("read markdown: {}", input_path.display()))?;

    let case_study = CaseStudy::parse(Some(&markdown));
    let html = render_case_study_html(&case_study);
    write_text(&html, &args.target).context("write rendered case study")
}

/// Level-3 anchors handed out one per rendered level-3 heading, in document
/// order.
#[derive(Debug, Clone)]
pub struct HeadingIdCursor {
    ids: std::vec::IntoIter<String>,
}

impl HeadingIdCursor {
    pub fn new(entries: &[HeadingEntry]) -> Self {
        let ids = entries
            .iter()
            .filter(|entry| entry.level == HeadingLevel::H3)
            .map(|entry| entry.id.clone())
            .collect::<Vec<_>>();
        Self {
            ids: ids.into_iter(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.ids.len()
    }
}

impl Iterator for HeadingIdCursor {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next()
    }
}

/// Renders section content to HTML, giving each level-3 heading the next id
/// from `cursor`.
///
/// Only headings the table-of-contents scanner also recognises take an id, so
/// a heading nested in a block quote or indented does not shift later anchors.
pub fn render_section_html(markdown: &str, cursor: &mut HeadingIdCursor) -> String {
    let parser = Parser::new_ext(markdown, markdown_options()).into_offset_iter();
    let events = parser.map(|(event, range)| match event {
        Event::Start(Tag::Heading {
            level: MarkdownLevel::H3,
            id,
            classes,
            attrs,
        }) => {
            let id = if heading_at(markdown, range.start, MarkdownLevel::H3).is_some() {
                cursor.next().map(CowStr::from).or(id)
            } else {
                id
            };
            Event::Start(Tag::Heading {
                level: MarkdownLevel::H3,
                id,
                classes,
                attrs,
            })
        }
        other => other,
    });

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, events);
    html
}

/// Standalone fragment: level-2 contents navigation followed by the sections.
pub fn render_case_study_html(case_study: &CaseStudy) -> String {
    let mut html = String::new();

    let contents = case_study.contents().collect::<Vec<_>>();
    if !contents.is_empty() {
        html.push_str("<nav class=\"case-study-contents\">\n<ol>\n");
        for entry in contents {
            html.push_str(&format!(
                "<li><a href=\"#{}\">{}</a></li>\n",
                html_escape(&entry.id),
                html_escape(&entry.text)
            ));
        }
        html.push_str("</ol>\n</nav>\n");
    }

    for section in case_study.render_sections() {
        match &section.anchor {
            Some(anchor) => {
                let anchor = html_escape(anchor);
                html.push_str(&format!(
                    "<section>\n<h2 id=\"{anchor}\">{}</h2>\n",
                    html_escape(&section.title)
                ));
            }
            None => {
                html.push_str(&format!(
                    "<section>\n<h2>{}</h2>\n",
                    html_escape(&section.title)
                ));
            }
        }
        html.push_str(&section.html);
        html.push_str("</section>\n");
    }

    html
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
