//! Navigable structure of a project's long-form case study.
//!
//! A [`CaseStudy`] is a pure function of its markdown: the table of contents,
//! the top-level sections and their rendered HTML never change once parsed.
//! [`CaseStudyView`] adds the one piece of mutable state, the reading tracker,
//! and drops it whenever the content is replaced.

use serde::Serialize;

use crate::formats::{HeadingEntry, HeadingLevel, Section};
use crate::progress::{ContainerGeometry, ReadingTracker};
use crate::render::{HeadingIdCursor, render_section_html};
use crate::sections::split_into_sections;
use crate::toc::build_table_of_contents;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseStudy {
    table_of_contents: Vec<HeadingEntry>,
    sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedSection {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    pub html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseStudyOutline {
    pub contents: Vec<HeadingEntry>,
    pub subheadings: Vec<HeadingEntry>,
    pub sections: Vec<RenderedSection>,
}

impl CaseStudy {
    /// Absent markdown is a valid, empty case study.
    pub fn parse(markdown: Option<&str>) -> Self {
        let markdown = markdown.unwrap_or_default();
        Self {
            table_of_contents: build_table_of_contents(markdown),
            sections: split_into_sections(markdown),
        }
    }

    /// True when there is nothing to show; callers omit the case-study tab.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn table_of_contents(&self) -> &[HeadingEntry] {
        &self.table_of_contents
    }

    /// Level-2 entries, used for the jump-to navigation.
    pub fn contents(&self) -> impl Iterator<Item = &HeadingEntry> {
        self.table_of_contents
            .iter()
            .filter(|entry| entry.level == HeadingLevel::H2)
    }

    /// Level-3 entries, attached in order while section content renders.
    pub fn subheadings(&self) -> impl Iterator<Item = &HeadingEntry> {
        self.table_of_contents
            .iter()
            .filter(|entry| entry.level == HeadingLevel::H3)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn subheading_cursor(&self) -> HeadingIdCursor {
        HeadingIdCursor::new(&self.table_of_contents)
    }

    /// Renders every section, sharing one level-3 cursor across them.
    pub fn render_sections(&self) -> Vec<RenderedSection> {
        let mut cursor = self.subheading_cursor();
        let rendered = self
            .sections
            .iter()
            .map(|section| RenderedSection {
                title: section.title.clone(),
                anchor: section.anchor.clone(),
                html: render_section_html(&section.content, &mut cursor),
            })
            .collect::<Vec<_>>();

        if cursor.remaining() != 0 {
            tracing::debug!(
                unused = cursor.remaining(),
                "case study rendered fewer level-3 headings than its table of contents"
            );
        }
        rendered
    }

    pub fn outline(&self) -> CaseStudyOutline {
        CaseStudyOutline {
            contents: self.contents().cloned().collect(),
            subheadings: self.subheadings().cloned().collect(),
            sections: self.render_sections(),
        }
    }
}

/// A mounted case-study view: the parsed document plus its reading tracker.
#[derive(Debug, Default)]
pub struct CaseStudyView {
    case_study: CaseStudy,
    tracker: Option<ReadingTracker>,
}

impl CaseStudyView {
    pub fn new(markdown: Option<&str>) -> Self {
        Self {
            case_study: CaseStudy::parse(markdown),
            tracker: None,
        }
    }

    pub fn case_study(&self) -> &CaseStudy {
        &self.case_study
    }

    /// Replaces the document. The old tracker is detached since its geometry
    /// described the previous content.
    pub fn set_content(&mut self, markdown: Option<&str>) {
        self.case_study = CaseStudy::parse(markdown);
        if self.tracker.take().is_some() {
            tracing::debug!("detached reading tracker after content change");
        }
    }

    /// Starts tracking against a measured container and returns the initial
    /// progress.
    pub fn attach_tracker(
        &mut self,
        geometry: ContainerGeometry,
        viewport_height: f64,
        scroll_y: f64,
    ) -> f64 {
        let tracker = ReadingTracker::attach(geometry, viewport_height, scroll_y);
        let progress = tracker.progress();
        self.tracker = Some(tracker);
        progress
    }

    pub fn detach_tracker(&mut self) {
        self.tracker = None;
    }

    /// `None` when no tracker is attached; scroll events are then ignored.
    pub fn on_scroll(&mut self, scroll_y: f64) -> Option<f64> {
        self.tracker
            .as_mut()
            .map(|tracker| tracker.on_scroll(scroll_y))
    }

    pub fn progress(&self) -> Option<f64> {
        self.tracker.as_ref().map(ReadingTracker::progress)
    }
}
