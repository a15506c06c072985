//! Markdown to HTML conversion.

use std::collections::HashMap;

use pulldown_cmark::{CowStr, Event, HeadingLevel, Parser, Tag, TagEnd, html};
use serde::Serialize;

use crate::parser_config::ParserConfig;
use crate::util::{heading_level_to_num, slugify};

/// Table of contents entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Heading level (2-6; the title heading is not listed).
    pub level: u8,
    /// Heading text.
    pub title: String,
    /// Anchor id (empty when heading ids are disabled).
    pub id: String,
}

/// Result of rendering a markdown document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    /// Rendered HTML body.
    pub html: String,
    /// Text of the first H1 heading, if any.
    pub title: Option<String>,
    /// Headings below the first H1, in document order.
    pub toc: Vec<TocEntry>,
}

/// Render markdown source to HTML.
///
/// Pure function of its inputs: the same source and configuration always
/// produce the same output.
#[must_use]
pub fn render(source: &str, config: &ParserConfig) -> Rendered {
    let mut events: Vec<Event<'_>> = Parser::new_ext(source, config.options()).collect();
    let headings = collect_headings(&events);

    let mut title = None;
    let mut toc = Vec::new();
    let mut used_ids: HashMap<String, usize> = HashMap::new();

    for heading in &headings {
        if heading.level == HeadingLevel::H1 && title.is_none() {
            title = Some(heading.text.clone());
        }

        let mut id = heading.explicit_id.clone().unwrap_or_default();
        if id.is_empty()
            && let Some(heading_ids) = config.heading_ids()
        {
            id = unique_id(&heading_ids.prefix, &heading.text, &mut used_ids);
            if let Event::Start(Tag::Heading { id: slot, .. }) = &mut events[heading.start] {
                *slot = Some(CowStr::from(id.clone()));
            }
        }

        if heading.level != HeadingLevel::H1 {
            toc.push(TocEntry {
                level: heading_level_to_num(heading.level),
                title: heading.text.clone(),
                id,
            });
        }
    }

    let mut output = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut output, events.into_iter());

    Rendered {
        html: output,
        title,
        toc,
    }
}

/// Extract the text of the first H1 heading without rendering.
#[must_use]
pub fn extract_title(source: &str, config: &ParserConfig) -> Option<String> {
    let mut title: Option<String> = None;

    for event in Parser::new_ext(source, config.options()) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => title = Some(String::new()),
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = title.as_mut() {
                    title.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                return title.map(|t| t.trim().to_owned());
            }
            _ => {}
        }
    }

    None
}

/// Heading located in the event stream.
struct HeadingSpan {
    start: usize,
    level: HeadingLevel,
    text: String,
    explicit_id: Option<String>,
}

fn collect_headings(events: &[Event<'_>]) -> Vec<HeadingSpan> {
    let mut headings = Vec::new();
    let mut current: Option<HeadingSpan> = None;

    for (idx, event) in events.iter().enumerate() {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                current = Some(HeadingSpan {
                    start: idx,
                    level: *level,
                    text: String::new(),
                    explicit_id: id.as_ref().map(ToString::to_string),
                });
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(heading) = current.as_mut() {
                    heading.text.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(mut heading) = current.take() {
                    heading.text = heading.text.trim().to_owned();
                    headings.push(heading);
                }
            }
            _ => {}
        }
    }

    headings
}

/// Generate an id unique within the document (`intro`, `intro-1`, ...).
fn unique_id(prefix: &str, text: &str, used: &mut HashMap<String, usize>) -> String {
    let mut base = slugify(text);
    if base.is_empty() {
        base.push_str("section");
    }

    let count = used.entry(base.clone()).or_insert(0);
    let id = if *count == 0 {
        format!("{prefix}{base}")
    } else {
        format!("{prefix}{base}-{count}")
    };
    *count += 1;
    id
}
