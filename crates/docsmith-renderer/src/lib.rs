//! Markdown rendering and page templates for docsmith.
//!
//! This crate is the rendering collaborator of the site builder:
//! - [`ParserConfig`]: validated extension set, built once per site build
//! - [`render`]: pure `(source, config) -> html` conversion via `pulldown-cmark`
//! - [`PageTemplate`]: wraps rendered HTML into a full page via `minijinja`
//!
//! # Example
//!
//! ```
//! use docsmith_renderer::{ParserConfig, render};
//!
//! let config = ParserConfig::default();
//! let rendered = render("# Hello\n\n**Bold** text", &config);
//! assert_eq!(rendered.title.as_deref(), Some("Hello"));
//! ```

mod markdown;
mod parser_config;
mod template;
mod util;

pub use markdown::{Rendered, TocEntry, extract_title, render};
pub use parser_config::{ParserConfig, ParserConfigError};
pub use template::{Breadcrumb, NavLink, PageContext, PageTemplate, TemplateError};
pub use util::{root_prefix, slugify};
