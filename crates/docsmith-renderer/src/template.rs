//! HTML page template.
//!
//! Wraps rendered page HTML into a complete document using `minijinja`.
//! A site may provide its own template in the templates directory; otherwise
//! the built-in layout is used.

use std::path::{Path, PathBuf};

use minijinja::{Environment, Value, context};
use serde::Serialize;

use crate::markdown::TocEntry;

const BUILTIN_NAME: &str = "page.html";

const BUILTIN_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{ title }}</title>
<link rel="stylesheet" href="{{ root }}css/site.css">
</head>
<body>
<div class="layout">
<aside class="sidebar">
<a class="logo" href="{{ root or "./" }}">Home</a>
<nav>
<ul>
{%- for item in navigation recursive %}
<li{% if item.active %} class="active"{% endif %}>
{%- if item.href %}<a href="{{ item.href }}">{{ item.title }}</a>{% else %}<span>{{ item.title }}</span>{% endif %}
{%- if item.children %}
<ul>{{ loop(item.children) }}</ul>
{%- endif %}
</li>
{%- endfor %}
</ul>
</nav>
</aside>
<div class="content">
{%- if breadcrumbs %}
<nav class="breadcrumbs">
<ol>
{%- for crumb in breadcrumbs %}
<li>{% if crumb.href %}<a href="{{ crumb.href }}">{{ crumb.title }}</a>{% else %}{{ crumb.title }}{% endif %}</li>
{%- endfor %}
</ol>
</nav>
{%- endif %}
<main>
<article>
{{ content }}
</article>
</main>
{%- if toc %}
<aside class="toc">
<h3>On this page</h3>
<ul>
{%- for entry in toc %}
<li{% if entry.level >= 3 %} class="nested"{% endif %}><a href="#{{ entry.id }}">{{ entry.title }}</a></li>
{%- endfor %}
</ul>
</aside>
{%- endif %}
</div>
</div>
{%- if live_reload %}
<script>
(function () {
  var proto = location.protocol === "https:" ? "wss://" : "ws://";
  var ws = new WebSocket(proto + location.host + "/__livereload");
  ws.onmessage = function () { location.reload(); };
})();
</script>
{%- endif %}
</body>
</html>
"##;

/// Error loading or rendering a page template.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Template source is invalid.
    #[error("Invalid template {path}: {source}")]
    Syntax {
        /// Template file path.
        path: PathBuf,
        /// Underlying template error.
        #[source]
        source: minijinja::Error,
    },
    /// Template failed while rendering a page.
    #[error("Template rendering failed: {0}")]
    Render(#[from] minijinja::Error),
}

/// Navigation link with nested children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NavLink {
    pub title: String,
    /// Link relative to the page being rendered. `None` for sections
    /// without an index page.
    pub href: Option<String>,
    /// Whether this link points to the page being rendered.
    pub active: bool,
    pub children: Vec<NavLink>,
}

/// Breadcrumb entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub title: String,
    pub href: Option<String>,
}

/// All data needed to render one page.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PageContext {
    pub title: String,
    /// Rendered page body. Inserted unescaped.
    #[serde(skip)]
    pub content: String,
    /// URL path of the page (`""` for the root page).
    pub url_path: String,
    /// Relative prefix from the page to the site root.
    pub root: String,
    pub navigation: Vec<NavLink>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub toc: Vec<TocEntry>,
    /// Whether to inject the live reload client.
    pub live_reload: bool,
}

/// Compiled page template.
///
/// Shared by all build workers; rendering only borrows the environment.
pub struct PageTemplate {
    env: Environment<'static>,
    name: String,
}

impl std::fmt::Debug for PageTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PageTemplate {
    /// The built-in page layout.
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.add_template(BUILTIN_NAME, BUILTIN_TEMPLATE)
            .map_err(|source| TemplateError::Syntax {
                path: PathBuf::from(BUILTIN_NAME),
                source,
            })?;
        Ok(Self {
            env,
            name: BUILTIN_NAME.to_owned(),
        })
    }

    /// Load `name` from `templates_dir`, falling back to the built-in layout
    /// when the file does not exist.
    ///
    /// Templates may include or extend other files in the same directory.
    /// Output is HTML-escaped when the template name ends in `.html`.
    pub fn load(templates_dir: &Path, name: &str) -> Result<Self, TemplateError> {
        let path = templates_dir.join(name);
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "Template not found, using built-in layout");
            return Self::builtin();
        }

        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(templates_dir));
        env.get_template(name)
            .map_err(|source| TemplateError::Syntax { path, source })?;

        Ok(Self {
            env,
            name: name.to_owned(),
        })
    }

    /// Name of the template used for pages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render a page.
    pub fn render(&self, page: &PageContext) -> Result<String, TemplateError> {
        let template = self.env.get_template(&self.name)?;
        let ctx = context! {
            content => Value::from_safe_string(page.content.clone()),
            ..Value::from_serialize(page)
        };
        Ok(template.render(ctx)?)
    }
}
