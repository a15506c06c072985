//! Markdown parser configuration.
//!
//! [`ParserConfig`] is built once per site build from the configured
//! extension map (extension name to extension options) and reused for every
//! page. Validation happens here so that a misconfigured extension fails the
//! build before any page is rendered.

use std::collections::BTreeMap;

use pulldown_cmark::Options;

/// Error returned when the extension map is invalid.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParserConfigError {
    /// Extension name is not supported.
    #[error("Unknown markdown extension: {0}")]
    UnknownExtension(String),
    /// Extension does not accept the given option.
    #[error("Unknown option '{option}' for markdown extension '{extension}'")]
    UnknownOption {
        /// Extension name.
        extension: String,
        /// Offending option key.
        option: String,
    },
    /// Option value has the wrong type.
    #[error("Option '{option}' of markdown extension '{extension}' must be a {expected}")]
    InvalidOption {
        /// Extension name.
        extension: String,
        /// Offending option key.
        option: String,
        /// Expected value type.
        expected: &'static str,
    },
}

/// Heading anchor generation settings (`heading_ids` extension).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct HeadingIds {
    /// Prefix prepended to every generated id.
    pub(crate) prefix: String,
}

/// Validated markdown parser configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParserConfig {
    options: Options,
    heading_ids: Option<HeadingIds>,
    extensions: Vec<String>,
}

impl Default for ParserConfig {
    /// GFM tables, footnotes, strikethrough, task lists and heading ids.
    fn default() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_FOOTNOTES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS,
            heading_ids: Some(HeadingIds::default()),
            extensions: ["footnotes", "heading_ids", "strikethrough", "tables", "tasklists"]
                .map(str::to_owned)
                .into(),
        }
    }
}

impl ParserConfig {
    /// Plain CommonMark with no extensions.
    #[must_use]
    pub fn commonmark() -> Self {
        Self {
            options: Options::empty(),
            heading_ids: None,
            extensions: Vec::new(),
        }
    }

    /// Build a parser configuration from an extension map.
    ///
    /// Supported extensions: `tables`, `footnotes`, `strikethrough`,
    /// `tasklists`, `smart_punctuation`, `heading_attributes`,
    /// `definition_list`, `gfm` and `heading_ids` (option `prefix`).
    ///
    /// # Errors
    ///
    /// Returns [`ParserConfigError`] for unknown extensions, unknown options,
    /// or option values of the wrong type.
    pub fn from_extensions(
        extensions: &BTreeMap<String, toml::Table>,
    ) -> Result<Self, ParserConfigError> {
        let mut config = Self::commonmark();

        for (name, options) in extensions {
            if name == "heading_ids" {
                config.heading_ids = Some(parse_heading_ids(options)?);
            } else {
                let flag = option_flag(name)
                    .ok_or_else(|| ParserConfigError::UnknownExtension(name.clone()))?;
                reject_options(name, options)?;
                config.options |= flag;
            }
            config.extensions.push(name.clone());
        }

        Ok(config)
    }

    /// `pulldown-cmark` parser options.
    #[must_use]
    pub fn options(&self) -> Options {
        self.options
    }

    /// Names of enabled extensions in sorted order.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub(crate) fn heading_ids(&self) -> Option<&HeadingIds> {
        self.heading_ids.as_ref()
    }
}

/// Map a flag-only extension name to its parser option.
fn option_flag(name: &str) -> Option<Options> {
    let flag = match name {
        "tables" => Options::ENABLE_TABLES,
        "footnotes" => Options::ENABLE_FOOTNOTES,
        "strikethrough" => Options::ENABLE_STRIKETHROUGH,
        "tasklists" => Options::ENABLE_TASKLISTS,
        "smart_punctuation" => Options::ENABLE_SMART_PUNCTUATION,
        "heading_attributes" => Options::ENABLE_HEADING_ATTRIBUTES,
        "definition_list" => Options::ENABLE_DEFINITION_LIST,
        "gfm" => Options::ENABLE_GFM,
        _ => return None,
    };
    Some(flag)
}

fn reject_options(extension: &str, options: &toml::Table) -> Result<(), ParserConfigError> {
    match options.keys().next() {
        Some(option) => Err(ParserConfigError::UnknownOption {
            extension: extension.to_owned(),
            option: option.clone(),
        }),
        None => Ok(()),
    }
}

fn parse_heading_ids(options: &toml::Table) -> Result<HeadingIds, ParserConfigError> {
    let mut heading_ids = HeadingIds::default();

    for (key, value) in options {
        match key.as_str() {
            "prefix" => {
                let prefix = value.as_str().ok_or_else(|| ParserConfigError::InvalidOption {
                    extension: "heading_ids".to_owned(),
                    option: key.clone(),
                    expected: "string",
                })?;
                prefix.clone_into(&mut heading_ids.prefix);
            }
            _ => {
                return Err(ParserConfigError::UnknownOption {
                    extension: "heading_ids".to_owned(),
                    option: key.clone(),
                });
            }
        }
    }

    Ok(heading_ids)
}
