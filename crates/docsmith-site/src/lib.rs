//! Navigation tree, parallel page building and rebuilds for docsmith.
//!
//! - [`NodeTree`]: immutable tree scanned from the content directory
//! - [`BuildScheduler`]: balanced chunking and parallel page construction
//! - [`Builder`]: full builds, scoped page rebuilds and staged full rebuilds
//!
//! # Example
//!
//! ```no_run
//! use docsmith_config::Config;
//! use docsmith_site::{Builder, SiteConfig};
//!
//! let config = Config::load(None, None)?;
//! let mut builder = Builder::new(SiteConfig::from_config(&config))?;
//! let report = builder.build()?;
//! println!("{} pages", report.pages);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod error;
mod page;
mod scheduler;
mod site_config;
mod tree;

pub use builder::{BuildReport, Builder};
pub use error::{BuildError, SourceTreeError};
pub use page::{PageRenderer, RenderError};
pub use scheduler::{BuildScheduler, PageFailure, PartialBuild, WorkerFailure, partition};
pub use site_config::SiteConfig;
pub use tree::{NavItem, Node, NodeId, NodeKind, NodeTree, TreeOptions};
