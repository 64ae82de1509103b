//! Site building for niveflow.
//!
//! The [`BuildDispatcher`] stages one synced source into the build tool's
//! input location, regenerates its navigation index and hands it to a
//! [`Bundler`]: either an external command (e.g. a Vite build) or the
//! built-in [`NativeBundler`].

pub mod assets;
pub mod builder;
pub mod bundler;
pub mod dispatcher;
pub mod error;
pub mod meta;
pub mod nav;
pub mod templates;

pub use builder::{SiteBuilder, SiteConfig, SiteResult};
pub use bundler::{BundleJob, Bundler, CommandBundler, NativeBundler};
pub use dispatcher::{BuildDispatcher, BuildReport, DispatchConfig};
pub use error::BuildError;
pub use meta::SiteMeta;
pub use nav::{build_nav_tree, write_nav_index, NavKind, NavNode, NAV_INDEX_FILE};
