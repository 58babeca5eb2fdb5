//! `[build]` section configuration.
//!
//! Describes how the server-side-render bundle is produced and where the
//! generated pages land.
//!
//! # Example
//!
//! ```toml
//! [build]
//! command = ["npm", "start", "webpack.server.ssr.build"]
//! output = "dist"              # directory receiving the generated pages
//! routes = "routes.toml"       # route table location
//! ```

use serde::Deserialize;
use std::path::PathBuf;

/// Build settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Command producing the render-server bundle, as an argv array.
    /// Run from the project root; exit code 0 is the only success.
    pub command: Vec<String>,

    /// Output directory for the generated pages.
    pub output: PathBuf,

    /// Route table file.
    pub routes: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "npm".into(),
                "start".into(),
                "webpack.server.ssr.build".into(),
            ],
            output: PathBuf::from("dist"),
            routes: PathBuf::from("routes.toml"),
        }
    }
}
