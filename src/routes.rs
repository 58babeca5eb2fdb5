//! Route table loading and normalization.
//!
//! The route table (`routes.toml` by default) maps group names to route
//! groups. A group is either a flat list of entries, or a table carrying a
//! `prefix` applied to every entry it contains:
//!
//! ```toml
//! Main = [{ route = "/" }]
//! About = [{ route = "about" }]
//! NotFound = [{ route = "404" }]
//!
//! [Docs]
//! prefix = "/docs"
//! config = [{ route = "intro" }, { route = ["guide", "manual"] }]
//! ```
//!
//! Normalization flattens the table into one [`PageRoute`] per entry, in
//! declaration order. The reserved `NotFound` group is handled by the render
//! server itself and is never written to disk.

use anyhow::{Context, Result, bail};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf};

/// Reserved group name for the not-found page, excluded from generation.
pub const NOT_FOUND_GROUP: &str = "NotFound";

/// Output filename for the root route (`/`).
///
/// Kept distinct from every `<path>.html` derivation so the root page can
/// never collide with a declared route.
pub const ROOT_FILENAME: &str = "main.html";

// ============================================================================
// Route table model
// ============================================================================

/// A route specification: a single path segment, or a list of aliases.
///
/// Only the first alias is used for generation; the rest exist for the
/// render server's own matching.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RouteSpec {
    One(String),
    Aliases(Vec<String>),
}

impl RouteSpec {
    /// The alias used for generation.
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::One(s) => Some(s),
            Self::Aliases(list) => list.first().map(String::as_str),
        }
    }
}

/// One route entry. Unknown keys (the app's rendering parameters) are
/// ignored; they belong to the render server.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub route: RouteSpec,
}

/// A route group: a flat entry list, or a prefixed `{ prefix, config }`
/// table. Anything else fails deserialization up front rather than
/// silently dropping routes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RouteGroup {
    Flat(Vec<RouteEntry>),
    Prefixed {
        prefix: String,
        config: Vec<RouteEntry>,
    },
}

impl RouteGroup {
    /// Prefix and entries in one place, so downstream code has a single
    /// dispatch point for the two shapes.
    fn parts(&self) -> (&str, &[RouteEntry]) {
        match self {
            Self::Flat(entries) => ("", entries),
            Self::Prefixed { prefix, config } => (prefix, config),
        }
    }
}

/// The parsed route table, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    groups: Vec<(String, RouteGroup)>,
}

impl RouteTable {
    /// Load the route table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read route table `{}`", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Invalid route table `{}`", path.display()))
    }

    /// Parse a route table from TOML content.
    ///
    /// Declaration order is preserved (toml `preserve_order`).
    pub fn from_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;

        let mut groups = Vec::with_capacity(table.len());
        for (name, value) in table {
            let group: RouteGroup = value.try_into().with_context(|| {
                format!("group `{name}` is neither a route list nor {{ prefix, config }}")
            })?;
            groups.push((name, group));
        }

        Ok(Self { groups })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Flatten the table into one [`PageRoute`] per entry, excluding the
    /// `NotFound` group.
    ///
    /// Fails on an empty alias list and on output-path collisions; a route
    /// that cannot be generated must abort the run, not vanish from it.
    pub fn normalize(&self) -> Result<Vec<PageRoute>> {
        let mut pages = Vec::new();
        let mut seen = FxHashSet::default();

        for (name, group) in &self.groups {
            if name == NOT_FOUND_GROUP {
                continue;
            }

            let (prefix, entries) = group.parts();
            for entry in entries {
                let Some(alias) = entry.route.primary() else {
                    bail!("group `{name}` contains a route with an empty alias list");
                };

                let path = join_route_path(prefix, alias);
                let file = output_file(&path);

                if !seen.insert(file.clone()) {
                    bail!(
                        "routes `{}` and an earlier route both map to `{}`",
                        path,
                        file.display()
                    );
                }

                pages.push(PageRoute { path, file });
            }
        }

        Ok(pages)
    }
}

// ============================================================================
// Normalized routes
// ============================================================================

/// A normalized route: the URL path to fetch and the output file it is
/// written to, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRoute {
    pub path: String,
    pub file: PathBuf,
}

/// Join a group prefix and a route alias into a URL path.
///
/// Always yields an absolute path with no trailing slash (except the root
/// path itself).
///
/// # Examples
/// - `("", "/")` → `/`
/// - `("", "about")` → `/about`
/// - `("/docs", "intro")` → `/docs/intro`
pub fn join_route_path(prefix: &str, alias: &str) -> String {
    let mut path = format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        alias.trim_start_matches('/')
    );
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

/// Derive the output file for a URL path.
///
/// `/` maps to [`ROOT_FILENAME`]; every other path maps to `<path>.html`
/// with its directory structure preserved.
pub fn output_file(path: &str) -> PathBuf {
    if path == "/" {
        return PathBuf::from(ROOT_FILENAME);
    }
    // `.html` is appended, not substituted: a route segment may itself
    // contain a dot.
    let mut file: PathBuf = path.trim_start_matches('/').split('/').collect();
    let name = file
        .file_name()
        .map(|n| format!("{}.html", n.to_string_lossy()))
        .unwrap_or_else(|| String::from(ROOT_FILENAME));
    file.set_file_name(name);
    file
}

// ============================================================================
// Tests
// ============================================================================
