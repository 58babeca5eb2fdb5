//! Tool configuration management for `prerender.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                          |
//! |------------|--------------------------------------------------|
//! | `[build]`  | SSR bundle build command, output dir, route table |
//! | `[server]` | Render server command, interface, port            |
//! | `[probe]`  | Readiness probe timing and bounds                 |

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{BuildConfig, ProbeConfig, ServerConfig};

use crate::{
    cli::{Cli, Commands},
    log,
};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing prerender.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrerenderConfig {
    /// CLI arguments reference (internal use only)
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Build settings
    pub build: BuildConfig,

    /// Render server settings
    pub server: ServerConfig,

    /// Readiness probe settings
    pub probe: ProbeConfig,
}

impl Default for PrerenderConfig {
    fn default() -> Self {
        Self {
            cli: None,
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            build: BuildConfig::default(),
            server: ServerConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl PrerenderConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file; the project root
    /// is the config file's parent directory.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let Some(config_path) = find_config_file(&cli.config) else {
            bail!(
                "Config file `{}` not found in the current directory or any parent",
                cli.config.display()
            );
        };

        let mut config = Self::from_path(&config_path)?;

        config.config_path = config_path;
        config.cli = Some(cli);
        config.finalize(cli);
        config.validate(cli)?;

        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        if !ignored.is_empty() {
            let display_path = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy());
            log!("warning"; "unknown fields in {}, ignoring:", display_path);
            for field in &ignored {
                eprintln!("- {field}");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    /// Finalize configuration after loading.
    fn finalize(&mut self, cli: &Cli) {
        let root = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        self.normalize_paths(&root);
        self.root = root;
        self.apply_command_options(cli);
    }

    /// Normalize configured paths relative to the project root.
    fn normalize_paths(&mut self, root: &Path) {
        if self.build.output.is_relative() {
            self.build.output = root.join(&self.build.output);
        }
        if self.build.routes.is_relative() {
            self.build.routes = root.join(&self.build.routes);
        }
    }

    /// Apply command-specific configuration options.
    fn apply_command_options(&mut self, cli: &Cli) {
        match &cli.command {
            Commands::Generate { args } => {
                crate::logger::set_verbose(args.verbose);
                Self::update_option(&mut self.build.output, args.output.as_ref());
                Self::update_option(&mut self.server.port, args.port.as_ref());
            }
            // Routes command doesn't modify config
            Commands::Routes { .. } => {}
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration for the current command.
    fn validate(&self, cli: &Cli) -> Result<()> {
        let mut errors = self.settings_errors();

        // Command checks only matter when something will be spawned.
        if cli.is_generate() {
            Self::validate_command("build.command", &self.build.command, &mut errors);
            Self::validate_command("server.command", &self.server.command, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")).into())
        }
    }

    /// Collect errors for values that are wrong regardless of command.
    fn settings_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.probe.interval_ms == 0 {
            errors.push("probe.interval_ms must be greater than 0".to_string());
        }
        if self.probe.connect_timeout_ms == 0 {
            errors.push("probe.connect_timeout_ms must be greater than 0".to_string());
        }
        if self.probe.max_attempts == 0 {
            errors.push("probe.max_attempts must be at least 1".to_string());
        }
        errors
    }

    /// An argv array must name a program, and one named without a path
    /// separator must resolve on PATH.
    fn validate_command(field: &str, command: &[String], errors: &mut Vec<String>) {
        let Some(program) = command.first() else {
            errors.push(format!("{field} is empty"));
            return;
        };

        let is_bare = !program.contains(['/', '\\']);
        if is_bare && which::which(program).is_err() {
            errors.push(format!("{field}: `{program}` not found in PATH"));
        }
    }

    // ========================================================================
    // accessors
    // ========================================================================

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Load and normalize the configured route table.
    pub fn page_routes(&self) -> Result<Vec<crate::routes::PageRoute>> {
        let table = crate::routes::RouteTable::load(&self.build.routes)?;
        table
            .normalize()
            .context("Failed to normalize route table")
    }
}

/// Search for the config file upward from the current directory.
fn find_config_file(name: &Path) -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config from TOML content.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PrerenderConfig {
    let (parsed, ignored) = PrerenderConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_invalid_toml() {
        // Invalid TOML syntax - unclosed bracket
        let result = PrerenderConfig::parse_with_ignored("[build\ncommand = []");
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_mirror_original_constants() {
        let config = test_parse_config("");
        assert_eq!(config.server.port, 8084);
        assert_eq!(config.probe.interval_ms, 300);
        assert_eq!(config.probe.connect_timeout_ms, 300);
        assert!(config.build.output.ends_with("dist"));
    }

    #[test]
    fn test_unknown_fields_detected() {
        let content = "[build]\noutput = \"dist\"\n[unknown_section]\nfield = \"value\"";
        let (_, ignored) = PrerenderConfig::parse_with_ignored(content).unwrap();

        assert!(!ignored.is_empty());
        assert!(ignored.iter().any(|f| f.contains("unknown_section")));
    }

    #[test]
    fn test_normalize_paths_keeps_absolute() {
        let mut config = test_parse_config("[build]\noutput = \"/srv/www\"");
        config.normalize_paths(Path::new("/project"));
        assert_eq!(config.build.output, PathBuf::from("/srv/www"));
        assert_eq!(config.build.routes, PathBuf::from("/project/routes.toml"));
    }

    #[test]
    fn test_validate_rejects_zero_probe_values() {
        let config = test_parse_config("[probe]\ninterval_ms = 0\nmax_attempts = 0");
        let errors = config.settings_errors();
        assert_eq!(errors.len(), 2);

        let config = test_parse_config("");
        assert!(config.settings_errors().is_empty());
    }

    #[test]
    fn test_validate_command_empty() {
        let mut errors = Vec::new();
        PrerenderConfig::validate_command("build.command", &[], &mut errors);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("empty"));
    }

    #[test]
    fn test_validate_command_missing_program() {
        let mut errors = Vec::new();
        PrerenderConfig::validate_command(
            "server.command",
            &[String::from("definitely-not-a-real-program-xyz")],
            &mut errors,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("not found in PATH"));
    }
}
