//! Linker configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `HOIST_*` environment variables.

use std::{fmt, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

/// Environment variable toggling identifier mangling
pub const ENV_MINIFY: &str = "HOIST_MINIFY";
/// Environment variable selecting the output format
pub const ENV_OUTPUT_FORMAT: &str = "HOIST_OUTPUT_FORMAT";

/// Target module system of the emitted bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatKind {
    /// Browser script registering modules on a global registry
    #[default]
    Global,
    #[serde(rename = "commonjs")]
    CommonJs,
    Esm,
}

impl FromStr for OutputFormatKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "commonjs" | "cjs" => Ok(Self::CommonJs),
            "esm" | "module" => Ok(Self::Esm),
            other => Err(anyhow!("unknown output format `{other}`")),
        }
    }
}

impl fmt::Display for OutputFormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::CommonJs => "commonjs",
            Self::Esm => "esm",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Rename top-level bindings to short identifiers
    pub minify: bool,
    pub output_format: OutputFormatKind,
    /// Global variable receiving the entry's exports in the `global` format
    pub global_name: Option<String>,
    /// Prepend declarations of the runtime helpers the bundle references
    pub inject_helpers: bool,
    /// Run the dead export eliminator
    pub tree_shake: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minify: false,
            output_format: OutputFormatKind::default(),
            global_name: None,
            inject_helpers: true,
            tree_shake: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse linker configuration")
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading linker configuration from {}", path.display());
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&source)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `HOIST_MINIFY` and `HOIST_OUTPUT_FORMAT` when they are set
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(ENV_MINIFY) {
            self.minify = parse_bool(&value)
                .with_context(|| format!("Invalid value for {ENV_MINIFY}"))?;
            debug!("{ENV_MINIFY} override: minify = {}", self.minify);
        }
        if let Ok(value) = std::env::var(ENV_OUTPUT_FORMAT) {
            self.output_format = value
                .parse()
                .with_context(|| format!("Invalid value for {ENV_OUTPUT_FORMAT}"))?;
            debug!(
                "{ENV_OUTPUT_FORMAT} override: output-format = {}",
                self.output_format
            );
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    /// Sets an environment variable for the lifetime of the guard
    struct EnvGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            // SAFETY: tests touching the environment are serialized
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, original }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: restoring the environment captured in `set`
            unsafe {
                match self.original.take() {
                    Some(original) => std::env::set_var(self.key, original),
                    None => std::env::remove_var(self.key),
                }
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.minify);
        assert!(config.inject_helpers);
        assert!(config.tree_shake);
        assert_eq!(config.output_format, OutputFormatKind::Global);
    }

    #[test]
    fn test_from_toml_str_kebab_case() {
        let config = Config::from_toml_str(
            r#"
minify = true
output-format = "commonjs"
global-name = "MyLib"
tree-shake = false
"#,
        )
        .expect("config should parse");
        assert!(config.minify);
        assert_eq!(config.output_format, OutputFormatKind::CommonJs);
        assert_eq!(config.global_name.as_deref(), Some("MyLib"));
        assert!(!config.tree_shake);
        assert!(config.inject_helpers);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Config::from_toml_str("output-format = \"amd\"").is_err());
    }

    #[test]
    #[serial]
    fn test_load_applies_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "output-format = \"esm\"").expect("write config");

        let _minify = EnvGuard::set(ENV_MINIFY, "1");
        let _format = EnvGuard::set(ENV_OUTPUT_FORMAT, "commonjs");

        let config = Config::load(file.path()).expect("config should load");
        assert!(config.minify);
        assert_eq!(config.output_format, OutputFormatKind::CommonJs);
    }

    #[test]
    #[serial]
    fn test_invalid_env_override_is_an_error() {
        let _minify = EnvGuard::set(ENV_MINIFY, "sometimes");
        let mut config = Config::default();
        assert!(config.apply_env_overrides().is_err());
    }
}
