//! YAML-backed module configuration (`SPEC_FULL.md` §4.2, "Ambient: configuration").
//!
//! The configuration file is a mapping from module name to an arbitrary YAML block. Each module
//! reads its own block lazily through the small set of typed getters below; missing or
//! ill-shaped keys fall back to a caller-supplied default rather than erroring, except where the
//! caller explicitly asks for a required key via [`ModuleConfig::require_string`].

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Parsed configuration file: one YAML block per module, keyed by module name.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(flatten)]
    modules: BTreeMap<String, Value>,
}

impl Config {
    /// Parses a configuration file from its YAML text.
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config {
            module: "<top-level>".to_owned(),
            detail: format!("malformed configuration file: {e}"),
        })
    }

    /// An empty configuration, useful for modules that only use defaults.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// Returns the configuration block for `module`, or an empty one if absent.
    #[must_use]
    pub fn module(&self, module: &str) -> ModuleConfig {
        ModuleConfig {
            module: module.to_owned(),
            block: self.modules.get(module).cloned().unwrap_or(Value::Null),
        }
    }
}

/// One module's configuration block, with typed accessors.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    module: String,
    block: Value,
}

impl ModuleConfig {
    fn field(&self, key: &str) -> Option<&Value> {
        self.block.get(key)
    }

    /// Reads an integer parameter, falling back to `default` if absent or not an integer.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.field(key).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Reads a floating-point parameter, falling back to `default` if absent or not a number.
    #[must_use]
    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        self.field(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Reads a boolean parameter, falling back to `default` if absent or not a boolean.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.field(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Reads a string parameter, falling back to `default` if absent or not a string.
    #[must_use]
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.field(key)
            .and_then(Value::as_str)
            .map_or_else(|| default.to_owned(), ToOwned::to_owned)
    }

    /// Reads a string parameter that the module cannot proceed without.
    pub fn require_string(&self, key: &str) -> Result<String> {
        self.field(key)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::Config {
                module: self.module.clone(),
                detail: format!("missing required key '{key}'"),
            })
    }

    /// Reads a ragged nested list of floats (e.g. the calorimeter's `(eta edges, phi edges)`
    /// pairs, or a flavour efficiency formula's coefficient rows). Returns an empty list if the
    /// key is absent; a row that is not itself a list of numbers is skipped rather than erroring.
    #[must_use]
    pub fn get_param(&self, key: &str) -> Vec<Vec<f64>> {
        let Some(Value::Sequence(rows)) = self.field(key) else {
            return Vec::new();
        };
        rows.iter()
            .filter_map(|row| {
                let Value::Sequence(cells) = row else {
                    return None;
                };
                Some(cells.iter().filter_map(Value::as_f64).collect())
            })
            .collect()
    }

    /// Name of the module this block belongs to, for error messages built by the caller.
    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.module
    }
}
