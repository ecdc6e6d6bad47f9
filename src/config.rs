// SPDX-FileCopyrightText: (C) 2020 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

use clap::parser::ValueSource;
use thiserror::Error;

use crate::datetime::RelativeRange;
use crate::options::Defaults;
use crate::precision::Precision;
use crate::prelude::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("failed to read {filename}: {source}")]
    Io {
        filename: String,
        source: std::io::Error,
    },
    #[error("failed to parse {filename}: {source}")]
    Yaml {
        filename: String,
        source: serde_yaml::Error,
    },
}

/// Configuration values looked up by dotted key. Command line arguments
/// win over the environment, which wins over the configuration file,
/// which wins over command line defaults.
pub struct Config {
    config: serde_yaml::Value,
    args: Option<clap::ArgMatches>,
}

impl Config {
    pub fn new(args: Option<clap::ArgMatches>, filename: Option<&str>) -> Result<Self, ConfigError> {
        let config = match filename {
            Some(filename) => Self::load_file(filename)?,
            None => serde_yaml::Value::Null,
        };
        Ok(Self { config, args })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            filename: "<string>".to_string(),
            source,
        })?;
        Ok(Self { config, args: None })
    }

    fn load_file(filename: &str) -> Result<serde_yaml::Value, ConfigError> {
        debug!("Loading configuration from {}", filename);
        let file = std::fs::File::open(filename).map_err(|source| ConfigError::Io {
            filename: filename.to_string(),
            source,
        })?;
        serde_yaml::from_reader(file).map_err(|source| ConfigError::Yaml {
            filename: filename.to_string(),
            source,
        })
    }

    pub fn env_key(&self, key: &str) -> String {
        let xform = key.replace(['.', '-'], "_");
        format!("REPORTOPTS_{}", xform.to_uppercase())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        let mut default: Option<String> = None;

        // First check if an argument was explicitly provided.
        if let Some(args) = &self.args {
            if let Ok(Some(value)) = args.try_get_one::<String>(key) {
                if args.value_source(key) == Some(ValueSource::CommandLine) {
                    return Some(value.clone());
                }
                // Save the default...
                default = Some(value.clone());
            }
        }

        // Ok, no argument provided, check env.
        if let Ok(val) = std::env::var(self.env_key(key)) {
            return Some(val);
        }

        // No argument or environment variable, check the configuration file.
        match self.find_value(key) {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => default,
        }
    }

    /// Get a list. In the environment a list is comma separated.
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        if let Some(args) = &self.args {
            if let Ok(Some(values)) = args.try_get_many::<String>(key) {
                if args.value_source(key) == Some(ValueSource::CommandLine) {
                    return values.cloned().collect();
                }
            }
        }

        if let Ok(val) = std::env::var(self.env_key(key)) {
            return val
                .split(',')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        match self.find_value(key) {
            serde_yaml::Value::Sequence(sequence) => sequence
                .iter()
                .filter_map(|item| item.as_str())
                .map(String::from)
                .collect(),
            serde_yaml::Value::String(s) => vec![s.clone()],
            _ => vec![],
        }
    }

    /// Report option defaults from the `defaults.*` keys.
    pub fn defaults(&self) -> Result<Defaults, ConfigError> {
        let mut defaults = Defaults::default();
        if let Some(range) = self.get_string("defaults.range") {
            defaults.range = range
                .parse::<RelativeRange>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "defaults.range".to_string(),
                    value: range.clone(),
                })?;
        }
        if let Some(precision) = self.get_string("defaults.precision") {
            defaults.precision = Some(precision.parse::<Precision>().map_err(|_| {
                ConfigError::InvalidValue {
                    key: "defaults.precision".to_string(),
                    value: precision.clone(),
                }
            })?);
        }
        if let Some(timezone) = self.get_string("defaults.timezone") {
            defaults.timezone = timezone;
        }
        let metrics = self.get_strings("defaults.metrics");
        if !metrics.is_empty() {
            defaults.metrics = metrics;
        }
        Ok(defaults)
    }

    fn find_value(&self, key: &str) -> &serde_yaml::Value {
        let val = &self.config[key];
        match val {
            serde_yaml::Value::Null => {}
            _ => return val,
        }
        let mut value = &self.config;
        for part in key.split('.') {
            value = &value[part];
        }
        value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config() {
        let config = Config::from_yaml(include_str!("test/reportopts.yaml")).unwrap();
        assert_eq!(
            config.get_string("defaults.timezone").unwrap(),
            "America/New_York"
        );
        assert_eq!(
            config.get_strings("defaults.metrics"),
            vec!["count_sent", "count_bounce"]
        );
        assert_eq!(config.get_string("defaults.nothing"), None);

        let defaults = config.defaults().unwrap();
        assert_eq!(defaults.range, RelativeRange::ThirtyDays);
        assert_eq!(defaults.precision, Some(Precision::Day));
        assert_eq!(defaults.timezone, "America/New_York");
    }

    #[test]
    fn test_flat_keys() {
        let config = Config::from_yaml("defaults.range: hour\n").unwrap();
        assert_eq!(config.defaults().unwrap().range, RelativeRange::Hour);
    }

    #[test]
    fn test_invalid_default() {
        let config = Config::from_yaml("defaults:\n  range: fortnight\n").unwrap();
        assert!(matches!(
            config.defaults(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_args() {
        let command = clap::Command::new("test")
            .arg(clap::Arg::new("defaults.range").long("range"))
            .arg(
                clap::Arg::new("defaults.timezone")
                    .long("timezone")
                    .default_value("UTC"),
            );
        let args = command
            .try_get_matches_from(["test", "--range", "90days"])
            .unwrap();
        let config = Config {
            config: serde_yaml::from_str(include_str!("test/reportopts.yaml")).unwrap(),
            args: Some(args),
        };
        let defaults = config.defaults().unwrap();
        assert_eq!(defaults.range, RelativeRange::NinetyDays);
        // The file wins over a command line default.
        assert_eq!(defaults.timezone, "America/New_York");
    }

    #[test]
    fn test_env_key() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(
            config.env_key("defaults.range"),
            "REPORTOPTS_DEFAULTS_RANGE"
        );
    }
}
