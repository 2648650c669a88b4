use crate::coerce::OptionValue;
use crate::error::MaskError;
use crate::mask::MountOptsMask;
use crate::validate::BuiltinValidator;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Invalid profile {profile}: {source}")]
    InvalidProfile {
        profile: String,
        #[source]
        source: MaskError,
    },
}

/// Top-level configuration: one mask profile per backend or mount type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

/// Declarative form of a [`MountOptsMask`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub allowed: Vec<String>,
    pub defaults: BTreeMap<String, OptionValue>,
    pub key_permutations: BTreeMap<String, String>,
    pub ignored: Vec<String>,
    pub mandatory: Vec<String>,
    pub validators: Vec<BuiltinValidator>,
    /// Keys whose booleans render as `1`/`0`; `None` keeps the built-in set.
    pub flag_keys: Option<Vec<String>>,
    pub strict: bool,
}

const ENV_PREFIX: &str = "MOUNTOPTS";
const ENV_SEPARATOR: &str = "__";

/// Profile fields that hold lists; their environment values are split on `,`.
const LIST_FIELDS: &[&str] = &["allowed", "ignored", "mandatory", "flag_keys"];

fn environment() -> config::Environment {
    let mut env = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    // With no list keys registered, `config` splits every string value.
    let list_keys = list_parse_keys(std::env::vars().map(|(key, _)| key));
    if !list_keys.is_empty() {
        env = env.list_separator(",");
        for key in &list_keys {
            env = env.with_list_parse_key(key);
        }
    }

    env
}

/// Dotted config keys of every list field in profiles named by
/// `MOUNTOPTS__PROFILES__<NAME>__...` variables.
fn list_parse_keys(env_keys: impl IntoIterator<Item = String>) -> Vec<String> {
    let prefix = format!("{ENV_PREFIX}{ENV_SEPARATOR}PROFILES{ENV_SEPARATOR}").to_lowercase();

    let profiles: BTreeSet<String> = env_keys
        .into_iter()
        .filter_map(|key| {
            let key = key.to_lowercase();
            let rest = key.strip_prefix(&prefix)?;
            let (profile, _) = rest.split_once(ENV_SEPARATOR)?;
            Some(profile.to_string())
        })
        .collect();

    profiles
        .iter()
        .flat_map(|profile| {
            LIST_FIELDS.iter().map(move |field| format!("profiles.{profile}.{field}"))
        })
        .collect()
}

impl Config {
    /// Load from an optional `mountopts.*` file in the working directory,
    /// then `MOUNTOPTS__*` environment variables (`__` separates path
    /// segments, e.g. `MOUNTOPTS__PROFILES__NFS__STRICT=true`).
    pub fn load() -> ConfigResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("mountopts").required(false))
            .add_source(environment())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from an explicit file; its format is taken from the extension.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn profile(&self, name: &str) -> ConfigResult<&ProfileConfig> {
        self.profiles.get(name).ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }

    /// Build the mask for a named profile.
    pub fn build_mask(&self, name: &str) -> ConfigResult<MountOptsMask> {
        self.profile(name)?
            .build_mask()
            .map_err(|source| ConfigError::InvalidProfile { profile: name.to_string(), source })
    }
}

impl ProfileConfig {
    pub fn build_mask(&self) -> Result<MountOptsMask, MaskError> {
        let mut builder = MountOptsMask::builder()
            .with_allowed(self.allowed.iter().cloned())
            .with_ignored(self.ignored.iter().cloned())
            .with_mandatory(self.mandatory.iter().cloned())
            .strict(self.strict);

        for (key, value) in &self.defaults {
            builder = builder.with_default(key.clone(), value.clone());
        }

        for (raw, canonical) in &self.key_permutations {
            builder = builder.with_permutation(raw.clone(), canonical.clone());
        }

        for validator in &self.validators {
            builder = builder.with_shared_validator(validator.clone().into_shared());
        }

        if let Some(flag_keys) = &self.flag_keys {
            builder = builder.with_flag_keys(flag_keys.iter().cloned());
        }

        builder.build()
    }
}
