// Pluggable option validation
//
// A mask carries zero or more validators; the resolver hands each of them
// every surviving (canonical key, coerced value) pair.

use anyhow::{Result, bail};
#[cfg(any(test, feature = "mockall"))]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Checks a single canonical option after coercion.
///
/// Returning `Err` records a validation violation; the error's display text
/// becomes the message in the aggregated report.
#[cfg_attr(any(test, feature = "mockall"), automock)]
pub trait OptionValidator: Send + Sync {
    fn validate(&self, key: &str, value: &str) -> Result<()>;
}

impl<F> OptionValidator for F
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    fn validate(&self, key: &str, value: &str) -> Result<()> {
        self(key, value)
    }
}

pub type SharedValidator = Arc<dyn OptionValidator>;

/// Validators that can be declared in a configuration profile.
///
/// `key: None` applies the check to every option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuiltinValidator {
    OneOf {
        #[serde(default)]
        key: Option<String>,
        values: BTreeSet<String>,
    },
    IntegerRange {
        #[serde(default)]
        key: Option<String>,
        min: i64,
        max: i64,
    },
    NonEmpty {
        #[serde(default)]
        key: Option<String>,
    },
}

impl BuiltinValidator {
    fn target(&self) -> Option<&str> {
        match self {
            BuiltinValidator::OneOf { key, .. }
            | BuiltinValidator::IntegerRange { key, .. }
            | BuiltinValidator::NonEmpty { key } => key.as_deref(),
        }
    }

    fn applies_to(&self, key: &str) -> bool {
        self.target().is_none_or(|target| target == key)
    }

    pub fn into_shared(self) -> SharedValidator {
        Arc::new(self)
    }
}

impl OptionValidator for BuiltinValidator {
    fn validate(&self, key: &str, value: &str) -> Result<()> {
        if !self.applies_to(key) {
            return Ok(());
        }

        match self {
            BuiltinValidator::OneOf { values, .. } => {
                if !values.contains(value) {
                    let expected: Vec<&str> = values.iter().map(String::as_str).collect();
                    bail!("{} must be one of [{}], got {:?}", key, expected.join(", "), value);
                }
            }
            BuiltinValidator::IntegerRange { min, max, .. } => match value.parse::<i64>() {
                Ok(n) if (*min..=*max).contains(&n) => {}
                _ => bail!("{key} must be an integer between {min} and {max}, got {value:?}"),
            },
            BuiltinValidator::NonEmpty { .. } => {
                if value.is_empty() {
                    bail!("{key} must not be empty");
                }
            }
        }

        Ok(())
    }
}
