// Mount options mask: the per-backend policy applied to user options
//
// A mask is built once (usually at startup, one per mount type) and then
// shared read-only across every resolution.

use crate::coerce::{Coercer, OptionValue, parse_bool};
use crate::error::{ConsistencyIssue, MaskError, MaskResult};
use crate::resolve::{MountOpts, RawUserOptions, ResolveError};
use crate::validate::{OptionValidator, SharedValidator};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Default key that switches the mask into sloppy mode.
pub const SLOPPY_MOUNT_KEY: &str = "sloppy_mount";

/// Immutable option policy.
#[derive(Clone)]
pub struct MountOptsMask {
    allowed: BTreeSet<String>,
    defaults: BTreeMap<String, String>,
    key_permutations: BTreeMap<String, String>,
    ignored: BTreeSet<String>,
    mandatory: Vec<String>,
    sloppy_mount: bool,
    validators: Vec<SharedValidator>,
    coercer: Coercer,
}

impl MountOptsMask {
    /// Build a mask with the default flag keys and no consistency enforcement.
    ///
    /// Fails only when `defaults` carries a `sloppy_mount` value that is not a
    /// boolean literal.
    pub fn new(
        allowed: Vec<String>,
        defaults: BTreeMap<String, OptionValue>,
        key_permutations: BTreeMap<String, String>,
        ignored: Vec<String>,
        mandatory: Vec<String>,
        validators: Vec<SharedValidator>,
    ) -> MaskResult<Self> {
        MaskBuilder {
            allowed,
            defaults,
            key_permutations,
            ignored,
            mandatory,
            validators,
            flag_keys: None,
            strict: false,
        }
        .build()
    }

    pub fn builder() -> MaskBuilder {
        MaskBuilder::default()
    }

    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    /// Defaults, already coerced to strings.
    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    pub fn key_permutations(&self) -> &BTreeMap<String, String> {
        &self.key_permutations
    }

    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    pub fn mandatory(&self) -> &[String] {
        &self.mandatory
    }

    pub fn is_sloppy_mount(&self) -> bool {
        self.sloppy_mount
    }

    pub fn validators(&self) -> &[SharedValidator] {
        &self.validators
    }

    pub fn coercer(&self) -> &Coercer {
        &self.coercer
    }

    pub fn is_ignored(&self, raw_key: &str) -> bool {
        self.ignored.contains(raw_key)
    }

    /// The canonical name for a user-supplied key.
    pub fn canonical_key<'a>(&'a self, raw_key: &'a str) -> &'a str {
        self.key_permutations.get(raw_key).map(String::as_str).unwrap_or(raw_key)
    }

    /// Whether a user-supplied canonical key survives the allowed-set check.
    ///
    /// A sloppy mask with an empty allow-list accepts every key.
    pub fn admits(&self, canonical_key: &str) -> bool {
        self.allowed.contains(canonical_key) || (self.sloppy_mount && self.allowed.is_empty())
    }

    /// Resolve user options against this mask.
    pub fn resolve(&self, user_opts: &RawUserOptions) -> Result<MountOpts, ResolveError> {
        crate::resolve::resolve(user_opts, self)
    }

    /// Contradictions between the key sets that make parts of the policy
    /// unreachable.
    pub fn consistency_issues(&self) -> Vec<ConsistencyIssue> {
        let mut issues = Vec::new();

        for key in &self.mandatory {
            if self.defaults.contains_key(key) {
                continue;
            }

            let reachable_by_permutation = self
                .key_permutations
                .iter()
                .any(|(from, to)| to == key && !self.ignored.contains(from));

            if self.ignored.contains(key) && !reachable_by_permutation {
                issues.push(ConsistencyIssue::IgnoredMandatory(key.clone()));
            } else if !self.admits(key) {
                issues.push(ConsistencyIssue::UnsatisfiableMandatory(key.clone()));
            }
        }

        for (from, to) in &self.key_permutations {
            if self.ignored.contains(from) {
                issues.push(ConsistencyIssue::DeadPermutation {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }

        issues
    }
}

impl fmt::Debug for MountOptsMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountOptsMask")
            .field("allowed", &self.allowed)
            .field("defaults", &self.defaults)
            .field("key_permutations", &self.key_permutations)
            .field("ignored", &self.ignored)
            .field("mandatory", &self.mandatory)
            .field("sloppy_mount", &self.sloppy_mount)
            .field("validators", &self.validators.len())
            .field("flag_keys", self.coercer.flag_keys())
            .finish()
    }
}

impl PartialEq for MountOptsMask {
    fn eq(&self, other: &Self) -> bool {
        // Validators are compared by identity.
        let same_validators = self.validators.len() == other.validators.len()
            && self
                .validators
                .iter()
                .zip(&other.validators)
                .all(|(a, b)| std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)));

        same_validators
            && self.allowed == other.allowed
            && self.defaults == other.defaults
            && self.key_permutations == other.key_permutations
            && self.ignored == other.ignored
            && self.mandatory == other.mandatory
            && self.sloppy_mount == other.sloppy_mount
            && self.coercer == other.coercer
    }
}

/// Builder for [`MountOptsMask`].
#[derive(Default)]
pub struct MaskBuilder {
    allowed: Vec<String>,
    defaults: BTreeMap<String, OptionValue>,
    key_permutations: BTreeMap<String, String>,
    ignored: Vec<String>,
    mandatory: Vec<String>,
    validators: Vec<SharedValidator>,
    flag_keys: Option<Vec<String>>,
    strict: bool,
}

impl MaskBuilder {
    pub fn with_allowed<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_default(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    pub fn with_permutation(
        mut self,
        raw_key: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Self {
        self.key_permutations.insert(raw_key.into(), canonical.into());
        self
    }

    pub fn with_ignored<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_mandatory<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mandatory.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn with_validator(mut self, validator: impl OptionValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn with_shared_validator(mut self, validator: SharedValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Replace the keys whose booleans render as `1`/`0`.
    pub fn with_flag_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flag_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Reject masks whose key sets contradict each other.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> MaskResult<MountOptsMask> {
        let coercer = self.flag_keys.map(Coercer::with_flag_keys).unwrap_or_default();

        let defaults: BTreeMap<String, String> = self
            .defaults
            .iter()
            .map(|(key, value)| (key.clone(), coercer.coerce(value, key)))
            .collect();

        let sloppy_mount = match defaults.get(SLOPPY_MOUNT_KEY) {
            Some(value) => {
                parse_bool(value).ok_or_else(|| MaskError::InvalidSloppyMount(value.clone()))?
            }
            None => false,
        };

        let mut mandatory: Vec<String> = Vec::with_capacity(self.mandatory.len());
        for key in self.mandatory {
            if !mandatory.contains(&key) {
                mandatory.push(key);
            }
        }

        let mask = MountOptsMask {
            allowed: self.allowed.into_iter().collect(),
            defaults,
            key_permutations: self.key_permutations,
            ignored: self.ignored.into_iter().collect(),
            mandatory,
            sloppy_mount,
            validators: self.validators,
            coercer,
        };

        let issues = mask.consistency_issues();
        if !issues.is_empty() {
            if self.strict {
                return Err(MaskError::Inconsistent(issues));
            }
            for issue in &issues {
                tracing::warn!(%issue, "mount options mask has unreachable policy");
            }
        }

        Ok(mask)
    }
}
