// Option resolution
//
// Turns raw user options into the final option set for a mount, applying a
// mask. Every pass runs to completion so a single call reports all problems
// at once instead of the first one found.

use crate::coerce::OptionValue;
use crate::error::Violation;
use crate::mask::MountOptsMask;
use std::collections::BTreeMap;

pub use crate::error::ResolveError;

/// Options as supplied by a caller, keyed by the caller's spelling.
pub type RawUserOptions = BTreeMap<String, OptionValue>;

/// Resolved options: canonical key to canonical string value.
pub type MountOpts = BTreeMap<String, String>;

/// A user option after ignore filtering, renaming and coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CanonicalOption<'a> {
    raw_key: &'a str,
    key: &'a str,
    value: String,
}

/// Resolve `user_opts` against `mask`.
///
/// On success the result is the mask's defaults overlaid with every accepted
/// user option. On failure no options are returned; the error lists every
/// validation failure, disallowed key and missing mandatory key.
pub fn resolve(
    user_opts: &RawUserOptions,
    mask: &MountOptsMask,
) -> Result<MountOpts, ResolveError> {
    let canonical = canonicalize(user_opts, mask);
    let (accepted, not_allowed) = check_allowed(canonical, mask);
    let validation = run_validators(&accepted, mask);
    let merged = merge_defaults(&accepted, mask);
    let missing = missing_mandatory(&merged, mask);

    let violations: Vec<Violation> =
        validation.into_iter().chain(not_allowed).chain(missing).collect();

    if !violations.is_empty() {
        tracing::debug!(violations = violations.len(), "mount options rejected");
        return Err(ResolveError::new(violations));
    }

    tracing::debug!(options = merged.len(), "mount options resolved");
    Ok(merged)
}

fn canonicalize<'a>(
    user_opts: &'a RawUserOptions,
    mask: &'a MountOptsMask,
) -> Vec<CanonicalOption<'a>> {
    user_opts
        .iter()
        .filter(|(raw_key, _)| {
            let ignored = mask.is_ignored(raw_key);
            if ignored {
                tracing::trace!(key = %raw_key, "dropping ignored option");
            }
            !ignored
        })
        .map(|(raw_key, value)| {
            let key = mask.canonical_key(raw_key);
            if key != raw_key.as_str() {
                tracing::trace!(from = %raw_key, to = %key, "renaming option");
            }
            let value = mask.coercer().coerce(value, key);
            CanonicalOption { raw_key: raw_key.as_str(), key, value }
        })
        .collect()
}

fn check_allowed<'a>(
    options: Vec<CanonicalOption<'a>>,
    mask: &MountOptsMask,
) -> (Vec<CanonicalOption<'a>>, Vec<Violation>) {
    let mut accepted = Vec::with_capacity(options.len());
    let mut violations = Vec::new();

    for option in options {
        if mask.admits(option.key) {
            accepted.push(option);
        } else if mask.is_sloppy_mount() {
            tracing::trace!(key = %option.raw_key, "sloppy mount: dropping unknown option");
        } else {
            violations.push(Violation::NotAllowed { raw_key: option.raw_key.to_string() });
        }
    }

    (accepted, violations)
}

fn run_validators(options: &[CanonicalOption<'_>], mask: &MountOptsMask) -> Vec<Violation> {
    let mut violations = Vec::new();

    for option in options {
        for validator in mask.validators() {
            if let Err(e) = validator.validate(option.key, &option.value) {
                violations.push(Violation::Validation {
                    key: option.key.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    violations
}

fn merge_defaults(options: &[CanonicalOption<'_>], mask: &MountOptsMask) -> MountOpts {
    let mut merged = mask.defaults().clone();
    for option in options {
        merged.insert(option.key.to_string(), option.value.clone());
    }
    merged
}

fn missing_mandatory(merged: &MountOpts, mask: &MountOptsMask) -> Vec<Violation> {
    mask.mandatory()
        .iter()
        .filter(|key| !merged.contains_key(key.as_str()))
        .map(|key| Violation::MissingMandatory { key: key.clone() })
        .collect()
}
