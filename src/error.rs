use std::fmt;
use thiserror::Error;

pub type MaskResult<T> = Result<T, MaskError>;

/// Failure to construct a [`MountOptsMask`](crate::mask::MountOptsMask).
#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Invalid sloppy_mount option: parsing {0:?}: invalid syntax")]
    InvalidSloppyMount(String),

    #[error("Inconsistent mount options mask: {}", join_issues(.0))]
    Inconsistent(Vec<ConsistencyIssue>),
}

fn join_issues(issues: &[ConsistencyIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// A contradiction between the key sets of a mask.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    #[error("option {0} is both ignored and mandatory")]
    IgnoredMandatory(String),

    #[error("permutation {from} -> {to} can never apply because {from} is ignored")]
    DeadPermutation { from: String, to: String },

    #[error("mandatory option {0} is neither allowed nor defaulted")]
    UnsatisfiableMandatory(String),
}

/// One policy failure found while resolving user options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A validator rejected a canonical key/value pair.
    Validation { key: String, message: String },
    /// A user key outside the allowed set; carries the key as the user wrote it.
    NotAllowed { raw_key: String },
    /// A mandatory key absent after defaults were merged.
    MissingMandatory { key: String },
}

/// Every violation found by a single resolution, reported together.
///
/// Renders one line per violation class, in the order validation,
/// not-allowed, missing-mandatory:
///
/// ```text
/// - validation mount options failed: <msg>, <msg>
/// - Not allowed options: <key>, <key>
/// - Missing mandatory options: <key>, <key>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    violations: Vec<Violation>,
}

impl ResolveError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn validation_messages(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                Violation::Validation { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn not_allowed(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                Violation::NotAllowed { raw_key } => Some(raw_key.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn missing_mandatory(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                Violation::MissingMandatory { key } => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let validation = self.validation_messages();
        if !validation.is_empty() {
            writeln!(f, "- validation mount options failed: {}", validation.join(", "))?;
        }

        let not_allowed = self.not_allowed();
        if !not_allowed.is_empty() {
            writeln!(f, "- Not allowed options: {}", not_allowed.join(", "))?;
        }

        let missing = self.missing_mandatory();
        if !missing.is_empty() {
            writeln!(f, "- Missing mandatory options: {}", missing.join(", "))?;
        }

        Ok(())
    }
}

impl std::error::Error for ResolveError {}
