//! Error types for configuration transactions
//!
//! Every failure carries the path of the group where it was raised.
//! Failures below a group surface at that group as [`ConfigTxError::Subgroup`]
//! so the chain of sources reads from the top of the tree down to the
//! group that actually rejected the proposal.

use configtx_tree::GroupPath;
use std::fmt::{self, Display, Formatter};

/// Main configuration transaction error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigTxError {
    /// A proposer returned the wrong number of child handlers
    #[error(
        "contract violation at {path}: proposers returned {value_handlers} value and \
         {policy_handlers} policy handlers for {groups} groups"
    )]
    ContractViolation {
        /// Group whose proposers misbehaved
        path: GroupPath,
        /// Number of child groups declared
        groups: usize,
        /// Number of child value proposers returned
        value_handlers: usize,
        /// Number of child policy proposers returned
        policy_handlers: usize,
    },

    /// A proposer rejected the proposed configuration
    #[error("{stage} failed at {path}{}: {source}", key_suffix(.key.as_deref()))]
    Validation {
        /// Group being proposed
        path: GroupPath,
        /// Step that failed
        stage: ProposalStage,
        /// Value or policy key, when the step is keyed
        key: Option<String>,
        /// Error reported by the proposer
        #[source]
        source: anyhow::Error,
    },

    /// A descendant group failed and rolled back its own work
    #[error("in group {path}: {source}")]
    Subgroup {
        /// Group whose subtree failed
        path: GroupPath,
        /// Failure reported by the child
        #[source]
        source: Box<ConfigTxError>,
    },
}

fn key_suffix(key: Option<&str>) -> String {
    key.map(|k| format!(" (key {k})")).unwrap_or_default()
}

impl ConfigTxError {
    /// Create validation error
    #[inline]
    pub(crate) fn validation(
        path: &GroupPath,
        stage: ProposalStage,
        key: Option<&str>,
        source: anyhow::Error,
    ) -> Self {
        Self::Validation {
            path: path.clone(),
            stage,
            key: key.map(str::to_string),
            source,
        }
    }

    /// Wrap a descendant failure with the path of the group it surfaced at
    #[inline]
    pub(crate) fn subgroup(path: &GroupPath, source: ConfigTxError) -> Self {
        Self::Subgroup {
            path: path.clone(),
            source: Box::new(source),
        }
    }

    /// Classify this error
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContractViolation { .. } => ErrorKind::ContractViolation,
            Self::Validation { .. } => ErrorKind::ValidationFailure,
            Self::Subgroup { .. } => ErrorKind::StructuralFailure,
        }
    }

    /// Path at which this error was raised
    #[inline]
    #[must_use]
    pub fn path(&self) -> &GroupPath {
        match self {
            Self::ContractViolation { path, .. }
            | Self::Validation { path, .. }
            | Self::Subgroup { path, .. } => path,
        }
    }

    /// Innermost error, past every [`ConfigTxError::Subgroup`] layer
    #[must_use]
    pub fn root_cause(&self) -> &ConfigTxError {
        let mut current = self;
        while let Self::Subgroup { source, .. } = current {
            current = &**source;
        }
        current
    }

    /// Path of the group that actually rejected the proposal
    #[inline]
    #[must_use]
    pub fn failed_path(&self) -> &GroupPath {
        self.root_cause().path()
    }

    /// Stage that failed, if the root cause is a validation failure
    #[must_use]
    pub fn failed_stage(&self) -> Option<ProposalStage> {
        match self.root_cause() {
            Self::Validation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Check if the root cause is a collaborator defect rather than bad data
    #[inline]
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        self.root_cause().kind() == ErrorKind::ContractViolation
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Proposer returned a misaligned handler sequence (collaborator defect)
    ContractViolation,
    /// Proposer rejected data
    ValidationFailure,
    /// Descendant group failed
    StructuralFailure,
}

/// Step of the proposal pass at which a proposer was called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalStage {
    /// `begin_value_proposals`
    BeginValueProposals,
    /// `begin_policy_proposals`
    BeginPolicyProposals,
    /// Value deserialization
    DeserializeValue,
    /// `propose_policy`
    ProposePolicy,
    /// `pre_commit`
    PreCommit,
}

impl Display for ProposalStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeginValueProposals => "begin value proposals",
            Self::BeginPolicyProposals => "begin policy proposals",
            Self::DeserializeValue => "value deserialization",
            Self::ProposePolicy => "policy proposal",
            Self::PreCommit => "pre-commit",
        };
        f.write_str(name)
    }
}

/// Errors loading manager configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the configuration file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration parsed but is not usable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
