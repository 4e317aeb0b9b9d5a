//! Configuration Transactions
//!
//! All-or-nothing reconfiguration of a hierarchical channel configuration.
//!
//! # Core Concepts
//!
//! - [`ValueProposer`] / [`PolicyProposer`]: Pluggable per-group validators
//! - [`Initializer`]: Supplies the proposer pair for the top of the tree
//! - [`ConfigManager`]: Proposes a whole tree as one transaction
//! - [`TransactionResult`]: Validated subtree, committed or rolled back as a unit
//!
//! A failure anywhere in the tree rolls back every proposer that was asked
//! to propose, children before parents, and nothing is committed.
//!
//! # Example
//!
//! ```rust,ignore
//! use configtx_core::{ConfigManager, ManagerConfig};
//!
//! let manager = ConfigManager::new(ManagerConfig::new("mychannel"), initializer)?;
//!
//! // Two-phase: validate, then decide
//! let result = manager.process_config(Arc::new(channel_group))?;
//! result.commit();
//!
//! // Or in one step
//! let committed = manager.apply(Arc::new(next_group))?;
//! println!("sequence {} digest {}", committed.sequence, committed.digest);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod context;
mod error;
mod manager;
mod propose;
mod proposer;
mod result;
mod wrapper;

// Re-exports
pub use config::{ManagerConfig, SiblingOrder, DEFAULT_ROOT_GROUP_KEY};
pub use context::{TxContext, TxId};
pub use error::{ConfigError, ConfigTxError, ErrorKind, ProposalStage};
pub use manager::{CommittedConfig, ConfigManager};
pub use proposer::{
    DeserializedValue, Initializer, PolicyProposer, Transactional, ValueDeserializer,
    ValueProposals, ValueProposer,
};
pub use result::TransactionResult;
pub use wrapper::GroupWrapper;

pub use configtx_tree::{ConfigDigest, ConfigGroup, ConfigPolicy, ConfigValue, GroupPath};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
