//! Configuration Tree
//!
//! Data model for a channel's hierarchical configuration.
//!
//! # Core Concepts
//!
//! - [`ConfigGroup`]: Named group holding sub-groups, values and policies
//! - [`ConfigValue`]: Opaque, versioned value payload
//! - [`ConfigPolicy`]: Opaque, versioned access policy payload
//! - [`GroupPath`]: Hierarchical addressing of groups within a tree
//! - [`ConfigDigest`]: Order-independent Blake3 digest of a tree
//!
//! # Example
//!
//! ```rust,ignore
//! use configtx_tree::{ConfigGroup, ConfigValue};
//!
//! let channel = ConfigGroup::new()
//!     .with_group("Orderer", ConfigGroup::new().with_value("BatchSize", ConfigValue::new(b"10".to_vec())))
//!     .with_group("Application", ConfigGroup::new());
//!
//! assert_eq!(channel.group_count(), 3);
//! println!("digest: {}", channel.digest());
//! ```

#![warn(unreachable_pub)]

mod bytes;
mod digest;
mod group;
mod path;

pub use digest::{ConfigDigest, DigestError};
pub use group::{ConfigGroup, ConfigPolicy, ConfigValue, DecodeError, Policy};
pub use path::{GroupPath, PathError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
