//! Client mirror of a remote component tree.
//!
//! - [`ShadowTree`] - merges `list_tree` snapshots, builds request frames
//!   and applies replies
//! - [`TreeNode`] - one shadow entry, server-origin or client-local

pub mod node;
pub mod tree;

pub use node::{NodeKind, TreeNode};
pub use tree::{ModelIndex, ShadowTree};
