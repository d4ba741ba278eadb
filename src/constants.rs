//! Application-wide constants for simtree.
//!
//! Wire vocabulary (element names, attribute names, signal and event names)
//! lives here so the codec, the tree and the client mirror agree on it.
//!
//! # Categories
//!
//! - **Paths**: separators and scheme
//! - **Wire**: XML element and attribute names
//! - **Signals & events**: builtin signal names and notification events
//! - **Polling**: processing thread intervals

use std::time::Duration;

// ============================================================================
// Paths
// ============================================================================

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Optional scheme prefix accepted on textual paths.
pub const PATH_SCHEME: &str = "cpath:";

/// Default name of the designated root component.
pub const DEFAULT_ROOT_NAME: &str = "Root";

/// Default delimiter for array values.
pub const DEFAULT_ARRAY_DELIMITER: &str = ";";

// ============================================================================
// Wire
// ============================================================================

/// Element wrapping keyed value and array entries.
pub const MAP_ELEMENT: &str = "map";

/// Element of a single keyed value.
pub const VALUE_ELEMENT: &str = "value";

/// Element of a keyed array.
pub const ARRAY_ELEMENT: &str = "array";

/// Element of a keyed nested subtree.
pub const SUBTREE_ELEMENT: &str = "subtree";

/// Element of one component in a tree snapshot.
pub const NODE_ELEMENT: &str = "node";

/// Root element of a signal or reply frame.
pub const FRAME_ELEMENT: &str = "frame";

/// Error payload element of a reply frame.
pub const ERROR_ELEMENT: &str = "error";

/// Key attribute of map entries.
pub const ATTR_KEY: &str = "key";

/// Description attribute of map entries.
pub const ATTR_DESCR: &str = "descr";

/// Element type attribute of arrays.
pub const ATTR_TYPE: &str = "type";

/// Element count attribute of arrays.
pub const ATTR_SIZE: &str = "size";

/// Delimiter attribute of arrays.
pub const ATTR_DELIMITER: &str = "delimiter";

/// Option classification attribute (`basic` or `adv`).
pub const ATTR_MODE: &str = "mode";

/// Key of the child array carrying an option's restricted values.
pub const RESTRICTED_LIST_KEY: &str = "restricted_list";

// ============================================================================
// Tags
// ============================================================================

/// Classification tag of components and options shown in basic mode.
pub const TAG_BASIC: &str = "basic";

/// Classification tag of client-local components.
pub const TAG_LOCAL: &str = "local";

/// Classification tag of debug-only client components.
pub const TAG_DEBUG: &str = "debug";

// ============================================================================
// Signals & events
// ============================================================================

/// Applies a map of option values.
pub const SIG_CONFIGURE: &str = "configure";

/// Builds a child through the builder registry.
pub const SIG_CREATE_COMPONENT: &str = "create_component";

/// Removes a child by name.
pub const SIG_DELETE_COMPONENT: &str = "delete_component";

/// Renames a child.
pub const SIG_RENAME_COMPONENT: &str = "rename_component";

/// Replies with a snapshot of the receiver's subtree.
pub const SIG_LIST_TREE: &str = "list_tree";

/// Replies with the receiver's options.
pub const SIG_LIST_CONTENT: &str = "list_content";

/// Replies with the argument layout of a signal.
pub const SIG_SIGNAL_SIGNATURE: &str = "signal_signature";

/// Structural change below a component.
pub const EVENT_TREE_UPDATED: &str = "tree_updated";

/// Option values of a component changed.
pub const EVENT_OPTIONS_CHANGED: &str = "options_changed";

/// Reply key carrying a tree snapshot.
pub const TREE_KEY: &str = "tree";

// ============================================================================
// Polling
// ============================================================================

/// Receive timeout of the processing thread between shutdown checks.
pub const PROCESSING_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on how long `Drop` waits for the processing thread.
pub const PROCESSING_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
