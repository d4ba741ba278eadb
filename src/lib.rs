//! simtree - introspectable component tree with remote signals.
//!
//! This crate provides the infrastructure layer of a simulation framework:
//! a named component hierarchy built from registered factories, typed
//! options, signals invokable locally or through XML frames, buffered
//! change notifications and a client-side mirror of a remote tree.
//!
//! # Architecture
//!
//! - **Component** - owning tree node with options, signals and tags
//! - **BuilderRegistry** - string-keyed component factories
//! - **Codec** - typed XML value maps used on the wire
//! - **ServerRoot** - authoritative tree, processing thread and journal
//! - **ShadowTree** - client mirror rebuilt from server snapshots
//!
//! # Modules
//!
//! - [`component`] - Component tree, builder registry and built-in variants
//! - [`option`] - Typed, triggerable options
//! - [`signal`] - Signal registration and the dispatch boundary
//! - [`xml`] - Wire value codec and signal frames
//! - [`notification`] - Buffered event fan-out
//! - [`journal`] - Append-only record of completed signals
//! - [`server`] - Server root and processing thread
//! - [`client`] - Shadow tree synchronization
//! - [`config`] - Configuration loading/saving

// Library modules
pub mod client;
pub mod component;
pub mod journal;
pub mod notification;
pub mod option;
pub mod server;
pub mod signal;
pub mod xml;

pub mod config;
pub mod constants;
pub mod env;
pub mod error;
pub mod uri;

// Re-export commonly used types
pub use client::{NodeKind, ShadowTree, TreeNode};
pub use component::{BuilderRegistry, Component};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use journal::{Journal, JournalEntry, JournalFilter};
pub use notification::{Notification, NotificationQueue, Notifier};
pub use option::OptionList;
pub use server::ServerRoot;
pub use signal::{ArgSpec, SignalContext, SignalList};
pub use uri::Uri;
pub use xml::{Map, SignalFrame, Value, ValueType, WireValue, XmlNode};
