//! The menu side of menulink.
//!
//! A remote sees the host's menu as a tree of [`MenuItem`]s. This crate
//! models those items and the tree they live in:
//!
//! - [`MenuItem`] and [`ItemData`]: one node, with its kind-specific data
//!   and the per-remote *send-needed* flags that drive change streaming.
//! - [`MenuTree`]: the interface the protocol uses to walk and change a
//!   tree. Hosts with their own menu storage implement it directly.
//! - [`MenuStore`]: a ready-made in-memory [`MenuTree`].
//! - [`DialogController`]: how remote dialog button presses reach the host.
//!
//! # How it fits in the stack
//!
//! ```text
//! Connection (menulink crate)  ← bootstraps and streams items
//!     ↕
//! Menu Layer (this crate)      ← items, tree walking, values
//! ```
//!
//! # Example
//!
//! ```rust
//! use menulink_menu::{MenuTree, depth_first, sample};
//!
//! let mut menu = sample::amplifier_menu();
//! assert_eq!(depth_first(&menu).len(), menu.len());
//!
//! let volume = menu.item_mut(sample::VOLUME).unwrap();
//! volume.set_int(200);
//! assert!(volume.is_send_remote_needed(0));
//! ```

mod dialog;
mod error;
mod item;
pub mod sample;
mod store;
mod tree;

pub use dialog::{ButtonType, DialogController};
pub use error::MenuError;
pub use item::{BooleanNaming, ItemData, ItemId, MAX_REMOTES, MenuItem};
pub use store::MenuStore;
pub use tree::{MenuTree, depth_first};
