//! Error types for the menu layer.

use crate::ItemId;

/// Errors that can occur while building or changing a menu tree.
#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    /// Another item already uses this id.
    #[error("duplicate item id {0}")]
    DuplicateId(ItemId),

    /// The requested parent does not exist.
    #[error("parent {0} not found")]
    ParentNotFound(ItemId),

    /// Only submenus can have children.
    #[error("item {0} is not a submenu")]
    NotASubMenu(ItemId),

    /// No item has this id.
    #[error("item {0} not found")]
    ItemNotFound(ItemId),
}
