//! The [`MenuTree`] trait: what the protocol needs from a menu.

use crate::{ItemId, MenuItem};

/// Read/write access to a menu tree, addressed by [`ItemId`].
///
/// The tree is an ordered forest: the root level is a list of items, and
/// every submenu holds an ordered list of children. Traversal is by id so
/// callers can hold a position across calls without borrowing the tree.
///
/// `Send` lets the tree sit behind the async driver's mutex.
pub trait MenuTree: Send {
    /// First item at the root level.
    fn root(&self) -> Option<ItemId>;

    fn item(&self, id: ItemId) -> Option<&MenuItem>;

    fn item_mut(&mut self, id: ItemId) -> Option<&mut MenuItem>;

    /// First child of a submenu.
    fn first_child(&self, id: ItemId) -> Option<ItemId>;

    /// Next item in the same list as `id`.
    fn next_sibling(&self, id: ItemId) -> Option<ItemId>;

    /// Submenu containing `id`; `None` at the root level.
    fn parent_of(&self, id: ItemId) -> Option<ItemId>;

    /// Runs whatever an action item does. Returns `false` if `id` is not
    /// an action.
    fn trigger_action(&mut self, id: ItemId) -> bool;

    /// The item after `id` in depth-first order: a submenu's first child
    /// comes right after the submenu, and after the last child the walk
    /// continues with the submenu's next sibling (climbing as many levels
    /// as needed).
    fn next_in_order(&self, id: ItemId) -> Option<ItemId> {
        if let Some(child) = self.first_child(id) {
            return Some(child);
        }
        let mut current = id;
        loop {
            if let Some(sibling) = self.next_sibling(current) {
                return Some(sibling);
            }
            current = self.parent_of(current)?;
        }
    }
}

/// Every item id in depth-first order.
pub fn depth_first(tree: &(impl MenuTree + ?Sized)) -> Vec<ItemId> {
    let mut ids = Vec::new();
    let mut next = tree.root();
    while let Some(id) = next {
        ids.push(id);
        next = tree.next_in_order(id);
    }
    ids
}
