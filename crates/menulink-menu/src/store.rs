//! [`MenuStore`]: an in-memory [`MenuTree`].

use std::collections::HashMap;
use std::fmt;

use crate::{ItemId, MenuError, MenuItem, MenuTree};

type ActionCallback = Box<dyn FnMut(ItemId) + Send>;

#[derive(Debug)]
struct Node {
    item: MenuItem,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
}

/// A menu tree held in a map of nodes, keyed by id.
///
/// ```rust
/// use menulink_menu::{MenuItem, MenuStore, MenuTree, ItemId};
///
/// let mut menu = MenuStore::new();
/// menu.add_item(None, MenuItem::analog(1, "Volume", 255, -190, 2, "dB")).unwrap();
/// let settings = menu.add_item(None, MenuItem::submenu(3, "Settings")).unwrap();
/// menu.add_item(Some(settings), MenuItem::text(4, "Name", 10)).unwrap();
///
/// assert_eq!(menu.root(), Some(ItemId(1)));
/// assert_eq!(menu.first_child(settings), Some(ItemId(4)));
/// assert_eq!(menu.parent_of(ItemId(4)), Some(settings));
/// ```
#[derive(Default)]
pub struct MenuStore {
    nodes: HashMap<ItemId, Node>,
    roots: Vec<ItemId>,
    actions: HashMap<ItemId, ActionCallback>,
}

impl fmt::Debug for MenuStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuStore")
            .field("items", &self.nodes.len())
            .field("roots", &self.roots)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl MenuStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item` to the end of `parent`'s children, or to the root
    /// level when `parent` is `None`.
    pub fn add_item(&mut self, parent: Option<ItemId>, item: MenuItem) -> Result<ItemId, MenuError> {
        let id = item.id;
        if self.nodes.contains_key(&id) {
            return Err(MenuError::DuplicateId(id));
        }
        match parent {
            Some(pid) => {
                let parent_node = self.nodes.get_mut(&pid).ok_or(MenuError::ParentNotFound(pid))?;
                if !parent_node.item.is_submenu() {
                    return Err(MenuError::NotASubMenu(pid));
                }
                parent_node.children.push(id);
            }
            None => self.roots.push(id),
        }
        tracing::trace!(%id, name = %item.name, "menu item added");
        self.nodes.insert(
            id,
            Node {
                item,
                parent,
                children: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Registers the callback run when a remote triggers action `id`.
    pub fn on_action(&mut self, id: ItemId, callback: impl FnMut(ItemId) + Send + 'static) {
        self.actions.insert(id, Box::new(callback));
    }

    /// Applies `f` to an item, for host-side value changes.
    pub fn update<R>(&mut self, id: ItemId, f: impl FnOnce(&mut MenuItem) -> R) -> Result<R, MenuError> {
        self.item_mut(id).map(f).ok_or(MenuError::ItemNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Marks every item changed, e.g. after loading saved values.
    pub fn mark_all_changed(&mut self) {
        for node in self.nodes.values_mut() {
            node.item.mark_changed();
        }
    }

    fn siblings_of(&self, id: ItemId) -> Option<&[ItemId]> {
        match self.nodes.get(&id)?.parent {
            Some(parent) => self.nodes.get(&parent).map(|n| n.children.as_slice()),
            None => Some(self.roots.as_slice()),
        }
    }
}

impl MenuTree for MenuStore {
    fn root(&self) -> Option<ItemId> {
        self.roots.first().copied()
    }

    fn item(&self, id: ItemId) -> Option<&MenuItem> {
        self.nodes.get(&id).map(|n| &n.item)
    }

    fn item_mut(&mut self, id: ItemId) -> Option<&mut MenuItem> {
        self.nodes.get_mut(&id).map(|n| &mut n.item)
    }

    fn first_child(&self, id: ItemId) -> Option<ItemId> {
        self.nodes.get(&id)?.children.first().copied()
    }

    fn next_sibling(&self, id: ItemId) -> Option<ItemId> {
        let siblings = self.siblings_of(id)?;
        let pos = siblings.iter().position(|s| *s == id)?;
        siblings.get(pos + 1).copied()
    }

    fn parent_of(&self, id: ItemId) -> Option<ItemId> {
        self.nodes.get(&id)?.parent
    }

    fn trigger_action(&mut self, id: ItemId) -> bool {
        let is_action = self
            .item(id)
            .is_some_and(|item| matches!(item.data, crate::ItemData::Action));
        if !is_action {
            return false;
        }
        tracing::debug!(%id, "action triggered");
        if let Some(callback) = self.actions.get_mut(&id) {
            callback(id);
        }
        true
    }
}
