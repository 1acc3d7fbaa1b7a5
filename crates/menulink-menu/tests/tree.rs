//! Traversal tests over the public menu API.

use menulink_menu::{ItemData, ItemId, MenuItem, MenuStore, MenuTree, depth_first, sample};

#[test]
fn test_every_item_visited_once() {
    let menu = sample::amplifier_menu();
    let mut ids = depth_first(&menu);
    assert_eq!(ids.len(), menu.len());
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), menu.len());
}

#[test]
fn test_parents_come_before_children() {
    let menu = sample::amplifier_menu();
    let order = depth_first(&menu);
    for (pos, id) in order.iter().enumerate() {
        if let Some(parent) = menu.parent_of(*id) {
            let parent_pos = order.iter().position(|p| *p == parent).unwrap();
            assert!(parent_pos < pos, "{parent} should come before {id}");
        }
    }
}

#[test]
fn test_deep_nesting_unwinds_to_root() {
    // 1 [2 [3 [4]]], 5
    let mut menu = MenuStore::new();
    menu.add_item(None, MenuItem::submenu(1, "a")).unwrap();
    menu.add_item(Some(ItemId(1)), MenuItem::submenu(2, "b")).unwrap();
    menu.add_item(Some(ItemId(2)), MenuItem::submenu(3, "c")).unwrap();
    menu.add_item(Some(ItemId(3)), MenuItem::action(4, "d")).unwrap();
    menu.add_item(None, MenuItem::action(5, "e")).unwrap();

    assert_eq!(menu.next_in_order(ItemId(4)), Some(ItemId(5)));
    assert_eq!(
        depth_first(&menu),
        [1, 2, 3, 4, 5].map(ItemId).to_vec()
    );
}

#[test]
fn test_empty_tree() {
    let menu = MenuStore::new();
    assert!(menu.is_empty());
    assert!(depth_first(&menu).is_empty());
}

#[test]
fn test_menu_tree_is_object_safe() {
    let mut menu = sample::amplifier_menu();
    let tree: &mut dyn MenuTree = &mut menu;
    assert!(tree.trigger_action(sample::RESET));
    assert!(matches!(
        tree.item(sample::REMOTES).map(|i| &i.data),
        Some(ItemData::RemoteStatus { remote_no: 0, .. })
    ));
    assert_eq!(depth_first(&*tree).first(), Some(&sample::VOLUME));
}
