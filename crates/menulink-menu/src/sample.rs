//! A small amplifier menu, used by the demo server and by tests.

use crate::{BooleanNaming, ItemId, MenuItem, MenuStore};

pub const VOLUME: ItemId = ItemId(1);
pub const CHANNEL: ItemId = ItemId(2);
pub const SETTINGS: ItemId = ItemId(3);
pub const STANDBY: ItemId = ItemId(4);
pub const STATUS: ItemId = ItemId(5);
pub const LEFT_TEMP: ItemId = ItemId(7);
pub const RIGHT_TEMP: ItemId = ItemId(8);
pub const CONTRAST: ItemId = ItemId(10);
pub const ZONE_NAME: ItemId = ItemId(11);
pub const RESET: ItemId = ItemId(12);
pub const VOLTAGE: ItemId = ItemId(13);
pub const REMOTES: ItemId = ItemId(14);

/// Builds the sample tree:
///
/// ```text
/// Volume          analog  0..255, shown as (v - 190) / 2 dB
/// Channel         enum    CD Player | Turntable | Computer
/// Settings
/// ├── 12V Standby boolean (yes/no)
/// ├── Contrast    analog  0..255 / 2
/// ├── Zone Name   text    10 chars
/// └── Reset       action
/// Status
/// ├── L HS Temp   analog  0..255 / 2 C
/// ├── R HS Temp   analog  0..255 / 2 C
/// ├── Voltage     float   read-only, 2 dp
/// └── Remotes     remote status
/// ```
pub fn amplifier_menu() -> MenuStore {
    let mut menu = MenuStore::new();
    let items = [
        (None, MenuItem::analog(1, "Volume", 255, -190, 2, "dB").with_eeprom(2)),
        (
            None,
            MenuItem::enumeration(2, "Channel", ["CD Player", "Turntable", "Computer"]).with_eeprom(4),
        ),
        (None, MenuItem::submenu(3, "Settings")),
        (Some(SETTINGS), MenuItem::boolean(4, "12V Standby", BooleanNaming::YesNo)),
        (Some(SETTINGS), MenuItem::analog(10, "Contrast", 255, 0, 2, "").with_eeprom(6)),
        (Some(SETTINGS), MenuItem::text(11, "Zone Name", 10).with_text("Lounge")),
        (Some(SETTINGS), MenuItem::action(12, "Reset")),
        (None, MenuItem::submenu(5, "Status")),
        (Some(STATUS), MenuItem::analog(7, "L HS Temp", 255, 0, 2, "C").read_only()),
        (Some(STATUS), MenuItem::analog(8, "R HS Temp", 255, 0, 2, "C").read_only()),
        (Some(STATUS), MenuItem::float(13, "Voltage", 2).read_only()),
        (Some(STATUS), MenuItem::remote_status(14, "Remotes", 0).read_only()),
    ];
    for (parent, item) in items {
        // Ids and parents above are fixed and valid.
        if let Err(e) = menu.add_item(parent, item) {
            tracing::error!(error = %e, "sample menu is inconsistent");
        }
    }
    menu
}
