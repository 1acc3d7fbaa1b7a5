//! Menu items: the things a remote can see and change.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Largest number of connections a send-needed bitset can track.
pub const MAX_REMOTES: usize = u32::BITS as usize;

// ---------------------------------------------------------------------------
// ItemId
// ---------------------------------------------------------------------------

/// A menu item's numeric id, unique within a tree.
///
/// Id 0 is never used by an item: on the wire it means "the root" when
/// sent as a parent id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u16);

impl ItemId {
    /// Wire form, used for the `ID` and `PI` fields.
    pub fn as_wire(self) -> i64 {
        i64::from(self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Item data
// ---------------------------------------------------------------------------

/// How a boolean is labelled on a remote (`BN` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BooleanNaming {
    #[default]
    TrueFalse,
    OnOff,
    YesNo,
}

impl BooleanNaming {
    pub fn code(self) -> i64 {
        match self {
            BooleanNaming::TrueFalse => 0,
            BooleanNaming::OnOff => 1,
            BooleanNaming::YesNo => 2,
        }
    }
}

/// The kind-specific part of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemData {
    /// An integer shown as `(value + offset) / divisor` with a unit.
    Analog {
        value: u16,
        max: u16,
        offset: i32,
        divisor: u16,
        unit: String,
    },
    /// One of a list of choices; `value` is the index.
    Enum { value: u16, choices: Vec<String> },
    Boolean { value: bool, naming: BooleanNaming },
    Text { value: String, max_len: usize },
    SubMenu,
    Action,
    /// Display-only decimal value.
    Float { value: f32, decimal_places: u8 },
    /// Shows the status of one remote connection.
    RemoteStatus { remote_no: u8, status: String },
}

// ---------------------------------------------------------------------------
// MenuItem
// ---------------------------------------------------------------------------

/// One node of a menu tree.
///
/// Besides its data, every item carries a *send-needed* bitset: bit `n` is
/// set when remote connection `n` has not yet been told about the item's
/// current value. Changing a value through the setters below sets every
/// bit; each connection clears its own bit as it sends the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: ItemId,
    pub name: String,
    pub read_only: bool,
    pub visible: bool,
    /// Persistent storage position, `None` if not saved.
    pub eeprom: Option<u16>,
    pub data: ItemData,
    #[serde(skip)]
    send_needed: u32,
}

impl MenuItem {
    pub fn new(id: u16, name: impl Into<String>, data: ItemData) -> Self {
        Self {
            id: ItemId(id),
            name: name.into(),
            read_only: false,
            visible: true,
            eeprom: None,
            data,
            send_needed: 0,
        }
    }

    pub fn analog(id: u16, name: impl Into<String>, max: u16, offset: i32, divisor: u16, unit: &str) -> Self {
        Self::new(
            id,
            name,
            ItemData::Analog {
                value: 0,
                max,
                offset,
                divisor: divisor.max(1),
                unit: unit.to_string(),
            },
        )
    }

    pub fn enumeration<S: Into<String>>(id: u16, name: impl Into<String>, choices: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            id,
            name,
            ItemData::Enum {
                value: 0,
                choices: choices.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn boolean(id: u16, name: impl Into<String>, naming: BooleanNaming) -> Self {
        Self::new(id, name, ItemData::Boolean { value: false, naming })
    }

    pub fn text(id: u16, name: impl Into<String>, max_len: usize) -> Self {
        Self::new(
            id,
            name,
            ItemData::Text {
                value: String::new(),
                max_len,
            },
        )
    }

    pub fn submenu(id: u16, name: impl Into<String>) -> Self {
        Self::new(id, name, ItemData::SubMenu)
    }

    pub fn action(id: u16, name: impl Into<String>) -> Self {
        Self::new(id, name, ItemData::Action)
    }

    pub fn float(id: u16, name: impl Into<String>, decimal_places: u8) -> Self {
        Self::new(
            id,
            name,
            ItemData::Float {
                value: 0.0,
                decimal_places,
            },
        )
    }

    pub fn remote_status(id: u16, name: impl Into<String>, remote_no: u8) -> Self {
        Self::new(
            id,
            name,
            ItemData::RemoteStatus {
                remote_no,
                status: String::new(),
            },
        )
    }

    /// Marks the item as not changeable by remotes.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_eeprom(mut self, position: u16) -> Self {
        self.eeprom = Some(position);
        self
    }

    /// Sets the initial integer value without marking the item changed.
    pub fn with_int(mut self, value: i64) -> Self {
        self.store_int(value);
        self
    }

    /// Sets the initial text value without marking the item changed.
    pub fn with_text(mut self, value: &str) -> Self {
        self.store_text(value);
        self
    }

    pub fn is_submenu(&self) -> bool {
        matches!(self.data, ItemData::SubMenu)
    }

    // -- send-needed bitset -------------------------------------------------

    pub fn is_send_remote_needed(&self, remote_no: usize) -> bool {
        remote_no < MAX_REMOTES && self.send_needed & (1 << remote_no) != 0
    }

    pub fn set_send_remote_needed(&mut self, remote_no: usize, needed: bool) {
        if remote_no >= MAX_REMOTES {
            return;
        }
        if needed {
            self.send_needed |= 1 << remote_no;
        } else {
            self.send_needed &= !(1 << remote_no);
        }
    }

    /// Flags the item as changed for every remote.
    pub fn mark_changed(&mut self) {
        self.send_needed = u32::MAX;
    }

    // -- values -------------------------------------------------------------

    /// Current value of an integer-like item (analog, enum, boolean).
    pub fn int_value(&self) -> Option<i64> {
        match &self.data {
            ItemData::Analog { value, .. } | ItemData::Enum { value, .. } => Some(i64::from(*value)),
            ItemData::Boolean { value, .. } => Some(i64::from(*value)),
            _ => None,
        }
    }

    /// Largest value an integer-like item accepts.
    pub fn max_value(&self) -> Option<i64> {
        match &self.data {
            ItemData::Analog { max, .. } => Some(i64::from(*max)),
            ItemData::Enum { choices, .. } => Some(choices.len().saturating_sub(1) as i64),
            ItemData::Boolean { .. } => Some(1),
            _ => None,
        }
    }

    /// Sets an integer-like value and marks the item changed. Values outside
    /// `[0, max]` are clamped; callers that must reject instead check
    /// [`max_value`](Self::max_value) first.
    pub fn set_int(&mut self, value: i64) -> bool {
        let stored = self.store_int(value);
        if stored {
            self.mark_changed();
        }
        stored
    }

    fn store_int(&mut self, value: i64) -> bool {
        let max = self.max_value();
        match &mut self.data {
            ItemData::Analog { value: v, .. } | ItemData::Enum { value: v, .. } => {
                let max = max.unwrap_or(0);
                *v = value.clamp(0, max) as u16;
                true
            }
            ItemData::Boolean { value: v, .. } => {
                *v = value != 0;
                true
            }
            _ => false,
        }
    }

    /// Sets a text or remote-status value, truncating text to `max_len`
    /// characters, and marks the item changed.
    pub fn set_text(&mut self, value: &str) -> bool {
        let stored = self.store_text(value);
        if stored {
            self.mark_changed();
        }
        stored
    }

    fn store_text(&mut self, value: &str) -> bool {
        match &mut self.data {
            ItemData::Text { value: v, max_len } => {
                *v = value.chars().take(*max_len).collect();
                true
            }
            ItemData::RemoteStatus { status, .. } => {
                *status = value.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn set_float(&mut self, value: f32) -> bool {
        match &mut self.data {
            ItemData::Float { value: v, .. } => {
                *v = value;
                self.mark_changed();
                true
            }
            _ => false,
        }
    }

    /// The current value as sent in a `VC` field. `None` for items
    /// without a value (submenus, actions).
    pub fn wire_value(&self) -> Option<String> {
        match &self.data {
            ItemData::Analog { value, .. } | ItemData::Enum { value, .. } => Some(value.to_string()),
            ItemData::Boolean { value, .. } => Some(u8::from(*value).to_string()),
            ItemData::Text { value, .. } => Some(value.clone()),
            ItemData::Float {
                value,
                decimal_places,
            } => Some(format!("{:.*}", usize::from(*decimal_places), value)),
            ItemData::RemoteStatus { status, .. } => Some(status.clone()),
            ItemData::SubMenu | ItemData::Action => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_needed_bits_are_per_remote() {
        let mut item = MenuItem::analog(1, "Volume", 255, -190, 2, "dB");
        assert!(!item.is_send_remote_needed(0));
        item.mark_changed();
        assert!(item.is_send_remote_needed(0) && item.is_send_remote_needed(31));

        item.set_send_remote_needed(0, false);
        assert!(!item.is_send_remote_needed(0));
        assert!(item.is_send_remote_needed(1));
        assert!(!item.is_send_remote_needed(32));
    }

    #[test]
    fn test_set_int_marks_changed_and_clamps() {
        let mut item = MenuItem::enumeration(2, "Channel", ["CD Player", "Turntable", "Computer"]);
        assert_eq!(item.max_value(), Some(2));
        assert!(item.set_int(7));
        assert_eq!(item.int_value(), Some(2));
        assert!(item.is_send_remote_needed(3));
    }

    #[test]
    fn test_builders_do_not_mark_changed() {
        let item = MenuItem::analog(1, "Volume", 255, 0, 1, "").with_int(20);
        assert_eq!(item.int_value(), Some(20));
        assert!(!item.is_send_remote_needed(0));
    }

    #[test]
    fn test_text_is_truncated() {
        let mut item = MenuItem::text(6, "Zone", 4);
        item.set_text("kitchen");
        assert_eq!(item.wire_value().as_deref(), Some("kitc"));
    }

    #[test]
    fn test_wire_values() {
        let b = MenuItem::boolean(4, "Standby", BooleanNaming::YesNo).with_int(1);
        assert_eq!(b.wire_value().as_deref(), Some("1"));
        let mut f = MenuItem::float(7, "Volts", 2);
        f.set_float(12.345);
        assert_eq!(f.wire_value().as_deref(), Some("12.35"));
        assert_eq!(MenuItem::submenu(3, "Settings").wire_value(), None);
        assert!(!MenuItem::action(9, "Go").set_text("x"));
    }

    #[test]
    fn test_item_serializes_without_send_state() {
        let mut item = MenuItem::analog(1, "Volume", 255, -190, 2, "dB").with_eeprom(2);
        item.mark_changed();
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("send_needed"));
        let back: MenuItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.eeprom, Some(2));
        assert!(!back.is_send_remote_needed(0));
    }
}
