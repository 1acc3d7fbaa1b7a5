//! [`ProtocolConnection`]: the state machine for one remote.
//!
//! Everything here is driven by [`ProtocolConnection::tick`], called at a
//! fixed interval (20 ms by default). One tick:
//!
//! 1. notices a transport coming up (sends our join) or going away,
//! 2. reads and dispatches every field that has arrived,
//! 3. checks the read timeout,
//! 4. sends at most one bootstrap item or one value change,
//! 5. sends a heartbeat if nothing else went out for a while,
//! 6. flushes.
//!
//! Nothing blocks. A transport with nothing to read simply ends step 2.

use menulink_menu::{ButtonType, DialogController, ItemData, ItemId, MenuItem, MenuTree};
use menulink_protocol::{AckStatus, ByteFramer, ChangeKind, HeartbeatMode, MessageType, ParsedField, fields};
use menulink_session::{
    Authenticator, BootCursor, ConnectionConfig, LocalInfo, RemoteIdentity, SessionState,
};
use menulink_transport::Transport;

use crate::dispatch::{JoinRequest, MessageDispatchTable, ProtocolMessageContext, ValueChangeRequest};
use crate::event::{CommsEvent, CommsEventKind, CommsListener};

/// `BT` value opening a bootstrap.
pub const BOOT_START: &str = "START";
/// `BT` value closing a bootstrap.
pub const BOOT_END: &str = "END";

// ---------------------------------------------------------------------------
// HostContext
// ---------------------------------------------------------------------------

/// The host-side collaborators a connection works with during a tick.
///
/// Borrowed for the tick only; the registry (or a test) owns them.
pub struct HostContext<'a> {
    pub menu: &'a mut dyn MenuTree,
    pub auth: &'a mut dyn Authenticator,
    pub dialog: Option<&'a mut dyn DialogController>,
}

impl<'a> HostContext<'a> {
    pub fn new(menu: &'a mut dyn MenuTree, auth: &'a mut dyn Authenticator) -> Self {
        Self {
            menu,
            auth,
            dialog: None,
        }
    }

    pub fn with_dialog(mut self, dialog: &'a mut dyn DialogController) -> Self {
        self.dialog = Some(dialog);
        self
    }
}

// ---------------------------------------------------------------------------
// ProtocolConnection
// ---------------------------------------------------------------------------

/// One remote's session over one transport.
pub struct ProtocolConnection<T> {
    remote_no: usize,
    framer: ByteFramer<T>,
    dispatch: MessageDispatchTable,
    state: SessionState,
    remote: RemoteIdentity,
    local: LocalInfo,
    config: ConnectionConfig,
    ticks_since_send: u32,
    ticks_since_read: u32,
    /// Where the next scan for changed items resumes.
    change_cursor: Option<ItemId>,
    pairing_enabled: bool,
    listener: Option<CommsListener>,
}

impl<T: Transport> ProtocolConnection<T> {
    /// Creates a connection for remote slot `remote_no`, which selects the
    /// bit this connection uses in every item's send-needed set.
    pub fn new(remote_no: usize, transport: T, local: LocalInfo, config: ConnectionConfig) -> Self {
        Self {
            remote_no,
            framer: ByteFramer::new(transport),
            dispatch: MessageDispatchTable::new(),
            state: SessionState::Disconnected,
            remote: RemoteIdentity::default(),
            local,
            config,
            ticks_since_send: 0,
            ticks_since_read: 0,
            change_cursor: None,
            pairing_enabled: false,
            listener: None,
        }
    }

    /// Allows `PR` pairing requests to store keys.
    pub fn with_pairing(mut self, enabled: bool) -> Self {
        self.pairing_enabled = enabled;
        self
    }

    pub fn set_listener(&mut self, listener: Option<CommsListener>) {
        self.listener = listener;
    }

    pub fn remote_no(&self) -> usize {
        self.remote_no
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The remote's identity, once its join has been accepted.
    pub fn remote(&self) -> Option<&RemoteIdentity> {
        self.state.is_authenticated().then_some(&self.remote)
    }

    pub fn transport(&self) -> &T {
        self.framer.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.framer.transport_mut()
    }

    pub fn ticks_since_send(&self) -> u32 {
        self.ticks_since_send
    }

    pub fn ticks_since_read(&self) -> u32 {
        self.ticks_since_read
    }

    /// Status line in the form `name:state:major.minor:platform`, where
    /// state is `A`uthenticated, `C`onnected or `D`isconnected.
    pub fn connection_status(&self) -> String {
        format!(
            "{}:{}:{}.{}:{}",
            self.remote.name,
            self.state.status_char(),
            self.remote.major,
            self.remote.minor,
            self.remote.platform
        )
    }

    /// Advances the connection by one tick.
    pub fn tick(&mut self, host: &mut HostContext<'_>) {
        if !self.framer.connected() {
            if self.state.is_connected() {
                tracing::info!(remote_no = self.remote_no, "transport lost");
                self.reset_session();
                self.notify(CommsEventKind::Disconnected);
            }
            return;
        }
        if self.state == SessionState::Disconnected {
            self.start_session();
        }

        self.ticks_since_read = self.ticks_since_read.saturating_add(1);
        self.ticks_since_send = self.ticks_since_send.saturating_add(1);

        while self.state.is_connected() {
            let Some(field) = self.framer.next_field() else {
                break;
            };
            self.ticks_since_read = 0;
            self.handle_field(field, host);
        }
        if !self.state.is_connected() {
            return;
        }

        if self.ticks_since_read >= self.config.read_timeout_ticks() {
            tracing::warn!(
                remote_no = self.remote_no,
                ticks = self.ticks_since_read,
                "nothing heard from remote, closing"
            );
            self.close(CommsEventKind::Timeout);
            return;
        }

        match self.state {
            SessionState::Bootstrapping(cursor) => self.next_bootstrap(cursor, &mut *host.menu),
            SessionState::Connected => self.send_next_change(&mut *host.menu),
            _ => {}
        }

        if self.ticks_since_send >= self.config.heartbeat_interval_ticks() {
            self.send_heartbeat(HeartbeatMode::Normal);
        }

        if let Err(error) = self.framer.flush() {
            tracing::warn!(remote_no = self.remote_no, %error, "write failed");
            self.close(CommsEventKind::WriteNotConnected);
        }
    }

    /// Tells the remote we are going and closes the transport.
    pub fn disconnect(&mut self) {
        if self.state.is_connected() {
            self.send_heartbeat(HeartbeatMode::End);
            self.close(CommsEventKind::Disconnected);
        }
    }

    // -- session lifecycle --------------------------------------------------

    fn start_session(&mut self) {
        self.framer.reset();
        self.reset_session();
        self.state = SessionState::AwaitingJoin;
        tracing::info!(remote_no = self.remote_no, "transport connected");
        self.notify(CommsEventKind::Connected);
        self.send_join();
    }

    fn reset_session(&mut self) {
        self.state = SessionState::Disconnected;
        self.remote = RemoteIdentity::default();
        self.ticks_since_send = 0;
        self.ticks_since_read = 0;
        self.change_cursor = None;
        self.dispatch.reset();
    }

    fn close(&mut self, kind: CommsEventKind) {
        if let Err(error) = self.framer.flush() {
            tracing::debug!(remote_no = self.remote_no, %error, "final flush failed");
        }
        self.framer.close();
        self.reset_session();
        tracing::info!(remote_no = self.remote_no, ?kind, "connection closed");
        self.notify(kind);
    }

    fn notify(&self, kind: CommsEventKind) {
        if let Some(listener) = &self.listener {
            listener(&CommsEvent {
                remote_no: self.remote_no,
                kind,
            });
        }
    }

    // -- inbound ------------------------------------------------------------

    fn handle_field(&mut self, field: ParsedField, host: &mut HostContext<'_>) {
        match &field {
            ParsedField::ProtocolError(error) => {
                tracing::warn!(remote_no = self.remote_no, %error, "protocol error, closing");
                self.close(CommsEventKind::ProtocolError);
                return;
            }
            ParsedField::NewMessage { message_type }
                if self.state == SessionState::AwaitingJoin && *message_type == MessageType::Join.tag() =>
            {
                self.state = SessionState::Authenticating;
            }
            _ => {}
        }

        let authenticated = self.state.is_authenticated();
        if let Some(context) = self.dispatch.dispatch(&field, authenticated) {
            self.handle_message(context, host);
        }
    }

    fn handle_message(&mut self, context: ProtocolMessageContext, host: &mut HostContext<'_>) {
        match context {
            ProtocolMessageContext::Join(join) => self.on_join(join, host),
            ProtocolMessageContext::ValueChange(change) => {
                let status = apply_value_change(&change, &mut *host.menu, self.remote_no);
                self.send_ack(change.correlation, status);
            }
            ProtocolMessageContext::Pairing { name, uuid } => self.on_pairing(&name, &uuid, &mut *host.auth),
            ProtocolMessageContext::Dialog {
                button,
                mode,
                correlation,
            } => self.on_dialog(button, mode, correlation, host.dialog.as_deref_mut()),
            ProtocolMessageContext::Heartbeat { mode, interval_ms } => {
                tracing::trace!(remote_no = self.remote_no, ?mode, ?interval_ms, "heartbeat received");
                match mode {
                    HeartbeatMode::Normal => {}
                    HeartbeatMode::Start => self.send_join(),
                    HeartbeatMode::End => self.close(CommsEventKind::Disconnected),
                }
            }
            ProtocolMessageContext::Empty => {}
        }
    }

    fn on_join(&mut self, join: JoinRequest, host: &mut HostContext<'_>) {
        let accepted = match join.uuid.as_deref() {
            Some(uuid) => host.auth.authenticate(&join.name, uuid),
            None => !host.auth.requires_authentication(),
        };
        if !accepted {
            tracing::warn!(remote_no = self.remote_no, name = %join.name, "join refused");
            self.send_ack(0, AckStatus::CredentialsInvalid);
            self.close(CommsEventKind::AuthenticationFailed);
            return;
        }

        self.remote.set_name(&join.name);
        self.remote.set_version(join.version);
        self.remote.platform = join.platform;
        tracing::info!(
            remote_no = self.remote_no,
            name = %self.remote.name,
            major = self.remote.major,
            minor = self.remote.minor,
            "remote authenticated"
        );
        self.notify(CommsEventKind::Authenticated);

        if !self.state.is_bootstrapping() {
            self.begin(MessageType::Bootstrap);
            self.framer.write_field(fields::BOOT_TYPE, BOOT_START);
            self.framer.end_message();
            self.state = SessionState::Bootstrapping(BootCursor::starting_at(host.menu.root()));
            tracing::debug!(remote_no = self.remote_no, "bootstrap started");
        }
    }

    fn on_pairing(&mut self, name: &str, uuid: &str, auth: &mut dyn Authenticator) {
        let status = if !self.pairing_enabled {
            tracing::warn!(remote_no = self.remote_no, name, "pairing is disabled");
            AckStatus::CredentialsInvalid
        } else {
            match auth.add_key(name, uuid) {
                Ok(()) => {
                    tracing::info!(remote_no = self.remote_no, name, "remote paired");
                    AckStatus::Success
                }
                Err(error) => {
                    tracing::warn!(remote_no = self.remote_no, name, %error, "pairing failed");
                    AckStatus::CredentialsInvalid
                }
            }
        };
        self.send_ack(0, status);
        // The remote reconnects and joins with its new key.
        self.close(CommsEventKind::Disconnected);
    }

    fn on_dialog(
        &mut self,
        button: ButtonType,
        mode: Option<char>,
        correlation: u32,
        dialog: Option<&mut (dyn DialogController + '_)>,
    ) {
        if mode != Some('A') {
            tracing::debug!(remote_no = self.remote_no, ?mode, "dialog mode ignored");
            return;
        }
        let handled = dialog.is_some_and(|d| d.remote_action(button));
        let status = if handled {
            AckStatus::Success
        } else {
            AckStatus::Unknown
        };
        self.send_ack(correlation, status);
    }

    // -- outbound -----------------------------------------------------------

    fn begin(&mut self, message_type: MessageType) {
        tracing::trace!(remote_no = self.remote_no, msg_type = %message_type, "message out");
        self.framer.start_message(message_type);
        self.ticks_since_send = 0;
    }

    fn send_join(&mut self) {
        self.begin(MessageType::Join);
        self.framer.write_field(fields::NAME, &self.local.name);
        self.framer.write_field(fields::UUID, &self.local.uuid);
        self.framer
            .write_field_int(fields::VERSION, i64::from(self.local.api_version));
        self.framer
            .write_field_int(fields::PLATFORM, i64::from(self.local.platform.code()));
        self.framer.end_message();
    }

    fn send_heartbeat(&mut self, mode: HeartbeatMode) {
        tracing::debug!(remote_no = self.remote_no, ?mode, "sending heartbeat");
        self.begin(MessageType::Heartbeat);
        self.framer
            .write_field_int(fields::HB_INTERVAL, self.config.heartbeat_interval_millis());
        self.framer.write_field_int(fields::HB_MODE, mode.code());
        self.framer.end_message();
    }

    fn send_ack(&mut self, correlation: u32, status: AckStatus) {
        tracing::debug!(remote_no = self.remote_no, correlation, ?status, "sending ack");
        self.begin(MessageType::Acknowledgement);
        self.framer
            .write_field(fields::CORRELATION, &format!("{correlation:x}"));
        self.framer.write_field_int(fields::ACK_STATUS, status.code());
        self.framer.end_message();
    }

    /// Sends the item under the cursor, or the closing `BS` once every item
    /// went out.
    fn next_bootstrap(&mut self, cursor: BootCursor, menu: &mut dyn MenuTree) {
        let Some(id) = cursor.next else {
            self.begin(MessageType::Bootstrap);
            self.framer.write_field(fields::BOOT_TYPE, BOOT_END);
            self.framer.end_message();
            self.state = SessionState::Connected;
            self.change_cursor = None;
            tracing::debug!(remote_no = self.remote_no, "bootstrap finished");
            return;
        };

        match menu.item_mut(id) {
            Some(item) => {
                item.set_send_remote_needed(self.remote_no, false);
                self.send_boot_item(cursor.parent, item);
            }
            None => tracing::warn!(remote_no = self.remote_no, %id, "item vanished during bootstrap"),
        }

        let next = menu.next_in_order(id);
        self.state = SessionState::Bootstrapping(BootCursor {
            next,
            parent: next.and_then(|n| menu.parent_of(n)),
        });
    }

    fn send_boot_item(&mut self, parent: Option<ItemId>, item: &MenuItem) {
        let message_type = match item.data {
            ItemData::Analog { .. } => MessageType::AnalogBoot,
            ItemData::Enum { .. } => MessageType::EnumBoot,
            ItemData::Boolean { .. } => MessageType::BooleanBoot,
            ItemData::Text { .. } => MessageType::TextBoot,
            ItemData::SubMenu => MessageType::SubMenuBoot,
            ItemData::Action => MessageType::ActionBoot,
            ItemData::Float { .. } => MessageType::FloatBoot,
            ItemData::RemoteStatus { .. } => MessageType::RemoteBoot,
        };
        self.begin(message_type);

        let out = &mut self.framer;
        out.write_field_int(fields::PARENT, parent.map_or(0, ItemId::as_wire));
        out.write_field_int(fields::ID, item.id.as_wire());
        out.write_field_int(fields::EEPROM, item.eeprom.map_or(-1, i64::from));
        out.write_field_int(fields::READ_ONLY, i64::from(item.read_only));
        out.write_field_int(fields::VISIBLE, i64::from(item.visible));
        out.write_field(fields::NAME, &item.name);

        match &item.data {
            ItemData::Analog {
                value,
                max,
                offset,
                divisor,
                unit,
            } => {
                out.write_field(fields::ANALOG_UNIT, unit);
                out.write_field_int(fields::ANALOG_MAX, i64::from(*max));
                out.write_field_int(fields::ANALOG_OFFSET, i64::from(*offset));
                out.write_field_int(fields::ANALOG_DIVISOR, i64::from(*divisor));
                out.write_field_int(fields::CURRENT_VAL, i64::from(*value));
            }
            ItemData::Enum { value, choices } => {
                out.write_field_int(fields::CURRENT_VAL, i64::from(*value));
                out.write_field_int(fields::NO_OF_CHOICES, choices.len() as i64);
                for (i, choice) in choices.iter().enumerate() {
                    let Some(tag) = fields::choice(i) else { break };
                    out.write_field(tag, choice);
                }
            }
            ItemData::Boolean { value, naming } => {
                out.write_field_int(fields::CURRENT_VAL, i64::from(*value));
                out.write_field_int(fields::BOOL_NAMING, naming.code());
            }
            ItemData::Text { value, max_len } => {
                out.write_field_int(fields::MAX_LEN, *max_len as i64);
                out.write_field(fields::CURRENT_VAL, value);
            }
            ItemData::Float { decimal_places, .. } => {
                out.write_field_int(fields::FLOAT_DP, i64::from(*decimal_places));
                out.write_field(fields::CURRENT_VAL, &item.wire_value().unwrap_or_default());
            }
            ItemData::RemoteStatus { remote_no, status } => {
                out.write_field_int(fields::REMOTE_NO, i64::from(*remote_no));
                out.write_field(fields::CURRENT_VAL, status);
            }
            ItemData::SubMenu | ItemData::Action => {}
        }
        out.end_message();
    }

    /// Sends the next item whose value this remote has not seen, resuming
    /// the scan where the previous tick stopped. At most one per tick.
    fn send_next_change(&mut self, menu: &mut dyn MenuTree) {
        let mut cursor = self.change_cursor.take().or_else(|| menu.root());
        while let Some(id) = cursor {
            cursor = menu.next_in_order(id);
            let Some(item) = menu.item_mut(id) else {
                continue;
            };
            if !item.is_send_remote_needed(self.remote_no) {
                continue;
            }
            item.set_send_remote_needed(self.remote_no, false);
            let Some(value) = item.wire_value() else {
                continue;
            };
            let parent = menu.parent_of(id);

            self.begin(MessageType::ValueChange);
            self.framer
                .write_field_int(fields::PARENT, parent.map_or(0, ItemId::as_wire));
            self.framer.write_field_int(fields::ID, id.as_wire());
            self.framer
                .write_field_int(fields::CHANGE_TYPE, ChangeKind::Absolute.code());
            self.framer.write_field(fields::CURRENT_VAL, &value);
            self.framer.end_message();

            self.change_cursor = cursor;
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Value changes
// ---------------------------------------------------------------------------

/// Applies a remote's value change to the tree and returns the ack status.
fn apply_value_change(change: &ValueChangeRequest, menu: &mut dyn MenuTree, remote_no: usize) -> AckStatus {
    let Some(id) = change.item_id else {
        return AckStatus::IdNotFound;
    };
    let Some(item) = menu.item(id).filter(|item| !item.read_only) else {
        tracing::debug!(remote_no, %id, "change for unknown or read-only item");
        return AckStatus::IdNotFound;
    };

    if matches!(item.data, ItemData::Action) {
        return if menu.trigger_action(id) {
            AckStatus::Success
        } else {
            AckStatus::Unknown
        };
    }

    let Some(item) = menu.item_mut(id) else {
        return AckStatus::IdNotFound;
    };
    let status = apply_to_item(item, change);
    tracing::debug!(remote_no, %id, value = %change.value, ?status, "value change");
    status
}

fn apply_to_item(item: &mut MenuItem, change: &ValueChangeRequest) -> AckStatus {
    match item.data {
        ItemData::Boolean { .. } => {
            item.set_int(i64::from(is_string_true(&change.value)));
            AckStatus::Success
        }
        ItemData::Analog { .. } | ItemData::Enum { .. } => {
            let Ok(requested) = change.value.trim().parse::<i64>() else {
                return AckStatus::ValueRange;
            };
            let (Some(current), Some(max)) = (item.int_value(), item.max_value()) else {
                return AckStatus::Unknown;
            };
            let target = match change.change_kind {
                ChangeKind::Delta => current.saturating_add(requested),
                ChangeKind::Absolute => requested,
            };
            if !(0..=max).contains(&target) {
                return AckStatus::ValueRange;
            }
            item.set_int(target);
            AckStatus::Success
        }
        ItemData::Text { .. } => {
            item.set_text(&change.value);
            AckStatus::Success
        }
        _ => AckStatus::Unknown,
    }
}

/// `Y...`, `1...` and any casing of `tru...` are true; anything else false.
fn is_string_true(value: &str) -> bool {
    let value = value.trim_start();
    value.starts_with(['Y', '1'])
        || value
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("tru"))
}

#[cfg(test)]
mod tests {
    use menulink_menu::{BooleanNaming, MenuItem};

    use super::*;

    fn change(kind: ChangeKind, value: &str) -> ValueChangeRequest {
        ValueChangeRequest {
            item_id: Some(ItemId(1)),
            change_kind: kind,
            correlation: 0,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_is_string_true() {
        for yes in ["Y", "Yes", "1", "true", "TRUE", "Truthy"] {
            assert!(is_string_true(yes), "{yes}");
        }
        for no in ["", "0", "N", "false", "tr", "no"] {
            assert!(!is_string_true(no), "{no}");
        }
    }

    #[test]
    fn test_delta_bounds() {
        let mut item = MenuItem::analog(1, "Volume", 100, 0, 1, "").with_int(5);
        assert_eq!(apply_to_item(&mut item, &change(ChangeKind::Delta, "-6")), AckStatus::ValueRange);
        assert_eq!(item.int_value(), Some(5));
        assert_eq!(apply_to_item(&mut item, &change(ChangeKind::Delta, "96")), AckStatus::ValueRange);
        assert_eq!(item.int_value(), Some(5));

        assert_eq!(apply_to_item(&mut item, &change(ChangeKind::Delta, "-5")), AckStatus::Success);
        assert_eq!(item.int_value(), Some(0));
        assert_eq!(apply_to_item(&mut item, &change(ChangeKind::Delta, "100")), AckStatus::Success);
        assert_eq!(item.int_value(), Some(100));
    }

    #[test]
    fn test_absolute_out_of_range_is_rejected() {
        let mut item = MenuItem::enumeration(1, "Channel", ["a", "b"]);
        assert_eq!(apply_to_item(&mut item, &change(ChangeKind::Absolute, "2")), AckStatus::ValueRange);
        assert_eq!(apply_to_item(&mut item, &change(ChangeKind::Absolute, "x")), AckStatus::ValueRange);
        assert_eq!(apply_to_item(&mut item, &change(ChangeKind::Absolute, "1")), AckStatus::Success);
        assert_eq!(item.int_value(), Some(1));
    }

    #[test]
    fn test_boolean_and_text_changes() {
        let mut b = MenuItem::boolean(1, "Standby", BooleanNaming::OnOff);
        assert_eq!(apply_to_item(&mut b, &change(ChangeKind::Absolute, "true")), AckStatus::Success);
        assert_eq!(b.int_value(), Some(1));

        let mut t = MenuItem::text(1, "Zone", 4);
        assert_eq!(apply_to_item(&mut t, &change(ChangeKind::Absolute, "garden")), AckStatus::Success);
        assert_eq!(t.wire_value().as_deref(), Some("gard"));

        let mut f = MenuItem::float(1, "Volts", 1);
        assert_eq!(apply_to_item(&mut f, &change(ChangeKind::Absolute, "1.0")), AckStatus::Unknown);
    }
}
