//! Session types: who is on the other end of a connection, and how far
//! their session has progressed.

use std::fmt;
use std::time::Duration;

use menulink_menu::ItemId;
use serde::{Deserialize, Serialize};

/// Longest remote name kept from a join.
pub const MAX_REMOTE_NAME_LEN: usize = 8;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// The kind of device a peer runs on, as sent in the `PF` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Platform {
    Arduino8Bit,
    /// Desktop or server software built on the API libraries.
    #[default]
    JavaApi,
    Arduino32Bit,
    /// A code this version does not know.
    Other(u8),
}

impl Platform {
    pub fn code(self) -> u8 {
        match self {
            Platform::Arduino8Bit => 0,
            Platform::JavaApi => 1,
            Platform::Arduino32Bit => 2,
            Platform::Other(code) => code,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Platform::Arduino8Bit,
            1 => Platform::JavaApi,
            2 => Platform::Arduino32Bit,
            other => Platform::Other(u8::try_from(other).unwrap_or(u8::MAX)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ---------------------------------------------------------------------------
// LocalInfo
// ---------------------------------------------------------------------------

/// How this side introduces itself in its own join message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInfo {
    /// Sent as `NM`.
    pub name: String,
    /// Sent as `UU`; peers use it to authenticate us.
    pub uuid: String,
    pub platform: Platform,
    /// `major * 100 + minor`, sent as `VE`.
    pub api_version: u16,
}

impl LocalInfo {
    /// Protocol version this implementation speaks.
    pub const API_VERSION: u16 = 101;

    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
            platform: Platform::default(),
            api_version: Self::API_VERSION,
        }
    }

    /// Uses a freshly generated, random (version 4 layout) UUID.
    pub fn with_random_uuid(name: impl Into<String>) -> Self {
        Self::new(name, random_uuid())
    }
}

impl Default for LocalInfo {
    fn default() -> Self {
        Self::with_random_uuid("menulink")
    }
}

/// Formats 128 random bits as `xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx`.
fn random_uuid() -> String {
    let mut bytes: [u8; 16] = rand::random();
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

// ---------------------------------------------------------------------------
// ConnectionConfig
// ---------------------------------------------------------------------------

/// Timing for one protocol connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Longest silence on our side before a heartbeat is sent.
    ///
    /// Default: 10 seconds.
    pub heartbeat_interval: Duration,

    /// How often the connection is ticked. Must match the driver.
    ///
    /// Default: 20 ms.
    pub tick_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            tick_interval: Duration::from_millis(20),
        }
    }
}

impl ConnectionConfig {
    /// Heartbeat interval in ticks (500 with the defaults). Never zero.
    pub fn heartbeat_interval_ticks(&self) -> u32 {
        let tick = self.tick_interval.as_millis().max(1);
        let ticks = self.heartbeat_interval.as_millis() / tick;
        u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
    }

    /// Ticks without inbound traffic before the peer counts as gone:
    /// one and a half heartbeat intervals.
    pub fn read_timeout_ticks(&self) -> u32 {
        let hb = self.heartbeat_interval_ticks();
        hb.saturating_add(hb / 2)
    }

    /// Heartbeat interval in milliseconds, as sent in the `HI` field.
    pub fn heartbeat_interval_millis(&self) -> i64 {
        i64::try_from(self.heartbeat_interval.as_millis()).unwrap_or(i64::MAX)
    }
}

// ---------------------------------------------------------------------------
// RemoteIdentity
// ---------------------------------------------------------------------------

/// What a peer told us about itself in its join.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteIdentity {
    /// At most [`MAX_REMOTE_NAME_LEN`] characters.
    pub name: String,
    pub major: u8,
    pub minor: u8,
    pub platform: Platform,
}

impl RemoteIdentity {
    /// Splits a `VE` value (`major * 100 + minor`).
    pub fn set_version(&mut self, version: i64) {
        let version = version.clamp(0, 25599);
        self.major = (version / 100) as u8;
        self.minor = (version % 100) as u8;
    }

    /// Stores a name, keeping the first [`MAX_REMOTE_NAME_LEN`] characters.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.chars().take(MAX_REMOTE_NAME_LEN).collect();
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Position of an in-progress bootstrap.
///
/// Holds item ids, not references: the menu tree stays owned by the host
/// and the cursor is dropped with the state whenever the connection goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootCursor {
    /// Next item to send; `None` once every item went out.
    pub next: Option<ItemId>,
    /// Submenu containing `next`; `None` at the root.
    pub parent: Option<ItemId>,
}

impl BootCursor {
    pub fn starting_at(first: Option<ItemId>) -> Self {
        Self {
            next: first,
            parent: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }
}

/// Where a connection is in its lifecycle.
///
/// ```text
///  Disconnected ──transport up──▶ AwaitingJoin ──NJ──▶ Authenticating
///        ▲                                                  │ accepted
///        │ lost / timeout / refused                         ▼
///        └──────────────── Connected ◀──BS END── Bootstrapping(cursor)
/// ```
///
/// Flags that only make sense together live in the same variant, so
/// "bootstrapping while disconnected" cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// Our join went out; waiting for the peer's.
    AwaitingJoin,
    /// The peer's join is arriving and will be checked when it ends.
    Authenticating,
    /// Sending the menu tree, one item per tick.
    Bootstrapping(BootCursor),
    /// Bootstrap done; streaming changes.
    Connected,
}

impl SessionState {
    /// A transport is attached and the session has started.
    pub fn is_connected(&self) -> bool {
        !matches!(self, SessionState::Disconnected)
    }

    /// The peer's join was accepted.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            SessionState::Bootstrapping(_) | SessionState::Connected
        )
    }

    pub fn is_bootstrapping(&self) -> bool {
        matches!(self, SessionState::Bootstrapping(_))
    }

    /// Single-letter code used in status text: `A`uthenticated,
    /// `C`onnected, `D`isconnected.
    pub fn status_char(&self) -> char {
        if self.is_authenticated() {
            'A'
        } else if self.is_connected() {
            'C'
        } else {
            'D'
        }
    }
}
