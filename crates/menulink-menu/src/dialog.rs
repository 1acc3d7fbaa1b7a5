//! Remote control of an on-screen dialog.

/// A dialog button, as sent in the `BU` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonType {
    #[default]
    None,
    Ok,
    Accept,
    Cancel,
    Close,
}

impl ButtonType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => ButtonType::Ok,
            2 => ButtonType::Accept,
            3 => ButtonType::Cancel,
            4 => ButtonType::Close,
            _ => ButtonType::None,
        }
    }
}

/// Receives button presses that a remote made on the host's dialog.
pub trait DialogController: Send {
    /// Presses `button` on the dialog currently shown. Returns `false` if
    /// no dialog is showing.
    fn remote_action(&mut self, button: ButtonType) -> bool;
}
