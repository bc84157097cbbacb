use serde::{Deserialize, Serialize};

/// Per-device snapshot reported in [`DaemonMsg::Status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub name: String,
    pub enabled: bool,
    pub default_enabled: bool,
    /// A requested change is waiting for the buttons to be released.
    pub pending: bool,
    pub state: String,
}

/// Messages from daemon to clients (JSON-lines over Unix socket).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonMsg {
    /// Status response.
    #[serde(rename = "status")]
    Status {
        devices: Vec<DeviceStatus>,
        version: String,
    },
    /// Acknowledgement for commands.
    #[serde(rename = "ack")]
    Ack { ok: bool, message: String },
}

/// Messages from clients to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Request to enable emulation on every device.
    #[serde(rename = "enable")]
    Enable,
    /// Request to disable emulation on every device.
    #[serde(rename = "disable")]
    Disable,
    /// Flip the requested state of every device.
    #[serde(rename = "toggle")]
    Toggle,
    /// Set from a free-form value ("enabled", "disabled", ...).
    #[serde(rename = "set")]
    Set { value: String },
    /// Request current status.
    #[serde(rename = "get_status")]
    GetStatus,
}

/// Serialize a message as a JSON line (with trailing newline).
pub fn encode(msg: &impl Serialize) -> String {
    // Message types only hold strings, bools and vecs of those.
    let mut s = serde_json::to_string(msg).unwrap_or_default();
    s.push('\n');
    s
}

/// Deserialize a JSON line. Returns None on empty/whitespace input.
pub fn decode_daemon(line: &str) -> Option<DaemonMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

pub fn decode_client(line: &str) -> Option<ClientMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
