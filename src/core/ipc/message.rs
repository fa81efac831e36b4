use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::intent::InvocationIntent;

/// Bumped whenever the intent payload changes incompatibly.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound for one framed message, newline included.
pub const MAX_MESSAGE_BYTES: u64 = 64 * 1024;

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    version: u32,
    intent: &'a InvocationIntent,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    version: u32,
    intent: serde_json::Value,
}

/// Answer of the primary to a forwarded intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Ack,
    Rejected { reason: String },
}

/// One JSON line: `{"version":1,"intent":{...}}\n`.
pub fn encode_intent(intent: &InvocationIntent) -> LauncherResult<Vec<u8>> {
    let mut line = serde_json::to_vec(&Envelope {
        version: PROTOCOL_VERSION,
        intent,
    })?;
    line.push(b'\n');
    Ok(line)
}

/// The version is checked before the payload is interpreted.
pub fn decode_intent(line: &str) -> LauncherResult<InvocationIntent> {
    let raw: RawEnvelope = serde_json::from_str(line.trim())?;
    if raw.version != PROTOCOL_VERSION {
        return Err(LauncherError::UnsupportedProtocol(raw.version));
    }
    Ok(serde_json::from_value(raw.intent)?)
}

pub fn encode_reply(reply: &Reply) -> LauncherResult<Vec<u8>> {
    let mut line = serde_json::to_vec(reply)?;
    line.push(b'\n');
    Ok(line)
}

pub fn decode_reply(line: &str) -> LauncherResult<Reply> {
    Ok(serde_json::from_str(line.trim())?)
}
