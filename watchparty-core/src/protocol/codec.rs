//! JSON text-frame codec.

use super::{ClientEvent, ServerEvent};
use crate::Result;

pub fn decode(text: &str) -> Result<ClientEvent> {
    Ok(serde_json::from_str(text)?)
}

pub fn encode(event: &ServerEvent) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}
