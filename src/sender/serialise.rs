//! MessagePack packing for forward-protocol messages.
//!
//! Each message is a 3-element array `[tag, time, record]` as described by
//! the Fluentd forward protocol's Message mode. Struct payloads serialise
//! as maps so receivers need no schema.

use rmp_serde::Serializer;
use serde::Serialize;

use crate::error::EncodeError;

/// Compose the effective tag from the base tag and an optional label.
pub(crate) fn effective_tag(tag: &str, label: Option<&str>) -> String {
    match label {
        Some(label) if !label.is_empty() => format!("{tag}.{label}"),
        _ => tag.to_owned(),
    }
}

/// Pack one `[tag, time, record]` message into its wire bytes.
pub(crate) fn encode<T>(
    tag: &str,
    label: Option<&str>,
    timestamp: u64,
    payload: &T,
) -> Result<Vec<u8>, EncodeError>
where
    T: Serialize + ?Sized,
{
    let tag = effective_tag(tag, label);
    let mut buf = Vec::with_capacity(128);
    (tag.as_str(), timestamp, payload)
        .serialize(&mut Serializer::new(&mut buf).with_struct_map())?;
    Ok(buf)
}
