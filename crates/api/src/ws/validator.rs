use sfunet_domain::{DataKind, DomainError, DomainResult};
use serde_json::Value;

/// Metadata caps (ambient validation — the distilled spec
/// names metadata as free-form JSON but never bounds it, and an unbounded
/// field on a hot path is the kind of gap this expansion closes).
const MAX_METADATA_BYTES: usize = 10 * 1024;
const MAX_IDENTITY_BYTES: usize = 256;

pub fn validate_identity(identity: &str) -> DomainResult<()> {
    if identity.is_empty() || identity.len() > MAX_IDENTITY_BYTES {
        return Err(DomainError::invalid_request("identity must be 1-256 bytes"));
    }
    Ok(())
}

pub fn validate_room_name(name: &str) -> DomainResult<()> {
    if !sfunet_domain::is_valid_room_name(name) {
        return Err(DomainError::invalid_request(
                "room name must match ^[A-Za-z0-9_-]{1,64}$",
        ));
    }
    Ok(())
}

pub fn validate_metadata(metadata: &Option<Value>) -> DomainResult<()> {
    let Some(value) = metadata else {
        return Ok(());
    };
    let size = serde_json::to_vec(value).map(|v| v.len()).unwrap_or(usize::MAX);
    if size > MAX_METADATA_BYTES {
        return Err(DomainError::invalid_request("metadata exceeds the 10KiB cap"));
    }
    Ok(())
}

/// `M_data` cap (wire-frame limits): reliable and lossy payloads
/// are capped independently since a lossy/signaling-relayed channel is
/// meant for small, frequent frames, not the larger reliable-channel budget.
pub fn validate_data_payload(kind: DataKind, payload: &Value, caps: (usize, usize)) -> DomainResult<()> {
    let (reliable_cap, lossy_cap) = caps;
    let cap = match kind {
        DataKind::Reliable => reliable_cap,
        DataKind::Lossy => lossy_cap,
    };
    let size = serde_json::to_vec(payload).map(|v| v.len()).unwrap_or(usize::MAX);
    if size > cap {
        return Err(DomainError::invalid_request(format!(
                    "data payload of {size} bytes exceeds the {cap} byte cap for this kind"
        )));
    }
    Ok(())
}
