use log::warn;

/// Decodes a listed name as UTF-8. Undecodable names are logged and yield
/// `None`; they are neither harvested nor counted as failures.
pub fn decode_name(raw: &[u8]) -> Option<String> {
    match std::str::from_utf8(raw) {
        Ok(name) => Some(name.to_string()),
        Err(e) => {
            warn!("skipping undecodable name {}: {e}", raw.escape_ascii());
            None
        }
    }
}
