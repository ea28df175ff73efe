//! Input validation for catalog mutations.

use regex::Regex;

use crate::error::{CatalogError, CatalogResult};

const MAX_NAME_LEN: usize = 64;
const MAX_ADDRESS_LEN: usize = 255;

/// Category and device names: letters, digits, spaces, `_ - . ( )`.
/// `:` is excluded because it separates the two halves of a device key,
/// `/` because names appear as path segments in the API.
const NAME_PATTERN: &str = r"^[\w .()\-]+$";

/// `host[:port][/path]` with an optional `http://` or `https://` prefix.
/// The host is a hostname, an IPv4 address, or a bracketed IPv6 literal.
const ADDRESS_PATTERN: &str =
    r"^(?i:https?://)?(\[[0-9A-Fa-f:.]+\]|[A-Za-z0-9](?:[A-Za-z0-9.\-_]*[A-Za-z0-9])?)(:\d{1,5})?(/\S*)?$";

/// Validate a category or device name. `what` names the field in errors.
pub fn validate_name(what: &str, name: &str) -> CatalogResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Invalid(format!("{what} name required")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(CatalogError::Invalid(format!(
            "{what} name longer than {MAX_NAME_LEN} characters"
        )));
    }
    let re = Regex::new(NAME_PATTERN)?;
    if !re.is_match(trimmed) {
        return Err(CatalogError::Invalid(format!(
            "{what} name contains invalid characters"
        )));
    }
    Ok(())
}

/// Validate a device address.
pub fn validate_address(address: &str) -> CatalogResult<()> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Invalid("address required".to_string()));
    }
    if trimmed.len() > MAX_ADDRESS_LEN {
        return Err(CatalogError::Invalid(format!(
            "address longer than {MAX_ADDRESS_LEN} characters"
        )));
    }
    let re = Regex::new(ADDRESS_PATTERN)?;
    let Some(caps) = re.captures(trimmed) else {
        return Err(CatalogError::Invalid(format!("invalid address: {trimmed}")));
    };
    if let Some(port) = caps.get(2) {
        let port: u32 = port.as_str()[1..].parse().unwrap_or(0);
        if port == 0 || port > u32::from(u16::MAX) {
            return Err(CatalogError::Invalid(format!("invalid port in address: {trimmed}")));
        }
    }
    Ok(())
}
