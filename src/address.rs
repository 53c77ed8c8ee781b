//! Splitting of `local@domain` addresses.
//!
//! No RFC 5321 syntax check happens here: the only requirements are an `@`
//! and a non-empty domain that survives IDNA conversion.

use crate::error::ProbeError;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParts {
    /// Input with surrounding whitespace removed.
    pub address: String,
    pub local: String,
    /// Everything after the first `@`, as given.
    pub domain: String,
    /// IDNA/ASCII form of `domain`, used for DNS and the EHLO identity.
    pub ascii_domain: String,
}

/// Split `address` on its first `@`.
pub fn split_address(address: &str) -> Result<AddressParts, ProbeError> {
    let trimmed = address.trim();
    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(ProbeError::address_format(trimmed, "missing '@'"));
    };
    if domain.is_empty() {
        return Err(ProbeError::address_format(trimmed, "domain missing"));
    }
    let ascii_domain = idna::domain_to_ascii(domain).map_err(|err| {
        ProbeError::address_format(trimmed, format!("IDNA conversion failed: {err}"))
    })?;
    if ascii_domain.is_empty() {
        return Err(ProbeError::address_format(trimmed, "domain missing"));
    }

    Ok(AddressParts {
        address: trimmed.to_string(),
        local: local.to_string(),
        domain: domain.to_string(),
        ascii_domain,
    })
}
