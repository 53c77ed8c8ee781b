use std::collections::HashSet;

use tracing::debug;
use trust_dns_resolver::{
    Resolver,
    error::{ResolveError, ResolveErrorKind},
    proto::op::ResponseCode,
};

use super::{MxRecord, MxStatus};
use crate::error::ProbeError;

/// Lookup MX records for `domain` using the system resolver.
///
/// The domain is normalized via IDNA before querying DNS. The resulting
/// [`MxStatus`] contains the records in ascending preference.
pub fn check_mx(domain: &str) -> Result<MxStatus, ProbeError> {
    let ascii = normalize_domain(domain)?;
    let resolver = system_resolver()?;
    resolve_with(&resolver, &ascii)
}

pub fn system_resolver() -> Result<Resolver, ProbeError> {
    Resolver::from_system_conf().map_err(|source| ProbeError::ResolverInit { source })
}

/// Resolve `ascii_domain` through `resolver`.
///
/// Exchanges are normalized first (root dot stripped, lower-cased), then
/// stably sorted by preference, so equal preferences keep the order the
/// resolver produced. Duplicates are dropped after normalization.
pub fn resolve_with<R>(resolver: &R, ascii_domain: &str) -> Result<MxStatus, ProbeError>
where
    R: LookupMx + ?Sized,
{
    let mut records = resolver
        .lookup_mx(ascii_domain)
        .map_err(|source| ProbeError::resolution(ascii_domain, source))?;

    for record in &mut records {
        record.exchange = normalize_exchange(&record.exchange);
    }
    records.sort_by_key(|record| record.preference);
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(record.clone()));

    debug!(domain = ascii_domain, count = records.len(), "MX lookup completed");
    if records.is_empty() {
        Ok(MxStatus::NoRecords)
    } else {
        Ok(MxStatus::Records(records))
    }
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, ProbeError> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(ProbeError::address_format(domain, "domain is empty"));
    }
    idna::domain_to_ascii(trimmed).map_err(|err| {
        ProbeError::address_format(domain, format!("IDNA conversion failed: {err}"))
    })
}

/// Strip the root dot and lower-case an exchange name so it can serve as a
/// dial target and TLS server name.
pub fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}

/// MX lookup capability. An existing domain without MX records must yield
/// `Ok(vec![])`; a domain that does not exist (NXDOMAIN) is an error.
pub trait LookupMx {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError>;
}

impl LookupMx for Resolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        let lookup = match Resolver::mx_lookup(self, domain) {
            Ok(lookup) => lookup,
            Err(err) if is_nodata(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut records = Vec::new();
        for mx in lookup.iter() {
            records.push(MxRecord::new(mx.preference(), mx.exchange().to_utf8()));
        }
        Ok(records)
    }
}

// NODATA: the name exists but carries no MX. NXDOMAIN shares the error kind
// and is told apart only by the response code.
fn is_nodata(err: &ResolveError) -> bool {
    matches!(
        err.kind(),
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NoError
    )
}

impl<T: LookupMx + ?Sized> LookupMx for &T {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, ResolveError> {
        (**self).lookup_mx(domain)
    }
}
