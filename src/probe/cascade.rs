use tracing::debug;

use super::negotiate::negotiate;
use crate::error::AggregatedFailure;
use crate::mx::MxStatus;
use crate::options::PortList;
use crate::session::Session;
use crate::smtp::Dialer;

/// One (host, port) pair to dial.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
}

/// Expand the lookup outcome into dial order: hosts by ascending preference,
/// every port of a host before the next host. Without MX records `domain`
/// itself is the only host.
pub fn candidates(domain: &str, status: &MxStatus, ports: &PortList) -> Vec<Candidate> {
    let hosts: Vec<&str> = match status {
        MxStatus::Records(records) => records.iter().map(|r| r.exchange.as_str()).collect(),
        MxStatus::NoRecords => vec![domain],
    };
    hosts
        .into_iter()
        .flat_map(|host| {
            ports.iter().map(move |port| Candidate {
                host: host.to_string(),
                port,
            })
        })
        .collect()
}

/// Try every candidate in order and return the first negotiated session.
///
/// Failures seen before the winner travel with the session as
/// [`Session::prior_failures`]; on exhaustion they all end up in the
/// returned [`AggregatedFailure`].
pub(crate) fn connect_cascade<D: Dialer>(
    dialer: &D,
    identity: &str,
    domain: &str,
    status: &MxStatus,
    ports: &PortList,
) -> Result<Session<D::Transport>, AggregatedFailure> {
    let mut failures = AggregatedFailure::default();
    for candidate in candidates(domain, status, ports) {
        debug!(host = %candidate.host, port = candidate.port, "trying SMTP candidate");
        match negotiate(dialer, identity, &candidate.host, candidate.port) {
            Ok(session) => return Ok(session.with_prior_failures(failures.into_attempts())),
            Err(failure) => {
                debug!(error = %failure, "SMTP candidate failed");
                failures.push(failure);
            }
        }
    }
    Err(failures)
}
