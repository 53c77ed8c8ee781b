use crate::error::{CandidateFailure, SmtpError};
use crate::smtp::SmtpTransport;

/// A negotiated SMTP connection handed to the caller.
///
/// After [`Validator::validate`](crate::Validator::validate) the transport
/// sits right after an accepted `RCPT TO`; continuing (`DATA`, `RSET`) or
/// closing it is up to the caller.
#[derive(Debug)]
pub struct Session<T> {
    host: String,
    port: u16,
    encrypted: bool,
    tls_failure: Option<SmtpError>,
    prior_failures: Vec<CandidateFailure>,
    transport: T,
}

impl<T> Session<T> {
    pub(crate) fn new(
        host: &str,
        port: u16,
        transport: T,
        encrypted: bool,
        tls_failure: Option<SmtpError>,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            encrypted,
            tls_failure,
            prior_failures: Vec::new(),
            transport,
        }
    }

    pub(crate) fn with_prior_failures(mut self, failures: Vec<CandidateFailure>) -> Self {
        self.prior_failures = failures;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True when STARTTLS completed on this connection.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Why the opportunistic STARTTLS upgrade did not happen, when it was
    /// offered and failed.
    pub fn tls_failure(&self) -> Option<&SmtpError> {
        self.tls_failure.as_ref()
    }

    /// Candidates that failed before this one succeeded, in attempt order.
    pub fn prior_failures(&self) -> &[CandidateFailure] {
        &self.prior_failures
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T: SmtpTransport> Session<T> {
    pub fn close(mut self) {
        self.transport.close();
    }
}
