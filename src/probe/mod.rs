//! Envelope-level recipient verification.
//!
//! The public entry point is [`validate`], which resolves the recipient
//! domain, cascades over (MX host, port) candidates, and issues
//! `MAIL FROM` / `RCPT TO` on the first session that completes the greeting.

mod cascade;
mod negotiate;

pub use cascade::{Candidate, candidates};

use tracing::debug;
use trust_dns_resolver::Resolver;

use crate::address::{AddressParts, split_address};
use crate::error::{EnvelopeStage, ProbeError};
use crate::mx::{LookupMx, resolve_with, system_resolver};
use crate::options::ProbeOptions;
use crate::session::Session;
use crate::smtp::{Dialer, SmtpClient, SmtpTransport, TcpDialer};
use cascade::connect_cascade;

/// Verify that `to` would be accepted when sending from `from`, using the
/// system resolver and default options (ports 25, 587, 465, no timeout).
pub fn validate(from: &str, to: &str) -> Result<Session<SmtpClient>, ProbeError> {
    validate_with_options(from, to, &ProbeOptions::default())
}

/// Identical to [`validate`], but with explicit ports, timeout and HELO
/// identity.
pub fn validate_with_options(
    from: &str,
    to: &str,
    options: &ProbeOptions,
) -> Result<Session<SmtpClient>, ProbeError> {
    // Parse before building the system resolver so a malformed address is
    // reported even on a host without resolver configuration.
    let sender = split_address(from)?;
    let recipient = split_address(to)?;
    Validator::system(options.clone())?.validate_parts(&sender, &recipient)
}

/// Resolver, dialer and options bundled for repeated validations.
#[derive(Debug)]
pub struct Validator<R, D> {
    resolver: R,
    dialer: D,
    options: ProbeOptions,
}

impl Validator<Resolver, TcpDialer> {
    /// System resolver plus TCP/native-tls transport.
    pub fn system(options: ProbeOptions) -> Result<Self, ProbeError> {
        let resolver = system_resolver()?;
        let dialer = TcpDialer::new(options.timeout())?;
        Ok(Self::new(resolver, dialer, options))
    }
}

impl<R, D> Validator<R, D>
where
    R: LookupMx,
    D: Dialer,
{
    pub fn new(resolver: R, dialer: D, options: ProbeOptions) -> Self {
        Self {
            resolver,
            dialer,
            options,
        }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }

    /// Returns the session positioned after an accepted `RCPT TO`.
    ///
    /// A refused `MAIL FROM` or `RCPT TO` closes the session and is reported
    /// as [`ProbeError::Envelope`]; other candidates are not retried at that
    /// point.
    pub fn validate(&self, from: &str, to: &str) -> Result<Session<D::Transport>, ProbeError> {
        let sender = split_address(from)?;
        let recipient = split_address(to)?;
        self.validate_parts(&sender, &recipient)
    }

    fn validate_parts(
        &self,
        sender: &AddressParts,
        recipient: &AddressParts,
    ) -> Result<Session<D::Transport>, ProbeError> {
        let identity = self.options.helo_name(&sender.ascii_domain);

        let status = resolve_with(&self.resolver, &recipient.ascii_domain)?;
        let mut session = connect_cascade(
            &self.dialer,
            identity,
            &recipient.ascii_domain,
            &status,
            &self.options.ports,
        )?;
        debug!(
            host = session.host(),
            port = session.port(),
            encrypted = session.is_encrypted(),
            "session negotiated"
        );

        if let Err(source) = session.transport_mut().mail(&sender.address) {
            session.close();
            return Err(ProbeError::envelope(EnvelopeStage::Mail, source));
        }
        if let Err(source) = session.transport_mut().rcpt(&recipient.address) {
            session.close();
            return Err(ProbeError::envelope(EnvelopeStage::Rcpt, source));
        }
        debug!(recipient = %recipient.address, "recipient accepted");
        Ok(session)
    }
}

#[cfg(test)]
mod tests;
