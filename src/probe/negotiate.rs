use tracing::{debug, warn};

use crate::error::{CandidateFailure, CandidateStage, SmtpError};
use crate::session::Session;
use crate::smtp::{Dialer, SmtpTransport};

const STARTTLS: &str = "STARTTLS";

/// Greet `host:port` as `identity` and opportunistically upgrade to TLS.
///
/// A failed upgrade never fails the candidate: the session continues in
/// plaintext and the cause is kept in [`Session::tls_failure`]. When the
/// failed handshake took the socket with it, the candidate is dialed once
/// more and used without STARTTLS.
pub(crate) fn negotiate<D: Dialer>(
    dialer: &D,
    identity: &str,
    host: &str,
    port: u16,
) -> Result<Session<D::Transport>, CandidateFailure> {
    let mut transport = greet(dialer, identity, host, port)?;

    if !transport.has_extension(STARTTLS) {
        debug!(host, port, "STARTTLS not offered, staying in plaintext");
        return Ok(Session::new(host, port, transport, false, None));
    }

    match transport.starttls(host) {
        Ok(()) => {
            debug!(host, port, "STARTTLS upgrade completed");
            Ok(Session::new(host, port, transport, true, None))
        }
        Err(err) => {
            warn!(host, port, error = %err, "STARTTLS upgrade failed, continuing unencrypted");
            if !transport.is_open() {
                transport = greet(dialer, identity, host, port)?;
            }
            Ok(Session::new(host, port, transport, false, Some(err)))
        }
    }
}

fn greet<D: Dialer>(
    dialer: &D,
    identity: &str,
    host: &str,
    port: u16,
) -> Result<D::Transport, CandidateFailure> {
    let mut transport = dialer.dial(host, port).map_err(|err| {
        let stage = match err {
            SmtpError::Connect { .. } => CandidateStage::Connect,
            _ => CandidateStage::Greeting,
        };
        CandidateFailure::new(host, port, stage, err)
    })?;

    if let Err(err) = transport.hello(identity) {
        transport.close();
        return Err(CandidateFailure::new(host, port, CandidateStage::Hello, err));
    }
    Ok(transport)
}
