//! Blocking SMTP client used as the transport behind the probe.
//!
//! The probe only talks to the [`Dialer`] and [`SmtpTransport`] traits;
//! [`TcpDialer`]/[`SmtpClient`] are the TCP + native-tls implementation.

mod client;
mod stream;

pub use client::{SmtpClient, TcpDialer};
pub use stream::SmtpReply;

use crate::error::SmtpError;

/// Operations the probe needs from an SMTP connection that already read the
/// server greeting.
pub trait SmtpTransport {
    /// `EHLO`, falling back to `HELO` when the server refuses it.
    fn hello(&mut self, identity: &str) -> Result<(), SmtpError>;

    /// Whether the last `EHLO` reply advertised `name`.
    fn has_extension(&self, name: &str) -> bool;

    /// `STARTTLS` followed by a TLS handshake validated against
    /// `server_name`. A failed handshake may leave the transport closed.
    fn starttls(&mut self, server_name: &str) -> Result<(), SmtpError>;

    fn is_open(&self) -> bool;

    fn mail(&mut self, from: &str) -> Result<SmtpReply, SmtpError>;

    fn rcpt(&mut self, to: &str) -> Result<SmtpReply, SmtpError>;

    /// Best-effort `QUIT` and shutdown. Never fails.
    fn close(&mut self);
}

/// Opens a transport to `host:port` and consumes the 220 greeting.
pub trait Dialer {
    type Transport: SmtpTransport;

    fn dial(&self, host: &str, port: u16) -> Result<Self::Transport, SmtpError>;
}
