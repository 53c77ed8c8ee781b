use std::io;
use std::net::ToSocketAddrs;
use std::time::Duration;

use native_tls::TlsConnector;
use tracing::trace;

use super::stream::{SmtpReply, SmtpStream};
use super::{Dialer, SmtpTransport};
use crate::error::{ProbeError, SmtpError};

/// Blocking SMTP client over TCP with optional STARTTLS.
///
/// Every command and reply is kept in [`transcript`](Self::transcript) as
/// `[host] C: ...` / `[host] S: ...` lines.
#[derive(Debug)]
pub struct SmtpClient {
    host: String,
    stream: SmtpStream,
    connector: TlsConnector,
    identity: Option<String>,
    ehlo: Option<SmtpReply>,
    transcript: Vec<String>,
}

impl SmtpClient {
    /// Connect to `host:port` and read the server greeting.
    pub fn connect(
        host: &str,
        port: u16,
        connector: TlsConnector,
        timeout: Option<Duration>,
    ) -> Result<Self, SmtpError> {
        let address = format!("{host}:{port}");
        let targets = (host, port)
            .to_socket_addrs()
            .map_err(|source| SmtpError::Connect {
                address: address.clone(),
                source,
            })?;

        let mut last_err = None;
        let mut stream = None;
        for addr in targets {
            match SmtpStream::connect(&addr, timeout) {
                Ok(connected) => {
                    stream = Some(connected);
                    break;
                }
                Err(err) => last_err = Some(err),
            }
        }
        let Some(stream) = stream else {
            let source = last_err.unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "no socket address available",
                )
            });
            return Err(SmtpError::Connect { address, source });
        };

        let mut client = Self {
            host: host.to_string(),
            stream,
            connector,
            identity: None,
            ehlo: None,
            transcript: Vec::new(),
        };
        let banner = client.read_reply()?;
        if banner.code != 220 {
            client.stream.shutdown();
            return Err(SmtpError::rejected(&banner));
        }
        Ok(client)
    }

    /// Send a raw command line and return whatever the server answers.
    pub fn command(&mut self, command: &str) -> Result<SmtpReply, SmtpError> {
        self.record("C", command);
        self.stream.send_command(command)?;
        self.read_reply()
    }

    /// Polite `QUIT`, then drop the socket.
    pub fn quit(&mut self) -> Result<(), SmtpError> {
        let outcome = self.command("QUIT").map(|_| ());
        self.stream.shutdown();
        outcome
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_encrypted(&self) -> bool {
        self.stream.is_tls()
    }

    /// Reply to the most recent `EHLO`, if the server accepted one.
    pub fn ehlo_reply(&self) -> Option<&SmtpReply> {
        self.ehlo.as_ref()
    }

    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    pub fn take_transcript(&mut self) -> Vec<String> {
        std::mem::take(&mut self.transcript)
    }

    fn ehlo(&mut self, identity: &str) -> Result<SmtpReply, SmtpError> {
        let reply = self.command(&format!("EHLO {identity}"))?;
        self.ehlo = reply.is_positive_completion().then(|| reply.clone());
        Ok(reply)
    }

    fn expect_positive(&mut self, command: &str) -> Result<SmtpReply, SmtpError> {
        let reply = self.command(command)?;
        if reply.is_positive_completion() {
            Ok(reply)
        } else {
            Err(SmtpError::rejected(&reply))
        }
    }

    fn read_reply(&mut self) -> Result<SmtpReply, SmtpError> {
        let reply = self.stream.read_reply()?;
        self.record_reply(&reply);
        Ok(reply)
    }

    fn record(&mut self, direction: &str, message: &str) {
        trace!(host = %self.host, "{direction}: {message}");
        self.transcript
            .push(format!("[{}] {direction}: {message}", self.host));
    }

    fn record_reply(&mut self, reply: &SmtpReply) {
        if reply.lines.is_empty() {
            self.record("S", &format!("{}", reply.code));
        } else {
            for line in &reply.lines {
                self.record("S", &format!("{} {}", reply.code, line));
            }
        }
    }
}

impl SmtpTransport for SmtpClient {
    fn hello(&mut self, identity: &str) -> Result<(), SmtpError> {
        self.identity = Some(identity.to_string());
        let ehlo = self.ehlo(identity)?;
        if ehlo.is_positive_completion() {
            return Ok(());
        }
        self.expect_positive(&format!("HELO {identity}")).map(|_| ())
    }

    fn has_extension(&self, name: &str) -> bool {
        self.ehlo
            .as_ref()
            .is_some_and(|reply| reply.has_capability(name))
    }

    fn starttls(&mut self, server_name: &str) -> Result<(), SmtpError> {
        let reply = self.command("STARTTLS")?;
        if reply.code != 220 {
            return Err(SmtpError::rejected(&reply));
        }
        self.record("C", &format!("<TLS handshake as {server_name}>"));
        self.stream.upgrade_tls(server_name, &self.connector)?;

        // RFC 3207: forget pre-TLS capabilities and greet again.
        self.ehlo = None;
        let identity = self.identity.clone().unwrap_or_else(|| self.host.clone());
        let result = match self.ehlo(&identity) {
            Ok(reply) if reply.is_positive_completion() => Ok(()),
            Ok(reply) => Err(SmtpError::rejected(&reply)),
            Err(err) => Err(err),
        };
        if result.is_err() {
            self.stream.shutdown();
        }
        result
    }

    fn is_open(&self) -> bool {
        self.stream.is_open()
    }

    fn mail(&mut self, from: &str) -> Result<SmtpReply, SmtpError> {
        self.expect_positive(&format!("MAIL FROM:<{from}>"))
    }

    fn rcpt(&mut self, to: &str) -> Result<SmtpReply, SmtpError> {
        self.expect_positive(&format!("RCPT TO:<{to}>"))
    }

    fn close(&mut self) {
        if self.stream.is_open() {
            let _ = self.quit();
        }
    }
}

/// [`Dialer`] producing [`SmtpClient`]s over plain TCP.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    connector: TlsConnector,
    timeout: Option<Duration>,
}

impl TcpDialer {
    /// Dialer with the platform's default certificate validation.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ProbeError> {
        let connector = TlsConnector::new().map_err(|source| ProbeError::TlsInit { source })?;
        Ok(Self::with_connector(connector, timeout))
    }

    pub fn with_connector(connector: TlsConnector, timeout: Option<Duration>) -> Self {
        Self { connector, timeout }
    }
}

impl Dialer for TcpDialer {
    type Transport = SmtpClient;

    fn dial(&self, host: &str, port: u16) -> Result<SmtpClient, SmtpError> {
        SmtpClient::connect(host, port, self.connector.clone(), self.timeout)
    }
}
