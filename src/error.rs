use std::fmt;

use thiserror::Error;
use trust_dns_resolver::error::ResolveError;

use crate::smtp::SmtpReply;

/// Failures raised by the SMTP transport layer.
#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("TLS handshake failed: {source}")]
    Tls {
        #[source]
        source: native_tls::Error,
    },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("server replied {code}: {message}")]
    Rejected { code: u16, message: String },
    #[error("connection is closed")]
    Closed,
}

impl SmtpError {
    pub fn rejected(reply: &SmtpReply) -> Self {
        Self::Rejected {
            code: reply.code,
            message: reply.message(),
        }
    }

    pub(crate) fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }

    /// SMTP status code carried by a negative reply, if any.
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Step of the per-candidate handshake that failed.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStage {
    Connect,
    Greeting,
    Hello,
}

impl fmt::Display for CandidateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connect"),
            Self::Greeting => f.write_str("greeting"),
            Self::Hello => f.write_str("hello"),
        }
    }
}

/// One (host, port) attempt that did not yield a session.
#[derive(Debug, Error)]
#[error("{host}:{port} ({stage}): {source}")]
pub struct CandidateFailure {
    pub host: String,
    pub port: u16,
    pub stage: CandidateStage,
    #[source]
    pub source: SmtpError,
}

impl CandidateFailure {
    pub fn new(host: &str, port: u16, stage: CandidateStage, source: SmtpError) -> Self {
        Self {
            host: host.to_string(),
            port,
            stage,
            source,
        }
    }
}

/// Every candidate failure of a cascade, in attempt order.
#[derive(Debug, Default)]
pub struct AggregatedFailure {
    attempts: Vec<CandidateFailure>,
}

impl AggregatedFailure {
    pub fn push(&mut self, failure: CandidateFailure) {
        self.attempts.push(failure);
    }

    pub fn attempts(&self) -> &[CandidateFailure] {
        &self.attempts
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn into_attempts(self) -> Vec<CandidateFailure> {
        self.attempts
    }
}

impl fmt::Display for AggregatedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return f.write_str("no SMTP candidate to try");
        }
        write!(f, "all {} SMTP candidates failed: ", self.attempts.len())?;
        for (idx, attempt) in self.attempts.iter().enumerate() {
            if idx > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{attempt}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedFailure {}

/// Envelope command that was refused once a session existed.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Mail,
    Rcpt,
}

impl fmt::Display for EnvelopeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mail => f.write_str("MAIL FROM"),
            Self::Rcpt => f.write_str("RCPT TO"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid email address '{address}': {reason}")]
    AddressFormat { address: String, reason: String },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("TLS connector initialization failed: {source}")]
    TlsInit {
        #[source]
        source: native_tls::Error,
    },
    #[error("MX lookup for {domain} failed: {source}")]
    Resolution {
        domain: String,
        #[source]
        source: ResolveError,
    },
    #[error(transparent)]
    AllCandidatesFailed(#[from] AggregatedFailure),
    #[error("{stage} refused: {source}")]
    Envelope {
        stage: EnvelopeStage,
        #[source]
        source: SmtpError,
    },
}

impl ProbeError {
    pub fn address_format(address: &str, reason: impl Into<String>) -> Self {
        Self::AddressFormat {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn resolution(domain: &str, source: ResolveError) -> Self {
        Self::Resolution {
            domain: domain.to_string(),
            source,
        }
    }

    pub(crate) fn envelope(stage: EnvelopeStage, source: SmtpError) -> Self {
        Self::Envelope { stage, source }
    }

    /// SMTP code of a refused envelope command.
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            Self::Envelope { source, .. } => source.reply_code(),
            _ => None,
        }
    }

    /// True when the server answered an envelope command negatively, as
    /// opposed to the session breaking or never being established.
    pub fn is_rejection(&self) -> bool {
        self.reply_code().is_some()
    }

    /// Candidate failures carried by [`ProbeError::AllCandidatesFailed`].
    pub fn attempts(&self) -> &[CandidateFailure] {
        match self {
            Self::AllCandidatesFailed(failure) => failure.attempts(),
            _ => &[],
        }
    }
}

/// Invalid port list configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("port list is empty")]
    EmptyPortList,
    #[error("invalid port '{0}'")]
    InvalidPort(String),
}
