#![forbid(unsafe_code)]
//! rcptprobe_lib — sender-less SMTP recipient verification.
//!
//! [`validate`] resolves the recipient domain's MX hosts, walks every
//! (host, port) candidate until one completes the SMTP greeting, upgrades it
//! with STARTTLS when offered, then issues `MAIL FROM` / `RCPT TO` and hands
//! the live [`Session`] back to the caller.

pub mod address;
pub mod error;
pub mod mx;
pub mod options;
pub mod probe;
pub mod session;
pub mod smtp;

pub use address::{AddressParts, split_address};
pub use error::{
    AggregatedFailure, CandidateFailure, CandidateStage, ConfigError, EnvelopeStage, ProbeError,
    SmtpError,
};
pub use mx::{LookupMx, MxRecord, MxStatus, check_mx};
pub use options::{DEFAULT_PORTS, PortList, ProbeOptions};
pub use probe::{Candidate, Validator, candidates, validate, validate_with_options};
pub use session::Session;
pub use smtp::{Dialer, SmtpClient, SmtpReply, SmtpTransport, TcpDialer};
