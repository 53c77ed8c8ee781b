use anyhow::{Context, Result, bail};

use rcptprobe_lib::{
    PortList, ProbeError, ProbeOptions, Session, SmtpClient, validate_with_options,
};

#[cfg(feature = "with-serde")]
use serde::Serialize;

pub struct VerifyConfig<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub ports: PortList,
    pub timeout_ms: u64,
    pub helo: Option<&'a str>,
    pub format: &'a str,
    pub keep_open: bool,
}

#[cfg_attr(feature = "with-serde", derive(Serialize))]
#[derive(Debug, Default)]
struct VerifyReport {
    recipient: String,
    result: &'static str,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    host: Option<String>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    port: Option<u16>,
    encrypted: bool,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    tls_failure: Option<String>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    reply_code: Option<u16>,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    error: Option<String>,
    failures: Vec<String>,
    transcript: Vec<String>,
}

impl VerifyReport {
    fn accepted(recipient: &str, session: &mut Session<SmtpClient>) -> Self {
        Self {
            recipient: recipient.to_string(),
            result: "accepted",
            host: Some(session.host().to_string()),
            port: Some(session.port()),
            encrypted: session.is_encrypted(),
            tls_failure: session.tls_failure().map(ToString::to_string),
            failures: session
                .prior_failures()
                .iter()
                .map(ToString::to_string)
                .collect(),
            transcript: session.transport_mut().take_transcript(),
            ..Self::default()
        }
    }

    fn failed(recipient: &str, err: &ProbeError) -> Self {
        Self {
            recipient: recipient.to_string(),
            result: if err.is_rejection() {
                "rejected"
            } else {
                "unreachable"
            },
            reply_code: err.reply_code(),
            error: Some(err.to_string()),
            failures: err.attempts().iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }
}

/// Returns the process exit code.
pub fn run_verify(cfg: VerifyConfig<'_>) -> Result<i32> {
    let options = ProbeOptions {
        ports: cfg.ports,
        timeout_ms: cfg.timeout_ms,
        helo_domain: cfg.helo.unwrap_or_default().to_string(),
    };

    let (report, code) = match validate_with_options(cfg.from, cfg.to, &options) {
        Ok(mut session) => {
            let report = VerifyReport::accepted(cfg.to, &mut session);
            if cfg.keep_open {
                drop(session);
            } else {
                session
                    .transport_mut()
                    .quit()
                    .context("QUIT after verification")?;
            }
            (report, 0)
        }
        Err(
            err @ (ProbeError::Envelope { .. }
            | ProbeError::AllCandidatesFailed(_)
            | ProbeError::Resolution { .. }),
        ) => {
            let code = if err.is_rejection() { 2 } else { 1 };
            (VerifyReport::failed(cfg.to, &err), code)
        }
        Err(err) => return Err(err).context("verification could not start"),
    };

    match cfg.format {
        "human" => print_human(&report),
        "json" => {
            #[cfg(feature = "with-serde")]
            {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            #[cfg(not(feature = "with-serde"))]
            {
                bail!("format=json requires the 'with-serde' feature");
            }
        }
        other => bail!("unknown format '{other}', use human|json"),
    }

    Ok(code)
}

fn print_human(report: &VerifyReport) {
    println!("Recipient: {}", report.recipient);
    println!("Result: {}", report.result);
    if let (Some(host), Some(port)) = (&report.host, report.port) {
        let channel = if report.encrypted { "STARTTLS" } else { "plaintext" };
        println!("Server: {host}:{port} ({channel})");
    }
    if let Some(reason) = &report.tls_failure {
        println!("TLS upgrade skipped: {reason}");
    }
    if let Some(error) = &report.error {
        println!("Error: {error}");
    }
    if let Some(code) = report.reply_code {
        println!("Reply code: {code}");
    }
    if !report.failures.is_empty() {
        println!("Failed candidates:");
        for failure in &report.failures {
            println!("  {failure}");
        }
    }
    if !report.transcript.is_empty() {
        println!("Evidence:");
        for line in &report.transcript {
            println!("  {line}");
        }
    }
}
