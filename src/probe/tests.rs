use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use trust_dns_resolver::error::ResolveError;

use super::{Validator, candidates, validate_with_options};
use crate::error::{CandidateStage, EnvelopeStage, ProbeError, SmtpError};
use crate::mx::{LookupMx, MxRecord, MxStatus};
use crate::options::{PortList, ProbeOptions};
use crate::smtp::{Dialer, SmtpReply, SmtpTransport};

type LookupResult = Result<Vec<MxRecord>, ResolveError>;

struct StubResolver {
    on_lookup: Box<dyn Fn(&str) -> LookupResult>,
    calls: Cell<usize>,
}

impl StubResolver {
    fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> LookupResult + 'static,
    {
        Self {
            on_lookup: Box::new(f),
            calls: Cell::new(0),
        }
    }

    fn records(records: Vec<MxRecord>) -> Self {
        Self::new(move |_| Ok(records.clone()))
    }
}

impl LookupMx for StubResolver {
    fn lookup_mx(&self, domain: &str) -> LookupResult {
        self.calls.set(self.calls.get() + 1);
        (self.on_lookup)(domain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tls {
    NotOffered,
    Succeeds,
    Rejected,
    BreaksSocket,
}

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Refuse,
    BadGreeting,
    HelloFails,
    Accept { tls: Tls, mail: u16, rcpt: u16 },
}

impl Behaviour {
    fn accept() -> Self {
        Self::Accept {
            tls: Tls::NotOffered,
            mail: 250,
            rcpt: 250,
        }
    }

    fn accept_with_tls(tls: Tls) -> Self {
        Self::Accept {
            tls,
            mail: 250,
            rcpt: 250,
        }
    }
}

#[derive(Debug, Default)]
struct Log {
    dials: Vec<(String, u16)>,
    commands: Vec<String>,
}

struct StubDialer {
    behaviours: HashMap<(String, u16), Behaviour>,
    log: Rc<RefCell<Log>>,
}

impl StubDialer {
    fn new() -> Self {
        Self {
            behaviours: HashMap::new(),
            log: Rc::new(RefCell::new(Log::default())),
        }
    }

    fn on(mut self, host: &str, port: u16, behaviour: Behaviour) -> Self {
        self.behaviours.insert((host.to_string(), port), behaviour);
        self
    }
}

impl Dialer for StubDialer {
    type Transport = StubTransport;

    fn dial(&self, host: &str, port: u16) -> Result<StubTransport, SmtpError> {
        self.log.borrow_mut().dials.push((host.to_string(), port));
        let behaviour = self
            .behaviours
            .get(&(host.to_string(), port))
            .copied()
            .unwrap_or(Behaviour::Refuse);
        match behaviour {
            Behaviour::Refuse => Err(SmtpError::Connect {
                address: format!("{host}:{port}"),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            }),
            Behaviour::BadGreeting => Err(SmtpError::Rejected {
                code: 554,
                message: "no service".to_string(),
            }),
            _ => Ok(StubTransport {
                behaviour,
                open: true,
                log: Rc::clone(&self.log),
            }),
        }
    }
}

#[derive(Debug)]
struct StubTransport {
    behaviour: Behaviour,
    open: bool,
    log: Rc<RefCell<Log>>,
}

impl StubTransport {
    fn record(&self, command: String) {
        self.log.borrow_mut().commands.push(command);
    }

    fn reply(&self, code: u16) -> Result<SmtpReply, SmtpError> {
        if !self.open {
            return Err(SmtpError::Closed);
        }
        let reply = SmtpReply {
            code,
            lines: vec!["stub".to_string()],
        };
        if reply.is_positive_completion() {
            Ok(reply)
        } else {
            Err(SmtpError::rejected(&reply))
        }
    }
}

impl SmtpTransport for StubTransport {
    fn hello(&mut self, identity: &str) -> Result<(), SmtpError> {
        self.record(format!("EHLO {identity}"));
        match self.behaviour {
            Behaviour::HelloFails => Err(SmtpError::Rejected {
                code: 501,
                message: "bad identity".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn has_extension(&self, name: &str) -> bool {
        name == "STARTTLS"
            && matches!(self.behaviour, Behaviour::Accept { tls, .. } if tls != Tls::NotOffered)
    }

    fn starttls(&mut self, server_name: &str) -> Result<(), SmtpError> {
        self.record(format!("STARTTLS {server_name}"));
        let Behaviour::Accept { tls, .. } = self.behaviour else {
            return Err(SmtpError::Closed);
        };
        match tls {
            Tls::Succeeds | Tls::NotOffered => Ok(()),
            Tls::Rejected => Err(SmtpError::Rejected {
                code: 454,
                message: "TLS not available".to_string(),
            }),
            Tls::BreaksSocket => {
                self.open = false;
                Err(SmtpError::Protocol("handshake failed".to_string()))
            }
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn mail(&mut self, from: &str) -> Result<SmtpReply, SmtpError> {
        self.record(format!("MAIL FROM:<{from}>"));
        match self.behaviour {
            Behaviour::Accept { mail, .. } => self.reply(mail),
            _ => Err(SmtpError::Closed),
        }
    }

    fn rcpt(&mut self, to: &str) -> Result<SmtpReply, SmtpError> {
        self.record(format!("RCPT TO:<{to}>"));
        match self.behaviour {
            Behaviour::Accept { rcpt, .. } => self.reply(rcpt),
            _ => Err(SmtpError::Closed),
        }
    }

    fn close(&mut self) {
        self.record("QUIT".to_string());
        self.open = false;
    }
}

fn y_com_records() -> Vec<MxRecord> {
    vec![
        MxRecord::new(10, "mx1.y.com"),
        MxRecord::new(20, "mx2.y.com"),
    ]
}

fn dials(log: &Rc<RefCell<Log>>) -> Vec<(String, u16)> {
    log.borrow().dials.clone()
}

fn dial_list(pairs: &[(&str, u16)]) -> Vec<(String, u16)> {
    pairs
        .iter()
        .map(|(host, port)| (host.to_string(), *port))
        .collect()
}

#[test]
fn candidates_are_host_major_port_minor() {
    let status = MxStatus::Records(y_com_records());
    let ports: PortList = "25,587".parse().expect("ports");
    let order: Vec<_> = candidates("y.com", &status, &ports)
        .into_iter()
        .map(|c| format!("{}:{}", c.host, c.port))
        .collect();
    assert_eq!(
        order,
        ["mx1.y.com:25", "mx1.y.com:587", "mx2.y.com:25", "mx2.y.com:587"]
    );
}

#[test]
fn every_port_of_preferred_host_is_tried_first() {
    let resolver = StubResolver::records(vec![
        MxRecord::new(20, "mx2.y.com"),
        MxRecord::new(10, "mx1.y.com"),
    ]);
    let dialer = StubDialer::new().on("mx2.y.com", 587, Behaviour::accept());
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let session = validator.validate("a@x.com", "b@y.com").expect("mx2 accepts");

    assert_eq!(session.host(), "mx2.y.com");
    assert_eq!(session.port(), 587);
    assert_eq!(
        dials(&log),
        dial_list(&[
            ("mx1.y.com", 25),
            ("mx1.y.com", 587),
            ("mx1.y.com", 465),
            ("mx2.y.com", 25),
            ("mx2.y.com", 587),
        ])
    );
    assert_eq!(session.prior_failures().len(), 4);
}

#[test]
fn no_mx_records_dials_domain_on_every_port() {
    let resolver = StubResolver::records(Vec::new());
    let dialer = StubDialer::new();
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let err = validator
        .validate("a@x.com", "b@y.com")
        .expect_err("nothing listens");

    assert_eq!(
        dials(&log),
        dial_list(&[("y.com", 25), ("y.com", 587), ("y.com", 465)])
    );
    assert_eq!(err.attempts().len(), 3);
}

#[test]
fn no_mx_fallback_can_succeed_on_later_port() {
    let resolver = StubResolver::records(Vec::new());
    let dialer = StubDialer::new().on("y.com", 465, Behaviour::accept());
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let session = validator.validate("a@x.com", "b@y.com").expect("y.com:465");
    assert_eq!(session.host(), "y.com");
    assert_eq!(session.port(), 465);
}

#[test]
fn resolution_error_makes_no_attempts() {
    let resolver = StubResolver::new(|_| Err(ResolveError::from("SERVFAIL")));
    let dialer = StubDialer::new().on("nodomain.test", 25, Behaviour::accept());
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let err = validator
        .validate("a@x.com", "nobody@nodomain.test")
        .expect_err("lookup fails");

    assert!(matches!(
        err,
        ProbeError::Resolution { ref domain, .. } if domain == "nodomain.test"
    ));
    assert!(dials(&log).is_empty());
}

#[test]
fn malformed_address_is_rejected_before_lookup() {
    let resolver = StubResolver::records(y_com_records());
    let dialer = StubDialer::new();
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(&resolver, dialer, ProbeOptions::default());

    let err = validator
        .validate("nobody", "b@y.com")
        .expect_err("sender has no '@'");

    assert!(matches!(err, ProbeError::AddressFormat { .. }));
    assert_eq!(resolver.calls.get(), 0);
    assert!(dials(&log).is_empty());
}

#[test]
fn convenience_entry_point_rejects_malformed_address_first() {
    let err = validate_with_options("a@x.com", "nobody", &ProbeOptions::default())
        .expect_err("no '@' in recipient");
    assert!(matches!(
        err,
        ProbeError::AddressFormat { ref address, .. } if address == "nobody"
    ));
}

#[test]
fn rejected_starttls_keeps_plaintext_session() {
    let resolver = StubResolver::records(y_com_records());
    let dialer = StubDialer::new().on("mx1.y.com", 25, Behaviour::accept_with_tls(Tls::Rejected));
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let session = validator.validate("a@x.com", "b@y.com").expect("usable session");

    assert!(!session.is_encrypted());
    assert_eq!(session.tls_failure().and_then(SmtpError::reply_code), Some(454));
    assert!(session.prior_failures().is_empty());
    assert_eq!(dials(&log), dial_list(&[("mx1.y.com", 25)]));
    assert!(session.transport().is_open());
}

#[test]
fn broken_tls_handshake_redials_candidate_in_plaintext() {
    let resolver = StubResolver::records(y_com_records());
    let dialer = StubDialer::new().on(
        "mx1.y.com",
        25,
        Behaviour::accept_with_tls(Tls::BreaksSocket),
    );
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let session = validator.validate("a@x.com", "b@y.com").expect("usable session");

    assert!(!session.is_encrypted());
    assert!(matches!(session.tls_failure(), Some(SmtpError::Protocol(_))));
    assert!(session.prior_failures().is_empty());
    assert_eq!(
        dials(&log),
        dial_list(&[("mx1.y.com", 25), ("mx1.y.com", 25)])
    );
    assert_eq!(
        log.borrow().commands,
        [
            "EHLO x.com",
            "STARTTLS mx1.y.com",
            "EHLO x.com",
            "MAIL FROM:<a@x.com>",
            "RCPT TO:<b@y.com>",
        ]
    );
}

#[test]
fn successful_starttls_uses_exchange_as_server_name() {
    let resolver = StubResolver::records(y_com_records());
    let dialer = StubDialer::new().on("mx1.y.com", 25, Behaviour::accept_with_tls(Tls::Succeeds));
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let session = validator.validate("a@x.com", "b@y.com").expect("session");

    assert!(session.is_encrypted());
    assert!(session.tls_failure().is_none());
    assert!(
        log.borrow()
            .commands
            .contains(&"STARTTLS mx1.y.com".to_string())
    );
}

#[test]
fn rooted_mixed_case_exchange_is_dialed_normalized() {
    let resolver = StubResolver::records(vec![MxRecord::new(10, "MX1.y.com.")]);
    let dialer = StubDialer::new().on("mx1.y.com", 25, Behaviour::accept_with_tls(Tls::Succeeds));
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let session = validator.validate("a@x.com", "b@y.com").expect("session");

    assert_eq!(session.host(), "mx1.y.com");
    assert_eq!(dials(&log), dial_list(&[("mx1.y.com", 25)]));
    assert!(
        log.borrow()
            .commands
            .contains(&"STARTTLS mx1.y.com".to_string())
    );
}

#[test]
fn exhausted_cascade_reports_every_attempt() {
    let resolver = StubResolver::records(y_com_records());
    let dialer = StubDialer::new()
        .on("mx1.y.com", 587, Behaviour::BadGreeting)
        .on("mx2.y.com", 25, Behaviour::HelloFails);
    let log = Rc::clone(&dialer.log);
    let options = ProbeOptions {
        ports: "25,587".parse().expect("ports"),
        ..ProbeOptions::default()
    };
    let validator = Validator::new(resolver, dialer, options);

    let err = validator
        .validate("a@x.com", "b@y.com")
        .expect_err("all candidates fail");

    let stages: Vec<_> = err.attempts().iter().map(|a| a.stage).collect();
    assert_eq!(
        stages,
        [
            CandidateStage::Connect,
            CandidateStage::Greeting,
            CandidateStage::Hello,
            CandidateStage::Connect,
        ]
    );
    insta::assert_snapshot!(
        err.to_string(),
        @"all 4 SMTP candidates failed: mx1.y.com:25 (connect): connection to mx1.y.com:25 failed: refused; mx1.y.com:587 (greeting): server replied 554: no service; mx2.y.com:25 (hello): server replied 501: bad identity; mx2.y.com:587 (connect): connection to mx2.y.com:587 failed: refused"
    );
    // the transport whose HELO failed is closed before moving on
    assert!(log.borrow().commands.contains(&"QUIT".to_string()));
}

#[test]
fn end_to_end_second_port_of_first_exchanger() {
    let resolver = StubResolver::new(|domain| {
        assert_eq!(domain, "y.com");
        Ok(y_com_records())
    });
    let dialer = StubDialer::new()
        .on("mx1.y.com", 587, Behaviour::accept())
        .on("mx2.y.com", 25, Behaviour::accept());
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let session = validator.validate("a@x.com", "b@y.com").expect("accepted");

    assert_eq!((session.host(), session.port()), ("mx1.y.com", 587));
    let prior = session.prior_failures();
    assert_eq!(prior.len(), 1);
    assert_eq!((prior[0].host.as_str(), prior[0].port), ("mx1.y.com", 25));
    assert_eq!(prior[0].stage, CandidateStage::Connect);
    assert_eq!(
        log.borrow().commands,
        ["EHLO x.com", "MAIL FROM:<a@x.com>", "RCPT TO:<b@y.com>"]
    );
    assert_eq!(
        dials(&log),
        dial_list(&[("mx1.y.com", 25), ("mx1.y.com", 587)])
    );
}

#[test]
fn rejected_recipient_closes_session() {
    let resolver = StubResolver::records(y_com_records());
    let dialer = StubDialer::new().on(
        "mx1.y.com",
        25,
        Behaviour::Accept {
            tls: Tls::NotOffered,
            mail: 250,
            rcpt: 550,
        },
    );
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let err = validator
        .validate("a@x.com", "b@y.com")
        .expect_err("mailbox unknown");

    assert!(matches!(
        err,
        ProbeError::Envelope {
            stage: EnvelopeStage::Rcpt,
            ..
        }
    ));
    assert_eq!(err.reply_code(), Some(550));
    assert!(err.is_rejection());
    assert_eq!(log.borrow().commands.last().map(String::as_str), Some("QUIT"));
}

#[test]
fn rejected_sender_does_not_fall_back_to_other_candidates() {
    let resolver = StubResolver::records(y_com_records());
    let dialer = StubDialer::new()
        .on(
            "mx1.y.com",
            25,
            Behaviour::Accept {
                tls: Tls::NotOffered,
                mail: 553,
                rcpt: 250,
            },
        )
        .on("mx1.y.com", 587, Behaviour::accept());
    let log = Rc::clone(&dialer.log);
    let validator = Validator::new(resolver, dialer, ProbeOptions::default());

    let err = validator
        .validate("a@x.com", "b@y.com")
        .expect_err("sender refused");

    assert!(matches!(
        err,
        ProbeError::Envelope {
            stage: EnvelopeStage::Mail,
            ..
        }
    ));
    assert_eq!(dials(&log), dial_list(&[("mx1.y.com", 25)]));
    assert!(!log.borrow().commands.iter().any(|c| c.starts_with("RCPT")));
}

#[test]
fn helo_override_replaces_sender_domain() {
    let resolver = StubResolver::records(y_com_records());
    let dialer = StubDialer::new().on("mx1.y.com", 25, Behaviour::accept());
    let log = Rc::clone(&dialer.log);
    let options = ProbeOptions {
        helo_domain: "probe.example.net".to_string(),
        ..ProbeOptions::default()
    };
    let validator = Validator::new(resolver, dialer, options);

    validator.validate("a@x.com", "b@y.com").expect("accepted");

    assert_eq!(log.borrow().commands[0], "EHLO probe.example.net");
}
