use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Submission-era priority: plain SMTP relay, then submission, then SMTPS.
pub const DEFAULT_PORTS: [u16; 3] = [25, 587, 465];

/// Ordered ports attempted against every candidate host.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortList(Vec<u16>);

impl PortList {
    pub fn new(ports: Vec<u16>) -> Result<Self, ConfigError> {
        if ports.is_empty() {
            return Err(ConfigError::EmptyPortList);
        }
        if ports.contains(&0) {
            return Err(ConfigError::InvalidPort("0".to_string()));
        }
        Ok(Self(ports))
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for PortList {
    fn default() -> Self {
        Self(DEFAULT_PORTS.to_vec())
    }
}

/// Accepts `25,587,465` as well as the suffix form `:25,:587,:465`.
impl FromStr for PortList {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ports = Vec::new();
        for raw in s.split(',') {
            let token = raw.trim();
            if token.is_empty() {
                continue;
            }
            let digits = token.strip_prefix(':').unwrap_or(token);
            let port = digits
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(token.to_string()))?;
            ports.push(port);
        }
        Self::new(ports)
    }
}

impl fmt::Display for PortList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

/// Configuration knobs for [`Validator`](crate::Validator).
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(default))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    pub ports: PortList,
    pub timeout_ms: u64,
    pub helo_domain: String,
}

impl ProbeOptions {
    /// Return the timeout as a [`Duration`]. A zero timeout disables the
    /// connection/read deadline.
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }

    /// Identity presented in `EHLO`/`HELO`; the sender domain unless
    /// overridden.
    pub fn helo_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self.helo_domain.trim() {
            "" => fallback,
            name => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_are_relay_submission_smtps() {
        assert_eq!(PortList::default().as_slice(), &[25, 587, 465]);
    }

    #[test]
    fn parses_plain_and_suffix_forms() {
        let plain: PortList = "2525, 25".parse().expect("plain list");
        assert_eq!(plain.as_slice(), &[2525, 25]);
        let suffix: PortList = ":25,:587,:465".parse().expect("suffix list");
        assert_eq!(suffix, PortList::default());
        assert_eq!(suffix.to_string(), "25,587,465");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert_eq!("".parse::<PortList>(), Err(ConfigError::EmptyPortList));
        assert_eq!(
            "25,smtp".parse::<PortList>(),
            Err(ConfigError::InvalidPort("smtp".to_string()))
        );
        assert!(PortList::new(vec![25, 0]).is_err());
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let mut options = ProbeOptions::default();
        assert_eq!(options.timeout(), None);
        options.timeout_ms = 1_500;
        assert_eq!(options.timeout(), Some(Duration::from_millis(1_500)));
    }

    #[test]
    fn helo_name_prefers_override() {
        let mut options = ProbeOptions::default();
        assert_eq!(options.helo_name("x.com"), "x.com");
        options.helo_domain = " probe.example.net ".to_string();
        assert_eq!(options.helo_name("x.com"), "probe.example.net");
    }
}
