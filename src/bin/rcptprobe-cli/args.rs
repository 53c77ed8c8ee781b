use clap::{ArgAction, Parser, Subcommand};
use rcptprobe_lib::PortList;

#[derive(Parser)]
#[command(name = "rcptprobe-cli", version, about = "Sender-less SMTP recipient verification")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// walk the MX cascade and check that the server accepts RCPT TO
    Verify {
        /// envelope sender (MAIL FROM); its domain is the EHLO identity
        #[arg(long)]
        from: String,
        /// recipient to verify
        to: String,
        /// ports tried on every host, in order (e.g. 25,587,465 or :25,:587)
        #[arg(long, default_value_t = PortList::default())]
        ports: PortList,
        /// socket timeout in ms (0 = none)
        #[arg(long = "timeout", default_value_t = 10_000)]
        timeout_ms: u64,
        /// name used for EHLO/HELO instead of the sender domain
        #[arg(long)]
        helo: Option<String>,
        /// output format (human|json)
        #[arg(long, default_value = "human")]
        format: String,
        /// skip the final QUIT and just drop the connection
        #[arg(long)]
        keep_open: bool,
    },
    /// print the MX records of a domain in dial order
    Mx {
        domain: String,
        /// output format (human|json)
        #[arg(long, default_value = "human")]
        format: String,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
