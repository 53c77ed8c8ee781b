use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod args;
mod mx;
mod verify;

use args::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // exit codes: 0 accepted, 2 refused by the server, 1 fatal
    let code = match cli.cmd {
        Commands::Verify {
            from,
            to,
            ports,
            timeout_ms,
            helo,
            format,
            keep_open,
        } => verify::run_verify(verify::VerifyConfig {
            from: &from,
            to: &to,
            ports,
            timeout_ms,
            helo: helo.as_deref(),
            format: &format,
            keep_open,
        })?,
        Commands::Mx { domain, format } => mx::run_mx(&domain, &format)?,
    };
    std::process::exit(code);
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "rcptprobe_lib=debug",
        _ => "rcptprobe_lib=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
