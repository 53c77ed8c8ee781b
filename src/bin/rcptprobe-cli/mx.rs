use anyhow::{Context, Result, bail};
use rcptprobe_lib::{MxStatus, check_mx};

pub fn run_mx(domain: &str, format: &str) -> Result<i32> {
    let status = check_mx(domain).with_context(|| format!("MX lookup for {domain}"))?;

    match format {
        "human" => println!("{}", human_summary(domain, &status)),
        "json" => {
            #[cfg(feature = "with-serde")]
            {
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
            #[cfg(not(feature = "with-serde"))]
            {
                bail!("format=json requires the 'with-serde' feature");
            }
        }
        other => bail!("unknown format '{other}', use human|json"),
    }
    Ok(0)
}

fn human_summary(domain: &str, status: &MxStatus) -> String {
    match status {
        MxStatus::Records(records) => records
            .iter()
            .map(|r| format!("{:>5} {}", r.preference, r.exchange))
            .collect::<Vec<_>>()
            .join("\n"),
        MxStatus::NoRecords => format!("no MX records, {domain} is dialed directly"),
    }
}
