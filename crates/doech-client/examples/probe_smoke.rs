/// Smoke-test for `BrowserProbe` and `DohClient`.
///
/// Looks up the HTTPS record of a domain over DoH, then loads the domain in
/// Chromium with the measurement extension and prints the export.
///
/// Run with:
///   EXTENSION_PATH=./extension cargo run --example probe_smoke --features browser -- example.com
use std::path::PathBuf;

use doech_client::{BrowserProbe, DohClient, ProbeOptions};
use doech_core::models::RecordType;
use doech_core::traits::{Probe, Resolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let domain = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "cloudflare.com".to_string());

    let doh = DohClient::new()?;
    let records = doh.lookup_svcb(&domain, RecordType::Https).await?;
    println!("{} HTTPS record(s) for {domain}", records.len());
    for record in &records {
        println!("  {}", serde_json::to_string(record)?);
    }

    let options = ProbeOptions {
        extension_dir: std::env::var("EXTENSION_PATH").ok().map(PathBuf::from),
        ..ProbeOptions::default()
    };
    println!("Launching browser…");
    let probe = BrowserProbe::launch(options).await?;

    let export = probe.probe(&format!("https://{domain}")).await?;
    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}
