use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use doech_client::{CLOUDFLARE_DOH_URL, DohClient, parse_unknown_rdata};
use doech_core::config::{DomainSlice, PipelineConfig, Signal};
use doech_core::domains::load_domains;
use doech_core::models::{RecordType, RunId};
use doech_core::orchestrator::{Orchestrator, RunSummary};
use doech_core::svcb;
use doech_core::traits::{NoProbe, NullSink, Probe, Resolver, ResultSink};
use doech_core::worker::{CrawlWorker, TracingCrawlReporter};
use doech_db::{Database, DatabaseConfig, JsonLinesSink};

#[derive(Parser)]
#[command(name = "doech", version, about = "SVCB/HTTPS and ECH deployment crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure every domain of a list and store the results
    Crawl(CrawlArgs),

    /// Run a single DoH query and print the parsed answers
    Lookup {
        /// Domain to query
        #[arg(short, long)]
        domain: String,

        /// Record type: A, AAAA, SVCB or HTTPS
        #[arg(short = 't', long = "type", default_value = "HTTPS")]
        rr_type: RecordType,

        /// Print the resolver's answer entries without decoding them
        #[arg(long, default_value_t = false)]
        raw: bool,

        #[command(flatten)]
        resolver: ResolverArgs,
    },

    /// Decode raw SVCB/HTTPS RDATA
    Decode {
        /// RDATA as hex (spaces allowed) or in `\# <len> <hex>` form
        #[arg(long)]
        hex: String,

        /// Owner name of the record
        #[arg(long, default_value = ".")]
        owner: String,

        /// Record type: SVCB or HTTPS
        #[arg(short = 't', long = "type", default_value = "HTTPS")]
        rr_type: RecordType,
    },
}

#[derive(clap::Args)]
struct ResolverArgs {
    /// DoH endpoint serving the JSON API
    #[arg(long, env = "DOECH_DOH_URL", default_value = CLOUDFLARE_DOH_URL)]
    doh_url: String,

    /// Per-query timeout in seconds
    #[arg(long, env = "DOECH_TIMEOUT", default_value_t = 5)]
    timeout: u64,
}

#[derive(clap::Args)]
struct CrawlArgs {
    /// Domain list (CSV, one domain per row or Tranco `rank,domain`)
    #[arg(short, long, env = "DOECH_DOMAIN_LIST")]
    domain_list: PathBuf,

    /// Zero-based CSV column holding the domain (inferred when omitted)
    #[arg(long)]
    column: Option<usize>,

    /// Skip this many leading domains
    #[arg(long, env = "DOECH_START_AT", default_value_t = 0)]
    start_at: usize,

    /// Process at most this many domains (0 = all)
    #[arg(short, long, env = "DOECH_NUM_DOMAINS", default_value_t = 0)]
    num_domains: usize,

    /// Number of domains processed concurrently
    #[arg(short = 'p', long, env = "DOECH_NUM_PROCESSES", default_value_t = 16)]
    num_processes: usize,

    /// Results buffered before each write to the sink
    #[arg(short, long, env = "DOECH_BATCH_SIZE", default_value_t = 100)]
    batch_size: usize,

    /// Identifies this machine in stored results
    #[arg(long, env = "WORKER_ID", default_value = "node-0")]
    worker_id: String,

    /// Comma-separated signals: a, aaaa, svcb, https, probe
    #[arg(long, env = "DOECH_SIGNALS", default_value = "a,aaaa,svcb,https")]
    signals: String,

    #[command(flatten)]
    resolver: ResolverArgs,

    #[command(flatten)]
    probe: ProbeArgs,

    /// Append results as JSON Lines to this file
    #[arg(short, long, env = "DOECH_OUTPUT")]
    output: Option<PathBuf>,

    /// Store results in PostgreSQL (requires DATABASE_URL)
    #[arg(long, default_value_t = false)]
    database: bool,

    /// Crawl without storing anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(clap::Args)]
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
struct ProbeArgs {
    /// Unpacked browser extension used by the probe signal
    #[arg(long, env = "EXTENSION_PATH")]
    extension_path: Option<PathBuf>,

    /// Seconds the page is left to settle before the export is requested
    #[arg(long, env = "SLEEP_TIME", default_value_t = 5)]
    sleep_time: u64,

    /// Bound on one browser probe, in seconds
    #[arg(long, env = "DOECH_PROBE_TIMEOUT", default_value_t = 30)]
    probe_timeout: u64,

    /// Run the browser without a window
    #[arg(long, env = "HEADLESS", default_value_t = true, action = ArgAction::Set)]
    headless: bool,

    /// Keep only main-frame entries of the browser export
    #[arg(long, env = "MAIN_FRAME_ONLY", default_value_t = false, action = ArgAction::Set)]
    main_frame_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("doech=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl(args) => cmd_crawl(args).await?,
        Commands::Lookup {
            domain,
            rr_type,
            raw,
            resolver,
        } => cmd_lookup(&domain, rr_type, raw, &resolver).await?,
        Commands::Decode {
            hex,
            owner,
            rr_type,
        } => cmd_decode(&hex, &owner, rr_type)?,
    }

    Ok(())
}

fn doh_client(args: &ResolverArgs) -> Result<DohClient> {
    DohClient::with_timeout(Duration::from_secs(args.timeout))
        .and_then(|client| client.with_endpoint(&args.doh_url))
        .context("Failed to create DoH client")
}

enum SinkChoice {
    Database,
    File(PathBuf),
    Discard,
}

impl SinkChoice {
    fn from_args(args: &CrawlArgs) -> Result<Self> {
        match (args.database, &args.output, args.dry_run) {
            (true, None, false) => Ok(SinkChoice::Database),
            (false, Some(path), false) => Ok(SinkChoice::File(path.clone())),
            (false, None, true) => Ok(SinkChoice::Discard),
            (false, None, false) => {
                anyhow::bail!("No output selected: pass --output <FILE>, --database or --dry-run")
            }
            _ => anyhow::bail!("--output, --database and --dry-run are mutually exclusive"),
        }
    }
}

async fn cmd_crawl(args: CrawlArgs) -> Result<()> {
    let signals = Signal::parse_list(&args.signals)?;
    let sink = SinkChoice::from_args(&args)?;

    let config = PipelineConfig::default()
        .with_worker_id(args.worker_id.clone())
        .with_worker_count(args.num_processes)
        .with_batch_size(args.batch_size)
        .with_slice(DomainSlice::new(
            args.start_at,
            (args.num_domains > 0).then_some(args.num_domains),
        ));
    config.validate()?;

    let domains = load_domains(&args.domain_list, args.column)?;
    let resolver = doh_client(&args.resolver)?;

    let summary = if signals.contains(&Signal::Probe) {
        let probe = launch_probe(&args.probe).await?;
        dispatch_sink(sink, resolver, Some(probe), signals, config, domains).await?
    } else {
        dispatch_sink::<NoProbe>(sink, resolver, None, signals, config, domains).await?
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.worker_panics > 0 {
        anyhow::bail!(
            "{} worker task(s) panicked, {} domain(s) left unprocessed",
            summary.worker_panics,
            summary.unprocessed
        );
    }
    if !summary.sink_failures.is_empty() {
        let lost: usize = summary.sink_failures.iter().map(|f| f.records).sum();
        anyhow::bail!(
            "{} batch(es) failed to store, {lost} result(s) lost",
            summary.sink_failures.len()
        );
    }
    Ok(())
}

#[cfg(feature = "browser")]
async fn launch_probe(args: &ProbeArgs) -> Result<doech_client::BrowserProbe> {
    let options = doech_client::ProbeOptions {
        timeout: Duration::from_secs(args.probe_timeout),
        settle_time: Duration::from_secs(args.sleep_time),
        extension_dir: args.extension_path.clone(),
        headless: args.headless,
        main_frame_only: args.main_frame_only,
    };
    doech_client::BrowserProbe::launch(options)
        .await
        .context("Failed to launch browser probe")
}

#[cfg(not(feature = "browser"))]
async fn launch_probe(_args: &ProbeArgs) -> Result<NoProbe> {
    anyhow::bail!("The probe signal requires doech to be built with the `browser` feature")
}

async fn dispatch_sink<P: Probe + 'static>(
    sink: SinkChoice,
    resolver: DohClient,
    probe: Option<P>,
    signals: Vec<Signal>,
    config: PipelineConfig,
    domains: Vec<String>,
) -> Result<RunSummary> {
    match sink {
        SinkChoice::Database => {
            let db_config = DatabaseConfig::from_env()?;
            let db = Database::connect(&db_config)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await?;
            run_crawl(resolver, probe, db.results_repo(), signals, config, domains).await
        }
        SinkChoice::File(path) => {
            let sink = JsonLinesSink::open(&path).await?;
            tracing::info!(path = %path.display(), "Writing results as JSON Lines");
            run_crawl(resolver, probe, sink, signals, config, domains).await
        }
        SinkChoice::Discard => {
            tracing::warn!("Dry run: results are not stored");
            run_crawl(resolver, probe, NullSink, signals, config, domains).await
        }
    }
}

async fn run_crawl<P, S>(
    resolver: DohClient,
    probe: Option<P>,
    sink: S,
    signals: Vec<Signal>,
    config: PipelineConfig,
    domains: Vec<String>,
) -> Result<RunSummary>
where
    P: Probe + 'static,
    S: ResultSink,
{
    let worker = CrawlWorker::new(resolver, probe, signals)?;
    let orchestrator = Orchestrator::new(worker, sink, config);

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let run_id = RunId::new();
    let summary = orchestrator
        .run(domains, run_id, Arc::new(TracingCrawlReporter), cancel_token)
        .await?;
    Ok(summary)
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupt received, finishing in-flight domains");
        cancel_token.cancel();
    }
}

async fn cmd_lookup(
    domain: &str,
    rr_type: RecordType,
    raw: bool,
    resolver: &ResolverArgs,
) -> Result<()> {
    let client = doh_client(resolver)?;

    let output = if raw {
        serde_json::to_value(client.query(domain, rr_type).await?)?
    } else if rr_type.is_svcb_compatible() {
        serde_json::to_value(client.lookup_svcb(domain, rr_type).await?)?
    } else {
        serde_json::to_value(client.lookup_addresses(domain, rr_type).await?)?
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_decode(input: &str, owner: &str, rr_type: RecordType) -> Result<()> {
    let rdata = if input.trim_start().starts_with("\\#") {
        parse_unknown_rdata(input).context("Invalid `\\# <len> <hex>` RDATA")?
    } else {
        let digits: String = input.split_whitespace().collect();
        hex::decode(digits).context("RDATA is not valid hex")?
    };

    let record = svcb::decode(owner, rr_type, &rdata)?;
    if let Some(params) = record.params() {
        tracing::info!(
            priority = record.priority(),
            svc_target = record.effective_target(),
            %params,
            "Decoded record"
        );
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
