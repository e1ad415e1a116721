//! `amass` binary entrypoint.
//!
//! Parses CLI arguments into an `amass_engine::config::Config`, wires up the
//! resolver pools, graph, and data sources, and runs one enumeration via
//! `PipelineRuntime`. The binary is intentionally thin: argument parsing and
//! process plumbing live here, the actual enumeration logic lives in
//! `amass_engine`.

use std::net::SocketAddr;
use std::sync::Arc;

use amass_engine::config::Config;
use amass_engine::graph::{Graph, InMemoryGraph};
use amass_engine::model::Event;
use amass_engine::pipeline::runtime::{PipelineRuntime, RuntimeOutcome};
use amass_engine::resolver::HickoryResolver;
use amass_engine::source::{CertSpotterSource, DataSource};
use clap::Parser;
use env_logger::Env;

/// Command-line surface covering the engine's configuration options:
/// `Domains`, `ASNs`, `ProvidedNames`, `Passive`, `Active`, `IncludeUnresolvable`,
/// plus a blocklist file and extra trusted tags.
#[derive(Debug, Parser)]
#[command(name = "amass", version, about = "DNS-driven subdomain enumeration")]
struct Cli {
    /// Root domain to enumerate. Repeatable.
    #[arg(short = 'd', long = "domain", required = true)]
    domains: Vec<String>,

    /// ASN seed for ASN-aware data sources. Repeatable.
    #[arg(long = "asn")]
    asns: Vec<u32>,

    /// Previously-known or user-supplied name to seed the run with. Repeatable.
    #[arg(long = "name")]
    names: Vec<String>,

    /// Skip active resolution entirely; rely on data sources only.
    #[arg(long)]
    passive: bool,

    /// Enable zone-transfer attempts and wider reverse sweeps.
    #[arg(long)]
    active: bool,

    /// Forward names with empty record sets when they are still in scope.
    #[arg(long = "include-unresolvable")]
    include_unresolvable: bool,

    /// Extra CIDR blocks to treat as bad-subnet answers, beyond the built-in defaults.
    #[arg(long = "blocklist")]
    blocklist: Vec<ipnetwork::IpNetwork>,

    /// Extra tags to treat as trusted (bypass wildcard filtering), beyond the defaults.
    #[arg(long = "trust-tag")]
    trusted_tags: Vec<String>,

    /// Name (and any of its subdomains) to exclude from enumeration entirely.
    #[arg(long = "exclude")]
    blacklisted_names: Vec<String>,

    /// Nameserver used for the trusted resolver pool the validation stage
    /// runs against. Defaults to the same public resolver configuration
    /// used for the DNS task if unset; only the pool instances need to be
    /// distinct, not the servers.
    #[arg(long = "trusted-nameserver")]
    trusted_nameserver: Option<SocketAddr>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(Env::default().default_filter_or(default_filter));
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::new(cli.domains)
        .with_blocklist(cli.blocklist)
        .with_trusted_tags(cli.trusted_tags)
        .with_blacklisted_names(cli.blacklisted_names);
    config.asns = cli.asns;
    config.provided_names = cli.names;
    config.passive = cli.passive;
    config.active = cli.active;
    config.include_unresolvable = cli.include_unresolvable;
    config.uuid = new_run_id();

    if let Err(e) = config.validate() {
        log::error!("{e}");
        return std::process::ExitCode::FAILURE;
    }

    let resolver = Arc::new(HickoryResolver::with_defaults());
    let trusted_resolver = match cli.trusted_nameserver {
        Some(addr) => Arc::new(HickoryResolver::with_nameserver(addr)),
        None => Arc::new(HickoryResolver::with_defaults()),
    };
    let graph = Arc::new(InMemoryGraph::new());
    let sources: Vec<Arc<dyn DataSource>> = vec![Arc::new(CertSpotterSource::new())];

    log::info!("starting enumeration run {} for {:?}", config.uuid, config.domains);

    let event = Event::new(event_id_from_uuid(&config.uuid));
    let runtime = PipelineRuntime::new(config, resolver, trusted_resolver, graph.clone(), sources);

    let cancel = runtime.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("received interrupt, draining in-flight work");
            cancel.cancel();
        }
    });

    match runtime.run(event).await {
        Ok(RuntimeOutcome::Completed) => {
            let names = graph.event_fqdns(event).await;
            log::info!("run complete: {} names discovered", names.len());
            for name in names {
                println!("{name}");
            }
            std::process::ExitCode::SUCCESS
        }
        Ok(RuntimeOutcome::Cancelled) => {
            log::warn!("run cancelled");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            std::process::ExitCode::FAILURE
        }
    }
}

/// A process-unique run identifier. The configuration surface treats this
/// as an opaque string, which avoids pulling in a `uuid` crate dependency
/// for a value the pipeline never inspects.
fn new_run_id() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{:x}-{:x}", std::process::id(), nanos)
}

fn event_id_from_uuid(uuid: &str) -> u128 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    uuid.hash(&mut hasher);
    hasher.finish() as u128
}
