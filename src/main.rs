//! Zentinel WSDL probe binary.
//!
//! Run with: `zentinel-wsdl-probe --config config.yaml http://host/service?wsdl`

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;
use zentinel_wsdl_probe::{Classification, MemoryAuditStore, WsdlLoader, WsdlProbeConfig};

/// Probe URLs for WSDL service descriptions.
///
/// For every URL that turns out to be a usable WSDL, prints the endpoints
/// its ports are bound to and the operations it declares.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the structural dump recorded for each accepted document
    #[arg(long)]
    dump: bool,

    /// URLs to probe
    #[arg(required = true)]
    urls: Vec<Url>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Starting Zentinel WSDL probe v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        info!("Config file: {}", args.config.display());
        WsdlProbeConfig::from_yaml_file(&args.config).context("Failed to load config file")?
    } else {
        info!("Config file not found, using defaults");
        WsdlProbeConfig::default()
    };

    info!(
        timeout_secs = config.fetch.timeout_secs,
        max_document_size = config.fetch.max_document_size,
        xxe_prevention = config.xxe_prevention.enabled,
        "Configuration loaded"
    );

    let audit = Arc::new(MemoryAuditStore::new());
    let loader = WsdlLoader::with_http(config, audit.clone()).context("Failed to create loader")?;

    let mut accepted = 0usize;
    for url in &args.urls {
        match loader.probe(url) {
            Classification::Valid(_) => {}
            Classification::NotAService => {
                println!("{}: WSDL without services", url);
                continue;
            }
            Classification::NotXml(reason) => {
                println!("{}: not a WSDL ({})", url, reason);
                continue;
            }
        }

        let description = match loader.construct(url) {
            Ok(description) => description,
            Err(e) => {
                warn!(uri = %url, error = %e, "Document changed between probe and construct");
                continue;
            }
        };
        accepted += 1;

        println!("{}: WSDL service description", url);

        let mut endpoints: Vec<_> = description
            .discovered_endpoints()
            .with_context(|| format!("Failed to extract endpoints from {}", url))?
            .into_iter()
            .collect();
        endpoints.sort();
        println!("  Endpoints:");
        for endpoint in endpoints {
            println!("    {}", endpoint);
        }

        println!("  Operations:");
        let operations = description
            .operations()
            .with_context(|| format!("Failed to extract operations from {}", url))?;
        for op in operations {
            let params = op
                .parameters
                .iter()
                .map(|p| format!("{}: {{{}}}{}", p.name, p.type_namespace, p.type_name))
                .collect::<Vec<_>>()
                .join(", ");
            println!("    {}({})", op.name, params);
            if let Some(action) = &op.soap_action {
                println!("      SOAPAction: {}", action);
            }
            if let Some(location) = &op.location {
                println!("      Location: {}", location);
            }
        }
    }

    if args.dump {
        for record in audit.records() {
            println!();
            println!("== {} ==", record.title);
            print!("{}", record.body);
        }
    }

    info!(
        probed = args.urls.len(),
        accepted = accepted,
        "WSDL probe finished"
    );
    Ok(())
}
