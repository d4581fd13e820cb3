//! Orderflow CLI Entry Point
//!
//! Reads JSON requests, one per line, and writes one JSON response per
//! line to stdout.
//!
//! # Usage
//!
//! ```bash
//! # Serve requests from stdin with the built-in catalog
//! orderflow
//!
//! # Custom catalog, requests from a file
//! orderflow requests.jsonl --catalog workflows.yaml
//!
//! # Expire decisions not received within 15 minutes
//! orderflow --suspend-ttl 900
//! ```

use std::env;
use std::process::ExitCode;
use std::time::Duration as StdDuration;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use orderflow::api::handle_line;
use orderflow::execution::step::{DEFAULT_DCC_CURRENCY, DEFAULT_DCC_RATE};
use orderflow::execution::{DccOfferExecutor, OrchestrationEngine, StepExecutors};
use orderflow::workflow::{load_catalog, WorkflowCatalog};
use orderflow::{APP_NAME, VERSION};

/// Upper bound on the expiry sweep period.
const MAX_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(30);

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    input_path: Option<String>,
    catalog_path: Option<String>,
    dcc_rate: f64,
    dcc_currency: String,
    suspend_ttl_secs: Option<u64>,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: None,
            catalog_path: None,
            dcc_rate: DEFAULT_DCC_RATE,
            dcc_currency: DEFAULT_DCC_CURRENCY.to_string(),
            suspend_ttl_secs: None,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner to stderr; stdout carries responses.
fn print_banner() {
    eprintln!();
    eprintln!("{} v{}", APP_NAME, VERSION);
    eprintln!("Order Workflow Orchestration Engine");
    eprintln!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: orderflow [OPTIONS] [INPUT_FILE]");
    println!();
    println!("Arguments:");
    println!("  [INPUT_FILE]          JSON-lines request file (default: stdin)");
    println!();
    println!("Options:");
    println!("  --catalog PATH        Workflow catalog YAML (default: built-in catalog)");
    println!("  --dcc-rate RATE       Conversion rate offered (default: {})", DEFAULT_DCC_RATE);
    println!("  --dcc-currency CUR    Currency offered (default: {})", DEFAULT_DCC_CURRENCY);
    println!("  --suspend-ttl SECS    Expire workflows awaiting a decision after SECS");
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
    println!();
    println!("Requests:");
    println!(r#"  {{"action":"create_order","customer_id":"c1","amount":100.0,"currency":"USD","card_brand":"visa"}}"#);
    println!(r#"  {{"action":"submit_decision","order_id":"order-1","accepted":true,"new_amount":85.0,"new_currency":"BRL"}}"#);
}

/// Returns the value following an option, advancing the cursor.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--catalog" => {
                config.catalog_path = Some(option_value(args, &mut i, "--catalog")?.to_string());
            }
            "--dcc-rate" => {
                let value = option_value(args, &mut i, "--dcc-rate")?;
                config.dcc_rate = value
                    .parse()
                    .ok()
                    .filter(|rate: &f64| rate.is_finite() && *rate > 0.0)
                    .ok_or_else(|| format!("Invalid DCC rate: {}", value))?;
            }
            "--dcc-currency" => {
                config.dcc_currency = option_value(args, &mut i, "--dcc-currency")?.to_string();
            }
            "--suspend-ttl" => {
                let value = option_value(args, &mut i, "--suspend-ttl")?;
                config.suspend_ttl_secs = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid suspend TTL: {}", value))?,
                );
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.input_path.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.input_path = Some(arg.clone());
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Builds the engine from configuration.
fn build_engine(config: &Config) -> Result<OrchestrationEngine, Box<dyn std::error::Error>> {
    let catalog = match &config.catalog_path {
        Some(path) => load_catalog(path).map_err(|e| {
            error!("Failed to load catalog: {}", e);
            format!("Could not load workflow catalog from '{}': {}", path, e)
        })?,
        None => {
            info!("Using built-in workflow catalog");
            WorkflowCatalog::builtin()
        }
    };

    info!("Catalog loaded: {} workflows", catalog.len());

    let executors =
        StepExecutors::with_dcc(DccOfferExecutor::new(config.dcc_rate, config.dcc_currency.clone()));
    let mut engine = OrchestrationEngine::new(catalog, executors);

    if let Some(secs) = config.suspend_ttl_secs {
        let secs = i64::try_from(secs).map_err(|_| format!("Suspend TTL too large: {}", secs))?;
        engine.set_suspend_ttl(chrono::Duration::seconds(secs));
        info!("Suspended workflows expire after {} s", secs);
    }

    Ok(engine)
}

/// Periodically drops workflows that waited too long for a decision.
fn spawn_expiry_sweep(engine: OrchestrationEngine, ttl_secs: u64) {
    let period = StdDuration::from_secs(ttl_secs.max(1)).min(MAX_SWEEP_INTERVAL);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let expired = engine.expire_suspended().await;
            if !expired.is_empty() {
                warn!("Expired {} suspended workflows", expired.len());
            }
        }
    });
}

/// Serves requests until the input is exhausted.
async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(&config)?;

    if let Some(secs) = config.suspend_ttl_secs {
        spawn_expiry_sweep(engine.clone(), secs);
    }

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &config.input_path {
        Some(path) => {
            info!("Reading requests from: {}", path);
            Box::new(tokio::fs::File::open(path).await.map_err(|e| {
                format!("Failed to open input file '{}': {}", path, e)
            })?)
        }
        None => {
            info!("Reading requests from stdin");
            Box::new(tokio::io::stdin())
        }
    };

    let mut lines = BufReader::new(reader).lines();
    let mut handled = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = handle_line(&engine, line).await;
        println!("{}", serde_json::to_string(&response)?);
        handled += 1;
    }

    // Let in-flight bursts finish before the runtime shuts down
    engine.wait_all_idle().await;

    info!(
        "Handled {} requests; {} workflows still active",
        handled,
        engine.active_instances().await
    );

    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    // Print banner
    print_banner();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
