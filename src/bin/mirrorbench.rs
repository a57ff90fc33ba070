use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mirrorbench::config::{DEFAULT_CONFIG_PATH, MirrorBenchConfig};
use mirrorbench::db::schema::ensure_schema;
use mirrorbench::db::services;
use mirrorbench::generator::PacketGenerator;
use mirrorbench::generator::grpc::GrpcGenerator;
use mirrorbench::measurement::PortCatalog;
use mirrorbench::sweep::{SweepOptions, run_sweep, select_pattern_sets, simulated_generator};

#[derive(Parser, Debug)]
#[command(author, version, about = "mirror/bandwidth test tool", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Device under test name
    #[arg(short, long, default_value = "test")]
    dut_name: String,

    /// SQLite database file (or database URL) to be used instead of the configured one
    #[arg(short = 'f', long, conflicts_with = "list_speed_pattern_sets")]
    db_file: Option<String>,

    /// List available speed pattern sets
    #[arg(short, long)]
    list_speed_pattern_sets: bool,

    /// Select speed pattern set to be run (default: run all)
    #[arg(short, long)]
    speed_pattern_set: Option<String>,

    /// Log every collected statistics record
    #[arg(short, long)]
    verbose: bool,

    /// Print the generator's ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Drive an in-process simulated generator instead of connecting to a drone
    #[arg(long)]
    simulate: bool,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "mirrorbench.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

/// A bare path becomes a SQLite URL that creates the file on first use.
fn database_url_for(db_file: &str) -> String {
    if db_file.contains("://") || db_file.starts_with("sqlite:") {
        db_file.to_string()
    } else {
        format!("sqlite://{db_file}?mode=rwc")
    }
}

async fn print_ports<G: PacketGenerator>(generator: &G) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let catalog = PortCatalog::discover(generator).await?;
    for port in catalog.ports() {
        println!("{:>3} -> {}", port.id, port.name);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    dotenv().ok(); // DATABASE_URL may come from .env

    let config = match MirrorBenchConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    if args.list_speed_pattern_sets {
        for name in config.speed_pattern_sets.keys() {
            println!("{name}");
        }
        return Ok(());
    }

    init_logging(&config.log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "Starting mirrorbench.");

    if args.list_ports {
        return if args.simulate {
            print_ports(&simulated_generator(&config)).await
        } else {
            print_ports(&GrpcGenerator::connect(&config.generator_address).await?).await
        };
    }

    if let Err(e) = select_pattern_sets(&config, args.speed_pattern_set.as_deref()) {
        error!("{e}. Abort.");
        return Err(e.into());
    }

    let database_url = args
        .db_file
        .as_deref()
        .map(database_url_for)
        .unwrap_or_else(|| config.database_url.clone());
    let db = services::connect(&database_url).await?;
    ensure_schema(&db, false).await?;

    let options = SweepOptions {
        device_name: args.dut_name,
        pattern_set: args.speed_pattern_set,
        verbose: args.verbose,
    };

    let result = if args.simulate {
        info!("Using the simulated generator.");
        run_sweep(simulated_generator(&config), &config, &db, &options).await
    } else {
        let generator = match GrpcGenerator::connect(&config.generator_address).await {
            Ok(generator) => generator,
            Err(e) => {
                error!(address = %config.generator_address, error = %e, "Failed to connect to the generator.");
                return Err(e.into());
            }
        };
        run_sweep(generator, &config, &db, &options).await
    };

    match result {
        Ok(runs) => {
            info!(runs = runs.len(), device = %options.device_name, "Sweep finished.");
            Ok(())
        }
        Err(e) => {
            // nothing of the failed run has been stored
            error!(error = %e, "Sweep aborted.");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_paths_become_sqlite_urls() {
        assert_eq!(database_url_for("bench.sqlite"), "sqlite://bench.sqlite?mode=rwc");
        assert_eq!(database_url_for("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            database_url_for("sqlite:///tmp/bench.sqlite"),
            "sqlite:///tmp/bench.sqlite"
        );
    }

    #[test]
    fn db_file_conflicts_with_listing() {
        assert!(Args::try_parse_from(["mirrorbench", "-f", "x.sqlite", "-l"]).is_err());
        let args = Args::try_parse_from(["mirrorbench", "-f", "x.sqlite", "-s", "pairs", "-v"]).unwrap();
        assert_eq!(args.dut_name, "test");
        assert_eq!(args.config, DEFAULT_CONFIG_PATH);
        assert_eq!(args.speed_pattern_set.as_deref(), Some("pairs"));
        assert!(args.verbose);
    }
}
