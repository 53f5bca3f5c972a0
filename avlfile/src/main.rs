#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::process::ExitCode;

use avlfile::config::IndexConfig;
use avlfile::record::Sale;
use avlfile::storage::{AvlError, AvlIndex};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sales records kept in a disk-resident AVL index.
///
/// The index file and persistence mode come from `AVLFILE_PATH` and
/// `AVLFILE_PERSISTENCE`.
#[derive(Debug, Parser)]
#[command(name = "avlfile", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Insert a sale (a no-op if the id already exists)
    Insert {
        #[arg(allow_negative_numbers = true)]
        id: i32,
        product: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i32,
        #[arg(allow_negative_numbers = true)]
        price: f32,
        date: String,
    },
    /// Look up a sale by id
    Search {
        #[arg(allow_negative_numbers = true)]
        id: i32,
    },
    /// Delete a sale by id
    Delete {
        #[arg(allow_negative_numbers = true)]
        id: i32,
    },
    /// List sales with `low <= id <= high`
    Range {
        #[arg(allow_negative_numbers = true)]
        low: i32,
        #[arg(allow_negative_numbers = true)]
        high: i32,
    },
    /// List every sale in id order
    List,
    /// Check the tree invariants
    Verify,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avlfile=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment variables
    let config = match IndexConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(
        "Loaded configuration: path={}, persistence={}",
        config.path.display(),
        config.persistence
    );

    let mut index = match AvlIndex::<Sale>::open_with_mode(&config.path, config.persistence) {
        Ok(index) => index,
        Err(e) => {
            tracing::error!("Failed to open {}: {e}", config.path.display());
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &mut index) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command, index: &mut AvlIndex<Sale>) -> Result<ExitCode, AvlError> {
    match command {
        Command::Insert {
            id,
            product,
            quantity,
            price,
            date,
        } => {
            let sale = Sale::new(id, product, quantity, price, date);
            if index.insert(sale)? {
                println!("inserted");
            } else {
                println!("duplicate");
            }
        }
        Command::Search { id } => print_found(index.search(id)?),
        Command::Delete { id } => print_found(index.delete(id)?),
        Command::Range { low, high } => print_all(&index.range_search(low, high)?),
        Command::List => print_all(&index.records()?),
        Command::Verify => {
            let report = index.verify()?;
            println!(
                "{} reachable nodes, {} slots ({} orphaned), height {}",
                report.reachable,
                report.slot_count,
                report.orphaned(),
                report.height
            );
            if !report.is_valid() {
                for violation in &report.violations {
                    println!("{violation:?}");
                }
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_found(sale: Option<Sale>) {
    match sale {
        Some(sale) => println!("{sale}"),
        None => println!("not found"),
    }
}

fn print_all(sales: &[Sale]) {
    for sale in sales {
        println!("{sale}");
    }
}
