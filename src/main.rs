// src/main.rs
use anyhow::Result;
use clap::Parser;
use tracing::info;

use field_features::batch::{default_workers, process_batch, run_job, GlobalParams, Job};
use field_features::cli::{Cli, Commands};
use field_features::logging::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let workers = cli.workers.unwrap_or_else(default_workers);

    match cli.command {
        Commands::Features {
            fields,
            catalog,
            satellite,
            start,
            end,
            field_workers,
            id_property,
            id_column,
            on_failure,
            attempts,
        } => {
            let job = Job {
                name: None,
                satellite,
                fields,
                catalog,
                start_date: start,
                end_date: end,
                id_property,
                workers: Some(workers),
                field_workers: Some(field_workers),
                on_failure: Some(on_failure),
            };
            let global = GlobalParams {
                attempts,
                id_column,
                ..GlobalParams::default()
            };

            let table = run_job(&job, &global)?;
            print!("{table}");
            info!(rows = table.len(), "Processing complete");
        }
        Commands::Batch { config } => {
            for (label, table) in process_batch(&config, cli.workers)? {
                println!("# {label}");
                print!("{table}");
            }
        }
    }

    Ok(())
}
