use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::model::{Satellite, DEFAULT_ID_COLUMN};
use crate::processing::FailurePolicy;

#[derive(Parser)]
#[command(name = "field-features")]
#[command(about = "Per-field radar and optical index extraction over satellite acquisitions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Total worker threads, field level and date level together (default: CPU count)
    #[arg(short = 'j', long, global = true)]
    pub workers: Option<usize>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract indices for every field of a GeoJSON file
    Features {
        /// GeoJSON FeatureCollection of field polygons
        #[arg(short, long)]
        fields: PathBuf,

        /// Scene catalog (JSON export of acquisitions and band means)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Imagery to read
        #[arg(short, long, value_enum)]
        satellite: Satellite,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Day after the last day of the range (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Workers dedicated to the field level; the rest process dates
        #[arg(long, default_value = "1")]
        field_workers: usize,

        /// Feature property holding the field id
        #[arg(long)]
        id_property: Option<String>,

        /// Name of the id column in the output
        #[arg(long, default_value = DEFAULT_ID_COLUMN)]
        id_column: String,

        /// What to do when a field fails
        #[arg(long, value_enum, default_value = "abort")]
        on_failure: FailurePolicy,

        /// Attempts per image source call
        #[arg(long, default_value = "3")]
        attempts: u32,
    },

    /// Run every job of a JSON batch file
    Batch {
        /// Batch configuration
        config: PathBuf,
    },
}
