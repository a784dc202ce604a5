use anyhow::{anyhow, Context, Result};
use batching::{BatchReader, RatingBatch};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dataset::{
    denormalize_rating, BuildOptions, DataPaths, RatingDataset, SnapshotStore, Split, UserId,
    DEBUG_ENTITY_CUTOFF,
};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// AutoRec Prep - Rating Dataset Preparation
#[derive(Parser)]
#[command(name = "autorec-prep")]
#[command(about = "Prepare rating logs for autoencoder training", long_about = None)]
struct Cli {
    /// Directory the prepared dataset lives under
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Work against the small debug dataset instead of the full one
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest raw rating logs into partition files and a snapshot
    Build {
        /// Path to the raw ratings file (user::entity::rating::timestamp)
        #[arg(long, default_value = "data/ml-1m/ratings.dat")]
        ratings: PathBuf,

        /// Path to the raw entity names file (id::name::tags)
        #[arg(long, default_value = "data/ml-1m/movies.dat")]
        names: PathBuf,

        /// Stop ingesting once more than this many distinct entities were seen
        #[arg(long)]
        cutoff: Option<usize>,

        /// Seed for the train/test/validation draw
        #[arg(long)]
        seed: Option<u64>,

        /// Rebuild even if a complete snapshot already exists
        #[arg(long)]
        force: bool,
    },

    /// Show counts and file sizes of the prepared dataset
    Stats,

    /// Resolve users to their latest dense rating rows
    Lookup {
        /// User IDs to resolve
        #[arg(long, required = true, num_args = 1..)]
        user_id: Vec<UserId>,
    },

    /// Stream a few batches and report their shape
    Batch {
        /// Partition to stream from
        #[arg(long, default_value = "train")]
        split: Split,

        /// Number of row slots per batch
        #[arg(long, default_value = "32")]
        batch_size: usize,

        /// Present entries to hide per batch in the input tensor
        #[arg(long, default_value = "0")]
        corrupt: usize,

        /// Number of batches to stream
        #[arg(long, default_value = "4")]
        count: usize,

        /// Seed for the corruption draw
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let paths = DataPaths::new(&cli.data_dir, cli.debug);

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Build {
            ratings,
            names,
            cutoff,
            seed,
            force,
        } => handle_build(paths, cli.debug, ratings, names, cutoff, seed, force)?,
        Commands::Stats => handle_stats(paths)?,
        Commands::Lookup { user_id } => handle_lookup(paths, user_id)?,
        Commands::Batch {
            split,
            batch_size,
            corrupt,
            count,
            seed,
        } => handle_batch(paths, split, batch_size, corrupt, count, seed)?,
    }

    Ok(())
}

/// Handle the 'build' command
fn handle_build(
    paths: DataPaths,
    debug: bool,
    ratings: PathBuf,
    names: PathBuf,
    cutoff: Option<usize>,
    seed: Option<u64>,
    force: bool,
) -> Result<()> {
    let mut options = BuildOptions::default();
    if let Some(seed) = seed {
        options = options.with_seed(seed);
    }
    // Debug runs get a cutoff even when none was asked for
    match cutoff {
        Some(cutoff) => options = options.with_entity_cutoff(cutoff),
        None if debug => options = options.with_entity_cutoff(DEBUG_ENTITY_CUTOFF),
        None => {}
    }

    println!(
        "Preparing dataset under {} from {}...",
        paths.root().display(),
        ratings.display()
    );
    let start = Instant::now();
    let dataset = if force {
        RatingDataset::build(paths, &ratings, &names, options)
    } else {
        RatingDataset::open(paths, &ratings, &names, options)
    }
    .context("Failed to prepare dataset")?;
    println!("{} Prepared dataset in {:?}", "✓".green(), start.elapsed());

    print_summary(&dataset);
    Ok(())
}

/// Handle the 'stats' command
fn handle_stats(paths: DataPaths) -> Result<()> {
    let dataset = load_dataset(paths)?;
    print_summary(&dataset);

    println!("{}", "Partition files:".bold().blue());
    for partition in dataset.partitions() {
        let path = dataset.partition_path(partition.split);
        let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        println!(
            "{}{}: {} instances ({} bytes)",
            "• ".cyan(),
            partition.split,
            partition.instances,
            bytes
        );
    }
    println!(
        "{}snapshot: {}",
        "• ".cyan(),
        dataset.paths().snapshot_path().display()
    );
    Ok(())
}

/// Handle the 'lookup' command
fn handle_lookup(paths: DataPaths, user_ids: Vec<UserId>) -> Result<()> {
    let dataset = load_dataset(paths)?;

    let start = Instant::now();
    let rows = dataset
        .resolve_users(&user_ids)
        .context("Failed to resolve users")?;
    println!(
        "{} Resolved {} users in {:?}",
        "✓".green(),
        rows.len(),
        start.elapsed()
    );

    for (user_id, row) in user_ids.iter().zip(&rows) {
        // Collect the present entries and show the highest-rated first
        let mut entries: Vec<(usize, f32)> = row
            .iter()
            .enumerate()
            .filter(|(_, &value)| value != 0.0)
            .map(|(column, &value)| (column, value))
            .collect();
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        println!("{}", format!("User {}", user_id).bold().blue());
        println!("{}Rated entities: {}", "• ".green(), entries.len());
        for (column, value) in entries.iter().take(10) {
            let name = dataset
                .names()
                .name_for(*column)
                .unwrap_or("(unnamed entity)");
            println!("  - {} (Rating: {:.1})", name, denormalize_rating(*value));
        }
    }
    Ok(())
}

/// Handle the 'batch' command
fn handle_batch(
    paths: DataPaths,
    split: Split,
    batch_size: usize,
    corrupt: usize,
    count: usize,
    seed: Option<u64>,
) -> Result<()> {
    let dataset = load_dataset(paths)?;

    let mut reader = BatchReader::for_split(&dataset, split, batch_size).with_corruption(corrupt);
    if let Some(seed) = seed {
        reader = reader.with_seed(seed);
    }

    println!(
        "{}",
        format!("Streaming {} batches from {}:", count, split)
            .bold()
            .blue()
    );
    let start = Instant::now();
    let mut total_rows = 0usize;
    for step in 1..=count {
        let batch = reader.next_batch().context("Failed to read batch")?;
        let hidden = hidden_entries(&batch);
        total_rows += batch.rows;
        println!(
            "{}batch {}: {} rows, {} entries present, {} hidden",
            "• ".cyan(),
            step,
            batch.rows,
            batch.present_entries(),
            hidden
        );
    }
    let elapsed = start.elapsed();
    println!(
        "{} Streamed {} rows in {:?} ({:.0} rows/second)",
        "✓".green(),
        total_rows,
        elapsed,
        total_rows as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

/// Count the present entries whose input no longer matches the target.
///
/// A corrupted entry whose stored value is already 0.0 reads the same as the
/// absent-entry sentinel, so it cannot be told apart and is not counted.
fn hidden_entries(batch: &RatingBatch) -> usize {
    batch
        .presence_mask
        .iter()
        .zip(batch.input.iter().zip(batch.target.iter()))
        .filter(|(mask, (input, target))| **mask != 0.0 && **input != **target)
        .count()
}

/// Load the prepared dataset (this may restore files from the backup mirror)
fn load_dataset(paths: DataPaths) -> Result<RatingDataset> {
    println!(
        "Loading prepared dataset from {}...",
        paths.root().display()
    );
    let start = Instant::now();
    let store = SnapshotStore::new(paths.clone());
    if !store.exists_and_complete() {
        return Err(anyhow!(
            "No complete dataset under {}; run the build command first",
            paths.root().display()
        ));
    }
    let dataset = RatingDataset::load(paths).context("Failed to load prepared dataset")?;
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());
    Ok(dataset)
}

/// Helper function to print the dataset summary
fn print_summary(dataset: &RatingDataset) {
    let (users, entities, instances) = dataset.counts();
    println!("{}", "Dataset summary:".bold().blue());
    println!("{}Users: {}", "• ".green(), users);
    println!("{}Entities: {}", "• ".green(), entities);
    println!("{}Instances: {}", "• ".green(), instances);
    println!(
        "{}Embedding width: {}",
        "• ".green(),
        dataset.embedding_width()
    );
    for split in Split::ALL {
        println!(
            "{}{}: {} instances",
            "• ".cyan(),
            split,
            dataset.instance_count(split)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_hidden_entries_skip_ratings_stored_as_zero() {
        // Column 1 holds a real value and gets hidden; column 2 holds a
        // stored 0.0 (a raw rating at the scale midpoint) and stays visible
        let mut target = Array2::<f32>::zeros((1, 4));
        let mut presence_mask = Array2::<f32>::zeros((1, 4));
        target[[0, 1]] = 1.5;
        presence_mask[[0, 1]] = 1.0;
        presence_mask[[0, 2]] = 1.0;

        let mut input = target.clone();
        input[[0, 1]] = 0.0;

        let batch = RatingBatch {
            input,
            target,
            presence_mask,
            rows: 1,
        };
        assert_eq!(
            hidden_entries(&batch),
            1,
            "only the entry that changed counts as hidden"
        );
    }

    #[test]
    fn test_hidden_entries_is_zero_without_corruption() {
        let mut target = Array2::<f32>::zeros((2, 3));
        let mut presence_mask = Array2::<f32>::zeros((2, 3));
        target[[0, 1]] = 2.5;
        target[[1, 2]] = -1.5;
        presence_mask[[0, 1]] = 1.0;
        presence_mask[[1, 2]] = 1.0;

        let batch = RatingBatch {
            input: target.clone(),
            target,
            presence_mask,
            rows: 2,
        };
        assert_eq!(hidden_entries(&batch), 0);
    }
}
