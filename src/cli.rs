use crate::adapters::store::memory::MemoryStore;
use crate::adapters::store::sqlite::SqliteStoreProvider;
use crate::domain::ports::StoreProvider;
use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;

/// Render downward call chains for the configured entry methods from a
/// precomputed method-call table.
#[derive(Debug, Parser)]
#[command(name = "cctool", version, about)]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "callchain.json")]
    pub config: PathBuf,

    /// SQLite database holding the method-call tables
    #[arg(long, conflicts_with = "edges_json")]
    pub db: Option<PathBuf>,

    /// JSON edge dump to run from instead of a database
    #[arg(long)]
    pub edges_json: Option<PathBuf>,

    /// Override the configured output directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Override the configured worker-thread maximum
    #[arg(long)]
    pub threads: Option<usize>,
}

impl Cli {
    pub fn store_provider(&self) -> Result<Box<dyn StoreProvider>> {
        // clap already rejects --db together with --edges-json.
        match (&self.db, &self.edges_json) {
            (Some(db), _) => Ok(Box::new(SqliteStoreProvider::new(db.clone())?)),
            (None, Some(dump)) => Ok(Box::new(MemoryStore::from_json_file(dump)?)),
            (None, None) => bail!("either --db or --edges-json is required"),
        }
    }
}
