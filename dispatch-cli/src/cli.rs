use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "dispatch-cli", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Loads synthetic trip rows into `staging_nyc_raw`.
    Seed {
        #[clap(long, default_value_t = 100)]
        rows: u32,
    },
    /// Filters `staging_nyc_raw` into `nyc_clean`.
    Clean,
    /// Seeds the driver pool.
    InitDrivers {
        #[clap(long, default_value_t = 10)]
        count: u32,
        #[clap(long)]
        clear_existing: bool,
    },
    /// Replays up to `limit` ride seeds through the dispatch engine.
    Replay {
        #[clap(long, default_value_t = 100)]
        limit: usize,
        /// Also serve the read-only HTTP API while replay runs.
        #[clap(long)]
        serve: bool,
    },
    /// Runs seed → clean → init-drivers → replay, then serves the API and
    /// waits for an interrupt.
    All {
        #[clap(long, default_value_t = 100)]
        rows: u32,
        #[clap(long, default_value_t = 10)]
        drivers: u32,
        #[clap(long, default_value_t = 100)]
        limit: usize,
    },
}
