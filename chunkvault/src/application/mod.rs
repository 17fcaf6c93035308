pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use chunkvault_core::Result;
use clap::Parser;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Split {
            src,
            out_dir,
            compress,
            key,
            bounds,
            prefix,
            parity,
            parity_ratio,
        } => handlers::handle_split(
            src,
            out_dir,
            compress,
            key,
            bounds,
            prefix,
            parity,
            parity_ratio,
        ),
        Commands::Combine {
            dir,
            out,
            prefix,
            key,
            repair,
            parity,
        } => handlers::handle_combine(dir, out, prefix, key, repair, parity),
        Commands::Verify { dir, prefix } => handlers::handle_verify(dir, prefix),
        Commands::Parity {
            dir,
            prefix,
            backend,
            ratio,
        } => handlers::handle_parity(dir, prefix, backend, ratio),
        Commands::Plan { size, bounds } => handlers::handle_plan(size, bounds),
        Commands::Info { dir, prefix } => handlers::handle_info(dir, prefix),
    }
}
