use anyhow::Result;
use clap::Parser;

use crate::ampcov::{Ampcov, AmpcovConfig};
use crate::coverage::CoverageFormat;
use crate::terminal::{App, Commands};
use crate::timeline::SelectorConfig;

mod ampcov;
mod coverage;
mod error;
mod matrix;
mod scheme;
mod stats;
mod targets;
mod terminal;
mod timeline;
mod utils;

/// Ampcov application
///
/// Run the application from arguments provided
/// by the command line interface
fn main() -> Result<()> {
    utils::init_logger();

    let cli = App::parse();

    match &cli.command {
        Commands::Amplicon(args) => {
            let ampcov = Ampcov::from(AmpcovConfig::from_amplicon_args(args));
            ampcov.run_amplicon(&args.primers, &args.samples, &args.sample_dir, &args.outdir)?;
        }
        Commands::Mutations(args) => {
            let ampcov = Ampcov::from(AmpcovConfig::from_matrix_args(args));
            ampcov.run_matrix(
                CoverageFormat::BaseCount,
                &args.coverage_dir,
                &args.timeline,
                &args.mutations,
                &selector_config(args),
                &args.output,
            )?;
        }
        Commands::Total(args) => {
            let ampcov = Ampcov::from(AmpcovConfig::from_matrix_args(args));
            ampcov.run_matrix(
                CoverageFormat::TotalDepth,
                &args.coverage_dir,
                &args.timeline,
                &args.mutations,
                &selector_config(args),
                &args.output,
            )?;
        }
        Commands::Stats(args) => {
            let ampcov = Ampcov::from(AmpcovConfig::from_stats_args(args));
            ampcov.run_stats(
                &args.base_matrix,
                &args.total_matrix,
                &args.frequencies,
                &args.output,
                args.table,
            )?;
        }
    }

    Ok(())
}

fn selector_config(args: &crate::terminal::MatrixArgs) -> SelectorConfig {
    SelectorConfig {
        start: args.start,
        end: args.end,
        location: args.location.clone(),
        protocol: args.proto.clone(),
    }
}
