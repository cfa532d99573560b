//! Entry point for the ocean-reduce tool.
//! Handles CLI parsing and logging setup, then dispatches to the library.

mod cli;
mod logging;

use std::path::Path;
use std::process;

use clap::Parser;
use ocean_reduce::batch::{run_batch, BatchReport};
use ocean_reduce::config::{BatchConfig, Job, WorkUnit};
use ocean_reduce::metadata::{compute_variable_summary, describe_variable, list_variables_and_dimensions};
use ocean_reduce::parallel::{ParallelConfig, ParallelInfo};
use ocean_reduce::store::{DatasetSource, JsonStore};
use ocean_reduce::Result;

use crate::cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

/// Returns `false` when some unit failed.
fn run(cli: Cli) -> Result<bool> {
    let (job, inputs, output) = match cli.command {
        Command::Batch(args) => {
            let config = BatchConfig::from_file(&args.config)?;
            let threads = cli.threads.or(config.threads);
            return run_config(&config, threads);
        }
        Command::Inspect(args) => {
            inspect(&args.input, args.describe.as_deref(), args.summary.as_deref())?;
            return Ok(true);
        }
        Command::Vertical(args) => (
            Job::Vertical {
                mesh: args.mesh,
                weight: args.weight,
                variables: args.variables,
                upper_bound: args.upper_bound,
                mode: args.mode,
            },
            args.input,
            args.output,
        ),
        Command::Regional(args) => {
            let level = args.level_selection();
            let weighting = args.weighting();
            (
                Job::Regional {
                    masks: args.masks,
                    regions: args.regions,
                    variables: args.variables,
                    level,
                    weighting,
                    keep: args.keep,
                },
                args.input,
                args.output,
            )
        }
        Command::Climatology(args) => (
            Job::Climatology {
                output_axis: args.output_axis,
            },
            args.input,
            args.output,
        ),
    };

    let model = inputs
        .first()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let config = BatchConfig {
        models_file: None,
        threads: cli.threads,
        grid: Default::default(),
        job,
        units: vec![WorkUnit {
            model,
            year: None,
            inputs,
            output,
        }],
    };
    run_config(&config, cli.threads)
}

fn run_config(config: &BatchConfig, threads: Option<usize>) -> Result<bool> {
    ParallelConfig::new(threads).setup_global_pool()?;
    ParallelInfo::collect().log();

    let store = JsonStore::new();
    let report = run_batch(config, &store, &store)?;
    print_report(&report);
    Ok(report.is_success())
}

fn print_report(report: &BatchReport) {
    for path in &report.succeeded {
        println!("Saved result to {}", path.display());
    }
    for skipped in &report.skipped_variables {
        println!(
            "Skipped variable {} for {}{}",
            skipped.variable,
            skipped.model,
            skipped.year.map(|y| format!("/{y}")).unwrap_or_default()
        );
    }
    for failure in &report.failed_variables {
        eprintln!(
            "Failed variable {} for {}{}: {}",
            failure.variable,
            failure.model,
            failure.year.map(|y| format!("/{y}")).unwrap_or_default(),
            failure.reason
        );
    }
    for failure in &report.failed {
        eprintln!(
            "Failed {}{}: {}",
            failure.model,
            failure.year.map(|y| format!("/{y}")).unwrap_or_default(),
            failure.reason
        );
    }
    if !report.skipped_units.is_empty() {
        println!("Units not in model list: {}", report.skipped_units.join(", "));
    }
}

fn inspect(input: &Path, describe: Option<&str>, summary: Option<&str>) -> Result<()> {
    let dataset = JsonStore::new().load(input)?;
    println!("Successfully opened dataset file: {}", input.display());
    if describe.is_none() && summary.is_none() {
        return list_variables_and_dimensions(&dataset);
    }
    if let Some(var) = describe {
        describe_variable(&dataset, var)?;
    }
    if let Some(var) = summary {
        compute_variable_summary(&dataset, var)?;
    }
    Ok(())
}
