//! Defines command-line interface options using `clap` for the ocean-reduce tool.

use clap::{Args, Parser, Subcommand};
use ocean_reduce::config::RegionSpec;
use ocean_reduce::reduce::{LevelSelection, MaskWeighting, ReductionMode, MONTH_AXIS};
use std::path::PathBuf;

/// Weighted reductions of gridded ocean model output
#[derive(Parser, Debug)]
#[command(name = "ocean-reduce", version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Integrate or average variables over depth
    Vertical(VerticalArgs),
    /// Mean of variables over named regions
    Regional(RegionalArgs),
    /// Monthly climatology of every time-varying variable
    Climatology(ClimatologyArgs),
    /// Run a batch described by a JSON configuration file
    Batch(BatchArgs),
    /// List variables and dimensions of a dataset file
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct VerticalArgs {
    /// Input dataset files, joined along time when several are given
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Mesh file holding the layer thickness field
    #[arg(short, long)]
    pub mesh: PathBuf,

    /// Name of the layer thickness variable in the mesh file
    #[arg(long, default_value = "e3t_0")]
    pub weight: String,

    /// Variables to reduce, comma separated
    #[arg(long = "var", required = true, value_delimiter = ',')]
    pub variables: Vec<String>,

    /// Only layers whose depth is at most this many meters
    #[arg(long)]
    pub upper_bound: Option<f64>,

    /// `integrate` or `average`
    #[arg(long, default_value = "integrate", value_parser = parse_mode)]
    pub mode: ReductionMode,

    /// Output dataset file
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct RegionalArgs {
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// File holding the mask fields
    #[arg(long)]
    pub masks: PathBuf,

    /// Region as NAME=MASK or NAME=MASK*MASK, repeatable; order is kept
    #[arg(long = "region", required = true, value_parser = parse_region)]
    pub regions: Vec<RegionSpec>,

    #[arg(long = "var", required = true, value_delimiter = ',')]
    pub variables: Vec<String>,

    /// Keep a single depth level, by index
    #[arg(long, conflicts_with = "mean_levels")]
    pub level: Option<usize>,

    /// Average these depth level indices first, comma separated
    #[arg(long, value_delimiter = ',')]
    pub mean_levels: Option<Vec<usize>>,

    /// Weight every member cell equally instead of by mask value
    #[arg(long)]
    pub indicator: bool,

    /// Axes kept in the result; defaults to the time axis
    #[arg(long, value_delimiter = ',')]
    pub keep: Option<Vec<String>>,

    #[arg(short, long)]
    pub output: PathBuf,
}

impl RegionalArgs {
    pub fn level_selection(&self) -> LevelSelection {
        match (&self.level, &self.mean_levels) {
            (Some(index), _) => LevelSelection::Index(*index),
            (None, Some(indices)) => LevelSelection::Mean(indices.clone()),
            (None, None) => LevelSelection::All,
        }
    }

    pub fn weighting(&self) -> MaskWeighting {
        if self.indicator {
            MaskWeighting::Indicator
        } else {
            MaskWeighting::Magnitude
        }
    }
}

#[derive(Args, Debug)]
pub struct ClimatologyArgs {
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// Name of the month axis in the output
    #[arg(long, default_value = MONTH_AXIS)]
    pub output_axis: String,

    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Batch configuration file (JSON)
    pub config: PathBuf,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    pub input: PathBuf,

    /// Describe a specific variable (axes, coordinates and size)
    #[arg(long)]
    pub describe: Option<String>,

    /// Compute quick statistics (min/mean/max/std) for a variable
    #[arg(long)]
    pub summary: Option<String>,
}

fn parse_mode(s: &str) -> Result<ReductionMode, String> {
    match s {
        "integrate" => Ok(ReductionMode::Integrate),
        "average" => Ok(ReductionMode::Average),
        _ => Err(format!("Invalid mode '{s}': expected 'integrate' or 'average'.")),
    }
}

fn parse_region(s: &str) -> Result<RegionSpec, String> {
    let (name, masks) = s
        .split_once('=')
        .ok_or_else(|| "Invalid format: Expected '<name>=<mask>[*<mask>...]'.".to_string())?;
    let name = name.trim();
    let masks: Vec<String> = masks
        .split('*')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    if name.is_empty() || masks.is_empty() {
        return Err(format!("Invalid region '{s}': name and at least one mask are required."));
    }
    Ok(RegionSpec {
        name: name.to_string(),
        masks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn region_argument_splits_mask_product() {
        let region = parse_region("AB=csize*AB").unwrap();
        assert_eq!(region.name, "AB");
        assert_eq!(region.masks, vec!["csize".to_string(), "AB".to_string()]);
        assert!(parse_region("AB").is_err());
        assert!(parse_region("AB=").is_err());
        assert!(parse_region("=csize").is_err());
    }

    #[test]
    fn mode_argument() {
        assert_eq!(parse_mode("average").unwrap(), ReductionMode::Average);
        assert!(parse_mode("sum").is_err());
    }

    #[test]
    fn regional_level_options() {
        let cli = Cli::try_parse_from([
            "ocean-reduce", "regional", "-i", "a.json", "--masks", "m.json",
            "--region", "GO=csize", "--var", "EXP", "--mean-levels", "9,10",
            "--indicator", "-o", "out.json",
        ])
        .unwrap();
        let Command::Regional(args) = cli.command else {
            panic!("expected regional subcommand");
        };
        assert_eq!(args.level_selection(), LevelSelection::Mean(vec![9, 10]));
        assert_eq!(args.weighting(), MaskWeighting::Indicator);
    }
}
