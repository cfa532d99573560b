//! Batch configuration
//!
//! A batch is described by one JSON document: which models to run, how the
//! model grid names its axes, the reduction to apply, and the units of work
//! (one per model and year, or per model for multi-year products).
//!
//! ```json
//! {
//!   "models_file": "models.txt",
//!   "threads": 4,
//!   "job": {
//!     "kind": "vertical",
//!     "mesh": "mesh_mask.json",
//!     "weight": "e3t_0",
//!     "variables": ["DIA", "MIX"],
//!     "upper_bound": 100.0,
//!     "mode": "integrate"
//!   },
//!   "units": [
//!     { "model": "TOM12_TJ_LA50", "year": 2010,
//!       "inputs": ["LA50_2010_ptrc.json"], "output": "out/LA50_2010_int.json" }
//!   ]
//! }
//! ```

use crate::align::GridConvention;
use crate::errors::{ReduceError, Result};
use crate::reduce::{LevelSelection, MaskWeighting, ReductionMode, MONTH_AXIS};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level batch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Model list, one name per line; units of unlisted models are skipped.
    #[serde(default)]
    pub models_file: Option<PathBuf>,

    /// Worker threads; all cores when unset.
    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default)]
    pub grid: GridConvention,

    pub job: Job,

    pub units: Vec<WorkUnit>,
}

impl BatchConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| match e {
            ReduceError::Config { message } => ReduceError::Config {
                message: format!("{}: {message}", path.display()),
            },
            other => other,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(config_error("threads must be at least 1"));
        }
        for unit in &self.units {
            if unit.inputs.is_empty() {
                return Err(config_error(format!("unit {} has no inputs", unit.label())));
            }
        }
        self.job.validate()
    }
}

/// One model (and optionally year) to process
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkUnit {
    pub model: String,
    #[serde(default)]
    pub year: Option<i32>,
    /// Input files, joined along time when there are several.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

impl WorkUnit {
    /// `model` or `model/year`, as used in log lines.
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{}/{year}", self.model),
            None => self.model.clone(),
        }
    }
}

/// A region built from mask variables multiplied together
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionSpec {
    pub name: String,
    pub masks: Vec<String>,
}

/// The reduction applied to every unit
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    /// Depth integral or average, optionally bounded
    Vertical {
        mesh: PathBuf,
        #[serde(default = "default_weight")]
        weight: String,
        variables: Vec<String>,
        #[serde(default)]
        upper_bound: Option<f64>,
        mode: ReductionMode,
    },
    /// Depth averages over several top layers
    TopLayers {
        mesh: PathBuf,
        #[serde(default = "default_weight")]
        weight: String,
        variables: Vec<String>,
        bounds: Vec<f64>,
    },
    /// Means over named regions, stacked along a region axis
    Regional {
        masks: PathBuf,
        regions: Vec<RegionSpec>,
        variables: Vec<String>,
        #[serde(default)]
        level: LevelSelection,
        #[serde(default)]
        weighting: MaskWeighting,
        /// Axes kept in the result; the time axis when unset.
        #[serde(default)]
        keep: Option<Vec<String>>,
    },
    /// Mask-weighted means along one zonal axis
    Latitudinal {
        masks: PathBuf,
        mask: Vec<String>,
        variables: Vec<String>,
        #[serde(default = "default_zonal_axis")]
        reduce_axis: String,
    },
    /// Monthly climatology of every time-varying variable
    Climatology {
        #[serde(default = "default_month_axis")]
        output_axis: String,
    },
    /// Streamfunction maximum at one latitude index
    Overturning {
        variable: String,
        select_axis: String,
        index: usize,
        #[serde(default = "default_overturning_name")]
        name: String,
    },
}

fn default_weight() -> String {
    "e3t_0".to_string()
}

fn default_zonal_axis() -> String {
    "x".to_string()
}

fn default_month_axis() -> String {
    MONTH_AXIS.to_string()
}

fn default_overturning_name() -> String {
    "AMOC".to_string()
}

fn config_error(message: impl Into<String>) -> ReduceError {
    ReduceError::Config {
        message: message.into(),
    }
}

impl Job {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Job::Vertical { .. } => "vertical",
            Job::TopLayers { .. } => "top_layers",
            Job::Regional { .. } => "regional",
            Job::Latitudinal { .. } => "latitudinal",
            Job::Climatology { .. } => "climatology",
            Job::Overturning { .. } => "overturning",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Job::Vertical {
                variables,
                upper_bound,
                ..
            } => {
                require_variables(variables)?;
                if let Some(bound) = upper_bound {
                    require_finite_bound(*bound)?;
                }
            }
            Job::TopLayers {
                variables, bounds, ..
            } => {
                require_variables(variables)?;
                if bounds.is_empty() {
                    return Err(config_error("top_layers job needs at least one bound"));
                }
                for (i, bound) in bounds.iter().enumerate() {
                    require_finite_bound(*bound)?;
                    if bounds[..i].iter().any(|b| b.trunc() == bound.trunc()) {
                        return Err(config_error(format!(
                            "depth bound {bound} names the same {} m layer as an earlier bound",
                            bound.trunc()
                        )));
                    }
                }
            }
            Job::Regional {
                regions, variables, ..
            } => {
                require_variables(variables)?;
                if regions.is_empty() {
                    return Err(config_error("regional job needs at least one region"));
                }
                for (i, region) in regions.iter().enumerate() {
                    if region.masks.is_empty() {
                        return Err(config_error(format!("region '{}' lists no masks", region.name)));
                    }
                    if regions[..i].iter().any(|r| r.name == region.name) {
                        return Err(config_error(format!("region '{}' listed twice", region.name)));
                    }
                }
            }
            Job::Latitudinal {
                mask, variables, ..
            } => {
                require_variables(variables)?;
                if mask.is_empty() {
                    return Err(config_error("latitudinal job lists no masks"));
                }
            }
            Job::Climatology { .. } | Job::Overturning { .. } => {}
        }
        Ok(())
    }
}

fn require_variables(variables: &[String]) -> Result<()> {
    if variables.is_empty() {
        return Err(config_error("no variables requested"));
    }
    Ok(())
}

fn require_finite_bound(bound: f64) -> Result<()> {
    if !bound.is_finite() || bound < 0.0 {
        return Err(config_error(format!("depth bound {bound} is not a depth in meters")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTICAL: &str = r#"{
        "models_file": "models.txt",
        "job": {
            "kind": "vertical",
            "mesh": "mesh.json",
            "variables": ["DIA"],
            "upper_bound": 100.0,
            "mode": "integrate"
        },
        "units": [
            {"model": "LA50", "year": 2010, "inputs": ["a.json"], "output": "b.json"}
        ]
    }"#;

    #[test]
    fn parses_vertical_job_with_defaults() {
        let config = BatchConfig::from_json(VERTICAL).unwrap();
        assert_eq!(config.grid, GridConvention::default());
        assert_eq!(config.threads, None);
        assert_eq!(config.units[0].label(), "LA50/2010");
        match &config.job {
            Job::Vertical {
                weight,
                upper_bound,
                mode,
                ..
            } => {
                assert_eq!(weight, "e3t_0");
                assert_eq!(*upper_bound, Some(100.0));
                assert_eq!(*mode, ReductionMode::Integrate);
            }
            other => panic!("unexpected job {other:?}"),
        }
    }

    #[test]
    fn parses_regional_job() {
        let text = r#"{
            "grid": {"data_time": ["ocean_time"]},
            "job": {
                "kind": "regional",
                "masks": "masks.json",
                "regions": [
                    {"name": "GO", "masks": ["csize"]},
                    {"name": "AB", "masks": ["csize", "AB"]}
                ],
                "variables": ["EXP"],
                "level": {"mean": [9, 10]},
                "weighting": "indicator"
            },
            "units": []
        }"#;
        let config = BatchConfig::from_json(text).unwrap();
        assert_eq!(config.grid.data_time, vec!["ocean_time".to_string()]);
        assert_eq!(config.grid.data_depth, GridConvention::default().data_depth);
        assert_eq!(config.job.kind(), "regional");
        match config.job {
            Job::Regional {
                level, weighting, keep, ..
            } => {
                assert_eq!(level, LevelSelection::Mean(vec![9, 10]));
                assert_eq!(weighting, MaskWeighting::Indicator);
                assert_eq!(keep, None);
            }
            other => panic!("unexpected job {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_fields() {
        let text = VERTICAL.replace("\"models_file\"", "\"model_file\"");
        assert!(matches!(
            BatchConfig::from_json(&text),
            Err(ReduceError::JsonError(_))
        ));
    }

    #[test]
    fn rejects_inconsistent_jobs() {
        let text = VERTICAL.replace("100.0", "-5.0");
        assert!(matches!(
            BatchConfig::from_json(&text),
            Err(ReduceError::Config { .. })
        ));

        let text = VERTICAL.replace("[\"DIA\"]", "[]");
        assert!(BatchConfig::from_json(&text).is_err());

        let text = VERTICAL.replace("[\"a.json\"]", "[]");
        assert!(BatchConfig::from_json(&text).is_err());
    }

    #[test]
    fn top_layer_bounds_must_name_distinct_layers() {
        let text = r#"{
            "job": {"kind": "top_layers", "mesh": "mesh.json", "variables": ["CHL"], "bounds": [10.2, 50.0, 10.9]},
            "units": []
        }"#;
        let err = BatchConfig::from_json(text).unwrap_err();
        assert!(matches!(err, ReduceError::Config { .. }));
        assert!(BatchConfig::from_json(&text.replace("10.9", "11.0")).is_ok());
    }

    #[test]
    fn climatology_defaults_to_time_axis() {
        let text = r#"{"job": {"kind": "climatology"}, "units": []}"#;
        let config = BatchConfig::from_json(text).unwrap();
        assert_eq!(
            config.job,
            Job::Climatology {
                output_axis: "time".to_string()
            }
        );
    }
}
