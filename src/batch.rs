//! Multi-model, multi-year batch driver
//!
//! Each [`WorkUnit`] is loaded, reduced and written independently. Units run
//! in parallel on the global Rayon pool; a failing unit is logged with its
//! model, year and reason and never stops the others. Output is written only
//! once a unit's reduction has fully succeeded.

use crate::align::{AlignedWeight, AxisRole, DataAxes, DimensionAligner};
use crate::config::{BatchConfig, Job, WorkUnit};
use crate::errors::{ReduceError, Result};
use crate::labelled::{Dataset, LabelledArray};
use crate::reduce::{
    climatology_all, depth_reduce, latitudinal_profiles, overturning_maximum, regional_reduce_all,
    top_layer_means, FailedVariable, LevelSelection, MaskWeighting, ReducedSet, ReductionMode,
    Region,
};
use crate::store::{Attributes, DatasetSink, DatasetSource};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reads model names, one per line, skipping blank lines and `#` comments.
///
/// A missing or unreadable file is logged and yields an empty list.
pub fn read_model_list(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let models: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect();
            info!(path = %path.display(), count = models.len(), "loaded model list");
            models
        }
        Err(e) => {
            warn!(path = %path.display(), reason = %e, "cannot read model list");
            Vec::new()
        }
    }
}

/// A unit that raised before producing a complete result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub model: String,
    pub year: Option<i32>,
    pub reason: String,
}

/// A requested variable a unit's input did not contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedVariable {
    pub model: String,
    pub year: Option<i32>,
    pub variable: String,
}

/// A variable whose reduction failed in a unit that still wrote its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableFailure {
    pub model: String,
    pub year: Option<i32>,
    pub variable: String,
    pub reason: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Outputs written, in unit order
    pub succeeded: Vec<PathBuf>,
    pub skipped_variables: Vec<SkippedVariable>,
    pub failed_variables: Vec<VariableFailure>,
    pub failed: Vec<UnitFailure>,
    /// Units whose model is not in the model list
    pub skipped_units: Vec<String>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A [`Job`] with its auxiliary mesh or mask fields loaded
#[derive(Debug, Clone)]
pub enum PreparedJob {
    Vertical {
        weight: LabelledArray,
        variables: Vec<String>,
        upper_bound: Option<f64>,
        mode: ReductionMode,
    },
    TopLayers {
        weight: LabelledArray,
        variables: Vec<String>,
        bounds: Vec<f64>,
    },
    Regional {
        regions: Vec<Region>,
        variables: Vec<String>,
        level: LevelSelection,
        weighting: MaskWeighting,
        keep: Option<Vec<String>>,
    },
    Latitudinal {
        mask: LabelledArray,
        variables: Vec<String>,
        reduce_axis: String,
    },
    Climatology {
        output_axis: String,
    },
    Overturning {
        variable: String,
        select_axis: String,
        index: usize,
        name: String,
    },
}

fn mask_product(masks: &Dataset, name: &str, factors: &[String]) -> Result<Region> {
    let fields = factors
        .iter()
        .map(|f| masks.require(f))
        .collect::<Result<Vec<_>>>()?;
    Region::from_product(name, &fields)
}

impl PreparedJob {
    /// Loads the mesh or mask file `job` refers to.
    ///
    /// Errors here concern the whole batch, so they are returned rather than
    /// recorded per unit.
    pub fn prepare<S: DatasetSource + ?Sized>(job: &Job, source: &S) -> Result<Self> {
        Ok(match job {
            Job::Vertical {
                mesh,
                weight,
                variables,
                upper_bound,
                mode,
            } => PreparedJob::Vertical {
                weight: source.load(mesh)?.require(weight)?.clone(),
                variables: variables.clone(),
                upper_bound: *upper_bound,
                mode: *mode,
            },
            Job::TopLayers {
                mesh,
                weight,
                variables,
                bounds,
            } => PreparedJob::TopLayers {
                weight: source.load(mesh)?.require(weight)?.clone(),
                variables: variables.clone(),
                bounds: bounds.clone(),
            },
            Job::Regional {
                masks,
                regions,
                variables,
                level,
                weighting,
                keep,
            } => {
                let masks = source.load(masks)?;
                PreparedJob::Regional {
                    regions: regions
                        .iter()
                        .map(|r| mask_product(&masks, &r.name, &r.masks))
                        .collect::<Result<_>>()?,
                    variables: variables.clone(),
                    level: level.clone(),
                    weighting: *weighting,
                    keep: keep.clone(),
                }
            }
            Job::Latitudinal {
                masks,
                mask,
                variables,
                reduce_axis,
            } => {
                let masks = source.load(masks)?;
                PreparedJob::Latitudinal {
                    mask: mask_product(&masks, "mask", mask)?.mask,
                    variables: variables.clone(),
                    reduce_axis: reduce_axis.clone(),
                }
            }
            Job::Climatology { output_axis } => PreparedJob::Climatology {
                output_axis: output_axis.clone(),
            },
            Job::Overturning {
                variable,
                select_axis,
                index,
                name,
            } => PreparedJob::Overturning {
                variable: variable.clone(),
                select_axis: select_axis.clone(),
                index: *index,
                name: name.clone(),
            },
        })
    }

    /// Variables the job reads; every variable of the dataset when `None`.
    fn variables(&self) -> Option<&[String]> {
        match self {
            PreparedJob::Vertical { variables, .. }
            | PreparedJob::TopLayers { variables, .. }
            | PreparedJob::Regional { variables, .. }
            | PreparedJob::Latitudinal { variables, .. } => Some(variables),
            PreparedJob::Overturning { variable, .. } => Some(std::slice::from_ref(variable)),
            PreparedJob::Climatology { .. } => None,
        }
    }

    /// Runs the reduction on one loaded dataset.
    ///
    /// Requested variables whose axes disagree with the others, or whose own
    /// reduction fails, are recorded in [`ReducedSet::failed`] and the rest
    /// are still reduced.
    pub fn apply(&self, dataset: &Dataset, aligner: &DimensionAligner) -> Result<ReducedSet> {
        let requested: Vec<String> = match self.variables() {
            Some(variables) => variables.to_vec(),
            None => dataset.names().into_iter().map(str::to_string).collect(),
        };
        let (sizes, conflicts) = dataset.axis_sizes_of(&requested);
        let mut out = ReducedSet::new();
        for (variable, e) in &conflicts {
            warn!(variable = %variable, reason = %e, "axes disagree with the other variables");
            out.fail(variable.clone(), e);
        }
        let usable: Vec<String> = requested
            .into_iter()
            .filter(|v| !conflicts.iter().any(|(c, _)| c == v))
            .collect();
        let axes = aligner.convention().detect(&sizes);

        let reduced = match self {
            PreparedJob::Vertical {
                weight,
                upper_bound,
                mode,
                ..
            } => depth_reduce(dataset, weight, aligner, &usable, *upper_bound, *mode)?,
            PreparedJob::TopLayers { weight, bounds, .. } => {
                let depth = axes.require(AxisRole::Depth, "dataset")?;
                let aligned: AlignedWeight = aligner.align(weight, &axes, &sizes)?;
                top_layer_means(dataset, &aligned, &usable, depth, bounds)?
            }
            PreparedJob::Regional {
                regions,
                level,
                weighting,
                keep,
                ..
            } => {
                let leveled = apply_levels(dataset, &usable, level, &axes, &mut out);
                let remaining: Vec<String> = usable
                    .into_iter()
                    .filter(|v| !out.failed().iter().any(|f| &f.variable == v))
                    .collect();
                let keep = match keep {
                    Some(keep) => keep.clone(),
                    None => axes.time.iter().cloned().collect(),
                };
                regional_reduce_all(&leveled, &remaining, regions, &keep, *weighting)?
            }
            PreparedJob::Latitudinal {
                mask, reduce_axis, ..
            } => latitudinal_profiles(dataset, &usable, mask, reduce_axis)?,
            PreparedJob::Climatology { output_axis } => {
                let time = axes.require(AxisRole::Time, "dataset")?;
                let consistent =
                    Dataset::from_arrays(usable.iter().filter_map(|v| dataset.get(v)).cloned());
                climatology_all(&consistent, time, output_axis)
            }
            PreparedJob::Overturning {
                variable,
                select_axis,
                index,
                name,
            } => {
                let data = dataset.require(variable)?;
                let time = axes.require(AxisRole::Time, "dataset")?;
                let max = overturning_maximum(data, time, select_axis, *index)?;
                std::iter::once(max.with_name(name.clone())).collect()
            }
        };
        out.merge(reduced);
        Ok(out)
    }
}

/// Applies the level selection to every present variable.
///
/// A variable the selection cannot apply to is recorded in `out` as failed
/// and left out of the returned dataset.
fn apply_levels(
    dataset: &Dataset,
    variables: &[String],
    level: &LevelSelection,
    axes: &DataAxes,
    out: &mut ReducedSet,
) -> Dataset {
    let mut leveled = Dataset::new();
    for data in variables.iter().filter_map(|v| dataset.get(v)) {
        let selected = match (level, axes.depth.as_deref()) {
            (LevelSelection::All, _) => Ok(data.clone()),
            (_, Some(depth)) => level.apply(data, depth),
            (LevelSelection::Index(_), None) => Ok(data.clone()),
            (LevelSelection::Mean(_), None) => Err(ReduceError::MissingDimension {
                role: AxisRole::Depth.as_str().to_string(),
                context: format!("variable '{}'", data.name()),
            }),
        };
        match selected {
            Ok(selected) => leveled.insert(selected),
            Err(e) => {
                warn!(variable = data.name(), reason = %e, "level selection failed");
                out.fail(data.name(), &e);
            }
        }
    }
    leveled
}

/// Loads a unit's inputs, joining several along the time axis.
pub fn load_unit<S: DatasetSource + ?Sized>(
    unit: &WorkUnit,
    source: &S,
    aligner: &DimensionAligner,
) -> Result<Dataset> {
    let parts = unit
        .inputs
        .iter()
        .map(|path| source.load(path))
        .collect::<Result<Vec<_>>>()?;
    let Some(first) = parts.first() else {
        return Err(ReduceError::invalid(format!("unit {} has no inputs", unit.label())));
    };
    if parts.len() == 1 {
        return Ok(parts.into_iter().next().unwrap_or_default());
    }
    let axes = aligner.convention().detect_in(first)?;
    let time = axes.require(AxisRole::Time, &format!("inputs of {}", unit.label()))?;
    Dataset::concat(&parts, time)
}

/// What a written unit left out
struct UnitSummary {
    skipped: Vec<String>,
    failed: Vec<FailedVariable>,
}

fn process_unit<S, K>(
    unit: &WorkUnit,
    job: &PreparedJob,
    kind: &str,
    aligner: &DimensionAligner,
    source: &S,
    sink: &K,
) -> Result<UnitSummary>
where
    S: DatasetSource + ?Sized,
    K: DatasetSink + ?Sized,
{
    info!(unit = %unit.label(), job = kind, "processing");
    let dataset = load_unit(unit, source, aligner)?;
    let reduced = job.apply(&dataset, aligner)?;
    if reduced.is_empty() {
        let reasons: Vec<String> = reduced
            .failed()
            .iter()
            .map(|f| format!("{}: {}", f.variable, f.reason))
            .collect();
        return Err(ReduceError::invalid(if reasons.is_empty() {
            "none of the requested variables were found".to_string()
        } else {
            format!("no variable could be reduced ({})", reasons.join("; "))
        }));
    }

    let mut attributes = Attributes::new();
    attributes.insert("model".to_string(), unit.model.clone());
    if let Some(year) = unit.year {
        attributes.insert("year".to_string(), year.to_string());
    }
    attributes.insert("reduction".to_string(), kind.to_string());
    let summary = UnitSummary {
        skipped: reduced.skipped().to_vec(),
        failed: reduced.failed().to_vec(),
    };
    sink.write(&reduced.into_dataset(), &attributes, &unit.output)?;
    info!(unit = %unit.label(), output = %unit.output.display(), "saved");
    Ok(summary)
}

/// Runs every unit of `config`, collecting per-unit outcomes.
///
/// Only batch-wide problems, such as an unreadable mesh file, are returned
/// as errors.
pub fn run_batch<S, K>(config: &BatchConfig, source: &S, sink: &K) -> Result<BatchReport>
where
    S: DatasetSource + Sync + ?Sized,
    K: DatasetSink + Sync + ?Sized,
{
    let models = config.models_file.as_deref().map(read_model_list);
    let mut report = BatchReport::default();
    let mut units: Vec<&WorkUnit> = Vec::with_capacity(config.units.len());
    for unit in &config.units {
        match &models {
            Some(models) if !models.contains(&unit.model) => {
                info!(unit = %unit.label(), "model not in model list, skipping");
                report.skipped_units.push(unit.label());
            }
            _ => units.push(unit),
        }
    }
    if units.is_empty() {
        warn!("no units to process");
        return Ok(report);
    }

    let job = PreparedJob::prepare(&config.job, source)?;
    let aligner = DimensionAligner::new(config.grid.clone());
    let kind = config.job.kind();

    let outcomes: Vec<Result<UnitSummary>> = units
        .par_iter()
        .map(|unit| process_unit(unit, &job, kind, &aligner, source, sink))
        .collect();

    for (unit, outcome) in units.into_iter().zip(outcomes) {
        match outcome {
            Ok(summary) => {
                for variable in summary.skipped {
                    warn!(
                        model = %unit.model,
                        year = ?unit.year,
                        variable = %variable,
                        "variable missing from input"
                    );
                    report.skipped_variables.push(SkippedVariable {
                        model: unit.model.clone(),
                        year: unit.year,
                        variable,
                    });
                }
                for failure in summary.failed {
                    warn!(
                        model = %unit.model,
                        year = ?unit.year,
                        variable = %failure.variable,
                        reason = %failure.reason,
                        "variable failed"
                    );
                    report.failed_variables.push(VariableFailure {
                        model: unit.model.clone(),
                        year: unit.year,
                        variable: failure.variable,
                        reason: failure.reason,
                    });
                }
                report.succeeded.push(unit.output.clone());
            }
            Err(e) => {
                warn!(model = %unit.model, year = ?unit.year, reason = %e, "unit failed");
                report.failed.push(UnitFailure {
                    model: unit.model.clone(),
                    year: unit.year,
                    reason: e.to_string(),
                });
            }
        }
    }
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        failed_variables = report.failed_variables.len(),
        skipped = report.skipped_units.len(),
        "batch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn model_list_skips_comments_and_blanks() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# reference runs\nTOM12_TJ_LA50\n\n  TOM12_TJ_LC51  \n#TOM12_old").unwrap();
        assert_eq!(
            read_model_list(file.path()),
            vec!["TOM12_TJ_LA50".to_string(), "TOM12_TJ_LC51".to_string()]
        );
    }

    #[test]
    fn missing_model_list_is_empty() {
        assert!(read_model_list(Path::new("/nonexistent/models.txt")).is_empty());
    }

    #[test]
    fn mean_of_levels_needs_a_depth_axis() {
        let flux = LabelledArray::from_shape_vec("Cflx", ["time_counter", "x"], &[1, 2], vec![1.0, 2.0]).unwrap();
        let ds = Dataset::from_arrays([flux.clone()]);
        let vars = vec!["Cflx".to_string()];
        let axes = DataAxes::new(Some("time_counter"), None);

        let mut out = ReducedSet::new();
        let kept = apply_levels(&ds, &vars, &LevelSelection::Index(0), &axes, &mut out);
        assert_eq!(kept.get("Cflx"), Some(&flux));
        assert!(out.failed().is_empty());

        let kept = apply_levels(&ds, &vars, &LevelSelection::Mean(vec![0, 1]), &axes, &mut out);
        assert!(kept.is_empty());
        assert_eq!(out.failed()[0].variable, "Cflx");
    }

    #[test]
    fn level_failure_keeps_other_variables() {
        let flux = LabelledArray::from_shape_vec("Cflx", ["time_counter", "x"], &[1, 2], vec![1.0, 2.0]).unwrap();
        let exp = LabelledArray::from_shape_vec("EXP", ["time_counter", "deptht", "x"], &[1, 2, 2], vec![1.0, 3.0, 5.0, 7.0])
            .unwrap();
        let ds = Dataset::from_arrays([flux, exp]);
        let mask = LabelledArray::from_shape_vec("GO", ["x"], &[2], vec![1.0, 1.0]).unwrap();
        let job = PreparedJob::Regional {
            regions: vec![Region::new("GO", mask)],
            variables: vec!["Cflx".to_string(), "EXP".to_string()],
            level: LevelSelection::Mean(vec![0, 1]),
            weighting: MaskWeighting::Indicator,
            keep: None,
        };

        let out = job.apply(&ds, &DimensionAligner::default()).unwrap();
        assert_eq!(out.names(), vec!["EXP"]);
        assert_eq!(out.get("EXP").unwrap().data()[[0, 0]], 4.0);
        assert_eq!(out.failed().len(), 1);
        assert_eq!(out.failed()[0].variable, "Cflx");
        assert!(out.skipped().is_empty());
    }
}
