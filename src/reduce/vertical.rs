//! Depth-bounded vertical integration and averaging
//!
//! Levels are chosen by their physical depth coordinate, not by index, so a
//! bound of 100 m keeps every level centred at or above 100 m whatever the
//! storage order of the depth axis.

use super::operations::{Accumulator, ReducedSet, ReductionMode, VerticalSpec};
use crate::align::{AlignedWeight, AxisRole, DimensionAligner};
use crate::errors::{ReduceError, Result};
use crate::labelled::{Dataset, LabelledArray};
use tracing::{debug, warn};

/// Indices of `depths` lying at or above `bound` meters.
///
/// With no bound every index is selected.
///
/// # Errors
///
/// [`ReduceError::EmptySelection`] when the bound excludes every level.
pub fn select_depths(depths: &[f64], bound: Option<f64>, axis: &str) -> Result<Vec<usize>> {
    let Some(bound) = bound else {
        return Ok((0..depths.len()).collect());
    };
    let selected: Vec<usize> = depths
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d <= bound)
        .map(|(i, _)| i)
        .collect();
    if selected.is_empty() {
        return Err(ReduceError::EmptySelection {
            axis: axis.to_string(),
            bound,
        });
    }
    Ok(selected)
}

/// Reduces one variable along `depth_axis`.
///
/// Variables without the depth axis are returned unchanged. When
/// `upper_bound` is set the variable must carry depth values on that axis.
pub fn reduce_variable(
    data: &LabelledArray,
    weight: &AlignedWeight,
    depth_axis: &str,
    upper_bound: Option<f64>,
    mode: ReductionMode,
) -> Result<LabelledArray> {
    let Some(full) = data.len_of(depth_axis) else {
        debug!(variable = data.name(), axis = depth_axis, "no depth axis, passing through");
        return Ok(data.clone());
    };

    let indices = match upper_bound {
        None => (0..full).collect(),
        Some(_) => {
            let depths = data
                .coord(depth_axis)
                .and_then(|c| c.values())
                .ok_or_else(|| ReduceError::MissingDimension {
                    role: format!("depth coordinate on '{depth_axis}'"),
                    context: format!("variable '{}'", data.name()),
                })?;
            select_depths(depths, upper_bound, depth_axis)?
        }
    };

    let selected_data;
    let selected_weight;
    let (data, weight) = if indices.len() == full {
        (data, weight)
    } else {
        debug!(
            variable = data.name(),
            levels = indices.len(),
            of = full,
            "restricting depth range"
        );
        selected_data = data.select(depth_axis, &indices)?;
        selected_weight = if weight.len_of(depth_axis) == Some(full) {
            weight.select(depth_axis, &indices)?
        } else {
            weight.clone()
        };
        (&selected_data, &selected_weight)
    };

    let axis = data.require_axis(depth_axis, AxisRole::Depth.as_str())?;
    let view = weight.conform(data.dims(), data.shape())?;
    let values = Accumulator::from_cells(data.view(), &view)
        .sum_axes(&[axis])
        .finish(mode);
    data.reduced(&[axis], values)
}

/// Reduces every variable named in `spec`.
///
/// Variables absent from `dataset` are logged and recorded as skipped; a
/// variable whose own reduction fails is logged and recorded as failed, and
/// the remaining variables are still reduced.
pub fn vertical_reduce(
    dataset: &Dataset,
    weight: &AlignedWeight,
    spec: &VerticalSpec,
) -> Result<ReducedSet> {
    let mut out = ReducedSet::new();
    for variable in &spec.variables {
        let data = match dataset.require(variable) {
            Ok(data) => data,
            Err(e) if !e.is_fatal() => {
                warn!(variable = %variable, reason = %e, "skipping variable");
                out.skip(variable.clone());
                continue;
            }
            Err(e) => return Err(e),
        };
        match reduce_variable(data, weight, &spec.depth_axis, spec.upper_bound, spec.mode) {
            Ok(reduced) => out.push(reduced),
            Err(e) => {
                warn!(variable = %variable, reason = %e, "vertical reduction failed");
                out.fail(variable.clone(), &e);
            }
        }
    }
    Ok(out)
}

/// Aligns a raw mesh weight to each variable and reduces it over depth.
///
/// Axes are found per variable through the aligner's grid convention, so a
/// variable on a grid that disagrees with the mesh fails alone and is
/// recorded in [`ReducedSet::failed`]. Variables without a depth axis pass
/// through unchanged.
///
/// # Errors
///
/// [`ReduceError::MissingDimension`] when none of the requested variables
/// present has a depth-like axis.
pub fn depth_reduce(
    dataset: &Dataset,
    weight: &LabelledArray,
    aligner: &DimensionAligner,
    variables: &[String],
    upper_bound: Option<f64>,
    mode: ReductionMode,
) -> Result<ReducedSet> {
    let convention = aligner.convention();
    let present: Vec<&LabelledArray> = variables.iter().filter_map(|v| dataset.get(v)).collect();
    if !present.is_empty()
        && present
            .iter()
            .all(|v| convention.detect(&v.axis_sizes()).depth.is_none())
    {
        return Err(ReduceError::MissingDimension {
            role: AxisRole::Depth.as_str().to_string(),
            context: "dataset".to_string(),
        });
    }

    let mut out = ReducedSet::new();
    for variable in variables {
        let Some(data) = dataset.get(variable) else {
            warn!(variable = %variable, "variable not found, skipping");
            out.skip(variable.clone());
            continue;
        };
        let sizes = data.axis_sizes();
        let axes = convention.detect(&sizes);
        let reduced = match axes.depth.as_deref() {
            None => Ok(data.clone()),
            Some(depth) => aligner
                .align(weight, &axes, &sizes)
                .and_then(|aligned| reduce_variable(data, &aligned, depth, upper_bound, mode)),
        };
        match reduced {
            Ok(reduced) => out.push(reduced),
            Err(e) => {
                warn!(variable = %variable, reason = %e, "vertical reduction failed");
                out.fail(variable.clone(), &e);
            }
        }
    }
    Ok(out)
}

/// Depth averages over the top `bounds` meters, named `{var}_avg_{N}m`.
///
/// Results are ordered by bound, then by variable. Bounds naming the same
/// whole-meter layer are rejected.
pub fn top_layer_means(
    dataset: &Dataset,
    weight: &AlignedWeight,
    variables: &[String],
    depth_axis: &str,
    bounds: &[f64],
) -> Result<ReducedSet> {
    let mut out = ReducedSet::new();
    for (i, &bound) in bounds.iter().enumerate() {
        if bounds[..i].iter().any(|b| b.trunc() == bound.trunc()) {
            return Err(ReduceError::invalid(format!(
                "depth bounds {bound} and an earlier bound both name the {} m layer",
                bound.trunc()
            )));
        }
        let spec = VerticalSpec::new(variables.iter().cloned(), depth_axis, ReductionMode::Average)
            .with_upper_bound(bound);
        let meters = bound.trunc() as i64;
        let reduced = vertical_reduce(dataset, weight, &spec)?
            .renamed(|name| format!("{name}_avg_{meters}m"));
        out.merge(reduced);
    }
    Ok(out)
}
