//! Alignment of weight fields against data fields
//!
//! Mesh files name their axes differently from model output (`t`/`z` versus
//! `time_counter`/`deptht` on ORCA grids) and often carry a singleton time
//! axis. [`DimensionAligner`] renames recognised axes through a configurable
//! [`GridConvention`], collapses a singleton time axis, and records a
//! broadcast over the data's time axis so the weight can be multiplied
//! element-wise against the data without silent misalignment.

use crate::errors::{ReduceError, Result};
use crate::labelled::{AxisSizes, Dataset, DimensionInfo, LabelledArray};
use ndarray::{ArrayViewD, Axis};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Role an axis plays during alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisRole {
    Time,
    Depth,
}

impl AxisRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time-like",
            Self::Depth => "depth-like",
        }
    }
}

/// Axis naming conventions of a model grid
///
/// Weight-side aliases name the axes of mesh/weight files; data-side aliases
/// name the axes of model output, in order of preference.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConvention {
    pub weight_time: Vec<String>,
    pub weight_depth: Vec<String>,
    pub data_time: Vec<String>,
    pub data_depth: Vec<String>,
}

impl Default for GridConvention {
    /// NEMO/ORCA naming
    fn default() -> Self {
        let owned = |names: &[&str]| -> Vec<String> { names.iter().map(|s| (*s).to_string()).collect() };
        Self {
            weight_time: owned(&["t"]),
            weight_depth: owned(&["z"]),
            data_time: owned(&["time_counter", "time", "t"]),
            data_depth: owned(&["deptht", "depthu", "depthv", "depthw", "depth", "nav_lev", "z"]),
        }
    }
}

impl GridConvention {
    /// Role of an axis found on a weight field.
    ///
    /// Axes already carrying a data-side name are recognised as well, which
    /// keeps alignment idempotent.
    pub fn weight_role(&self, axis: &str) -> Option<AxisRole> {
        let has = |names: &[String]| names.iter().any(|n| n == axis);
        if has(&self.weight_time) || has(&self.data_time) {
            Some(AxisRole::Time)
        } else if has(&self.weight_depth) || has(&self.data_depth) {
            Some(AxisRole::Depth)
        } else {
            None
        }
    }

    /// Finds the data's time-like and depth-like axes among `sizes`.
    pub fn detect(&self, sizes: &AxisSizes) -> DataAxes {
        let first = |names: &[String]| {
            names
                .iter()
                .find(|n| sizes.contains(n.as_str()))
                .cloned()
        };
        DataAxes {
            time: first(&self.data_time),
            depth: first(&self.data_depth),
        }
    }

    /// Detects axes across every variable of `dataset`.
    pub fn detect_in(&self, dataset: &Dataset) -> Result<DataAxes> {
        Ok(self.detect(&dataset.axis_sizes()?))
    }
}

/// The data's actual axis name for each role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataAxes {
    pub time: Option<String>,
    pub depth: Option<String>,
}

impl DataAxes {
    pub fn new(time: Option<&str>, depth: Option<&str>) -> Self {
        Self {
            time: time.map(str::to_string),
            depth: depth.map(str::to_string),
        }
    }

    pub fn get(&self, role: AxisRole) -> Option<&str> {
        match role {
            AxisRole::Time => self.time.as_deref(),
            AxisRole::Depth => self.depth.as_deref(),
        }
    }

    /// Axis name for `role`, or [`ReduceError::MissingDimension`].
    pub fn require(&self, role: AxisRole, context: &str) -> Result<&str> {
        self.get(role).ok_or_else(|| ReduceError::MissingDimension {
            role: role.as_str().to_string(),
            context: context.to_string(),
        })
    }
}

/// A weight field ready to be broadcast against data
///
/// A weight that had no time axis while the data does keeps its compact
/// storage; the time axis is recorded in `broadcast_axis` and only expanded
/// by [`AlignedWeight::materialize`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedWeight {
    field: LabelledArray,
    broadcast_axis: Option<DimensionInfo>,
}

impl AlignedWeight {
    /// Wraps a field that already uses the data's axis names.
    pub fn from_field(field: LabelledArray) -> Self {
        Self {
            field,
            broadcast_axis: None,
        }
    }

    pub fn field(&self) -> &LabelledArray {
        &self.field
    }

    pub fn broadcast_axis(&self) -> Option<&DimensionInfo> {
        self.broadcast_axis.as_ref()
    }

    /// Axis names, the broadcast axis first.
    pub fn dims(&self) -> Vec<&str> {
        self.broadcast_axis
            .iter()
            .map(|b| b.name.as_str())
            .chain(self.field.dims().iter().map(String::as_str))
            .collect()
    }

    pub fn len_of(&self, axis: &str) -> Option<usize> {
        match &self.broadcast_axis {
            Some(b) if b.name == axis => Some(b.length),
            _ => self.field.len_of(axis),
        }
    }

    /// Restricts the weight to `indices` along `axis` when it has that axis.
    pub fn select(&self, axis: &str, indices: &[usize]) -> Result<Self> {
        if !self.field.has_axis(axis) {
            return Ok(self.clone());
        }
        Ok(Self {
            field: self.field.select(axis, indices)?,
            broadcast_axis: self.broadcast_axis.clone(),
        })
    }

    /// Physically expands the broadcast axis, if any, as the leading axis.
    pub fn materialize(&self) -> Result<LabelledArray> {
        match &self.broadcast_axis {
            Some(b) => self
                .field
                .insert_axis(0, &b.name, b.length, b.coord.clone()),
            None => Ok(self.field.clone()),
        }
    }

    /// Reshapes the weight into a view with one axis per data axis.
    ///
    /// Every axis of the returned view has either the data's length or
    /// length one, so it can be broadcast against data of shape `shape`.
    /// Weight axes absent from the data must be singletons.
    ///
    /// # Errors
    ///
    /// [`ReduceError::ShapeMismatch`] when a shared axis disagrees in length
    /// or a non-singleton weight axis has no counterpart in the data.
    pub fn conform(&self, dims: &[String], shape: &[usize]) -> Result<ArrayViewD<'_, f64>> {
        if let Some(b) = &self.broadcast_axis {
            if let Some(j) = dims.iter().position(|d| d == &b.name) {
                if shape[j] != b.length {
                    return Err(ReduceError::shape_mismatch(
                        format!("weight '{}'", self.field.name()),
                        b.name.clone(),
                        b.length,
                        shape[j],
                    ));
                }
            }
        }

        broadcast_view(&self.field, dims, shape)
    }
}

/// Reshapes `field` into a view with one axis per entry of `dims`.
///
/// Shared axes keep their values and must have the data's length or length
/// one; data axes the field lacks become length-one axes; field axes the data
/// lacks must be singletons and are dropped. The returned view broadcasts
/// against data of shape `shape`.
///
/// # Errors
///
/// [`ReduceError::ShapeMismatch`] for any axis that cannot be reconciled.
pub fn broadcast_view<'a>(
    field: &'a LabelledArray,
    dims: &[String],
    shape: &[usize],
) -> Result<ArrayViewD<'a, f64>> {
    let context = format!("'{}'", field.name());
    if dims.len() != shape.len() {
        return Err(ReduceError::invalid(format!(
            "{} axis names for a shape of rank {}",
            dims.len(),
            shape.len()
        )));
    }
    let mut view = field.view();
    let mut names: Vec<String> = field.dims().to_vec();
    for k in (0..names.len()).rev() {
        if dims.contains(&names[k]) {
            continue;
        }
        let length = view.len_of(Axis(k));
        if length != 1 {
            return Err(ReduceError::shape_mismatch(context, names[k].clone(), 1, length));
        }
        view = view.index_axis_move(Axis(k), 0);
        names.remove(k);
    }

    let positions: Vec<usize> = names
        .iter()
        .map(|n| dims.iter().position(|d| d == n).unwrap_or(usize::MAX))
        .collect();
    for (k, &j) in positions.iter().enumerate() {
        let length = view.len_of(Axis(k));
        if length != 1 && length != shape[j] {
            return Err(ReduceError::shape_mismatch(
                context,
                names[k].clone(),
                shape[j],
                length,
            ));
        }
    }

    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by_key(|&k| positions[k]);
    let mut view = view.permuted_axes(order);
    for (j, d) in dims.iter().enumerate() {
        if !names.contains(d) {
            view = view.insert_axis(Axis(j));
        }
    }
    Ok(view)
}

/// Aligns weight fields to data according to a [`GridConvention`]
#[derive(Debug, Clone, Default)]
pub struct DimensionAligner {
    convention: GridConvention,
}

impl DimensionAligner {
    pub fn new(convention: GridConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> &GridConvention {
        &self.convention
    }

    /// Aligns `weight` to data whose role axes are `axes` and whose axis
    /// lengths are `target`.
    ///
    /// Recognised weight axes are renamed to the data's names, a singleton
    /// time axis is dropped, and a missing time axis is recorded as a
    /// broadcast over the data's time axis. Inputs are not mutated.
    ///
    /// # Errors
    ///
    /// - [`ReduceError::InvalidWeight`] for a negative weight value
    /// - [`ReduceError::ShapeMismatch`] when a non-singleton weight axis
    ///   shares a name with a data axis of a different length
    pub fn align(
        &self,
        weight: &LabelledArray,
        axes: &DataAxes,
        target: &AxisSizes,
    ) -> Result<AlignedWeight> {
        let context = format!("weight '{}'", weight.name());
        if let Some(&value) = weight.data().iter().find(|v| v.is_finite() && **v < 0.0) {
            return Err(ReduceError::InvalidWeight { context, value });
        }

        let mut mapping = HashMap::new();
        let mut time_axis: Option<String> = None;
        for name in weight.dims() {
            let Some(role) = self.convention.weight_role(name) else {
                continue;
            };
            let renamed = axes.get(role).unwrap_or(name).to_string();
            if role == AxisRole::Time {
                time_axis = Some(renamed.clone());
            }
            if &renamed != name {
                mapping.insert(name.clone(), renamed);
            }
        }
        let mut field = if mapping.is_empty() {
            weight.clone()
        } else {
            debug!(weight = weight.name(), ?mapping, "renaming weight axes");
            weight.rename_axes(&mapping)?
        };

        if let Some(t) = &time_axis {
            if field.len_of(t) == Some(1) {
                debug!(weight = weight.name(), axis = %t, "dropping singleton time axis");
                field = field.squeeze(t)?;
                time_axis = None;
            }
        }

        let mut broadcast_axis = None;
        if time_axis.is_none() {
            if let Some(info) = axes.time.as_deref().and_then(|t| target.get(t)) {
                debug!(
                    weight = weight.name(),
                    axis = %info.name,
                    length = info.length,
                    "broadcasting weight over time"
                );
                broadcast_axis = Some(info.clone());
            }
        }

        for (name, &length) in field.dims().iter().zip(field.shape()) {
            if length <= 1 {
                continue;
            }
            if let Some(expected) = target.len_of(name) {
                if expected != length {
                    return Err(ReduceError::shape_mismatch(context, name.clone(), expected, length));
                }
            }
        }

        Ok(AlignedWeight {
            field,
            broadcast_axis,
        })
    }

    /// Aligns `weight` against every variable of `dataset`.
    pub fn align_to_dataset(&self, weight: &LabelledArray, dataset: &Dataset) -> Result<AlignedWeight> {
        let sizes = dataset.axis_sizes()?;
        let axes = self.convention.detect(&sizes);
        self.align(weight, &axes, &sizes)
    }
}
