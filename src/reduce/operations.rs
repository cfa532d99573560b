//! Core reduction types and the shared weighted accumulator
//!
//! This module defines the parameters of a reduction request, the result
//! collection handed back to callers, and the missing-aware accumulation
//! every weighted reduction is built on.

use crate::errors::{ReduceError, Result};
use crate::labelled::{Dataset, LabelledArray};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Zip};
use serde::Deserialize;

/// Normalization applied after the weighted sum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReductionMode {
    /// Weighted sum, e.g. concentration x meters
    Integrate,
    /// Weighted sum divided by the total weight
    Average,
}

impl ReductionMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integrate => "integrate",
            Self::Average => "average",
        }
    }
}

/// How a region mask's values enter a masked mean
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskWeighting {
    /// Mask values > 0 are used as weights (cell area, cell size)
    #[default]
    Magnitude,
    /// Mask values > 0 only mark membership; members weigh equally
    Indicator,
}

impl MaskWeighting {
    /// Weight of a cell with mask value `m`; `NaN` excludes the cell.
    pub(crate) fn weight(self, m: f64) -> f64 {
        if m > 0.0 {
            match self {
                Self::Magnitude => m,
                Self::Indicator => 1.0,
            }
        } else {
            f64::NAN
        }
    }
}

/// Parameters of a vertical (depth) reduction
#[derive(Debug, Clone, PartialEq)]
pub struct VerticalSpec {
    /// Variables to reduce, in output order
    pub variables: Vec<String>,
    /// Name of the data's depth axis
    pub depth_axis: String,
    /// Keep levels whose depth is <= this many meters; `None` keeps all
    pub upper_bound: Option<f64>,
    pub mode: ReductionMode,
}

impl VerticalSpec {
    /// Full-column reduction of `variables` along `depth_axis`.
    pub fn new<S: Into<String>>(
        variables: impl IntoIterator<Item = S>,
        depth_axis: impl Into<String>,
        mode: ReductionMode,
    ) -> Self {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
            depth_axis: depth_axis.into(),
            upper_bound: None,
            mode,
        }
    }

    /// Restricts the reduction to depths <= `meters`.
    pub fn with_upper_bound(mut self, meters: f64) -> Self {
        self.upper_bound = Some(meters);
        self
    }
}

/// A requested variable whose own reduction failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedVariable {
    pub variable: String,
    pub reason: String,
}

/// Named reduction results plus the variables skipped or failed along the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReducedSet {
    arrays: Vec<LabelledArray>,
    skipped: Vec<String>,
    failed: Vec<FailedVariable>,
}

impl ReducedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a result, replacing any earlier result of the same name.
    pub fn push(&mut self, array: LabelledArray) {
        match self.arrays.iter_mut().find(|a| a.name() == array.name()) {
            Some(slot) => *slot = array,
            None => self.arrays.push(array),
        }
    }

    /// Records a requested variable that was not present.
    pub fn skip(&mut self, variable: impl Into<String>) {
        let variable = variable.into();
        if !self.skipped.contains(&variable) {
            self.skipped.push(variable);
        }
    }

    /// Records a variable whose reduction raised; the other results stand.
    pub fn fail(&mut self, variable: impl Into<String>, reason: &ReduceError) {
        let failure = FailedVariable {
            variable: variable.into(),
            reason: reason.to_string(),
        };
        if !self.failed.contains(&failure) {
            self.failed.push(failure);
        }
    }

    pub fn get(&self, name: &str) -> Option<&LabelledArray> {
        self.arrays.iter().find(|a| a.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.arrays.iter().map(LabelledArray::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelledArray> {
        self.arrays.iter()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn failed(&self) -> &[FailedVariable] {
        &self.failed
    }

    /// Renames every result with `rename(original_name)`.
    pub fn renamed(self, rename: impl Fn(&str) -> String) -> Self {
        Self {
            arrays: self
                .arrays
                .into_iter()
                .map(|a| {
                    let name = rename(a.name());
                    a.with_name(name)
                })
                .collect(),
            skipped: self.skipped,
            failed: self.failed,
        }
    }

    /// Appends the results, skips and failures of `other`.
    pub fn merge(&mut self, other: ReducedSet) {
        for array in other.arrays {
            self.push(array);
        }
        for variable in other.skipped {
            self.skip(variable);
        }
        for failure in other.failed {
            if !self.failed.contains(&failure) {
                self.failed.push(failure);
            }
        }
    }

    pub fn into_dataset(self) -> Dataset {
        Dataset::from_arrays(self.arrays)
    }
}

impl FromIterator<LabelledArray> for ReducedSet {
    fn from_iter<I: IntoIterator<Item = LabelledArray>>(iter: I) -> Self {
        let mut set = Self::new();
        for array in iter {
            set.push(array);
        }
        set
    }
}

/// Missing-aware running sums of a weighted reduction
///
/// A cell contributes only when both its value and its weight are finite.
/// `count` tracks contributing cells so an all-missing selection stays
/// missing instead of collapsing to zero.
#[derive(Debug, Clone)]
pub(crate) struct Accumulator {
    weighted: ArrayD<f64>,
    weight: ArrayD<f64>,
    count: ArrayD<f64>,
}

impl Accumulator {
    /// Per-cell contributions of `data` under `weight` (broadcast to `data`).
    pub(crate) fn from_cells(data: ArrayViewD<'_, f64>, weight: &ArrayViewD<'_, f64>) -> Self {
        let shape = data.raw_dim();
        let mut weighted: ArrayD<f64> = ArrayD::zeros(shape.clone());
        let mut total: ArrayD<f64> = ArrayD::zeros(shape.clone());
        let mut count: ArrayD<f64> = ArrayD::zeros(shape);
        Zip::from(&mut weighted)
            .and(&mut total)
            .and(&mut count)
            .and(&data)
            .and_broadcast(weight)
            .for_each(|s, t, c, &x, &w| {
                if x.is_finite() && w.is_finite() {
                    *s = x * w;
                    *t = w;
                    *c = 1.0;
                }
            });
        Self {
            weighted,
            weight: total,
            count,
        }
    }

    /// Unit weights: every finite value counts once.
    pub(crate) fn unweighted(data: ArrayViewD<'_, f64>) -> Self {
        let ones = ArrayD::from_elem(IxDyn(&vec![1; data.ndim()]), 1.0);
        Self::from_cells(data, &ones.view())
    }

    /// Sums out the axes at positions `axes`.
    pub(crate) fn sum_axes(mut self, axes: &[usize]) -> Self {
        let mut axes = axes.to_vec();
        axes.sort_unstable_by(|a, b| b.cmp(a));
        axes.dedup();
        for axis in axes {
            self.weighted = self.weighted.sum_axis(Axis(axis));
            self.weight = self.weight.sum_axis(Axis(axis));
            self.count = self.count.sum_axis(Axis(axis));
        }
        self
    }

    /// `weighted / weight`, missing where the total weight is zero.
    pub(crate) fn average(&self) -> ArrayD<f64> {
        Zip::from(&self.weighted)
            .and(&self.weight)
            .map_collect(|&s, &t| if t == 0.0 { f64::NAN } else { s / t })
    }

    /// `weighted`, missing where nothing contributed.
    pub(crate) fn integral(&self) -> ArrayD<f64> {
        Zip::from(&self.weighted)
            .and(&self.count)
            .map_collect(|&s, &c| if c == 0.0 { f64::NAN } else { s })
    }

    pub(crate) fn finish(&self, mode: ReductionMode) -> ArrayD<f64> {
        match mode {
            ReductionMode::Integrate => self.integral(),
            ReductionMode::Average => self.average(),
        }
    }
}

/// Missing-aware mean of `data` over the axes at positions `axes`.
pub(crate) fn nan_mean(data: &LabelledArray, axes: &[usize]) -> Result<LabelledArray> {
    let mean = Accumulator::unweighted(data.view()).sum_axes(axes).average();
    data.reduced(axes, mean)
}
