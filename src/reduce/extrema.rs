//! Missing-aware maxima, used for overturning strength

use crate::errors::Result;
use crate::labelled::LabelledArray;
use ndarray::{ArrayD, Axis};

fn nan_max_axis(data: &ArrayD<f64>, axis: usize) -> ArrayD<f64> {
    data.fold_axis(Axis(axis), f64::NAN, |&acc, &x| {
        if x.is_nan() || (!acc.is_nan() && acc >= x) {
            acc
        } else {
            x
        }
    })
}

/// Maximum over the axes at positions `axes`, ignoring missing values.
///
/// A position where every value is missing stays missing.
pub fn nan_max(data: &LabelledArray, axes: &[usize]) -> Result<LabelledArray> {
    let mut sorted = axes.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();
    let mut values = data.data().clone();
    for &axis in &sorted {
        values = nan_max_axis(&values, axis);
    }
    data.reduced(&sorted, values)
}

/// Overturning strength: the maximum of a streamfunction at one latitude.
///
/// Takes index `index` along `select_axis`, then the maximum over every
/// remaining axis except `time_axis`, so singleton axes left by the
/// selection vanish with the rest.
pub fn overturning_maximum(
    data: &LabelledArray,
    time_axis: &str,
    select_axis: &str,
    index: usize,
) -> Result<LabelledArray> {
    data.require_axis(time_axis, "time-like")?;
    let section = data.isel(select_axis, index)?;
    let axes: Vec<usize> = section
        .dims()
        .iter()
        .enumerate()
        .filter(|(_, d)| d.as_str() != time_axis)
        .map(|(i, _)| i)
        .collect();
    nan_max(&section, &axes)
}
