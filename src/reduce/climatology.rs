//! Monthly climatologies
//!
//! Time steps are grouped by calendar month and averaged; the result has one
//! entry per month present, ordered January to December, on an axis whose
//! coordinate values are the month numbers.

use super::operations::{Accumulator, ReducedSet};
use crate::errors::{ReduceError, Result};
use crate::labelled::{Coord, Dataset, LabelledArray};
use chrono::Datelike;
use ndarray::{ArrayD, ArrayViewD, Axis};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Default name of the month axis in climatology output
pub const MONTH_AXIS: &str = "time";

/// Missing-aware monthly mean of `data` along `time_axis`.
///
/// The time axis is replaced by `output_axis`.
///
/// # Errors
///
/// [`ReduceError::MissingDimension`] when `time_axis` is absent or carries no
/// calendar time stamps.
pub fn monthly_climatology(
    data: &LabelledArray,
    time_axis: &str,
    output_axis: &str,
) -> Result<LabelledArray> {
    let axis = data.require_axis(time_axis, "time-like")?;
    let times = data
        .coord(time_axis)
        .and_then(Coord::times)
        .ok_or_else(|| ReduceError::MissingDimension {
            role: format!("calendar time coordinate on '{time_axis}'"),
            context: format!("variable '{}'", data.name()),
        })?;

    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, t) in times.iter().enumerate() {
        groups.entry(t.month()).or_default().push(i);
    }
    debug!(
        variable = data.name(),
        steps = times.len(),
        months = groups.len(),
        "grouping by month"
    );

    let means: Vec<ArrayD<f64>> = groups
        .values()
        .map(|indices| {
            let steps = data.view().select(Axis(axis), indices);
            Accumulator::unweighted(steps.view())
                .sum_axes(&[axis])
                .average()
                .insert_axis(Axis(axis))
        })
        .collect();
    let views: Vec<ArrayViewD<'_, f64>> = means.iter().map(ArrayD::view).collect();
    let stacked = ndarray::concatenate(Axis(axis), &views)?;

    let mut dims = data.dims().to_vec();
    dims[axis] = output_axis.to_string();
    let mut out = LabelledArray::new(data.name(), dims, stacked)?;
    for (j, (name, coord)) in data.dims().iter().zip(data.coords()).enumerate() {
        if j != axis && !coord.is_index() {
            out = out.with_coord(name, coord.clone())?;
        }
    }
    let months = groups.keys().map(|&m| f64::from(m)).collect();
    out.with_coord(output_axis, Coord::Values(months))
}

/// Climatology of every variable with `time_axis`; other variables, such as
/// static grid fields, are carried over unchanged.
///
/// A variable whose climatology cannot be built is recorded as failed and
/// the others are still processed.
pub fn climatology_all(dataset: &Dataset, time_axis: &str, output_axis: &str) -> ReducedSet {
    let mut out = ReducedSet::new();
    for variable in dataset.iter() {
        if !variable.has_axis(time_axis) {
            out.push(variable.clone());
            continue;
        }
        match monthly_climatology(variable, time_axis, output_axis) {
            Ok(climatology) => out.push(climatology),
            Err(e) => {
                warn!(variable = variable.name(), reason = %e, "climatology failed");
                out.fail(variable.name(), &e);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn mid_month(year: i32, month: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn series() -> LabelledArray {
        // Two years of March, January, February (out of order on purpose)
        let times = vec![
            mid_month(2010, 3),
            mid_month(2010, 1),
            mid_month(2010, 2),
            mid_month(2011, 3),
            mid_month(2011, 1),
            mid_month(2011, 2),
        ];
        let values = vec![3.0, 1.0, 2.0, 5.0, f64::NAN, 4.0];
        LabelledArray::from_shape_vec("NO3", ["time_counter", "x"], &[6, 1], values)
            .unwrap()
            .with_coord("time_counter", Coord::Times(times))
            .unwrap()
            .with_coord("x", Coord::Values(vec![10.0]))
            .unwrap()
    }

    #[test]
    fn months_are_ordered_and_averaged() {
        let c = monthly_climatology(&series(), "time_counter", MONTH_AXIS).unwrap();
        assert_eq!(c.dims(), &["time", "x"]);
        assert_eq!(c.coord("time"), Some(&Coord::Values(vec![1.0, 2.0, 3.0])));
        assert_eq!(c.coord("x"), Some(&Coord::Values(vec![10.0])));
        assert_eq!(c.data()[[0, 0]], 1.0);
        assert_eq!(c.data()[[1, 0]], 3.0);
        assert_eq!(c.data()[[2, 0]], 4.0);
    }

    #[test]
    fn concatenated_years_build_one_climatology() {
        let s = series();
        let first = s.select("time_counter", &[0, 1, 2]).unwrap();
        let second = s.select("time_counter", &[3, 4, 5]).unwrap();
        let joined = LabelledArray::concat(&[first, second], "time_counter").unwrap();
        assert_eq!(
            monthly_climatology(&joined, "time_counter", MONTH_AXIS).unwrap(),
            monthly_climatology(&s, "time_counter", MONTH_AXIS).unwrap()
        );
    }

    #[test]
    fn index_time_axis_is_a_missing_dimension() {
        let plain = LabelledArray::from_shape_vec("NO3", ["time_counter"], &[2], vec![1.0, 2.0]).unwrap();
        let err = monthly_climatology(&plain, "time_counter", MONTH_AXIS).unwrap_err();
        assert!(matches!(err, ReduceError::MissingDimension { .. }));
        let err = monthly_climatology(&plain, "time", MONTH_AXIS).unwrap_err();
        assert!(matches!(err, ReduceError::MissingDimension { .. }));
    }

    #[test]
    fn static_fields_are_carried_over() {
        let lat = LabelledArray::from_shape_vec("nav_lat", ["x"], &[1], vec![-60.0]).unwrap();
        let undated =
            LabelledArray::from_shape_vec("PO4", ["time_counter", "x"], &[2, 1], vec![1.0, 2.0]).unwrap();
        let ds = Dataset::from_arrays([series(), lat.clone(), undated]);
        let c = climatology_all(&ds, "time_counter", MONTH_AXIS);
        assert_eq!(c.names(), vec!["NO3", "nav_lat"]);
        assert_eq!(c.get("nav_lat"), Some(&lat));
        assert_eq!(c.get("NO3").unwrap().len_of("time"), Some(3));
        assert_eq!(c.failed().len(), 1);
        assert_eq!(c.failed()[0].variable, "PO4");
    }
}
