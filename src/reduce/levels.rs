//! Model-level selection by index

use super::operations::nan_mean;
use crate::errors::{ReduceError, Result};
use crate::labelled::LabelledArray;
use serde::Deserialize;

/// Which model levels of a depth-resolved variable to keep
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelSelection {
    /// Every level, depth axis kept
    #[default]
    All,
    /// A single level, depth axis dropped
    Index(usize),
    /// Missing-aware mean of the listed levels, depth axis dropped
    Mean(Vec<usize>),
}

impl LevelSelection {
    /// Applies the selection to `data`.
    ///
    /// Variables without `depth_axis` pass through unchanged for
    /// [`LevelSelection::Index`], matching surface fields read alongside
    /// 3-D tracers.
    pub fn apply(&self, data: &LabelledArray, depth_axis: &str) -> Result<LabelledArray> {
        match self {
            LevelSelection::All => Ok(data.clone()),
            LevelSelection::Index(index) => select_level(data, depth_axis, *index),
            LevelSelection::Mean(indices) => mean_of_levels(data, depth_axis, indices),
        }
    }
}

/// Takes model level `index` along `depth_axis`, or returns `data` as is
/// when it has no such axis.
pub fn select_level(data: &LabelledArray, depth_axis: &str, index: usize) -> Result<LabelledArray> {
    if data.has_axis(depth_axis) {
        data.isel(depth_axis, index)
    } else {
        Ok(data.clone())
    }
}

/// Missing-aware arithmetic mean over the levels `indices`.
///
/// Export at 100 m on ORCA2, for example, is the mean of levels 9 and 10.
pub fn mean_of_levels(data: &LabelledArray, depth_axis: &str, indices: &[usize]) -> Result<LabelledArray> {
    if indices.is_empty() {
        return Err(ReduceError::invalid(format!(
            "no levels given to average '{}'",
            data.name()
        )));
    }
    let axis = data.require_axis(depth_axis, "depth-like")?;
    let levels = data.select(depth_axis, indices)?;
    nan_mean(&levels, &[axis])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp() -> LabelledArray {
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        LabelledArray::from_shape_vec("EXP", ["time_counter", "deptht", "x"], &[2, 3, 2], values)
            .unwrap()
    }

    #[test]
    fn select_level_drops_depth() {
        let s = select_level(&exp(), "deptht", 2).unwrap();
        assert_eq!(s.dims(), &["time_counter", "x"]);
        assert_eq!(s.data()[[1, 1]], 11.0);
    }

    #[test]
    fn select_level_passes_surface_fields_through() {
        let flux = LabelledArray::from_shape_vec("Cflx", ["time_counter", "x"], &[1, 2], vec![1.0, 2.0])
            .unwrap();
        assert_eq!(select_level(&flux, "deptht", 0).unwrap(), flux);
    }

    #[test]
    fn select_level_out_of_range() {
        let err = select_level(&exp(), "deptht", 3).unwrap_err();
        assert!(matches!(err, ReduceError::InvalidArray { .. }));
    }

    #[test]
    fn mean_of_two_levels() {
        let m = mean_of_levels(&exp(), "deptht", &[1, 2]).unwrap();
        assert_eq!(m.dims(), &["time_counter", "x"]);
        assert_eq!(m.data()[[0, 0]], 3.0);
        assert_eq!(m.data()[[1, 1]], 10.0);
    }

    #[test]
    fn mean_of_levels_ignores_missing() {
        let mut values = vec![1.0, f64::NAN, 3.0, f64::NAN];
        values.extend([5.0, 7.0]);
        let a = LabelledArray::from_shape_vec("EXP", ["deptht", "x"], &[3, 2], values).unwrap();
        let m = mean_of_levels(&a, "deptht", &[0, 1]).unwrap();
        assert_eq!(m.data()[[0]], 2.0);
        assert!(m.data()[[1]].is_nan());
    }

    #[test]
    fn selection_from_config() {
        let s: LevelSelection = serde_json::from_str(r#"{"mean": [9, 10]}"#).unwrap();
        assert_eq!(s, LevelSelection::Mean(vec![9, 10]));
        let s: LevelSelection = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(s.apply(&exp(), "deptht").unwrap(), exp());
        let s: LevelSelection = serde_json::from_str(r#"{"index": 0}"#).unwrap();
        assert_eq!(s.apply(&exp(), "deptht").unwrap().ndim(), 2);
    }
}
