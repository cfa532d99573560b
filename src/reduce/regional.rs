//! Mask-weighted regional and latitudinal means

use super::operations::{Accumulator, MaskWeighting, ReducedSet};
use crate::align::broadcast_view;
use crate::errors::{ReduceError, Result};
use crate::labelled::{Dataset, LabelledArray};
use ndarray::Zip;
use tracing::{debug, warn};

/// Name of the axis regional results are stacked along
pub const REGION_AXIS: &str = "region";

/// A named spatial region and its mask
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub mask: LabelledArray,
}

impl Region {
    pub fn new(name: impl Into<String>, mask: LabelledArray) -> Self {
        Self {
            name: name.into(),
            mask,
        }
    }

    /// Region whose mask is the product of `factors`, such as a cell-size
    /// field times a 0/1 basin mask.
    ///
    /// Factors are laid over the first one's axes.
    pub fn from_product(name: impl Into<String>, factors: &[&LabelledArray]) -> Result<Self> {
        let name = name.into();
        let Some((first, rest)) = factors.split_first() else {
            return Err(ReduceError::invalid(format!("region '{name}' has no mask")));
        };
        let mut values = first.data().clone();
        for factor in rest {
            let view = broadcast_view(factor, first.dims(), first.shape())?;
            Zip::from(&mut values)
                .and_broadcast(&view)
                .for_each(|m, &f| *m *= f);
        }
        let mask = LabelledArray::new(name.clone(), first.dims().iter().cloned(), values)?;
        Ok(Self::new(name, mask))
    }
}

/// Mean of `data` over every axis not in `keep`, restricted to cells where
/// `mask > 0`.
///
/// Cells outside the mask, and missing data cells, are excluded rather than
/// counted as zero. A position with no member cells is missing. Axes in
/// `keep` that `data` lacks are ignored.
///
/// # Errors
///
/// [`ReduceError::ShapeMismatch`] when the mask cannot be laid over `data`.
pub fn masked_mean(
    data: &LabelledArray,
    mask: &LabelledArray,
    keep: &[String],
    weighting: MaskWeighting,
) -> Result<LabelledArray> {
    let mask = broadcast_view(mask, data.dims(), data.shape())?;
    let weight = mask.mapv(|m| weighting.weight(m));
    let reduce: Vec<usize> = data
        .dims()
        .iter()
        .enumerate()
        .filter(|(_, d)| !keep.contains(*d))
        .map(|(i, _)| i)
        .collect();
    let mean = Accumulator::from_cells(data.view(), &weight.view())
        .sum_axes(&reduce)
        .average();
    data.reduced(&reduce, mean)
}

/// One masked mean per region, stacked along a leading `region` axis.
///
/// Region labels follow the order of `regions` exactly.
pub fn regional_reduce(
    data: &LabelledArray,
    regions: &[Region],
    keep: &[String],
    weighting: MaskWeighting,
) -> Result<LabelledArray> {
    if regions.is_empty() {
        return Err(ReduceError::invalid(format!(
            "no regions given for '{}'",
            data.name()
        )));
    }
    let mut labels: Vec<String> = Vec::with_capacity(regions.len());
    for region in regions {
        if labels.contains(&region.name) {
            return Err(ReduceError::invalid(format!(
                "region '{}' listed twice",
                region.name
            )));
        }
        labels.push(region.name.clone());
    }

    let means = regions
        .iter()
        .map(|region| {
            debug!(variable = data.name(), region = %region.name, "masked mean");
            masked_mean(data, &region.mask, keep, weighting).map_err(|e| match e {
                ReduceError::ShapeMismatch {
                    axis,
                    expected,
                    found,
                    ..
                } => ReduceError::ShapeMismatch {
                    context: format!("region '{}' of '{}'", region.name, data.name()),
                    axis,
                    expected,
                    found,
                },
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    LabelledArray::stack(data.name(), &means, REGION_AXIS, &labels)
}

/// [`regional_reduce`] for every named variable.
///
/// Absent variables are skipped and variables whose reduction fails are
/// recorded as failed; neither stops the others.
pub fn regional_reduce_all(
    dataset: &Dataset,
    variables: &[String],
    regions: &[Region],
    keep: &[String],
    weighting: MaskWeighting,
) -> Result<ReducedSet> {
    let mut out = ReducedSet::new();
    for variable in variables {
        match dataset.require(variable) {
            Ok(data) => match regional_reduce(data, regions, keep, weighting) {
                Ok(reduced) => out.push(reduced),
                Err(e) => {
                    warn!(variable = %variable, reason = %e, "regional reduction failed");
                    out.fail(variable.clone(), &e);
                }
            },
            Err(e) if !e.is_fatal() => {
                warn!(variable = %variable, reason = %e, "skipping variable");
                out.skip(variable.clone());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

/// Mask-weighted mean along `reduce_axis` only, every other axis kept.
///
/// The mask magnitude (typically a cell size restricted to a basin) is the
/// weight.
pub fn latitudinal_profile(
    data: &LabelledArray,
    mask: &LabelledArray,
    reduce_axis: &str,
) -> Result<LabelledArray> {
    data.require_axis(reduce_axis, "zonal")?;
    let keep: Vec<String> = data
        .dims()
        .iter()
        .filter(|d| d.as_str() != reduce_axis)
        .cloned()
        .collect();
    masked_mean(data, mask, &keep, MaskWeighting::Magnitude)
}

/// [`latitudinal_profile`] for every named variable, skipping absent ones
/// and recording failed ones.
pub fn latitudinal_profiles(
    dataset: &Dataset,
    variables: &[String],
    mask: &LabelledArray,
    reduce_axis: &str,
) -> Result<ReducedSet> {
    let mut out = ReducedSet::new();
    for variable in variables {
        match dataset.get(variable) {
            Some(data) => match latitudinal_profile(data, mask, reduce_axis) {
                Ok(profile) => out.push(profile),
                Err(e) => {
                    warn!(variable = %variable, reason = %e, "latitudinal profile failed");
                    out.fail(variable.clone(), &e);
                }
            },
            None => {
                warn!(variable = %variable, "variable not found, skipping");
                out.skip(variable.clone());
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labelled::Coord;

    fn keep_time() -> Vec<String> {
        vec!["time_counter".to_string()]
    }

    fn field(values: Vec<f64>) -> LabelledArray {
        LabelledArray::from_shape_vec("NO3", ["time_counter", "y", "x"], &[2, 2, 2], values).unwrap()
    }

    fn mask(name: &str, values: [f64; 4]) -> LabelledArray {
        LabelledArray::from_shape_vec(name, ["y", "x"], &[2, 2], values.to_vec()).unwrap()
    }

    #[test]
    fn region_order_is_preserved() {
        let data = field(vec![1.0; 8]);
        let regions: Vec<Region> = ["GO", "AB", "HA", "NA"]
            .iter()
            .map(|n| Region::new(*n, mask(n, [1.0; 4])))
            .collect();
        let out = regional_reduce(&data, &regions, &keep_time(), MaskWeighting::Indicator).unwrap();
        assert_eq!(out.dims(), &["region", "time_counter"]);
        assert_eq!(
            out.coord(REGION_AXIS),
            Some(&Coord::Labels(
                ["GO", "AB", "HA", "NA"].iter().map(|s| s.to_string()).collect()
            ))
        );
    }

    #[test]
    fn all_ones_mask_is_the_global_mean() {
        let data = field(vec![1.0, 2.0, 3.0, 6.0, 0.0, 0.0, 4.0, f64::NAN]);
        let r = masked_mean(&data, &mask("all", [1.0; 4]), &keep_time(), MaskWeighting::Magnitude)
            .unwrap();
        assert_eq!(r.data()[[0]], 3.0);
        assert!((r.data()[[1]] - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn cell_size_weights_the_mean() {
        let data = field(vec![1.0, 2.0, 3.0, 6.0, 1.0, 1.0, 1.0, 1.0]);
        let sizes = mask("csize", [3.0, 1.0, 0.0, 0.0]);
        let r = masked_mean(&data, &sizes, &keep_time(), MaskWeighting::Magnitude).unwrap();
        assert_eq!(r.data()[[0]], 1.25);
        let r = masked_mean(&data, &sizes, &keep_time(), MaskWeighting::Indicator).unwrap();
        assert_eq!(r.data()[[0]], 1.5);
    }

    #[test]
    fn disjoint_halves_of_uniform_field() {
        let data = field(vec![5.0; 8]);
        let regions = vec![
            Region::new("north", mask("north", [0.0, 0.0, 1.0, 1.0])),
            Region::new("south", mask("south", [2.0, 7.0, 0.0, 0.0])),
            Region::new("none", mask("none", [0.0; 4])),
        ];
        let out = regional_reduce(&data, &regions, &keep_time(), MaskWeighting::Magnitude).unwrap();
        for t in 0..2 {
            assert_eq!(out.data()[[0, t]], 5.0);
            assert_eq!(out.data()[[1, t]], 5.0);
            assert!(out.data()[[2, t]].is_nan());
        }
    }

    #[test]
    fn mask_shape_mismatch_is_reported() {
        let data = field(vec![1.0; 8]);
        let wrong = LabelledArray::from_shape_vec("AB", ["y", "x"], &[3, 2], vec![1.0; 6]).unwrap();
        let err = regional_reduce(
            &data,
            &[Region::new("AB", wrong)],
            &keep_time(),
            MaskWeighting::Indicator,
        )
        .unwrap_err();
        match err {
            ReduceError::ShapeMismatch { context, axis, .. } => {
                assert_eq!(axis, "y");
                assert!(context.contains("region 'AB'"));
            }
            other => panic!("expected ShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_regions_are_rejected() {
        let data = field(vec![1.0; 8]);
        let regions = vec![
            Region::new("GO", mask("GO", [1.0; 4])),
            Region::new("GO", mask("GO", [1.0; 4])),
        ];
        assert!(regional_reduce(&data, &regions, &keep_time(), MaskWeighting::Indicator).is_err());
        assert!(regional_reduce(&data, &[], &keep_time(), MaskWeighting::Indicator).is_err());
    }

    #[test]
    fn latitudinal_profile_keeps_latitude() {
        let data = field(vec![1.0, 3.0, 10.0, 20.0, 2.0, 2.0, f64::NAN, 8.0]);
        let basin = mask("ATL", [1.0, 3.0, 0.0, 1.0]);
        let r = latitudinal_profile(&data, &basin, "x").unwrap();
        assert_eq!(r.dims(), &["time_counter", "y"]);
        assert_eq!(r.data()[[0, 0]], 2.5);
        assert_eq!(r.data()[[0, 1]], 20.0);
        assert_eq!(r.data()[[1, 0]], 2.0);
        assert_eq!(r.data()[[1, 1]], 8.0);
        assert!(latitudinal_profile(&data, &basin, "lon").is_err());
    }

    #[test]
    fn product_masks_restrict_cell_sizes() {
        let csize = mask("csize", [2.0, 4.0, 6.0, 8.0]);
        let basin = mask("AB", [1.0, 0.0, 1.0, 0.0]);
        let region = Region::from_product("AB", &[&csize, &basin]).unwrap();
        assert_eq!(region.mask.data().iter().copied().collect::<Vec<_>>(), vec![2.0, 0.0, 6.0, 0.0]);

        let per_row = LabelledArray::from_shape_vec("row", ["y"], &[2], vec![1.0, 0.5]).unwrap();
        let region = Region::from_product("half", &[&csize, &per_row]).unwrap();
        assert_eq!(region.mask.data()[[1, 1]], 4.0);
        assert!(Region::from_product("none", &[]).is_err());
    }

    #[test]
    fn reduce_all_skips_missing_variables() {
        let ds = Dataset::from_arrays([field(vec![5.0; 8])]);
        let vars = vec!["NO3".to_string(), "PO4".to_string()];
        let regions = [Region::new("GO", mask("GO", [1.0; 4]))];
        let out = regional_reduce_all(&ds, &vars, &regions, &keep_time(), MaskWeighting::Indicator)
            .unwrap();
        assert_eq!(out.names(), vec!["NO3"]);
        assert_eq!(out.skipped(), &["PO4".to_string()]);
    }

    #[test]
    fn reduce_all_keeps_going_after_a_mismatch() {
        let coarse = LabelledArray::from_shape_vec("PO4", ["time_counter", "y", "x"], &[1, 3, 1], vec![1.0; 3])
            .unwrap();
        let ds = Dataset::from_arrays([field(vec![5.0; 8]), coarse]);
        let vars = vec!["PO4".to_string(), "NO3".to_string()];
        let regions = [Region::new("GO", mask("GO", [1.0; 4]))];
        let out = regional_reduce_all(&ds, &vars, &regions, &keep_time(), MaskWeighting::Indicator)
            .unwrap();
        assert_eq!(out.names(), vec!["NO3"]);
        assert_eq!(out.failed()[0].variable, "PO4");
        assert!(out.failed()[0].reason.contains("region 'GO' of 'PO4'"));

        let profiles = latitudinal_profiles(&ds, &vars, &mask("GO", [1.0; 4]), "x").unwrap();
        assert_eq!(profiles.names(), vec!["NO3"]);
        assert_eq!(profiles.failed().len(), 1);
    }
}
