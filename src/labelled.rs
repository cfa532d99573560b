//! Labelled multidimensional arrays and datasets
//!
//! A [`LabelledArray`] is an `ndarray` array whose axes carry names and,
//! optionally, coordinate values (physical depth, calendar time, region
//! labels). A [`Dataset`] is an ordered collection of named arrays, the
//! in-memory shape every loader hands to the reduction engine.
//!
//! Missing values are `NaN`; they are never conflated with a valid zero.

use crate::errors::{ReduceError, Result};
use chrono::NaiveDateTime;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use std::collections::HashMap;

/// Coordinate values attached to one axis
#[derive(Debug, Clone, PartialEq)]
pub enum Coord {
    /// Plain ordinal index, no physical values
    Index,
    /// Numeric coordinate such as depth in meters
    Values(Vec<f64>),
    /// Calendar time stamps
    Times(Vec<NaiveDateTime>),
    /// Categorical labels such as region names
    Labels(Vec<String>),
}

impl Coord {
    /// Number of coordinate entries, `None` for [`Coord::Index`]
    pub fn len(&self) -> Option<usize> {
        match self {
            Coord::Index => None,
            Coord::Values(v) => Some(v.len()),
            Coord::Times(t) => Some(t.len()),
            Coord::Labels(l) => Some(l.len()),
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Coord::Index)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Coord::Index => "index",
            Coord::Values(_) => "values",
            Coord::Times(_) => "times",
            Coord::Labels(_) => "labels",
        }
    }

    pub fn values(&self) -> Option<&[f64]> {
        match self {
            Coord::Values(v) => Some(v),
            _ => None,
        }
    }

    pub fn times(&self) -> Option<&[NaiveDateTime]> {
        match self {
            Coord::Times(t) => Some(t),
            _ => None,
        }
    }

    pub fn labels(&self) -> Option<&[String]> {
        match self {
            Coord::Labels(l) => Some(l),
            _ => None,
        }
    }

    fn select(&self, indices: &[usize]) -> Coord {
        match self {
            Coord::Index => Coord::Index,
            Coord::Values(v) => Coord::Values(indices.iter().map(|&i| v[i]).collect()),
            Coord::Times(t) => Coord::Times(indices.iter().map(|&i| t[i]).collect()),
            Coord::Labels(l) => Coord::Labels(indices.iter().map(|&i| l[i].clone()).collect()),
        }
    }

    /// Joins coordinates of the same kind; mixed kinds degrade to an index.
    fn concat<'a>(parts: impl IntoIterator<Item = &'a Coord>) -> Coord {
        let mut out: Option<Coord> = None;
        for part in parts {
            out = Some(match (out, part) {
                (None, c) => c.clone(),
                (Some(Coord::Values(mut a)), Coord::Values(b)) => {
                    a.extend_from_slice(b);
                    Coord::Values(a)
                }
                (Some(Coord::Times(mut a)), Coord::Times(b)) => {
                    a.extend_from_slice(b);
                    Coord::Times(a)
                }
                (Some(Coord::Labels(mut a)), Coord::Labels(b)) => {
                    a.extend_from_slice(b);
                    Coord::Labels(a)
                }
                _ => return Coord::Index,
            });
        }
        out.unwrap_or(Coord::Index)
    }
}

/// Name, length and coordinate of one axis
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionInfo {
    pub name: String,
    pub length: usize,
    pub coord: Coord,
}

/// Ordered set of axes, typically the union of a dataset's variable axes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisSizes {
    axes: Vec<DimensionInfo>,
}

impl AxisSizes {
    pub fn get(&self, name: &str) -> Option<&DimensionInfo> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn len_of(&self, name: &str) -> Option<usize> {
        self.get(name).map(|a| a.length)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|a| a.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionInfo> {
        self.axes.iter()
    }

    /// Adds the axes of `array`, failing if a shared axis disagrees in length.
    pub fn merge(&mut self, array: &LabelledArray) -> Result<()> {
        for (i, name) in array.dims.iter().enumerate() {
            let length = array.data.len_of(Axis(i));
            match self.axes.iter_mut().find(|a| &a.name == name) {
                Some(existing) if existing.length != length => {
                    return Err(ReduceError::shape_mismatch(
                        format!("variable '{}'", array.name),
                        name.clone(),
                        existing.length,
                        length,
                    ));
                }
                Some(existing) => {
                    if existing.coord.is_index() {
                        existing.coord = array.coords[i].clone();
                    }
                }
                None => self.axes.push(DimensionInfo {
                    name: name.clone(),
                    length,
                    coord: array.coords[i].clone(),
                }),
            }
        }
        Ok(())
    }
}

/// N-dimensional `f64` array with named, ordered axes
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledArray {
    name: String,
    dims: Vec<String>,
    coords: Vec<Coord>,
    data: ArrayD<f64>,
}

impl LabelledArray {
    /// Wraps `data`, naming its axes in order.
    ///
    /// # Errors
    ///
    /// Fails if the number of names differs from the array rank or a name
    /// is repeated.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        dims: impl IntoIterator<Item = S>,
        data: ArrayD<f64>,
    ) -> Result<Self> {
        let name = name.into();
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(ReduceError::invalid(format!(
                "'{name}' has {} axis names for an array of rank {}",
                dims.len(),
                data.ndim()
            )));
        }
        check_unique(&name, &dims)?;
        let coords = vec![Coord::Index; dims.len()];
        Ok(Self {
            name,
            dims,
            coords,
            data,
        })
    }

    /// Builds an array from a row-major value vector.
    pub fn from_shape_vec<S: Into<String>>(
        name: impl Into<String>,
        dims: impl IntoIterator<Item = S>,
        shape: &[usize],
        values: Vec<f64>,
    ) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)?;
        Self::new(name, dims, data)
    }

    /// Attaches a coordinate to `axis`.
    pub fn with_coord(mut self, axis: &str, coord: Coord) -> Result<Self> {
        let i = self.require_axis(axis, "coordinate")?;
        let length = self.data.len_of(Axis(i));
        if let Some(n) = coord.len() {
            if n != length {
                return Err(ReduceError::shape_mismatch(
                    format!("coordinate of '{}'", self.name),
                    axis,
                    length,
                    n,
                ));
            }
        }
        self.coords[i] = coord;
        Ok(self)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn view(&self) -> ArrayViewD<'_, f64> {
        self.data.view()
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    pub fn axis_of(&self, axis: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == axis)
    }

    pub fn has_axis(&self, axis: &str) -> bool {
        self.axis_of(axis).is_some()
    }

    pub fn len_of(&self, axis: &str) -> Option<usize> {
        self.axis_of(axis).map(|i| self.data.len_of(Axis(i)))
    }

    pub fn coord(&self, axis: &str) -> Option<&Coord> {
        self.axis_of(axis).map(|i| &self.coords[i])
    }

    pub fn axis_sizes(&self) -> AxisSizes {
        let mut sizes = AxisSizes::default();
        // An array never disagrees with itself.
        let _ = sizes.merge(self);
        sizes
    }

    /// Position of `axis`, or a [`ReduceError::MissingDimension`] naming `role`.
    pub fn require_axis(&self, axis: &str, role: &str) -> Result<usize> {
        self.axis_of(axis)
            .ok_or_else(|| ReduceError::MissingDimension {
                role: format!("{role} '{axis}'"),
                context: format!("variable '{}'", self.name),
            })
    }

    /// Number of missing (non-finite) values
    pub fn count_missing(&self) -> usize {
        self.data.iter().filter(|v| !v.is_finite()).count()
    }

    /// Renames axes according to `mapping`; unmapped axes are kept.
    pub fn rename_axes(&self, mapping: &HashMap<String, String>) -> Result<Self> {
        let dims: Vec<String> = self
            .dims
            .iter()
            .map(|d| mapping.get(d).cloned().unwrap_or_else(|| d.clone()))
            .collect();
        check_unique(&self.name, &dims)?;
        Ok(Self {
            name: self.name.clone(),
            dims,
            coords: self.coords.clone(),
            data: self.data.clone(),
        })
    }

    /// Drops a length-one axis.
    pub fn squeeze(&self, axis: &str) -> Result<Self> {
        let i = self.require_axis(axis, "squeezed")?;
        let length = self.data.len_of(Axis(i));
        if length != 1 {
            return Err(ReduceError::shape_mismatch(
                format!("squeeze of '{}'", self.name),
                axis,
                1,
                length,
            ));
        }
        self.isel(axis, 0)
    }

    /// Takes a single index along `axis`, removing the axis.
    pub fn isel(&self, axis: &str, index: usize) -> Result<Self> {
        let i = self.require_axis(axis, "selected")?;
        self.check_index(i, index)?;
        let mut dims = self.dims.clone();
        let mut coords = self.coords.clone();
        dims.remove(i);
        coords.remove(i);
        Ok(Self {
            name: self.name.clone(),
            dims,
            coords,
            data: self.data.index_axis(Axis(i), index).to_owned(),
        })
    }

    /// Keeps only `indices` along `axis`, in the given order.
    pub fn select(&self, axis: &str, indices: &[usize]) -> Result<Self> {
        let i = self.require_axis(axis, "selected")?;
        for &index in indices {
            self.check_index(i, index)?;
        }
        let mut coords = self.coords.clone();
        coords[i] = coords[i].select(indices);
        Ok(Self {
            name: self.name.clone(),
            dims: self.dims.clone(),
            coords,
            data: self.data.select(Axis(i), indices),
        })
    }

    /// Inserts a new axis at `position`, repeating the values `length` times.
    pub fn insert_axis(
        &self,
        position: usize,
        axis: &str,
        length: usize,
        coord: Coord,
    ) -> Result<Self> {
        if position > self.ndim() {
            return Err(ReduceError::invalid(format!(
                "cannot insert axis '{axis}' at position {position} of '{}'",
                self.name
            )));
        }
        let mut dims = self.dims.clone();
        dims.insert(position, axis.to_string());
        check_unique(&self.name, &dims)?;
        let mut shape = self.shape().to_vec();
        shape.insert(position, length);
        let expanded = self.data.view().insert_axis(Axis(position));
        let data = expanded
            .broadcast(IxDyn(&shape))
            .ok_or_else(|| ReduceError::invalid(format!("cannot expand '{}'", self.name)))?
            .to_owned();
        let mut coords = self.coords.clone();
        coords.insert(position, Coord::Index);
        Self {
            name: self.name.clone(),
            dims,
            coords,
            data,
        }
        .with_coord(axis, coord)
    }

    /// Joins arrays with identical axes end to end along `axis`.
    pub fn concat(arrays: &[LabelledArray], axis: &str) -> Result<Self> {
        let first = arrays
            .first()
            .ok_or_else(|| ReduceError::invalid("cannot concatenate zero arrays"))?;
        let i = first.require_axis(axis, "concatenation")?;
        for other in &arrays[1..] {
            if other.dims != first.dims {
                return Err(ReduceError::invalid(format!(
                    "cannot concatenate '{}' {:?} with '{}' {:?}",
                    first.name, first.dims, other.name, other.dims
                )));
            }
            for (j, dim) in first.dims.iter().enumerate() {
                if j != i && other.shape()[j] != first.shape()[j] {
                    return Err(ReduceError::shape_mismatch(
                        format!("concatenation of '{}'", other.name),
                        dim.clone(),
                        first.shape()[j],
                        other.shape()[j],
                    ));
                }
            }
        }
        let views: Vec<ArrayViewD<'_, f64>> = arrays.iter().map(LabelledArray::view).collect();
        let data = ndarray::concatenate(Axis(i), &views)?;
        let mut coords = first.coords.clone();
        coords[i] = Coord::concat(arrays.iter().map(|a| &a.coords[i]));
        Ok(Self {
            name: first.name.clone(),
            dims: first.dims.clone(),
            coords,
            data,
        })
    }

    /// Stacks same-shaped arrays along a new leading axis labelled `labels`.
    pub fn stack(
        name: impl Into<String>,
        arrays: &[LabelledArray],
        axis: &str,
        labels: &[String],
    ) -> Result<Self> {
        let first = arrays
            .first()
            .ok_or_else(|| ReduceError::invalid("cannot stack zero arrays"))?;
        if labels.len() != arrays.len() {
            return Err(ReduceError::shape_mismatch(
                "stack labels",
                axis,
                arrays.len(),
                labels.len(),
            ));
        }
        for other in &arrays[1..] {
            if other.dims != first.dims || other.shape() != first.shape() {
                return Err(ReduceError::invalid(format!(
                    "cannot stack {:?}{:?} with {:?}{:?}",
                    first.dims,
                    first.shape(),
                    other.dims,
                    other.shape()
                )));
            }
        }
        let views: Vec<ArrayViewD<'_, f64>> = arrays.iter().map(LabelledArray::view).collect();
        let data = ndarray::stack(Axis(0), &views)?;
        let mut dims = vec![axis.to_string()];
        dims.extend(first.dims.iter().cloned());
        check_unique(axis, &dims)?;
        let mut coords = vec![Coord::Labels(labels.to_vec())];
        coords.extend(first.coords.iter().cloned());
        Ok(Self {
            name: name.into(),
            dims,
            coords,
            data,
        })
    }

    /// Wraps `data`, the result of reducing the axes at positions `dropped`,
    /// keeping this array's name and remaining axes.
    pub fn reduced(&self, dropped: &[usize], data: ArrayD<f64>) -> Result<Self> {
        let kept: Vec<usize> = (0..self.ndim()).filter(|i| !dropped.contains(i)).collect();
        let expected: Vec<usize> = kept.iter().map(|&i| self.shape()[i]).collect();
        if data.shape() != expected.as_slice() {
            return Err(ReduceError::invalid(format!(
                "reduced '{}' has shape {:?}, expected {:?}",
                self.name,
                data.shape(),
                expected
            )));
        }
        Ok(Self {
            name: self.name.clone(),
            dims: kept.iter().map(|&i| self.dims[i].clone()).collect(),
            coords: kept.iter().map(|&i| self.coords[i].clone()).collect(),
            data,
        })
    }

    fn check_index(&self, axis: usize, index: usize) -> Result<()> {
        let length = self.data.len_of(Axis(axis));
        if index >= length {
            return Err(ReduceError::invalid(format!(
                "index {index} out of range for axis '{}' of length {length} in '{}'",
                self.dims[axis], self.name
            )));
        }
        Ok(())
    }
}

fn check_unique(name: &str, dims: &[String]) -> Result<()> {
    for (i, d) in dims.iter().enumerate() {
        if dims[..i].contains(d) {
            return Err(ReduceError::invalid(format!(
                "axis '{d}' appears twice in '{name}'"
            )));
        }
    }
    Ok(())
}

/// Ordered collection of named variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    variables: Vec<LabelledArray>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset, later arrays replacing earlier ones of the same name.
    pub fn from_arrays(arrays: impl IntoIterator<Item = LabelledArray>) -> Self {
        let mut dataset = Self::new();
        for array in arrays {
            dataset.insert(array);
        }
        dataset
    }

    /// Adds `array`, replacing any variable with the same name in place.
    pub fn insert(&mut self, array: LabelledArray) {
        match self.variables.iter_mut().find(|v| v.name == array.name) {
            Some(slot) => *slot = array,
            None => self.variables.push(array),
        }
    }

    pub fn get(&self, name: &str) -> Option<&LabelledArray> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Like [`Dataset::get`] but reports a [`ReduceError::MissingVariable`].
    pub fn require(&self, name: &str) -> Result<&LabelledArray> {
        self.get(name).ok_or_else(|| ReduceError::MissingVariable {
            var: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelledArray> {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Joins datasets end to end along `axis`, e.g. consecutive model years.
    ///
    /// Variables with `axis` are concatenated and must be present in every
    /// part; variables without it are taken from the first part.
    pub fn concat(parts: &[Dataset], axis: &str) -> Result<Self> {
        let Some((first, rest)) = parts.split_first() else {
            return Err(ReduceError::invalid("cannot concatenate zero datasets"));
        };
        let mut out = Dataset::new();
        for variable in &first.variables {
            if !variable.has_axis(axis) {
                out.insert(variable.clone());
                continue;
            }
            let mut pieces = vec![variable.clone()];
            for part in rest {
                pieces.push(part.require(&variable.name)?.clone());
            }
            out.insert(LabelledArray::concat(&pieces, axis)?);
        }
        Ok(out)
    }

    /// Union of every variable's axes.
    pub fn axis_sizes(&self) -> Result<AxisSizes> {
        let mut sizes = AxisSizes::default();
        for v in &self.variables {
            sizes.merge(v)?;
        }
        Ok(sizes)
    }

    /// Union of the axes of the named variables, tolerating disagreement.
    ///
    /// A variable whose axes conflict with those merged before it is left out
    /// of the union and returned with its error. Absent names are ignored.
    pub fn axis_sizes_of(&self, names: &[String]) -> (AxisSizes, Vec<(String, ReduceError)>) {
        let mut sizes = AxisSizes::default();
        let mut conflicts = Vec::new();
        for v in names.iter().filter_map(|n| self.get(n)) {
            let mut merged = sizes.clone();
            match merged.merge(v) {
                Ok(()) => sizes = merged,
                Err(e) => conflicts.push((v.name.clone(), e)),
            }
        }
        (sizes, conflicts)
    }
}

impl IntoIterator for Dataset {
    type Item = LabelledArray;
    type IntoIter = std::vec::IntoIter<LabelledArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.variables.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> LabelledArray {
        let values: Vec<f64> = (0..24).map(f64::from).collect();
        LabelledArray::from_shape_vec("T", ["time", "depth", "x"], &[2, 3, 4], values)
            .unwrap()
            .with_coord("depth", Coord::Values(vec![5.0, 15.0, 25.0]))
            .unwrap()
    }

    #[test]
    fn rejects_duplicate_axis_names() {
        let data = ArrayD::zeros(IxDyn(&[2, 2]));
        let err = LabelledArray::new("a", ["x", "x"], data).unwrap_err();
        assert!(err.to_string().contains("appears twice"));
    }

    #[test]
    fn rejects_rank_mismatch() {
        let data = ArrayD::zeros(IxDyn(&[2, 2]));
        assert!(LabelledArray::new("a", ["x"], data).is_err());
    }

    #[test]
    fn coord_length_is_checked() {
        let err = cube()
            .with_coord("x", Coord::Values(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, ReduceError::ShapeMismatch { .. }));
    }

    #[test]
    fn isel_drops_axis_and_coord() {
        let a = cube().isel("depth", 1).unwrap();
        assert_eq!(a.dims(), &["time", "x"]);
        assert_eq!(a.shape(), &[2, 4]);
        assert_eq!(a.data()[[0, 0]], 4.0);
        assert_eq!(a.data()[[1, 3]], 19.0);
        assert!(a.coord("depth").is_none());
    }

    #[test]
    fn isel_out_of_range_fails() {
        assert!(cube().isel("depth", 3).is_err());
    }

    #[test]
    fn select_keeps_coordinates_in_order() {
        let a = cube().select("depth", &[2, 0]).unwrap();
        assert_eq!(a.coord("depth").unwrap().values().unwrap(), &[25.0, 5.0]);
        assert_eq!(a.data()[[0, 0, 0]], 8.0);
        assert_eq!(a.data()[[0, 1, 0]], 0.0);
    }

    #[test]
    fn squeeze_requires_singleton() {
        let a = cube().select("time", &[1]).unwrap();
        let s = a.squeeze("time").unwrap();
        assert_eq!(s.dims(), &["depth", "x"]);
        assert!(cube().squeeze("time").is_err());
    }

    #[test]
    fn rename_detects_collisions() {
        let mut mapping = HashMap::new();
        mapping.insert("x".to_string(), "depth".to_string());
        assert!(cube().rename_axes(&mapping).is_err());

        mapping.clear();
        mapping.insert("depth".to_string(), "deptht".to_string());
        let renamed = cube().rename_axes(&mapping).unwrap();
        assert_eq!(renamed.dims(), &["time", "deptht", "x"]);
    }

    #[test]
    fn insert_axis_repeats_values() {
        let a = cube().isel("time", 0).unwrap();
        let e = a
            .insert_axis(0, "time", 3, Coord::Values(vec![1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(e.shape(), &[3, 3, 4]);
        for t in 0..3 {
            assert_eq!(e.data()[[t, 2, 1]], a.data()[[2, 1]]);
        }
    }

    #[test]
    fn concat_joins_coordinates() {
        let a = cube().select("depth", &[0]).unwrap();
        let b = cube().select("depth", &[1, 2]).unwrap();
        let joined = LabelledArray::concat(&[a, b], "depth").unwrap();
        assert_eq!(joined, cube());
    }

    #[test]
    fn stack_prepends_labelled_axis() {
        let a = cube().isel("time", 0).unwrap();
        let b = cube().isel("time", 1).unwrap();
        let labels = vec!["first".to_string(), "second".to_string()];
        let s = LabelledArray::stack("T", &[a, b], "region", &labels).unwrap();
        assert_eq!(s.dims(), &["region", "depth", "x"]);
        assert_eq!(s.coord("region").unwrap().labels().unwrap(), labels.as_slice());
        assert_eq!(s.data()[[1, 0, 0]], 12.0);
    }

    #[test]
    fn dataset_axis_sizes_detect_conflicts() {
        let a = cube();
        let b = LabelledArray::from_shape_vec("S", ["time", "x"], &[3, 4], vec![0.0; 12]).unwrap();
        let ds = Dataset::from_arrays([a, b]);
        assert!(matches!(
            ds.axis_sizes(),
            Err(ReduceError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn dataset_concat_joins_along_time() {
        let grid = LabelledArray::from_shape_vec("nav_lat", ["x"], &[4], vec![0.0; 4]).unwrap();
        let first = Dataset::from_arrays([cube().select("time", &[0]).unwrap(), grid.clone()]);
        let second = Dataset::from_arrays([cube().select("time", &[1]).unwrap(), grid]);
        let joined = Dataset::concat(&[first.clone(), second], "time").unwrap();
        assert_eq!(joined.require("T").unwrap(), &cube());
        assert_eq!(joined.require("nav_lat").unwrap().ndim(), 1);

        let lacking = Dataset::from_arrays([first.require("nav_lat").unwrap().clone()]);
        assert!(matches!(
            Dataset::concat(&[first, lacking], "time"),
            Err(ReduceError::MissingVariable { .. })
        ));
    }

    #[test]
    fn dataset_insert_replaces_by_name() {
        let mut ds = Dataset::from_arrays([cube()]);
        ds.insert(cube().isel("time", 0).unwrap());
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get("T").unwrap().ndim(), 2);
        assert!(matches!(
            ds.require("S"),
            Err(ReduceError::MissingVariable { .. })
        ));
    }

    #[test]
    fn axis_sizes_of_leaves_out_conflicting_variables() {
        let a = LabelledArray::from_shape_vec("A", ["deptht"], &[3], vec![0.0; 3]).unwrap();
        let b = LabelledArray::from_shape_vec("B", ["deptht"], &[4], vec![0.0; 4]).unwrap();
        let c = LabelledArray::from_shape_vec("C", ["deptht", "x"], &[3, 2], vec![0.0; 6]).unwrap();
        let ds = Dataset::from_arrays([a, b, c]);
        assert!(ds.axis_sizes().is_err());

        let names: Vec<String> = ["A", "B", "C", "Z"].iter().map(|s| s.to_string()).collect();
        let (sizes, conflicts) = ds.axis_sizes_of(&names);
        assert_eq!(sizes.len_of("deptht"), Some(3));
        assert_eq!(sizes.len_of("x"), Some(2));
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].0, "B");
        assert!(matches!(conflicts[0].1, ReduceError::ShapeMismatch { .. }));
    }
}
