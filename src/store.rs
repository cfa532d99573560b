//! Dataset loading and persistence collaborators
//!
//! The reduction engine never touches files. Callers hand it datasets from a
//! [`DatasetSource`] and persist results through a [`DatasetSink`].
//! [`JsonStore`] implements both over a plain JSON layout, used by the
//! command-line tool and the tests; missing values are stored as `null`.

use crate::errors::{ReduceError, Result};
use crate::labelled::{Coord, Dataset, LabelledArray};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Free-form string attributes stored next to a dataset
pub type Attributes = BTreeMap<String, String>;

/// Loads in-memory datasets
pub trait DatasetSource {
    fn load(&self, path: &Path) -> Result<Dataset>;
}

/// Persists datasets
///
/// Implementations must not leave a partial file at `path` when writing
/// fails.
pub trait DatasetSink {
    fn write(&self, dataset: &Dataset, attributes: &Attributes, path: &Path) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetFile {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: Attributes,
    variables: Vec<VariableFile>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariableFile {
    name: String,
    dims: Vec<String>,
    shape: Vec<usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    coords: BTreeMap<String, CoordFile>,
    data: Vec<Option<f64>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CoordFile {
    Values(Vec<f64>),
    Times(Vec<NaiveDateTime>),
    Labels(Vec<String>),
}

impl From<&LabelledArray> for VariableFile {
    fn from(array: &LabelledArray) -> Self {
        let coords = array
            .dims()
            .iter()
            .zip(array.coords())
            .filter_map(|(name, coord)| {
                let c = match coord {
                    Coord::Index => return None,
                    Coord::Values(v) => CoordFile::Values(v.clone()),
                    Coord::Times(t) => CoordFile::Times(t.clone()),
                    Coord::Labels(l) => CoordFile::Labels(l.clone()),
                };
                Some((name.clone(), c))
            })
            .collect();
        Self {
            name: array.name().to_string(),
            dims: array.dims().to_vec(),
            shape: array.shape().to_vec(),
            coords,
            data: array
                .data()
                .iter()
                .map(|&v| v.is_finite().then_some(v))
                .collect(),
        }
    }
}

impl TryFrom<VariableFile> for LabelledArray {
    type Error = ReduceError;

    fn try_from(file: VariableFile) -> Result<Self> {
        let expected = file
            .shape
            .iter()
            .try_fold(1usize, |n, &len| n.checked_mul(len))
            .ok_or_else(|| {
                ReduceError::invalid(format!(
                    "'{}' has shape {:?}, too large to index",
                    file.name, file.shape
                ))
            })?;
        if file.data.len() != expected {
            return Err(ReduceError::invalid(format!(
                "'{}' holds {} values for shape {:?}",
                file.name,
                file.data.len(),
                file.shape
            )));
        }
        let values = file.data.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        let mut array = LabelledArray::from_shape_vec(file.name, file.dims, &file.shape, values)?;
        for (axis, coord) in file.coords {
            let coord = match coord {
                CoordFile::Values(v) => Coord::Values(v),
                CoordFile::Times(t) => Coord::Times(t),
                CoordFile::Labels(l) => Coord::Labels(l),
            };
            array = array.with_coord(&axis, coord)?;
        }
        Ok(array)
    }
}

/// JSON dataset files
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStore {
    pretty: bool,
}

impl JsonStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output, easier to read by eye.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Reads a dataset together with its attributes.
    pub fn read(&self, path: &Path) -> Result<(Dataset, Attributes)> {
        let reader = BufReader::new(File::open(path)?);
        let file: DatasetFile = serde_json::from_reader(reader)?;
        let mut dataset = Dataset::new();
        for variable in file.variables {
            dataset.insert(LabelledArray::try_from(variable)?);
        }
        debug!(path = %path.display(), variables = dataset.len(), "loaded dataset");
        Ok((dataset, file.attributes))
    }
}

impl DatasetSource for JsonStore {
    fn load(&self, path: &Path) -> Result<Dataset> {
        self.read(path).map(|(dataset, _)| dataset)
    }
}

impl DatasetSink for JsonStore {
    /// Writes to a temporary file beside `path`, then renames it into place.
    fn write(&self, dataset: &Dataset, attributes: &Attributes, path: &Path) -> Result<()> {
        let file = DatasetFile {
            attributes: attributes.clone(),
            variables: dataset.iter().map(VariableFile::from).collect(),
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            if self.pretty {
                serde_json::to_writer_pretty(&mut writer, &file)?;
            } else {
                serde_json::to_writer(&mut writer, &file)?;
            }
            writer.flush()?;
        }
        tmp.persist(path).map_err(|e| ReduceError::IoError(e.error))?;
        debug!(path = %path.display(), variables = dataset.len(), "wrote dataset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample() -> Dataset {
        let time = NaiveDate::from_ymd_opt(2010, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let t = LabelledArray::from_shape_vec("T", ["time_counter", "deptht"], &[1, 3], vec![1.0, f64::NAN, 3.0])
            .unwrap()
            .with_coord("time_counter", Coord::Times(vec![time]))
            .unwrap()
            .with_coord("deptht", Coord::Values(vec![5.0, 15.0, 25.0]))
            .unwrap();
        let r = LabelledArray::from_shape_vec("R", ["region"], &[2], vec![0.5, 0.25])
            .unwrap()
            .with_coord("region", Coord::Labels(vec!["GO".into(), "AB".into()]))
            .unwrap();
        Dataset::from_arrays([t, r])
    }

    #[test]
    fn write_then_read_keeps_coordinates_and_missing_values() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out").join("sample.json");
        let mut attrs = Attributes::new();
        attrs.insert("model".into(), "TOM12_TJ_LA50".into());

        JsonStore::pretty().write(&sample(), &attrs, &path)?;
        let (back, back_attrs) = JsonStore::new().read(&path)?;

        assert_eq!(back_attrs, attrs);
        assert_eq!(back.names(), vec!["T", "R"]);
        let t = back.require("T")?;
        assert!(t.data()[[0, 1]].is_nan());
        assert_eq!(t.coords(), sample().require("T")?.coords());
        assert_eq!(back.require("R")?, sample().require("R")?);

        let text = fs::read_to_string(&path)?;
        assert!(text.contains("null"));
        Ok(())
    }

    #[test]
    fn no_temporary_files_are_left_behind() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a.json");
        JsonStore::new().write(&sample(), &Attributes::new(), &path)?;
        let entries = fs::read_dir(dir.path())?.collect::<std::io::Result<Vec<_>>>()?;
        assert_eq!(entries.len(), 1);
        Ok(())
    }

    #[test]
    fn value_count_must_match_shape() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"variables": [{"name": "T", "dims": ["x"], "shape": [3], "data": [1.0, null]}]}"#,
        )?;
        let err = JsonStore::new().load(&path).unwrap_err();
        assert!(matches!(err, ReduceError::InvalidArray { .. }));
        Ok(())
    }

    #[test]
    fn oversized_shape_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("huge.json");
        fs::write(
            &path,
            r#"{"variables": [{"name": "T", "dims": ["a", "b", "c"], "shape": [4294967296, 4294967296, 2], "data": []}]}"#,
        )?;
        let err = JsonStore::new().load(&path).unwrap_err();
        assert!(matches!(err, ReduceError::InvalidArray { .. }));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = JsonStore::new()
            .load(Path::new("/nonexistent/ocean_reduce.json"))
            .unwrap_err();
        assert!(matches!(err, ReduceError::IoError(_)));
    }
}
