//! Dataset inspection and variable description
//!
//! Functions here print to standard output for the `inspect` subcommand and
//! return structured metadata for programmatic use.

use crate::errors::Result;
use crate::labelled::{Coord, Dataset, LabelledArray};

/// Structured metadata for one variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMetadata {
    pub name: String,
    pub dimensions: Vec<(String, usize)>,
    /// Coordinate kind per axis (`index`, `values`, `times`, `labels`)
    pub coordinates: Vec<&'static str>,
    pub total_elements: usize,
    pub missing_elements: usize,
}

/// Statistics over the non-missing values of a variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableSummary {
    pub count: usize,
    pub missing: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl VariableSummary {
    /// Summary of `array`; statistics are `NaN` when every value is missing.
    pub fn of(array: &LabelledArray) -> Self {
        let valid: Vec<f64> = array.data().iter().copied().filter(|v| v.is_finite()).collect();
        let count = valid.len();
        let missing = array.data().len() - count;
        if count == 0 {
            return Self {
                count,
                missing,
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                std_dev: f64::NAN,
            };
        }
        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = valid.iter().sum::<f64>() / count as f64;
        let std_dev = (valid.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / count as f64).sqrt();
        Self {
            count,
            missing,
            min,
            max,
            mean,
            std_dev,
        }
    }
}

/// Computes and prints quick statistics (min/mean/max/std) of a variable.
pub fn compute_variable_summary(dataset: &Dataset, var_name: &str) -> Result<VariableSummary> {
    let summary = VariableSummary::of(dataset.require(var_name)?);

    println!("\n Summary for Variable: {var_name}");
    println!("================================");
    println!("   Valid values: {}", summary.count);
    println!("   Missing values: {}", summary.missing);
    println!("   Min: {}", summary.min);
    println!("   Max: {}", summary.max);
    println!("   Mean: {:.4}", summary.mean);
    println!("   Std Dev: {:.4}", summary.std_dev);

    Ok(summary)
}

/// Lists all variables and dimensions, sorted by name.
pub fn list_variables_and_dimensions(dataset: &Dataset) -> Result<()> {
    let sizes = dataset.axis_sizes()?;

    println!("\n Dimensions");
    println!("==============");
    let mut dimensions: Vec<_> = sizes.iter().collect();
    dimensions.sort_by(|a, b| a.name.cmp(&b.name));
    if dimensions.is_empty() {
        println!("   (No dimensions found)");
    }
    for dim in dimensions {
        println!("    {} = {} ({})", dim.name, dim.length, dim.coord.kind());
    }

    println!("\n Variables");
    println!("=============");
    let mut variables: Vec<_> = dataset.iter().collect();
    variables.sort_by(|a, b| a.name().cmp(b.name()));
    if variables.is_empty() {
        println!("   (No variables found)");
    }
    for var in variables {
        if var.ndim() == 0 {
            println!("    {}: scalar", var.name());
        } else {
            let shape: Vec<String> = var.shape().iter().map(ToString::to_string).collect();
            println!(
                "    {}: [{}] = ({})",
                var.name(),
                var.dims().join(", "),
                shape.join(" x ")
            );
        }
        let missing = var.count_missing();
        if missing > 0 {
            println!("      missing values: {missing}");
        }
    }

    Ok(())
}

fn describe_coord(coord: &Coord) -> String {
    match coord {
        Coord::Index => "index".to_string(),
        Coord::Values(v) => match (v.first(), v.last()) {
            (Some(first), Some(last)) => format!("values {first} .. {last}"),
            _ => "values (empty)".to_string(),
        },
        Coord::Times(t) => match (t.first(), t.last()) {
            (Some(first), Some(last)) => format!("times {first} .. {last}"),
            _ => "times (empty)".to_string(),
        },
        Coord::Labels(l) => format!("labels [{}]", l.join(", ")),
    }
}

/// Describes a variable: its axes, their coordinates and its size.
pub fn describe_variable(dataset: &Dataset, var_name: &str) -> Result<VariableMetadata> {
    let var = dataset.require(var_name)?;
    let metadata = get_variable_metadata(var);

    println!("\n Variable Description: {var_name}");
    println!("={}", "=".repeat(var_name.len() + 25));
    if metadata.dimensions.is_empty() {
        println!(" Dimensions: (scalar)");
    } else {
        println!(" Dimensions: [{}]", var.dims().join(", "));
        println!("\n Dimension Details:");
        for ((name, length), coord) in metadata.dimensions.iter().zip(var.coords()) {
            println!("    {name} = {length}: {}", describe_coord(coord));
        }
    }
    println!("\n Storage Information:");
    println!("    Total elements: {}", metadata.total_elements);
    println!("    Missing elements: {}", metadata.missing_elements);

    Ok(metadata)
}

/// Structured metadata for `var`.
pub fn get_variable_metadata(var: &LabelledArray) -> VariableMetadata {
    VariableMetadata {
        name: var.name().to_string(),
        dimensions: var
            .dims()
            .iter()
            .cloned()
            .zip(var.shape().iter().copied())
            .collect(),
        coordinates: var.coords().iter().map(Coord::kind).collect(),
        total_elements: var.data().len(),
        missing_elements: var.count_missing(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let t = LabelledArray::from_shape_vec("T", ["deptht", "x"], &[2, 2], vec![1.0, 3.0, f64::NAN, 5.0])
            .unwrap()
            .with_coord("deptht", Coord::Values(vec![5.0, 15.0]))
            .unwrap();
        Dataset::from_arrays([t])
    }

    #[test]
    fn summary_ignores_missing_values() {
        let s = compute_variable_summary(&sample(), "T").unwrap();
        assert_eq!(s.count, 3);
        assert_eq!(s.missing, 1);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 5.0);
        assert_eq!(s.mean, 3.0);
    }

    #[test]
    fn all_missing_summary_is_nan() {
        let a = LabelledArray::from_shape_vec("E", ["x"], &[2], vec![f64::NAN; 2]).unwrap();
        let s = VariableSummary::of(&a);
        assert_eq!(s.count, 0);
        assert!(s.mean.is_nan());
    }

    #[test]
    fn metadata_describes_axes() {
        let m = describe_variable(&sample(), "T").unwrap();
        assert_eq!(m.dimensions, vec![("deptht".to_string(), 2), ("x".to_string(), 2)]);
        assert_eq!(m.coordinates, vec!["values", "index"]);
        assert_eq!(m.total_elements, 4);
        assert_eq!(m.missing_elements, 1);
        assert!(describe_variable(&sample(), "S").is_err());
        assert!(list_variables_and_dimensions(&sample()).is_ok());
    }
}
