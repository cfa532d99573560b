//! ocean_reduce: weighted reductions of gridded ocean model output
//!
//! A library for collapsing multi-dimensional ocean model fields along depth,
//! horizontal regions and time. Every reduction treats `NaN` as a missing
//! value: missing cells never contribute to sums, weights or counts.
//!
//! ## Key Features
//!
//! - **Vertical reductions**: thickness-weighted depth integrals and averages,
//!   optionally limited to layers above a depth bound
//! - **Regional reductions**: mask-weighted means over named regions, stacked
//!   along a `region` axis in the order given
//! - **Dimension alignment**: weight fields on a grid whose axes are named
//!   differently from the data are matched by role, not by name
//! - **Temporal helpers**: monthly climatologies and time series of maxima
//! - **Batch processing**: independent model/year units run in parallel; one
//!   failing unit never stops the others
//!
//! ## Module Organization
//!
//! - [`labelled`]: arrays with named axes and coordinates, and datasets of them
//! - [`align`]: axis role detection and weight broadcasting
//! - [`reduce`]: the reduction engine
//! - [`store`]: dataset loading and persistence collaborators
//! - [`config`]: batch configuration
//! - [`batch`]: the multi-unit driver
//! - [`metadata`]: dataset inspection and variable description
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust
//! use ocean_reduce::prelude::*;
//!
//! // One column with four layers; the deepest is missing.
//! let data = LabelledArray::from_shape_vec(
//!     "DIA",
//!     ["deptht"],
//!     &[4],
//!     vec![20.0, 2.0, 60.0, f64::NAN],
//! )?
//! .with_coord("deptht", Coord::Values(vec![5.0, 15.0, 25.0, 40.0]))?;
//! let thickness = LabelledArray::from_shape_vec("e3t_0", ["deptht"], &[4], vec![1.0, 2.0, 3.0, 4.0])?;
//!
//! let weight = AlignedWeight::from_field(thickness);
//! let integral = reduce_variable(&data, &weight, "deptht", None, ReductionMode::Integrate)?;
//! assert_eq!(integral.data().iter().next().copied(), Some(20.0 + 4.0 + 180.0));
//! # Ok::<(), ocean_reduce::ReduceError>(())
//! ```

// Core modules
pub mod align;
pub mod batch;
pub mod config;
pub mod errors;
pub mod labelled;
pub mod metadata;
pub mod parallel;
pub mod reduce;
pub mod store;

pub use errors::{ReduceError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::align::{AlignedWeight, AxisRole, DataAxes, DimensionAligner, GridConvention};
    pub use crate::batch::{run_batch, BatchReport};
    pub use crate::config::{BatchConfig, Job, WorkUnit};
    pub use crate::errors::{ReduceError, Result};
    pub use crate::labelled::{Coord, Dataset, LabelledArray};
    pub use crate::parallel::ParallelConfig;
    pub use crate::reduce::{
        reduce_variable, regional_reduce, vertical_reduce, MaskWeighting, ReducedSet,
        ReductionMode, Region, VerticalSpec,
    };
    pub use crate::store::{DatasetSink, DatasetSource, JsonStore};
}
