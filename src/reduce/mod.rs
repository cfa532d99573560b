//! Weighted reductions over labelled ocean model fields
//!
//! Every reduction here is a pure function of its inputs: inputs are never
//! mutated and each call allocates a fresh result. Missing values (`NaN`) are
//! excluded from sums and weights alike.
//!
//! # Organization
//!
//! - [`operations`]: reduction parameters, result sets and the shared accumulator
//! - [`vertical`]: depth-bounded integrals and averages
//! - [`regional`]: mask-weighted regional and latitudinal means
//! - [`levels`]: model-level selection by index
//! - [`climatology`]: monthly climatologies
//! - [`extrema`]: missing-aware maxima (overturning strength)

pub mod climatology;
pub mod extrema;
pub mod levels;
pub mod operations;
pub mod regional;
pub mod vertical;

pub use climatology::{climatology_all, monthly_climatology, MONTH_AXIS};
pub use extrema::{nan_max, overturning_maximum};
pub use levels::{mean_of_levels, select_level, LevelSelection};
pub use operations::{FailedVariable, MaskWeighting, ReducedSet, ReductionMode, VerticalSpec};
pub use regional::{
    latitudinal_profile, latitudinal_profiles, masked_mean, regional_reduce, regional_reduce_all,
    Region, REGION_AXIS,
};
pub use vertical::{depth_reduce, reduce_variable, select_depths, top_layer_means, vertical_reduce};
