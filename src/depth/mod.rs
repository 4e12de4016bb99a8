//! Normal-map to depth-map reconstruction.
//!
//! Stages, in pipeline order: [`gradient`] extraction on the raster backend, direction and
//! start-point [`planner`], parallel [`integrate`] into a shared [`accumulator`],
//! [`normalize`] plus post-processing. [`generation`] cancels superseded work and
//! [`pipeline`] wires everything into [`Reconstructor`](crate::Reconstructor).

/// Atomic per-pixel sums and visit counts.
pub mod accumulator;
/// Generation-based cancellation.
pub mod generation;
/// Slope extraction from normal maps.
pub mod gradient;
/// Parallel line integration.
pub mod integrate;
/// Range normalization and post-processing.
pub mod normalize;
/// Reconstruction coordinator.
pub mod pipeline;
/// Direction and start-point planning.
pub mod planner;
