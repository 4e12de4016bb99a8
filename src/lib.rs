//! Relative depth maps from surface-normal maps.
//!
//! The crate has two halves:
//!
//! - a typed raster expression compiler ([`RasterContext`] → [`ShaderGraph`] → [`Node`])
//!   that lowers per-pixel math to WGSL and runs it on a CPU interpreter or `wgpu`;
//! - a reconstruction pipeline that extracts slopes, plans integration directions,
//!   integrates them in parallel into a lock-free accumulator and normalizes the result.
//!
//! [`Reconstructor`] ties both together and supports generation-based cancellation.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Errors, pixel buffers and numeric helpers.
pub mod foundation;

/// Normal-to-depth reconstruction stages.
pub mod depth;
/// Raster expression graphs and their backends.
pub mod raster;

pub use crate::foundation::error::{DepthError, DepthResult};
pub use crate::foundation::grid::PixelGrid;

pub use crate::raster::backend::{BackendKind, RasterBackend, create_backend};
pub use crate::raster::cpu::CpuBackend;
#[cfg(feature = "gpu")]
pub use crate::raster::gpu::GpuBackend;
pub use crate::raster::graph::{Node, RasterContext, ShaderGraph};
pub use crate::raster::kind::{
    Boolean, Float, FloatLike, Integer, Kind, Matrix3, Numeric, Renderable, Scalar, ValueType,
    Vector2, Vector3, Vector4, VectorKind,
};
pub use crate::raster::program::{NodeId, RasterProgram};

pub use crate::depth::accumulator::IntegralAccumulator;
pub use crate::depth::generation::{GenerationToken, RenderGeneration};
pub use crate::depth::gradient::{
    GradientField, NormalConvention, SLOPE_OFFSET, extract_gradient, gradient_program,
};
pub use crate::depth::integrate::{
    Integration, IntegrationStats, IntegrationThreading, integrate, integrate_angles_into,
};
pub use crate::depth::normalize::{FLAT_MIDPOINT, PostProcess, normalize, post_process};
pub use crate::depth::pipeline::{
    PendingDepth, ReconstructOpts, ReconstructRequest, Reconstruction, Reconstructor,
};
pub use crate::depth::planner::{
    AngleSet, Direction, FramePolicy, StartFrame, maximum_angle_count, plan_angles,
    plan_start_frame,
};
