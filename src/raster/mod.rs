//! Typed raster expression graphs compiled to WGSL and executed per pixel.
//!
//! A [`RasterContext`](crate::RasterContext) owns a backend. Binding it yields a
//! [`ShaderGraph`](crate::ShaderGraph) whose [`Node`](crate::Node)s record one instruction
//! each; rendering lowers the reachable instructions into a [`RasterProgram`] and runs it on
//! either the rayon interpreter or a `wgpu` render pipeline.

/// Backend trait and selection.
pub mod backend;
/// Rayon interpreter backend.
pub mod cpu;
/// `wgpu` render-pipeline backend.
#[cfg(feature = "gpu")]
pub mod gpu;
/// Graph builder and typed nodes.
pub mod graph;
pub mod kind;
/// Lowered programs.
pub mod program;
pub(crate) mod wgsl;

pub use program::RasterProgram;
