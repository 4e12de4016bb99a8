use crate::foundation::error::DepthResult;
use crate::foundation::grid::PixelGrid;
use crate::raster::program::RasterProgram;

/// Executes lowered raster programs onto an RGBA8 target.
///
/// Implementations must store fragment output the way an `Rgba8Unorm` render target does,
/// so the CPU and GPU backends agree to within one unit per channel.
pub trait RasterBackend {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Run `program` over every pixel of its target. `inputs[i]` is bound to texture slot `i`.
    fn execute(&mut self, program: &RasterProgram, inputs: &[&PixelGrid])
    -> DepthResult<PixelGrid>;
}

/// Selects a [`RasterBackend`] implementation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Interpreter running on the rayon thread pool.
    #[default]
    Cpu,
    /// `wgpu` render pipeline.
    #[cfg(feature = "gpu")]
    Gpu,
}

/// Create a fresh backend of `kind`.
pub fn create_backend(kind: BackendKind) -> DepthResult<Box<dyn RasterBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::raster::cpu::CpuBackend::new())),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Ok(Box::new(crate::raster::gpu::GpuBackend::new()?)),
    }
}
