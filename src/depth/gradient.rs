use std::sync::Arc;

use crate::foundation::error::DepthResult;
use crate::foundation::grid::PixelGrid;
use crate::raster::graph::{Node, RasterContext, ShaderGraph};
use crate::raster::kind::Vector4;
use crate::raster::program::RasterProgram;

/// Channel value encoding zero slope: half the byte range, so `0` and `255` decode to
/// opposite slopes.
pub const SLOPE_OFFSET: f32 = 255.0 / 2.0;

/// Green-channel orientation of a tangent-space normal map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalConvention {
    /// Green points up (+Y).
    #[default]
    OpenGl,
    /// Green points down; flipped before extraction.
    DirectX,
}

/// Per-pixel slope field.
///
/// Red and green hold the x/y slope offset by [`SLOPE_OFFSET`]; blue is zero where the
/// surface is unreliable.
#[derive(Clone, Debug, PartialEq)]
pub struct GradientField {
    grid: Arc<PixelGrid>,
}

impl GradientField {
    /// Wrap an already-encoded gradient grid.
    pub fn from_grid(grid: impl Into<Arc<PixelGrid>>) -> Self {
        Self { grid: grid.into() }
    }

    /// Underlying RGBA8 grid.
    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    /// Decoded `(dx, dy)` slope at a pixel, or `None` where the surface is invalid or the
    /// pixel lies outside the field.
    pub fn slope(&self, x: u32, y: u32) -> Option<(f32, f32)> {
        let [r, g, b, _] = self.grid.pixel(x, y)?;
        if b == 0 {
            return None;
        }
        Some((f32::from(r) - SLOPE_OFFSET, f32::from(g) - SLOPE_OFFSET))
    }
}

fn gradient_node<'g>(
    graph: &'g ShaderGraph<'_>,
    normal: Arc<PixelGrid>,
    convention: NormalConvention,
) -> DepthResult<Node<'g, Vector4>> {
    let n = graph.texture(normal)?;
    let r = n.x();
    let g = match convention {
        NormalConvention::OpenGl => n.y(),
        NormalConvention::DirectX => graph.float(1.0) - n.y(),
    };
    let b = n.z();
    let validity = b.minimum(r.minimum(g));
    Ok(graph.vec4(r / b, g / b, validity, graph.float(1.0)))
}

/// Convert a normal map into a [`GradientField`] through the raster compiler.
#[tracing::instrument(skip(ctx, normal), fields(w = normal.width(), h = normal.height()))]
pub fn extract_gradient(
    ctx: &mut RasterContext,
    normal: &Arc<PixelGrid>,
    convention: NormalConvention,
) -> DepthResult<GradientField> {
    let graph = ctx.bind(normal.width(), normal.height());
    let grid = {
        let out = gradient_node(&graph, Arc::clone(normal), convention)?;
        graph.render(out)?
    };
    graph.purge();
    Ok(GradientField::from_grid(grid))
}

/// Lowered gradient-extraction program for a `width x height` target, without executing it.
pub fn gradient_program(
    ctx: &mut RasterContext,
    width: u32,
    height: u32,
    convention: NormalConvention,
) -> DepthResult<RasterProgram> {
    let placeholder = Arc::new(PixelGrid::filled(width, height, [128, 128, 255, 255])?);
    let graph = ctx.bind(width, height);
    let program = {
        let out = gradient_node(&graph, placeholder, convention)?;
        graph.compile(out)
    };
    graph.purge();
    Ok(program)
}

#[cfg(test)]
#[path = "../../tests/unit/depth/gradient.rs"]
mod tests;
