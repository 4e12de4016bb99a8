use std::sync::Arc;

use crate::depth::accumulator::IntegralAccumulator;
use crate::foundation::error::DepthResult;
use crate::foundation::grid::PixelGrid;
use crate::raster::graph::RasterContext;

/// Grey level of a flat (degenerate) depth map.
pub const FLAT_MIDPOINT: u8 = 128;

/// Validity below half a byte step counts as "no surface".
const MASK_EDGE: f32 = 0.5 / 255.0;

/// Turn accumulated ray sums into an 8-bit grey depth map.
///
/// Each sum is first rescaled by `max_count / max(count - 1, 1)` so pixels visited by fewer
/// rays are comparable to well-covered ones, then the global range is mapped onto
/// `[0, 255]`. A flat range maps to [`FLAT_MIDPOINT`]. Pure: the same accumulator always
/// gives the same bytes.
#[tracing::instrument(skip_all, fields(w = acc.width(), h = acc.height()))]
pub fn normalize(acc: &IntegralAccumulator) -> DepthResult<PixelGrid> {
    let (width, height) = (acc.width(), acc.height());
    if acc.overflowed() {
        tracing::warn!(
            width,
            height,
            "depth accumulator overflowed i32; output uses wrapped sums"
        );
    }
    if acc.is_empty() {
        return PixelGrid::new(width, height, Vec::new());
    }

    let sums = acc.sums();
    let counts = acc.counts();
    let max_count = f64::from(counts.iter().copied().max().unwrap_or(0));
    let rescaled: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, c)| f64::from(*s) * max_count / f64::from(c.saturating_sub(1).max(1)))
        .collect();

    let (lo, hi) = rescaled
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let span = hi - lo;

    let mut data = Vec::with_capacity(rescaled.len() * 4);
    for v in rescaled {
        let grey = if span > 0.0 {
            ((v - lo) / span * 255.0).round() as u8
        } else {
            FLAT_MIDPOINT
        };
        data.extend_from_slice(&[grey, grey, grey, 255]);
    }
    PixelGrid::new(width, height, data)
}

/// Settings of [`post_process`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PostProcess {
    /// Radial correction strength in byte units per squared pixel; `0` disables it.
    pub perspective_factor: f32,
    /// Zero out pixels whose mask validity is zero.
    pub mask: bool,
    /// Write the mask into alpha instead of keeping it opaque.
    pub alpha_from_mask: bool,
}

impl Default for PostProcess {
    fn default() -> Self {
        Self {
            perspective_factor: 0.0,
            mask: true,
            alpha_from_mask: false,
        }
    }
}

/// Apply perspective correction and masking to a normalized depth map on the raster backend.
///
/// `mask_source` supplies validity as `min(r, g, b)`; usually the normal map the depth came
/// from. Without a source, masking is skipped. With nothing enabled the depth map is
/// returned unchanged.
#[tracing::instrument(skip_all, fields(w = depth.width(), h = depth.height()))]
pub fn post_process(
    ctx: &mut RasterContext,
    depth: &Arc<PixelGrid>,
    mask_source: Option<&Arc<PixelGrid>>,
    opts: &PostProcess,
) -> DepthResult<PixelGrid> {
    let factor = if opts.perspective_factor.is_finite() {
        opts.perspective_factor
    } else {
        0.0
    };
    let mask_source = mask_source.filter(|_| opts.mask || opts.alpha_from_mask);
    if factor == 0.0 && mask_source.is_none() {
        return Ok(PixelGrid::clone(depth));
    }

    let graph = ctx.bind(depth.width(), depth.height());
    let grid = {
        let d = graph.texture(Arc::clone(depth))?;
        let mut value = d.x();
        if factor != 0.0 {
            let c = graph.frag_coord() - graph.resolution() * graph.float(0.5);
            value = value + c.dot(c) * graph.float(factor / 255.0);
        }
        let mut alpha = graph.float(1.0);
        if let Some(source) = mask_source {
            let m = graph.texture(Arc::clone(source))?;
            let validity = m.x().minimum(m.y().minimum(m.z()));
            let keep = graph.step(graph.float(MASK_EDGE), validity);
            if opts.mask {
                value = value * keep;
            }
            if opts.alpha_from_mask {
                alpha = keep;
            }
        }
        graph.render(graph.vec4(value, value, value, alpha))?
    };
    graph.purge();
    Ok(grid)
}

#[cfg(test)]
#[path = "../../tests/unit/depth/normalize.rs"]
mod tests;
