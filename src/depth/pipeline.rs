use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use crate::depth::generation::{GenerationToken, RenderGeneration};
use crate::depth::gradient::{NormalConvention, extract_gradient};
use crate::depth::integrate::{IntegrationStats, IntegrationThreading, integrate};
use crate::depth::normalize::{PostProcess, normalize, post_process};
use crate::depth::planner::{FramePolicy, plan_angles, plan_start_frame};
use crate::foundation::error::{DepthError, DepthResult};
use crate::foundation::grid::PixelGrid;
use crate::raster::backend::BackendKind;
use crate::raster::graph::RasterContext;

/// Tunables of one reconstruction. Every field has a default, so partial JSON is accepted.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReconstructOpts {
    /// Fraction of the maximum direction count to integrate, in `[0, 1]`.
    pub quality: f32,
    /// Radial perspective correction strength; `0` disables it.
    pub perspective_factor: f32,
    /// Ray launch layout.
    pub frame: FramePolicy,
    /// Force invalid pixels to zero.
    pub mask: bool,
    /// Write the validity mask into alpha.
    pub alpha_from_mask: bool,
    /// Green-channel orientation of the input.
    pub convention: NormalConvention,
    /// Worker pool settings.
    pub threading: IntegrationThreading,
}

impl Default for ReconstructOpts {
    fn default() -> Self {
        Self {
            quality: 0.25,
            perspective_factor: 0.0,
            frame: FramePolicy::Circular,
            mask: true,
            alpha_from_mask: false,
            convention: NormalConvention::OpenGl,
            threading: IntegrationThreading::default(),
        }
    }
}

impl ReconstructOpts {
    /// Parse options from JSON.
    pub fn from_json_str(s: &str) -> DepthResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| DepthError::validation(format!("invalid reconstruct options: {e}")))
    }

    /// Post-processing subset of these options.
    pub fn post_process(&self) -> PostProcess {
        PostProcess {
            perspective_factor: self.perspective_factor,
            mask: self.mask,
            alpha_from_mask: self.alpha_from_mask,
        }
    }
}

/// Inputs of one reconstruction.
#[derive(Clone, Debug)]
pub struct ReconstructRequest {
    /// Tangent-space normal map.
    pub normal_map: Arc<PixelGrid>,
    /// Validity source for masking. Defaults to the normal map.
    pub mask: Option<Arc<PixelGrid>>,
    /// Tunables.
    pub opts: ReconstructOpts,
}

impl ReconstructRequest {
    /// A request with default options and no separate mask.
    pub fn new(normal_map: impl Into<Arc<PixelGrid>>) -> Self {
        Self {
            normal_map: normal_map.into(),
            mask: None,
            opts: ReconstructOpts::default(),
        }
    }

    /// Use `mask` instead of the normal map as validity source.
    pub fn with_mask(mut self, mask: impl Into<Arc<PixelGrid>>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    /// Replace the options.
    pub fn with_opts(mut self, opts: ReconstructOpts) -> Self {
        self.opts = opts;
        self
    }
}

/// A finished depth map plus integration counters.
#[derive(Clone, Debug)]
pub struct Reconstruction {
    /// Grey depth image, same size as the normal map.
    pub depth: PixelGrid,
    /// Integration bookkeeping.
    pub stats: IntegrationStats,
}

/// Entry point for normal-to-depth reconstruction.
///
/// Every job builds its own [`RasterContext`] on the configured backend. All jobs share one
/// [`RenderGeneration`]: [`Reconstructor::cancel_all`] abandons every job in flight.
#[derive(Clone, Debug)]
pub struct Reconstructor {
    backend: BackendKind,
    generation: RenderGeneration,
}

impl Reconstructor {
    /// A reconstructor rendering on `backend`.
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            generation: RenderGeneration::new(),
        }
    }

    /// Backend used by new jobs.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Shared generation counter.
    pub fn generation(&self) -> &RenderGeneration {
        &self.generation
    }

    /// Supersede every job started so far.
    pub fn cancel_all(&self) {
        self.generation.cancel_all();
    }

    /// Reconstruct on the calling thread. `Ok(None)` means the job was superseded.
    pub fn reconstruct(&self, req: &ReconstructRequest) -> DepthResult<Option<PixelGrid>> {
        Ok(self.reconstruct_with_stats(req)?.map(|r| r.depth))
    }

    /// [`Reconstructor::reconstruct`], also returning integration counters.
    pub fn reconstruct_with_stats(
        &self,
        req: &ReconstructRequest,
    ) -> DepthResult<Option<Reconstruction>> {
        self.reconstruct_with_token(req, &self.generation.token())
    }

    /// Reconstruct under an explicit generation token.
    pub fn reconstruct_with_token(
        &self,
        req: &ReconstructRequest,
        token: &GenerationToken,
    ) -> DepthResult<Option<Reconstruction>> {
        run(self.backend, req, token)
    }

    /// Start a job on its own coordinator thread.
    pub fn submit(&self, req: ReconstructRequest) -> PendingDepth {
        self.submit_with_token(req, self.generation.token())
    }

    /// [`Reconstructor::submit`] under an explicit generation token.
    pub fn submit_with_token(&self, req: ReconstructRequest, token: GenerationToken) -> PendingDepth {
        let (tx, rx) = mpsc::channel();
        let backend = self.backend;
        let job_tx = tx.clone();
        let spawned = std::thread::Builder::new()
            .name("normal-depth-job".to_string())
            .spawn(move || match run(backend, &req, &token) {
                Ok(Some(done)) => {
                    let _ = job_tx.send(Ok(done.depth));
                }
                Ok(None) => tracing::debug!(
                    generation = token.captured(),
                    "reconstruction superseded"
                ),
                Err(e) => {
                    let _ = job_tx.send(Err(e));
                }
            });
        if let Err(e) = spawned {
            let _ = tx.send(Err(DepthError::Other(
                anyhow::Error::new(e).context("spawn reconstruction thread"),
            )));
        }
        PendingDepth { rx }
    }
}

/// Handle to a submitted job.
///
/// A superseded job never delivers anything: once its thread exits, [`PendingDepth::wait`]
/// returns `None` and [`PendingDepth::try_take`] keeps returning `None`.
#[derive(Debug)]
pub struct PendingDepth {
    rx: Receiver<DepthResult<PixelGrid>>,
}

impl PendingDepth {
    /// Block until the job delivers or is dropped.
    pub fn wait(self) -> Option<DepthResult<PixelGrid>> {
        self.rx.recv().ok()
    }

    /// Take the result if it is ready.
    pub fn try_take(&mut self) -> Option<DepthResult<PixelGrid>> {
        match self.rx.try_recv() {
            Ok(out) => Some(out),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<DepthResult<PixelGrid>> {
        match self.rx.recv_timeout(timeout) {
            Ok(out) => Some(out),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

#[tracing::instrument(skip_all, fields(
    w = req.normal_map.width(),
    h = req.normal_map.height(),
    generation = token.captured()
))]
fn run(
    backend: BackendKind,
    req: &ReconstructRequest,
    token: &GenerationToken,
) -> DepthResult<Option<Reconstruction>> {
    let normal = &req.normal_map;
    let (width, height) = (normal.width(), normal.height());
    if let Some(mask) = &req.mask
        && !mask.same_size(normal)
    {
        return Err(DepthError::validation(format!(
            "mask is {}x{}, normal map is {width}x{height}",
            mask.width(),
            mask.height()
        )));
    }
    if token.is_stale() {
        return Ok(None);
    }
    if normal.is_empty() {
        return Ok(Some(Reconstruction {
            depth: PixelGrid::new(width, height, Vec::new())?,
            stats: IntegrationStats::default(),
        }));
    }

    let opts = &req.opts;
    let mut ctx = RasterContext::with_backend(backend)?;
    let field = extract_gradient(&mut ctx, normal, opts.convention)?;
    if token.is_stale() {
        return Ok(None);
    }

    let angles = plan_angles(width, height, opts.quality);
    let frame = plan_start_frame(width, height, opts.frame);
    let Some(integration) = integrate(&field, &angles, &frame, &opts.threading, token)? else {
        return Ok(None);
    };
    if token.is_stale() {
        return Ok(None);
    }

    let depth = Arc::new(normalize(integration.accumulator())?);
    if token.is_stale() {
        return Ok(None);
    }

    let mask_source = req.mask.as_ref().unwrap_or(normal);
    let depth = post_process(&mut ctx, &depth, Some(mask_source), &opts.post_process())?;
    if token.is_stale() {
        return Ok(None);
    }

    tracing::debug!(stats = ?integration.stats(), "reconstruction complete");
    Ok(Some(Reconstruction {
        depth,
        stats: integration.stats(),
    }))
}

#[cfg(test)]
#[path = "../../tests/unit/depth/pipeline.rs"]
mod tests;
