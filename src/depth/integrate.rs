use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use kurbo::{Point, Vec2};

use crate::depth::accumulator::IntegralAccumulator;
use crate::depth::generation::GenerationToken;
use crate::depth::gradient::GradientField;
use crate::depth::planner::{AngleSet, Direction, StartFrame};
use crate::foundation::error::{DepthError, DepthResult};

/// Default coordinator wake-up interval while waiting for workers.
pub const POLL_INTERVAL_MS: u64 = 4;

/// Worker pool settings for [`integrate`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct IntegrationThreading {
    /// Worker count override. `None` uses `available_parallelism - 1` (at least one).
    pub threads: Option<usize>,
    /// How often the coordinator re-checks the generation token, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for IntegrationThreading {
    fn default() -> Self {
        Self {
            threads: None,
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

/// Bookkeeping of one [`integrate`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct IntegrationStats {
    /// Directions handed to workers.
    pub angles_planned: usize,
    /// Directions whose every ray finished.
    pub angles_integrated: usize,
    /// Workers spawned.
    pub workers: usize,
    /// Rays launched per direction.
    pub start_points: usize,
    /// Whether any accumulator slot wrapped.
    pub overflowed: bool,
}

/// A completed integration: the accumulator plus stats.
#[derive(Debug)]
pub struct Integration {
    accumulator: Arc<IntegralAccumulator>,
    stats: IntegrationStats,
}

impl Integration {
    /// The filled accumulator.
    pub fn accumulator(&self) -> &IntegralAccumulator {
        &self.accumulator
    }

    /// Counters describing the run.
    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }
}

#[derive(Debug)]
enum WorkerSignal {
    AngleDone,
    Finished { worker: usize, integrated: usize },
    Panicked { worker: usize, message: String },
}

/// March every ray of one direction. Returns `false` if `stop` fired before the last ray.
fn march_direction(
    field: &GradientField,
    direction: Direction,
    frame: &StartFrame,
    acc: &IntegralAccumulator,
    stop: &dyn Fn() -> bool,
) -> bool {
    // Rays trace from the source side, so each one walks against its azimuth.
    let step = direction.opposite().step();
    for start in frame.points() {
        if stop() {
            return false;
        }
        if !frame.reaches_image(*start, step) {
            continue;
        }
        march_ray(field, step, *start, frame, acc);
    }
    true
}

fn march_ray(
    field: &GradientField,
    step: Vec2,
    start: Point,
    frame: &StartFrame,
    acc: &IntegralAccumulator,
) {
    let (w, h) = (i64::from(field.width()), i64::from(field.height()));
    let mut pos = start;
    let mut last = None;
    let mut integral = 0.0f64;
    for _ in 0..frame.max_steps() {
        let pixel = Point::new(pos.x.round(), pos.y.round());
        if !frame.in_march_region(pixel) {
            break;
        }
        let key = (pixel.x as i64, pixel.y as i64);
        if last != Some(key) {
            last = Some(key);
            let (x, y) = key;
            if (0..w).contains(&x) && (0..h).contains(&y) {
                let derivative = field
                    .slope(x as u32, y as u32)
                    .map_or(0.0, |(sx, sy)| step.x * f64::from(sx) + step.y * f64::from(sy));
                integral -= derivative;
                // `as` saturates at the i32 range.
                acc.add((y * w + x) as usize, integral.round() as i32);
            }
        }
        pos += step;
    }
}

/// Integrate `angles` on the calling thread, checking `token` between rays.
///
/// Returns how many directions ran to completion. Applying disjoint batches in any order
/// yields the same accumulator.
pub fn integrate_angles_into(
    field: &GradientField,
    angles: &[Direction],
    frame: &StartFrame,
    acc: &IntegralAccumulator,
    token: &GenerationToken,
) -> usize {
    let stop = || token.is_stale();
    angles
        .iter()
        .take_while(|d| march_direction(field, **d, frame, acc, &stop))
        .count()
}

fn build_thread_pool(threads: usize) -> DepthResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("normal-depth-worker-{i}"))
        .build()
        .map_err(|e| DepthError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

fn worker_count(threading: &IntegrationThreading, angles: usize) -> DepthResult<usize> {
    let wanted = match threading.threads {
        Some(0) => {
            return Err(DepthError::validation(
                "integration 'threads' must be >= 1 when set",
            ));
        }
        Some(n) => n,
        None => std::thread::available_parallelism()
            .map_or(1, |n| n.get().saturating_sub(1))
            .max(1),
    };
    Ok(wanted.min(angles))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Integrate every direction of `angles` in parallel into a fresh accumulator.
///
/// Workers run on a pool built for this call. Each one owns a round-robin share of the
/// angles and writes into the shared accumulator through atomic adds only. Returns
/// `Ok(None)` when `token` goes stale; workers are told to stop and awaited first.
#[tracing::instrument(skip_all, fields(angles = angles.len(), w = field.width(), h = field.height()))]
pub fn integrate(
    field: &GradientField,
    angles: &AngleSet,
    frame: &StartFrame,
    threading: &IntegrationThreading,
    token: &GenerationToken,
) -> DepthResult<Option<Integration>> {
    let workers = worker_count(threading, angles.len())?;
    let accumulator = Arc::new(IntegralAccumulator::new(field.width(), field.height()));
    let mut stats = IntegrationStats {
        angles_planned: angles.len(),
        workers,
        start_points: frame.points().len(),
        ..IntegrationStats::default()
    };
    if workers == 0 {
        return Ok(Some(Integration { accumulator, stats }));
    }
    if token.is_stale() {
        return Ok(None);
    }

    let pool = build_thread_pool(workers)?;
    let field = Arc::new(field.clone());
    let frame = Arc::new(frame.clone());
    let abort = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<WorkerSignal>();

    for (worker, share) in angles.partition(workers).into_iter().enumerate() {
        let field = Arc::clone(&field);
        let frame = Arc::clone(&frame);
        let acc = Arc::clone(&accumulator);
        let abort = Arc::clone(&abort);
        let token = token.clone();
        let tx = tx.clone();
        tracing::debug!(worker, angles = share.len(), "dispatch integration worker");
        pool.spawn(move || {
            let stop = || abort.load(Ordering::Relaxed) || token.is_stale();
            let run = catch_unwind(AssertUnwindSafe(|| {
                let mut integrated = 0;
                for direction in &share {
                    if !march_direction(&field, *direction, &frame, &acc, &stop) {
                        break;
                    }
                    integrated += 1;
                    let _ = tx.send(WorkerSignal::AngleDone);
                }
                integrated
            }));
            let signal = match run {
                Ok(integrated) => WorkerSignal::Finished { worker, integrated },
                Err(payload) => WorkerSignal::Panicked {
                    worker,
                    message: panic_message(payload.as_ref()),
                },
            };
            let _ = tx.send(signal);
        });
    }
    drop(tx);

    let poll = Duration::from_millis(threading.poll_interval_ms.max(1));
    let mut finished = 0;
    let mut aborted = false;
    let mut failure = None;
    while finished < workers {
        match rx.recv_timeout(poll) {
            Ok(WorkerSignal::AngleDone) => stats.angles_integrated += 1,
            Ok(WorkerSignal::Finished { worker, integrated }) => {
                finished += 1;
                tracing::debug!(worker, integrated, "integration worker finished");
            }
            Ok(WorkerSignal::Panicked { worker, message }) => {
                finished += 1;
                abort.store(true, Ordering::Relaxed);
                tracing::debug!(worker, %message, "integration worker panicked");
                if failure.is_none() {
                    failure = Some(format!("integration worker {worker} panicked: {message}"));
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if !aborted && token.is_stale() {
            aborted = true;
            abort.store(true, Ordering::Relaxed);
            tracing::debug!("integration superseded, stopping workers");
        }
    }
    drop(pool);

    if let Some(message) = failure {
        return Err(DepthError::evaluation(message));
    }
    if aborted || token.is_stale() {
        return Ok(None);
    }

    stats.overflowed = accumulator.overflowed();
    tracing::debug!(?stats, "integration complete");
    Ok(Some(Integration { accumulator, stats }))
}

#[cfg(test)]
#[path = "../../tests/unit/depth/integrate.rs"]
mod tests;
