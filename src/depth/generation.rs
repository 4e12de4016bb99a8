use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter naming the "current" render for one logical output.
///
/// Starting a new render does not cancel older ones by itself; calling
/// [`RenderGeneration::cancel_all`] makes every previously issued token stale.
#[derive(Clone, Debug, Default)]
pub struct RenderGeneration {
    current: Arc<AtomicU64>,
}

impl RenderGeneration {
    /// A controller starting at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation value.
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Invalidate every outstanding token.
    pub fn cancel_all(&self) {
        let next = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(generation = next, "render generation advanced");
    }

    /// Capture the current generation.
    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            captured: self.current(),
            current: Arc::clone(&self.current),
        }
    }
}

/// Snapshot of a [`RenderGeneration`], checked by long-running work between steps.
#[derive(Clone, Debug)]
pub struct GenerationToken {
    captured: u64,
    current: Arc<AtomicU64>,
}

impl GenerationToken {
    /// A token tied to no shared controller. It never goes stale.
    pub fn detached() -> Self {
        RenderGeneration::new().token()
    }

    /// The generation captured when the token was issued.
    pub fn captured(&self) -> u64 {
        self.captured
    }

    /// `true` once the controller has advanced past the captured generation.
    pub fn is_stale(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.captured
    }

    /// `!is_stale()`.
    pub fn is_current(&self) -> bool {
        !self.is_stale()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/depth/generation.rs"]
mod tests;
