use crate::render::surface::RenderBuffer;

/// Default number of idle buffers kept after [`SurfacePool::flush`].
pub const DEFAULT_POOL_CAPACITY: usize = 6;

/// Pool counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePoolStats {
    /// Idle buffers currently retained.
    pub retained: usize,
    /// Temporaries handed out and not yet recycled.
    pub outstanding: usize,
    /// Buffers allocated because the pool was empty.
    pub allocated: u64,
    /// Dedicated buffers allocated through [`SurfacePool::make_render_buffer`].
    pub dedicated: u64,
    /// Acquisitions served from the pool.
    pub reused: u64,
    /// Buffers dropped when trimming to capacity.
    pub trimmed: u64,
}

/// Per-frame pool of temporary offscreen buffers.
///
/// Temporaries are taken with [`SurfacePool::acquire`] and given back by value with
/// [`SurfacePool::recycle`], so a returned buffer cannot be touched again by the caller.
/// [`SurfacePool::flush`] runs once per frame after drawing: every buffer returned during the
/// frame is collapsed to 0x0 and kept, then the idle list is trimmed to capacity.
#[derive(Debug)]
pub struct SurfacePool {
    capacity: usize,
    idle: Vec<RenderBuffer>,
    returned: Vec<RenderBuffer>,
    stats: SurfacePoolStats,
}

impl Default for SurfacePool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl SurfacePool {
    /// Pool keeping at most `capacity` idle buffers across frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            idle: Vec::new(),
            returned: Vec::new(),
            stats: SurfacePoolStats::default(),
        }
    }

    /// Counters snapshot.
    pub fn stats(&self) -> SurfacePoolStats {
        SurfacePoolStats {
            retained: self.idle.len(),
            ..self.stats
        }
    }

    /// Maximum idle buffers kept by [`SurfacePool::flush`].
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take a cleared temporary of at least `width` x `height`. Pooled buffers only grow.
    pub fn acquire(&mut self, width: u32, height: u32) -> RenderBuffer {
        self.stats.outstanding += 1;
        let Some(mut buf) = self.idle.pop() else {
            self.stats.allocated += 1;
            return RenderBuffer::new(width, height);
        };
        self.stats.reused += 1;
        let (w, h) = buf.size();
        buf.resize(w.max(width), h.max(height), None);
        buf
    }

    /// Allocate a dedicated buffer that never enters the pool.
    pub fn make_render_buffer(&mut self, width: u32, height: u32) -> RenderBuffer {
        self.stats.dedicated += 1;
        RenderBuffer::new(width, height)
    }

    /// Hand a temporary back. It becomes reusable after the next [`SurfacePool::flush`].
    pub fn recycle(&mut self, buf: RenderBuffer) {
        self.stats.outstanding = self.stats.outstanding.saturating_sub(1);
        self.returned.push(buf);
    }

    /// End-of-frame: collapse this frame's temporaries, pool them, trim to capacity.
    pub fn flush(&mut self) {
        if self.stats.outstanding > 0 {
            tracing::warn!(
                outstanding = self.stats.outstanding,
                "temporary buffers still held at pool flush"
            );
        }
        for mut buf in self.returned.drain(..) {
            buf.collapse();
            self.idle.push(buf);
        }
        if self.idle.len() > self.capacity {
            let excess = self.idle.len() - self.capacity;
            self.idle.truncate(self.capacity);
            self.stats.trimmed += excess as u64;
        }
        tracing::trace!(retained = self.idle.len(), "surface pool flushed");
    }

    /// Idle buffers, for inspection.
    pub fn idle(&self) -> &[RenderBuffer] {
        &self.idle
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface_pool.rs"]
mod tests;
