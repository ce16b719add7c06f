//! Cancellable mosaic passes.
//!
//! A pass walks the image block by block and yields to the runtime every
//! `pixel_budget` pixels. A newer request cancels the pass in flight and
//! waits for it to release the `running` flag before starting its own, so
//! the surface only ever receives the buffer of the newest completed pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use image::RgbaImage;
use tokio::select;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::effects::mosaic::{blocks, draw_plain, mosaic_block, sampling_buffer};
use crate::effects::{DrawOutcome, Effect, MosaicEffect};
use crate::error::Result;
use crate::surface::{lock_surface, SharedSurface};

/// Pacing of mosaic passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicSchedule {
    /// Pixels processed between two yields.
    pub pixel_budget: u64,
    /// Retry interval while waiting for the previous pass to stop.
    pub poll_interval: Duration,
    /// Pause at each yield; zero only yields to other tasks.
    pub frame_interval: Duration,
}

impl Default for MosaicSchedule {
    fn default() -> Self {
        Self {
            pixel_budget: 5000,
            poll_interval: Duration::from_millis(10),
            frame_interval: Duration::from_millis(16),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MosaicStats {
    pub started: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub superseded: u64,
}

#[derive(Debug)]
struct Shared {
    schedule: MosaicSchedule,
    running: AtomicBool,
    cancel_requested: AtomicBool,
    generation: AtomicU64,
    work: Mutex<RgbaImage>,
    shutdown: CancellationToken,
    started: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    superseded: AtomicU64,
}

/// Clears `running` when a pass ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct MosaicController {
    shared: Arc<Shared>,
}

impl MosaicController {
    pub fn new(schedule: MosaicSchedule, shutdown: CancellationToken) -> Self {
        Self {
            shared: Arc::new(Shared {
                schedule,
                running: AtomicBool::new(false),
                cancel_requested: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                work: Mutex::new(RgbaImage::new(0, 0)),
                shutdown,
                started: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                cancelled: AtomicU64::new(0),
                superseded: AtomicU64::new(0),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> MosaicStats {
        let s = &self.shared;
        MosaicStats {
            started: s.started.load(Ordering::SeqCst),
            completed: s.completed.load(Ordering::SeqCst),
            cancelled: s.cancelled.load(Ordering::SeqCst),
            superseded: s.superseded.load(Ordering::SeqCst),
        }
    }

    /// Asks the pass in flight to stop and invalidates every pending request.
    /// Returns the new generation ticket.
    pub fn request_cancel(&self) -> u64 {
        let ticket = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.cancel_requested.store(true, Ordering::SeqCst);
        ticket
    }

    fn is_cancelled(&self, ticket: u64) -> bool {
        let s = &self.shared;
        s.cancel_requested.load(Ordering::SeqCst)
            || s.generation.load(Ordering::SeqCst) != ticket
            || s.shutdown.is_cancelled()
    }

    /// Runs one mosaic pass, first cancelling and waiting out any pass in
    /// flight. Resolves once this request has been drawn, discarded or
    /// replaced.
    pub async fn draw_async(
        &self,
        surface: &SharedSurface,
        effect: &MosaicEffect,
        overlap: bool,
    ) -> Result<DrawOutcome> {
        let ticket = self.request_cancel();
        self.draw_with_ticket(ticket, surface, effect, overlap).await
    }

    /// Like [`draw_async`](Self::draw_async) for a request whose ticket was
    /// taken with [`request_cancel`](Self::request_cancel) when it arrived.
    pub async fn draw_with_ticket(
        &self,
        ticket: u64,
        surface: &SharedSurface,
        effect: &MosaicEffect,
        overlap: bool,
    ) -> Result<DrawOutcome> {
        let s = &self.shared;
        loop {
            if s.generation.load(Ordering::SeqCst) != ticket {
                return Ok(self.superseded(ticket));
            }
            if s.shutdown.is_cancelled() {
                return Ok(DrawOutcome::Cancelled);
            }
            if s
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                break;
            }
            trace!(ticket, "waiting for previous mosaic pass");
            select! {
                _ = s.shutdown.cancelled() => {}
                _ = sleep(s.schedule.poll_interval) => {}
            }
        }
        let _running = RunningGuard(&s.running);
        if s.generation.load(Ordering::SeqCst) != ticket {
            return Ok(self.superseded(ticket));
        }
        s.cancel_requested.store(false, Ordering::SeqCst);
        s.started.fetch_add(1, Ordering::SeqCst);
        debug!(ticket, overlap, "mosaic pass started");

        let result = self.run_pass(surface, effect, ticket).await;
        match &result {
            Ok(DrawOutcome::Drawn) => {
                s.completed.fetch_add(1, Ordering::SeqCst);
                debug!(ticket, "mosaic pass committed");
            }
            Ok(DrawOutcome::Cancelled) => {
                s.cancelled.fetch_add(1, Ordering::SeqCst);
                debug!(ticket, "mosaic pass cancelled");
            }
            Ok(_) => {}
            Err(err) => error!(ticket, error = %err, "mosaic pass failed"),
        }
        result
    }

    fn superseded(&self, ticket: u64) -> DrawOutcome {
        self.shared.superseded.fetch_add(1, Ordering::SeqCst);
        debug!(ticket, "mosaic request superseded");
        DrawOutcome::Superseded
    }

    async fn run_pass(
        &self,
        surface: &SharedSurface,
        effect: &MosaicEffect,
        ticket: u64,
    ) -> Result<DrawOutcome> {
        let block = {
            let mut guard = lock_surface(surface)?;
            if !guard.is_displayable() {
                debug!("no displayable image; mosaic skipped");
                return Ok(DrawOutcome::Skipped);
            }
            match effect.block() {
                Ok(1) => {
                    if self.is_cancelled(ticket) {
                        return Ok(DrawOutcome::Cancelled);
                    }
                    draw_plain(&mut guard)?;
                    return Ok(DrawOutcome::Drawn);
                }
                Ok(block) => block,
                Err(err) => {
                    warn!(effect = %effect.id(), error = %err, "draw skipped");
                    return Ok(DrawOutcome::Skipped);
                }
            }
        };

        let mut work = self.shared.work.lock().await;
        *work = {
            let mut guard = lock_surface(surface)?;
            sampling_buffer(&mut guard)?
        };
        let (width, height) = work.dimensions();
        let budget = self.shared.schedule.pixel_budget.max(1);
        let mut painted = 0u64;
        for rect in blocks(width, height, block) {
            if self.is_cancelled(ticket) {
                return Ok(DrawOutcome::Cancelled);
            }
            painted += mosaic_block(&mut work, rect, block)?;
            if painted > budget {
                painted -= budget;
                self.next_frame().await;
            }
        }

        let mut guard = lock_surface(surface)?;
        if self.is_cancelled(ticket) {
            return Ok(DrawOutcome::Cancelled);
        }
        guard.replace_buffer(std::mem::take(&mut *work));
        Ok(DrawOutcome::Drawn)
    }

    async fn next_frame(&self) {
        let interval = self.shared.schedule.frame_interval;
        if interval.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        select! {
            _ = self.shared.shutdown.cancelled() => {}
            _ = sleep(interval) => {}
        }
    }
}
