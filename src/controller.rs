/// Window controller — shares one [`Window`] between the capture path
/// and the periodic drain.
///
/// The capture path (scanner callback, possibly interrupt context) calls
/// [`WindowController::record`]; the periodic tick calls
/// [`WindowController::drain`]. Both go through a critical-section mutex,
/// and the "window active" flag is read and written only inside it. Once
/// `drain` has cleared the flag, no capture call can touch the table until
/// the reset is done, so a frame never contains a half-written record and
/// a reset never races an insert.
///
/// Critical sections are short and bounded: one probe sequence plus a
/// 31-byte copy on capture, one record copy per slot while draining, and
/// one table clear on reset. Sink writes happen outside them.
use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;

use crate::comm::ByteSink;
use crate::config::WindowConfig;
use crate::error::{Error, Result};
use crate::protocol::FrameEncoder;
use crate::record::Observation;
use crate::window::{Window, WindowSummary};

/// Outcome of a capture call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Window not active (startup or draining); nothing was counted
    Inactive,
    /// Merged into the table
    Stored,
    /// Counted in the raw event count but dropped, table full
    Dropped,
}

pub struct WindowController<const N: usize> {
    window: Mutex<RefCell<Window<N>>>,
    active: AtomicBool,
    /// Set once by a successful `start`; `drain` is a no-op until then
    started: AtomicBool,
    config: WindowConfig,
}

impl<const N: usize> WindowController<N> {
    /// Usable in a `static`. Capture stays inactive until [`start`](Self::start).
    pub const fn new(config: WindowConfig) -> Self {
        Self {
            window: Mutex::new(RefCell::new(Window::new())),
            active: AtomicBool::new(false),
            started: AtomicBool::new(false),
            config,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Open the first window. Fails if the outbound transport isn't ready,
    /// in which case capture never starts.
    pub fn start<S: ByteSink + ?Sized>(&self, sink: &S) -> Result<()> {
        if !sink.is_ready() {
            log::error!("Report transport not ready, capture disabled");
            return Err(Error::TransportUnready);
        }
        critical_section::with(|cs| {
            self.window.borrow_ref_mut(cs).reset();
            self.started.store(true, Ordering::Release);
            self.active.store(true, Ordering::Release);
        });
        log::info!(
            "Capture started: {} slots, {} ms windows",
            N,
            self.config.period_ms
        );
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Capture path. Never blocks beyond one bounded critical section.
    pub fn record(&self, obs: &Observation<'_>) -> Recorded {
        let (outcome, first_drop) = critical_section::with(|cs| {
            if !self.active.load(Ordering::Acquire) {
                return (Recorded::Inactive, false);
            }
            let mut window = self.window.borrow_ref_mut(cs);
            match window.record(obs) {
                Ok(()) => (Recorded::Stored, false),
                Err(_) => (Recorded::Dropped, window.dropped() == 1),
            }
        });

        // Never log inside the critical section
        if first_drop && self.config.warn_on_full {
            log::warn!(
                "Table full ({} devices), dropping new devices until next window",
                N
            );
        }
        outcome
    }

    /// Periodic path: close the window, write its frame to `sink`, reset,
    /// reopen. Observations arriving meanwhile are discarded uncounted.
    ///
    /// Returns `None` without writing anything if capture was never
    /// started, so a failed `start` keeps capture closed for good.
    pub fn drain<S: ByteSink + ?Sized>(&self, sink: &mut S) -> Option<WindowSummary> {
        if !self.is_started() {
            return None;
        }

        let summary = critical_section::with(|cs| {
            self.active.store(false, Ordering::Release);
            self.window.borrow_ref(cs).summary()
        });

        FrameEncoder::write_header(&summary.header, sink);
        for slot in 0..N {
            let rec = critical_section::with(|cs| {
                self.window.borrow_ref(cs).table().record_at(slot).copied()
            });
            if let Some(rec) = rec {
                FrameEncoder::write_record(&rec, sink);
            }
        }

        critical_section::with(|cs| {
            self.window.borrow_ref_mut(cs).reset();
            self.active.store(true, Ordering::Release);
        });

        log::debug!(
            "Window {} drained: {} events, {} devices, {} dropped",
            summary.header.sequence,
            summary.header.raw_event_count,
            summary.header.unique_count,
            summary.dropped
        );
        Some(summary)
    }
}
