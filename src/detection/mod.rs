//! # Surge Detection Engine
//!
//! The detection engine is the brain of SENTINEL Surge. It consumes the
//! (address, label) feed one record at a time, accumulates the live time unit
//! in a `Bucket`, and retires buckets into a fixed-length `HistoryWindow` on
//! every label boundary. The retiring bucket is scanned against the window's
//! statistics before it joins them.
//!
//! ## Detection model
//!
//! A time unit is anomalous when BOTH hold:
//!
//! ```text
//! total_requests      > mean(window totals)        + 2 * stdev(window totals)
//! any address count   > mean(reference addresses)  + 2 * stdev(reference addresses)
//! ```
//!
//! The reference for per-address counts is the previous retired bucket, not
//! the current one - a surge is judged against how addresses behaved before it.
//!
//! ## State machine
//!
//! Two states, `Normal` and `Attack`. Escalation freezes the window and
//! reference statistics into the `Attack` variant; while the attack lasts,
//! every comparison runs against those frozen baselines so the surge itself
//! cannot drag the threshold up. De-escalation drops the baselines entirely.

pub mod bucket;
pub mod window;

pub use bucket::Bucket;
pub use window::HistoryWindow;

use crate::alert::AlertSink;
use crate::{DetectorConfig, SurgeResult};

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Mean and population standard deviation of a set of counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub mean: f64,
    pub stdev: f64,
}

impl Stats {
    /// Compute mean and population standard deviation (divide by n, no
    /// Bessel correction) over the given counts. `None` when the iterator
    /// is empty - there is no distribution over zero samples.
    pub fn from_counts(counts: impl Iterator<Item = u64>) -> Option<Self> {
        let values: Vec<f64> = counts.map(|c| c as f64).collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            stdev: variance.sqrt(),
        })
    }

    /// The anomaly threshold: mean + 2 standard deviations.
    pub fn threshold(&self) -> f64 {
        self.mean + 2.0 * self.stdev
    }
}

// ---------------------------------------------------------------------------
// Detector state
// ---------------------------------------------------------------------------

/// Detector status. Baselines exist only while under attack, so freezing
/// them at escalation and discarding them at de-escalation is structural.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    Normal,
    Attack {
        /// Window request statistics captured at attack onset.
        request_baseline: Stats,
        /// Reference-bucket address statistics captured at attack onset.
        address_baseline: Stats,
    },
}

impl Status {
    pub fn is_attack(&self) -> bool {
        matches!(self, Status::Attack { .. })
    }
}

/// The surge detector. Owns the history window, the live bucket, and the
/// normal/attack state machine.
///
/// Single-threaded by design: `process` is the only entry point and every
/// record passes through it in feed order. The alert sink is the only
/// external resource it touches.
pub struct Detector {
    window: HistoryWindow,
    current: Option<Bucket>,
    status: Status,
    sink: AlertSink,
}

impl Detector {
    /// Create a detector with the configured window capacity and alert sink.
    pub fn new(config: &DetectorConfig, sink: AlertSink) -> Self {
        Self {
            window: HistoryWindow::new(config.window_len),
            current: None,
            status: Status::Normal,
            sink,
        }
    }

    /// Feed one record into the detector.
    ///
    /// Records must arrive in non-decreasing label order. A record whose
    /// label matches the live bucket updates it; a new label retires the
    /// live bucket (scan, status line, roll into the window) and opens a
    /// fresh one. The only failure path is the alert sink - a sink error
    /// propagates, but never rolls back a status transition.
    pub fn process(&mut self, address: &str, label: i64) -> SurgeResult<()> {
        match self.current.as_mut() {
            None => {
                let mut bucket = Bucket::new(label);
                bucket.update(address);
                self.current = Some(bucket);
            }
            Some(bucket) if bucket.label() == label => {
                bucket.update(address);
            }
            Some(_) => {
                self.roll_over(label)?;
            }
        }
        Ok(())
    }

    /// Retire the live bucket and open a fresh one for `next_label`.
    ///
    /// If the window already holds a bucket with `next_label`, the boundary
    /// has been seen before (which cannot happen on an ordered feed); the
    /// record is discarded and nothing moves. Otherwise the retiring bucket
    /// is scanned - once the window holds enough history to make the
    /// statistics meaningful - then rolled in.
    ///
    /// The record that triggers the roll-over is not fed into the fresh
    /// bucket. That is deliberate fidelity to the reference behavior; a
    /// time unit whose only traffic was its boundary record retires empty.
    fn roll_over(&mut self, next_label: i64) -> SurgeResult<()> {
        if self.window.contains(next_label) {
            log::debug!("label {} already retired; discarding record", next_label);
            return Ok(());
        }

        let Some(retiring) = self.current.take() else {
            self.current = Some(Bucket::new(next_label));
            return Ok(());
        };

        // A single-bucket window has zero stdev and would flag any
        // deviation, so scanning starts at two retired buckets.
        if self.window.len() > 1 {
            self.scan_for_attack(&retiring)?;
        }

        // Observability contract: one line per retired time unit on stdout.
        println!(
            "Timestamp: {}, Number of requests: {}, Attack: {}",
            retiring.label(),
            retiring.total_requests(),
            self.status.is_attack(),
        );

        self.window.roll_in(retiring);
        self.current = Some(Bucket::new(next_label));
        Ok(())
    }

    /// Decide whether the retiring bucket is anomalous and drive the state
    /// machine.
    ///
    /// Normal mode compares against the live window statistics and, when the
    /// aggregate threshold trips, refreshes the per-address baseline from the
    /// most recently retired bucket before the per-address comparison -
    /// refresh-then-compare, against the previous unit's profile. Attack mode
    /// compares against the baselines frozen at escalation and never
    /// refreshes them.
    fn scan_for_attack(&mut self, retiring: &Bucket) -> SurgeResult<()> {
        match self.status {
            Status::Attack {
                request_baseline,
                address_baseline,
            } => {
                let still_surging = retiring.total_requests() as f64
                    > request_baseline.threshold()
                    && exceeds_address_baseline(retiring, &address_baseline);
                if still_surging {
                    self.write_alerts(retiring, &address_baseline)?;
                } else {
                    log::info!(
                        "surge subsided at label {}; returning to normal",
                        retiring.label(),
                    );
                    self.status = Status::Normal;
                }
            }
            Status::Normal => {
                let Some(request_stats) = self.window.request_stats() else {
                    return Ok(());
                };
                if retiring.total_requests() as f64 <= request_stats.threshold() {
                    return Ok(());
                }

                // Aggregate threshold tripped; refresh the address baseline
                // from the previous retired bucket. An empty reference
                // bucket gives nothing to compare against: no anomaly.
                let Some(address_baseline) =
                    self.window.newest().and_then(|b| b.address_stats())
                else {
                    log::debug!(
                        "reference bucket empty at label {}; skipping address check",
                        retiring.label(),
                    );
                    return Ok(());
                };

                if exceeds_address_baseline(retiring, &address_baseline) {
                    log::warn!(
                        "surge detected at label {}: {} requests against threshold {:.1}",
                        retiring.label(),
                        retiring.total_requests(),
                        request_stats.threshold(),
                    );
                    self.status = Status::Attack {
                        request_baseline: request_stats,
                        address_baseline,
                    };
                    self.write_alerts(retiring, &address_baseline)?;
                }
            }
        }
        Ok(())
    }

    /// Append every address whose count exceeds the baseline threshold to
    /// the alert sink, one per line. Successive scans of an ongoing surge
    /// re-emit the same addresses; duplicates are expected downstream.
    fn write_alerts(&self, bucket: &Bucket, baseline: &Stats) -> SurgeResult<()> {
        for (address, &count) in bucket.address_counts() {
            if count as f64 > baseline.threshold() {
                self.sink.record(address)?;
            }
        }
        Ok(())
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_under_attack(&self) -> bool {
        self.status.is_attack()
    }

    pub fn window(&self) -> &HistoryWindow {
        &self.window
    }

    /// The live bucket, if any record has arrived yet.
    pub fn current(&self) -> Option<&Bucket> {
        self.current.as_ref()
    }
}

/// True if any address in `bucket` made more requests than the baseline's
/// 2-sigma threshold. Pure predicate; baseline refresh happens in the scan.
fn exceeds_address_baseline(bucket: &Bucket, baseline: &Stats) -> bool {
    bucket
        .address_counts()
        .values()
        .any(|&count| count as f64 > baseline.threshold())
}
