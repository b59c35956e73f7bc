//! Synthetic progress bar shown while the workflow webhook is working.
//!
//! Purely cosmetic: progress follows elapsed wall-clock time against a fixed
//! phase table and knows nothing about the real request. A little random
//! jitter is added to the target and the displayed value eases towards it.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::time::Duration;

/// Fraction of the remaining distance covered per tick.
const SMOOTHING: f64 = 0.25;
/// Maximum jitter, in percentage points, added to the target.
const JITTER: f64 = 1.5;
/// The bar never shows completion before the total duration has elapsed.
const MAX_BEFORE_DONE: f64 = 99.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub label: String,
    pub duration: Duration,
    /// Share of the bar, in percent, covered by this phase.
    pub share: f64,
}

impl Phase {
    pub fn new(label: impl Into<String>, duration: Duration, share: f64) -> Self {
        Self {
            label: label.into(),
            duration,
            share,
        }
    }
}

pub fn default_phases() -> Vec<Phase> {
    vec![
        Phase::new("Analyzing your health concern", Duration::from_secs(4), 20.0),
        Phase::new("Identifying potential causes", Duration::from_secs(8), 35.0),
        Phase::new("Cross-referencing aromatherapy data", Duration::from_secs(8), 30.0),
        Phase::new("Preparing suggestions", Duration::from_secs(5), 15.0),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressFrame {
    pub phase: usize,
    pub label: String,
    /// Progress computed from elapsed time, jitter included.
    pub target: f64,
    /// Smoothed value to render.
    pub displayed: f64,
    pub finished: bool,
}

pub struct ProgressAnimator<R = StdRng> {
    phases: Vec<Phase>,
    rng: R,
    displayed: f64,
}

impl ProgressAnimator<StdRng> {
    pub fn new(phases: Vec<Phase>) -> Self {
        Self::with_rng(phases, StdRng::from_os_rng())
    }

    pub fn seeded(phases: Vec<Phase>, seed: u64) -> Self {
        Self::with_rng(phases, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ProgressAnimator<R> {
    pub fn with_rng(phases: Vec<Phase>, rng: R) -> Self {
        Self {
            phases,
            rng,
            displayed: 0.0,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.phases.iter().map(|p| p.duration).sum()
    }

    /// Advance the animation to `elapsed` since it started.
    pub fn tick(&mut self, elapsed: Duration) -> ProgressFrame {
        let last = self.phases.len().saturating_sub(1);
        if elapsed >= self.total_duration() {
            self.displayed = 100.0;
            return ProgressFrame {
                phase: last,
                label: self
                    .phases
                    .last()
                    .map(|p| p.label.clone())
                    .unwrap_or_default(),
                target: 100.0,
                displayed: 100.0,
                finished: true,
            };
        }

        let mut start = Duration::ZERO;
        let mut base = 0.0;
        let mut phase = 0;
        let mut target = 0.0;
        for (idx, p) in self.phases.iter().enumerate() {
            let end = start + p.duration;
            if elapsed < end {
                let within = (elapsed - start).as_secs_f64() / p.duration.as_secs_f64();
                phase = idx;
                target = base + within * p.share;
                break;
            }
            start = end;
            base += p.share;
        }

        let jitter = self.rng.random_range(-JITTER..=JITTER);
        let target = (target + jitter).clamp(0.0, MAX_BEFORE_DONE);
        let eased = self.displayed + (target - self.displayed) * SMOOTHING;
        self.displayed = eased.max(self.displayed).min(MAX_BEFORE_DONE);

        ProgressFrame {
            phase,
            label: self.phases[phase].label.clone(),
            target,
            displayed: self.displayed,
            finished: false,
        }
    }
}
