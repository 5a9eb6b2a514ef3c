//! Synthetic location trace.
//!
//! Samples come out one per [`SAMPLE_INTERVAL`] of pacer time. Position is
//! the base coordinate plus an offset drawn once per run, so every sample of
//! a run reports the same stationary point.

use std::future::Future;
use std::io;
use std::ops::RangeInclusive;
use std::pin::Pin;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::types::{Beacon, LatLng, LocationSample};

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on points reserved before the run starts.
const POINTS_PREALLOC: u64 = 1024;

/// Degrees added to each base coordinate.
pub const OFFSET_RANGE: RangeInclusive<f64> = 0.000005..=0.00005;

pub fn sample_count(duration_seconds: u64) -> u64 {
    duration_seconds / SAMPLE_INTERVAL.as_secs() + 1
}

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    Resume,
    Cancelled,
}

/// Clock and delay source for the generator.
#[allow(async_fn_in_trait)]
pub trait Pacer {
    fn now_ms(&self) -> u64;

    /// Suspends for `period`, or returns early with [`Pace::Cancelled`].
    async fn wait(&mut self, period: Duration) -> Pace;
}

type Interrupt = Pin<Box<dyn Future<Output = io::Result<()>>>>;

/// Wall clock with a real sleep, cut short by Ctrl-C.
///
/// One interrupt listener is kept from the first wait onwards, so a Ctrl-C
/// that lands between two waits is still seen by the next one.
#[derive(Default)]
pub struct RealtimePacer {
    interrupt: Option<Interrupt>,
}

impl RealtimePacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pacer for RealtimePacer {
    fn now_ms(&self) -> u64 {
        now_ms()
    }

    async fn wait(&mut self, period: Duration) -> Pace {
        let interrupt = self
            .interrupt
            .get_or_insert_with(|| Box::pin(tokio::signal::ctrl_c()) as Interrupt);

        let fired = tokio::select! {
            _ = tokio::time::sleep(period) => None,
            res = interrupt.as_mut() => Some(res),
        };

        match fired {
            None => Pace::Resume,
            Some(Ok(())) => {
                self.interrupt = None;
                Pace::Cancelled
            }
            Some(Err(e)) => {
                warn!("cannot listen for interrupts: {e}");
                self.interrupt = Some(Box::pin(std::future::pending::<io::Result<()>>()));
                tokio::time::sleep(period).await;
                Pace::Resume
            }
        }
    }
}

/// Virtual clock that advances instantly. Optionally cancels on the n-th wait.
#[derive(Debug, Clone)]
pub struct SimulatedPacer {
    now_ms: u64,
    waits: usize,
    cancel_on_wait: Option<usize>,
}

impl SimulatedPacer {
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            now_ms,
            waits: 0,
            cancel_on_wait: None,
        }
    }

    pub fn cancel_on_wait(mut self, n: usize) -> Self {
        self.cancel_on_wait = Some(n);
        self
    }

    pub fn waits(&self) -> usize {
        self.waits
    }
}

impl Pacer for SimulatedPacer {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    async fn wait(&mut self, period: Duration) -> Pace {
        self.waits += 1;
        if self.cancel_on_wait == Some(self.waits) {
            return Pace::Cancelled;
        }
        self.now_ms += period.as_millis() as u64;
        Pace::Resume
    }
}

/// A finished run of samples.
#[derive(Debug, Clone)]
pub struct Trace {
    pub points: Vec<LocationSample>,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
}

#[derive(Debug)]
pub enum TraceOutcome {
    Finished(Trace),
    Cancelled { generated: usize },
}

/// Returned by [`TraceGenerator::next_sample`] when the pacer is interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

pub struct TraceGenerator<P> {
    pacer: P,
    position: LatLng,
    beacon: Beacon,
    total: u64,
    emitted: u64,
}

impl<P: Pacer> TraceGenerator<P> {
    pub fn new(
        base_lat: f64,
        base_lon: f64,
        duration_seconds: u64,
        beacon: Beacon,
        pacer: P,
    ) -> Self {
        Self::with_rng(
            base_lat,
            base_lon,
            duration_seconds,
            beacon,
            pacer,
            &mut rand::thread_rng(),
        )
    }

    pub fn with_rng<R: Rng>(
        base_lat: f64,
        base_lon: f64,
        duration_seconds: u64,
        beacon: Beacon,
        pacer: P,
        rng: &mut R,
    ) -> Self {
        let position = LatLng {
            latitude: base_lat + rng.gen_range(OFFSET_RANGE),
            longitude: base_lon + rng.gen_range(OFFSET_RANGE),
            speed: 0.0,
        };
        info!(
            "coordinates randomized to ({:.6}, {:.6})",
            position.latitude, position.longitude
        );
        Self {
            pacer,
            position,
            beacon,
            total: sample_count(duration_seconds),
            emitted: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn position(&self) -> LatLng {
        self.position
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    /// Next sample, pacing before every sample but the first. `Ok(None)` once
    /// exhausted. After a cancellation the generator stays exhausted.
    pub async fn next_sample(&mut self) -> Result<Option<LocationSample>, Cancelled> {
        if self.emitted >= self.total {
            return Ok(None);
        }
        if self.emitted > 0 && self.pacer.wait(SAMPLE_INTERVAL).await == Pace::Cancelled {
            self.emitted = self.total;
            return Err(Cancelled);
        }
        self.emitted += 1;
        Ok(Some(LocationSample {
            ibeacons: vec![self.beacon.clone()],
            in_beacon: true,
            lat_lng: self.position,
            time: self.pacer.now_ms().to_string(),
        }))
    }

    /// Drives the generator to the end, logging progress after each sample.
    pub async fn run(&mut self) -> TraceOutcome {
        let started_at_ms = self.pacer.now_ms();
        let reserve = usize::try_from(self.total.min(POINTS_PREALLOC)).unwrap_or(0);
        let mut points = Vec::with_capacity(reserve);

        loop {
            match self.next_sample().await {
                Ok(Some(sample)) => {
                    points.push(sample);
                    let remaining = (self.total - self.emitted) * SAMPLE_INTERVAL.as_secs();
                    info!(
                        "generated point {}/{}, ~{:02}:{:02} remaining",
                        self.emitted,
                        self.total,
                        remaining / 60,
                        remaining % 60
                    );
                }
                Ok(None) => break,
                Err(Cancelled) => {
                    return TraceOutcome::Cancelled {
                        generated: points.len(),
                    }
                }
            }
        }

        TraceOutcome::Finished(Trace {
            points,
            started_at_ms,
            ended_at_ms: self.pacer.now_ms(),
        })
    }
}
