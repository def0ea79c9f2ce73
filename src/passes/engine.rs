//! Horizon-crossing scan
//!
//! Each target is stepped through the scan window by a two-state machine
//! (below the horizon / in a pass). Crossings are refined by bisection on the
//! sign of the elevation and the peak by a golden-section search. Candidate
//! passes then go through the filter chain, cheapest rejection first.

use std::cmp::Ordering;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use log::{debug, info, trace};
use nalgebra::Vector3;

use super::filter::VisibilityClass;
use super::request::{Pass, PassRequest, PassTarget, PathSample};
use crate::propagation::position;
use crate::time::{Epoch, SECONDS_PER_DAY};
use crate::visibility::{
    apparent_magnitude, is_eclipsed, is_moon_eclipsed, look_angles, moon_position_km,
    phase_angle, solar_elongation, sun_altitude, sun_position_km, LookAngles,
    NAKED_EYE_LIMIT_MAG,
};

/// Sun altitude at or below which the sky is dark enough (astronomical twilight)
pub const TWILIGHT_SUN_ALTITUDE_DEG: f64 = -12.0;

/// Bisection iterations for rise and set times (~15 ms on a one-minute bracket)
pub const BISECTION_ITERATIONS: usize = 12;

const GOLDEN_SECTION_ITERATIONS: usize = 24;

/// Coarse steps probed backwards when the scan starts inside a pass
pub const MAX_BACKTRACK_STEPS: usize = 240;

/// How far past the scan end a pass that is still open is followed (seconds)
pub const MAX_OVERRUN_S: f64 = 3.0 * 3600.0;

/// Receiver for streamed scan output.
///
/// Returning [`ControlFlow::Break`] aborts the scan at once.
pub trait PassSink {
    fn progress(&mut self, percent: u8) -> ControlFlow<()>;
    fn partial(&mut self, passes: Vec<Pass>) -> ControlFlow<()>;
}

/// Sink that drops all streamed output
pub struct DiscardSink;

impl PassSink for DiscardSink {
    fn progress(&mut self, _percent: u8) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn partial(&mut self, _passes: Vec<Pass>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Batches progress and partial results onto a wall-clock cadence
struct Reporter<'s, S: PassSink + ?Sized> {
    sink: &'s mut S,
    interval: Duration,
    last_flush: Instant,
    last_percent: u8,
    pending: Vec<Pass>,
}

impl<'s, S: PassSink + ?Sized> Reporter<'s, S> {
    fn new(sink: &'s mut S, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            last_flush: Instant::now(),
            last_percent: 0,
            pending: Vec::new(),
        }
    }

    fn push(&mut self, pass: Pass) {
        self.pending.push(pass);
    }

    fn tick(&mut self, percent: u8) -> ControlFlow<()> {
        if self.last_flush.elapsed() < self.interval {
            return ControlFlow::Continue(());
        }
        self.flush(percent)
    }

    fn flush(&mut self, percent: u8) -> ControlFlow<()> {
        if percent > self.last_percent {
            self.sink.progress(percent)?;
            self.last_percent = percent;
        }
        if !self.pending.is_empty() {
            self.sink.partial(std::mem::take(&mut self.pending))?;
        }
        self.last_flush = Instant::now();
        ControlFlow::Continue(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    epoch: Epoch,
    look: LookAngles,
    position: Vector3<f64>,
}

struct OpenPass {
    aos: Epoch,
    peak: Sample,
}

/// Sun-dependent annotations evaluated at one instant
struct SunContext {
    sun: Option<Vector3<f64>>,
    moon: Option<Vector3<f64>>,
    sun_altitude: Option<f64>,
    elongation: Option<f64>,
    eclipsed: bool,
    magnitude: Option<f64>,
}

impl SunContext {
    fn satisfies(&self, class: VisibilityClass) -> bool {
        let observable = self
            .sun_altitude
            .is_some_and(|alt| alt <= TWILIGHT_SUN_ALTITUDE_DEG)
            && !self.eclipsed;
        match class {
            VisibilityClass::Any => true,
            VisibilityClass::Observable => observable,
            VisibilityClass::NakedEye => {
                observable && self.magnitude.is_some_and(|m| m <= NAKED_EYE_LIMIT_MAG)
            }
        }
    }
}

fn midpoint(a: Epoch, b: Epoch) -> Epoch {
    a.add_seconds(b.seconds_since(a) / 2.0)
}

fn earlier(a: Epoch, b: Epoch) -> Epoch {
    if b < a {
        b
    } else {
        a
    }
}

fn later(a: Epoch, b: Epoch) -> Epoch {
    if b > a {
        b
    } else {
        a
    }
}

/// Scan state for one target of a request
struct Scanner<'a> {
    request: &'a PassRequest,
    target: &'a PassTarget,
    step: f64,
    fine_step: f64,
}

impl<'a> Scanner<'a> {
    fn new(request: &'a PassRequest, target: &'a PassTarget) -> Self {
        Self {
            request,
            target,
            step: request.step_s.max(1.0),
            fine_step: request.fine_step_s.max(0.1),
        }
    }

    fn sample(&self, epoch: Epoch) -> Option<Sample> {
        match position(&self.target.object, epoch, self.request.method) {
            Ok(state) => Some(Sample {
                epoch,
                look: look_angles(&state.position, epoch.gmst(), &self.request.observer),
                position: state.position,
            }),
            Err(err) => {
                trace!("{} skipped at {}: {}", self.target.object.name, epoch, err);
                None
            }
        }
    }

    fn is_above(&self, epoch: Epoch) -> bool {
        self.sample(epoch).is_some_and(|s| s.look.elevation > 0.0)
    }

    /// Horizon crossing between an instant below and one above the horizon,
    /// in either time order. Returns the midpoint of the final bracket.
    fn crossing(&self, below: Epoch, above: Epoch) -> Epoch {
        let (mut lo, mut hi) = (below, above);
        for _ in 0..BISECTION_ITERATIONS {
            let mid = midpoint(lo, hi);
            if self.is_above(mid) {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        midpoint(lo, hi)
    }

    /// Golden-section search for maximum elevation in `[from, to]`
    fn refine_peak(&self, from: Epoch, to: Epoch) -> Option<Sample> {
        let span = to.seconds_since(from);
        if span <= 0.0 {
            return self.sample(from);
        }

        let elevation = |offset: f64| {
            self.sample(from.add_seconds(offset))
                .map_or(f64::NEG_INFINITY, |s| s.look.elevation)
        };
        let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;

        let (mut lo, mut hi) = (0.0, span);
        let mut x1 = hi - ratio * (hi - lo);
        let mut x2 = lo + ratio * (hi - lo);
        let mut f1 = elevation(x1);
        let mut f2 = elevation(x2);

        for _ in 0..GOLDEN_SECTION_ITERATIONS {
            if f1 < f2 {
                lo = x1;
                x1 = x2;
                f1 = f2;
                x2 = lo + ratio * (hi - lo);
                f2 = elevation(x2);
            } else {
                hi = x2;
                x2 = x1;
                f2 = f1;
                x1 = hi - ratio * (hi - lo);
                f1 = elevation(x1);
            }
        }

        self.sample(from.add_seconds((lo + hi) / 2.0))
    }

    /// Step backwards from an above-horizon sample to find the rise
    fn backtrack(&self, first: Sample) -> OpenPass {
        let mut probe = first.epoch;
        let mut peak = first;

        for _ in 0..MAX_BACKTRACK_STEPS {
            let previous = probe.add_seconds(-self.step);
            match self.sample(previous) {
                Some(s) if s.look.elevation <= 0.0 => {
                    return OpenPass {
                        aos: self.crossing(previous, probe),
                        peak,
                    };
                }
                Some(s) => {
                    if s.look.elevation > peak.look.elevation {
                        peak = s;
                    }
                    probe = previous;
                }
                None => break,
            }
        }

        debug!(
            "{}: no rise found before {}, using earliest probe",
            self.target.object.name, probe
        );
        OpenPass { aos: probe, peak }
    }

    fn scan<S: PassSink + ?Sized>(
        &self,
        reporter: &mut Reporter<'_, S>,
        target_index: usize,
        target_count: usize,
    ) -> ControlFlow<(), Vec<Pass>> {
        let start = self.request.start;
        let end = self.request.end();
        let steps = (self.request.duration_days * SECONDS_PER_DAY / self.step)
            .ceil()
            .max(1.0);

        let mut passes = Vec::new();
        let mut last: Option<Sample> = None;
        let mut open: Option<OpenPass> = None;
        let mut index: u64 = 0;

        loop {
            let t = start.add_seconds(index as f64 * self.step);
            let overrun = t.seconds_since(end);
            if overrun > 0.0 {
                if open.is_none() {
                    break;
                }
                if overrun > MAX_OVERRUN_S {
                    debug!(
                        "{}: pass still open {} s past the scan end, dropped",
                        self.target.object.name, MAX_OVERRUN_S
                    );
                    break;
                }
            } else {
                let fraction = (target_index as f64 + index as f64 / steps) / target_count as f64;
                reporter.tick((fraction * 100.0).floor().min(99.0) as u8)?;
            }
            index += 1;

            let Some(sample) = self.sample(t) else {
                continue;
            };
            let above = sample.look.elevation > 0.0;

            open = match (open.take(), &last) {
                (None, _) if !above => None,
                (None, Some(previous)) => Some(OpenPass {
                    aos: self.crossing(previous.epoch, t),
                    peak: sample,
                }),
                (None, None) => Some(self.backtrack(sample)),
                (Some(mut pass), _) if above => {
                    if sample.look.elevation > pass.peak.look.elevation {
                        pass.peak = sample;
                    }
                    Some(pass)
                }
                (Some(pass), previous) => {
                    let previous = previous.map_or(pass.peak.epoch, |p| p.epoch);
                    let los = self.crossing(t, previous);
                    if let Some(accepted) = self.build_pass(pass, los) {
                        reporter.push(accepted.clone());
                        passes.push(accepted);
                    }
                    None
                }
            };
            last = Some(sample);
        }

        ControlFlow::Continue(passes)
    }

    fn sun_context(&self, sample: &Sample) -> SunContext {
        let Some(sun) = sun_position_km(sample.epoch) else {
            return SunContext {
                sun: None,
                moon: None,
                sun_altitude: None,
                elongation: None,
                eclipsed: false,
                magnitude: None,
            };
        };
        let moon = moon_position_km(sample.epoch);
        let gmst = sample.epoch.gmst();
        let observer_eci = self.request.observer.eci(gmst);
        let (eclipsed, magnitude) = self.photometry(sample, &sun, moon.as_ref(), &observer_eci);

        SunContext {
            sun: Some(sun),
            moon,
            sun_altitude: Some(sun_altitude(&sun, gmst, &self.request.observer)),
            elongation: Some(solar_elongation(&observer_eci, &sample.position, &sun).to_degrees()),
            eclipsed,
            magnitude,
        }
    }

    /// Eclipse state and, when lit, estimated magnitude of a sample
    fn photometry(
        &self,
        sample: &Sample,
        sun: &Vector3<f64>,
        moon: Option<&Vector3<f64>>,
        observer_eci: &Vector3<f64>,
    ) -> (bool, Option<f64>) {
        let eclipsed = is_eclipsed(&sample.position, sun)
            || moon.is_some_and(|m| is_moon_eclipsed(&sample.position, sun, m));
        if eclipsed {
            return (true, None);
        }

        let magnitude = self.target.standard_magnitude.map(|standard| {
            apparent_magnitude(
                standard,
                sample.look.range_km,
                phase_angle(&sample.position, sun, observer_eci),
                sample.look.elevation,
            )
        });
        (false, magnitude)
    }

    /// Samples from AOS to LOS at the fine step, LOS included
    fn resample(&self, aos: Epoch, los: Epoch) -> Vec<Sample> {
        let span = los.seconds_since(aos);
        let count = (span / self.fine_step).floor() as usize;
        let mut samples: Vec<Sample> = (0..=count)
            .filter_map(|i| self.sample(aos.add_seconds(i as f64 * self.fine_step)))
            .collect();
        if span - count as f64 * self.fine_step > 1e-6 {
            samples.extend(self.sample(los));
        }
        samples
    }

    fn build_pass(&self, open: OpenPass, los: Epoch) -> Option<Pass> {
        let filter = &self.request.filter;
        let aos = open.aos;
        if los.seconds_since(aos) <= 0.0 {
            return None;
        }

        let bracket_start = later(aos, open.peak.epoch.add_seconds(-self.step));
        let bracket_end = earlier(los, open.peak.epoch.add_seconds(self.step));
        let tca = self
            .refine_peak(bracket_start, bracket_end)
            .filter(|s| s.look.elevation >= open.peak.look.elevation)
            .unwrap_or(open.peak);
        if tca.epoch.seconds_since(aos) <= 0.0 || los.seconds_since(tca.epoch) <= 0.0 {
            return None;
        }

        // (a) elevation floor and ceiling
        if !filter.accepts_peak(tca.look.elevation) {
            return None;
        }

        // (b) some part of the track inside the window and above the mask
        let path = self.resample(aos, los);
        let accepted: Vec<bool> = path
            .iter()
            .map(|s| filter.accepts_direction(s.look.azimuth, s.look.elevation))
            .collect();
        if !accepted.contains(&true) {
            return None;
        }

        // (c) lighting
        let context = self.sun_context(&tca);
        if !context.satisfies(filter.visibility) {
            return None;
        }

        // (d) time spent in the accepted region
        let visible_duration_s: f64 = path
            .windows(2)
            .zip(&accepted)
            .filter(|(_, &ok)| ok)
            .map(|(pair, _)| pair[1].epoch.seconds_since(pair[0].epoch))
            .sum();
        if visible_duration_s < filter.min_duration_s {
            return None;
        }

        let aos_azimuth = self
            .sample(aos)
            .or_else(|| path.first().copied())
            .map_or(tca.look.azimuth, |s| s.look.azimuth);
        let los_azimuth = self
            .sample(los)
            .or_else(|| path.last().copied())
            .map_or(tca.look.azimuth, |s| s.look.azimuth);

        let path = self.annotate(&path, &context);

        Some(Pass {
            object_id: self.target.object.id,
            name: self.target.object.name.clone(),
            color: self.target.color,
            aos,
            tca: tca.epoch,
            los,
            aos_azimuth,
            tca_azimuth: tca.look.azimuth,
            los_azimuth,
            max_elevation: tca.look.elevation,
            range_at_tca_km: tca.look.range_km,
            duration_s: los.seconds_since(aos),
            visible_duration_s,
            eclipsed_at_tca: context.eclipsed,
            magnitude: context.magnitude,
            sun_altitude: context.sun_altitude,
            solar_elongation: context.elongation,
            path,
        })
    }

    /// Convert samples to path points; with `annotate_path` each point gets
    /// eclipse and magnitude using the Sun and Moon at TCA
    fn annotate(&self, path: &[Sample], context: &SunContext) -> Vec<PathSample> {
        path.iter()
            .map(|s| {
                let (eclipsed, magnitude) = match (&context.sun, self.request.annotate_path) {
                    (Some(sun), true) => {
                        let observer_eci = self.request.observer.eci(s.epoch.gmst());
                        let (eclipsed, magnitude) =
                            self.photometry(s, sun, context.moon.as_ref(), &observer_eci);
                        (Some(eclipsed), magnitude)
                    }
                    _ => (None, None),
                };
                PathSample {
                    epoch: s.epoch,
                    azimuth: s.look.azimuth,
                    elevation: s.look.elevation,
                    range_km: s.look.range_km,
                    eclipsed,
                    magnitude,
                }
            })
            .collect()
    }
}

fn sort_passes(passes: &mut [Pass]) {
    passes.sort_by(|a, b| {
        a.aos
            .partial_cmp(&b.aos)
            .unwrap_or(Ordering::Equal)
            .then(a.object_id.cmp(&b.object_id))
    });
}

/// Scan every target of `request`, streaming progress and partial batches
/// into `sink` at most once per `flush_interval`.
///
/// Returns all accepted passes sorted by AOS, or `Break` if the sink asked
/// to stop.
pub fn run_request<S: PassSink + ?Sized>(
    request: &PassRequest,
    flush_interval: Duration,
    sink: &mut S,
) -> ControlFlow<(), Vec<Pass>> {
    let started = Instant::now();
    let mut reporter = Reporter::new(sink, flush_interval);
    let target_count = request.targets.len().max(1);

    let mut passes = Vec::new();
    for (index, target) in request.targets.iter().enumerate() {
        let scanner = Scanner::new(request, target);
        passes.extend(scanner.scan(&mut reporter, index, target_count)?);
    }

    reporter.flush(100)?;
    sort_passes(&mut passes);

    info!(
        "Pass scan finished: {} passes for {} objects in {:.2?}",
        passes.len(),
        request.targets.len(),
        started.elapsed()
    );
    ControlFlow::Continue(passes)
}

/// Run a request to completion without streaming
pub fn predict_passes(request: &PassRequest) -> Vec<Pass> {
    match run_request(request, Duration::MAX, &mut DiscardSink) {
        ControlFlow::Continue(passes) => passes,
        ControlFlow::Break(()) => Vec::new(),
    }
}
