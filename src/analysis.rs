use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use spacepass::config::SpacepassConfig;
use spacepass::data::{load_catalog, CatalogObject};
use spacepass::passes::{
    AzimuthWindow, Pass, PassFilter, PassMessageKind, PassRequest, PassTarget, PassWorker,
    VisibilityClass,
};
use spacepass::propagation::{
    altitude_to_color, OrbitShapeCache, PropagationMethod, StateVector, Tracker,
};
use spacepass::visibility::{doppler_shift, look_angles, range_rate, ObserverLocation};
use spacepass::Epoch;

/// Objects and time span shared by both commands
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// TLE text file or JSON catalog (`.json`, `.json.gz`)
    pub catalog: PathBuf,
    /// Only use these catalog numbers
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<u32>,
    /// Start time (RFC 3339), defaults to now
    #[arg(long)]
    pub start: Option<String>,
    /// Use the Kepler + J2 model instead of SGP4
    #[arg(long)]
    pub analytic: bool,
}

/// Observer position; falls back to the config file
#[derive(Args, Debug, Clone)]
pub struct ObserverArgs {
    /// Observer latitude (degrees)
    #[arg(long, allow_negative_numbers = true)]
    pub lat: Option<f64>,
    /// Observer longitude (degrees, east positive)
    #[arg(long, allow_negative_numbers = true)]
    pub lon: Option<f64>,
    /// Observer altitude (meters)
    #[arg(long, default_value_t = 0.0)]
    pub alt_m: f64,
}

#[derive(Args, Debug, Clone)]
pub struct PassArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    #[command(flatten)]
    pub observer: ObserverArgs,
    /// Output JSON file path
    #[arg(long, default_value = "out/passes.json")]
    pub output: PathBuf,
    /// Scan length in days
    #[arg(long)]
    pub days: Option<f64>,
    /// Peak elevation floor (degrees)
    #[arg(long)]
    pub min_elevation: Option<f64>,
    /// Peak elevation ceiling (degrees)
    #[arg(long)]
    pub max_elevation: Option<f64>,
    /// Azimuth window start (degrees); wraps through north if above the end
    #[arg(long, requires = "azimuth_max")]
    pub azimuth_min: Option<f64>,
    /// Azimuth window end (degrees)
    #[arg(long, requires = "azimuth_min")]
    pub azimuth_max: Option<f64>,
    /// Minimum time inside the window (seconds)
    #[arg(long)]
    pub min_duration: Option<f64>,
    #[arg(long, value_enum)]
    pub visibility: Option<VisibilityClass>,
    /// Eclipse and magnitude for every path sample
    #[arg(long)]
    pub annotate: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TrackArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
    #[command(flatten)]
    pub observer: ObserverArgs,
    /// Simulated time to cover (seconds)
    #[arg(long, default_value_t = 600.0)]
    pub duration_s: f64,
    /// Simulated time per update (seconds)
    #[arg(long, default_value_t = 60.0)]
    pub step_s: f64,
    /// Downlink frequency for Doppler output (MHz)
    #[arg(long)]
    pub frequency_mhz: Option<f64>,
}

#[derive(Debug, Serialize)]
struct PassReport {
    generated_at: String,
    observer: ObserverLocation,
    start: Epoch,
    end: Epoch,
    total_objects: usize,
    filter: PassFilter,
    passes: Vec<Pass>,
}

fn parse_start(start: Option<&str>) -> Result<Epoch> {
    match start {
        Some(text) => {
            let time = DateTime::parse_from_rfc3339(text)
                .with_context(|| format!("Invalid start time: {}", text))?;
            Ok(Epoch::from_datetime(time.with_timezone(&Utc)))
        }
        None => Ok(Epoch::now()),
    }
}

fn resolve_observer(args: &ObserverArgs, config: &SpacepassConfig) -> Option<ObserverLocation> {
    match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Some(ObserverLocation::new(lat, lon, args.alt_m)),
        _ => config.observer,
    }
}

fn select_objects(selection: &SelectionArgs) -> Result<Vec<CatalogObject>> {
    let mut objects = load_catalog(&selection.catalog)?;
    if !selection.ids.is_empty() {
        let wanted: HashSet<u32> = selection.ids.iter().copied().collect();
        objects.retain(|o| wanted.contains(&o.object.id));
    }
    if objects.is_empty() {
        return Err(anyhow!("no objects matched the selection"));
    }
    Ok(objects)
}

fn method(selection: &SelectionArgs) -> PropagationMethod {
    if selection.analytic {
        PropagationMethod::Analytic
    } else {
        PropagationMethod::HighFidelity
    }
}

pub fn run_pass_report(args: PassArgs, config: &SpacepassConfig) -> Result<()> {
    let observer = resolve_observer(&args.observer, config)
        .ok_or_else(|| anyhow!("observer location required (--lat/--lon or config file)"))?;
    let start = parse_start(args.selection.start.as_deref())?;
    let objects = select_objects(&args.selection)?;

    let mut settings = config.passes.clone();
    if let Some(days) = args.days {
        settings.duration_days = days;
    }
    if let Some(min) = args.min_elevation {
        settings.filter.min_elevation = min;
    }
    if args.max_elevation.is_some() {
        settings.filter.max_elevation = args.max_elevation;
    }
    if let (Some(min), Some(max)) = (args.azimuth_min, args.azimuth_max) {
        settings.filter.azimuth_window = Some(AzimuthWindow::new(min, max));
    }
    if let Some(duration) = args.min_duration {
        settings.filter.min_duration_s = duration;
    }
    if let Some(visibility) = args.visibility {
        settings.filter.visibility = visibility;
    }
    settings.annotate_path |= args.annotate;

    let targets: Vec<PassTarget> = objects
        .iter()
        .map(|o| {
            let (perigee, apogee) = o.object.perigee_apogee_km();
            PassTarget {
                object: o.object.clone(),
                color: altitude_to_color((perigee + apogee) / 2.0),
                standard_magnitude: o.standard_magnitude,
            }
        })
        .collect();
    let total_objects = targets.len();

    let mut request = PassRequest::new(observer, targets, start, &settings);
    request.method = method(&args.selection);
    let end = request.end();

    log::info!(
        "Predicting passes for {} objects from {} to {} ({})",
        total_objects,
        start,
        end,
        request.method.name()
    );

    let mut worker = PassWorker::new(config.worker.clone());
    worker
        .submit(request)
        .context("Failed to start the pass worker")?;

    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::with_template("{elapsed_precise} {bar:40.cyan/blue} {percent}% {msg}")?
            .progress_chars("##-"),
    );

    let mut streamed = 0;
    let passes = loop {
        match worker.recv_timeout(Duration::from_millis(200)) {
            Some(message) => match message.kind {
                PassMessageKind::Progress(percent) => progress.set_position(percent as u64),
                PassMessageKind::Partial(batch) => {
                    streamed += batch.len();
                    progress.set_message(format!("{} passes", streamed));
                }
                PassMessageKind::Complete(passes) => break passes,
            },
            None if !worker.is_running() => bail!("pass worker stopped without a result"),
            None => {}
        }
    };
    progress.finish_and_clear();

    for pass in passes.iter().take(10) {
        log::info!(
            "{:<24} AOS {} az {:5.1}  max {:4.1} deg  LOS az {:5.1}  {:4.0} s{}",
            pass.name,
            pass.aos,
            pass.aos_azimuth,
            pass.max_elevation,
            pass.los_azimuth,
            pass.duration_s,
            pass.magnitude
                .map(|m| format!("  mag {:.1}", m))
                .unwrap_or_default()
        );
    }

    let report = PassReport {
        generated_at: Utc::now().to_rfc3339(),
        observer,
        start,
        end,
        total_objects,
        filter: settings.filter,
        passes,
    };

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("Failed to create {:?}", args.output))?;
    serde_json::to_writer_pretty(file, &report)?;

    log::info!("Wrote {} passes to {:?}", report.passes.len(), args.output);
    Ok(())
}

pub fn run_track(args: TrackArgs, config: &SpacepassConfig) -> Result<()> {
    if args.step_s <= 0.0 {
        return Err(anyhow!("step-s must be > 0"));
    }
    let start = parse_start(args.selection.start.as_deref())?;
    let objects = select_objects(&args.selection)?;
    let observer = resolve_observer(&args.observer, config);

    let mut tracker = Tracker::new(start, method(&args.selection));
    tracker.load_objects(objects.iter().map(|o| o.object.clone()));

    let mut shapes = OrbitShapeCache::new(config.shape_cache.clone());
    shapes.rebuild(tracker.objects(), start, Instant::now());

    let steps = (args.duration_s / args.step_s).ceil() as u64;
    for step in 0..=steps {
        if step > 0 {
            tracker.advance_time(args.step_s);
        }
        let available = tracker.propagate_all();
        let outcome = shapes.update(tracker.objects(), tracker.current_time(), Instant::now());

        log::info!(
            "{}  GMST {:.2} deg  {}/{} positions  orbit geometry {}",
            tracker.format_time(),
            tracker.gmst().to_degrees(),
            available,
            tracker.len(),
            if outcome.geometry_changed() {
                "updated"
            } else {
                "cached"
            }
        );

        for (object, state) in tracker.states() {
            let Some(observer) = observer else {
                log::debug!(
                    "  {:<24} alt {:8.1} km  render ({:.3}, {:.3}, {:.3})",
                    object.name,
                    state.altitude_km,
                    state.render_position.x,
                    state.render_position.y,
                    state.render_position.z
                );
                continue;
            };

            let gmst = tracker.gmst();
            let look = look_angles(&state.position_km, gmst, &observer);
            if look.elevation < 0.0 {
                continue;
            }
            let sv = StateVector {
                position: state.position_km,
                velocity: state.velocity_km_s,
            };
            let rate = range_rate(&sv, gmst, &observer);
            let doppler = args
                .frequency_mhz
                .map(|f| format!("  {:.4} MHz", doppler_shift(f * 1e6, rate) / 1e6))
                .unwrap_or_default();
            log::info!(
                "  {:<24} az {:5.1}  el {:4.1}  range {:7.1} km  rate {:+.3} km/s{}",
                object.name,
                look.azimuth,
                look.elevation,
                look.range_km,
                rate,
                doppler
            );
        }
    }

    log::info!(
        "Orbit cache: {} shapes, {} vertices",
        shapes.entries().len(),
        shapes.vertices().len()
    );
    Ok(())
}
