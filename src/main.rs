// src/main.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};

use scope_pipeline::dsp::load_filter_file;
use scope_pipeline::expr;
use scope_pipeline::{
    render_curves_png, AcquisitionSource, CaptureFile, ChannelKind, ChannelMap, FilteringMode,
    MeasurementResult, PlotStyle, PlotView, Sample, Scope, ScopeSink,
};

#[derive(Parser)]
#[command(name = "scope-pipeline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded capture through the channel pipeline
    Run {
        /// JSON capture: settings plus acquisition frames
        capture: PathBuf,

        /// CSV filter taps, one row per tap (column 1 feedforward, optional column 2 feedback)
        #[arg(long)]
        filter: Option<PathBuf>,

        /// Channel the filter is applied to
        #[arg(long, value_enum, default_value = "a")]
        filter_source: SourceArg,

        /// Math channel equation, e.g. "A-B*2"
        #[arg(long)]
        equation: Option<String>,

        /// Run the band-pass enhancement on channel A
        #[arg(long)]
        bandpass: bool,

        /// Write the final curves to this PNG
        #[arg(long)]
        png: Option<PathBuf>,

        /// How long to wait for workers to go quiet after each frame
        #[arg(long, default_value = "2000")]
        timeout_ms: u64,
    },

    /// Validate a math channel equation
    CheckEquation {
        equation: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceArg {
    A,
    B,
    M,
}

impl From<SourceArg> for ChannelKind {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::A => ChannelKind::RawA,
            SourceArg::B => ChannelKind::RawB,
            SourceArg::M => ChannelKind::Math,
        }
    }
}

/// Collects the latest results per channel while a capture replays.
#[derive(Default)]
struct Report {
    points: ChannelMap<usize>,
    measurements: ChannelMap<Option<MeasurementResult>>,
    frequencies: ChannelMap<Option<f64>>,
    errors: Vec<String>,
}

impl ScopeSink for Report {
    fn on_plot_ready(&mut self, channel: ChannelKind, samples: &[Sample]) {
        info!("{channel}: {} points", samples.len());
        *self.points.get_mut(channel) = samples.len();
    }

    fn on_measured(&mut self, channel: ChannelKind, result: MeasurementResult) {
        *self.measurements.get_mut(channel) = Some(result);
    }

    fn on_frequency(&mut self, channel: ChannelKind, frequency_hz: f64) {
        *self.frequencies.get_mut(channel) = Some(frequency_hz);
    }

    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_owned());
    }
}

impl Report {
    fn print(&self) {
        for channel in ChannelKind::ALL {
            let Some(hz) = self.frequencies.get(channel) else {
                continue;
            };
            println!("{channel}: {} points, {hz:.3} Hz", self.points.get(channel));
            if let Some(m) = self.measurements.get(channel) {
                println!(
                    "  max {:.4} V  min {:.4} V  p-p {:.4} V  avg {:.4} V  std {:.4} V",
                    m.max, m.min, m.peak_to_peak, m.average, m.std_dev
                );
            }
        }
        for message in &self.errors {
            println!("error: {message}");
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            capture,
            filter,
            filter_source,
            equation,
            bandpass,
            png,
            timeout_ms,
        } => run(RunArgs {
            capture,
            filter,
            filter_source: filter_source.into(),
            equation,
            bandpass,
            png,
            idle: Duration::from_millis(timeout_ms),
        }),
        Commands::CheckEquation { equation } => check_equation(&equation),
    }
}

struct RunArgs {
    capture: PathBuf,
    filter: Option<PathBuf>,
    filter_source: ChannelKind,
    equation: Option<String>,
    bandpass: bool,
    png: Option<PathBuf>,
    idle: Duration,
}

fn run(args: RunArgs) -> Result<()> {
    let capture = CaptureFile::load(&args.capture)
        .with_context(|| format!("Failed to load capture {}", args.capture.display()))?;
    let (config, mut source) = capture.into_parts();
    let mut scope = Scope::new(config).context("Failed to start channel workers")?;
    let mut report = Report::default();

    if args.bandpass {
        scope.set_filtering_mode(FilteringMode::Bandpass);
    }
    // A refused filter or equation is reported and the replay goes on
    // without it.
    if let Some(path) = &args.filter {
        match load_filter_file(path, args.filter_source) {
            Ok(spec) => {
                scope.load_filter(spec).ok();
            }
            Err(err) => {
                let message = format!("Failed to load filter {}: {err}", path.display());
                warn!("{message}");
                report.on_error(&message);
            }
        }
    }
    if let Some(equation) = &args.equation {
        scope.set_equation(equation).ok();
    }
    for event in scope.drain(args.idle) {
        report.dispatch(&event);
    }

    let mut frames = 0usize;
    while let Some(frame) = source.next_frame()? {
        scope.ingest_acquisition(frame.channel, frame.codes)?;
        frames += 1;
        for event in scope.drain(args.idle) {
            report.dispatch(&event);
        }
    }
    if frames == 0 {
        warn!("capture contains no frames");
    }
    info!("replayed {frames} frames");
    report.print();

    if let Some(path) = &args.png {
        write_png(&scope, path)?;
        println!("plot written to {}", path.display());
    }
    scope.shutdown();
    Ok(())
}

fn write_png(scope: &Scope, path: &Path) -> Result<()> {
    let config = scope.config();
    let view = PlotView {
        time_div: config.time_div_value()?,
        voltage_div: config.voltage_div_volts(ChannelKind::RawA)?,
    };
    let curves: Vec<_> = ChannelKind::ALL
        .into_iter()
        .map(|channel| (channel, scope.curve(channel)))
        .collect();
    let borrowed: Vec<(ChannelKind, &[Sample])> = curves
        .iter()
        .map(|(channel, samples)| (*channel, samples.as_slice()))
        .collect();
    let bytes = render_curves_png(&borrowed, view, &PlotStyle::default())?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn check_equation(equation: &str) -> Result<()> {
    let parsed = match expr::validate(equation) {
        Ok(parsed) => parsed,
        Err(err) => bail!("Invalid equation: {err}"),
    };
    let required: Vec<String> = [
        (parsed.requires_a(), ChannelKind::RawA),
        (parsed.requires_b(), ChannelKind::RawB),
        (parsed.requires_f(), ChannelKind::Filter),
    ]
    .into_iter()
    .filter(|(needed, _)| *needed)
    .map(|(_, channel)| channel.to_string())
    .collect();

    if required.is_empty() {
        let value = parsed.evaluate(&expr::Operands::default())?;
        println!("constant equation, value {value}");
    } else {
        println!("equation uses {}", required.join(", "));
    }
    Ok(())
}
