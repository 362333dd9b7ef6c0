use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use liftsense::classification::WindowVerdict;
use liftsense::config::AppConfig;
use liftsense::detector::BlockEvent;
use liftsense::error::ClassificationFailure;
use liftsense::export::decode_windows;
use liftsense::fixtures::{load_fixture, FixtureSegment, MotionFixtureSpec};
use liftsense::fusion::{FusedWindow, FusionStats};
use liftsense::managers::{BroadcastObservers, PipelineEvent};
use liftsense::pipeline::Preclassification;
use liftsense::telemetry;
use liftsense::types::{ClassifiedExercise, ExerciseLabel};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(
    name = "liftsense_cli",
    about = "Deterministic fixture harness for the exercise preclassification pipeline"
)]
struct Cli {
    /// Pipeline configuration JSON (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print an example fixture description
    Template,
    /// Render a fixture to frames, one JSON object per line
    Synth {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a classifying session over a fixture, using segment labels as the model
    Detect {
        #[arg(long)]
        fixture: PathBuf,
        /// Exit with status 2 unless the top result of every block has this label
        #[arg(long)]
        expect: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print metric events collected during the run to stderr
        #[arg(long)]
        telemetry: bool,
    },
    /// Record a fixture as one labelled training block
    Train {
        #[arg(long)]
        fixture: PathBuf,
        #[arg(long)]
        label: String,
        /// Where to write the exported window corpus
        #[arg(long)]
        output: PathBuf,
    },
    /// Summarise an exported window corpus
    Inspect {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    liftsense::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Template => run_template(),
        Commands::Synth { fixture, output } => run_synth(&fixture, output),
        Commands::Detect {
            fixture,
            expect,
            output,
            telemetry,
        } => run_detect(config, &fixture, expect, output, telemetry),
        Commands::Train {
            fixture,
            label,
            output,
        } => run_train(config, &fixture, label, &output),
        Commands::Inspect { input } => run_inspect(&input),
    }
}

fn run_template() -> Result<ExitCode> {
    let spec = MotionFixtureSpec::wrist(
        "squat_set",
        vec![
            FixtureSegment::rest(10_000),
            FixtureSegment::repetitions(20_000, 1_250.0, "Squat"),
            FixtureSegment::rest(10_000),
        ],
    );
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(ExitCode::from(0))
}

fn run_synth(fixture: &Path, output: Option<PathBuf>) -> Result<ExitCode> {
    let spec = load_fixture(fixture)?;
    let frames = spec
        .render()
        .with_context(|| format!("rendering fixture {}", spec.id))?;

    let mut lines = Vec::new();
    for frame in &frames {
        writeln!(lines, "{}", serde_json::to_string(frame)?)?;
    }
    emit(&lines, output)?;
    eprintln!("{} frames, {} ms", frames.len(), spec.duration_ms());
    Ok(ExitCode::from(0))
}

/// Stands in for a trained model: the segment label of each window
fn hint_classifier(window: &FusedWindow) -> Result<WindowVerdict, ClassificationFailure> {
    match &window.hint {
        Some(label) => Ok(WindowVerdict::new(label.clone(), 1.0)),
        None => Err(ClassificationFailure::MalformedInput {
            reason: format!("window at {}ms carries no label", window.start_ms),
        }),
    }
}

#[derive(Serialize)]
struct DetectReport {
    fixture: String,
    frames: usize,
    events: Vec<BlockEvent>,
    blocks: Vec<BlockReport>,
    fusion: FusionStats,
}

#[derive(Serialize)]
struct BlockReport {
    results: Vec<ClassifiedExercise>,
    windows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure_code: Option<i32>,
}

fn run_detect(
    config: AppConfig,
    fixture: &Path,
    expect: Option<String>,
    output: Option<PathBuf>,
    show_telemetry: bool,
) -> Result<ExitCode> {
    let spec = load_fixture(fixture)?;
    let frames = spec.render()?;

    let observers = Arc::new(BroadcastObservers::new(frames.len() * 4 + 16, false));
    let mut rx = observers.subscribe();
    let mut pipeline = Preclassification::classifying(config, Box::new(hint_classifier));
    observers.attach(&mut pipeline);

    for frame in &frames {
        pipeline.push_data(&frame.bytes, frame.location, frame.hint.clone());
    }
    // A block still open at the end of the fixture is closed explicitly
    let still_open = pipeline.pending_windows() > 0;
    if still_open {
        pipeline.exercise_completed();
    }

    let mut report = DetectReport {
        fixture: spec.id.clone(),
        frames: frames.len(),
        events: Vec::new(),
        blocks: Vec::new(),
        fusion: pipeline.fusion_stats(),
    };
    loop {
        match rx.try_recv() {
            Ok(PipelineEvent::Block { event }) => report.events.push(event),
            Ok(PipelineEvent::Classification {
                results,
                data,
                failure_code,
            }) => report.blocks.push(BlockReport {
                results,
                windows: decode_windows(&data)?.len(),
                failure_code,
            }),
            Ok(_) => {}
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                bail!("event buffer overflowed, {} events lost", skipped)
            }
            Err(_) => break,
        }
    }

    emit(
        serde_json::to_string_pretty(&report)?.as_bytes(),
        output,
    )?;

    if show_telemetry {
        for event in telemetry::hub().snapshot().recent {
            eprintln!("{}", serde_json::to_string(&event)?);
        }
    }

    if let Some(expected) = expect {
        let matches = !report.blocks.is_empty()
            && report.blocks.iter().all(|block| {
                block
                    .results
                    .first()
                    .map(|top| top.label.as_str() == expected)
                    .unwrap_or(false)
            });
        if !matches {
            eprintln!("Expected every block to be classified as {}", expected);
            return Ok(ExitCode::from(2));
        }
    }
    Ok(ExitCode::from(0))
}

fn run_train(
    config: AppConfig,
    fixture: &Path,
    label: String,
    output: &Path,
) -> Result<ExitCode> {
    let spec = load_fixture(fixture)?;
    let label = ExerciseLabel::new(label);

    let observers = Arc::new(BroadcastObservers::default());
    let mut rx = observers.subscribe();
    let mut pipeline = Preclassification::training(config);
    observers.attach(&mut pipeline);

    pipeline.training_started(label.clone());
    for frame in spec.render()? {
        pipeline.push_data(&frame.bytes, frame.location, None);
    }
    pipeline.training_completed();

    loop {
        match rx.try_recv() {
            Ok(PipelineEvent::Training { label, data }) => {
                fs::write(output, &data)
                    .with_context(|| format!("writing {}", output.display()))?;
                println!(
                    "{}",
                    serde_json::json!({
                        "label": label,
                        "windows": decode_windows(&data)?.len(),
                        "bytes": data.len(),
                        "output": output.display().to_string(),
                    })
                );
                return Ok(ExitCode::from(0));
            }
            Ok(_) => continue,
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    bail!("training session for {} produced no corpus", label)
}

#[derive(Serialize)]
struct WindowSummary {
    start_ms: u64,
    length_ms: u64,
    channels: usize,
    samples: usize,
    gaps: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<ExerciseLabel>,
}

fn run_inspect(input: &Path) -> Result<ExitCode> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let windows = decode_windows(&bytes)
        .with_context(|| format!("decoding corpus {}", input.display()))?;

    for window in &windows {
        let summary = WindowSummary {
            start_ms: window.start_ms,
            length_ms: window.length_ms,
            channels: window.channels.len(),
            samples: window.sample_count(),
            gaps: window.gaps.len(),
            hint: window.hint.clone(),
        };
        println!("{}", serde_json::to_string(&summary)?);
    }
    eprintln!("{} windows", windows.len());
    Ok(ExitCode::from(0))
}

fn emit(bytes: &[u8], output: Option<PathBuf>) -> Result<()> {
    if let Some(path) = output {
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    } else {
        std::io::stdout().write_all(bytes)?;
    }
    Ok(())
}
