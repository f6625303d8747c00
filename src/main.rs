//! ScreenSentry - Real-time on-screen text redaction
//!
//! Captures a display, finds sensitive text with OCR and shows the frames with
//! every detected region painted over.

mod app;
mod capture;
mod config;
mod detection;
mod error;
#[cfg(feature = "desktop")]
mod hotkey;
mod output;
mod pipeline;
mod redaction;
mod shared;
mod tracking;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::{run_session, ExecutionMode};
use crate::capture::{DisplaySource, ImageSequenceSource};
use crate::config::AppConfig;
use crate::output::{FrameSink, NullSink, PngSequenceSink};
use crate::shared::CancelToken;
use crate::vision::TextRecognizer;

/// ScreenSentry - redact sensitive on-screen text in real time
#[derive(Parser, Debug)]
#[command(name = "screen-sentry")]
#[command(about = "Capture a display and paint over sensitive text found by OCR")]
struct Args {
    /// Display index to capture (0 = first)
    #[arg(short, long)]
    display: Option<usize>,

    /// List available displays and exit
    #[arg(long)]
    list_displays: bool,

    /// Redact phone numbers, SSNs and IP addresses instead of words
    #[arg(long)]
    privacy: bool,

    /// Capture only the top half of the display
    #[arg(long)]
    top_half: bool,

    /// Extra words to redact (comma separated)
    #[arg(long, value_delimiter = ',')]
    words: Vec<String>,

    /// Replay a directory of screenshots instead of a live display
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Serve replay frames at most this often (simulates a refresh rate)
    #[arg(long, requires = "replay")]
    replay_interval_ms: Option<u64>,

    /// Restart the replay after the last frame
    #[arg(long, requires = "replay")]
    replay_loop: bool,

    /// Write redacted frames as PNG files into this directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only write every n-th redacted frame
    #[arg(long, requires = "output", default_value_t = 1)]
    output_every: u64,

    /// Run OCR inline on the display loop
    #[arg(long)]
    single_thread: bool,

    /// Minimum time between OCR runs
    #[arg(long)]
    ocr_interval_ms: Option<u64>,

    /// Forget boxes not re-detected within this time
    #[arg(long)]
    box_ttl_ms: Option<u64>,

    /// Minimum delay between individual rectangle paints
    #[arg(long)]
    paint_delay_ms: Option<u64>,

    /// Directory holding the tessdata language files
    #[arg(long)]
    tessdata: Option<PathBuf>,

    /// Tesseract language code
    #[arg(long)]
    lang: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// CLI flags take precedence over file values
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(display) = self.display {
            config.session.display_index = display;
        }
        if self.privacy {
            config.session.privacy_mode = true;
        }
        if self.top_half {
            config.session.capture_entire_display = false;
        }
        if !self.words.is_empty() {
            config.detection.words.extend(self.words.iter().cloned());
        }
        if self.single_thread {
            config.pipeline.mode = ExecutionMode::SingleThread;
        }
        if let Some(ms) = self.ocr_interval_ms {
            config.pipeline.ocr_interval_ms = ms;
        }
        if let Some(ms) = self.box_ttl_ms {
            config.tracking.box_ttl_ms = Some(ms);
        }
        if let Some(ms) = self.paint_delay_ms {
            config.redaction.paint_delay_ms = ms;
        }
        if let Some(dir) = &self.tessdata {
            config.detection.tesseract.data_path = Some(dir.clone());
        }
        if let Some(lang) = &self.lang {
            config.detection.tesseract.language = lang.clone();
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    let mut config = config::load_or_default(&config_path)?;
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    if args.write_config {
        config::save_config(&config, &config_path)?;
        println!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    match &args.replay {
        Some(dir) => {
            let mut source = ImageSequenceSource::open(dir)?.looping(args.replay_loop);
            if let Some(ms) = args.replay_interval_ms {
                source = source.with_frame_interval(Duration::from_millis(ms));
            }
            start(&source, &args, &config)
        }
        None => start_live(&args, &config),
    }
}

#[cfg(feature = "desktop")]
fn start_live(args: &Args, config: &AppConfig) -> Result<()> {
    start(&capture::xcap_backend::XcapDisplays::new(), args, config)
}

#[cfg(not(feature = "desktop"))]
fn start_live(_args: &Args, _config: &AppConfig) -> Result<()> {
    Err(error::SentryError::DisplayEnumeration(
        "live capture needs the `desktop` feature; use --replay <dir> instead".into(),
    )
    .into())
}

fn start<D: DisplaySource>(source: &D, args: &Args, config: &AppConfig) -> Result<()> {
    if args.list_displays {
        return list_displays(source);
    }

    info!("ScreenSentry starting...");

    let cancel = CancelToken::new();
    register_signals(&cancel);

    let recognizer = create_recognizer(config)?;
    let sink: Box<dyn FrameSink> = match &args.output {
        Some(dir) => Box::new(PngSequenceSink::create(dir)?.every_nth(args.output_every)),
        None => {
            warn!("No --output directory given; redacted frames are discarded");
            Box::new(NullSink)
        }
    };
    let sink = with_quit_hotkey(sink, config);

    let summary = run_session(source, &config.session_plan(), recognizer, sink, cancel)?;
    if let Some(last_error) = &summary.stats.last_error {
        warn!("Last detection error: {}", last_error);
    }

    info!("ScreenSentry shutdown complete");
    Ok(())
}

#[cfg(feature = "tesseract")]
fn create_recognizer(config: &AppConfig) -> Result<Box<dyn TextRecognizer>> {
    let ocr = vision::TesseractOcr::new(config.detection.tesseract.clone())
        .context("starting the OCR engine")?;
    Ok(Box::new(ocr))
}

#[cfg(not(feature = "tesseract"))]
fn create_recognizer(_config: &AppConfig) -> Result<Box<dyn TextRecognizer>> {
    Err(anyhow::anyhow!(
        "built without an OCR backend; rebuild with `--features tesseract`"
    ))
}

#[cfg(feature = "desktop")]
fn with_quit_hotkey(sink: Box<dyn FrameSink>, config: &AppConfig) -> Box<dyn FrameSink> {
    match hotkey::QuitHotkey::register(&config.pipeline.quit_hotkey) {
        Ok(quit) => Box::new(hotkey::HotkeyQuitSink::new(sink, quit)),
        Err(e) => {
            warn!("Quit hotkey unavailable: {}", e);
            sink
        }
    }
}

#[cfg(not(feature = "desktop"))]
fn with_quit_hotkey(sink: Box<dyn FrameSink>, _config: &AppConfig) -> Box<dyn FrameSink> {
    sink
}

fn list_displays<D: DisplaySource>(source: &D) -> Result<()> {
    let displays = source.list_displays()?;
    println!("Available displays:");
    if displays.is_empty() {
        println!("  No displays detected");
    }
    for display in &displays {
        println!(
            "  [{}] {} - {}x{} at ({}, {}){}",
            display.index,
            display.name.as_deref().unwrap_or("Unknown"),
            display.bounds.width,
            display.bounds.height,
            display.bounds.left,
            display.bounds.top,
            if display.is_primary { " (primary)" } else { "" }
        );
    }
    Ok(())
}

fn register_signals(cancel: &CancelToken) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, cancel.flag()) {
            warn!("Could not install handler for signal {}: {}", signal, e);
        }
    }
}
