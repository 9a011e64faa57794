use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use ledweaver_core::{
    layers, AudioRegistry, Effect, Frame, FrameSink, GlobalSettings, LedTopology, ProfileStore,
    RenderScheduler,
};
use tracing_subscriber::EnvFilter;

fn main() -> ledweaver_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => run_devices(),
        Commands::Demo { leds, seconds, fps } => run_demo(leds, seconds, fps),
        Commands::Profiles { dir } => run_profiles(&dir),
        Commands::Show { dir, name } => run_show(&dir, &name),
    }
}

fn run_devices() -> ledweaver_core::Result<()> {
    let devices = ledweaver_core::list_input_devices();
    if devices.is_empty() {
        println!("no capture devices found");
    }
    for name in devices {
        println!("{name}");
    }
    Ok(())
}

/// Renders a gradient/wave/breathing stack to a logging sink for a few
/// seconds, exercising the full scheduler path without hardware.
fn run_demo(leds: usize, seconds: f32, fps: f32) -> ledweaver_core::Result<()> {
    tracing::info!(leds, seconds, fps, "starting demo render");

    let registry = layers::builtin_registry();
    let mut effect = Effect::new();
    for tag in ["GradientLayer", "WaveLayer", "BreathingLayer"] {
        effect.add_layer(
            registry
                .create(tag)
                .ok_or_else(|| ledweaver_core::LedWeaverError::msg(format!("missing layer {tag}")))?,
        );
    }

    let topology = LedTopology::from_devices([("Demo Strip", leds)]);
    let effects = Arc::new(Mutex::new(vec![effect]));
    let settings = Arc::new(Mutex::new(GlobalSettings {
        fps_limit: fps,
        ..Default::default()
    }));
    let audio = Arc::new(AudioRegistry::new());

    let scheduler = RenderScheduler::spawn(
        topology,
        effects,
        settings,
        audio.clone(),
        Box::new(LogSink::default()),
    );
    std::thread::sleep(Duration::from_secs_f32(seconds.max(0.0)));
    scheduler.stop();
    audio.shutdown();
    Ok(())
}

fn run_profiles(dir: &PathBuf) -> ledweaver_core::Result<()> {
    let store = ProfileStore::open(dir)?;
    for name in store.list()? {
        println!("{name}");
    }
    Ok(())
}

fn run_show(dir: &PathBuf, name: &str) -> ledweaver_core::Result<()> {
    let store = ProfileStore::open(dir)?;
    match store.load(name)? {
        Some(doc) => {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        None => Err(ledweaver_core::LedWeaverError::msg(format!(
            "no profile named `{name}`"
        ))),
    }
}

/// Sink that logs a one-line summary instead of driving hardware.
#[derive(Default)]
struct LogSink {
    frames: u64,
}

impl FrameSink for LogSink {
    fn push_frame(&mut self, frame: &Frame) -> ledweaver_core::Result<()> {
        self.frames += 1;
        if self.frames % 60 == 0 {
            let first = frame.first().copied();
            tracing::info!(frames = self.frames, ?first, "demo frame");
        }
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Layered, audio-reactive LED lighting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available audio capture devices.
    Devices,
    /// Render a built-in demo effect to the log for a few seconds.
    Demo {
        /// Number of LEDs in the demo strip.
        #[arg(long, default_value_t = 30)]
        leds: usize,
        /// How long to run, in seconds.
        #[arg(long, default_value_t = 3.0)]
        seconds: f32,
        /// Target frame rate.
        #[arg(long, default_value_t = 60.0)]
        fps: f32,
    },
    /// List saved profiles in a directory.
    Profiles {
        /// Directory holding profile JSON files.
        #[arg(short, long, default_value = "profiles")]
        dir: PathBuf,
    },
    /// Print a saved profile document.
    Show {
        /// Directory holding profile JSON files.
        #[arg(short, long, default_value = "profiles")]
        dir: PathBuf,
        /// Profile name (without extension).
        name: String,
    },
}
