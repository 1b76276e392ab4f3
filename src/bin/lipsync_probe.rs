//! CLI for inspecting and exercising the lip-sync driver.
//!
//! JSON goes to stdout, logs to stderr.

use clap::{Parser, Subcommand};
use lipsync::audio::capture::CpalCapture;
use lipsync::audio::decode::decode_audio_file;
use lipsync::audio::playback::{ClipPlayer, PlaybackSink};
use lipsync::sequencer::analysis::analyze_clip;
use lipsync::sequencer::text::TextSchedule;
use lipsync::viseme::classify_char;
use lipsync::{
    AvatarAnimator, LipSyncConfig, LipSyncEvent, PlaybackDriver, SessionHandle, SessionOutcome,
    SpeakingFlag, SpeechInput, extract_emotion,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Lip-sync probe: viseme schedules, clip analysis and live sessions.
#[derive(Parser)]
#[command(name = "lipsync-probe", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the text-driven viseme schedule for an utterance.
    Text {
        /// Transcript; a trailing `[emotion]` tag is honoured.
        text: String,
        /// Length of the spoken audio, in seconds.
        #[arg(short, long)]
        duration: f64,
        /// Run the schedule through the driver in real time.
        #[arg(long)]
        live: bool,
        /// With `--live`, also print one animator frame per tick.
        #[arg(long)]
        frames: bool,
    },

    /// Decode an audio file and print its analysed viseme timeline.
    Clip { path: PathBuf },

    /// Print the character classification table.
    Chars,

    /// Play an audio file while lip-syncing it.
    Play {
        path: PathBuf,
        /// Transcript of the clip; enables text-driven timing.
        #[arg(long)]
        text: Option<String>,
        /// Print one animator frame per tick.
        #[arg(long)]
        frames: bool,
    },

    /// Lip-sync the microphone.
    Listen {
        /// How long to listen, in seconds.
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        #[arg(long)]
        frames: bool,
    },

    /// List available audio devices.
    Devices,

    /// Write the default configuration to the default config path.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lipsync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        LipSyncConfig::from_file(path)?
    } else {
        LipSyncConfig::default()
    };

    match cli.command {
        Command::Text {
            text,
            duration,
            live,
            frames,
        } => run_text(config, &text, duration, live, frames).await,
        Command::Clip { path } => run_clip(&config, &path),
        Command::Chars => print_chars(),
        Command::Play { path, text, frames } => run_play(config, &path, text, frames).await,
        Command::Listen { seconds, frames } => run_listen(config, seconds, frames).await,
        Command::Devices => list_devices(),
        Command::InitConfig => init_config(),
    }
}

async fn run_text(
    config: LipSyncConfig,
    text: &str,
    duration: f64,
    live: bool,
    frames: bool,
) -> anyhow::Result<()> {
    let (clean, emotion) = extract_emotion(text);

    if !live {
        let Some(schedule) = TextSchedule::new(&clean, duration, config.sequencer.min_interval())
        else {
            anyhow::bail!("nothing to schedule: text is empty or duration is not positive");
        };
        let out = json!({
            "emotion": emotion,
            "interval_ms": schedule.interval().as_millis() as u64,
            "total_ms": schedule.total().as_millis() as u64,
            "events": schedule.events().collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let driver = PlaybackDriver::new(config);
    driver.set_emotion(emotion);
    let events = driver.subscribe();
    let handle = driver.start(SpeechInput::text(clean, duration));
    let outcome = follow(&driver, handle, events, frames, &CancellationToken::new()).await?;
    info!(?outcome, "done");
    Ok(())
}

fn run_clip(config: &LipSyncConfig, path: &Path) -> anyhow::Result<()> {
    let clip = decode_audio_file(path)?;
    let spans = analyze_clip(&clip, &config.analysis)?;
    let out = json!({
        "sample_rate": clip.sample_rate,
        "duration_ms": clip.duration().as_millis() as u64,
        "spans": spans,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_chars() -> anyhow::Result<()> {
    for c in "abcdefghijklmnñopqrstuvwxyzáéíóúü .,!?".chars() {
        let shown = if c == ' ' { "' '".to_owned() } else { c.to_string() };
        println!("{shown}\t{}", classify_char(c));
    }
    Ok(())
}

async fn run_play(
    config: LipSyncConfig,
    path: &Path,
    text: Option<String>,
    frames: bool,
) -> anyhow::Result<()> {
    let clip = decode_audio_file(path)?;
    let duration = clip.duration();
    let driver = PlaybackDriver::new(config.clone());
    let events = driver.subscribe();
    let cancel = CancellationToken::new();

    let transcript = text.map(|t| {
        let (clean, emotion) = extract_emotion(&t);
        driver.set_emotion(emotion);
        clean
    });

    let player = match ClipPlayer::new(&config.audio) {
        Ok(p) => p,
        Err(e) => {
            // No speaker: animate for the clip's length anyway.
            warn!("cannot open output device, simulating playback: {e}");
            let flag = SpeakingFlag::new(true);
            let mut input = SpeechInput::simulated(flag.clone());
            if let Some(clean) = transcript {
                input = input.with_text(clean, duration.as_secs_f64());
            }
            let handle = driver.start(input);
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                flag.set(false);
            });
            follow(&driver, handle, events, frames, &cancel).await?;
            return Ok(());
        }
    };

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (tap_tx, tap_rx) = mpsc::channel(64);
    let mut input = SpeechInput::audio(tap_rx).with_playback(event_rx);
    if let Some(clean) = transcript {
        input = input.with_text(clean, duration.as_secs_f64());
    }
    let handle = driver.start(input);

    let sink = PlaybackSink {
        events: event_tx,
        tap: Some(tap_tx),
    };
    let play_cancel = cancel.clone();
    let playing =
        tokio::task::spawn_blocking(move || player.play(&clip, &sink, &play_cancel));

    let outcome = follow(&driver, handle, events, frames, &cancel).await?;
    cancel.cancel();
    playing.await??;
    info!(?outcome, "playback finished");
    Ok(())
}

async fn run_listen(config: LipSyncConfig, seconds: u64, frames: bool) -> anyhow::Result<()> {
    let capture = CpalCapture::new(&config.audio)?;
    let driver = PlaybackDriver::new(config);
    let events = driver.subscribe();
    let cancel = CancellationToken::new();

    let (tx, rx) = mpsc::channel(64);
    let handle = driver.start(SpeechInput::audio(rx));

    let timer = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(seconds)).await;
        timer.cancel();
    });

    eprintln!("Listening for {seconds}s. Press Ctrl+C to stop.");
    let (captured, followed) = tokio::join!(
        capture.run(tx, cancel.clone()),
        follow(&driver, handle, events, frames, &cancel),
    );
    captured?;
    let outcome = followed?;
    info!(?outcome, "listening finished");
    Ok(())
}

/// Print lifecycle events (and optionally animator frames) until the
/// session ends. Ctrl+C stops the session and fires `cancel`.
async fn follow(
    driver: &PlaybackDriver,
    handle: SessionHandle,
    mut events: broadcast::Receiver<LipSyncEvent>,
    frames: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<SessionOutcome> {
    let mut animator = AvatarAnimator::new(driver.config());
    let mut ticker = tokio::time::interval(Duration::from_millis(16));
    let mut last_tick = Instant::now();
    let done = handle.finished();
    tokio::pin!(done);

    let outcome = loop {
        tokio::select! {
            outcome = &mut done => break outcome,
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    info!("received Ctrl+C, stopping");
                    driver.stop();
                    cancel.cancel();
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event)?,
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("skipped {n} events"),
                Err(broadcast::error::RecvError::Closed) => {}
            },
            _ = ticker.tick(), if frames => {
                let now = Instant::now();
                let delta = now.duration_since(last_tick).as_secs_f32();
                last_tick = now;
                let snapshot = animator.tick(delta, &driver.snapshot());
                println!("{}", serde_json::to_string(&snapshot)?);
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }
    Ok(outcome)
}

fn print_event(event: &LipSyncEvent) -> anyhow::Result<()> {
    // Levels arrive every analysis frame; the frame output carries them.
    if !matches!(event, LipSyncEvent::AudioLevel { .. }) {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in CpalCapture::list_input_devices()? {
        println!("  - {name}");
    }

    println!("\nOutput devices:");
    for name in ClipPlayer::list_output_devices()? {
        println!("  - {name}");
    }

    Ok(())
}

fn init_config() -> anyhow::Result<()> {
    let path = LipSyncConfig::default_config_path();
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    LipSyncConfig::default().save_to_file(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
