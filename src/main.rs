//! jam-session binary entry point.
//!
//! Startup sequence for `jam`:
//! 1. Parse CLI arguments and initialise `env_logger`
//! 2. Load `AppConfig` (falls back to defaults on error)
//! 3. Build the tokio runtime
//! 4. Load the backtrack, if one was given, onto the backtrack track
//! 5. Check the response service (a failure is only logged)
//! 6. Spawn the `DialogueOrchestrator` on the phrase channel
//! 7. Open the microphone and start the `CaptureSession`
//! 8. Tick the sync clock and the playback coordinator until Ctrl-C
//! 9. Stop capture, wait for pending replies, export the session
//!
//! The other subcommands (`extract`, `render`, `probe`) are one-shot
//! offline tools over WAV and JSON files.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use jam_session::audio::{decode_wav, encode_wav, mix_planar, AudioCapture, PcmBuffer};
use jam_session::cli::{init_logging, Args, Command};
use jam_session::config::{AppConfig, AppPaths};
use jam_session::midi::{Note, NoteExtractor, NoteList, NoteSynthesizer};
use jam_session::phrase::{segment_buffer, CaptureSession, Phrase};
use jam_session::pipeline::{DialogueOrchestrator, RecordingState, SessionState, SharedSession};
use jam_session::response::{HttpResponseService, ResponseService, WireNote};
use jam_session::timeline::{mixdown, Coordinator, TrackRole, TrackSet};
use jam_session::upload::BacktrackLoader;

/// Shortest sound region `extract --segments` reports.
const MIN_SEGMENT_SECS: f64 = 0.1;

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    let args = Args::parse();
    init_logging(&args);

    // 2. Configuration
    let config = load_config(args.config.as_deref());

    match args.command {
        Command::Jam {
            device,
            backtrack,
            out,
        } => run_jam(&config, device.as_deref(), backtrack.as_deref(), out),
        Command::Extract { wav, segments } => run_extract(&config, &wav, segments),
        Command::Render { notes, out } => run_render(&config, &notes, &out),
        Command::Probe { wav } => run_probe(&config, &wav),
    }
}

fn load_config(path: Option<&Path>) -> AppConfig {
    let loaded = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    })
}

// ---------------------------------------------------------------------------
// jam
// ---------------------------------------------------------------------------

fn run_jam(
    config: &AppConfig,
    device: Option<&str>,
    backtrack: Option<&Path>,
    out: Option<PathBuf>,
) -> Result<()> {
    log::info!("jam-session starting up");

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let session = SharedSession::new(SessionState::new(config.session.default_bpm));

    // 4. Backtrack
    if let Some(path) = backtrack {
        load_backtrack(config, &session, path);
    }

    // 5. Response service
    let service: Arc<dyn ResponseService> =
        Arc::new(HttpResponseService::from_config(&config.response));
    if let Err(e) = rt.block_on(service.health()) {
        log::warn!(
            "Response service at {} is not healthy ({e}); phrases will get no reply until it is",
            config.response.base_url
        );
    }

    // 6. Orchestrator
    let (phrase_tx, phrase_rx) = mpsc::channel::<Phrase>(config.segmenter.queue_capacity.max(1));
    let orchestrator = DialogueOrchestrator::new(
        session.clone(),
        NoteExtractor::new(config.extractor.clone()),
        NoteSynthesizer::new(config.synth_for_session()),
        service,
        config.dialogue.clone(),
    );
    let orchestrator = rt.spawn(orchestrator.run(phrase_rx));

    // 7. Capture, aligned with the clock position at which transport starts
    let origin = session.read(|s| s.clock.position());
    let capture = AudioCapture::with_device(device).and_then(|input| {
        CaptureSession::start(
            &input,
            &config.segmenter,
            config.session.sample_rate,
            origin,
            phrase_tx,
        )
    });
    let recording = match &capture {
        Ok(_) => RecordingState::Listening,
        Err(e) => {
            log::error!("Audio capture unavailable: {e}");
            RecordingState::Stopped
        }
    };
    session.update(|s| {
        let mut next = match &capture {
            Ok(_) => s.clone(),
            Err(e) => s.with_error(e.to_string()),
        };
        next.recording = recording;
        next.clock.play(Instant::now());
        next
    });

    // 8. Transport loop
    let capture = capture.ok();
    log::info!("Jamming. Press Ctrl-C to stop and export.");
    rt.block_on(transport_loop(
        &session,
        capture.as_ref(),
        Duration::from_millis(config.session.tick_ms.max(1)),
    ));

    // 9. Shutdown and export
    if let Some(capture) = capture {
        capture.stop();
    }
    session.update(|s| {
        let mut next = s.clone();
        next.recording = RecordingState::Stopped;
        next.clock.pause(Instant::now());
        next
    });

    let grace = Duration::from_secs(config.response.timeout_secs + 5);
    match rt.block_on(async { tokio::time::timeout(grace, orchestrator).await }) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::error!("Orchestrator task failed: {e}"),
        Err(_) => log::warn!("Gave up waiting for pending replies after {grace:?}"),
    }

    let root = out.unwrap_or_else(|| AppPaths::new().exports_dir);
    let dir = AppPaths::session_dir(&root, chrono::Local::now());
    export_session(&session.snapshot(), config.session.sample_rate, &dir)?;
    log::info!("Session exported to {}", dir.display());
    Ok(())
}

fn load_backtrack(config: &AppConfig, session: &SharedSession, path: &Path) {
    let loader = BacktrackLoader::from_config(&config.session);
    match loader.load_file(path) {
        Ok(track) => {
            log::info!(
                "Backtrack {:?}: {:.1}s, {} BPM",
                track.name,
                track.metadata.duration,
                track.metadata.bpm
            );
            session.update(move |s| s.with_backtrack(track.name, track.buffer, track.metadata.bpm));
        }
        Err(e) => log::warn!("Backtrack {} not loaded: {e}", path.display()),
    }
}

async fn transport_loop(session: &SharedSession, capture: Option<&CaptureSession>, tick: Duration) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut coordinator = Coordinator::new();
    let mut last_position = 0.0;
    // Larger jumps than this between ticks are seeks.
    let max_step = tick.as_secs_f64() * 2.0 + 0.05;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let capturing = capture.is_some_and(CaptureSession::is_capturing_phrase);
                let state = session.update(|s| {
                    let mut next = s.clone();
                    next.clock.sync(Instant::now());
                    if next.recording.is_recording() {
                        next.recording = if capturing {
                            RecordingState::Capturing
                        } else {
                            RecordingState::Listening
                        };
                    }
                    next
                });

                let position = state.clock.position();
                let previous = last_position;
                let jumped = position < previous || position - previous > max_step;
                if jumped {
                    coordinator.reset();
                }
                last_position = position;

                let report = coordinator.sync(&state.clock, &state.tracks);
                log::trace!(
                    "tick: {position:.2}s, {} active, {}",
                    report.active,
                    state.recording.label()
                );

                // Only playback running off the end stops transport; a seek
                // past it (auto-resume for a late reply) keeps playing.
                let crossed_end = !jumped
                    && state
                        .tracks
                        .backtrack_object()
                        .is_some_and(|b| previous <= b.end_time());
                if report.backtrack_finished && crossed_end {
                    log::info!("Backtrack finished, stopping transport");
                    session.update(|s| {
                        let mut next = s.clone();
                        next.clock.stop();
                        next
                    });
                    coordinator.reset();
                    last_position = 0.0;
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log::error!("Failed to listen for Ctrl-C: {e}");
                }
                break;
            }
        }
    }
}

/// Write the mixdown, one stem per non-empty track and the dialogue history.
fn export_session(state: &SessionState, sample_rate: u32, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mix = mixdown(&state.tracks, sample_rate);
    write_wav(&dir.join("mix.wav"), &mix)?;

    for role in TrackRole::ALL {
        let track = state.tracks.get(role);
        if track.objects.is_empty() {
            continue;
        }
        // Render the track alone at its own gain, ignoring mute and solo.
        let solo = TrackSet::default().map(role, |_| track.with_muted(false).with_solo(false));
        write_wav(
            &dir.join(format!("{role}.wav")),
            &mixdown(&solo, sample_rate),
        )?;
    }

    state
        .history
        .write_json(&dir.join("history.json"))
        .context("failed to export dialogue history")?;
    log::info!(
        "Exported {:.1}s mix and {} dialogue record(s)",
        mix.duration_secs(),
        state.history.len()
    );
    Ok(())
}

fn write_wav(path: &Path, buffer: &PcmBuffer) -> Result<()> {
    let bytes = encode_wav(buffer)?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

// ---------------------------------------------------------------------------
// extract / render / probe
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct SegmentNotes {
    id: Uuid,
    start_time: f64,
    end_time: f64,
    notes: NoteList,
}

fn run_extract(config: &AppConfig, wav: &Path, segments: bool) -> Result<()> {
    let bytes = std::fs::read(wav).with_context(|| format!("failed to read {}", wav.display()))?;
    let decoded = decode_wav(&bytes)?;
    let channels: Vec<&[f32]> = (0..decoded.num_channels())
        .map(|c| decoded.channel(c))
        .collect();
    let mono = PcmBuffer::mono(mix_planar(&channels), decoded.sample_rate());
    let extractor = NoteExtractor::new(config.extractor.clone());

    let json = if segments {
        let found: Vec<SegmentNotes> =
            segment_buffer(&mono, config.segmenter.energy_threshold, MIN_SEGMENT_SECS)
                .into_iter()
                .map(|segment| SegmentNotes {
                    id: segment.id,
                    start_time: segment.start_time,
                    end_time: segment.end_time,
                    notes: extractor.extract(&segment.buffer),
                })
                .collect();
        log::info!("{} segment(s) in {}", found.len(), wav.display());
        serde_json::to_string_pretty(&found)?
    } else {
        let notes = extractor.extract(&mono);
        log::info!("{} note(s) in {}", notes.len(), wav.display());
        serde_json::to_string_pretty(&notes)?
    };
    println!("{json}");
    Ok(())
}

fn run_render(config: &AppConfig, notes_path: &Path, out: &Path) -> Result<()> {
    let text = std::fs::read_to_string(notes_path)
        .with_context(|| format!("failed to read {}", notes_path.display()))?;
    let wire: Vec<WireNote> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON note list", notes_path.display()))?;
    let max_secs = config.session.max_duration_secs;
    let notes = wire
        .into_iter()
        .map(|w| Note::try_from(w).and_then(|note| note.within(max_secs)))
        .collect::<Result<Vec<_>, _>>()?;
    let notes = NoteList::from_notes(notes);

    let synth = NoteSynthesizer::new(config.synth_for_session());
    let buffer = synth.render(&notes).normalized();
    write_wav(out, &buffer)?;
    log::info!(
        "Rendered {} note(s), {:.2}s to {}",
        notes.len(),
        buffer.duration_secs(),
        out.display()
    );
    Ok(())
}

fn run_probe(config: &AppConfig, wav: &Path) -> Result<()> {
    let bytes = std::fs::read(wav).with_context(|| format!("failed to read {}", wav.display()))?;
    let meta = BacktrackLoader::from_config(&config.session).inspect(&bytes)?;
    println!("duration: {:.2}s", meta.duration);
    println!(
        "bpm:      {}{}",
        meta.bpm,
        if meta.bpm_detected { "" } else { " (default)" }
    );
    if !meta.decoded {
        println!("note:     sample data unreadable, header only");
    }
    Ok(())
}
