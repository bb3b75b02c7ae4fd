//! Dialogue orchestrator: turns finalized phrases into placed replies.
//!
//! [`DialogueOrchestrator`] consumes [`Phrase`]s from the bounded queue fed
//! by the capture session.
//!
//! # Flow per phrase
//!
//! ```text
//! Phrase
//!   └─▶ append user AudioObject                      [synchronous]
//!   └─▶ spawn task
//!         └─▶ spawn_blocking(extractor.extract)
//!               ├─ empty → done (no reply)
//!               └─ notes → service.respond (async)
//!                     ├─ Err → warn, record last_error, done
//!                     └─ Ok  → spawn_blocking(synth.render)
//!                              └─▶ append AI object + DialogueRecord
//!                              └─▶ transport idle? seek before reply, play
//! ```
//!
//! Replies run concurrently, so records land in response-arrival order.
//! Stopping playback never cancels an in-flight reply.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use crate::audio::pcm::PcmBuffer;
use crate::config::DialogueConfig;
use crate::midi::{NoteExtractor, NoteList, NoteSynthesizer};
use crate::phrase::Phrase;
use crate::response::{ResponseError, ResponseService};
use crate::timeline::{AudioObject, TrackRole};

use super::history::DialogueRecord;
use super::state::SharedSession;

// ---------------------------------------------------------------------------
// DialogueError
// ---------------------------------------------------------------------------

/// Why a phrase got no reply.  None of these stop the session.
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("response failed: {0}")]
    Response(#[from] ResponseError),

    #[error("worker task failed: {0}")]
    Task(#[from] JoinError),
}

/// What happened to one phrase.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// No pitch in the phrase; nothing was sent.
    NoNotes,
    /// The reply was placed on the AI track.
    Placed(DialogueRecord),
}

/// The user object a reply answers.
#[derive(Debug, Clone)]
struct UserPhrase {
    id: Uuid,
    buffer: Arc<PcmBuffer>,
    start_time: f64,
    duration: f64,
}

// ---------------------------------------------------------------------------
// DialogueOrchestrator
// ---------------------------------------------------------------------------

/// Drives the phrase → notes → reply → audio loop.
///
/// Create with [`DialogueOrchestrator::new`], then call [`run`](Self::run)
/// inside a tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use jam_session::config::AppConfig;
/// use jam_session::midi::{NoteExtractor, NoteSynthesizer};
/// use jam_session::pipeline::{DialogueOrchestrator, SessionState, SharedSession};
/// use jam_session::response::HttpResponseService;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let session = SharedSession::new(SessionState::new(config.session.default_bpm));
/// let (phrase_tx, phrase_rx) = tokio::sync::mpsc::channel(config.segmenter.queue_capacity);
///
/// let orchestrator = DialogueOrchestrator::new(
///     session,
///     NoteExtractor::new(config.extractor.clone()),
///     NoteSynthesizer::new(config.synth_for_session()),
///     Arc::new(HttpResponseService::from_config(&config.response)),
///     config.dialogue.clone(),
/// );
/// // phrase_tx is handed to CaptureSession::start(...)
/// # drop(phrase_tx);
/// orchestrator.run(phrase_rx).await;
/// # }
/// ```
#[derive(Clone)]
pub struct DialogueOrchestrator {
    session: SharedSession,
    extractor: Arc<NoteExtractor>,
    synth: Arc<NoteSynthesizer>,
    service: Arc<dyn ResponseService>,
    config: DialogueConfig,
}

impl DialogueOrchestrator {
    pub fn new(
        session: SharedSession,
        extractor: NoteExtractor,
        synth: NoteSynthesizer,
        service: Arc<dyn ResponseService>,
        config: DialogueConfig,
    ) -> Self {
        Self {
            session,
            extractor: Arc::new(extractor),
            synth: Arc::new(synth),
            service,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until `phrase_rx` closes, then wait for every in-flight reply.
    pub async fn run(self, mut phrase_rx: mpsc::Receiver<Phrase>) {
        let mut replies = JoinSet::new();

        loop {
            tokio::select! {
                phrase = phrase_rx.recv() => match phrase {
                    Some(phrase) => {
                        let user = self.place_user_phrase(phrase);
                        replies.spawn(self.clone().answer(user));
                    }
                    None => break,
                },
                Some(done) = replies.join_next(), if !replies.is_empty() => {
                    log_join(done);
                }
            }
        }

        while let Some(done) = replies.join_next().await {
            log_join(done);
        }
        log::info!("dialogue: phrase queue closed, orchestrator shutting down");
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Put the phrase on the user track before any asynchronous work.
    fn place_user_phrase(&self, phrase: Phrase) -> UserPhrase {
        let object = AudioObject::new(phrase.buffer, phrase.start_time);
        let user = UserPhrase {
            id: object.id,
            buffer: Arc::clone(&object.buffer),
            start_time: object.start_time,
            duration: object.duration,
        };

        self.session.update(|s| {
            let mut next = s.with_object(TrackRole::User, object);
            next.pending_replies += 1;
            next
        });
        log::info!(
            "dialogue: user phrase at {:.2}s ({:.2}s)",
            user.start_time,
            user.duration
        );
        user
    }

    /// Produce and place the reply for one user phrase.
    async fn answer(self, user: UserPhrase) -> Result<ReplyOutcome, DialogueError> {
        let result = self.try_answer(&user).await;

        self.session.update(|s| {
            let mut next = match &result {
                Err(e) => s.with_error(e.to_string()),
                Ok(_) => s.clone(),
            };
            next.pending_replies = next.pending_replies.saturating_sub(1);
            next
        });
        if let Err(e) = &result {
            log::warn!("dialogue: no reply for phrase at {:.2}s: {e}", user.start_time);
        }
        result
    }

    async fn try_answer(&self, user: &UserPhrase) -> Result<ReplyOutcome, DialogueError> {
        // ── 1. Notes (blocking → thread pool) ───────────────────────────────
        let extractor = Arc::clone(&self.extractor);
        let buffer = Arc::clone(&user.buffer);
        let user_notes = tokio::task::spawn_blocking(move || extractor.extract(&buffer)).await?;

        if user_notes.is_empty() {
            log::info!("dialogue: no pitch in phrase at {:.2}s", user.start_time);
            return Ok(ReplyOutcome::NoNotes);
        }

        // ── 2. Reply (async, may be slow or fail) ───────────────────────────
        let bpm = self.session.read(|s| s.bpm);
        let ai_notes = self.service.respond(bpm, &user_notes).await?;

        // ── 3. Audio (blocking → thread pool) ───────────────────────────────
        let synth = Arc::clone(&self.synth);
        let notes = ai_notes.clone();
        let rendered = tokio::task::spawn_blocking(move || synth.render(&notes).normalized()).await?;

        // ── 4. Placement ────────────────────────────────────────────────────
        Ok(ReplyOutcome::Placed(self.place_reply(user, user_notes, ai_notes, rendered)))
    }

    fn place_reply(
        &self,
        user: &UserPhrase,
        user_notes: NoteList,
        ai_notes: NoteList,
        rendered: PcmBuffer,
    ) -> DialogueRecord {
        let ai_start =
            (user.start_time + user.duration - self.config.response_lead_secs).max(0.0);
        let object = AudioObject::new(rendered, ai_start)
            .with_source(user.id)
            .with_notes(ai_notes.clone());
        let record = DialogueRecord::new(user_notes, ai_notes, user.start_time, ai_start);

        let ai_end = object.end_time();
        let overlapping = self.session.read(|s| {
            s.tracks
                .get(TrackRole::Ai)
                .objects
                .iter()
                .filter(|o| o.start_time < ai_end && ai_start < o.end_time())
                .count()
        });
        if overlapping > 0 {
            log::debug!("dialogue: reply at {ai_start:.2}s overlaps {overlapping} earlier reply(ies)");
        }

        let auto_resume = self.config.auto_resume;
        let resume_at = (ai_start - self.config.auto_resume_lead_secs).max(0.0);
        let placed = record.clone();

        let next = self.session.update(move |s| {
            let mut next = s.with_object(TrackRole::Ai, object).with_record(record);
            if auto_resume && !next.clock.is_playing() {
                let now = Instant::now();
                next.clock.seek(resume_at, now);
                next.clock.play(now);
            }
            next
        });

        log::info!(
            "dialogue: reply of {} note(s) placed at {:.2}s ({} record(s))",
            placed.ai_midi.len(),
            ai_start,
            next.history.len()
        );
        placed
    }
}

fn log_join(done: Result<Result<ReplyOutcome, DialogueError>, JoinError>) {
    if let Err(e) = done {
        log::error!("dialogue: reply task panicked: {e}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
