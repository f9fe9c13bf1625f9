//! Guest conversion service.
//!
//! Counts what a guest does and decides, per event, whether to show a
//! "create an account" prompt. Each event is one transaction: the counter is
//! incremented in the store and the decision is made on the re-read row, so
//! concurrent events for one guest neither lose increments nor double-fire.

use std::fmt;
use std::str::FromStr;

use aiponge_common::{AppError, AppResult};
use aiponge_db::entities::{guest_conversion_policy, guest_conversion_state};
use aiponge_db::repositories::GuestConversionRepository;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{DbErr, TransactionTrait};
use serde::{Deserialize, Serialize};

/// Something a guest did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestEvent {
    SongCreated,
    TrackPlayed,
    EntryCreated,
}

impl GuestEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SongCreated => "song_created",
            Self::TrackPlayed => "track_played",
            Self::EntryCreated => "entry_created",
        }
    }

    /// Counter column the event increments.
    #[must_use]
    pub const fn counter(self) -> guest_conversion_state::Column {
        match self {
            Self::SongCreated => guest_conversion_state::Column::SongsGenerated,
            Self::TrackPlayed => guest_conversion_state::Column::TracksPlayed,
            Self::EntryCreated => guest_conversion_state::Column::EntriesSaved,
        }
    }

    /// Prompt shown when this event's counter reaches its threshold.
    #[must_use]
    pub const fn prompt_type(self) -> PromptType {
        match self {
            Self::SongCreated => PromptType::FirstSong,
            Self::TrackPlayed => PromptType::MultipleTracks,
            Self::EntryCreated => PromptType::EntriesCreated,
        }
    }
}

impl fmt::Display for GuestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuestEvent {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "song_created" => Ok(Self::SongCreated),
            "track_played" => Ok(Self::TrackPlayed),
            "entry_created" => Ok(Self::EntryCreated),
            other => Err(AppError::Validation(format!("Unknown guest event: {other}"))),
        }
    }
}

/// Which conversion prompt to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    FirstSong,
    MultipleTracks,
    EntriesCreated,
}

/// Copy for a conversion prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PromptContent {
    pub title: &'static str,
    pub message: &'static str,
    pub cta: &'static str,
}

/// Prompt copy from the built-in message table.
#[must_use]
pub const fn default_prompt_content(prompt_type: PromptType) -> PromptContent {
    match prompt_type {
        PromptType::FirstSong => PromptContent {
            title: "You made your first song!",
            message: "Create a free account to keep it and everything you make next.",
            cta: "Save my song",
        },
        PromptType::MultipleTracks => PromptContent {
            title: "Enjoying the music?",
            message: "Sign up to build your library and pick up where you left off on any device.",
            cta: "Create account",
        },
        PromptType::EntriesCreated => PromptContent {
            title: "Your entries are worth keeping",
            message: "Create an account so your journal is safe and turns into songs over time.",
            cta: "Keep my entries",
        },
    }
}

/// Thresholds and cooldown used to decide on prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionPolicy {
    pub first_song_threshold: i32,
    pub tracks_played_threshold: i32,
    pub entries_created_threshold: i32,
    pub prompt_cooldown: Duration,
}

impl Default for ConversionPolicy {
    fn default() -> Self {
        Self {
            first_song_threshold: 1,
            tracks_played_threshold: 3,
            entries_created_threshold: 2,
            prompt_cooldown: Duration::hours(24),
        }
    }
}

impl From<&guest_conversion_policy::Model> for ConversionPolicy {
    fn from(row: &guest_conversion_policy::Model) -> Self {
        Self {
            first_song_threshold: row.songs_threshold,
            tracks_played_threshold: row.tracks_threshold,
            entries_created_threshold: row.entries_created_threshold,
            prompt_cooldown: Duration::hours(i64::from(row.cooldown_hours)),
        }
    }
}

impl ConversionPolicy {
    const fn threshold_for(&self, event: GuestEvent) -> i32 {
        match event {
            GuestEvent::SongCreated => self.first_song_threshold,
            GuestEvent::TrackPlayed => self.tracks_played_threshold,
            GuestEvent::EntryCreated => self.entries_created_threshold,
        }
    }
}

/// Engagement counters reported back to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    pub songs_created: i32,
    pub tracks_played: i32,
    pub entries_created: i32,
}

impl From<&guest_conversion_state::Model> for ConversionStats {
    fn from(state: &guest_conversion_state::Model) -> Self {
        Self {
            songs_created: state.songs_generated,
            tracks_played: state.tracks_played,
            entries_created: state.entries_saved,
        }
    }
}

/// Outcome of tracking one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEventResult {
    pub should_prompt: bool,
    pub prompt_type: Option<PromptType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_content: Option<PromptContent>,
    pub stats: ConversionStats,
}

const fn counter_value(state: &guest_conversion_state::Model, event: GuestEvent) -> i32 {
    match event {
        GuestEvent::SongCreated => state.songs_generated,
        GuestEvent::TrackPlayed => state.tracks_played,
        GuestEvent::EntryCreated => state.entries_saved,
    }
}

/// Decide whether `event` should prompt, given the already-incremented state.
///
/// A prompt inside the cooldown window suppresses everything. Otherwise only
/// the event's own counter is compared, and only on exact equality, so each
/// threshold fires once as the counter passes through it.
#[must_use]
pub fn evaluate_prompt(
    event: GuestEvent,
    state: &guest_conversion_state::Model,
    policy: &ConversionPolicy,
    now: DateTime<Utc>,
) -> Option<PromptType> {
    let cooling_down = state
        .last_prompt_shown
        .is_some_and(|last| now.signed_duration_since(last) < policy.prompt_cooldown);
    if cooling_down {
        return None;
    }

    (counter_value(state, event) == policy.threshold_for(event)).then(|| event.prompt_type())
}

/// Guest conversion service for business logic.
#[derive(Clone)]
pub struct GuestConversionService {
    guest_repo: GuestConversionRepository,
}

impl GuestConversionService {
    /// Create a new guest conversion service.
    #[must_use]
    pub const fn new(guest_repo: GuestConversionRepository) -> Self {
        Self { guest_repo }
    }

    /// The active policy, or the built-in default.
    ///
    /// A failed load is logged and treated like a missing policy.
    pub async fn load_policy(&self) -> ConversionPolicy {
        match self.guest_repo.find_active_policy().await {
            Ok(Some(row)) => ConversionPolicy::from(&row),
            Ok(None) => ConversionPolicy::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load guest conversion policy, using default");
                ConversionPolicy::default()
            }
        }
    }

    /// Count one event for a guest and decide whether to prompt.
    pub async fn track_event(&self, user_id: &str, event: GuestEvent) -> AppResult<TrackEventResult> {
        let policy = self.load_policy().await;
        self.track_event_at(user_id, event, &policy, Utc::now())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn track_event_at(
        &self,
        user_id: &str,
        event: GuestEvent,
        policy: &ConversionPolicy,
        now: DateTime<Utc>,
    ) -> Result<TrackEventResult, DbErr> {
        let txn = self.guest_repo.db().begin().await?;

        GuestConversionRepository::ensure_exists_on(&txn, user_id, now).await?;
        GuestConversionRepository::increment_counter_on(&txn, user_id, event.counter(), now)
            .await?;

        let state = GuestConversionRepository::find_by_user_id_on(&txn, user_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("guest_conversion_state {user_id}")))?;

        let prompt_type = evaluate_prompt(event, &state, policy, now);
        if prompt_type.is_some() {
            GuestConversionRepository::record_prompt_on(&txn, user_id, now).await?;
        }

        txn.commit().await?;

        if let Some(prompt) = prompt_type {
            tracing::info!(user_id = %user_id, event = %event, prompt = ?prompt, "Guest conversion prompt triggered");
        }

        Ok(TrackEventResult {
            should_prompt: prompt_type.is_some(),
            prompt_type,
            prompt_content: prompt_type.map(default_prompt_content),
            stats: ConversionStats::from(&state),
        })
    }

    /// Record that the guest registered. Safe to call more than once.
    pub async fn mark_converted(&self, user_id: &str) -> AppResult<()> {
        self.guest_repo.mark_converted(user_id, Utc::now()).await?;
        tracing::info!(user_id = %user_id, "Guest converted");
        Ok(())
    }

    /// Current counters for a guest, zero if nothing was tracked yet.
    pub async fn get_stats(&self, user_id: &str) -> AppResult<ConversionStats> {
        Ok(self
            .guest_repo
            .find_by_user_id(user_id)
            .await?
            .as_ref()
            .map(ConversionStats::from)
            .unwrap_or_default())
    }
}
