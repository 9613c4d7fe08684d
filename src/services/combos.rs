use crate::models::config::ComboFilterSettings;
use crate::models::replay::{
    CHARACTER_ICE_CLIMBERS, Combo, ComboEnded, GameInfo, MOVE_BACK_THROW, MOVE_DOWN_THROW,
    MOVE_FORWARD_THROW, MOVE_PUMMEL, MOVE_UP_THROW, MatchSettings, PlayerType,
};
use camino::Utf8Path;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Size of each chunk piped into a combo stream
pub const PIPE_CHUNK_SIZE: usize = 64 * 1024;

/// Errors reported by the replay parsing collaborators
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Replay data is malformed: {0}")]
    Malformed(String),

    #[error("Replay data ended unexpectedly")]
    Truncated,
}

/// Errors that can occur while extracting combos from a replay
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read replay data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Combo detection failed: {0}")]
    Replay(#[from] ReplayError),
}

/// How a combo stream treats the bytes it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// The stream carries exactly one match and ends with it
    SingleGame,
}

/// Reads match settings and metadata from a replay's bytes
pub trait ReplayReader: Send + Sync {
    fn read_game_info(&self, bytes: &[u8]) -> Result<GameInfo, ReplayError>;
}

/// Push-based parser that detects combos as replay bytes arrive
///
/// Implementations send one [`ComboEnded`] per completed combo, in completion order,
/// through the sender they were opened with.
pub trait ComboStream: Send {
    fn write(&mut self, chunk: &[u8]) -> Result<(), ReplayError>;

    /// Signal the end of input; combos still open at this point must be flushed
    fn finish(&mut self) -> Result<(), ReplayError>;
}

/// Factory for combo streams
pub trait ComboDetector: Send + Sync {
    fn open_stream(&self, mode: StreamMode, events: UnboundedSender<ComboEnded>) -> Box<dyn ComboStream>;
}

/// Decides whether a detected combo is worth keeping
#[cfg_attr(test, mockall::automock)]
pub trait ComboFilter: Send + Sync {
    fn is_combo(&self, combo: &Combo, settings: &MatchSettings) -> bool;
}

/// Run a single-game combo stream over `source` and keep the combos `filter` accepts
///
/// The source is piped in [`PIPE_CHUNK_SIZE`] chunks. Combos are returned in the order
/// the detector completed them. Empty input yields an empty list.
pub async fn extract_combos<R>(
    detector: &dyn ComboDetector,
    filter: &dyn ComboFilter,
    mut source: R,
) -> Result<Vec<Combo>, ExtractError>
where
    R: AsyncRead + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut stream = detector.open_stream(StreamMode::SingleGame, tx);

    let mut combos = Vec::new();
    let mut buffer = vec![0u8; PIPE_CHUNK_SIZE];
    loop {
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        stream.write(&buffer[..read])?;
        drain_events(&mut rx, filter, &mut combos);
    }

    stream.finish()?;
    // Dropping the stream drops its sender, so nothing can arrive after the final drain
    drop(stream);
    drain_events(&mut rx, filter, &mut combos);

    Ok(combos)
}

/// Open the replay at `path` and extract its combos
pub async fn extract_combos_from_file(
    detector: &dyn ComboDetector,
    filter: &dyn ComboFilter,
    path: &Utf8Path,
) -> Result<Vec<Combo>, ExtractError> {
    let file = tokio::fs::File::open(path).await?;
    let combos = extract_combos(detector, filter, file).await?;
    tracing::info!("Found {} combos in {}", combos.len(), path);
    Ok(combos)
}

fn drain_events(
    rx: &mut UnboundedReceiver<ComboEnded>,
    filter: &dyn ComboFilter,
    combos: &mut Vec<Combo>,
) {
    while let Ok(ComboEnded { combo, settings }) = rx.try_recv() {
        if filter.is_combo(&combo, &settings) {
            combos.push(combo);
        }
    }
}

/// Combo filter driven by the user's [`ComboFilterSettings`]
#[derive(Debug, Clone, Default)]
pub struct SettingsComboFilter {
    settings: ComboFilterSettings,
}

impl SettingsComboFilter {
    pub fn new(settings: ComboFilterSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ComboFilterSettings {
        &self.settings
    }

    fn is_wobble(&self, combo: &Combo, attacker_character: Option<u8>) -> bool {
        if attacker_character != Some(CHARACTER_ICE_CLIMBERS) {
            return false;
        }
        let pummels = combo
            .moves
            .iter()
            .filter(|m| m.move_id == MOVE_PUMMEL)
            .count();
        pummels >= self.settings.wobble_threshold
    }

    fn is_chain_grab(&self, combo: &Combo, attacker_character: Option<u8>) -> bool {
        let Some(character) = attacker_character else {
            return false;
        };
        if !self.settings.chain_grabbers.contains(&character) || combo.moves.is_empty() {
            return false;
        }

        let grab_moves = combo
            .moves
            .iter()
            .filter(|m| {
                matches!(
                    m.move_id,
                    MOVE_PUMMEL | MOVE_FORWARD_THROW | MOVE_BACK_THROW | MOVE_UP_THROW | MOVE_DOWN_THROW
                )
            })
            .count();
        grab_moves as f32 / combo.moves.len() as f32 >= self.settings.chain_grab_threshold
    }

    fn has_large_hit(&self, combo: &Combo) -> bool {
        let total: f32 = combo.moves.iter().map(|m| m.damage).sum();
        total > 0.0
            && combo
                .moves
                .iter()
                .any(|m| m.damage / total >= self.settings.large_hit_threshold)
    }
}

impl ComboFilter for SettingsComboFilter {
    fn is_combo(&self, combo: &Combo, settings: &MatchSettings) -> bool {
        let filter = &self.settings;
        let attacker = settings.player(combo.player_index);
        let victim = settings.player(combo.opponent_index);
        let attacker_character = attacker.and_then(|p| p.character_id);

        if filter.exclude_cpus
            && [attacker, victim]
                .into_iter()
                .flatten()
                .any(|p| p.player_type == PlayerType::Cpu)
        {
            return false;
        }

        if !filter.port_filter.is_empty()
            && !attacker.is_some_and(|p| filter.port_filter.contains(&p.port))
        {
            return false;
        }

        if !filter.character_filter.is_empty()
            && !attacker_character.is_some_and(|c| filter.character_filter.contains(&c))
        {
            return false;
        }

        if !filter.name_tags.is_empty()
            && !attacker.is_some_and(|p| {
                filter
                    .name_tags
                    .iter()
                    .any(|tag| tag.eq_ignore_ascii_case(&p.name_tag))
            })
        {
            return false;
        }

        if filter.combo_must_kill && !combo.did_kill {
            return false;
        }

        if combo.damage() < filter.min_percent_for(attacker_character) {
            return false;
        }

        // A single large hit carries the combo regardless of length
        if !self.has_large_hit(combo) && combo.moves.len() < filter.min_combo_length {
            return false;
        }

        if filter.exclude_wobbles && self.is_wobble(combo, attacker_character) {
            return false;
        }

        if filter.exclude_chain_grabs && self.is_chain_grab(combo, attacker_character) {
            return false;
        }

        true
    }
}
