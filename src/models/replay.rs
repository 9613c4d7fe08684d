use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First frame number of every replay (the countdown before "GO").
pub const FIRST_FRAME: i32 = -123;

/// Frames per second of a replay.
pub const FRAMES_PER_SECOND: i32 = 60;

/// Move id of a pummel.
pub const MOVE_PUMMEL: u8 = 52;
/// Move id of a forward throw.
pub const MOVE_FORWARD_THROW: u8 = 53;
/// Move id of a back throw.
pub const MOVE_BACK_THROW: u8 = 54;
/// Move id of an up throw.
pub const MOVE_UP_THROW: u8 = 55;
/// Move id of a down throw.
pub const MOVE_DOWN_THROW: u8 = 56;

/// Character id of the Ice Climbers (the only wobbling character).
pub const CHARACTER_ICE_CLIMBERS: u8 = 14;

/// Kind of controller driving a player slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerType {
    #[default]
    Human,
    Cpu,
    Demo,
}

/// Per-player settings from the replay's game start block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSettings {
    pub player_index: u8,
    /// Controller port, 1-based
    pub port: u8,
    pub character_id: Option<u8>,
    pub character_color: Option<u8>,
    pub player_type: PlayerType,
    #[serde(default)]
    pub name_tag: String,
}

/// Match settings parsed from the replay's game start block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSettings {
    pub stage_id: Option<u16>,
    #[serde(default)]
    pub is_teams: bool,
    #[serde(default)]
    pub players: Vec<PlayerSettings>,
}

impl MatchSettings {
    /// Find the settings for a player by in-game index
    pub fn player(&self, player_index: u8) -> Option<&PlayerSettings> {
        self.players.iter().find(|p| p.player_index == player_index)
    }
}

/// Netplay identity of one player, when the replay was recorded online
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMetadata {
    pub netplay_name: Option<String>,
    pub connect_code: Option<String>,
}

/// Metadata block written at the end of a replay
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub start_at: Option<DateTime<FixedOffset>>,
    pub last_frame: Option<i32>,
    pub played_on: Option<String>,
    #[serde(default)]
    pub players: BTreeMap<u8, PlayerMetadata>,
}

impl MatchMetadata {
    /// Match length in whole seconds, counted from the first frame
    pub fn duration_secs(&self) -> Option<i32> {
        self.last_frame
            .map(|last| (last.saturating_sub(FIRST_FRAME - 1) / FRAMES_PER_SECOND).max(0))
    }
}

/// Settings and metadata read from one replay file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameInfo {
    pub settings: MatchSettings,
    pub metadata: MatchMetadata,
}

/// A single hit landed during a combo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveLanded {
    pub frame: i32,
    pub move_id: u8,
    pub hit_count: u32,
    pub damage: f32,
}

/// A detected combo, as delivered by the combo detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combo {
    /// Player performing the combo
    pub player_index: u8,
    /// Player receiving the combo
    pub opponent_index: u8,
    pub start_frame: i32,
    pub end_frame: Option<i32>,
    pub start_percent: f32,
    pub current_percent: f32,
    pub end_percent: Option<f32>,
    pub moves: Vec<MoveLanded>,
    pub did_kill: bool,
}

impl Combo {
    /// Total damage dealt, using the current percent while the combo is still open
    pub fn damage(&self) -> f32 {
        self.end_percent.unwrap_or(self.current_percent) - self.start_percent
    }

    /// Last frame covered by the combo
    pub fn last_frame(&self) -> i32 {
        self.end_frame
            .or_else(|| self.moves.last().map(|m| m.frame))
            .unwrap_or(self.start_frame)
    }
}

/// Payload of the detector's "combo ended" channel
#[derive(Debug, Clone, PartialEq)]
pub struct ComboEnded {
    pub combo: Combo,
    pub settings: MatchSettings,
}

/// Display name of a stage
pub fn stage_name(stage_id: u16) -> &'static str {
    match stage_id {
        2 => "Fountain of Dreams",
        3 => "Pokemon Stadium",
        4 => "Princess Peach's Castle",
        5 => "Kongo Jungle",
        6 => "Brinstar",
        7 => "Corneria",
        8 => "Yoshi's Story",
        9 => "Onett",
        10 => "Mute City",
        11 => "Rainbow Cruise",
        12 => "Jungle Japes",
        13 => "Great Bay",
        14 => "Hyrule Temple",
        15 => "Brinstar Depths",
        16 => "Yoshi's Island",
        17 => "Green Greens",
        18 => "Fourside",
        19 => "Mushroom Kingdom I",
        20 => "Mushroom Kingdom II",
        22 => "Venom",
        23 => "Poke Floats",
        24 => "Big Blue",
        25 => "Icicle Mountain",
        27 => "Flat Zone",
        28 => "Dream Land N64",
        29 => "Yoshi's Island N64",
        30 => "Kongo Jungle N64",
        31 => "Battlefield",
        32 => "Final Destination",
        _ => "Unknown",
    }
}

/// Full and short display names of a character, by external character id
fn character_names(character_id: u8) -> (&'static str, &'static str) {
    match character_id {
        0 => ("Captain Falcon", "Falcon"),
        1 => ("Donkey Kong", "DK"),
        2 => ("Fox", "Fox"),
        3 => ("Mr. Game & Watch", "G&W"),
        4 => ("Kirby", "Kirby"),
        5 => ("Bowser", "Bowser"),
        6 => ("Link", "Link"),
        7 => ("Luigi", "Luigi"),
        8 => ("Mario", "Mario"),
        9 => ("Marth", "Marth"),
        10 => ("Mewtwo", "Mewtwo"),
        11 => ("Ness", "Ness"),
        12 => ("Peach", "Peach"),
        13 => ("Pikachu", "Pika"),
        14 => ("Ice Climbers", "ICs"),
        15 => ("Jigglypuff", "Puff"),
        16 => ("Samus", "Samus"),
        17 => ("Yoshi", "Yoshi"),
        18 => ("Zelda", "Zelda"),
        19 => ("Sheik", "Sheik"),
        20 => ("Falco", "Falco"),
        21 => ("Young Link", "YLink"),
        22 => ("Dr. Mario", "Doc"),
        23 => ("Roy", "Roy"),
        24 => ("Pichu", "Pichu"),
        25 => ("Ganondorf", "Ganon"),
        _ => ("Unknown", "Unknown"),
    }
}

/// Full display name of a character
pub fn character_name(character_id: u8) -> &'static str {
    character_names(character_id).0
}

/// Abbreviated display name of a character
pub fn character_short_name(character_id: u8) -> &'static str {
    character_names(character_id).1
}
