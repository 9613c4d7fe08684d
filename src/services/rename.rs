//! Template-based replay renaming.
//!
//! [`format_file_name`] turns a rename template such as `{stage}_{date}` into a concrete
//! file name using the replay's settings and metadata. [`rename_file`] moves a replay to
//! that name inside its own folder without ever overwriting an existing file.

use crate::models::replay::{
    MatchMetadata, MatchSettings, character_name, character_short_name, stage_name,
};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use rand::Rng;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;

/// Placeholder syntax: a word wrapped in single braces
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("Invalid template token regex"));

/// Value substituted for data the replay does not carry
const UNKNOWN: &str = "Unknown";

/// Length of the random disambiguating suffix
pub const SUFFIX_LEN: usize = 5;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Fresh suffixes tried before giving up on a crowded destination
const MAX_SUFFIX_ATTEMPTS: usize = 16;

/// Errors that can occur while renaming a replay
#[derive(Error, Debug)]
pub enum RenameError {
    #[error("Invalid target name for {0}")]
    InvalidName(Utf8PathBuf),

    #[error("No free name found for {0}")]
    NoFreeName(Utf8PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render a rename template into a replay file name
///
/// Recognized tokens are `{stage}`, `{date}`, `{time}`, `{year}`, `{month}`, `{day}`,
/// `{chars}`, `{charsShort}`, `{tags}`, `{codes}`, `{duration}`, `{platform}` and
/// `{filename}`. Unknown tokens are copied through unchanged. Substituted values never
/// contain path separators; literal `/` in the template is kept. The result always
/// ends in `.slp`.
pub fn format_file_name(
    template: &str,
    settings: &MatchSettings,
    metadata: &MatchMetadata,
    original_filename: &str,
) -> String {
    let rendered = TOKEN_PATTERN.replace_all(template, |caps: &Captures| {
        match token_value(&caps[1], settings, metadata, original_filename) {
            Some(value) => sanitize(&value),
            None => caps[0].to_string(),
        }
    });

    let mut name = rendered.into_owned();
    if !name.to_ascii_lowercase().ends_with(".slp") {
        name.push_str(".slp");
    }
    name
}

fn token_value(
    token: &str,
    settings: &MatchSettings,
    metadata: &MatchMetadata,
    original_filename: &str,
) -> Option<String> {
    let start = metadata.start_at;
    let date_part = |fmt: &str| {
        start
            .map(|at| at.format(fmt).to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    };

    let value = match token {
        "stage" => settings
            .stage_id
            .map(stage_name)
            .unwrap_or(UNKNOWN)
            .to_string(),
        "date" => date_part("%Y-%m-%d"),
        "time" => date_part("%H%M%S"),
        "year" => date_part("%Y"),
        "month" => date_part("%m"),
        "day" => date_part("%d"),
        "chars" => join_players(settings, |p| {
            p.character_id.map(character_name).unwrap_or(UNKNOWN).to_string()
        }),
        "charsShort" => join_players(settings, |p| {
            p.character_id
                .map(character_short_name)
                .unwrap_or(UNKNOWN)
                .to_string()
        }),
        "tags" => join_players(settings, |p| {
            let netplay = metadata
                .players
                .get(&p.player_index)
                .and_then(|m| m.netplay_name.clone())
                .filter(|name| !name.is_empty());

            if !p.name_tag.is_empty() {
                p.name_tag.clone()
            } else if let Some(name) = netplay {
                name
            } else {
                p.character_id
                    .map(character_short_name)
                    .unwrap_or(UNKNOWN)
                    .to_string()
            }
        }),
        "codes" => join_players(settings, |p| {
            metadata
                .players
                .get(&p.player_index)
                .and_then(|m| m.connect_code.clone())
                .filter(|code| !code.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        }),
        "duration" => metadata
            .duration_secs()
            .map(|secs| format!("{}m{:02}s", secs / 60, secs % 60))
            .unwrap_or_else(|| UNKNOWN.to_string()),
        "platform" => metadata
            .played_on
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        "filename" => Utf8Path::new(original_filename)
            .file_stem()
            .unwrap_or(original_filename)
            .to_string(),
        _ => return None,
    };

    Some(value)
}

fn join_players<F>(settings: &MatchSettings, describe: F) -> String
where
    F: Fn(&crate::models::PlayerSettings) -> String,
{
    if settings.players.is_empty() {
        return UNKNOWN.to_string();
    }

    let mut players: Vec<_> = settings.players.iter().collect();
    players.sort_by_key(|p| p.port);
    players
        .into_iter()
        .map(describe)
        .collect::<Vec<_>>()
        .join(" vs ")
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Insert a random `_xxxxx` suffix before the extension of `path`
pub fn unique_file_name(path: &Utf8Path) -> Utf8PathBuf {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.random_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();

    let stem = path.file_stem().unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", stem, suffix),
    };

    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => Utf8PathBuf::from(file_name),
    }
}

/// Rename a replay inside its folder without overwriting anything
///
/// # Arguments
/// * `current` - Existing replay path
/// * `new_name` - Desired file name, relative to the replay's folder (may contain subfolders)
///
/// # Errors
/// Names that are absolute or contain `.` or `..` components fail with
/// [`RenameError::InvalidName`] before anything is touched.
///
/// # Returns
/// The path the file ended up at. When `new_name` equals the current file name the
/// original path is returned and nothing is touched. When the destination is taken a
/// random suffix is inserted before the extension.
pub async fn rename_file(current: &Utf8Path, new_name: &str) -> Result<Utf8PathBuf, RenameError> {
    if current.file_name() == Some(new_name) {
        tracing::debug!("{} is already named correctly, skipping rename", current);
        return Ok(current.to_path_buf());
    }

    let directory = current.parent().unwrap_or_else(|| Utf8Path::new(""));
    let relative = Utf8Path::new(new_name);
    // Only plain names and subfolders; the result must stay under the replay's folder
    let stays_inside = relative
        .components()
        .all(|component| matches!(component, Utf8Component::Normal(_)));
    if !stays_inside || relative.file_name().is_none() {
        return Err(RenameError::InvalidName(relative.to_path_buf()));
    }
    let target = directory.join(relative);

    if let Some(parent) = target.parent().filter(|p| !p.as_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut destination = target.clone();
    let mut attempts = 0;
    while tokio::fs::try_exists(&destination).await? {
        if attempts == MAX_SUFFIX_ATTEMPTS {
            return Err(RenameError::NoFreeName(target));
        }
        destination = unique_file_name(&target);
        attempts += 1;
    }

    tokio::fs::rename(current, &destination).await?;
    tracing::info!("Renamed {} to {}", current, destination);

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlayerMetadata, PlayerSettings};
    use chrono::DateTime;

    fn sample_settings() -> MatchSettings {
        MatchSettings {
            stage_id: Some(31),
            is_teams: false,
            players: vec![
                PlayerSettings {
                    player_index: 1,
                    port: 2,
                    character_id: Some(9),
                    name_tag: String::new(),
                    ..Default::default()
                },
                PlayerSettings {
                    player_index: 0,
                    port: 1,
                    character_id: Some(2),
                    name_tag: "ABC".to_string(),
                    ..Default::default()
                },
            ],
        }
    }

    fn sample_metadata() -> MatchMetadata {
        let mut metadata = MatchMetadata {
            start_at: Some(DateTime::parse_from_rfc3339("2023-01-01T13:05:09+00:00").unwrap()),
            last_frame: Some(-123 + 60 * 200 - 1),
            played_on: Some("dolphin".to_string()),
            ..Default::default()
        };
        metadata.players.insert(
            1,
            PlayerMetadata {
                netplay_name: Some("Marthy".to_string()),
                connect_code: Some("MRTH#123".to_string()),
            },
        );
        metadata
    }

    #[test]
    fn test_stage_and_date() {
        let name = format_file_name(
            "{stage}_{date}",
            &sample_settings(),
            &sample_metadata(),
            "Game_1.slp",
        );
        assert_eq!(name, "Battlefield_2023-01-01.slp");
    }

    #[test]
    fn test_players_sorted_by_port() {
        let name = format_file_name(
            "{chars} - {charsShort} - {tags}",
            &sample_settings(),
            &sample_metadata(),
            "Game_1.slp",
        );
        assert_eq!(name, "Fox vs Marth - Fox vs Marth - ABC vs Marthy.slp");
    }

    #[test]
    fn test_time_duration_and_platform() {
        let name = format_file_name(
            "{year}{month}{day}-{time} {duration} {platform}",
            &sample_settings(),
            &sample_metadata(),
            "Game_1.slp",
        );
        assert_eq!(name, "20230101-130509 3m20s dolphin.slp");
    }

    #[test]
    fn test_connect_codes_are_sanitized() {
        let name = format_file_name("{codes}", &sample_settings(), &sample_metadata(), "g.slp");
        assert_eq!(name, "Unknown vs MRTH#123.slp");
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        let name = format_file_name(
            "{stage} {nope} {}",
            &sample_settings(),
            &sample_metadata(),
            "Game_1.slp",
        );
        assert_eq!(name, "Battlefield {nope} {}.slp");
    }

    #[test]
    fn test_missing_data_renders_unknown() {
        let name = format_file_name(
            "{stage}_{date}_{chars}",
            &MatchSettings::default(),
            &MatchMetadata::default(),
            "Game_1.slp",
        );
        assert_eq!(name, "Unknown_Unknown_Unknown.slp");
    }

    #[test]
    fn test_filename_token_and_existing_extension() {
        let name = format_file_name(
            "{filename}-copy.SLP",
            &sample_settings(),
            &sample_metadata(),
            "Game_20230101.slp",
        );
        assert_eq!(name, "Game_20230101-copy.SLP");
    }

    #[test]
    fn test_substituted_values_cannot_escape_folder() {
        let mut settings = sample_settings();
        settings.players[1].name_tag = "../x".to_string();

        let name = format_file_name("{stage}/{tags}", &settings, &sample_metadata(), "g.slp");
        assert_eq!(name, "Battlefield/.._x vs Marthy.slp");
    }

    #[test]
    fn test_unique_file_name_shape() {
        let unique = unique_file_name(Utf8Path::new("/replays/X.slp"));
        let file_name = unique.file_name().unwrap();

        assert_eq!(unique.parent(), Some(Utf8Path::new("/replays")));
        assert!(file_name.starts_with("X_"));
        assert!(file_name.ends_with(".slp"));
        assert_eq!(file_name.len(), "X_".len() + SUFFIX_LEN + ".slp".len());
    }
}
