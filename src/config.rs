//! Persisted encoder-path configuration.
//!
//! A single `config.json` under the platform config directory remembers where
//! the operator's ffmpeg binary lives. Loading is lenient: a missing or
//! corrupt file is just the default config.

use std::{fs, path::PathBuf};

use crate::error::{SlidecastError, SlidecastResult};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EncoderConfig {
    pub ffmpeg_path: Option<String>,
}

fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "SlideCast")
        .map(|dirs| dirs.config_dir().join("config.json"))
}

pub fn load_config() -> EncoderConfig {
    if let Some(path) = config_file_path() {
        if let Ok(bytes) = fs::read(&path) {
            if let Ok(cfg) = serde_json::from_slice::<EncoderConfig>(&bytes) {
                return cfg;
            }
            tracing::warn!(path = %path.display(), "ignoring unreadable encoder config");
        }
    }
    EncoderConfig::default()
}

pub fn save_config(cfg: &EncoderConfig) -> SlidecastResult<()> {
    if let Some(path) = config_file_path() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SlidecastError::io(format!("creating config dir: {e}")))?;
        }
        let bytes = serde_json::to_vec_pretty(cfg)
            .map_err(|e| SlidecastError::io(format!("serializing config: {e}")))?;
        fs::write(&path, bytes)
            .map_err(|e| SlidecastError::io(format!("writing config: {e}")))?;
    }
    Ok(())
}

pub fn get_ffmpeg_path_configured() -> Option<String> {
    load_config().ffmpeg_path
}

pub fn set_ffmpeg_path_configured(path: Option<String>) -> SlidecastResult<()> {
    let mut cfg = load_config();
    cfg.ffmpeg_path = path;
    save_config(&cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json() {
        let cfg = EncoderConfig {
            ffmpeg_path: Some("/opt/ffmpeg/bin/ffmpeg".to_string()),
        };
        let bytes = serde_json::to_vec_pretty(&cfg).unwrap();
        let back: EncoderConfig = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.ffmpeg_path.as_deref(), Some("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[test]
    fn corrupt_config_bytes_fall_back_to_default() {
        let parsed = serde_json::from_slice::<EncoderConfig>(b"{not json");
        assert!(parsed.is_err());
        assert!(EncoderConfig::default().ffmpeg_path.is_none());
    }
}
