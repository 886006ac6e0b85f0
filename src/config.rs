use crate::error::{InspectorError, Result};
use prompt_inspector_common::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 読み込むファイルサイズの上限（40MB）
pub const DEFAULT_SCAN_LIMIT_BYTES: u64 = 40 * 1024 * 1024;

pub const ENV_PROPAGATE_NONE: &str = "COMFY_METADATA_PROPAGATE_NONE";
pub const ENV_SCAN_LIMIT: &str = "PROMPT_INSPECTOR_SCAN_LIMIT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan_limit_bytes: u64,
    pub propagate_none: bool,
    pub recursive: bool,
    pub extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_limit_bytes: DEFAULT_SCAN_LIMIT_BYTES,
            propagate_none: true,
            recursive: false,
            extensions: vec!["png".into(), "webp".into()],
        }
    }
}

impl Config {
    /// 設定ファイルを読み込み、環境変数で上書き
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 設定ファイルのみ（環境変数を反映しない）
    pub fn load_file() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| InspectorError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("prompt-inspector").join("config.json"))
    }

    /// 環境変数による上書き（解釈できない値は無視）
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_PROPAGATE_NONE) {
            match parse_bool(&raw) {
                Some(value) => self.propagate_none = value,
                None => log::warn!("{}={} は真偽値として解釈できません", ENV_PROPAGATE_NONE, raw),
            }
        }
        if let Some(raw) = lookup(ENV_SCAN_LIMIT) {
            match raw.trim().parse::<u64>() {
                Ok(value) => self.scan_limit_bytes = value,
                Err(_) => log::warn!("{}={} はバイト数として解釈できません", ENV_SCAN_LIMIT, raw),
            }
        }
    }

    pub fn set_scan_limit(&mut self, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Err(InspectorError::Config("スキャン上限は1バイト以上にしてください".into()));
        }
        self.scan_limit_bytes = bytes;
        self.save()
    }

    pub fn set_propagate_none(&mut self, value: bool) -> Result<()> {
        self.propagate_none = value;
        self.save()
    }

    /// 拡張子が対象か（大文字小文字を区別しない）
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// ComfyUI解決器の設定
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default().with_propagate_none(self.propagate_none)
    }
}

/// `1/0/true/false/yes/no/on/off` を真偽値へ
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
