use thiserror::Error;

#[derive(Error, Debug)]
pub enum InspectorError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("ファイルが大きすぎます: {path} ({size} bytes, 上限 {limit} bytes)")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("未対応の形式です: {0}")]
    UnsupportedFormat(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] prompt_inspector_common::Error),
}

pub type Result<T> = std::result::Result<T, InspectorError>;
