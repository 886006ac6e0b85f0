//! エラー型定義

use thiserror::Error;

/// 共通エラー型
///
/// 抽出処理そのものは `Option` / バリアントで結果を返すため、
/// このエラーはグラフ構築・ピクセルバッファ生成・ペイロード展開などの内部処理で使う。
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Invalid pixel buffer: {0}")]
    InvalidPixelBuffer(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
