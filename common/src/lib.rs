//! Prompt Inspector Common Library
//!
//! 画像に埋め込まれた生成メタデータの解析コア（I/Oなし）
//!
//! - `stealth`: ピクセルLSBに隠されたステルスPNGInfoの復元
//! - `classifier`: テキストチャンクから生成ツールを判定
//! - `a1111` / `json_meta` / `drawthings`: 各形式のフィールド化
//! - `comfy`: ComfyUIワークフローのリンク解決
//! - `inspect`: 上記をまとめた抽出の入口

pub mod a1111;
pub mod classifier;
pub mod comfy;
pub mod drawthings;
pub mod error;
pub mod fields;
pub mod inspect;
pub mod json_meta;
pub mod stealth;
pub mod types;

pub use classifier::{classify, ParserKind};
pub use comfy::{ComfyGraph, ComfyGraphResolver, Resolution, ResolverConfig};
pub use error::{Error, Result};
pub use inspect::{Inspection, Inspector, Producer};
pub use stealth::{StealthMode, StealthPayload};
pub use types::{ChannelLayout, ExtractedMetadata, Field, PixelBuffer, TextChunkMap, XMP_CHUNK_KEY};
