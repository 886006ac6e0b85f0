//! 入出力の型定義
//!
//! 画像コンテナ層から受け取る型と、表示層へ渡す型:
//! - PixelBuffer: デコード済みのRGB/RGBAラスタ
//! - TextChunkMap: PNG/WEBPのテキストチャンク
//! - ExtractedMetadata: 抽出結果（生テキスト / フィールドリスト / なし）

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Adobe XMPチャンクのキー（PNG iTXt と同じ名前）
pub const XMP_CHUNK_KEY: &str = "XML:com.adobe.xmp";

/// ピクセルのチャンネル構成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLayout {
    Rgb,
    Rgba,
}

impl ChannelLayout {
    /// 1ピクセルあたりのバイト数
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, ChannelLayout::Rgba)
    }
}

/// デコード済みの8bitラスタ（行優先、インターリーブ）
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// 生バイト列からバッファを作成
    ///
    /// `data.len()` が `width * height * channels` と一致しない場合はエラー。
    pub fn from_raw(width: u32, height: u32, layout: ChannelLayout, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(Error::InvalidPixelBuffer(format!(
                "{}x{} {:?} needs {} bytes, got {}",
                width,
                height,
                layout,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn has_alpha(&self) -> bool {
        self.layout.has_alpha()
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// (x, y) のピクセルのチャンネル値（RGB または RGBA）
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let channels = self.layout.channels();
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        &self.data[offset..offset + channels]
    }

    /// ラスタへの直接アクセス
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }
}

/// PNG/WEBPテキストチャンクのマップ
///
/// キー → 値。XMPは生バイトでも保持する。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextChunkMap {
    chunks: HashMap<String, String>,
    #[serde(skip)]
    xmp: Option<Vec<u8>>,
}

impl TextChunkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.chunks.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.chunks.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.chunks.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.xmp.is_none()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.chunks.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// XMPの生バイトを設定（テキストとしても `XML:com.adobe.xmp` に格納）
    pub fn set_xmp(&mut self, raw: Vec<u8>) {
        self.chunks
            .insert(XMP_CHUNK_KEY.to_string(), String::from_utf8_lossy(&raw).into_owned());
        self.xmp = Some(raw);
    }

    /// XMPの生バイト
    pub fn xmp_bytes(&self) -> Option<&[u8]> {
        self.xmp
            .as_deref()
            .or_else(|| self.get(XMP_CHUNK_KEY).map(str::as_bytes))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TextChunkMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// 表示用フィールド `{type, value}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    #[serde(rename = "type")]
    pub field_type: String,
    pub value: String,
}

impl Field {
    pub fn new(field_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            value: value.into(),
        }
    }
}

/// 抽出結果（表示層への唯一の受け渡し型）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum ExtractedMetadata {
    /// A1111 / NAI / Invoke / Comment 形式の生テキスト
    RawText(String),
    /// ComfyUI / DrawThings などの整形済みフィールド
    FieldList(Vec<Field>),
    #[default]
    None,
}

impl ExtractedMetadata {
    pub fn is_none(&self) -> bool {
        match self {
            ExtractedMetadata::None => true,
            ExtractedMetadata::RawText(text) => text.is_empty(),
            ExtractedMetadata::FieldList(fields) => fields.is_empty(),
        }
    }

    pub fn as_raw_text(&self) -> Option<&str> {
        match self {
            ExtractedMetadata::RawText(text) => Some(text),
            _ => None,
        }
    }
}
