//! メタデータ抽出の入口
//!
//! テキストチャンクとピクセルバッファを受け取り、生成ツールを判定して
//! [`ExtractedMetadata`] と診断用の生成ツール名を返す。
//!
//! ## 処理フロー
//! 1. [`classifier::candidates`] で解析器の候補を優先順に得る
//! 2. 候補を順に試し、最初に結果を返したものを採用
//! 3. 全候補が失敗したらステルス解析（ピクセルがあれば）

use serde::Serialize;
use serde_json::Value;

use crate::a1111;
use crate::classifier::{self, ParserKind};
use crate::comfy::{ComfyGraph, ComfyGraphResolver, ResolverConfig};
use crate::drawthings;
use crate::fields::flatten_object;
use crate::json_meta;
use crate::stealth;
use crate::types::{ExtractedMetadata, Field, PixelBuffer, TextChunkMap};

/// 生成ツール（診断用の名前）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Producer {
    A1111,
    SwarmUI,
    NovelAI,
    ComfyUI,
    InvokeAI,
    DrawThings,
    Illust,
    #[serde(rename = "Stealth PNGInfo")]
    StealthPngInfo,
    Unknown,
}

impl Producer {
    pub fn name(&self) -> &'static str {
        match self {
            Producer::A1111 => "A1111",
            Producer::SwarmUI => "SwarmUI",
            Producer::NovelAI => "NovelAI",
            Producer::ComfyUI => "ComfyUI",
            Producer::InvokeAI => "InvokeAI",
            Producer::DrawThings => "DrawThings",
            Producer::Illust => "Illust",
            Producer::StealthPngInfo => "Stealth PNGInfo",
            Producer::Unknown => "Unknown",
        }
    }

    /// 表示用タイトル（例: "ComfyUI Parameters"）
    pub fn title(&self) -> String {
        format!("{} Parameters", self.name())
    }
}

impl std::fmt::Display for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 抽出結果と生成ツール名
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub producer: Producer,
    pub metadata: ExtractedMetadata,
}

impl Inspection {
    pub fn none() -> Self {
        Self {
            producer: Producer::Unknown,
            metadata: ExtractedMetadata::None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.metadata.is_none()
    }

    /// 表示用フィールドリスト
    ///
    /// 生テキストは生成ツールに応じて解析する。
    pub fn fields(&self) -> Vec<Field> {
        match &self.metadata {
            ExtractedMetadata::None => Vec::new(),
            ExtractedMetadata::FieldList(fields) => fields.clone(),
            ExtractedMetadata::RawText(text) => match self.producer {
                Producer::InvokeAI => json_meta::parse_object(text)
                    .map(|object| json_meta::invokeai_fields(&object))
                    .unwrap_or_else(|| json_meta::text_fields(text)),
                Producer::Illust => json_meta::parse_object(text)
                    .map(|object| flatten_object(&object))
                    .unwrap_or_else(|| json_meta::text_fields(text)),
                _ => json_meta::text_fields(text),
            },
        }
    }
}

/// メタデータ抽出器
#[derive(Debug, Clone, Default)]
pub struct Inspector {
    resolver: ComfyGraphResolver,
}

impl Inspector {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            resolver: ComfyGraphResolver::new(config),
        }
    }

    /// テキストチャンクとピクセルからメタデータを抽出
    ///
    /// 何も見つからなければ `Producer::Unknown` / `ExtractedMetadata::None`。
    pub fn inspect(&self, chunks: &TextChunkMap, pixels: Option<&PixelBuffer>) -> Inspection {
        for kind in classifier::candidates(chunks) {
            if let Some(inspection) = self.try_parser(kind, chunks, pixels) {
                log::debug!("inspected as {} via {:?}", inspection.producer, kind);
                return inspection;
            }
            log::debug!("parser {:?} produced nothing, trying next", kind);
        }
        Inspection::none()
    }

    fn try_parser(
        &self,
        kind: ParserKind,
        chunks: &TextChunkMap,
        pixels: Option<&PixelBuffer>,
    ) -> Option<Inspection> {
        match kind {
            ParserKind::A1111 => {
                let text = chunk_text(kind, chunks)?;
                let producer = match json_meta::parse_object(text) {
                    Some(object) if json_meta::is_swarm(&object) => Producer::SwarmUI,
                    _ => Producer::A1111,
                };
                Some(raw(producer, text))
            }
            ParserKind::Prompt => {
                let text = chunk_text(kind, chunks)?;
                if let Some(inspection) = self.comfy_from_text(text) {
                    return Some(inspection);
                }
                let producer = if a1111::looks_like_a1111(text) {
                    Producer::A1111
                } else {
                    Producer::NovelAI
                };
                Some(raw(producer, text))
            }
            ParserKind::Comment => {
                let text = chunk_text(kind, chunks)?;
                Some(raw(Producer::NovelAI, text))
            }
            ParserKind::InvokeAI => {
                let text = chunk_text(kind, chunks)?;
                Some(raw(Producer::InvokeAI, text))
            }
            ParserKind::DrawThings => drawthings::extract(chunks).map(|fields| Inspection {
                producer: Producer::DrawThings,
                metadata: ExtractedMetadata::FieldList(fields),
            }),
            ParserKind::Illust => {
                let text = chunk_text(kind, chunks)?;
                Some(raw(Producer::Illust, text))
            }
            ParserKind::ComfyUI => {
                let (key, value) = classifier::find_node_map(chunks)?;
                log::debug!("comfy: node map found under '{}'", key);
                self.comfy_from_value(&value)
            }
            ParserKind::Stealth => {
                let text = stealth::read_stealth_text(pixels?)?;
                non_empty(Some(&text))?;
                Some(raw(Producer::StealthPngInfo, &text))
            }
        }
    }

    fn comfy_from_text(&self, text: &str) -> Option<Inspection> {
        let value: Value = serde_json::from_str(text).ok()?;
        if !ComfyGraph::is_node_map(&value) {
            return None;
        }
        self.comfy_from_value(&value)
            .or_else(|| Some(raw(Producer::ComfyUI, text)))
    }

    /// ノードマップを解決。フィールドが1つも得られなければ `None`。
    fn comfy_from_value(&self, value: &Value) -> Option<Inspection> {
        let graph = ComfyGraph::from_value(value)
            .map_err(|e| log::warn!("comfy: {}", e))
            .ok()?;
        let fields = self.resolver.extract(&graph);
        if fields.is_empty() {
            log::debug!("comfy: no sampler inputs resolved in {} nodes", graph.len());
            return None;
        }
        Some(Inspection {
            producer: Producer::ComfyUI,
            metadata: ExtractedMetadata::FieldList(fields),
        })
    }
}

/// 種類に対応するチャンクの本文（空白のみは無し扱い）
fn chunk_text(kind: ParserKind, chunks: &TextChunkMap) -> Option<&str> {
    non_empty(chunks.get(kind.chunk_key()?))
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

fn raw(producer: Producer, text: &str) -> Inspection {
    Inspection {
        producer,
        metadata: ExtractedMetadata::RawText(text.to_string()),
    }
}
