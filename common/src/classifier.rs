//! 生成ツール判定
//!
//! テキストチャンクのキーから解析器を選ぶ。
//! 判定は [`CLASSIFIER_RULES`] を上から順に評価し、最初に一致した規則を採用する。
//! 順序は優先度そのもので、汎用的なキーが衝突したときの挙動を決める。

use serde::Serialize;
use serde_json::Value;

use crate::comfy::ComfyGraph;
use crate::types::{TextChunkMap, XMP_CHUNK_KEY};

/// 解析器の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParserKind {
    /// `parameters` チャンク（A1111 / SwarmUI）
    A1111,
    /// `prompt` チャンク（ComfyUIのノードマップ、またはA1111風/NAIのテキスト）
    Prompt,
    /// `Comment` チャンク（NovelAIのJSONまたはテキスト）
    Comment,
    /// `invokeai_metadata` チャンク
    InvokeAI,
    /// XMP（DrawThings）
    DrawThings,
    /// `generate_info` チャンク
    Illust,
    /// いずれかの値がComfyUIのノードマップ
    ComfyUI,
    /// テキストチャンクなし、または未知のチャンクのみ
    Stealth,
}

impl ParserKind {
    /// 解析対象のチャンクキー（固定キーを持たない種類は `None`）
    pub fn chunk_key(&self) -> Option<&'static str> {
        match self {
            ParserKind::A1111 => Some("parameters"),
            ParserKind::Prompt => Some("prompt"),
            ParserKind::Comment => Some("Comment"),
            ParserKind::InvokeAI => Some("invokeai_metadata"),
            ParserKind::DrawThings => Some(XMP_CHUNK_KEY),
            ParserKind::Illust => Some("generate_info"),
            ParserKind::ComfyUI | ParserKind::Stealth => None,
        }
    }
}

/// 判定規則（述語と解析器の組）
pub struct ClassifierRule {
    pub name: &'static str,
    pub matches: fn(&TextChunkMap) -> bool,
    pub kind: ParserKind,
}

impl std::fmt::Debug for ClassifierRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierRule")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

fn has_parameters(chunks: &TextChunkMap) -> bool {
    chunks.contains_key("parameters")
}

fn has_prompt(chunks: &TextChunkMap) -> bool {
    chunks.contains_key("prompt")
}

fn has_comment(chunks: &TextChunkMap) -> bool {
    chunks.contains_key("Comment")
}

fn has_invokeai(chunks: &TextChunkMap) -> bool {
    chunks.contains_key("invokeai_metadata")
}

fn has_xmp(chunks: &TextChunkMap) -> bool {
    chunks.xmp_bytes().is_some()
}

fn has_generate_info(chunks: &TextChunkMap) -> bool {
    chunks.contains_key("generate_info")
}

fn has_node_map(chunks: &TextChunkMap) -> bool {
    find_node_map(chunks).is_some()
}

/// 判定規則（上から順に評価）
pub static CLASSIFIER_RULES: &[ClassifierRule] = &[
    ClassifierRule { name: "parameters", matches: has_parameters, kind: ParserKind::A1111 },
    ClassifierRule { name: "prompt", matches: has_prompt, kind: ParserKind::Prompt },
    ClassifierRule { name: "Comment", matches: has_comment, kind: ParserKind::Comment },
    ClassifierRule { name: "invokeai_metadata", matches: has_invokeai, kind: ParserKind::InvokeAI },
    ClassifierRule { name: "xmp", matches: has_xmp, kind: ParserKind::DrawThings },
    ClassifierRule { name: "generate_info", matches: has_generate_info, kind: ParserKind::Illust },
    ClassifierRule { name: "class_type", matches: has_node_map, kind: ParserKind::ComfyUI },
];

/// 値がComfyUIのノードマップであるチャンクを探す
///
/// キー順に依存しないよう、キーをソートして最初に見つかったものを返す。
pub fn find_node_map(chunks: &TextChunkMap) -> Option<(&str, Value)> {
    let mut keys: Vec<&str> = chunks.iter().map(|(key, _)| key).collect();
    keys.sort_unstable();
    keys.into_iter().find_map(|key| {
        let text = chunks.get(key)?;
        if !text.contains("class_type") {
            return None;
        }
        let value: Value = serde_json::from_str(text).ok()?;
        ComfyGraph::is_node_map(&value).then_some((key, value))
    })
}

/// 解析器を選ぶ
///
/// どの規則にも一致しなければ（空のマップを含む）ステルス解析へ回す。
pub fn classify(chunks: &TextChunkMap) -> ParserKind {
    classify_with(CLASSIFIER_RULES, chunks)
}

/// 任意の規則表で解析器を選ぶ
pub fn classify_with(rules: &[ClassifierRule], chunks: &TextChunkMap) -> ParserKind {
    if chunks.is_empty() {
        return ParserKind::Stealth;
    }
    rules
        .iter()
        .find(|rule| (rule.matches)(chunks))
        .map(|rule| {
            log::debug!("classified by rule '{}' as {:?}", rule.name, rule.kind);
            rule.kind
        })
        .unwrap_or(ParserKind::Stealth)
}

/// 一致するすべての解析器を優先順に列挙（末尾は必ずステルス解析）
///
/// 先頭の解析器が失敗したときに次の候補へ進むために使う。
pub fn candidates(chunks: &TextChunkMap) -> Vec<ParserKind> {
    let mut kinds: Vec<ParserKind> = CLASSIFIER_RULES
        .iter()
        .filter(|rule| (rule.matches)(chunks))
        .map(|rule| rule.kind)
        .collect();
    kinds.push(ParserKind::Stealth);
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(pairs: &[(&str, &str)]) -> TextChunkMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_empty_map_goes_to_stealth() {
        assert_eq!(classify(&TextChunkMap::new()), ParserKind::Stealth);
    }

    #[test]
    fn test_single_keys() {
        assert_eq!(classify(&chunks(&[("parameters", "x")])), ParserKind::A1111);
        assert_eq!(classify(&chunks(&[("prompt", "x")])), ParserKind::Prompt);
        assert_eq!(classify(&chunks(&[("Comment", "x")])), ParserKind::Comment);
        assert_eq!(classify(&chunks(&[("invokeai_metadata", "{}")])), ParserKind::InvokeAI);
        assert_eq!(classify(&chunks(&[(XMP_CHUNK_KEY, "<x/>")])), ParserKind::DrawThings);
        assert_eq!(classify(&chunks(&[("generate_info", "{}")])), ParserKind::Illust);
    }

    #[test]
    fn test_priority_order() {
        let map = chunks(&[
            ("Comment", "{}"),
            ("prompt", "{}"),
            ("parameters", "a cat\nSteps: 20"),
        ]);
        assert_eq!(classify(&map), ParserKind::A1111);

        let map = chunks(&[("Comment", "{}"), ("prompt", "{}"), ("workflow", "{}")]);
        assert_eq!(classify(&map), ParserKind::Prompt);

        let map = chunks(&[("generate_info", "{}"), ("Comment", "{}")]);
        assert_eq!(classify(&map), ParserKind::Comment);
    }

    #[test]
    fn test_node_map_under_other_key() {
        let graph = r#"{"3": {"class_type": "KSampler", "inputs": {"seed": 1}}}"#;
        let map = chunks(&[("Software", "tool"), ("graph", graph)]);
        assert_eq!(classify(&map), ParserKind::ComfyUI);

        let (key, value) = find_node_map(&map).unwrap();
        assert_eq!(key, "graph");
        assert!(value.get("3").is_some());
    }

    #[test]
    fn test_unmatched_keys_go_to_stealth() {
        let map = chunks(&[("Software", "GIMP"), ("Title", "class_type")]);
        assert_eq!(classify(&map), ParserKind::Stealth);
    }

    #[test]
    fn test_custom_rule_table() {
        let rules = [ClassifierRule { name: "comment", matches: has_comment, kind: ParserKind::Comment }];
        assert_eq!(classify_with(&rules, &chunks(&[("parameters", "x")])), ParserKind::Stealth);
        assert_eq!(classify_with(&rules, &chunks(&[("Comment", "x")])), ParserKind::Comment);
    }

    #[test]
    fn test_candidates_in_priority_order() {
        let map = chunks(&[(XMP_CHUNK_KEY, "<x/>"), ("Comment", "{}")]);
        assert_eq!(
            candidates(&map),
            vec![ParserKind::Comment, ParserKind::DrawThings, ParserKind::Stealth]
        );
        assert_eq!(candidates(&TextChunkMap::new()), vec![ParserKind::Stealth]);
    }

    #[test]
    fn test_chunk_keys() {
        assert_eq!(ParserKind::A1111.chunk_key(), Some("parameters"));
        assert_eq!(ParserKind::DrawThings.chunk_key(), Some(XMP_CHUNK_KEY));
        assert_eq!(ParserKind::Stealth.chunk_key(), None);
    }
}
