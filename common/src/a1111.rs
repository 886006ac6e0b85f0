//! A1111形式パーサー
//!
//! ```text
//! positive prompt text
//! Negative prompt: negative prompt text
//! Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 12345, Size: 512x512
//! ```
//!
//! `"Steps: "` で一度だけ分割し、前半をプロンプト、後半をパラメータとして扱う。

use indexmap::IndexMap;

use crate::fields::truncate_value;
use crate::types::Field;

const STEPS_MARKER: &str = "Steps: ";
const NEGATIVE_MARKER: &str = "Negative prompt: ";

/// `"Steps: "` が無い場合のフィールド名
pub const FALLBACK_FIELD: &str = "Parameters";

/// A1111形式のテキストか（`"Steps: "` を含むか）
pub fn looks_like_a1111(text: &str) -> bool {
    text.contains(STEPS_MARKER)
}

/// A1111形式のテキストをフィールドリストへ分解
///
/// - `Prompt` / `Negative Prompt` は前後の空白を除去
/// - パラメータは `", "` 区切り、各トークンは最初の `": "` でキーと値に分割
/// - `": "` を含まないトークンは `Info N` として残す
/// - 同じキーが再出現した場合は最初の位置のまま値を上書き
///
/// `"Steps: "` が無ければ全体を1フィールドとして返す。
pub fn parse(text: &str) -> Vec<Field> {
    let Some((prompt_block, params)) = text.split_once(STEPS_MARKER) else {
        return vec![Field::new(FALLBACK_FIELD, truncate_value(text.trim()))];
    };

    let mut fields: IndexMap<String, String> = IndexMap::new();

    match prompt_block.split_once(NEGATIVE_MARKER) {
        Some((positive, negative)) => {
            fields.insert("Prompt".into(), truncate_value(positive.trim()));
            fields.insert("Negative Prompt".into(), truncate_value(negative.trim()));
        }
        None => {
            fields.insert("Prompt".into(), truncate_value(prompt_block.trim()));
        }
    }

    let param_block = format!("{}{}", STEPS_MARKER, params.trim());
    let mut info_index = 0;
    for token in param_block.split(", ") {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.split_once(": ") {
            Some((key, value)) if !key.trim().is_empty() => {
                fields.insert(key.trim().to_string(), truncate_value(value.trim()));
            }
            _ => {
                info_index += 1;
                fields.insert(format!("Info {}", info_index), truncate_value(token));
            }
        }
    }

    fields
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| Field::new(key, value))
        .collect()
}
