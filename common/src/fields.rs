//! フィールド値の整形ヘルパー

use crate::types::Field;
use serde_json::Value;

/// フィールド値の最大文字数
pub const MAX_FIELD_CHARS: usize = 1023;

/// 切り詰め時に残す文字数（残りは省略記号）
const TRUNCATED_CHARS: usize = 1020;

const ELLIPSIS: &str = "...";

/// 値を最大文字数に収める
///
/// 1023文字を超える場合は先頭1020文字 + "..." にする。
/// 文字数はバイトではなく `char` 単位で数える。
pub fn truncate_value(value: &str) -> String {
    if value.chars().count() <= MAX_FIELD_CHARS {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(TRUNCATED_CHARS).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// JSON値を表示用文字列へ変換
///
/// 文字列はそのまま、それ以外はJSON表記。
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `a.b.c` 形式のパスでネストした値を引く
pub fn lookup<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(root, |value, key| value.get(key))
}

/// JSONオブジェクトのトップレベルをフィールドリストへ平坦化
///
/// キー・値が空のものは除外する。
pub fn flatten_object(object: &serde_json::Map<String, Value>) -> Vec<Field> {
    object
        .iter()
        .filter_map(|(key, value)| {
            let rendered = display_value(value);
            if key.trim().is_empty() || rendered.trim().is_empty() || value.is_null() {
                return None;
            }
            Some(Field::new(key.clone(), truncate_value(&rendered)))
        })
        .collect()
}
