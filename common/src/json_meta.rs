//! JSON形式メタデータの平坦化
//!
//! NovelAI（Comment）・SwarmUI（sui_image_params）・InvokeAI・Illust の
//! JSONをフィールドリストへ変換する。

use serde_json::{Map, Value};

use crate::a1111;
use crate::fields::{display_value, flatten_object, lookup, truncate_value};
use crate::types::Field;

const SWARM_PARAMS_KEY: &str = "sui_image_params";

/// InvokeAIのキー（`.` 区切りでネスト）→ 共通フィールド名
const INVOKEAI_KEY_MAP: &[(&str, &str)] = &[
    ("positive_prompt", "Prompt"),
    ("negative_prompt", "Negative Prompt"),
    ("model.model_name", "Model"),
    ("model.name", "Model"),
    ("seed", "Seed"),
    ("steps", "Steps"),
    ("cfg_scale", "CFG Scale"),
    ("scheduler", "Scheduler"),
    ("width", "Width"),
    ("height", "Height"),
    ("generation_mode", "Mode"),
];

/// テキストをJSONオブジェクトとして読む
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => None,
        Err(e) => {
            log::debug!("metadata text is not a JSON object: {}", e);
            None
        }
    }
}

/// SwarmUIのJSONか
pub fn is_swarm(object: &Map<String, Value>) -> bool {
    object.get(SWARM_PARAMS_KEY).is_some_and(Value::is_object)
}

/// 入れ子のオブジェクトを文字列化して上書きマージ
fn merge_stringified(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        target.insert(key.clone(), Value::String(display_value(value)));
    }
}

/// SwarmUI: `sui_image_params` をトップレベルへ展開
pub fn swarm_fields(object: &Map<String, Value>) -> Vec<Field> {
    let mut merged = object.clone();
    if let Some(Value::Object(params)) = merged.shift_remove(SWARM_PARAMS_KEY) {
        merge_stringified(&mut merged, &params);
    }
    flatten_object(&merged)
}

/// NovelAI: Comment JSONをそのまま平坦化
///
/// 入れ子の `Comment`（エスケープ済みJSON文字列）があれば展開し、
/// `Comment` / `Description` は出力から外す。
pub fn novelai_fields(object: &Map<String, Value>) -> Vec<Field> {
    let mut merged = object.clone();
    if let Some(Value::String(comment)) = merged.get("Comment").cloned() {
        if let Some(inner) = parse_object(&comment.replace(r#"\""#, "\"")) {
            merge_stringified(&mut merged, &inner);
            merged.shift_remove("Comment");
            merged.shift_remove("Description");
        }
    }
    flatten_object(&merged)
}

/// InvokeAI: 共通の語彙へ対応付け
///
/// 対応表に無いキーは捨てる。同じ表示名は最初に見つかった値を使う。
pub fn invokeai_fields(object: &Map<String, Value>) -> Vec<Field> {
    let root = Value::Object(object.clone());
    let mut fields: Vec<Field> = Vec::new();
    for (key, label) in INVOKEAI_KEY_MAP {
        if fields.iter().any(|f| f.field_type == *label) {
            continue;
        }
        let Some(value) = lookup(&root, key) else {
            continue;
        };
        let rendered = display_value(value);
        if value.is_null() || rendered.trim().is_empty() {
            continue;
        }
        fields.push(Field::new(*label, truncate_value(&rendered)));
    }
    fields
}

/// 生テキストを内容から判別してフィールド化
///
/// - `"Steps: "` を含めばA1111形式
/// - JSONオブジェクトならSwarmUI／汎用の平坦化
/// - それ以外は1フィールド
pub fn text_fields(text: &str) -> Vec<Field> {
    if a1111::looks_like_a1111(text) {
        return a1111::parse(text);
    }
    match parse_object(text) {
        Some(object) if is_swarm(&object) => swarm_fields(&object),
        Some(object) => novelai_fields(&object),
        None => a1111::parse(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_swarm_fields() {
        let value = json!({
            "sui_image_params": {"prompt": "a fox", "seed": 99, "cfgscale": 6.5},
            "sui_models": [{"name": "flux.safetensors"}]
        });
        let fields = swarm_fields(&object(value));
        assert_eq!(fields[0].field_type, "sui_models");
        assert!(fields.contains(&Field::new("prompt", "a fox")));
        assert!(fields.contains(&Field::new("seed", "99")));
        assert!(fields.contains(&Field::new("cfgscale", "6.5")));
        assert!(!fields.iter().any(|f| f.field_type == "sui_image_params"));
    }

    #[test]
    fn test_novelai_fields() {
        let value = json!({"prompt": "1girl, scenery", "steps": 28, "scale": 5, "uc": "lowres", "sampler": "k_euler"});
        let fields = novelai_fields(&object(value));
        assert_eq!(
            fields,
            vec![
                Field::new("prompt", "1girl, scenery"),
                Field::new("steps", "28"),
                Field::new("scale", "5"),
                Field::new("uc", "lowres"),
                Field::new("sampler", "k_euler"),
            ]
        );
    }

    #[test]
    fn test_novelai_nested_comment() {
        let value = json!({
            "Description": "1girl",
            "Software": "NovelAI",
            "Comment": "{\\\"prompt\\\": \\\"1girl\\\", \\\"seed\\\": 3}"
        });
        let fields = novelai_fields(&object(value));
        assert!(fields.contains(&Field::new("Software", "NovelAI")));
        assert!(fields.contains(&Field::new("seed", "3")));
        assert!(!fields.iter().any(|f| f.field_type == "Comment" || f.field_type == "Description"));
    }

    #[test]
    fn test_invokeai_fields() {
        let value = json!({
            "generation_mode": "txt2img",
            "positive_prompt": "a castle",
            "negative_prompt": "",
            "width": 768, "height": 512, "seed": 1, "steps": 30, "cfg_scale": 7.5,
            "scheduler": "euler",
            "model": {"model_name": "juggernaut", "base_model": "sdxl"}
        });
        let fields = invokeai_fields(&object(value));
        assert_eq!(
            fields,
            vec![
                Field::new("Prompt", "a castle"),
                Field::new("Model", "juggernaut"),
                Field::new("Seed", "1"),
                Field::new("Steps", "30"),
                Field::new("CFG Scale", "7.5"),
                Field::new("Scheduler", "euler"),
                Field::new("Width", "768"),
                Field::new("Height", "512"),
                Field::new("Mode", "txt2img"),
            ]
        );
    }

    #[test]
    fn test_text_fields_dispatch() {
        let a1111 = text_fields("a cat\nSteps: 20, Seed: 1");
        assert_eq!(a1111[0], Field::new("Prompt", "a cat"));

        let json = text_fields(r#"{"prompt": "a dog"}"#);
        assert_eq!(json, vec![Field::new("prompt", "a dog")]);

        let plain = text_fields("just words");
        assert_eq!(plain, vec![Field::new(a1111::FALLBACK_FIELD, "just words")]);
    }
}
