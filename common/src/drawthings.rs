//! DrawThings XMP抽出
//!
//! DrawThingsはXMPの `<rdf:li xml:lang="x-default">` 要素にJSONを格納する。
//! XMP全体はパースせず、この1パターンだけを文字列分割で取り出す。

use serde_json::Value;

use crate::fields::{display_value, lookup, truncate_value};
use crate::types::{Field, TextChunkMap};

const LI_OPEN: &str = r#"<rdf:li xml:lang="x-default">"#;
const LI_CLOSE: &str = "</rdf:li>";

/// DrawThingsのキー（`.` 区切りでネスト）→ 共通フィールド名
const KEY_MAP: &[(&str, &str)] = &[
    ("c", "Prompt"),
    ("uc", "Negative Prompt"),
    ("model", "Model"),
    ("seed", "Seed"),
    ("steps", "Steps"),
    ("v2.width", "Width"),
    ("v2.height", "Height"),
    ("sampler", "Sampler"),
    ("scale", "CFG Scale"),
    ("strength", "Strength"),
    ("v2.seedMode", "Seed Mode"),
    ("v2.shift", "Shift"),
];

/// XMPからDrawThingsのJSONを取り出す
pub fn extract_json(xmp: &str) -> Option<Value> {
    let (_, rest) = xmp.split_once(LI_OPEN)?;
    let (payload, _) = rest.split_once(LI_CLOSE)?;
    let payload = payload.trim();

    serde_json::from_str(payload)
        .or_else(|_| serde_json::from_str(&unescape_xml(payload)))
        .map_err(|e| log::debug!("drawthings: payload is not JSON: {}", e))
        .ok()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// DrawThingsのJSONを共通フィールドへ変換
///
/// 対応表に無いキー・空の値は捨てる。`lora` 配列は `file:weight` で1件ずつ出す。
pub fn map_fields(json: &Value) -> Vec<Field> {
    let mut fields: Vec<Field> = KEY_MAP
        .iter()
        .filter_map(|(key, label)| {
            let value = lookup(json, key)?;
            if value.is_null() {
                return None;
            }
            let rendered = display_value(value);
            if rendered.trim().is_empty() {
                return None;
            }
            Some(Field::new(*label, truncate_value(&rendered)))
        })
        .collect();

    if let Some(loras) = json.get("lora").and_then(Value::as_array) {
        for lora in loras {
            let Some(file) = lora.get("file").and_then(Value::as_str) else {
                continue;
            };
            let weight = lora.get("weight").map(display_value).unwrap_or_else(|| "1".into());
            fields.push(Field::new("LoRA", truncate_value(&format!("{}:{}", file, weight))));
        }
    }

    fields
}

/// テキストチャンクのXMPからフィールドを抽出。失敗時は `None`。
pub fn extract(chunks: &TextChunkMap) -> Option<Vec<Field>> {
    let xmp = String::from_utf8_lossy(chunks.xmp_bytes()?);
    let json = extract_json(&xmp)?;
    let fields = map_fields(&json);
    (!fields.is_empty()).then_some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::XMP_CHUNK_KEY;

    fn xmp_with(payload: &str) -> String {
        format!(
            r#"<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:RDF><rdf:Description><exif:UserComment><rdf:Alt><rdf:li xml:lang="x-default">{}</rdf:li></rdf:Alt></exif:UserComment></rdf:Description></rdf:RDF></x:xmpmeta>"#,
            payload
        )
    }

    #[test]
    fn test_extract_drawthings() {
        let payload = r#"{"c":"a lighthouse at dusk","uc":"blurry","model":"sd_xl_base_1.0_f16.ckpt","seed":1234,"steps":30,"scale":5.5,"sampler":"DPM++ 2M Karras","size":"1024x1024","v2":{"width":1024,"height":1024,"seedMode":"Scale Alike","unknown":1},"lora":[{"file":"detail.ckpt","weight":0.6}]}"#;
        let mut chunks = TextChunkMap::new();
        chunks.insert(XMP_CHUNK_KEY, xmp_with(payload));

        let fields = extract(&chunks).unwrap();
        assert_eq!(
            fields,
            vec![
                Field::new("Prompt", "a lighthouse at dusk"),
                Field::new("Negative Prompt", "blurry"),
                Field::new("Model", "sd_xl_base_1.0_f16.ckpt"),
                Field::new("Seed", "1234"),
                Field::new("Steps", "30"),
                Field::new("Width", "1024"),
                Field::new("Height", "1024"),
                Field::new("Sampler", "DPM++ 2M Karras"),
                Field::new("CFG Scale", "5.5"),
                Field::new("Seed Mode", "Scale Alike"),
                Field::new("LoRA", "detail.ckpt:0.6"),
            ]
        );
    }

    #[test]
    fn test_extract_escaped_payload() {
        let payload = r#"{&quot;c&quot;:&quot;cat &amp; dog&quot;,&quot;seed&quot;:1}"#;
        let json = extract_json(&xmp_with(payload)).unwrap();
        assert_eq!(json["c"], "cat & dog");
    }

    #[test]
    fn test_extract_without_li_element() {
        let mut chunks = TextChunkMap::new();
        chunks.set_xmp(b"<x:xmpmeta><rdf:RDF/></x:xmpmeta>".to_vec());
        assert!(extract(&chunks).is_none());
    }

    #[test]
    fn test_extract_non_json_payload() {
        let mut chunks = TextChunkMap::new();
        chunks.set_xmp(xmp_with("Created with Photoshop").into_bytes());
        assert!(extract(&chunks).is_none());
    }

    #[test]
    fn test_extract_without_xmp() {
        assert!(extract(&TextChunkMap::new()).is_none());
    }
}
