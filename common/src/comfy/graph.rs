//! ComfyUIワークフローグラフ
//!
//! `prompt` チャンクのJSON（ノードID → {class_type, inputs}）を読み込む。
//! ノードの並びはJSON上の順序を保持する。

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{Error, Result};

/// 他ノードの出力への参照 `[node_id, slot]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub node_id: String,
    pub slot: u64,
}

/// ノード入力の値
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Literal(Value),
    Link(Link),
}

impl InputValue {
    /// 2要素の `[文字列, 整数]` だけをリンクとみなす
    pub fn from_json(value: &Value) -> Self {
        if let Value::Array(items) = value {
            if let [Value::String(node_id), Value::Number(slot)] = items.as_slice() {
                if let Some(slot) = slot.as_u64() {
                    return InputValue::Link(Link {
                        node_id: node_id.clone(),
                        slot,
                    });
                }
            }
        }
        InputValue::Literal(value.clone())
    }
}

/// ワークフローのノード
///
/// `class_type` が無いノードは不正ノードとして保持し、
/// 参照された時点で解決失敗にする。
#[derive(Debug, Clone, PartialEq)]
pub struct ComfyNode {
    pub class_type: Option<String>,
    pub inputs: IndexMap<String, InputValue>,
}

impl ComfyNode {
    fn from_json(value: &Value) -> Self {
        let class_type = value
            .get("class_type")
            .and_then(Value::as_str)
            .map(str::to_string);
        let inputs = value
            .get("inputs")
            .and_then(Value::as_object)
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|(name, v)| (name.clone(), InputValue::from_json(v)))
                    .collect()
            })
            .unwrap_or_default();
        Self { class_type, inputs }
    }

    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }
}

/// ノードID → ノード
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComfyGraph {
    nodes: IndexMap<String, ComfyNode>,
}

impl ComfyGraph {
    /// JSON文字列から構築
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// JSON値から構築（トップレベルはオブジェクトであること）
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidGraph("top-level value is not an object".into()))?;
        let nodes = object
            .iter()
            .map(|(id, node)| (id.clone(), ComfyNode::from_json(node)))
            .collect();
        Ok(Self { nodes })
    }

    /// ComfyUIのノードマップらしいか
    ///
    /// いずれかの値が `class_type` を持つオブジェクトなら真。
    pub fn is_node_map(value: &Value) -> bool {
        value
            .as_object()
            .map(|object| {
                object
                    .values()
                    .any(|node| node.get("class_type").is_some_and(Value::is_string))
            })
            .unwrap_or(false)
    }

    pub fn get(&self, node_id: &str) -> Option<&ComfyNode> {
        self.nodes.get(node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ComfyNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<(String, ComfyNode)> for ComfyGraph {
    fn from_iter<I: IntoIterator<Item = (String, ComfyNode)>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_detection() {
        assert_eq!(
            InputValue::from_json(&json!(["4", 1])),
            InputValue::Link(Link {
                node_id: "4".into(),
                slot: 1
            })
        );
        assert_eq!(
            InputValue::from_json(&json!([4, 1])),
            InputValue::Literal(json!([4, 1]))
        );
        assert_eq!(
            InputValue::from_json(&json!(["4", 1, 2])),
            InputValue::Literal(json!(["4", 1, 2]))
        );
        assert_eq!(
            InputValue::from_json(&json!("sd_xl_base_1.0.safetensors")),
            InputValue::Literal(json!("sd_xl_base_1.0.safetensors"))
        );
    }

    #[test]
    fn test_from_json_preserves_node_order() {
        let graph = ComfyGraph::from_json(
            r#"{"9": {"class_type": "SaveImage", "inputs": {}},
                "3": {"class_type": "KSampler", "inputs": {"seed": 1}},
                "10": {"class_type": "VAEDecode", "inputs": {}}}"#,
        )
        .unwrap();
        let ids: Vec<&str> = graph.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["9", "3", "10"]);
    }

    #[test]
    fn test_node_without_class_type() {
        let graph = ComfyGraph::from_json(r#"{"1": {"inputs": {"text": "x"}}}"#).unwrap();
        let node = graph.get("1").unwrap();
        assert!(node.class_type.is_none());
        assert!(node.input("text").is_some());
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(matches!(
            ComfyGraph::from_json("[1, 2]"),
            Err(Error::InvalidGraph(_))
        ));
        assert!(matches!(ComfyGraph::from_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_is_node_map() {
        assert!(ComfyGraph::is_node_map(&json!({"3": {"class_type": "KSampler"}})));
        assert!(!ComfyGraph::is_node_map(&json!({"prompt": "a cat"})));
        assert!(!ComfyGraph::is_node_map(&json!("text")));
    }
}
