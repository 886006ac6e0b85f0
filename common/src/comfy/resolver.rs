//! ComfyUIグラフ解決
//!
//! ## 処理フロー
//! 1. 対象ノード（サンプラー）の検出
//! 2. 対象ノードの入力をリンクをたどって解決
//! 3. カテゴリごとに整形・重複除去してフィールド化

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

use super::graph::{ComfyGraph, ComfyNode, InputValue};
use super::rules::{
    find_rule, CategoryFormat, MappingTarget, PropagationRule, TargetSpec, CATEGORY_FORMATS,
    PROPAGATION_RULES, TARGET_SPECS,
};
use super::template::{render, RenderError};
use crate::fields::truncate_value;
use crate::types::Field;

/// リンクをたどる深さの上限
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// 解決器の設定
///
/// ルール表は静的データを参照し、`propagate_none` と深さ上限を呼び出し側が決める。
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    /// フォーマットに必要な入力が1つでも解決できなければ全体を未解決にする
    pub propagate_none: bool,
    /// 1入力の解決でたどるノード数の上限
    pub max_depth: usize,
    pub rules: &'static [PropagationRule],
    pub targets: &'static [TargetSpec],
    pub categories: &'static [CategoryFormat],
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            propagate_none: true,
            max_depth: DEFAULT_MAX_DEPTH,
            rules: PROPAGATION_RULES,
            targets: TARGET_SPECS,
            categories: CATEGORY_FORMATS,
        }
    }
}

impl ResolverConfig {
    pub fn with_propagate_none(mut self, propagate_none: bool) -> Self {
        self.propagate_none = propagate_none;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// 1入力の解決結果
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Value(Value),
    /// 伝播ルールが無い・入力が無いなど、ここで打ち切り
    Unresolved,
    /// 存在しない／不正なノードへのリンク
    Broken(String),
    /// 循環参照（検出したノードID）
    Cyclic(String),
    /// 深さ上限に達した（打ち切ったノードID）
    TooDeep(String),
}

/// ComfyUIグラフ解決器
#[derive(Debug, Clone, Default)]
pub struct ComfyGraphResolver {
    config: ResolverConfig,
}

impl ComfyGraphResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// ノード入力の値を解決
    ///
    /// リテラルはそのまま返し、リンクは伝播ルールに従ってたどる。
    pub fn resolve<'g>(&self, value: &'g InputValue, graph: &'g ComfyGraph) -> Resolution {
        let mut path = HashSet::new();
        self.resolve_inner(value, graph, &mut path)
    }

    /// `path` は現在たどっている経路上のノードID
    fn resolve_inner<'g>(
        &self,
        value: &'g InputValue,
        graph: &'g ComfyGraph,
        path: &mut HashSet<&'g str>,
    ) -> Resolution {
        let link = match value {
            InputValue::Literal(Value::Null) => return Resolution::Unresolved,
            InputValue::Literal(literal) => return Resolution::Value(literal.clone()),
            InputValue::Link(link) => link,
        };

        let Some(node) = graph.get(&link.node_id) else {
            log::debug!("comfy: link to missing node {}", link.node_id);
            return Resolution::Broken(format!("missing node {}", link.node_id));
        };
        let Some(class_type) = node.class_type.as_deref() else {
            log::debug!("comfy: link to invalid node {}", link.node_id);
            return Resolution::Broken(format!("invalid node {}", link.node_id));
        };
        if path.contains(link.node_id.as_str()) {
            log::warn!("comfy: cyclic reference through node {}", link.node_id);
            return Resolution::Cyclic(link.node_id.clone());
        }
        if path.len() >= self.config.max_depth {
            log::warn!(
                "comfy: link chain deeper than {} nodes, stopped at node {}",
                self.config.max_depth,
                link.node_id
            );
            return Resolution::TooDeep(link.node_id.clone());
        }

        let Some(rule) = find_rule(self.config.rules, class_type) else {
            return Resolution::Unresolved;
        };
        let Some(target) = rule.target(link.slot) else {
            return Resolution::Unresolved;
        };

        path.insert(link.node_id.as_str());
        let result = match target {
            MappingTarget::FollowInput(name) => match node.input(name) {
                Some(next) => self.resolve_inner(next, graph, path),
                None => Resolution::Unresolved,
            },
            MappingTarget::Format { template, inputs } => {
                self.resolve_format(node, template, inputs, graph, path)
            }
        };
        path.remove(link.node_id.as_str());
        result
    }

    fn resolve_format<'g>(
        &self,
        node: &'g ComfyNode,
        template: &str,
        inputs: &[&str],
        graph: &'g ComfyGraph,
        path: &mut HashSet<&'g str>,
    ) -> Resolution {
        let mut resolved = IndexMap::new();

        for &key in inputs {
            let resolution = match node.input(key) {
                Some(input) => self.resolve_inner(input, graph, path),
                None => Resolution::Unresolved,
            };
            match resolution {
                Resolution::Value(value) => {
                    resolved.insert(key.to_string(), value);
                }
                stop @ (Resolution::Cyclic(_) | Resolution::TooDeep(_)) => return stop,
                other if self.config.propagate_none => return other,
                _ => {
                    resolved.insert(key.to_string(), Value::String(format!("{{{}}}", key)));
                }
            }
        }

        match render(template, &resolved) {
            Ok(text) => Resolution::Value(Value::String(text)),
            Err(e) => {
                log::warn!("comfy: formatting '{}' failed: {}", template, e);
                Resolution::Unresolved
            }
        }
    }

    /// 対象ノードごとの解決済みパラメータ（ノード検出順）
    pub fn resolve_targets(&self, graph: &ComfyGraph) -> Vec<(String, IndexMap<String, Value>)> {
        graph
            .iter()
            .filter_map(|(id, node)| {
                let spec = find_rule(self.config.targets, node.class_type.as_deref()?)?;
                Some((id, node, spec))
            })
            .map(|(id, node, spec)| {
                let mut params = IndexMap::new();
                for &name in spec.inputs {
                    let Some(input) = node.input(name) else {
                        continue;
                    };
                    match self.resolve(input, graph) {
                        Resolution::Value(value) => {
                            params.insert(name.to_string(), value);
                        }
                        other => log::debug!("comfy: node {} input {} -> {:?}", id, name, other),
                    }
                }
                (id.to_string(), params)
            })
            .collect()
    }

    /// グラフをフィールドリストへ変換
    ///
    /// カテゴリ順は定義順、カテゴリ内はノード検出順。
    /// 同じカテゴリ内の重複値は最初の1つだけ残す。
    pub fn extract(&self, graph: &ComfyGraph) -> Vec<Field> {
        let targets = self.resolve_targets(graph);
        let mut fields = Vec::new();

        for category in self.config.categories {
            let mut values: Vec<String> = Vec::new();
            for (node_id, params) in &targets {
                for template in category.templates {
                    match render(template, params) {
                        Ok(value) => {
                            if !values.contains(&value) {
                                values.push(value);
                            }
                        }
                        Err(RenderError::MissingKey(_)) => {}
                        Err(e) => log::warn!(
                            "comfy: {} of node {} not rendered: {}",
                            category.key,
                            node_id,
                            e
                        ),
                    }
                }
            }
            fields.extend(
                values
                    .iter()
                    .map(|value| Field::new(category.label, truncate_value(value))),
            );
        }

        fields
    }

    /// JSON文字列から直接抽出。パース失敗は `None`。
    pub fn extract_json(&self, json: &str) -> Option<Vec<Field>> {
        match ComfyGraph::from_json(json) {
            Ok(graph) => Some(self.extract(&graph)),
            Err(e) => {
                log::warn!("comfy: workflow JSON rejected: {}", e);
                None
            }
        }
    }
}
