//! ComfyUIワークフロー解析モジュール
//!
//! ノードグラフのリンクをパススルーノード越しにたどり、
//! モデル・プロンプト・シード・サンプラー設定を復元する。

pub mod graph;
pub mod resolver;
pub mod rules;
pub mod template;

pub use graph::{ComfyGraph, ComfyNode, InputValue, Link};
pub use resolver::{ComfyGraphResolver, Resolution, ResolverConfig};
pub use rules::{ClassMatcher, MappingTarget, PropagationRule, TargetSpec};
