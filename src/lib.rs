//! Prompt Inspector
//!
//! PNG/WEBPから生成メタデータを読み出すCLIのライブラリ部分。
//! 解析そのものは `prompt_inspector_common`、ここはファイルI/Oと表示を担う。

pub mod cli;
pub mod config;
pub mod error;
pub mod inspector;
pub mod report;
pub mod scanner;
