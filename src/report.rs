//! 抽出結果の表示
//!
//! 人が読む形式・生データ・JSONの3種類。どれも文字列を返し、出力は呼び出し側で行う。

use crate::error::Result;
use crate::inspector::FileReport;
use prompt_inspector_common::ExtractedMetadata;
use serde_json::{json, Value};
use std::path::PathBuf;

const INDENT: &str = "    ";

/// タイトル + フィールド一覧
pub fn render_human(report: &FileReport) -> String {
    let mut out = format!("📄 {}\n", report.path.display());

    if !report.has_metadata() {
        out.push_str("  生成メタデータが見つかりません\n");
        return out;
    }

    out.push_str(&format!("  {}\n", report.title));
    for field in &report.fields {
        let mut lines = field.value.lines();
        let first = lines.next().unwrap_or_default();
        out.push_str(&format!("  - {}: {}\n", field.field_type, first));
        for line in lines {
            out.push_str(&format!("{}{}\n", INDENT, line));
        }
    }
    out
}

/// 整形前のメタデータ
pub fn render_raw(report: &FileReport) -> Result<String> {
    let body = match &report.metadata {
        ExtractedMetadata::RawText(text) => text.clone(),
        ExtractedMetadata::FieldList(fields) => serde_json::to_string_pretty(fields)?,
        ExtractedMetadata::None => "(メタデータなし)".to_string(),
    };
    Ok(format!("📄 {} [{}]\n{}\n", report.path.display(), report.producer, body))
}

/// scanコマンドの1行表示
pub fn render_scan_line(report: &FileReport) -> String {
    format!("🔎 {}  [{}] {}件", report.path.display(), report.producer, report.fields.len())
}

/// 結果配列をJSONへ（失敗したファイルは `error` を持つ）
pub fn render_json(results: &[(PathBuf, Result<FileReport>)]) -> Result<String> {
    let entries: Vec<Value> = results
        .iter()
        .map(|(path, result)| match result {
            Ok(report) => serde_json::to_value(report),
            Err(e) => Ok(json!({ "path": path, "error": e.to_string() })),
        })
        .collect::<std::result::Result<_, _>>()?;
    Ok(serde_json::to_string_pretty(&entries)?)
}

/// scan結果をJSONへ
pub fn render_scan_json(reports: &[FileReport]) -> Result<String> {
    Ok(serde_json::to_string_pretty(reports)?)
}
