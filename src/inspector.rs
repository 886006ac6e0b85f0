//! ファイル単位の抽出処理
//!
//! サイズ上限の確認 → コンテナ読み取り → 判定・抽出。
//! テキストチャンクで何も得られなかったときだけピクセルをデコードする。

use crate::config::Config;
use crate::error::{InspectorError, Result};
use crate::scanner::{self, ImageInfo};
use indicatif::{ProgressBar, ProgressStyle};
use prompt_inspector_common::{ExtractedMetadata, Field, Inspection, Inspector, Producer};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// 1ファイルの抽出結果
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub producer: Producer,
    pub title: String,
    pub metadata: ExtractedMetadata,
    pub fields: Vec<Field>,
}

impl FileReport {
    fn new(path: &Path, inspection: Inspection) -> Self {
        Self {
            path: path.to_path_buf(),
            producer: inspection.producer,
            title: inspection.producer.title(),
            fields: inspection.fields(),
            metadata: inspection.metadata,
        }
    }

    pub fn has_metadata(&self) -> bool {
        !self.metadata.is_none()
    }
}

/// 設定から抽出器を作る
pub fn build_inspector(config: &Config) -> Inspector {
    Inspector::new(config.resolver_config())
}

/// 1ファイルを抽出
pub fn inspect_file(path: &Path, config: &Config, inspector: &Inspector) -> Result<FileReport> {
    if !path.is_file() {
        return Err(InspectorError::FileNotFound(path.display().to_string()));
    }

    let size = std::fs::metadata(path)?.len();
    if size > config.scan_limit_bytes {
        return Err(InspectorError::FileTooLarge {
            path: path.display().to_string(),
            size,
            limit: config.scan_limit_bytes,
        });
    }

    let bytes = std::fs::read(path)?;
    let chunks = scanner::read_chunks(&bytes)?;
    log::debug!("{}: {} text chunks", path.display(), chunks.len());

    let mut inspection = inspector.inspect(&chunks, None);
    if inspection.is_none() {
        match scanner::decode_pixels(&bytes) {
            Ok(pixels) => inspection = inspector.inspect(&chunks, Some(&pixels)),
            Err(e) => log::warn!("{}: pixels not decoded: {}", path.display(), e),
        }
    }

    Ok(FileReport::new(path, inspection))
}

/// 複数ファイルを並列に抽出（入力順を保つ）
pub fn inspect_files(
    paths: &[PathBuf],
    config: &Config,
    inspector: &Inspector,
) -> Vec<(PathBuf, Result<FileReport>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), inspect_file(path, config, inspector)))
        .collect()
}

/// フォルダ内でメタデータを持つ画像を探す
///
/// 読めないファイルは警告して飛ばす。
pub fn scan_for_metadata(
    images: &[ImageInfo],
    config: &Config,
    inspector: &Inspector,
    progress: &ProgressBar,
) -> Vec<FileReport> {
    let reports: Vec<FileReport> = images
        .par_iter()
        .filter_map(|image| {
            let result = inspect_file(&image.path, config, inspector);
            progress.inc(1);
            match result {
                Ok(report) if report.has_metadata() => Some(report),
                Ok(_) => None,
                Err(e) => {
                    log::warn!("{}: {}", image.path.display(), e);
                    None
                }
            }
        })
        .collect();
    progress.finish_and_clear();
    reports
}

/// スキャン用プログレスバー
pub fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}
