pub mod container;

use crate::config::Config;
use crate::error::{InspectorError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use container::{decode_pixels, read_chunks, ContainerFormat};

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

/// フォルダ内の対象画像を列挙
///
/// 拡張子は `config.extensions`、上限サイズを超えるファイルは除外する。
pub fn scan_folder(folder: &Path, config: &Config, recursive: bool) -> Result<Vec<ImageInfo>> {
    if !folder.is_dir() {
        return Err(InspectorError::FolderNotFound(folder.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let Some(ext) = path.extension() else {
            continue;
        };
        if !config.accepts_extension(&ext.to_string_lossy()) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::warn!("{}: {}", path.display(), e);
                continue;
            }
        };
        if size > config.scan_limit_bytes {
            log::debug!("skip {} ({} bytes > {})", path.display(), size, config.scan_limit_bytes);
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        images.push(ImageInfo {
            path: path.to_path_buf(),
            file_name,
            size,
        });
    }

    // パスでソート
    images.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(images)
}
