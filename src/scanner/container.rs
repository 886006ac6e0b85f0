//! 画像コンテナの読み取り
//!
//! PNGのテキストチャンク（tEXt / zTXt / iTXt / eXIf）と
//! WEBPのRIFFチャンク（XMP / EXIF）を [`TextChunkMap`] に集める。
//! ピクセルは `image` でデコードして [`PixelBuffer`] にする。

use crate::error::{InspectorError, Result};
use flate2::read::ZlibDecoder;
use prompt_inspector_common::{ChannelLayout, PixelBuffer, TextChunkMap, XMP_CHUNK_KEY};
use std::io::Read;

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// A1111がEXIFで書き込むテキストのキー
pub const PARAMETERS_KEY: &str = "parameters";

/// コンテナ形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Png,
    Webp,
}

impl ContainerFormat {
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(PNG_SIGNATURE) {
            Some(ContainerFormat::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ContainerFormat::Webp)
        } else {
            None
        }
    }
}

/// テキストチャンクを読む
pub fn read_chunks(bytes: &[u8]) -> Result<TextChunkMap> {
    match ContainerFormat::detect(bytes) {
        Some(ContainerFormat::Png) => Ok(read_png_chunks(bytes)),
        Some(ContainerFormat::Webp) => Ok(read_webp_chunks(bytes)),
        None => Err(InspectorError::UnsupportedFormat(
            "PNGでもWEBPでもありません".into(),
        )),
    }
}

/// ピクセルをデコード（αがあればRGBA、なければRGB）
pub fn decode_pixels(bytes: &[u8]) -> Result<PixelBuffer> {
    let image = image::load_from_memory(bytes)?;
    let (width, height) = (image.width(), image.height());

    let buffer = if image.color().has_alpha() {
        PixelBuffer::from_raw(width, height, ChannelLayout::Rgba, image.into_rgba8().into_raw())?
    } else {
        PixelBuffer::from_raw(width, height, ChannelLayout::Rgb, image.into_rgb8().into_raw())?
    };
    Ok(buffer)
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

fn le_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

/// PNGのチャンクを走査
///
/// 壊れたチャンクに当たったらそこまでに読めた分を返す。
pub fn read_png_chunks(bytes: &[u8]) -> TextChunkMap {
    let mut chunks = TextChunkMap::new();
    let mut pos = PNG_SIGNATURE.len();

    while let Some(len) = be_u32(bytes, pos) {
        let data_start = pos + 8;
        let data_end = data_start + len as usize;
        let (Some(kind), Some(data)) = (bytes.get(pos + 4..data_start), bytes.get(data_start..data_end))
        else {
            log::warn!("png: truncated chunk at offset {}", pos);
            break;
        };

        match kind {
            b"tEXt" => {
                if let Some((key, text)) = parse_text(data) {
                    chunks.insert(key, text);
                }
            }
            b"zTXt" => {
                if let Some((key, text)) = parse_ztxt(data) {
                    chunks.insert(key, text);
                }
            }
            b"iTXt" => {
                if let Some((key, text)) = parse_itxt(data) {
                    if key == XMP_CHUNK_KEY {
                        chunks.set_xmp(text.into_bytes());
                    } else {
                        chunks.insert(key, text);
                    }
                }
            }
            b"eXIf" => {
                if !chunks.contains_key(PARAMETERS_KEY) {
                    if let Some(comment) = exif_user_comment(data) {
                        chunks.insert(PARAMETERS_KEY, comment);
                    }
                }
            }
            b"IEND" => break,
            _ => {}
        }

        // データ + CRC
        pos = data_end + 4;
    }

    chunks
}

/// キーワード（NUL終端）と残りに分割
fn split_keyword(data: &[u8]) -> Option<(String, &[u8])> {
    let nul = data.iter().position(|&b| b == 0)?;
    let key = latin1(&data[..nul]);
    if key.is_empty() {
        return None;
    }
    Some((key, &data[nul + 1..]))
}

/// tEXtはLatin-1だが、UTF-8で書くツールも多いので先に試す
fn decode_text(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => latin1(raw),
    }
}

fn latin1(raw: &[u8]) -> String {
    raw.iter().map(|&b| b as char).collect()
}

fn inflate(raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    match ZlibDecoder::new(raw).read_to_end(&mut out) {
        Ok(_) => Some(out),
        Err(e) => {
            log::warn!("png: failed to inflate text chunk: {}", e);
            None
        }
    }
}

fn parse_text(data: &[u8]) -> Option<(String, String)> {
    let (key, rest) = split_keyword(data)?;
    Some((key, decode_text(rest)))
}

fn parse_ztxt(data: &[u8]) -> Option<(String, String)> {
    let (key, rest) = split_keyword(data)?;
    // 圧縮方式（0 = zlib）
    let (&method, compressed) = rest.split_first()?;
    if method != 0 {
        log::warn!("png: zTXt '{}' uses unknown compression {}", key, method);
        return None;
    }
    Some((key, decode_text(&inflate(compressed)?)))
}

fn parse_itxt(data: &[u8]) -> Option<(String, String)> {
    let (key, rest) = split_keyword(data)?;
    let (&flag, rest) = rest.split_first()?;
    let (_method, rest) = rest.split_first()?;
    // 言語タグ・翻訳キーワードを読み飛ばす
    let lang_end = rest.iter().position(|&b| b == 0)?;
    let rest = &rest[lang_end + 1..];
    let translated_end = rest.iter().position(|&b| b == 0)?;
    let text = &rest[translated_end + 1..];

    let text = if flag == 1 { inflate(text)? } else { text.to_vec() };
    Some((key, String::from_utf8_lossy(&text).into_owned()))
}

/// WEBPのRIFFチャンクを走査
pub fn read_webp_chunks(bytes: &[u8]) -> TextChunkMap {
    let mut chunks = TextChunkMap::new();
    let mut pos = 12;

    while let Some(len) = le_u32(bytes, pos + 4) {
        let data_start = pos + 8;
        let data_end = data_start + len as usize;
        let (Some(kind), Some(data)) = (bytes.get(pos..pos + 4), bytes.get(data_start..data_end))
        else {
            log::warn!("webp: truncated chunk at offset {}", pos);
            break;
        };

        match kind {
            b"XMP " => chunks.set_xmp(data.to_vec()),
            b"EXIF" => {
                if let Some(comment) = exif_user_comment(data) {
                    chunks.insert(PARAMETERS_KEY, comment);
                }
            }
            _ => {}
        }

        // 奇数長は1バイトのパディング
        pos = data_end + (len as usize & 1);
    }

    chunks
}

/// EXIFのUserCommentを読む
pub fn exif_user_comment(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_prefix(EXIF_HEADER).unwrap_or(raw);
    let exif = match exif::Reader::new().read_raw(raw.to_vec()) {
        Ok(exif) => exif,
        Err(e) => {
            log::debug!("exif: unreadable block: {}", e);
            return None;
        }
    };
    let field = exif.get_field(exif::Tag::UserComment, exif::In::PRIMARY)?;
    let exif::Value::Undefined(ref bytes, _) = field.value else {
        return None;
    };
    let text = decode_user_comment(bytes)?;
    let text = text.trim_end_matches('\0').to_string();
    (!text.trim().is_empty()).then_some(text)
}

/// UserCommentの文字コードヘッダ（8バイト）に従ってデコード
pub fn decode_user_comment(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 8 {
        return None;
    }
    let (header, body) = bytes.split_at(8);
    match header {
        b"UNICODE\0" => Some(decode_utf16(body)),
        _ => Some(String::from_utf8_lossy(body).into_owned()),
    }
}

/// UTF-16（BOMなし）。先頭バイトの並びでエンディアンを推定する
fn decode_utf16(body: &[u8]) -> String {
    let little_endian = matches!(body, [lo, 0, ..] if *lo != 0);
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}
