//! ステルスPNGInfoデコーダー
//!
//! テキストチャンクを持たない画像から、ピクセルの最下位ビットに
//! 埋め込まれたパラメータを復元する。
//!
//! ## ビット配置
//! - alphaモード: αチャンネルのLSB（1ピクセル1ビット）
//! - rgbモード: R, G, B のLSBを連結（1ピクセル3ビット）
//!
//! 走査順は x が外側、y が内側（列優先）。
//! 各ストリームは「シグネチャ16バイト → 長さ → 本体」の順に並ぶ。
//!
//! ## rgbモードの位置合わせ
//! 3ビット単位で読むため、各フィールドを読み終えた時点の余りビットは
//! 次のフィールドへ持ち越す。長さは33ビット読んだ上で先頭1ビット
//! （シグネチャ直後の1ビット）を捨てた残り32ビットを使う。
//! 並びは `sig(128) pad(1) len(32) payload`。既存エンコーダーとの互換のため、
//! この非対称はそのまま維持する。

use flate2::read::GzDecoder;
use serde::Serialize;
use std::io::Read;

use crate::error::Result;
use crate::types::PixelBuffer;

/// シグネチャ長（16バイト）
pub const SIGNATURE_BITS: usize = 16 * 8;

const ALPHA_LENGTH_BITS: usize = 32;
const RGB_LENGTH_BITS: usize = 33;
const RGB_BITS_PER_PIXEL: usize = 3;

const ALPHA_SIGNATURES: [(&str, bool); 2] =
    [("stealth_pnginfo", false), ("stealth_pngcomp", true)];
const RGB_SIGNATURES: [(&str, bool); 2] =
    [("stealth_rgbinfo", false), ("stealth_rgbcomp", true)];

/// 埋め込みチャンネル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StealthMode {
    Alpha,
    Rgb,
}

/// 復元したペイロード
///
/// シグネチャが一致し、宣言された長さを最後まで読めた場合のみ生成される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StealthPayload {
    pub mode: StealthMode,
    /// gzip圧縮されているか（`*comp` シグネチャ）
    pub compressed: bool,
    pub bytes: Vec<u8>,
}

impl StealthPayload {
    /// ペイロードをテキストへ変換
    ///
    /// 圧縮時はgzip展開後に厳密なUTF-8デコード、
    /// 非圧縮時は不正なシーケンスを置換してデコードする。
    /// 失敗はログに残して `None`。
    pub fn decode_text(&self) -> Option<String> {
        if !self.compressed {
            return Some(String::from_utf8_lossy(&self.bytes).into_owned());
        }
        self.inflate()
            .map_err(|e| log::warn!("stealth payload: {}", e))
            .ok()
    }

    /// gzip展開して厳密なUTF-8として読む
    fn inflate(&self) -> Result<String> {
        let mut text = String::new();
        GzDecoder::new(self.bytes.as_slice()).read_to_string(&mut text)?;
        Ok(text)
    }
}

/// ビット列バッファ（各要素は0/1）
#[derive(Debug, Default)]
struct BitBuffer {
    bits: Vec<u8>,
}

impl BitBuffer {
    fn push(&mut self, bit: u8) {
        self.bits.push(bit & 1);
    }

    fn len(&self) -> usize {
        self.bits.len()
    }

    fn clear(&mut self) {
        self.bits.clear();
    }

    fn truncate(&mut self, len: usize) {
        self.bits.truncate(len);
    }

    /// 先頭 `n` ビットを取り除き、残りは次のフィールドへ持ち越す
    fn consume(&mut self, n: usize) {
        let n = n.min(self.bits.len());
        self.bits.drain(..n);
    }

    /// 8ビットずつバイトへ。端数ビットは捨てる。
    fn to_bytes(&self) -> Vec<u8> {
        bits_to_bytes(&self.bits)
    }

    /// 先頭32ビットをビッグエンディアンの符号なし整数として読む
    fn to_u32(&self) -> u32 {
        self.bits
            .iter()
            .take(32)
            .fold(0u32, |acc, &bit| (acc << 1) | u32::from(bit))
    }
}

fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|byte| byte.iter().fold(0u8, |acc, &bit| (acc << 1) | bit))
        .collect()
}

/// 先頭128ビットをシグネチャとして照合
fn match_signature(bits: &[u8], candidates: &[(&str, bool); 2]) -> Option<bool> {
    let head = &bits[..SIGNATURE_BITS.min(bits.len())];
    let decoded = String::from_utf8_lossy(&bits_to_bytes(head)).into_owned();
    candidates
        .iter()
        .find(|(signature, _)| *signature == decoded)
        .map(|&(_, compressed)| compressed)
}

enum ScanState {
    ConfirmingSignature,
    ReadingParamLen,
    ReadingParam { len: usize },
}

/// ピクセルバッファからステルスペイロードを復元
///
/// シグネチャ不一致が確定した時点、またはペイロードを読み終えた時点で
/// 走査を打ち切る。長さフィールドを超えて読むことはない。
pub fn decode(pixels: &PixelBuffer) -> Option<StealthPayload> {
    let has_alpha = pixels.has_alpha();

    // rgbストリームでもシグネチャに43ピクセル必要
    if pixels.pixel_count() < SIGNATURE_BITS.div_ceil(RGB_BITS_PER_PIXEL) {
        log::debug!("stealth scan: image too small for a signature");
        return None;
    }

    let mut state = ScanState::ConfirmingSignature;
    let mut mode: Option<StealthMode> = None;
    let mut compressed = false;
    let mut rgb_ruled_out = false;
    let mut buffer_a = BitBuffer::default();
    let mut buffer_rgb = BitBuffer::default();

    for x in 0..pixels.width() {
        for y in 0..pixels.height() {
            let px = pixels.pixel(x, y);

            if has_alpha && mode != Some(StealthMode::Rgb) {
                buffer_a.push(px[3]);
            }
            if !rgb_ruled_out && mode != Some(StealthMode::Alpha) {
                buffer_rgb.push(px[0]);
                buffer_rgb.push(px[1]);
                buffer_rgb.push(px[2]);
            }

            match state {
                ScanState::ConfirmingSignature => {
                    if has_alpha && buffer_a.len() == SIGNATURE_BITS {
                        let Some(is_compressed) = match_signature(&buffer_a.bits, &ALPHA_SIGNATURES)
                        else {
                            log::debug!("stealth scan: alpha signature mismatch at x={}, y={}", x, y);
                            return None;
                        };
                        mode = Some(StealthMode::Alpha);
                        compressed = is_compressed;
                        buffer_a.clear();
                        state = ScanState::ReadingParamLen;
                    } else if !rgb_ruled_out && buffer_rgb.len() >= SIGNATURE_BITS {
                        match match_signature(&buffer_rgb.bits, &RGB_SIGNATURES) {
                            Some(is_compressed) => {
                                mode = Some(StealthMode::Rgb);
                                compressed = is_compressed;
                                buffer_rgb.consume(SIGNATURE_BITS);
                                state = ScanState::ReadingParamLen;
                            }
                            None if has_alpha => {
                                // αストリームの判定を待つ
                                rgb_ruled_out = true;
                                buffer_rgb.clear();
                            }
                            None => {
                                log::debug!("stealth scan: rgb signature mismatch at x={}, y={}", x, y);
                                return None;
                            }
                        }
                    }
                }
                ScanState::ReadingParamLen => {
                    let len = match mode {
                        Some(StealthMode::Alpha) if buffer_a.len() == ALPHA_LENGTH_BITS => {
                            let len = buffer_a.to_u32();
                            buffer_a.clear();
                            Some(len)
                        }
                        Some(StealthMode::Rgb) if buffer_rgb.len() >= RGB_LENGTH_BITS => {
                            buffer_rgb.consume(1);
                            let len = buffer_rgb.to_u32();
                            buffer_rgb.consume(RGB_LENGTH_BITS - 1);
                            Some(len)
                        }
                        _ => None,
                    };
                    if let Some(len) = len {
                        if len == 0 {
                            log::debug!("stealth scan: declared payload length is zero");
                            return None;
                        }
                        state = ScanState::ReadingParam { len: len as usize };
                    }
                }
                ScanState::ReadingParam { len } => {
                    let finished = match mode {
                        Some(StealthMode::Alpha) if buffer_a.len() == len => Some(&buffer_a),
                        Some(StealthMode::Rgb) if buffer_rgb.len() >= len => {
                            buffer_rgb.truncate(len);
                            Some(&buffer_rgb)
                        }
                        _ => None,
                    };
                    if let (Some(bits), Some(mode)) = (finished, mode) {
                        return Some(StealthPayload {
                            mode,
                            compressed,
                            bytes: bits.to_bytes(),
                        });
                    }
                }
            }
        }
    }

    if mode.is_some() {
        log::debug!("stealth scan: image ended before the declared payload length");
    }
    None
}

/// ステルスPNGInfoをテキストとして読む
pub fn read_stealth_text(pixels: &PixelBuffer) -> Option<String> {
    decode(pixels)?.decode_text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelLayout;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
        bytes
            .iter()
            .flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1))
            .collect()
    }

    fn alpha_stream(signature: &str, payload: &[u8]) -> Vec<u8> {
        let mut bits = bytes_to_bits(signature.as_bytes());
        bits.extend(bytes_to_bits(&((payload.len() * 8) as u32).to_be_bytes()));
        bits.extend(bytes_to_bits(payload));
        bits
    }

    fn rgb_stream(signature: &str, payload: &[u8]) -> Vec<u8> {
        let mut bits = bytes_to_bits(signature.as_bytes());
        bits.push(1); // 読み捨てる1ビット
        bits.extend(bytes_to_bits(&((payload.len() * 8) as u32).to_be_bytes()));
        bits.extend(bytes_to_bits(payload));
        bits
    }

    /// x外側・y内側の順でビットを埋め込む
    fn embed(width: u32, height: u32, layout: ChannelLayout, bits: &[u8]) -> PixelBuffer {
        let channels = layout.channels();
        let mut data = vec![0x80u8; width as usize * height as usize * channels];
        if layout == ChannelLayout::Rgba {
            for px in data.chunks_mut(4) {
                px[3] = 0xFE;
            }
        }
        let mut bit_iter = bits.iter();
        'outer: for x in 0..width as usize {
            for y in 0..height as usize {
                let offset = (y * width as usize + x) * channels;
                let targets: &[usize] = match layout {
                    ChannelLayout::Rgba => &[3],
                    ChannelLayout::Rgb => &[0, 1, 2],
                };
                for &c in targets {
                    match bit_iter.next() {
                        Some(&bit) => data[offset + c] = (data[offset + c] & 0xFE) | bit,
                        None => break 'outer,
                    }
                }
            }
        }
        PixelBuffer::from_raw(width, height, layout, data).unwrap()
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_alpha_uncompressed_round_trip() {
        let text = "masterpiece, 1girl\nNegative prompt: lowres\nSteps: 28, Sampler: Euler a";
        let pixels = embed(64, 64, ChannelLayout::Rgba, &alpha_stream("stealth_pnginfo", text.as_bytes()));

        let payload = decode(&pixels).expect("payload");
        assert_eq!(payload.mode, StealthMode::Alpha);
        assert!(!payload.compressed);
        assert_eq!(payload.decode_text().as_deref(), Some(text));
    }

    #[test]
    fn test_alpha_compressed_round_trip() {
        let text = "a cat, best quality\nSteps: 20, Sampler: Euler, CFG scale: 7";
        let pixels = embed(64, 64, ChannelLayout::Rgba, &alpha_stream("stealth_pngcomp", &gzip(text)));

        let payload = decode(&pixels).expect("payload");
        assert!(payload.compressed);
        assert_eq!(read_stealth_text(&pixels).as_deref(), Some(text));
    }

    #[test]
    fn test_rgb_uncompressed_round_trip() {
        let text = "rgb hidden prompt, ストレス無し";
        let pixels = embed(32, 32, ChannelLayout::Rgb, &rgb_stream("stealth_rgbinfo", text.as_bytes()));

        let payload = decode(&pixels).expect("payload");
        assert_eq!(payload.mode, StealthMode::Rgb);
        assert_eq!(payload.decode_text().as_deref(), Some(text));
    }

    #[test]
    fn test_rgb_compressed_round_trip() {
        let text = "{\"prompt\": \"rgb compressed\"}";
        let pixels = embed(40, 40, ChannelLayout::Rgb, &rgb_stream("stealth_rgbcomp", &gzip(text)));
        assert_eq!(read_stealth_text(&pixels).as_deref(), Some(text));
    }

    /// 文字列の0/1から直接ラスタを組み立てる（列優先・1ピクセル3ビット）
    fn rgb_raster_from_bit_string(width: usize, height: usize, bits: &str) -> PixelBuffer {
        let mut data = vec![0x10u8; width * height * 3];
        for (i, ch) in bits.chars().enumerate() {
            let pixel = i / 3;
            let (x, y) = (pixel / height, pixel % height);
            data[(y * width + x) * 3 + i % 3] |= u8::from(ch == '1');
        }
        PixelBuffer::from_raw(width as u32, height as u32, ChannelLayout::Rgb, data).unwrap()
    }

    #[test]
    fn test_rgb_layout_has_single_pad_bit() {
        let payload = "rgb payload";
        let mut bits: String = "stealth_rgbinfo".bytes().map(|b| format!("{:08b}", b)).collect();
        bits.push('0');
        bits.push_str(&format!("{:032b}", payload.len() * 8));
        bits.extend(payload.bytes().map(|b| format!("{:08b}", b)));

        let pixels = rgb_raster_from_bit_string(20, 20, &bits);
        assert_eq!(read_stealth_text(&pixels).as_deref(), Some(payload));

        // パディングが2ビットだと長さがずれて読めない
        let shifted = format!("{}0{}", &bits[..128], &bits[128..]);
        let pixels = rgb_raster_from_bit_string(20, 20, &shifted);
        assert_ne!(read_stealth_text(&pixels).as_deref(), Some(payload));
    }

    #[test]
    fn test_rgb_payload_starts_mid_pixel() {
        // 長さ確定時の余りビットが本体の先頭になる
        let bits = rgb_stream("stealth_rgbinfo", &[0xFF, 0x00, 0xA5]);
        assert_ne!((SIGNATURE_BITS + 1 + 32) % 3, 0);
        let pixels = embed(24, 24, ChannelLayout::Rgb, &bits);
        let payload = decode(&pixels).expect("payload");
        assert_eq!(payload.bytes, vec![0xFF, 0x00, 0xA5]);
    }

    #[test]
    fn test_bit_buffer_consume_keeps_remainder() {
        let mut buf = BitBuffer::default();
        for bit in [1, 0, 1, 1] {
            buf.push(bit);
        }
        buf.consume(3);
        assert_eq!(buf.bits, vec![1]);
        buf.consume(5);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn test_rgb_signature_in_rgba_image() {
        let text = "rgb mode inside rgba";
        let bits = rgb_stream("stealth_rgbinfo", text.as_bytes());
        let mut pixels = embed(32, 32, ChannelLayout::Rgb, &bits);
        // 同じRGBにαを付与（αには何も埋め込まない）
        let rgba: Vec<u8> = pixels
            .as_raw()
            .chunks(3)
            .flat_map(|px| [px[0], px[1], px[2], 0xFF])
            .collect();
        pixels = PixelBuffer::from_raw(32, 32, ChannelLayout::Rgba, rgba).unwrap();

        assert_eq!(read_stealth_text(&pixels).as_deref(), Some(text));
    }

    #[test]
    fn test_no_signature_returns_none() {
        let pixels = PixelBuffer::from_raw(64, 64, ChannelLayout::Rgba, vec![0x55; 64 * 64 * 4]).unwrap();
        assert!(decode(&pixels).is_none());

        let pixels = PixelBuffer::from_raw(64, 64, ChannelLayout::Rgb, vec![0x00; 64 * 64 * 3]).unwrap();
        assert!(decode(&pixels).is_none());
    }

    #[test]
    fn test_alpha_signature_ignored_without_alpha_channel() {
        let bits = alpha_stream("stealth_pnginfo", b"hidden");
        let rgba = embed(64, 64, ChannelLayout::Rgba, &bits);
        let rgb: Vec<u8> = rgba.as_raw().chunks(4).flat_map(|px| [px[0], px[1], px[2]]).collect();
        let pixels = PixelBuffer::from_raw(64, 64, ChannelLayout::Rgb, rgb).unwrap();
        assert!(decode(&pixels).is_none());
    }

    #[test]
    fn test_image_too_small() {
        let pixels = PixelBuffer::from_raw(6, 7, ChannelLayout::Rgb, vec![0; 6 * 7 * 3]).unwrap();
        assert!(decode(&pixels).is_none());
    }

    #[test]
    fn test_truncated_payload_returns_none() {
        // 本体の途中で画像が終わる
        let bits = alpha_stream("stealth_pnginfo", &[b'x'; 64]);
        let pixels = embed(16, 16, ChannelLayout::Rgba, &bits);
        assert!(decode(&pixels).is_none());
    }

    #[test]
    fn test_corrupt_gzip_returns_none() {
        let pixels = embed(
            64,
            64,
            ChannelLayout::Rgba,
            &alpha_stream("stealth_pngcomp", b"definitely not gzip"),
        );
        let payload = decode(&pixels).expect("signature and length are valid");
        assert!(payload.decode_text().is_none());
    }

    #[test]
    fn test_inflate_errors_are_io() {
        let not_gzip = StealthPayload {
            mode: StealthMode::Alpha,
            compressed: true,
            bytes: b"definitely not gzip".to_vec(),
        };
        assert!(matches!(not_gzip.inflate(), Err(crate::error::Error::Io(_))));

        // 展開できても UTF-8 でなければ失敗
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[b'o', 0xFF, b'k']).unwrap();
        let not_utf8 = StealthPayload {
            bytes: encoder.finish().unwrap(),
            ..not_gzip
        };
        assert!(matches!(not_utf8.inflate(), Err(crate::error::Error::Io(_))));
        assert!(not_utf8.decode_text().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_replaced_when_uncompressed() {
        let pixels = embed(64, 64, ChannelLayout::Rgba, &alpha_stream("stealth_pnginfo", &[b'o', 0xFF, b'k']));
        let text = read_stealth_text(&pixels).unwrap();
        assert!(text.starts_with('o'));
        assert!(text.ends_with('k'));
    }

    #[test]
    fn test_bit_buffer_to_u32() {
        let mut buf = BitBuffer::default();
        for bit in bytes_to_bits(&1234u32.to_be_bytes()) {
            buf.push(bit);
        }
        assert_eq!(buf.to_u32(), 1234);
    }

    #[test]
    fn test_bits_to_bytes_drops_partial_group() {
        let mut bits = bytes_to_bits(b"ok");
        bits.extend([1, 0, 1]);
        assert_eq!(bits_to_bytes(&bits), b"ok".to_vec());
    }
}
