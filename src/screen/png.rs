//! Minimal truecolour PNG writer: one IHDR, one IDAT, one IEND.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::AgentError;
use crate::screen::frame::{FrameBuffer, BYTES_PER_PIXEL};

pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const COMPRESSION_LEVEL: u32 = 6;
const BIT_DEPTH: u8 = 8;
const COLOR_TYPE_RGB: u8 = 2;
const FILTER_NONE: u8 = 0;

/// Encoded bytes of one step's screenshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedImage(Vec<u8>);

/// Fields read back from an IHDR chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: u8,
}

impl EncodedImage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the header chunk, which always directly follows the signature.
    pub fn header(&self) -> Option<ImageHeader> {
        let bytes = &self.0;
        if bytes.get(..8)? != SIGNATURE || bytes.get(12..16)? != b"IHDR" {
            return None;
        }
        let ihdr = bytes.get(16..29)?;
        Some(ImageHeader {
            width: u32::from_be_bytes([ihdr[0], ihdr[1], ihdr[2], ihdr[3]]),
            height: u32::from_be_bytes([ihdr[4], ihdr[5], ihdr[6], ihdr[7]]),
            bit_depth: ihdr[8],
            color_type: ihdr[9],
        })
    }
}

impl AsRef<[u8]> for EncodedImage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encode a BGRA frame as an 8-bit RGB PNG. Alpha is dropped.
pub fn encode_png(frame: &FrameBuffer) -> Result<EncodedImage, AgentError> {
    if !frame.is_complete() {
        return Err(AgentError::Encode(format!(
            "frame {}x{} carries {} bytes, expected {}",
            frame.width,
            frame.height,
            frame.pixels.len(),
            frame.expected_len()
        )));
    }

    let width = frame.width as usize;
    let row_bytes = width * BYTES_PER_PIXEL;
    let mut raw = Vec::with_capacity(frame.height as usize * (1 + width * 3));
    for row in frame.pixels.chunks_exact(row_bytes).take(frame.height as usize) {
        raw.push(FILTER_NONE);
        for px in row.chunks_exact(BYTES_PER_PIXEL) {
            raw.extend_from_slice(&[px[2], px[1], px[0]]);
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(COMPRESSION_LEVEL));
    encoder
        .write_all(&raw)
        .map_err(|err| AgentError::Encode(format!("deflate failed: {err}")))?;
    let compressed = encoder
        .finish()
        .map_err(|err| AgentError::Encode(format!("deflate failed: {err}")))?;

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&frame.width.to_be_bytes());
    ihdr.extend_from_slice(&frame.height.to_be_bytes());
    // bit depth, colour type, compression, filter, interlace
    ihdr.extend_from_slice(&[BIT_DEPTH, COLOR_TYPE_RGB, 0, 0, 0]);

    let mut out = Vec::with_capacity(SIGNATURE.len() + compressed.len() + 3 * 12 + 13);
    out.extend_from_slice(&SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &compressed);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(EncodedImage(out))
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(tag);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}
