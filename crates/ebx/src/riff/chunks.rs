// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RIFF container framing: `"RIFF" · u32 total · form tag · chunks`, each
//! chunk `tag · u32 length · payload` padded so the next starts 16-aligned.
//!
//! The data chunk opens with 12 lead bytes, which lands the data section at
//! file offset 32 and keeps every section base 16-aligned for free.

use crate::config::{
    CHUNK_DATA, CHUNK_EXTRA, CHUNK_FIXUP, DATA_LEAD_PAD, FORM_EBX, FORM_EBXS, RIFF_TAG,
    SECTION_ALIGN,
};
use crate::core::{align_up, pad_to, Cursor};
use crate::error::{Error, Result};

/// Chunk payloads of one container, borrowed from the file buffer. The data
/// slice starts after the lead bytes.
pub struct RiffChunks<'a> {
    pub data: &'a [u8],
    pub fixup: &'a [u8],
    pub extra: Option<&'a [u8]>,
}

/// Split a container into its chunk payloads. Unknown chunks are skipped;
/// the data and fixup chunks are mandatory.
pub fn parse_container(bytes: &[u8]) -> Result<RiffChunks<'_>> {
    let mut cur = Cursor::new(bytes);
    if cur.read_bytes(4)? != RIFF_TAG {
        return Err(Error::corrupt(0, "not a riff container"));
    }
    let total = cur.read_u32_le()? as usize;
    let end = total.saturating_add(8).min(bytes.len());
    let form = cur.read_bytes(4)?;
    if form != FORM_EBX && form != FORM_EBXS {
        return Err(Error::corrupt(
            8,
            format!("unknown form tag {:?}", String::from_utf8_lossy(form)),
        ));
    }

    let mut data = None;
    let mut fixup = None;
    let mut extra = None;
    while cur.offset() + 8 <= end {
        let at = cur.offset();
        let mut tag = [0u8; 4];
        tag.copy_from_slice(cur.read_bytes(4)?);
        let len = cur.read_u32_le()? as usize;
        let payload = cur.read_bytes(len)?;
        if tag == CHUNK_DATA && data.is_none() {
            if payload.len() < DATA_LEAD_PAD {
                return Err(Error::corrupt(at, "data chunk shorter than its lead bytes"));
            }
            data = Some(&payload[DATA_LEAD_PAD..]);
        } else if tag == CHUNK_FIXUP && fixup.is_none() {
            fixup = Some(payload);
        } else if tag == CHUNK_EXTRA && extra.is_none() {
            extra = Some(payload);
        } else {
            log::debug!(
                "[RIFF] skipping chunk {:?} ({len} bytes)",
                String::from_utf8_lossy(&tag)
            );
        }
        let next = align_up(cur.offset(), SECTION_ALIGN);
        if next >= end {
            break;
        }
        cur.seek(next)?;
    }

    Ok(RiffChunks {
        data: data.ok_or_else(|| Error::corrupt(0, "container has no EBXD chunk"))?,
        fixup: fixup.ok_or_else(|| Error::corrupt(0, "container has no EFIX chunk"))?,
        extra,
    })
}

/// Assemble a container from finished chunk payloads. The lead bytes of the
/// data chunk are added here.
pub(crate) fn build_container(data: &[u8], fixup: &[u8], extra: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&RIFF_TAG);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&FORM_EBX);

    push_chunk(&mut out, CHUNK_DATA, &[&[0u8; DATA_LEAD_PAD], data]);
    push_chunk(&mut out, CHUNK_FIXUP, &[fixup]);
    push_chunk(&mut out, CHUNK_EXTRA, &[extra]);

    let total = (out.len() - 8) as u32;
    out[4..8].copy_from_slice(&total.to_le_bytes());
    out
}

fn push_chunk(out: &mut Vec<u8>, tag: [u8; 4], parts: &[&[u8]]) {
    out.extend_from_slice(&tag);
    let len: usize = parts.iter().map(|part| part.len()).sum();
    out.extend_from_slice(&(len as u32).to_le_bytes());
    for part in parts {
        out.extend_from_slice(part);
    }
    pad_to(out, SECTION_ALIGN);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_layout_and_parse() {
        let data = vec![0xAAu8; 20];
        let fixup = vec![0xBBu8; 7];
        let extra = vec![0xCCu8; 8];
        let file = build_container(&data, &fixup, &extra);

        assert_eq!(&file[0..4], b"RIFF");
        assert_eq!(
            u32::from_le_bytes([file[4], file[5], file[6], file[7]]) as usize,
            file.len() - 8
        );
        assert_eq!(&file[8..12], b"EBX\0");
        assert_eq!(&file[12..16], b"EBXD");
        // lead bytes land the data section at file offset 32
        assert_eq!(&file[32..52], &data[..]);

        let chunks = parse_container(&file).expect("parse");
        assert_eq!(chunks.data, &data[..]);
        assert_eq!(chunks.fixup, &fixup[..]);
        assert_eq!(chunks.extra, Some(&extra[..]));
    }

    #[test]
    fn test_parse_skips_unknown_chunks() {
        let file = build_container(&[1, 2, 3], &[9], &[]);
        let mut patched = file.clone();
        // rename the EBXX chunk to something unknown
        let extra_at = patched
            .windows(4)
            .position(|w| w == b"EBXX")
            .expect("extra chunk");
        patched[extra_at..extra_at + 4].copy_from_slice(b"JUNK");

        let chunks = parse_container(&patched).expect("parse");
        assert_eq!(chunks.data, &[1, 2, 3]);
        assert_eq!(chunks.extra, None);
    }

    #[test]
    fn test_parse_rejects_bad_tags() {
        assert!(parse_container(b"WAVEfmt ").is_err());
        let mut file = build_container(&[0; 4], &[0; 4], &[]);
        file[8..12].copy_from_slice(b"WAVE");
        assert!(parse_container(&file).is_err());
    }
}
