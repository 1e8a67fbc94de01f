use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::SvnError;

const ZLIB_MIN_COMPRESS_SIZE: usize = 512;

/// Largest source or target view a single delta window may cover.
pub(crate) const DELTA_WINDOW_MAX: usize = 64 * 1024;

/// The svndiff container version used for content chunks.
///
/// V0 is uncompressed, V1 compresses window sections with zlib, V2 with lz4.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SvndiffVersion {
    V0 = 0,
    V1 = 1,
    V2 = 2,
}

impl SvndiffVersion {
    pub(crate) fn header(self) -> [u8; 4] {
        match self {
            Self::V0 => *b"SVN\0",
            Self::V1 => *b"SVN\x01",
            Self::V2 => *b"SVN\x02",
        }
    }
}

/// Encodes `contents` as a self-contained svndiff stream with no source view.
pub(crate) fn encode_fulltext_with_options(
    version: SvndiffVersion,
    contents: &[u8],
    zlib_level: u32,
    window_size: usize,
) -> Result<Vec<u8>, SvnError> {
    let window_size = window_size.max(1);

    let mut out = Vec::new();
    out.extend_from_slice(&version.header());

    for chunk in contents.chunks(window_size) {
        encode_insertion_window(version, chunk, zlib_level, &mut out)?;
    }

    if contents.is_empty() {
        // A zero-length file still needs at least one window.
        encode_insertion_window(version, &[], zlib_level, &mut out)?;
    }

    Ok(out)
}

/// Encodes `target` as a svndiff stream against `base`.
///
/// The delta is a single window built from the common prefix and suffix of
/// the two buffers: copy the shared head from the source view, insert the
/// differing middle, copy the shared tail. Contents too large for one window,
/// or an empty base, fall back to a fulltext stream.
pub(crate) fn encode_delta_with_options(
    version: SvndiffVersion,
    base: &[u8],
    target: &[u8],
    zlib_level: u32,
    window_size: usize,
) -> Result<Vec<u8>, SvnError> {
    if base.is_empty() || base.len() > DELTA_WINDOW_MAX || target.len() > DELTA_WINDOW_MAX {
        return encode_fulltext_with_options(version, target, zlib_level, window_size);
    }

    let prefix = base
        .iter()
        .zip(target)
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = base[prefix..]
        .iter()
        .rev()
        .zip(target[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let middle = &target[prefix..target.len() - suffix];

    let mut instructions = Vec::new();
    if prefix > 0 {
        encode_copy_instruction(0, prefix, &mut instructions);
    }
    if !middle.is_empty() {
        encode_new_instruction(middle.len(), &mut instructions);
    }
    if suffix > 0 {
        encode_copy_instruction(base.len() - suffix, suffix, &mut instructions);
    }
    let uses_source = prefix > 0 || suffix > 0;
    if instructions.is_empty() {
        encode_new_instruction(0, &mut instructions);
    }

    let (instructions_wire, newdata_wire) = match version {
        SvndiffVersion::V0 => (instructions, middle.to_vec()),
        SvndiffVersion::V1 => (
            compress_zlib(&instructions, zlib_level)?,
            compress_zlib(middle, zlib_level)?,
        ),
        SvndiffVersion::V2 => (compress_lz4(&instructions)?, compress_lz4(middle)?),
    };

    let mut out = Vec::new();
    out.extend_from_slice(&version.header());
    encode_uint(0, &mut out); // sview_offset
    encode_uint(if uses_source { base.len() as u64 } else { 0 }, &mut out); // sview_len
    encode_uint(target.len() as u64, &mut out); // tview_len
    encode_uint(instructions_wire.len() as u64, &mut out); // instructions len (wire)
    encode_uint(newdata_wire.len() as u64, &mut out); // newdata len (wire)
    out.extend_from_slice(&instructions_wire);
    out.extend_from_slice(&newdata_wire);
    Ok(out)
}

pub(crate) fn encode_insertion_window(
    version: SvndiffVersion,
    new_data: &[u8],
    zlib_level: u32,
    out: &mut Vec<u8>,
) -> Result<(), SvnError> {
    let mut instructions = Vec::new();
    encode_new_instruction(new_data.len(), &mut instructions);

    let (instructions_wire, newdata_wire) = match version {
        SvndiffVersion::V0 => (instructions, new_data.to_vec()),
        SvndiffVersion::V1 => (
            compress_zlib(&instructions, zlib_level)?,
            compress_zlib(new_data, zlib_level)?,
        ),
        SvndiffVersion::V2 => (compress_lz4(&instructions)?, compress_lz4(new_data)?),
    };

    encode_uint(0, out); // sview_offset
    encode_uint(0, out); // sview_len
    encode_uint(new_data.len() as u64, out); // tview_len
    encode_uint(instructions_wire.len() as u64, out); // instructions len (wire)
    encode_uint(newdata_wire.len() as u64, out); // newdata len (wire)

    out.extend_from_slice(&instructions_wire);
    out.extend_from_slice(&newdata_wire);
    Ok(())
}

fn encode_new_instruction(len: usize, out: &mut Vec<u8>) {
    let len = len as u64;
    if (len >> 6) == 0 {
        out.push((0x2 << 6) | (len as u8));
    } else {
        out.push((0x2 << 6) as u8);
        encode_uint(len, out);
    }
}

/// Copy-from-source-view, opcode 0, offset trailing the length.
fn encode_copy_instruction(offset: usize, len: usize, out: &mut Vec<u8>) {
    let len = len as u64;
    if (len >> 6) == 0 {
        out.push(len as u8);
    } else {
        out.push(0);
        encode_uint(len, out);
    }
    encode_uint(offset as u64, out);
}

fn encode_uint(val: u64, out: &mut Vec<u8>) {
    let mut v = val >> 7;
    let mut n = 1u32;
    while v > 0 {
        v >>= 7;
        n += 1;
    }

    while n > 1 {
        n -= 1;
        out.push((((val >> (n * 7)) | 0x80) & 0xff) as u8);
    }
    out.push((val & 0x7f) as u8);
}

fn compress_zlib(data: &[u8], zlib_level: u32) -> Result<Vec<u8>, SvnError> {
    let mut out = Vec::new();
    encode_uint(data.len() as u64, &mut out);

    if data.len() < ZLIB_MIN_COMPRESS_SIZE || zlib_level == 0 {
        out.extend_from_slice(data);
        return Ok(out);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(zlib_level));
    encoder
        .write_all(data)
        .map_err(|err| SvnError::Protocol(format!("zlib encode failed: {err}")))?;
    let compressed = encoder
        .finish()
        .map_err(|err| SvnError::Protocol(format!("zlib finish failed: {err}")))?;

    if compressed.len() >= data.len() {
        out.extend_from_slice(data);
    } else {
        out.extend_from_slice(&compressed);
    }
    Ok(out)
}

fn compress_lz4(data: &[u8]) -> Result<Vec<u8>, SvnError> {
    let mut out = Vec::new();
    encode_uint(data.len() as u64, &mut out);

    let compressed = lz4_flex::compress(data);
    if compressed.len() >= data.len() {
        out.extend_from_slice(data);
    } else {
        out.extend_from_slice(&compressed);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::io::Read;

    use super::*;

    fn decode_uint(mut input: &[u8]) -> Option<(u64, &[u8])> {
        let mut val = 0u64;
        loop {
            let (&b, rest) = input.split_first()?;
            input = rest;
            val = val.checked_shl(7)?.checked_add(u64::from(b & 0x7f))?;
            if (b & 0x80) == 0 {
                return Some((val, input));
            }
        }
    }

    fn decode_zlib_section(input: &[u8]) -> Vec<u8> {
        let (orig_len, rest) = decode_uint(input).unwrap();
        let orig_len = orig_len as usize;
        if rest.len() == orig_len {
            return rest.to_vec();
        }
        let mut decoder = flate2::read::ZlibDecoder::new(rest);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).unwrap();
        out
    }

    fn decode_lz4_section(input: &[u8]) -> Vec<u8> {
        let (orig_len, rest) = decode_uint(input).unwrap();
        let orig_len = orig_len as usize;
        if rest.len() == orig_len {
            return rest.to_vec();
        }
        lz4_flex::decompress(rest, orig_len).unwrap()
    }

    fn split_single_window(encoded: &[u8]) -> (u64, u64, u64, Vec<u8>, Vec<u8>) {
        let mut input = encoded;
        let (sview_offset, rest) = decode_uint(input).unwrap();
        input = rest;
        let (sview_len, rest) = decode_uint(input).unwrap();
        input = rest;
        let (tview_len, rest) = decode_uint(input).unwrap();
        input = rest;
        let (ins_len, rest) = decode_uint(input).unwrap();
        input = rest;
        let (new_len, rest) = decode_uint(input).unwrap();
        input = rest;

        let ins_len = ins_len as usize;
        let new_len = new_len as usize;
        let instructions = input[..ins_len].to_vec();
        let newdata = input[ins_len..][..new_len].to_vec();
        (sview_offset, sview_len, tview_len, instructions, newdata)
    }

    /// Applies one window's instructions against a source view.
    fn apply(base: &[u8], mut instructions: &[u8], mut newdata: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some((&op, rest)) = instructions.split_first() {
            instructions = rest;
            let mut len = u64::from(op & 0x3f);
            if len == 0 {
                let (l, rest) = decode_uint(instructions).unwrap();
                instructions = rest;
                len = l;
            }
            let len = len as usize;
            match op >> 6 {
                0 => {
                    let (offset, rest) = decode_uint(instructions).unwrap();
                    instructions = rest;
                    out.extend_from_slice(&base[offset as usize..][..len]);
                }
                2 => {
                    out.extend_from_slice(&newdata[..len]);
                    newdata = &newdata[len..];
                }
                op => panic!("unexpected opcode {op}"),
            }
        }
        out
    }

    #[test]
    fn svndiff_v0_fulltext_small_matches_known_bytes() {
        let bytes = encode_fulltext_with_options(SvndiffVersion::V0, b"abc", 0, 64).unwrap();
        assert_eq!(
            bytes,
            [
                b'S',
                b'V',
                b'N',
                0,        // header
                0,        // sview_offset
                0,        // sview_len
                3,        // tview_len
                1,        // instructions_len
                3,        // newdata_len
                0x80 | 3, // insert 3 bytes
                b'a',
                b'b',
                b'c',
            ]
        );
    }

    #[test]
    fn svndiff_v1_small_roundtrips_sections() {
        let bytes = encode_fulltext_with_options(SvndiffVersion::V1, b"abc", 5, 64).unwrap();
        assert_eq!(&bytes[..4], b"SVN\x01");

        let (sview_offset, sview_len, tview_len, instructions_wire, newdata_wire) =
            split_single_window(&bytes[4..]);
        assert_eq!((sview_offset, sview_len, tview_len), (0, 0, 3));

        let instructions = decode_zlib_section(&instructions_wire);
        let newdata = decode_zlib_section(&newdata_wire);
        assert_eq!(instructions, vec![0x80 | 3]);
        assert_eq!(newdata, b"abc");
    }

    #[test]
    fn svndiff_v2_small_roundtrips_sections() {
        let bytes = encode_fulltext_with_options(SvndiffVersion::V2, b"abc", 5, 64).unwrap();
        assert_eq!(&bytes[..4], b"SVN\x02");

        let (sview_offset, sview_len, tview_len, instructions_wire, newdata_wire) =
            split_single_window(&bytes[4..]);
        assert_eq!((sview_offset, sview_len, tview_len), (0, 0, 3));

        let instructions = decode_lz4_section(&instructions_wire);
        let newdata = decode_lz4_section(&newdata_wire);
        assert_eq!(instructions, vec![0x80 | 3]);
        assert_eq!(newdata, b"abc");
    }

    #[test]
    fn svndiff_v1_large_roundtrips_and_compresses_newdata() {
        let contents = vec![0u8; 4096];
        let bytes =
            encode_fulltext_with_options(SvndiffVersion::V1, &contents, 5, 16 * 1024).unwrap();
        assert_eq!(&bytes[..4], b"SVN\x01");

        let (_sview_offset, _sview_len, tview_len, _instructions_wire, newdata_wire) =
            split_single_window(&bytes[4..]);
        assert_eq!(tview_len as usize, contents.len());

        let (orig_len, rest) = decode_uint(&newdata_wire).unwrap();
        assert_eq!(orig_len as usize, contents.len());
        assert!(rest.len() < contents.len());

        let decoded = decode_zlib_section(&newdata_wire);
        assert_eq!(decoded, contents);
    }

    #[test]
    fn svndiff_v0_fulltext_empty_still_emits_a_window() {
        let bytes = encode_fulltext_with_options(SvndiffVersion::V0, b"", 0, 64).unwrap();
        assert_eq!(
            bytes,
            [
                b'S', b'V', b'N', 0, // header
                0, 0, 0,    // sview_offset/sview_len/tview_len
                1,    // instructions_len
                0,    // newdata_len
                0x80, // insert 0 bytes (length in low bits)
            ]
        );
    }

    #[test]
    fn delta_copies_shared_prefix_and_suffix() {
        let base = b"hello world";
        let target = b"hello brave world";
        let bytes =
            encode_delta_with_options(SvndiffVersion::V0, base, target, 0, 16 * 1024).unwrap();
        assert_eq!(&bytes[..4], b"SVN\0");

        let (sview_offset, sview_len, tview_len, instructions, newdata) =
            split_single_window(&bytes[4..]);
        assert_eq!(sview_offset, 0);
        assert_eq!(sview_len as usize, base.len());
        assert_eq!(tview_len as usize, target.len());
        // copy(0, 6) "hello ", insert "brave ", copy(6, 5) "world".
        assert_eq!(instructions, vec![6, 0, 0x80 | 6, 5, 6]);
        assert_eq!(newdata, b"brave ");

        assert_eq!(apply(base, &instructions, &newdata), target);
    }

    #[test]
    fn delta_against_identical_base_carries_no_newdata() {
        let base = b"same bytes";
        let bytes =
            encode_delta_with_options(SvndiffVersion::V0, base, base, 0, 16 * 1024).unwrap();

        let (_, sview_len, tview_len, instructions, newdata) = split_single_window(&bytes[4..]);
        assert_eq!(sview_len as usize, base.len());
        assert_eq!(tview_len as usize, base.len());
        assert!(newdata.is_empty());
        assert_eq!(apply(base, &instructions, &newdata), base);
    }

    #[test]
    fn delta_to_empty_target_is_an_empty_insert() {
        let bytes =
            encode_delta_with_options(SvndiffVersion::V0, b"gone", b"", 0, 16 * 1024).unwrap();
        let (_, sview_len, tview_len, instructions, newdata) = split_single_window(&bytes[4..]);
        assert_eq!(sview_len, 0);
        assert_eq!(tview_len, 0);
        assert_eq!(instructions, vec![0x80]);
        assert!(newdata.is_empty());
    }

    #[test]
    fn delta_with_empty_base_falls_back_to_fulltext() {
        let bytes =
            encode_delta_with_options(SvndiffVersion::V0, b"", b"abc", 0, 64).unwrap();
        assert_eq!(
            bytes,
            encode_fulltext_with_options(SvndiffVersion::V0, b"abc", 0, 64).unwrap()
        );
    }

    #[test]
    fn delta_past_the_window_limit_falls_back_to_fulltext() {
        let base = vec![1u8; DELTA_WINDOW_MAX + 1];
        let target = vec![1u8; 64];
        let bytes =
            encode_delta_with_options(SvndiffVersion::V0, &base, &target, 0, 16 * 1024).unwrap();
        assert_eq!(
            bytes,
            encode_fulltext_with_options(SvndiffVersion::V0, &target, 0, 16 * 1024).unwrap()
        );
    }

    #[test]
    fn delta_rewrites_disjoint_content_as_a_plain_insert() {
        let bytes =
            encode_delta_with_options(SvndiffVersion::V0, b"aaaa", b"bbbb", 0, 16 * 1024).unwrap();
        let (_, sview_len, tview_len, instructions, newdata) = split_single_window(&bytes[4..]);
        assert_eq!(sview_len, 0);
        assert_eq!(tview_len, 4);
        assert_eq!(instructions, vec![0x80 | 4]);
        assert_eq!(newdata, b"bbbb");
        assert_eq!(apply(b"aaaa", &instructions, &newdata), b"bbbb");
    }

    #[test]
    fn delta_v1_sections_roundtrip() {
        let base: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        let mut target = base.clone();
        target.splice(1000..1000, b"inserted run".iter().copied());
        let bytes =
            encode_delta_with_options(SvndiffVersion::V1, &base, &target, 5, 16 * 1024).unwrap();
        assert_eq!(&bytes[..4], b"SVN\x01");

        let (_, sview_len, tview_len, instructions_wire, newdata_wire) =
            split_single_window(&bytes[4..]);
        assert_eq!(sview_len as usize, base.len());
        assert_eq!(tview_len as usize, target.len());

        let instructions = decode_zlib_section(&instructions_wire);
        let newdata = decode_zlib_section(&newdata_wire);
        assert_eq!(apply(&base, &instructions, &newdata), target);
    }
}
