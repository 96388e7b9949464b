use std::io::{self, Read, Write};

use base64_simd::AsOut;

use crate::alphabet::{Alphabet, CleanPayload, PadPolicy, is_whitespace};
use crate::error::DecodeError;

/// Staging buffer for decoded bytes before they are flushed to the sink.
/// Multiple of 3 so whole groups never straddle a flush.
const STAGE_SIZE: usize = 24 * 1024;

/// Read chunk size for the raw streaming decode path.
const STREAM_CHUNK: usize = 64 * 1024;

/// Encode chunk: 4MB aligned to 3 bytes so chunk boundaries never split
/// a group.
const ENCODE_CHUNK: usize = 4 * 1024 * 1024 - (4 * 1024 * 1024 % 3);

#[inline]
fn engine(alphabet: Alphabet) -> &'static base64_simd::Base64 {
    match alphabet {
        Alphabet::Standard => &base64_simd::STANDARD,
        Alphabet::UrlSafe => &base64_simd::URL_SAFE,
    }
}

/// Incremental base64 decoder with a fixed memory footprint.
///
/// The only state carried between `push` calls is the partial group
/// accumulator (at most 4 sextets) and the bounded staging buffer, so
/// arbitrarily large inputs decode in constant memory. One decoder
/// serves exactly one payload; state never leaks across payloads.
pub struct StreamDecoder {
    table: &'static [i8; 256],
    /// Up to four 6-bit values packed big-endian.
    acc: u32,
    /// Characters (including '=') in the current group.
    acc_len: usize,
    /// '=' characters seen in the current group.
    pad: usize,
    /// Set once a padded group completes: no further data is legal.
    finished: bool,
    /// Raw bytes consumed, for error offsets.
    offset: usize,
    /// Non-whitespace characters consumed, for length errors.
    chars: usize,
    written: u64,
    stage: Vec<u8>,
}

impl StreamDecoder {
    pub fn new(alphabet: Alphabet) -> Self {
        Self {
            table: alphabet.table(),
            acc: 0,
            acc_len: 0,
            pad: 0,
            finished: false,
            offset: 0,
            chars: 0,
            written: 0,
            stage: Vec::with_capacity(STAGE_SIZE),
        }
    }

    /// Feed input characters, writing decoded bytes to `out` as groups
    /// complete. Whitespace is skipped. Characters are re-checked against
    /// the alphabet even for pre-validated payloads.
    pub fn push(&mut self, input: &[u8], out: &mut impl Write) -> Result<(), DecodeError> {
        for &b in input {
            let offset = self.offset;
            self.offset += 1;

            if is_whitespace(b) {
                continue;
            }
            if self.finished {
                // Data after a padded final group.
                return Err(DecodeError::InvalidCharacter { byte: b, offset });
            }
            self.chars += 1;

            if b == b'=' {
                // '=' is only legal as the 3rd or 4th character of a group.
                if self.acc_len < 2 {
                    return Err(DecodeError::InvalidCharacter { byte: b, offset });
                }
                self.pad += 1;
                self.acc <<= 6;
                self.acc_len += 1;
            } else {
                if self.pad > 0 {
                    // Data following '=' inside a group.
                    return Err(DecodeError::InvalidCharacter { byte: b, offset });
                }
                let sextet = self.table[b as usize];
                if sextet < 0 {
                    return Err(DecodeError::InvalidCharacter { byte: b, offset });
                }
                self.acc = (self.acc << 6) | sextet as u32;
                self.acc_len += 1;
            }

            if self.acc_len == 4 {
                let n = 3 - self.pad;
                self.emit(n, out)?;
                if self.pad > 0 {
                    self.finished = true;
                }
                self.acc = 0;
                self.acc_len = 0;
                self.pad = 0;
            }
        }
        Ok(())
    }

    /// Finalize the decode: handle a trailing partial group per `policy`,
    /// flush the staging buffer, and return the total bytes written.
    pub fn finish(mut self, policy: PadPolicy, out: &mut impl Write) -> Result<u64, DecodeError> {
        if self.acc_len > 0 {
            match policy {
                PadPolicy::Strict => {
                    return Err(DecodeError::InvalidLength { len: self.chars });
                }
                PadPolicy::Repair => {
                    let data = self.acc_len - self.pad;
                    if data < 2 {
                        return Err(DecodeError::InvalidLength { len: self.chars });
                    }
                    self.acc <<= 6 * (4 - self.acc_len) as u32;
                    self.acc_len = 4;
                    self.emit(data - 1, out)?;
                }
            }
        }
        self.flush(out)?;
        Ok(self.written)
    }

    /// Stage the top `n` bytes of a complete group, flushing when full.
    fn emit(&mut self, n: usize, out: &mut impl Write) -> Result<(), DecodeError> {
        if self.stage.len() + 3 > STAGE_SIZE {
            self.flush(out)?;
        }
        let bytes = [
            (self.acc >> 16) as u8,
            (self.acc >> 8) as u8,
            self.acc as u8,
        ];
        self.stage.extend_from_slice(&bytes[..n]);
        Ok(())
    }

    fn flush(&mut self, out: &mut impl Write) -> Result<(), DecodeError> {
        if !self.stage.is_empty() {
            out.write_all(&self.stage).map_err(DecodeError::SinkWrite)?;
            self.written += self.stage.len() as u64;
            self.stage.clear();
        }
        Ok(())
    }
}

/// Decode a validated payload to `out`, returning the bytes written.
/// Validation already normalized padding, so strict finalization applies.
pub fn decode_payload(payload: &CleanPayload, out: &mut impl Write) -> Result<u64, DecodeError> {
    let mut decoder = StreamDecoder::new(payload.alphabet());
    decoder.push(payload.as_bytes(), out)?;
    decoder.finish(PadPolicy::Strict, out)
}

/// Stream-decode raw base64 from a reader in fixed-size chunks.
/// Validation happens inline, so memory stays bounded regardless of the
/// total input size (the large-file case, no external `split` needed).
pub fn decode_stream(
    reader: &mut impl Read,
    alphabet: Alphabet,
    policy: PadPolicy,
    out: &mut impl Write,
) -> Result<u64, DecodeError> {
    let mut decoder = StreamDecoder::new(alphabet);
    let mut buf = vec![0u8; STREAM_CHUNK];

    loop {
        let n = read_full(reader, &mut buf).map_err(DecodeError::SourceRead)?;
        if n == 0 {
            break;
        }
        decoder.push(&buf[..n], out)?;
    }
    decoder.finish(policy, out)
}

/// Encode data and write to output with optional line wrapping.
/// Uses the SIMD engine in 4MB chunks for bounded memory.
pub fn encode_to_writer(
    data: &[u8],
    alphabet: Alphabet,
    wrap_col: usize,
    out: &mut impl Write,
) -> io::Result<()> {
    if data.is_empty() {
        return Ok(());
    }

    let engine = engine(alphabet);
    let enc_max = engine.encoded_length(ENCODE_CHUNK);
    let mut encode_buf = vec![0u8; enc_max];
    let mut col = 0usize;

    for chunk in data.chunks(ENCODE_CHUNK) {
        let enc_len = engine.encoded_length(chunk.len());
        let encoded = engine.encode(chunk, encode_buf[..enc_len].as_out());

        if wrap_col == 0 {
            out.write_all(encoded)?;
        } else {
            write_wrapped(encoded, wrap_col, &mut col, out)?;
        }
    }

    if wrap_col != 0 && col > 0 {
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Stream-encode from a reader to a writer. Reads 3-byte-aligned chunks
/// so no partial group crosses a chunk boundary.
pub fn encode_stream(
    reader: &mut impl Read,
    alphabet: Alphabet,
    wrap_col: usize,
    out: &mut impl Write,
) -> io::Result<()> {
    let engine = engine(alphabet);
    let mut buf = vec![0u8; ENCODE_CHUNK];
    let mut encode_buf = vec![0u8; engine.encoded_length(ENCODE_CHUNK)];
    let mut col = 0usize;
    let mut wrote_any = false;

    loop {
        let n = read_full(reader, &mut buf)?;
        if n == 0 {
            break;
        }
        wrote_any = true;
        let enc_len = engine.encoded_length(n);
        let encoded = engine.encode(&buf[..n], encode_buf[..enc_len].as_out());

        if wrap_col == 0 {
            out.write_all(encoded)?;
        } else {
            write_wrapped(encoded, wrap_col, &mut col, out)?;
        }
    }

    if wrap_col != 0 && wrote_any && col > 0 {
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Write encoded text with newlines every `wrap_col` columns, tracking
/// the column position across calls.
fn write_wrapped(
    data: &[u8],
    wrap_col: usize,
    col: &mut usize,
    out: &mut impl Write,
) -> io::Result<()> {
    let mut rp = 0;
    while rp < data.len() {
        let space = wrap_col - *col;
        let avail = data.len() - rp;

        if avail <= space {
            out.write_all(&data[rp..])?;
            *col += avail;
            if *col == wrap_col {
                out.write_all(b"\n")?;
                *col = 0;
            }
            break;
        }
        out.write_all(&data[rp..rp + space])?;
        out.write_all(b"\n")?;
        rp += space;
        *col = 0;
    }
    Ok(())
}

/// Read as many bytes as possible into buf, retrying on partial reads.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
