use crate::error::DecodeError;

/// Sentinel for bytes outside the alphabet.
const INVALID: i8 = -1;

/// Build a 256-entry byte → sextet table at compile time.
/// The two variable slots are the 62nd and 63rd alphabet characters
/// (`+`/`/` standard, `-`/`_` URL-safe).
const fn build_table(c62: u8, c63: u8) -> [i8; 256] {
    let mut table = [INVALID; 256];
    let mut i: u8 = 0;
    while i < 26 {
        table[(b'A' + i) as usize] = i as i8;
        table[(b'a' + i) as usize] = (26 + i) as i8;
        i += 1;
    }
    let mut d: u8 = 0;
    while d < 10 {
        table[(b'0' + d) as usize] = (52 + d) as i8;
        d += 1;
    }
    table[c62 as usize] = 62;
    table[c63 as usize] = 63;
    table
}

static STANDARD_TABLE: [i8; 256] = build_table(b'+', b'/');
static URL_SAFE_TABLE: [i8; 256] = build_table(b'-', b'_');

/// Base64 alphabet variant. Only the two RFC 4648 alphabets are supported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Alphabet {
    /// `A–Z a–z 0–9 + /` with `=` padding.
    #[default]
    Standard,
    /// `A–Z a–z 0–9 - _`, safe in URLs and filenames.
    UrlSafe,
}

impl Alphabet {
    /// Byte → sextet lookup table; `INVALID` (-1) marks non-members.
    #[inline]
    pub(crate) fn table(self) -> &'static [i8; 256] {
        match self {
            Alphabet::Standard => &STANDARD_TABLE,
            Alphabet::UrlSafe => &URL_SAFE_TABLE,
        }
    }

    /// Check membership of a byte in this alphabet (padding excluded).
    #[inline]
    pub fn contains(self, b: u8) -> bool {
        self.table()[b as usize] >= 0
    }
}

/// What to do when the stripped payload length is not a multiple of 4.
/// Repair pads with `=` up to the next multiple of 4; it is an explicit
/// opt-in because silently repairing untrusted input hides corruption.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PadPolicy {
    #[default]
    Strict,
    Repair,
}

/// A validated payload: alphabet-checked characters with padding
/// normalized so the total length is a multiple of 4.
#[derive(Debug, Clone)]
pub struct CleanPayload {
    chars: Vec<u8>,
    pad: usize,
    alphabet: Alphabet,
}

impl CleanPayload {
    /// The normalized characters, including trailing `=` padding.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.chars
    }

    /// Total character count; always a multiple of 4.
    #[inline]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Number of trailing `=` characters (0, 1 or 2).
    #[inline]
    pub fn pad_len(&self) -> usize {
        self.pad
    }

    /// Exact decoded size in bytes: 3 per 4-char group, minus padding.
    #[inline]
    pub fn decoded_len(&self) -> usize {
        self.chars.len() / 4 * 3 - self.pad
    }

    #[inline]
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }
}

/// ASCII whitespace, stripped unconditionally (common tool leniency).
#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Validate and normalize a raw payload.
///
/// Whitespace is always stripped; any other byte outside the alphabet
/// fails with `InvalidCharacter` at its offset in `raw`. Up to two `=`
/// are accepted at the end only; interior padding is rejected at the
/// offset of the first character following it. A stripped length that is
/// not a multiple of 4 fails with `InvalidLength` unless `PadPolicy::
/// Repair` can pad it out (a remainder of 1 is unrepairable: a lone
/// trailing character carries fewer than 8 bits).
pub fn validate(
    raw: &[u8],
    alphabet: Alphabet,
    policy: PadPolicy,
) -> Result<CleanPayload, DecodeError> {
    let table = alphabet.table();
    let mut chars = Vec::with_capacity(raw.len());
    let mut pad = 0usize;

    for (offset, &b) in raw.iter().enumerate() {
        if is_whitespace(b) {
            continue;
        }
        if b == b'=' {
            if pad == 2 {
                // A third '=' can never be part of a valid final group.
                return Err(DecodeError::InvalidCharacter { byte: b, offset });
            }
            pad += 1;
            chars.push(b);
            continue;
        }
        if pad > 0 {
            // Interior padding: data after '=' is malformed.
            return Err(DecodeError::InvalidCharacter { byte: b, offset });
        }
        if table[b as usize] < 0 {
            return Err(DecodeError::InvalidCharacter { byte: b, offset });
        }
        chars.push(b);
    }

    let rem = chars.len() % 4;
    if rem != 0 {
        match policy {
            PadPolicy::Strict => {
                return Err(DecodeError::InvalidLength { len: chars.len() });
            }
            PadPolicy::Repair => {
                if rem == 1 {
                    return Err(DecodeError::InvalidLength { len: chars.len() });
                }
                while chars.len() % 4 != 0 {
                    chars.push(b'=');
                    pad += 1;
                }
            }
        }
    }

    // Repair on an already-padded tail (e.g. "A=") can push past 2 pads.
    if pad > 2 {
        return Err(DecodeError::InvalidLength { len: chars.len() });
    }

    Ok(CleanPayload {
        chars,
        pad,
        alphabet,
    })
}
