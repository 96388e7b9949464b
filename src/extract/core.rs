use std::ops::Range;

use memchr::{memchr, memchr_iter, memmem};
use regex::bytes::Regex;

use crate::alphabet::is_whitespace;

/// A located candidate payload within a larger document.
///
/// `range` covers the payload's bytes in the source; `text` is the raw
/// payload handed to the validator (interior lines joined, JSON escapes
/// resolved), which may differ from the source slice.
#[derive(Debug, Clone)]
pub struct PayloadSpan {
    pub range: Range<usize>,
    pub text: Vec<u8>,
    /// Mime type captured from a data URI, if any.
    pub mime: Option<String>,
}

/// One segment of a JSON field path: an object key or array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSegment {
    Key(String),
    Index(usize),
}

/// Parse a dot-separated field path ("payload.data.0") into segments.
/// Purely numeric segments address array elements.
pub fn parse_field_path(s: &str) -> Result<Vec<FieldSegment>, String> {
    let s = s.trim().trim_start_matches('.');
    if s.is_empty() {
        return Err("empty field path".to_string());
    }
    let mut path = Vec::new();
    for seg in s.split('.') {
        if seg.is_empty() {
            return Err(format!("empty segment in field path: '{}'", s));
        }
        match seg.parse::<usize>() {
            Ok(i) => path.push(FieldSegment::Index(i)),
            Err(_) => path.push(FieldSegment::Key(seg.to_string())),
        }
    }
    Ok(path)
}

/// Source-format scanner. Each variant is a pure function over the input
/// bytes producing zero or more spans; zero spans is not an error here.
#[derive(Debug)]
pub enum Extractor {
    /// Line scan between a start marker and an end marker. `end: None`
    /// terminates a block at the first blank line (or EOF).
    DelimitedBlock { begin: Regex, end: Option<Regex> },
    /// A string value (or array of strings) addressed by a field path in
    /// a JSON document.
    StructuredField { path: Vec<FieldSegment> },
    /// `data:<mime-type>;base64,` URIs.
    DataUri,
    /// Bodies of MIME parts declaring `Content-Transfer-Encoding: base64`.
    MimeHeaderBlock,
}

impl Extractor {
    /// Scan the source for candidate payloads, in discovery order.
    pub fn extract(&self, source: &[u8]) -> Vec<PayloadSpan> {
        match self {
            Extractor::DelimitedBlock { begin, end } => {
                delimited_blocks(source, begin, end.as_ref())
            }
            Extractor::StructuredField { path } => structured_fields(source, path),
            Extractor::DataUri => data_uris(source),
            Extractor::MimeHeaderBlock => mime_blocks(source),
        }
    }
}

/// Byte ranges of each line (newline excluded), via SIMD memchr.
fn line_ranges(source: &[u8]) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for nl in memchr_iter(b'\n', source) {
        // Tolerate CRLF line endings.
        let end = if nl > start && source[nl - 1] == b'\r' {
            nl - 1
        } else {
            nl
        };
        lines.push(start..end);
        start = nl + 1;
    }
    if start < source.len() {
        lines.push(start..source.len());
    }
    lines
}

#[inline]
fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|&b| is_whitespace(b))
}

/// Join the content of a run of lines into one payload text.
fn join_lines(source: &[u8], lines: &[Range<usize>]) -> Vec<u8> {
    let total: usize = lines.iter().map(|r| r.len()).sum();
    let mut text = Vec::with_capacity(total);
    for r in lines {
        text.extend_from_slice(&source[r.clone()]);
    }
    text
}

fn delimited_blocks(source: &[u8], begin: &Regex, end: Option<&Regex>) -> Vec<PayloadSpan> {
    let lines = line_ranges(source);
    let mut spans = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !begin.is_match(&source[lines[i].clone()]) {
            i += 1;
            continue;
        }

        // Collect interior lines up to the end marker (or blank line, or EOF).
        let body = i + 1;
        let mut j = body;
        let mut saw_end = false;
        while j < lines.len() {
            let line = &source[lines[j].clone()];
            let hit = match end {
                Some(re) => re.is_match(line),
                None => is_blank(line),
            };
            if hit {
                saw_end = true;
                break;
            }
            j += 1;
        }

        if j > body {
            spans.push(PayloadSpan {
                range: lines[body].start..lines[j - 1].end,
                text: join_lines(source, &lines[body..j]),
                mime: None,
            });
        }

        // Resume after the end marker so blocks never overlap.
        i = if saw_end { j + 1 } else { j };
    }
    spans
}

/// Bytes that terminate a data-URI payload: quotes, whitespace, or the
/// attribute/markup delimiters it is commonly embedded in.
#[inline]
fn ends_data_uri(b: u8) -> bool {
    b == b'"' || b == b'\'' || is_whitespace(b)
}

fn data_uris(source: &[u8]) -> Vec<PayloadSpan> {
    const SCHEME: &[u8] = b"data:";
    const MARKER: &[u8] = b";base64,";

    let mut spans = Vec::new();
    let marker = memmem::Finder::new(MARKER);

    for pos in memmem::find_iter(source, SCHEME) {
        let mime_start = pos + SCHEME.len();

        // The ";base64," marker must appear before the URI terminates.
        let Some(rel) = marker.find(&source[mime_start..]) else {
            continue;
        };
        let head = &source[mime_start..mime_start + rel];
        if head.iter().any(|&b| ends_data_uri(b)) {
            continue;
        }

        // Mime type runs to the first parameter separator (e.g. charset).
        let mime_end = match memchr(b';', head) {
            Some(semi) => mime_start + semi,
            None => mime_start + rel,
        };
        let mime = String::from_utf8_lossy(&source[mime_start..mime_end]).into_owned();

        let payload_start = mime_start + rel + MARKER.len();
        let payload_end = source[payload_start..]
            .iter()
            .position(|&b| ends_data_uri(b))
            .map(|n| payload_start + n)
            .unwrap_or(source.len());

        spans.push(PayloadSpan {
            range: payload_start..payload_end,
            text: source[payload_start..payload_end].to_vec(),
            mime: Some(mime),
        });
    }
    spans
}

/// Header line test: `Content-Transfer-Encoding: base64`, case-insensitive.
fn is_cte_base64(line: &[u8]) -> bool {
    const NAME: &[u8] = b"content-transfer-encoding:";
    if line.len() <= NAME.len() || !line[..NAME.len()].eq_ignore_ascii_case(NAME) {
        return false;
    }
    line[NAME.len()..].trim_ascii().eq_ignore_ascii_case(b"base64")
}

fn mime_blocks(source: &[u8]) -> Vec<PayloadSpan> {
    let lines = line_ranges(source);
    let mut spans = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if !is_cte_base64(&source[lines[i].clone()]) {
            i += 1;
            continue;
        }

        // Skip the remaining header lines up to the blank separator;
        // header lines can never decode, the body is the payload.
        let mut j = i + 1;
        while j < lines.len() && !is_blank(&source[lines[j].clone()]) {
            j += 1;
        }
        let body = j + 1;

        // Body runs to the next blank line, a MIME boundary, or EOF.
        let mut k = body;
        while k < lines.len() {
            let line = &source[lines[k].clone()];
            if is_blank(line) || line.starts_with(b"--") {
                break;
            }
            k += 1;
        }

        if k > body && body <= lines.len() {
            spans.push(PayloadSpan {
                range: lines[body].start..lines[k - 1].end,
                text: join_lines(source, &lines[body..k]),
                mime: None,
            });
        }

        i = k;
    }
    spans
}

// ===== Minimal JSON scanner =====
//
// Purpose-built single-pass scanner: walks the document following one
// field path, never materializing values off the path. Not a general
// JSON parser; on malformed input it stops and reports whatever spans
// it found up to that point.

struct JsonScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

fn structured_fields(source: &[u8], path: &[FieldSegment]) -> Vec<PayloadSpan> {
    let mut spans = Vec::new();
    let mut scanner = JsonScanner {
        data: source,
        pos: 0,
    };
    scanner.skip_ws();
    let _ = scanner.descend(path, &mut spans);
    spans
}

impl<'a> JsonScanner<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.data.len() && is_whitespace(self.data[self.pos]) {
            self.pos += 1;
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    #[inline]
    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, b: u8) -> Option<()> {
        self.skip_ws();
        (self.bump()? == b).then_some(())
    }

    /// Follow `path` from the current value; collect string spans at the
    /// target. Returns None on malformed input.
    fn descend(&mut self, path: &[FieldSegment], spans: &mut Vec<PayloadSpan>) -> Option<()> {
        let Some(seg) = path.first() else {
            return self.collect_target(spans);
        };
        self.skip_ws();
        match (seg, self.peek()?) {
            (FieldSegment::Key(want), b'{') => {
                self.bump();
                self.skip_ws();
                if self.peek()? == b'}' {
                    self.bump();
                    return Some(());
                }
                loop {
                    self.skip_ws();
                    let (_, key) = self.parse_string()?;
                    self.expect(b':')?;
                    self.skip_ws();
                    if key == want.as_bytes() {
                        self.descend(&path[1..], spans)?;
                    } else {
                        self.skip_value()?;
                    }
                    self.skip_ws();
                    match self.bump()? {
                        b',' => continue,
                        b'}' => return Some(()),
                        _ => return None,
                    }
                }
            }
            (FieldSegment::Index(want), b'[') => {
                self.bump();
                self.skip_ws();
                if self.peek()? == b']' {
                    self.bump();
                    return Some(());
                }
                let mut idx = 0usize;
                loop {
                    self.skip_ws();
                    if idx == *want {
                        self.descend(&path[1..], spans)?;
                    } else {
                        self.skip_value()?;
                    }
                    idx += 1;
                    self.skip_ws();
                    match self.bump()? {
                        b',' => continue,
                        b']' => return Some(()),
                        _ => return None,
                    }
                }
            }
            // Path does not match the document shape: nothing to collect.
            _ => self.skip_value(),
        }
    }

    /// At the path target: a string yields one span, an array yields one
    /// span per string element; anything else yields nothing.
    fn collect_target(&mut self, spans: &mut Vec<PayloadSpan>) -> Option<()> {
        self.skip_ws();
        match self.peek()? {
            b'"' => {
                let (range, text) = self.parse_string()?;
                spans.push(PayloadSpan {
                    range,
                    text,
                    mime: None,
                });
                Some(())
            }
            b'[' => {
                self.bump();
                self.skip_ws();
                if self.peek()? == b']' {
                    self.bump();
                    return Some(());
                }
                loop {
                    self.skip_ws();
                    if self.peek()? == b'"' {
                        let (range, text) = self.parse_string()?;
                        spans.push(PayloadSpan {
                            range,
                            text,
                            mime: None,
                        });
                    } else {
                        self.skip_value()?;
                    }
                    self.skip_ws();
                    match self.bump()? {
                        b',' => continue,
                        b']' => return Some(()),
                        _ => return None,
                    }
                }
            }
            _ => self.skip_value(),
        }
    }

    /// Parse a string; returns the content range (inside the quotes) and
    /// the unescaped bytes.
    fn parse_string(&mut self) -> Option<(Range<usize>, Vec<u8>)> {
        if self.bump()? != b'"' {
            return None;
        }
        let start = self.pos;
        let mut text = Vec::new();
        loop {
            match self.bump()? {
                b'"' => return Some((start..self.pos - 1, text)),
                b'\\' => match self.bump()? {
                    b'"' => text.push(b'"'),
                    b'\\' => text.push(b'\\'),
                    b'/' => text.push(b'/'),
                    b'b' => text.push(0x08),
                    b'f' => text.push(0x0c),
                    b'n' => text.push(b'\n'),
                    b'r' => text.push(b'\r'),
                    b't' => text.push(b'\t'),
                    b'u' => {
                        let cp = self.parse_hex4()?;
                        // Surrogate halves are left unresolved; they cannot
                        // occur inside a base64 payload and the validator
                        // reports them with an offset.
                        let mut buf = [0u8; 4];
                        let c = char::from_u32(cp as u32).unwrap_or('\u{fffd}');
                        text.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    }
                    _ => return None,
                },
                b => text.push(b),
            }
        }
    }

    fn parse_hex4(&mut self) -> Option<u16> {
        let mut v: u16 = 0;
        for _ in 0..4 {
            let d = (self.bump()? as char).to_digit(16)?;
            v = (v << 4) | d as u16;
        }
        Some(v)
    }

    /// Skip any value without materializing it.
    fn skip_value(&mut self) -> Option<()> {
        self.skip_ws();
        match self.peek()? {
            b'"' => {
                self.parse_string()?;
                Some(())
            }
            b'{' => self.skip_container(b'{', b'}'),
            b'[' => self.skip_container(b'[', b']'),
            _ => {
                // Number, true, false, null: scan to the next delimiter.
                while let Some(b) = self.peek() {
                    if matches!(b, b',' | b'}' | b']') || is_whitespace(b) {
                        break;
                    }
                    self.pos += 1;
                }
                Some(())
            }
        }
    }

    /// Skip a nested container, honoring strings so brackets inside them
    /// don't count.
    fn skip_container(&mut self, open: u8, close: u8) -> Option<()> {
        self.bump();
        let mut depth = 1usize;
        while depth > 0 {
            self.skip_ws();
            match self.peek()? {
                b'"' => {
                    self.parse_string()?;
                }
                b if b == open => {
                    self.bump();
                    depth += 1;
                }
                b if b == close => {
                    self.bump();
                    depth -= 1;
                }
                _ => {
                    self.bump();
                }
            }
        }
        Some(())
    }
}
