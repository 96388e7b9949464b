use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::alphabet::{Alphabet, PadPolicy, validate};
use crate::decode::decode_payload;
use crate::error::DecodeError;
use crate::extract::{Extractor, PayloadSpan};

/// Per-run decode options.
#[derive(Clone, Copy, Debug, Default)]
pub struct Options {
    pub alphabet: Alphabet,
    pub padding: PadPolicy,
}

/// Outcome for one discovered payload: bytes written on success, or the
/// failure that stopped it. One result per span, in discovery order.
#[derive(Debug)]
pub struct PayloadResult {
    pub index: usize,
    /// Byte range of the payload in the source document.
    pub range: Range<usize>,
    pub mime: Option<String>,
    pub outcome: Result<u64, DecodeError>,
}

/// Ordered results of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub results: Vec<PayloadResult>,
}

impl RunReport {
    fn no_payload() -> Self {
        RunReport {
            results: vec![PayloadResult {
                index: 0,
                range: 0..0,
                mime: None,
                outcome: Err(DecodeError::NoPayloadFound),
            }],
        }
    }

    /// All discovered payloads decoded successfully.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_ok())
    }

    /// The run found nothing to decode.
    pub fn nothing_found(&self) -> bool {
        self.results.len() == 1
            && matches!(self.results[0].outcome, Err(DecodeError::NoPayloadFound))
    }
}

/// Validate and decode one span. A failure here is local to the span.
fn decode_span(span: &PayloadSpan, opts: Options, out: &mut impl Write) -> Result<u64, DecodeError> {
    let payload = validate(&span.text, opts.alphabet, opts.padding)?;
    decode_payload(&payload, out)
}

/// Run extraction → validation → decode over one source, writing every
/// payload to the shared sink in discovery order. One payload's failure
/// does not abort the rest.
pub fn run_to_sink(
    source: &[u8],
    extractor: &Extractor,
    opts: Options,
    out: &mut impl Write,
) -> RunReport {
    let spans = extractor.extract(source);
    if spans.is_empty() {
        return RunReport::no_payload();
    }

    let results = spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            let outcome = decode_span(&span, opts, out);
            PayloadResult {
                index,
                range: span.range,
                mime: span.mime,
                outcome,
            }
        })
        .collect();

    RunReport { results }
}

/// Output path for payload `index` under `dir`.
pub fn payload_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("payload{:03}.bin", index))
}

fn decode_span_to_file(
    span: &PayloadSpan,
    opts: Options,
    path: &Path,
) -> Result<u64, DecodeError> {
    let file = File::create(path).map_err(DecodeError::SinkWrite)?;
    let mut out = BufWriter::new(file);
    let n = decode_span(span, opts, &mut out)?;
    out.flush().map_err(DecodeError::SinkWrite)?;
    Ok(n)
}

/// Run the pipeline writing one `payloadNNN.bin` file per span under
/// `dir`. Spans are independent and read-only over the source, so the
/// parallel mode hands each one to a rayon worker; results still come
/// back in discovery order.
pub fn run_to_dir(
    source: &[u8],
    extractor: &Extractor,
    opts: Options,
    dir: &Path,
    parallel: bool,
) -> RunReport {
    let spans = extractor.extract(source);
    if spans.is_empty() {
        return RunReport::no_payload();
    }

    let decode_one = |(index, span): (usize, PayloadSpan)| {
        let outcome = decode_span_to_file(&span, opts, &payload_path(dir, index));
        PayloadResult {
            index,
            range: span.range,
            mime: span.mime,
            outcome,
        }
    };

    let results: Vec<PayloadResult> = if parallel {
        spans.into_par_iter().enumerate().map(decode_one).collect()
    } else {
        spans.into_iter().enumerate().map(decode_one).collect()
    };

    RunReport { results }
}
