use super::*;
use regex::bytes::Regex;

fn block_extractor(begin: &str, end: Option<&str>) -> Extractor {
    Extractor::DelimitedBlock {
        begin: Regex::new(begin).unwrap(),
        end: end.map(|e| Regex::new(e).unwrap()),
    }
}

// ===== DELIMITED BLOCK =====

#[test]
fn test_block_single() {
    let src = b"BEGIN BASE64\nVGVzdA==\nEND BASE64\n";
    let spans = block_extractor("^BEGIN BASE64$", Some("^END BASE64$")).extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"VGVzdA==");
    assert_eq!(&src[spans[0].range.clone()], b"VGVzdA==");
}

#[test]
fn test_block_joins_interior_lines() {
    let src = b"-----BEGIN-----\nVGhpcyBpcyBh\nIHRlc3Qu\n-----END-----\n";
    let spans = block_extractor("^-----BEGIN", Some("^-----END")).extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"VGhpcyBpcyBhIHRlc3Qu");
}

#[test]
fn test_block_multiple_non_overlapping() {
    let src = b"START\nYWJj\nSTOP\nnoise\nSTART\nZGVm\nSTOP\n";
    let spans = block_extractor("^START$", Some("^STOP$")).extract(src);
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].text, b"YWJj");
    assert_eq!(spans[1].text, b"ZGVm");
}

#[test]
fn test_block_blank_line_terminates_without_end_marker() {
    let src = b"PAYLOAD:\nYWJj\nZGVm\n\ntrailing\n";
    let spans = block_extractor("^PAYLOAD:$", None).extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"YWJjZGVm");
}

#[test]
fn test_block_eof_terminates() {
    let src = b"START\nYWJj";
    let spans = block_extractor("^START$", Some("^STOP$")).extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"YWJj");
}

#[test]
fn test_block_crlf_lines() {
    let src = b"START\r\nVGVzdA==\r\nSTOP\r\n";
    let spans = block_extractor("^START$", Some("^STOP$")).extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"VGVzdA==");
}

#[test]
fn test_block_no_match_yields_no_spans() {
    let spans = block_extractor("^START$", Some("^STOP$")).extract(b"nothing here\n");
    assert!(spans.is_empty());
}

#[test]
fn test_block_empty_interior_is_skipped() {
    let spans = block_extractor("^START$", Some("^STOP$")).extract(b"START\nSTOP\n");
    assert!(spans.is_empty());
}

// ===== DATA URI =====

#[test]
fn test_data_uri_in_html_attribute() {
    let src = br#"<img src="data:image/png;base64,iVBORw0KGgo=">"#;
    let spans = Extractor::DataUri.extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].mime.as_deref(), Some("image/png"));
    assert_eq!(spans[0].text, b"iVBORw0KGgo=");
    assert_eq!(&src[spans[0].range.clone()], b"iVBORw0KGgo=");
}

#[test]
fn test_data_uri_multiple() {
    let src = b"a data:text/plain;base64,YWJj b data:application/octet-stream;base64,ZGVm c";
    let spans = Extractor::DataUri.extract(src);
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].mime.as_deref(), Some("text/plain"));
    assert_eq!(spans[0].text, b"YWJj");
    assert_eq!(spans[1].mime.as_deref(), Some("application/octet-stream"));
    assert_eq!(spans[1].text, b"ZGVm");
}

#[test]
fn test_data_uri_with_charset_parameter() {
    let src = b"data:text/plain;charset=utf-8;base64,SGVsbG8=";
    let spans = Extractor::DataUri.extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].mime.as_deref(), Some("text/plain"));
    assert_eq!(spans[0].text, b"SGVsbG8=");
}

#[test]
fn test_data_uri_runs_to_eof() {
    let spans = Extractor::DataUri.extract(b"data:image/gif;base64,R0lGODlh");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"R0lGODlh");
}

#[test]
fn test_data_uri_non_base64_uri_ignored() {
    // Percent-encoded data URI carries no ";base64," marker.
    let spans = Extractor::DataUri.extract(b"data:text/plain,hello%20world");
    assert!(spans.is_empty());
}

// ===== STRUCTURED FIELD =====

fn json_extractor(path: &str) -> Extractor {
    Extractor::StructuredField {
        path: parse_field_path(path).unwrap(),
    }
}

#[test]
fn test_json_top_level_field() {
    let src = br#"{"name": "report", "payload": "VGVzdA=="}"#;
    let spans = json_extractor("payload").extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"VGVzdA==");
    assert_eq!(&src[spans[0].range.clone()], b"VGVzdA==");
}

#[test]
fn test_json_nested_path() {
    let src = br#"{"outer": {"inner": {"data": "YWJj"}}, "data": "ignored"}"#;
    let spans = json_extractor("outer.inner.data").extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"YWJj");
}

#[test]
fn test_json_array_index() {
    let src = br#"{"items": [{"blob": "YWJj"}, {"blob": "ZGVm"}]}"#;
    let spans = json_extractor("items.1.blob").extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"ZGVm");
}

#[test]
fn test_json_array_target_yields_span_per_element() {
    let src = br#"{"chunks": ["YWJj", "ZGVm", "Z2hp"]}"#;
    let spans = json_extractor("chunks").extract(src);
    assert_eq!(spans.len(), 3);
    assert_eq!(spans[0].text, b"YWJj");
    assert_eq!(spans[2].text, b"Z2hp");
}

#[test]
fn test_json_escaped_slash_resolved() {
    // jq-style recipes rely on "\/" unescaping before decode.
    let src = br#"{"payload": "YWJ\/j"}"#;
    let spans = json_extractor("payload").extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"YWJ/j");
}

#[test]
fn test_json_missing_field_yields_no_spans() {
    let spans = json_extractor("absent").extract(br#"{"payload": "YWJj"}"#);
    assert!(spans.is_empty());
}

#[test]
fn test_json_non_string_target_yields_no_spans() {
    let spans = json_extractor("payload").extract(br#"{"payload": 42}"#);
    assert!(spans.is_empty());
}

#[test]
fn test_json_malformed_input_yields_no_spans() {
    let spans = json_extractor("payload").extract(br#"{"payload": "#);
    assert!(spans.is_empty());
}

#[test]
fn test_json_skips_values_off_the_path() {
    // Off-path values with tricky content must not confuse the scanner.
    let src = br#"{"decoy": "pay}load\"", "nums": [1, {"x": []}], "payload": "Zm9v"}"#;
    let spans = json_extractor("payload").extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"Zm9v");
}

#[test]
fn test_parse_field_path() {
    assert_eq!(
        parse_field_path("a.0.b").unwrap(),
        vec![
            FieldSegment::Key("a".to_string()),
            FieldSegment::Index(0),
            FieldSegment::Key("b".to_string()),
        ]
    );
    assert_eq!(
        parse_field_path(".payload").unwrap(),
        vec![FieldSegment::Key("payload".to_string())]
    );
    assert!(parse_field_path("").is_err());
    assert!(parse_field_path("a..b").is_err());
}

// ===== MIME HEADER BLOCK =====

#[test]
fn test_mime_basic_part() {
    let src = b"\
Content-Type: application/octet-stream\n\
Content-Transfer-Encoding: base64\n\
\n\
VGhpcyBpcyBh\n\
IHRlc3Qu\n\
\n\
next part\n";
    let spans = Extractor::MimeHeaderBlock.extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"VGhpcyBpcyBhIHRlc3Qu");
}

#[test]
fn test_mime_header_is_case_insensitive() {
    let src = b"content-transfer-encoding: BASE64\n\nVGVzdA==\n";
    let spans = Extractor::MimeHeaderBlock.extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"VGVzdA==");
}

#[test]
fn test_mime_headers_after_cte_are_not_captured() {
    let src = b"\
Content-Transfer-Encoding: base64\n\
Content-Disposition: attachment\n\
\n\
YWJj\n";
    let spans = Extractor::MimeHeaderBlock.extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"YWJj");
}

#[test]
fn test_mime_boundary_terminates_body() {
    let src = b"\
Content-Transfer-Encoding: base64\n\
\n\
YWJj\n\
ZGVm\n\
--boundary42--\n";
    let spans = Extractor::MimeHeaderBlock.extract(src);
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].text, b"YWJjZGVm");
}

#[test]
fn test_mime_multiple_parts() {
    let src = b"\
Content-Transfer-Encoding: base64\n\
\n\
YWJj\n\
\n\
Content-Transfer-Encoding: base64\n\
\n\
ZGVm\n";
    let spans = Extractor::MimeHeaderBlock.extract(src);
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].text, b"YWJj");
    assert_eq!(spans[1].text, b"ZGVm");
}

#[test]
fn test_mime_other_encodings_ignored() {
    let src = b"Content-Transfer-Encoding: quoted-printable\n\nhello=20world\n";
    assert!(Extractor::MimeHeaderBlock.extract(src).is_empty());
}
