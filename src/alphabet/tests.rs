use super::*;
use crate::error::DecodeError;

#[test]
fn test_validate_plain() {
    let p = validate(b"VGVzdA==", Alphabet::Standard, PadPolicy::Strict).unwrap();
    assert_eq!(p.as_bytes(), b"VGVzdA==");
    assert_eq!(p.pad_len(), 2);
    assert_eq!(p.decoded_len(), 4);
}

#[test]
fn test_validate_empty() {
    let p = validate(b"", Alphabet::Standard, PadPolicy::Strict).unwrap();
    assert!(p.is_empty());
    assert_eq!(p.decoded_len(), 0);
}

#[test]
fn test_validate_strips_whitespace() {
    let p = validate(b"VGVz\r\n dA==\n", Alphabet::Standard, PadPolicy::Strict).unwrap();
    assert_eq!(p.as_bytes(), b"VGVzdA==");
}

#[test]
fn test_validate_rejects_bad_character_with_offset() {
    let err = validate(b"VGV!dA==", Alphabet::Standard, PadPolicy::Strict).unwrap_err();
    match err {
        DecodeError::InvalidCharacter { byte, offset } => {
            assert_eq!(byte, b'!');
            assert_eq!(offset, 3);
        }
        other => panic!("expected InvalidCharacter, got {other:?}"),
    }
}

#[test]
fn test_offset_is_relative_to_raw_text() {
    // Whitespace before the bad byte must not shift the reported offset.
    let err = validate(b"VG Vz@A==", Alphabet::Standard, PadPolicy::Strict).unwrap_err();
    match err {
        DecodeError::InvalidCharacter { byte, offset } => {
            assert_eq!(byte, b'@');
            assert_eq!(offset, 5);
        }
        other => panic!("expected InvalidCharacter, got {other:?}"),
    }
}

#[test]
fn test_validate_rejects_interior_padding() {
    let err = validate(b"VG=zdA==", Alphabet::Standard, PadPolicy::Strict).unwrap_err();
    match err {
        DecodeError::InvalidCharacter { byte, offset } => {
            assert_eq!(byte, b'z');
            assert_eq!(offset, 3);
        }
        other => panic!("expected InvalidCharacter, got {other:?}"),
    }
}

#[test]
fn test_validate_rejects_triple_padding() {
    assert!(validate(b"VGVzdA===", Alphabet::Standard, PadPolicy::Strict).is_err());
}

#[test]
fn test_strict_rejects_short_length() {
    let err = validate(b"VGVzdA", Alphabet::Standard, PadPolicy::Strict).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidLength { len: 6 }));
}

#[test]
fn test_repair_pads_to_multiple_of_four() {
    let p = validate(b"VGVzdA", Alphabet::Standard, PadPolicy::Repair).unwrap();
    assert_eq!(p.as_bytes(), b"VGVzdA==");
    assert_eq!(p.pad_len(), 2);
    assert_eq!(p.len() % 4, 0);
}

#[test]
fn test_repair_single_remainder_is_unrepairable() {
    // 4n+1 characters carry less than one whole byte in the tail.
    let err = validate(b"VGVzd", Alphabet::Standard, PadPolicy::Repair).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidLength { .. }));
}

#[test]
fn test_repair_does_not_overpad_existing_tail() {
    // "QQ=" repairs to "QQ==": fine. "Q=" would need three pads: reject.
    let p = validate(b"QQ=", Alphabet::Standard, PadPolicy::Repair).unwrap();
    assert_eq!(p.as_bytes(), b"QQ==");
    assert!(validate(b"Q=", Alphabet::Standard, PadPolicy::Repair).is_err());
}

#[test]
fn test_url_safe_alphabet() {
    assert!(validate(b"a-_b", Alphabet::UrlSafe, PadPolicy::Strict).is_ok());
    // '+' and '/' are not members of the URL-safe alphabet.
    assert!(validate(b"a+/b", Alphabet::UrlSafe, PadPolicy::Strict).is_err());
    assert!(validate(b"a+/b", Alphabet::Standard, PadPolicy::Strict).is_ok());
    assert!(validate(b"a-_b", Alphabet::Standard, PadPolicy::Strict).is_err());
}

#[test]
fn test_alphabet_membership() {
    assert!(Alphabet::Standard.contains(b'A'));
    assert!(Alphabet::Standard.contains(b'/'));
    assert!(!Alphabet::Standard.contains(b'='));
    assert!(!Alphabet::Standard.contains(b'-'));
    assert!(Alphabet::UrlSafe.contains(b'_'));
    assert!(!Alphabet::UrlSafe.contains(b'/'));
}

#[test]
fn test_every_alphabet_byte_round_trips_through_table() {
    const STD: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    for (i, &b) in STD.iter().enumerate() {
        assert_eq!(Alphabet::Standard.table()[b as usize], i as i8);
    }
}
