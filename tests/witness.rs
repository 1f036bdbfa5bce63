use redoscope::pump::{asciify, decode_one_byte, decode_two_byte, witness_bytes, WitnessError};

#[test]
fn test_witness_01() {
    // Plain ASCII passes through unchanged.
    assert_eq!(decode_one_byte("abc").unwrap(), b"abc");
}

#[test]
fn test_witness_02() {
    // Hex and named escapes.
    assert_eq!(
        decode_one_byte(r"a\x00b\t\r\n\\\'").unwrap(),
        b"a\x00b\t\r\n\\'"
    );
}

#[test]
fn test_witness_03() {
    // An unrecognised escape passes through untouched, backslash
    // included.
    assert_eq!(decode_one_byte(r"a\qb").unwrap(), b"a\\qb");
}

#[test]
fn test_witness_04() {
    // A truncated hex escape is refused.
    assert!(matches!(
        decode_one_byte(r"\x4"),
        Err(WitnessError::BadEscape { .. })
    ));
}

#[test]
fn test_witness_05() {
    // Two-byte decoding widens ASCII with zero high bytes and stores
    // \uXXXX code units little-endian.
    assert_eq!(
        decode_two_byte(r"ab\u0101").unwrap(),
        vec![b'a', 0, b'b', 0, 0x01, 0x01]
    );
}

#[test]
fn test_witness_06() {
    assert_eq!(
        decode_two_byte(r"\u263a!").unwrap(),
        vec![0x3a, 0x26, b'!', 0]
    );
}

#[test]
fn test_witness_07() {
    // Non-printable characters have no two-byte form.
    assert!(matches!(
        decode_two_byte("a\u{7f}b"),
        Err(WitnessError::NonAscii { .. })
    ));
}

#[test]
fn test_witness_08() {
    assert_eq!(asciify(&[0x80, 0xff, 0x41]), vec![0x00, 0x7f, 0x41]);
}

#[test]
fn test_witness_09() {
    // Width selects the decoding; anything else is refused.
    assert_eq!(witness_bytes("ab", 1).unwrap(), b"ab");
    assert_eq!(witness_bytes("ab", 2).unwrap(), vec![b'a', 0, b'b', 0]);
    assert!(matches!(
        witness_bytes("ab", 3),
        Err(WitnessError::BadWidth(3))
    ));
}
