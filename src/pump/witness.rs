// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::fmt;

/// An error which arises when regularising an escaped witness string.
pub enum WitnessError {
    /// A `\x`/`\u` escape was truncated or carried non-hex digits.
    BadEscape { position: usize },
    /// A character outside the printable ASCII range appeared where
    /// the two-byte encoding requires one.
    NonAscii { position: usize },
    /// Subjects are one or two bytes per character; nothing else.
    BadWidth(usize),
}

impl fmt::Debug for WitnessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WitnessError::BadEscape { position } => {
                write!(f, "malformed escape at offset {}", position)
            }
            WitnessError::NonAscii { position } => {
                write!(f, "non-printable character at offset {}", position)
            }
            WitnessError::BadWidth(width) => {
                write!(f, "unsupported character width {}", width)
            }
        }
    }
}

impl fmt::Display for WitnessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Just reuse debug formatting.
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for WitnessError {}

/// Decode a fuzzer witness written as an ASCII-escaped string into
/// one-byte (latin-1) subject bytes.  Recognised escapes are `\xNN`,
/// `\\`, `\'`, `\"`, `\n`, `\r`, `\t` and `\0`; an unrecognised
/// escape passes through untouched, backslash included.
pub fn decode_one_byte(witness: &str) -> Result<Vec<u8>, WitnessError> {
    let bytes = witness.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'x' => {
                    out.push(hex_pair(bytes, i + 2)?);
                    i += 4;
                    continue;
                }
                b'\\' => out.push(b'\\'),
                b'\'' => out.push(b'\''),
                b'"' => out.push(b'"'),
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'0' => out.push(0),
                _ => {
                    // Not an escape after all.
                    out.push(b'\\');
                    i += 1;
                    continue;
                }
            }
            i += 2;
        } else {
            out.push(c);
            i += 1;
        }
    }
    Ok(out)
}

/// Decode a fuzzer witness written as an ASCII-escaped string into
/// two-byte (UTF-16LE) subject bytes.  `\uXXXX` escapes carry one
/// code unit, stored little-endian; everything else must be printable
/// ASCII and widens to a code unit with a zero high byte.
pub fn decode_two_byte(witness: &str) -> Result<Vec<u8>, WitnessError> {
    let bytes = witness.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2);
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'u' => {
                    let high = hex_pair(bytes, i + 2)?;
                    let low = hex_pair(bytes, i + 4)?;
                    // Stored little-endian.
                    out.push(low);
                    out.push(high);
                    i += 6;
                    continue;
                }
                b'\\' => out.extend([b'\\', 0]),
                b'r' => out.extend([b'\r', 0]),
                b't' => out.extend([b'\t', 0]),
                b'n' => out.extend([b'\n', 0]),
                _ => {
                    out.extend([b'\\', 0]);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        } else {
            if !(b' '..=b'~').contains(&c) {
                return Err(WitnessError::NonAscii { position: i });
            }
            out.extend([c, 0]);
            i += 1;
        }
    }
    Ok(out)
}

/// Regularise an escaped witness for a given character width.
pub fn witness_bytes(witness: &str, width: usize) -> Result<Vec<u8>, WitnessError> {
    match width {
        1 => decode_one_byte(witness),
        2 => decode_two_byte(witness),
        _ => Err(WitnessError::BadWidth(width)),
    }
}

/// Mask every byte down to seven bits.  Fuzzer witnesses are drawn
/// from the full byte range, but some samplers only accept ASCII
/// subjects.
pub fn asciify(witness: &[u8]) -> Vec<u8> {
    witness.iter().map(|b| b & 0x7f).collect()
}

fn hex_pair(bytes: &[u8], at: usize) -> Result<u8, WitnessError> {
    let digits = bytes
        .get(at..at + 2)
        .and_then(|pair| std::str::from_utf8(pair).ok())
        .ok_or(WitnessError::BadEscape { position: at })?;
    u8::from_str_radix(digits, 16).map_err(|_| WitnessError::BadEscape { position: at })
}
