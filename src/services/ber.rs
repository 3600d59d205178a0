//! BER to DER length normalization.
//!
//! Some CMS producers stream their output with indefinite lengths or use
//! non-minimal long-form lengths. The DER decoder rejects both, so such input
//! is rewritten with definite minimal lengths before decoding. Tags and
//! primitive contents are copied unchanged; constructed string encodings are
//! not merged.

/// Nesting limit for constructed values.
const MAX_DEPTH: usize = 64;

const CONSTRUCTED: u8 = 0x20;
const INDEFINITE_LENGTH: u8 = 0x80;
const END_OF_CONTENTS: [u8; 2] = [0x00, 0x00];

/// Rewrite one BER element with definite minimal lengths.
///
/// `None` when the input is not a single well-formed BER element.
#[must_use]
pub fn to_der(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let rest = convert_element(input, &mut out, 0)?;
    rest.is_empty().then_some(out)
}

fn convert_element<'a>(input: &'a [u8], out: &mut Vec<u8>, depth: usize) -> Option<&'a [u8]> {
    if depth > MAX_DEPTH {
        return None;
    }
    let (tag, rest) = split_tag(input)?;
    let constructed = tag[0] & CONSTRUCTED != 0;
    let (&first, rest) = rest.split_first()?;

    if first == INDEFINITE_LENGTH {
        if !constructed {
            return None;
        }
        let mut body = Vec::new();
        let mut rest = rest;
        loop {
            if let Some(after) = rest.strip_prefix(&END_OF_CONTENTS) {
                rest = after;
                break;
            }
            rest = convert_element(rest, &mut body, depth + 1)?;
        }
        write_element(out, tag, &body);
        return Some(rest);
    }

    let (length, rest) = split_length(first, rest)?;
    if rest.len() < length {
        return None;
    }
    let (contents, rest) = rest.split_at(length);
    if constructed {
        let mut body = Vec::with_capacity(contents.len());
        let mut inner = contents;
        while !inner.is_empty() {
            inner = convert_element(inner, &mut body, depth + 1)?;
        }
        write_element(out, tag, &body);
    } else {
        write_element(out, tag, contents);
    }
    Some(rest)
}

/// Identifier octets, including high tag numbers.
fn split_tag(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let first = *input.first()?;
    let mut len = 1;
    if first & 0x1f == 0x1f {
        loop {
            let byte = *input.get(len)?;
            len += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
    }
    Some(input.split_at(len))
}

fn split_length(first: u8, rest: &[u8]) -> Option<(usize, &[u8])> {
    if first < 0x80 {
        return Some((usize::from(first), rest));
    }
    let count = usize::from(first & 0x7f);
    if count == 0 || count > std::mem::size_of::<usize>() || rest.len() < count {
        return None;
    }
    let (octets, rest) = rest.split_at(count);
    let length = octets
        .iter()
        .fold(0usize, |acc, &byte| (acc << 8) | usize::from(byte));
    Some((length, rest))
}

fn write_element(out: &mut Vec<u8>, tag: &[u8], contents: &[u8]) {
    out.extend_from_slice(tag);
    let length = contents.len();
    if length < 0x80 {
        // fits in seven bits
        out.push(length as u8);
    } else {
        let octets = length.to_be_bytes();
        let skip = octets.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (octets.len() - skip) as u8);
        out.extend_from_slice(&octets[skip..]);
    }
    out.extend_from_slice(contents);
}
