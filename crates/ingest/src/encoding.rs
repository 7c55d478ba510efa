use encoding_rs::SHIFT_JIS;
use thiserror::Error;

use crate::{FlatRow, Schema};

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("csv serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv buffer flush failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv output was not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encode to Shift_JIS over the JIS X 0208 repertoire, writing `?` for every
/// character it cannot represent. Vendor extensions (NEC row 13, IBM
/// kanji, user-defined area) are not part of that repertoire.
pub fn encode_shift_jis(text: &str) -> Vec<u8> {
    let mut output = Vec::with_capacity(text.len());
    let mut scratch = [0u8; 4];

    for ch in text.chars() {
        if ch.is_ascii() {
            output.push(ch as u8);
            continue;
        }
        let Some(ch) = jis_x0208_char(ch) else {
            output.push(b'?');
            continue;
        };
        let (bytes, _, unmappable) = SHIFT_JIS.encode(ch.encode_utf8(&mut scratch));
        match bytes.as_ref() {
            _ if unmappable => output.push(b'?'),
            [lead, _] if is_extension_lead(*lead) => output.push(b'?'),
            encoded => output.extend_from_slice(encoded),
        }
    }
    output
}

/// The WHATWG table stores a handful of JIS X 0208 cells under their
/// fullwidth compatibility code points; swap to those before encoding and
/// refuse the compatibility code points themselves.
fn jis_x0208_char(ch: char) -> Option<char> {
    match ch {
        '\u{301C}' => Some('\u{FF5E}'),
        '\u{2016}' => Some('\u{2225}'),
        '\u{00A2}' => Some('\u{FFE0}'),
        '\u{00A3}' => Some('\u{FFE1}'),
        '\u{00AC}' => Some('\u{FFE2}'),
        '\u{0080}' | '\u{FF0D}' | '\u{FF5E}' | '\u{2225}' | '\u{FFE0}' | '\u{FFE1}'
        | '\u{FFE2}' => None,
        other => Some(other),
    }
}

/// Lead bytes outside JIS X 0208 rows 1-84.
fn is_extension_lead(lead: u8) -> bool {
    (0x85..=0x87).contains(&lead) || lead >= 0xEB
}

/// Strict Shift_JIS decode. `None` when the bytes are not valid Shift_JIS.
pub fn decode_shift_jis(bytes: &[u8]) -> Option<String> {
    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| text.into_owned())
}

/// Header line for `schema`: column names joined by `,` and a single `\n`.
pub fn header_bytes(schema: Schema) -> Vec<u8> {
    let mut header = schema.columns().join(",");
    header.push('\n');
    encode_shift_jis(&header)
}

/// Data rows with minimal quoting and `\r\n` terminators, no header.
pub fn rows_to_csv(rows: &[FlatRow]) -> Result<String, EncodingError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    for row in rows {
        writer.write_record(row.values())?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Rows as they are appended to a partition file.
pub fn encode_rows(rows: &[FlatRow]) -> Result<Vec<u8>, EncodingError> {
    Ok(encode_shift_jis(&rows_to_csv(rows)?))
}
