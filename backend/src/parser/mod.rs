//! CSV parser with encoding and delimiter auto-detection.
//!
//! Turns raw CSV bytes into header-keyed string records. No formula-specific
//! logic here; see [`crate::ingest`] for the typed conversion.

use indexmap::IndexMap;
use std::path::Path;

pub use crate::error::CsvError;

/// One parsed CSV record: trimmed header → trimmed value, in header order.
pub type Record = IndexMap<String, String>;

/// A parsed record together with the source line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    /// 1-based line number of the record in the input.
    pub line: u64,
    pub fields: Record,
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed records in input order
    pub records: Vec<SourceRecord>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

const UTF8_BOM: char = '\u{feff}';

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, CsvError> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(enc) => {
                let (text, _, had_errors) = enc.decode(bytes);
                if had_errors {
                    return Err(CsvError::EncodingError {
                        encoding: other.to_string(),
                        message: "malformed byte sequence".to_string(),
                    });
                }
                text.into_owned()
            }
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    Ok(decoded.trim_start_matches(UTF8_BOM).to_string())
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to a comma when none of the candidates appear.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// use formulary::parser::parse_str;
///
/// let csv = "formula_id,qty\nF001,10\nF002,3";
/// let records = parse_str(csv, ',').unwrap();
///
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[0].fields["qty"], "10");
/// ```
pub fn parse_str(content: &str, delimiter: char) -> Result<Vec<SourceRecord>, CsvError> {
    Ok(parse_with_headers(content, delimiter)?.1)
}

fn parse_with_headers(content: &str, delimiter: char) -> Result<(Vec<String>, Vec<SourceRecord>), CsvError> {
    let content = content.trim_start_matches(UTF8_BOM);
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = u8::try_from(delimiter).map_err(|_| CsvError::ParseError {
        line: 1,
        message: format!("Delimiter '{}' is not a single byte", delimiter),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        // Skip fully blank rows
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }

        let mut fields = Record::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            let value = record.get(i).unwrap_or("");
            fields.insert(header.clone(), value.to_string());
        }

        records.push(SourceRecord { line, fields });
    }

    Ok((headers, records))
}

/// Parse CSV file with auto-detection of encoding and delimiter.
///
/// # Example
/// ```ignore
/// let result = parse_csv_file_auto("formulas.csv")?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// ```
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);

    let (headers, records) = parse_with_headers(&content, delimiter)?;
    tracing::debug!(
        encoding = %encoding,
        delimiter = %delimiter.escape_default(),
        rows = records.len(),
        "parsed csv"
    );

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}
