//! Delimited text files
//!
//! Reads with `csvfile` and writes with `csv`. Reading splits lines naively on
//! the delimiter; quotes carry no meaning.

mod extractor;
mod loader;

pub use extractor::{CsvFileConfig, CsvFileExtractor};
pub use loader::{CsvConfig, CsvLoader};

use eyre::Result;

fn default_delimiter() -> String {
    ",".to_string()
}

/// The delimiter as the single byte the csv reader and writer expect
fn delimiter_byte(delimiter: &str) -> Result<u8> {
    match delimiter.as_bytes() {
        [byte] => Ok(*byte),
        _ => eyre::bail!(
            "delimiter must be a single byte character, got '{}'",
            delimiter
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_byte() {
        assert_eq!(delimiter_byte(";").unwrap(), b';');
        assert_eq!(delimiter_byte("\t").unwrap(), b'\t');
        assert!(delimiter_byte("").is_err());
        assert!(delimiter_byte("§").is_err());
    }
}
