use crate::error::{PreplineError, Result};
use polars::prelude::*;
use std::io::Cursor;
use std::sync::Arc;

/// Decode delimited text (header row required) into a `DataFrame`.
///
/// Dtypes are inferred from the first `infer_schema_rows` rows; empty fields
/// become missing values. Columns the reader would type as boolean are kept
/// as their original text, so `True` and `true` remain distinguishable.
///
/// # Errors
///
/// Returns `MalformedInput` carrying the parser's message if the payload is
/// empty, not UTF-8, or not a well-formed table.
pub fn read_csv_bytes(bytes: &[u8], infer_schema_rows: usize) -> Result<DataFrame> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(PreplineError::MalformedInput(
            "payload contains no header row".to_owned(),
        ));
    }
    if let Err(e) = std::str::from_utf8(bytes) {
        return Err(PreplineError::MalformedInput(format!(
            "payload is not valid UTF-8: {e}"
        )));
    }

    let df = read_with_overwrite(bytes, infer_schema_rows, None)?;
    let boolean_columns: Schema = df
        .get_columns()
        .iter()
        .filter(|column| column.dtype().is_bool())
        .map(|column| (column.name().clone(), DataType::String))
        .collect();
    if boolean_columns.is_empty() {
        return Ok(df);
    }
    read_with_overwrite(bytes, infer_schema_rows, Some(Arc::new(boolean_columns)))
}

fn read_with_overwrite(
    bytes: &[u8],
    infer_schema_rows: usize,
    overwrite: Option<SchemaRef>,
) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(infer_schema_rows))
        .with_schema_overwrite(overwrite)
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .map_err(|e| PreplineError::MalformedInput(e.to_string()))
}

/// Encode a `DataFrame` as delimited text with a header row.
///
/// # Errors
///
/// Returns `Storage` if serialization fails.
pub fn write_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .finish(df)
        .map_err(|e| PreplineError::Storage(format!("Failed to write CSV: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_reads_header_and_infers_dtypes() -> Result<()> {
        let df = read_csv_bytes(b"id,name,score\n1,Alice,3.5\n2,Bob,4.0\n", 100)?;
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("id")?.dtype(), &DataType::Int64);
        assert_eq!(df.column("name")?.dtype(), &DataType::String);
        assert_eq!(df.column("score")?.dtype(), &DataType::Float64);
        Ok(())
    }

    #[test]
    fn test_empty_fields_are_missing() -> Result<()> {
        let df = read_csv_bytes(b"a,b\n1,x\n,y\n3,\n", 100)?;
        assert_eq!(df.column("a")?.null_count(), 1);
        assert_eq!(df.column("b")?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn test_rejects_empty_and_binary_payloads() {
        let err = read_csv_bytes(b"  \n", 100).expect_err("empty payload");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);

        let err = read_csv_bytes(&[0xff, 0xfe, 0x00, 0x41], 100).expect_err("binary payload");
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_boolean_spellings_are_read_as_text() -> Result<()> {
        let df = read_csv_bytes(b"a,b\nTrue,true\nFalse,FALSE\n,true\n", 100)?;
        assert_eq!(df.column("a")?.dtype(), &DataType::String);
        assert_eq!(df.column("b")?.dtype(), &DataType::String);

        let b: Vec<Option<&str>> = df.column("b")?.str()?.into_iter().collect();
        assert_eq!(b, vec![Some("true"), Some("FALSE"), Some("true")]);
        assert_eq!(df.column("a")?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn test_write_keeps_header_and_order() -> Result<()> {
        let mut df = read_csv_bytes(b"b,a\n1,2\n3,4\n", 100)?;
        let bytes = write_csv_bytes(&mut df)?;
        assert_eq!(String::from_utf8_lossy(&bytes), "b,a\n1,2\n3,4\n");
        Ok(())
    }
}
