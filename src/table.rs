//! Reading uploaded tables and writing augmented results.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use clap::ValueEnum;
use log::debug;
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;

#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum)]
pub enum WriteFormat {
    Csv,
    Parquet,
}

/// Infer the output format from a file extension.
pub fn infer_file_type(path: &Path) -> Option<WriteFormat> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => Some(WriteFormat::Csv),
        Some("parquet") => Some(WriteFormat::Parquet),
        _ => None,
    }
}

/// Parse delimited text with a header row.
///
/// Column types are inferred over every row, so a text cell anywhere in a
/// numeric column turns the column into text instead of failing the parse.
pub fn read_table(bytes: &[u8]) -> PolarsResult<DataFrame> {
    debug!("parsing {} bytes of tabular data", bytes.len());
    CsvReader::new(Cursor::new(bytes))
        .has_header(true)
        .infer_schema(None)
        .finish()
}

pub fn read_csv<P: AsRef<Path>>(path: P) -> PolarsResult<DataFrame> {
    let file = File::open(path)?;

    CsvReader::new(file)
        .has_header(true)
        .infer_schema(None)
        .finish()
}

pub fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> PolarsResult<()> {
    let mut file = File::create(path)?;

    CsvWriter::new(&mut file).finish(df)?;

    Ok(())
}

pub fn write_parquet<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> PolarsResult<()> {
    let mut file = File::create(path)?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

pub fn write_table<P: AsRef<Path>>(
    path: P,
    format: WriteFormat,
    df: &mut DataFrame,
) -> PolarsResult<()> {
    match format {
        WriteFormat::Csv => write_csv(path, df),
        WriteFormat::Parquet => write_parquet(path, df),
    }
}
