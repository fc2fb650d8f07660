//! Tabular file loading.
//!
//! Reads CSV/TSV embeddings exports into polars and hands them to
//! [`FeatureLabelSet::load`]. Labels come either from a named column in the
//! feature file or from a separate single-column file.

use polars::io::csv::read::{CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::dataset::FeatureLabelSet;
use crate::error::{FeatureError, Result};
use crate::labels::LabelSource;

/// Field separator guessed from the file extension (`.tsv`/`.tab` → tab).
pub fn separator_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

/// Read a delimited table with a header row.
///
/// Falls back to a pre-cleaned read (collapsed doubled quotes, blank lines
/// removed) when polars rejects the raw file.
pub fn read_table(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let separator = separator_for(path);

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_separator(separator)
                .with_quote_char(Some(b'"')),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cursor = Cursor::new(clean_table_content(&content));
            Ok(CsvReadOptions::default()
                .with_infer_schema_length(Some(100))
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(separator))
                .into_reader_with_file_handle(cursor)
                .finish()?)
        }
        Err(e) => {
            error!("Could not read file {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}

fn clean_table_content(content: &str) -> String {
    content
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a frame into `(features, label column)`.
pub fn split_label_column(df: &DataFrame, label_column: &str) -> Result<(DataFrame, Column)> {
    let labels = df
        .column(label_column)
        .map_err(|_| {
            FeatureError::MalformedLabelData(format!(
                "label column '{}' not found in feature table",
                label_column
            ))
        })?
        .clone();
    let features = df.drop(label_column)?;
    Ok((features, labels))
}

/// Load a feature file, optionally taking labels from one of its columns.
pub fn load_with_label_column(
    path: impl AsRef<Path>,
    label_column: Option<&str>,
) -> Result<FeatureLabelSet> {
    let path = path.as_ref();
    info!("Loading features from: {}", path.display());
    let df = read_table(path)?;

    match label_column {
        Some(name) => {
            let (features, labels) = split_label_column(&df, name)?;
            FeatureLabelSet::load(&features, Some(LabelSource::Column(labels)))
        }
        None => FeatureLabelSet::load(&df, None),
    }
}

/// Load a feature file and a separate label file (single column, with header).
pub fn load_with_label_file(
    features_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
) -> Result<FeatureLabelSet> {
    let features_path = features_path.as_ref();
    let labels_path = labels_path.as_ref();
    info!(
        "Loading features from {} and labels from {}",
        features_path.display(),
        labels_path.display()
    );
    let features = read_table(features_path)?;
    let labels = read_table(labels_path)?;
    FeatureLabelSet::load(&features, Some(LabelSource::Table(labels)))
}
