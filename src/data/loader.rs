//! Spreadsheet Export Loader Module
//! Reads the raw constituent/holder exports and the prepared artifact using Polars.

use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {}", path.display())]
    MissingInput { path: PathBuf },
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Export {} has no header row", path.display())]
    MissingHeaderRow { path: PathBuf },
    #[error("No data loaded")]
    NoData,
}

/// Fail before any processing if one of the inputs is absent.
pub fn ensure_inputs_exist(paths: &[&Path]) -> Result<(), LoaderError> {
    for path in paths {
        if !path.exists() {
            if let Ok(cwd) = std::env::current_dir() {
                error!("Current location: {}", cwd.display());
            }
            return Err(LoaderError::MissingInput {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Read a raw spreadsheet export.
///
/// The export's first line is a structural header with no meaning; the real
/// column names sit on the line after it. Every cell is read as text so that
/// nothing is coerced before the cleaning steps run.
pub fn read_raw_export(path: &Path) -> Result<DataFrame, LoaderError> {
    let raw = LazyCsvReader::new(path)
        .with_has_header(false)
        .with_skip_rows(1)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;

    debug!(
        "Read {} raw rows x {} columns from {}",
        raw.height(),
        raw.width(),
        path.display()
    );

    if raw.height() == 0 {
        return Err(LoaderError::MissingHeaderRow {
            path: path.to_path_buf(),
        });
    }

    Ok(promote_header_row(&raw)?)
}

/// Promote the first row to column names and drop it from the data.
///
/// Blank names become `column_<i>` and repeated names get a `_<n>` suffix so
/// the resulting frame always has unique column names.
pub fn promote_header_row(df: &DataFrame) -> PolarsResult<DataFrame> {
    let mut seen: Vec<String> = Vec::with_capacity(df.width());
    let mut columns: Vec<Column> = Vec::with_capacity(df.width());

    for (i, column) in df.get_columns().iter().enumerate() {
        let values = text_values(column)?;
        let mut name = values
            .first()
            .cloned()
            .flatten()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("column_{}", i + 1));

        if seen.contains(&name) {
            let mut n = 1;
            while seen.contains(&format!("{}_{}", name, n)) {
                n += 1;
            }
            name = format!("{}_{}", name, n);
        }
        seen.push(name.clone());

        let body: Vec<Option<String>> = values.into_iter().skip(1).collect();
        columns.push(Column::new(name.into(), body));
    }

    DataFrame::new(columns)
}

/// Read a column as text, casting when the column is not already a string column.
pub fn text_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    text_values(df.column(name)?)
}

/// Read a column as `f64`; cells that do not cast become `None`.
pub fn float_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let cast = df.column(name)?.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

fn text_values(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    let cast = column.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Handles loading of the prepared artifact for the viewer.
///
/// The frame is held behind an `Arc` so every chart request can share it
/// without copying or mutating it.
pub struct DataLoader {
    df: Option<Arc<DataFrame>>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { df: None }
    }

    /// Read the artifact CSV with schema inference (numeric columns come back as floats).
    pub fn read_artifact(file_path: &Path) -> Result<DataFrame, LoaderError> {
        if !file_path.exists() {
            return Err(LoaderError::MissingInput {
                path: file_path.to_path_buf(),
            });
        }

        let df = LazyCsvReader::new(file_path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;

        info!(
            "Loaded artifact {}: {} rows, {} columns",
            file_path.display(),
            df.height(),
            df.width()
        );
        Ok(df)
    }

    /// Load the artifact and keep it as the shared table.
    pub fn load_artifact(&mut self, file_path: &Path) -> Result<Arc<DataFrame>, LoaderError> {
        let df = Self::read_artifact(file_path)?;
        self.set_dataframe(df);
        self.shared().ok_or(LoaderError::NoData)
    }

    /// Count distinct non-null values in a column.
    pub fn count_unique_values(&self, column: &str) -> usize {
        let Some(df) = &self.df else {
            return 0;
        };

        text_column(df, column)
            .map(|values| {
                let mut unique: Vec<String> = values.into_iter().flatten().collect();
                unique.sort();
                unique.dedup();
                unique.len()
            })
            .unwrap_or(0)
    }

    /// Get the number of rows in the DataFrame.
    pub fn get_row_count(&self) -> usize {
        self.df.as_ref().map(|df| df.height()).unwrap_or(0)
    }

    /// Cheap handle to the shared, read-only table.
    pub fn shared(&self) -> Option<Arc<DataFrame>> {
        self.df.clone()
    }

    /// Set DataFrame directly (used for async loading)
    pub fn set_dataframe(&mut self, df: DataFrame) {
        self.df = Some(Arc::new(df));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_input_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let present = write_file(dir.path(), "present.csv", "a\n");
        let missing = dir.path().join("absent.csv");

        let err = ensure_inputs_exist(&[present.as_path(), missing.as_path()]).unwrap_err();
        assert!(err.to_string().contains("absent.csv"));
        match err {
            LoaderError::MissingInput { path } => assert_eq!(path, missing),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_raw_export_promotes_embedded_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "sp.csv",
            "Unnamed: 0,Unnamed: 1,Unnamed: 2\nsymbol,isin,sector\nABC,X1,Tech\nDEF,X2,Energy\n",
        );

        let df = read_raw_export(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
            vec!["symbol", "isin", "sector"]
        );
        let symbols = text_column(&df, "symbol").unwrap();
        assert_eq!(symbols, vec![Some("ABC".to_string()), Some("DEF".to_string())]);
    }

    #[test]
    fn test_raw_export_keeps_numbers_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "h.csv",
            ",,\nsymbol,value,shares\nABC,0012,1.5B\n",
        );

        let df = read_raw_export(&path).unwrap();
        let values = text_column(&df, "value").unwrap();
        assert_eq!(values, vec![Some("0012".to_string())]);
    }

    #[test]
    fn test_promote_header_fills_blank_and_repeated_names() {
        let df = DataFrame::new(vec![
            Column::new("column_1".into(), vec![Some("name"), Some("a")]),
            Column::new("column_2".into(), vec![None::<&str>, Some("b")]),
            Column::new("column_3".into(), vec![Some("name"), Some("c")]),
        ])
        .unwrap();

        let promoted = promote_header_row(&df).unwrap();
        let names: Vec<String> = promoted
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["name", "column_2", "name_1"]);
        assert_eq!(promoted.height(), 1);
    }

    #[test]
    fn test_artifact_loader_shares_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "merged.csv",
            "symbol,name,value\nABC,Big Fund,100.0\nDEF,Big Fund,50.5\nDEF,Other,1.0\n",
        );

        let mut loader = DataLoader::new();
        let shared = loader.load_artifact(&path).unwrap();
        assert_eq!(shared.height(), 3);
        assert_eq!(loader.get_row_count(), 3);
        assert_eq!(loader.count_unique_values("symbol"), 2);
        assert_eq!(loader.count_unique_values("name"), 2);
        assert!(Arc::ptr_eq(&shared, &loader.shared().unwrap()));

        let values = float_column(&shared, "value").unwrap();
        assert_eq!(values, vec![Some(100.0), Some(50.5), Some(1.0)]);
    }
}
