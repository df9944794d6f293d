//! Data Processor Module
//! Cleans the two raw exports and joins them into the merged holdings table.

use crate::config::PrepareConfig;
use crate::data::loader::{ensure_inputs_exist, read_raw_export, text_column, LoaderError};
use crate::data::magnitude::{normalize_shares, MagnitudeParseError};
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{self, File};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Holder rows with this class are mutual funds, not institutions.
pub const EXCLUDED_HOLDER_CLASS: &str = "Top mutual fund Holders";

pub const CLASS_COLUMN: &str = "class";
pub const SHARES_COLUMN: &str = "shares";
pub const JOIN_KEYS: [&str; 2] = ["symbol", "isin"];

/// Suffix given to a constituent column whose name is already used by the holder table.
pub const RIGHT_SUFFIX: &str = "_right";

/// Financial metric columns coerced to floats; unparsable cells become null.
pub const NUMERIC_COLUMNS: [&str; 22] = [
    "%",
    "value",
    "marketCap",
    "enterpriseValue",
    "totalCash",
    "totalCashPerShare",
    "ebitda",
    "totalDebt",
    "quickRatio",
    "currentRatio",
    "totalRevenue",
    "debtToEquity",
    "revenuePerShare",
    "returnOnAssets",
    "returnOnEquity",
    "freeCashflow",
    "operatingCashflow",
    "earningsGrowth",
    "revenueGrowth",
    "grossMargins",
    "ebitdaMargins",
    "operatingMargins",
];

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing required column '{column}' in {table}")]
    MissingColumn { table: &'static str, column: String },
    #[error("Invalid shares value at row {row} ({symbol}): {source}")]
    MagnitudeParse {
        row: usize,
        symbol: String,
        #[source]
        source: MagnitudeParseError,
    },
}

/// Counts collected while preparing the merged table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    pub constituent_rows: usize,
    pub holder_rows: usize,
    pub excluded_holder_rows: usize,
    pub duplicate_holder_rows: usize,
    pub unmatched_holder_rows: usize,
    pub unmatched_constituents: usize,
    pub merged_rows: usize,
    /// Cells per metric column that held text but did not parse.
    pub coerced_nulls: Vec<(String, usize)>,
}

impl fmt::Display for PrepareReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Constituent rows:        {}", self.constituent_rows)?;
        writeln!(f, "Holder rows:             {}", self.holder_rows)?;
        writeln!(f, "  mutual fund (dropped): {}", self.excluded_holder_rows)?;
        writeln!(f, "  duplicates (dropped):  {}", self.duplicate_holder_rows)?;
        writeln!(f, "  unmatched (dropped):   {}", self.unmatched_holder_rows)?;
        writeln!(f, "Unmatched constituents:  {}", self.unmatched_constituents)?;
        write!(f, "Merged rows:             {}", self.merged_rows)?;
        for (column, count) in self.coerced_nulls.iter().filter(|(_, c)| *c > 0) {
            write!(f, "\n  {}: {} unparsable cells set to null", column, count)?;
        }
        Ok(())
    }
}

/// Result of the inner join plus what it left behind.
pub struct JoinOutcome {
    pub merged: DataFrame,
    pub unmatched_holder_rows: usize,
    pub unmatched_constituents: usize,
}

/// Handles data cleaning and transformation operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Run the whole preparation job and write the artifact.
    pub fn prepare(config: &PrepareConfig) -> Result<PrepareReport, ProcessorError> {
        ensure_inputs_exist(&[config.constituents_path.as_path(), config.holders_path.as_path()])?;

        let constituents = read_raw_export(&config.constituents_path)?;
        let holders = read_raw_export(&config.holders_path)?;
        info!(
            "Read {} constituents and {} holder rows",
            constituents.height(),
            holders.height()
        );

        let mut report = PrepareReport {
            constituent_rows: constituents.height(),
            holder_rows: holders.height(),
            ..Default::default()
        };

        let mut merged = Self::clean_and_merge(&holders, &constituents, &mut report)?;
        Self::write_artifact(&mut merged, &config.output_path)?;
        info!(
            "Wrote {} merged rows to {}",
            merged.height(),
            config.output_path.display()
        );

        Ok(report)
    }

    /// Filter, dedup, join, and normalize the two header-repaired tables.
    pub fn clean_and_merge(
        holders: &DataFrame,
        constituents: &DataFrame,
        report: &mut PrepareReport,
    ) -> Result<DataFrame, ProcessorError> {
        Self::require_columns(holders, "holders", &[CLASS_COLUMN, SHARES_COLUMN])?;
        Self::require_columns(holders, "holders", &JOIN_KEYS)?;
        Self::require_columns(constituents, "constituents", &JOIN_KEYS)?;

        let institutional = Self::drop_excluded_holders(holders)?;
        report.excluded_holder_rows = holders.height() - institutional.height();

        let (deduped, duplicates) = Self::drop_duplicate_rows(&institutional)?;
        report.duplicate_holder_rows = duplicates;

        let joined = Self::inner_join(&deduped, constituents)?;
        report.unmatched_holder_rows = joined.unmatched_holder_rows;
        report.unmatched_constituents = joined.unmatched_constituents;
        if joined.unmatched_holder_rows > 0 {
            info!(
                "{} holder rows had no matching constituent and were dropped",
                joined.unmatched_holder_rows
            );
        }

        let mut merged = joined.merged;
        Self::normalize_shares(&mut merged)?;

        report.coerced_nulls = Self::coerce_numeric(&mut merged, &NUMERIC_COLUMNS)?;
        report.merged_rows = merged.height();

        Ok(merged)
    }

    fn require_columns(
        df: &DataFrame,
        table: &'static str,
        columns: &[&str],
    ) -> Result<(), ProcessorError> {
        for column in columns {
            if df.column(column).is_err() {
                return Err(ProcessorError::MissingColumn {
                    table,
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Drop mutual fund rows (exact, case-sensitive match on the class column).
    pub fn drop_excluded_holders(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let filtered = df
            .clone()
            .lazy()
            .filter(col(CLASS_COLUMN).neq_missing(lit(EXCLUDED_HOLDER_CLASS)))
            .collect()?;
        debug!(
            "Dropped {} '{}' rows",
            df.height() - filtered.height(),
            EXCLUDED_HOLDER_CLASS
        );
        Ok(filtered)
    }

    /// Remove rows identical in every column, keeping the first occurrence.
    pub fn drop_duplicate_rows(df: &DataFrame) -> Result<(DataFrame, usize), ProcessorError> {
        let columns: Vec<Vec<Option<String>>> = df
            .get_column_names()
            .iter()
            .map(|name| text_column(df, name.as_str()))
            .collect::<PolarsResult<_>>()?;

        let mut seen: HashSet<Vec<Option<String>>> = HashSet::with_capacity(df.height());
        let mask: Vec<bool> = (0..df.height())
            .map(|row| {
                let key: Vec<Option<String>> =
                    columns.iter().map(|values| values[row].clone()).collect();
                seen.insert(key)
            })
            .collect();

        let duplicates = mask.iter().filter(|keep| !**keep).count();
        let mask = BooleanChunked::from_slice("keep".into(), &mask);
        Ok((df.filter(&mask)?, duplicates))
    }

    /// Inner join on (symbol, isin), holder order first, constituent order within a key.
    ///
    /// Rows whose key has no partner on the other side are dropped, and so are
    /// rows with a null key cell.
    pub fn inner_join(
        holders: &DataFrame,
        constituents: &DataFrame,
    ) -> Result<JoinOutcome, ProcessorError> {
        let holder_keys = Self::join_keys(holders)?;
        let constituent_keys = Self::join_keys(constituents)?;

        let mut index: HashMap<(String, String), Vec<IdxSize>> = HashMap::new();
        for (row, key) in constituent_keys.into_iter().enumerate() {
            if let Some(key) = key {
                index.entry(key).or_default().push(row as IdxSize);
            }
        }

        let mut left_rows: Vec<IdxSize> = Vec::new();
        let mut right_rows: Vec<IdxSize> = Vec::new();
        let mut matched_constituents: HashSet<IdxSize> = HashSet::new();
        let mut unmatched_holder_rows = 0;

        for (row, key) in holder_keys.iter().enumerate() {
            match key.as_ref().and_then(|k| index.get(k)) {
                Some(partners) => {
                    for &partner in partners {
                        left_rows.push(row as IdxSize);
                        right_rows.push(partner);
                        matched_constituents.insert(partner);
                    }
                }
                None => unmatched_holder_rows += 1,
            }
        }

        let left = holders.take(&IdxCa::from_vec("left".into(), left_rows))?;
        let right = constituents.take(&IdxCa::from_vec("right".into(), right_rows))?;

        let holder_names: HashSet<String> = holders
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut extra: Vec<Column> = Vec::new();
        for column in right.get_columns() {
            let name = column.name().to_string();
            if JOIN_KEYS.contains(&name.as_str()) {
                continue;
            }
            let mut column = column.clone();
            if holder_names.contains(&name) {
                column.rename(format!("{}{}", name, RIGHT_SUFFIX).into());
            }
            extra.push(column);
        }

        Ok(JoinOutcome {
            merged: left.hstack(&extra)?,
            unmatched_holder_rows,
            unmatched_constituents: constituents.height() - matched_constituents.len(),
        })
    }

    fn join_keys(df: &DataFrame) -> Result<Vec<Option<(String, String)>>, ProcessorError> {
        let symbols = text_column(df, JOIN_KEYS[0])?;
        let isins = text_column(df, JOIN_KEYS[1])?;
        Ok(symbols
            .into_iter()
            .zip(isins)
            .map(|(symbol, isin)| symbol.zip(isin))
            .collect())
    }

    /// Rewrite the shares column as currency text. Any malformed cell aborts the run.
    pub fn normalize_shares(df: &mut DataFrame) -> Result<(), ProcessorError> {
        let shares = text_column(df, SHARES_COLUMN)?;
        let symbols = text_column(df, JOIN_KEYS[0])?;

        let mut normalized: Vec<String> = Vec::with_capacity(shares.len());
        for (row, cell) in shares.iter().enumerate() {
            let parsed = normalize_shares(cell.as_deref().unwrap_or(""));
            match parsed {
                Ok(text) => normalized.push(text),
                Err(source) => {
                    return Err(ProcessorError::MagnitudeParse {
                        row: row + 1,
                        symbol: symbols[row].clone().unwrap_or_default(),
                        source,
                    })
                }
            }
        }

        df.with_column(Column::new(SHARES_COLUMN.into(), normalized))?;
        Ok(())
    }

    /// Coerce the listed columns to `f64`; never fails on cell content.
    ///
    /// Returns, per column, how many non-blank cells could not be parsed.
    pub fn coerce_numeric(
        df: &mut DataFrame,
        columns: &[&str],
    ) -> Result<Vec<(String, usize)>, ProcessorError> {
        Self::require_columns(df, "merged table", columns)?;

        let frame: &DataFrame = df;
        let coerced: Vec<(String, Vec<Option<f64>>, usize)> = columns
            .par_iter()
            .map(|name| {
                let cells = text_column(frame, name)?;
                let mut failures = 0;
                let values: Vec<Option<f64>> = cells
                    .iter()
                    .map(|cell| {
                        let parsed = cell.as_deref().and_then(parse_metric);
                        if parsed.is_none() && cell.as_deref().is_some_and(|c| !c.trim().is_empty())
                        {
                            failures += 1;
                        }
                        parsed
                    })
                    .collect();
                Ok((name.to_string(), values, failures))
            })
            .collect::<PolarsResult<_>>()?;

        let mut nulls = Vec::with_capacity(coerced.len());
        for (name, values, failures) in coerced {
            if failures > 0 {
                warn!("{}: {} unparsable cells coerced to null", name, failures);
            }
            df.with_column(Column::new(name.as_str().into(), values))?;
            nulls.push((name, failures));
        }
        Ok(nulls)
    }

    /// Write the table as CSV with a header row and no index column.
    pub fn write_artifact(df: &mut DataFrame, path: &Path) -> Result<(), ProcessorError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }
}

/// Lenient metric parse: trims, drops thousands separators, rejects non-finite values.
fn parse_metric(cell: &str) -> Option<f64> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
