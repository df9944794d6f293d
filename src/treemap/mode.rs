//! Grouping modes and color scales.
//!
//! Each grouping mode is a row in [`GROUPING_MODES`]: adding a view is a data
//! change, the hierarchy builder never branches on the mode.

use serde::{Deserialize, Serialize};

/// Label and id of the constant node every hierarchy hangs from.
pub const ROOT_LABEL: &str = "sp500";

/// Column summed into node areas and used for the color axis.
pub const VALUE_COLUMN: &str = "value";

pub const DEFAULT_MODE_ID: &str = "shareholder_company";

/// Fixed display range of the log10 color axis: 1 million to 100 billion dollars.
pub const LOG_COLOR_RANGE: (f64, f64) = (6.0, 11.0);

/// One way of slicing the merged table into a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupingMode {
    pub id: &'static str,
    pub label: &'static str,
    /// Columns below the root, outermost first; the last one is the leaf.
    pub path: &'static [&'static str],
    /// Number of levels shown at once, counting the focused node.
    pub max_depth: Option<usize>,
}

pub const GROUPING_MODES: &[GroupingMode] = &[
    GroupingMode {
        id: "shareholder_sector",
        label: "Holder > Sector > Industry > Company",
        path: &["name", "sector", "industry", "symbol"],
        max_depth: Some(3),
    },
    GroupingMode {
        id: "shareholder_company",
        label: "Holder > Company",
        path: &["name", "symbol"],
        max_depth: Some(3),
    },
    GroupingMode {
        id: "sector",
        label: "Sector > Holder",
        path: &["sector", "name"],
        max_depth: None,
    },
    GroupingMode {
        id: "company",
        label: "Company > Holder",
        path: &["symbol", "name"],
        max_depth: None,
    },
    GroupingMode {
        id: "sector_company",
        label: "Sector > Company",
        path: &["sector", "symbol"],
        max_depth: None,
    },
    GroupingMode {
        id: "industry_company",
        label: "Industry > Company",
        path: &["industry", "symbol"],
        max_depth: None,
    },
    GroupingMode {
        id: "country_company",
        label: "Country > Company",
        path: &["country", "symbol"],
        max_depth: None,
    },
];

impl GroupingMode {
    pub fn all() -> &'static [GroupingMode] {
        GROUPING_MODES
    }

    pub fn find(id: &str) -> Option<&'static GroupingMode> {
        GROUPING_MODES.iter().find(|mode| mode.id == id)
    }

    pub fn default_mode() -> &'static GroupingMode {
        Self::find(DEFAULT_MODE_ID).unwrap_or(&GROUPING_MODES[0])
    }

    /// Root plus one level per path column.
    pub fn levels(&self) -> usize {
        self.path.len() + 1
    }

    /// clap value parser for `--mode`.
    pub fn parse_id(id: &str) -> Result<&'static GroupingMode, String> {
        Self::find(id).ok_or_else(|| {
            let known: Vec<&str> = GROUPING_MODES.iter().map(|m| m.id).collect();
            format!("unknown grouping mode '{}' (expected one of: {})", id, known.join(", "))
        })
    }
}

/// How the value column maps onto the color axis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ColorScale {
    #[default]
    Linear,
    Log10,
}

impl ColorScale {
    pub fn label(self) -> &'static str {
        match self {
            ColorScale::Linear => "Linear",
            ColorScale::Log10 => "Log10",
        }
    }

    /// Color value for one row, `None` when the row cannot be placed on this axis.
    pub fn transform(self, value: f64) -> Option<f64> {
        match self {
            ColorScale::Linear => value.is_finite().then_some(value),
            ColorScale::Log10 => (value > 0.0 && value.is_finite()).then(|| value.log10()),
        }
    }

    /// Clamped display range, or `None` when the range follows the data.
    pub fn fixed_range(self) -> Option<(f64, f64)> {
        match self {
            ColorScale::Linear => None,
            ColorScale::Log10 => Some(LOG_COLOR_RANGE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_ids_are_unique() {
        let mut ids: Vec<&str> = GROUPING_MODES.iter().map(|m| m.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), GROUPING_MODES.len());
    }

    #[test]
    fn test_every_mode_ends_at_a_company_or_holder() {
        for mode in GroupingMode::all() {
            let leaf = mode.path.last().copied();
            assert!(matches!(leaf, Some("symbol") | Some("name")), "{}", mode.id);
        }
    }

    #[test]
    fn test_sector_holder_path() {
        let mode = GroupingMode::find("sector").unwrap();
        assert_eq!(mode.path, &["sector", "name"]);
        assert_eq!(mode.levels(), 3);
    }

    #[test]
    fn test_parse_id_lists_known_modes() {
        assert_eq!(GroupingMode::parse_id("company").unwrap().label, "Company > Holder");
        let err = GroupingMode::parse_id("bogus").unwrap_err();
        assert!(err.contains("shareholder_sector"));
        assert_eq!(GroupingMode::default_mode().id, DEFAULT_MODE_ID);
    }

    #[test]
    fn test_color_scale_transform() {
        assert_eq!(ColorScale::Linear.transform(250.0), Some(250.0));
        assert!((ColorScale::Log10.transform(1e9).unwrap() - 9.0).abs() < 1e-12);
        assert_eq!(ColorScale::Log10.transform(0.0), None);
        assert_eq!(ColorScale::Log10.transform(-3.0), None);
        assert_eq!(ColorScale::Log10.fixed_range(), Some((6.0, 11.0)));
        assert_eq!(ColorScale::Linear.fixed_range(), None);
    }
}
