//! Magnitude Suffix Parser
//! Turns share counts such as "1.5B" or "820.3k" into numbers and formats them as currency.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MagnitudeParseError {
    #[error("empty shares value")]
    Empty,
    #[error("unknown magnitude suffix '{suffix}' in '{text}'")]
    UnknownSuffix { text: String, suffix: char },
    #[error("more than one magnitude suffix in '{text}'")]
    StackedSuffix { text: String },
    #[error("'{text}' is not a number")]
    InvalidNumber { text: String },
}

/// Multiplier denoted by the trailing letter of a share count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magnitude {
    Unit,
    Thousand,
    Million,
    Billion,
}

impl Magnitude {
    /// Suffixes are case-sensitive: `k` for thousand, `M` for million, `B` for billion.
    pub fn from_suffix(suffix: char) -> Option<Self> {
        match suffix {
            'k' => Some(Magnitude::Thousand),
            'M' => Some(Magnitude::Million),
            'B' => Some(Magnitude::Billion),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Magnitude::Unit => 1.0,
            Magnitude::Thousand => 1e3,
            Magnitude::Million => 1e6,
            Magnitude::Billion => 1e9,
        }
    }
}

/// A share count split into its numeric prefix and magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedShares {
    pub mantissa: f64,
    pub magnitude: Magnitude,
}

impl ParsedShares {
    pub fn value(&self) -> f64 {
        self.mantissa * self.magnitude.multiplier()
    }
}

/// Parse a share count with an optional single trailing magnitude suffix.
///
/// Anything else (wrong suffix casing, two suffixes, no digits, non-finite
/// numbers) is rejected rather than guessed at.
pub fn parse_shares(text: &str) -> Result<ParsedShares, MagnitudeParseError> {
    let trimmed = text.trim();
    let Some(last) = trimmed.chars().last() else {
        return Err(MagnitudeParseError::Empty);
    };

    let (body, magnitude) = if last.is_ascii_alphabetic() {
        let magnitude =
            Magnitude::from_suffix(last).ok_or_else(|| MagnitudeParseError::UnknownSuffix {
                text: text.to_string(),
                suffix: last,
            })?;
        (trimmed[..trimmed.len() - 1].trim_end(), magnitude)
    } else {
        (trimmed, Magnitude::Unit)
    };

    if let Some(prev) = body.chars().last() {
        if magnitude != Magnitude::Unit && is_suffix_letter(prev) {
            return Err(MagnitudeParseError::StackedSuffix {
                text: text.to_string(),
            });
        }
    }

    let mantissa: f64 = body
        .parse()
        .map_err(|_| MagnitudeParseError::InvalidNumber {
            text: text.to_string(),
        })?;
    let parsed = ParsedShares {
        mantissa,
        magnitude,
    };
    // The multiplier can push a finite mantissa past f64::MAX.
    if !parsed.value().is_finite() {
        return Err(MagnitudeParseError::InvalidNumber {
            text: text.to_string(),
        });
    }

    Ok(parsed)
}

fn is_suffix_letter(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'K' | 'M' | 'B')
}

/// Parse a share count and render it as a currency string, e.g. "$1,500,000,000.00".
pub fn normalize_shares(text: &str) -> Result<String, MagnitudeParseError> {
    parse_shares(text).map(|parsed| format_currency(parsed.value()))
}

/// `$` followed by the grouped two-decimal amount. Negative amounts keep the
/// sign after the dollar: "$-5.00".
pub fn format_currency(value: f64) -> String {
    format!("${}", format_grouped(value))
}

/// Two decimals with comma thousands separators: 1234567.891 -> "1,234,567.89".
pub fn format_grouped(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Short form using the same suffixes the parser accepts: 1.5e9 -> "1.5B".
pub fn format_compact(value: f64) -> String {
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e9 {
        (value / 1e9, "B")
    } else if abs >= 1e6 {
        (value / 1e6, "M")
    } else if abs >= 1e3 {
        (value / 1e3, "k")
    } else {
        (value, "")
    };
    let text = format!("{:.1}", scaled);
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{}{}", text, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_multipliers() {
        assert!((parse_shares("1.5B").unwrap().value() - 1.5e9).abs() < 1e-3);
        assert!((parse_shares("2.25M").unwrap().value() - 2.25e6).abs() < 1e-6);
        assert!((parse_shares("820.3k").unwrap().value() - 820_300.0).abs() < 1e-6);
        assert!((parse_shares("12345").unwrap().value() - 12345.0).abs() < 1e-9);
    }

    #[test]
    fn test_plain_numbers_parse_unchanged() {
        let parsed = parse_shares(" 98.76 ").unwrap();
        assert_eq!(parsed.magnitude, Magnitude::Unit);
        assert!((parsed.value() - 98.76).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_casing_is_rejected() {
        assert_eq!(
            parse_shares("1.5b"),
            Err(MagnitudeParseError::UnknownSuffix {
                text: "1.5b".to_string(),
                suffix: 'b'
            })
        );
        assert!(matches!(
            parse_shares("3K"),
            Err(MagnitudeParseError::UnknownSuffix { suffix: 'K', .. })
        ));
    }

    #[test]
    fn test_stacked_suffix_is_rejected() {
        assert!(matches!(
            parse_shares("1Bk"),
            Err(MagnitudeParseError::StackedSuffix { .. })
        ));
        assert!(matches!(
            parse_shares("2MB"),
            Err(MagnitudeParseError::StackedSuffix { .. })
        ));
    }

    #[test]
    fn test_malformed_values_are_errors() {
        assert_eq!(parse_shares(""), Err(MagnitudeParseError::Empty));
        assert_eq!(parse_shares("   "), Err(MagnitudeParseError::Empty));
        assert!(matches!(
            parse_shares("B"),
            Err(MagnitudeParseError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_shares("1,234"),
            Err(MagnitudeParseError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_shares("nan"),
            Err(MagnitudeParseError::UnknownSuffix { .. })
        ));
        assert!(matches!(
            parse_shares("inf"),
            Err(MagnitudeParseError::UnknownSuffix { .. })
        ));
        assert!(matches!(
            parse_shares("1e300B"),
            Err(MagnitudeParseError::InvalidNumber { .. })
        ));
        assert!(normalize_shares("1e300B").is_err());
    }

    #[test]
    fn test_currency_formatting() {
        assert_eq!(format_currency(1_234_567.0), "$1,234,567.00");
        assert_eq!(format_currency(1.5e9), "$1,500,000,000.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(0.5), "$0.50");
        assert_eq!(format_currency(-5.0), "$-5.00");
        assert_eq!(format_grouped(123.0), "123.00");
    }

    #[test]
    fn test_compact_form_parses_back() {
        assert_eq!(format_compact(1.5e9), "1.5B");
        assert_eq!(format_compact(1e6), "1M");
        assert_eq!(format_compact(820_300.0), "820.3k");
        assert_eq!(format_compact(42.0), "42");
        let back = parse_shares(&format_compact(2.5e6)).unwrap();
        assert!((back.value() - 2.5e6).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_shares() {
        assert_eq!(normalize_shares("1.5B").unwrap(), "$1,500,000,000.00");
        assert_eq!(normalize_shares("34.1M").unwrap(), "$34,100,000.00");
        assert!(normalize_shares("x").is_err());
    }
}
