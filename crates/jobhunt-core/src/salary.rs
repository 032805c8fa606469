use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Lowest annual figure accepted as a plausible salary.
pub const MIN_PLAUSIBLE: u32 = 20_000;
/// Highest annual figure accepted as a plausible salary.
pub const MAX_PLAUSIBLE: u32 = 2_000_000;
/// Widest range accepted between low and high.
pub const MAX_WIDTH: u32 = 500_000;

/// Annual salary range in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub low: u32,
    pub high: u32,
}

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$?\s*(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*(k)?").expect("valid amount regex")
});

impl SalaryRange {
    /// Build a range, rejecting figures outside the sanity bounds.
    pub fn checked(low: u32, high: u32) -> Option<Self> {
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        if low < MIN_PLAUSIBLE || high > MAX_PLAUSIBLE || high - low > MAX_WIDTH {
            return None;
        }
        Some(Self { low, high })
    }

    pub fn midpoint(&self) -> u32 {
        self.low + (self.high - self.low) / 2
    }

    /// Read a range back out of stored salary text such as `$150k - $200k`
    /// or `$150,000+`. A single figure yields `low == high`.
    pub fn parse(text: &str) -> Option<Self> {
        let amounts: Vec<u32> = AMOUNT
            .captures_iter(text)
            .filter_map(|caps| {
                let digits = caps.get(1)?.as_str().replace(',', "");
                let value: f64 = digits.parse().ok()?;
                let value = if caps.get(2).is_some() {
                    value * 1_000.0
                } else {
                    value
                };
                Some(value.round() as u32)
            })
            .filter(|v| *v >= 1_000)
            .take(2)
            .collect();

        match amounts.as_slice() {
            [single] => Self::checked(*single, *single),
            [low, high] => Self::checked(*low, *high),
            _ => None,
        }
    }
}

impl fmt::Display for SalaryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.low == self.high {
            write!(f, "${}k+", self.low / 1_000)
        } else {
            write!(f, "${}k - ${}k", self.low / 1_000, self.high / 1_000)
        }
    }
}
