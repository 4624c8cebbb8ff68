//! Period and statement block definitions.
//!
//! This module defines [`PeriodType`] for the reporting granularity of an
//! observation and [`StatementBlock`] for the financial statement a metric
//! belongs to. Both serialize in their storage spelling, which is also the
//! key used for them in source documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FundamentalsError;

/// Period type for fundamental financial data.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PeriodType {
    /// Annual reporting period.
    #[default]
    #[serde(rename = "annuals")]
    Annual,
    /// Quarterly reporting period.
    #[serde(rename = "quarterly")]
    Quarterly,
}

impl PeriodType {
    /// All period types in document order.
    pub const ALL: [Self; 2] = [Self::Annual, Self::Quarterly];

    /// Returns the storage spelling, which is also the document section key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annuals",
            Self::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = FundamentalsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annuals" => Ok(Self::Annual),
            "quarterly" => Ok(Self::Quarterly),
            _ => Err(FundamentalsError::Parse(format!("Invalid period type: {s}"))),
        }
    }
}

/// Financial statement category a metric is reported under.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatementBlock {
    /// Per-share figures (EPS, book value per share, ...).
    #[serde(rename = "per_share_data_array")]
    PerShareData,
    /// Common-size ratios (margins, percentages of revenue).
    CommonSizeRatios,
    /// Income statement.
    IncomeStatement,
    /// Balance sheet.
    BalanceSheet,
    /// Cash flow statement.
    CashflowStatement,
    /// Valuation ratios.
    ValuationRatios,
    /// Valuation and quality scores.
    ValuationAndQuality,
    /// Generic fallback; never produced by ingestion.
    #[default]
    Other,
}

impl StatementBlock {
    /// The blocks recognized in source documents, in scan order.
    pub const FINANCIAL_BLOCKS: [Self; 7] = [
        Self::PerShareData,
        Self::CommonSizeRatios,
        Self::IncomeStatement,
        Self::BalanceSheet,
        Self::CashflowStatement,
        Self::ValuationRatios,
        Self::ValuationAndQuality,
    ];

    /// Every block, including the fallback.
    pub const ALL: [Self; 8] = [
        Self::PerShareData,
        Self::CommonSizeRatios,
        Self::IncomeStatement,
        Self::BalanceSheet,
        Self::CashflowStatement,
        Self::ValuationRatios,
        Self::ValuationAndQuality,
        Self::Other,
    ];

    /// Returns the storage spelling, which is also the document key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PerShareData => "per_share_data_array",
            Self::CommonSizeRatios => "common_size_ratios",
            Self::IncomeStatement => "income_statement",
            Self::BalanceSheet => "balance_sheet",
            Self::CashflowStatement => "cashflow_statement",
            Self::ValuationRatios => "valuation_ratios",
            Self::ValuationAndQuality => "valuation_and_quality",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for StatementBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementBlock {
    type Err = FundamentalsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|block| block.as_str() == s)
            .ok_or_else(|| FundamentalsError::Parse(format!("Invalid statement block: {s}")))
    }
}
