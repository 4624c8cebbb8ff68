//! Source document model.
//!
//! A document holds a `financials` object with up to two period sections,
//! `annuals` and `quarterly`. Each section carries a `"Fiscal Year"` label
//! sequence and any number of statement blocks; each block maps a metric
//! name to a value sequence index-aligned with the labels.

use fundamentals_core::{PeriodType, StatementBlock};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// One per-ticker source document.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SourceDocument {
    /// Statement data; documents without it contribute nothing.
    #[serde(default)]
    pub financials: Option<Financials>,
}

impl SourceDocument {
    /// Returns the period sections present, in document order.
    pub fn sections(&self) -> impl Iterator<Item = (PeriodType, &PeriodSection)> {
        self.financials
            .iter()
            .flat_map(|financials| {
                PeriodType::ALL
                    .into_iter()
                    .filter_map(move |period| financials.section(period).map(|s| (period, s)))
            })
    }
}

/// The period sections of a document.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Financials {
    /// Annual section.
    #[serde(default)]
    pub annuals: Option<PeriodSection>,
    /// Quarterly section.
    #[serde(default)]
    pub quarterly: Option<PeriodSection>,
}

impl Financials {
    /// Returns the section for a period type, if present.
    #[must_use]
    pub const fn section(&self, period: PeriodType) -> Option<&PeriodSection> {
        match period {
            PeriodType::Annual => self.annuals.as_ref(),
            PeriodType::Quarterly => self.quarterly.as_ref(),
        }
    }
}

/// One period section: fiscal labels plus statement blocks.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PeriodSection {
    /// Fiscal labels, index-aligned with every metric's values.
    #[serde(rename = "Fiscal Year", default, deserialize_with = "lenient_sequence")]
    pub fiscal_years: Vec<Value>,
    /// Every other key of the section, recognized blocks included.
    #[serde(flatten)]
    pub blocks: Map<String, Value>,
}

impl PeriodSection {
    /// Returns a recognized block's metrics, if the block is present and is an object.
    #[must_use]
    pub fn block(&self, block: StatementBlock) -> Option<&Map<String, Value>> {
        self.blocks.get(block.as_str())?.as_object()
    }

    /// Returns the recognized blocks present, in scan order.
    pub fn recognized_blocks(&self) -> impl Iterator<Item = (StatementBlock, &Map<String, Value>)> {
        StatementBlock::FINANCIAL_BLOCKS
            .into_iter()
            .filter_map(|block| self.block(block).map(|metrics| (block, metrics)))
    }
}

/// Accepts any JSON value, keeping it only if it is an array.
fn lenient_sequence<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values,
        _ => Vec::new(),
    })
}
