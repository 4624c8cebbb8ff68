//! Row extraction from source documents.

use fundamentals_core::{NewObservation, Ticker, parse_fiscal_period, parse_number};
use serde_json::Value;
use tracing::debug;

use crate::catalog::MetricCatalog;
use crate::document::SourceDocument;

/// Observations extracted from one document, plus what was left out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Extraction {
    /// Normalized observations, in document order.
    pub rows: Vec<NewObservation>,
    /// Values dropped because the value or its fiscal label did not normalize,
    /// or because no fiscal label lines up with them.
    pub dropped_values: usize,
    /// Metrics skipped because they have no catalog identity.
    pub unmapped_metrics: usize,
}

/// Extracts the observations of one document.
///
/// Values are paired with the fiscal label at the same index of their period
/// section; iteration stops at the shorter of the two sequences. A pair is kept
/// only if both the value and the label normalize. Metrics missing from the
/// catalog, and metrics whose values are not an array, contribute nothing;
/// neither aborts the rest of the document.
#[must_use]
pub fn extract_rows(ticker: &Ticker, document: &SourceDocument, catalog: &MetricCatalog) -> Extraction {
    let mut extraction = Extraction::default();

    for (period, section) in document.sections() {
        let fiscal_years = &section.fiscal_years;

        for (block, metrics) in section.recognized_blocks() {
            for (name, values) in metrics {
                let Some(metric_type_id) = catalog.get(block, name) else {
                    debug!(ticker = %ticker, block = %block, metric = %name, "No catalog entry, skipping metric");
                    extraction.unmapped_metrics += 1;
                    continue;
                };

                let Value::Array(values) = values else {
                    extraction.dropped_values += 1;
                    continue;
                };

                let aligned = values.len().min(fiscal_years.len());
                extraction.dropped_values += values.len() - aligned;

                for (raw, label) in values.iter().zip(fiscal_years.iter()) {
                    let (Some(value), Some(fiscal)) =
                        (parse_number(Some(raw)), parse_fiscal_period(Some(label)))
                    else {
                        extraction.dropped_values += 1;
                        continue;
                    };

                    extraction.rows.push(NewObservation {
                        ticker: ticker.clone(),
                        period,
                        year: fiscal.year,
                        month: fiscal.month,
                        metric_type_id,
                        value,
                    });
                }
            }
        }
    }

    extraction
}
