//! Result aggregation.
//!
//! Merges curves from every task into a [`ForecastCurveSet`] and enforces the
//! alignment invariant: within a market, every curve shares one timestamp
//! index. Curves that disagree with their market's reference index, or that
//! repeat a (market, combination) pair, are excluded and reported as
//! [`AlignmentError`]s. Input order never affects the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use power_core::types::MarketCode;
use tracing::warn;

use crate::curve::{ForecastCurve, ForecastCurveSet};
use crate::error::{AlignmentError, AlignmentIssue, ForecastFailure, ForecastTaskError};

/// Aggregates curves using the first curve per market (by combination id) as reference.
pub fn aggregate<C, F>(curves: C, failures: F) -> ForecastCurveSet
where
    C: IntoIterator<Item = ForecastCurve>,
    F: IntoIterator<Item = ForecastTaskError>,
{
    aggregate_with_reference(curves, failures, &BTreeMap::new())
}

/// Aggregates curves against explicit per-market reference indices.
///
/// Markets missing from `references` fall back to their first curve.
pub fn aggregate_with_reference<C, F>(
    curves: C,
    failures: F,
    references: &BTreeMap<MarketCode, Arc<[NaiveDateTime]>>,
) -> ForecastCurveSet
where
    C: IntoIterator<Item = ForecastCurve>,
    F: IntoIterator<Item = ForecastTaskError>,
{
    let mut curves: Vec<ForecastCurve> = curves.into_iter().collect();
    curves.sort_by(|a, b| (a.market, &a.combination).cmp(&(b.market, &b.combination)));

    let mut failures: Vec<ForecastFailure> = failures.into_iter().map(ForecastFailure::Task).collect();
    let mut refs: BTreeMap<MarketCode, Arc<[NaiveDateTime]>> = references.clone();
    let mut out: BTreeMap<_, BTreeMap<MarketCode, ForecastCurve>> = BTreeMap::new();

    for curve in curves {
        let issue = if out
            .get(&curve.combination)
            .is_some_and(|m: &BTreeMap<MarketCode, ForecastCurve>| m.contains_key(&curve.market))
        {
            Some(AlignmentIssue::Duplicate)
        } else {
            let reference = refs
                .entry(curve.market)
                .or_insert_with(|| Arc::clone(&curve.timestamps));
            index_issue(reference, &curve)
        };

        match issue {
            Some(issue) => {
                warn!(
                    market = %curve.market,
                    combination = %curve.combination,
                    issue = ?issue,
                    "Curve excluded from aggregate"
                );
                failures.push(ForecastFailure::Alignment(AlignmentError {
                    market: curve.market,
                    combination: curve.combination,
                    issue,
                }));
            }
            None => {
                out.entry(curve.combination.clone())
                    .or_default()
                    .insert(curve.market, curve);
            }
        }
    }

    ForecastCurveSet::from_parts(out, failures)
}

fn index_issue(reference: &[NaiveDateTime], curve: &ForecastCurve) -> Option<AlignmentIssue> {
    let ts = &curve.timestamps[..];
    if ts == reference && curve.values.len() == reference.len() {
        return None;
    }
    let first_difference = reference.iter().zip(ts).find(|(a, b)| a != b).map(|(_, b)| *b);
    let actual_len = if ts.len() != reference.len() {
        ts.len()
    } else {
        curve.values.len()
    };
    Some(AlignmentIssue::IndexMismatch {
        expected_len: reference.len(),
        actual_len,
        first_difference,
    })
}
