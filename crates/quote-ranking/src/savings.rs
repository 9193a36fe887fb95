use {
    crate::{EvaluationError, evaluation::QuoteCost},
    model::AggregatorId,
    num::BigRational,
    number::median::median,
    std::collections::BTreeMap,
};

/// How much better the selected quote is than the median of the field, in
/// reference units. All quantities are signed: a best quote can still be
/// worse than the median on an individual axis.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Savings {
    /// Destination value of the winner minus the median destination value.
    pub performance: BigRational,
    /// Median fee minus the winner's fee.
    pub fee: BigRational,
    /// `performance + fee − service_fee(winner)`.
    pub total: BigRational,
    /// Median of the routing service's cut across the field, reported for
    /// display alongside the winner-based total.
    pub median_service_fee: BigRational,
}

/// Computes the savings of the selected best quote relative to the median
/// of all surviving per-aggregator costs.
///
/// The fee and destination-value medians are taken over their series
/// independently. A set of size one has a median equal to its single value,
/// yielding zero performance and fee savings by construction.
pub fn compute_savings(
    best: &AggregatorId,
    costs: &BTreeMap<AggregatorId, QuoteCost>,
) -> Result<Savings, EvaluationError> {
    let best_cost = costs
        .get(best)
        .ok_or_else(|| EvaluationError::UnknownAggregator(best.clone()))?;

    let series = |extract: fn(&QuoteCost) -> &BigRational| {
        costs.values().map(extract).cloned().collect::<Vec<_>>()
    };
    // the set is non-empty, the medians cannot fail
    let median_value = median(&series(|cost| &cost.destination_value))
        .map_err(|_| EvaluationError::NoQuotesAvailable)?;
    let median_fee =
        median(&series(|cost| &cost.fee)).map_err(|_| EvaluationError::NoQuotesAvailable)?;
    let median_service_fee = median(&series(|cost| &cost.service_fee))
        .map_err(|_| EvaluationError::NoQuotesAvailable)?;

    let performance = &best_cost.destination_value - &median_value;
    let fee = &median_fee - &best_cost.fee;
    let total = &performance + &fee - &best_cost.service_fee;

    Ok(Savings {
        performance,
        fee,
        total,
        median_service_fee,
    })
}
