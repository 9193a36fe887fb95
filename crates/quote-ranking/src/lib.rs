//! Ranks aggregator quotes by total realized value and quantifies the
//! savings of the winner against the field.
//!
//! Everything in this crate is synchronous, in-memory and exact: amounts,
//! gas costs and rates are compared as arbitrary-precision rationals in the
//! 18-decimal reference unit.

pub mod evaluation;
pub mod savings;

pub use {
    evaluation::{Evaluation, EvaluationContext, QuoteCost, evaluate},
    savings::{Savings, compute_savings},
};

use {model::AggregatorId, thiserror::Error};

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum EvaluationError {
    /// No quote survived the per-quote cost computation.
    #[error("no quotes available")]
    NoQuotesAvailable,

    /// The given aggregator is not part of the evaluated set.
    #[error("unknown aggregator {0}")]
    UnknownAggregator(AggregatorId),
}
