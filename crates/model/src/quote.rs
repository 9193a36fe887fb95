use {
    crate::AggregatorId,
    alloy::primitives::{Address, Bytes, U256},
    number::serialization::HexOrDecimalU256,
    serde::{Deserialize, Serialize},
    serde_with::serde_as,
    std::collections::BTreeMap,
};

/// A canonical transaction skeleton as handed to the wallet for signing.
/// Typed fields keep addresses and calldata in their normalized form
/// regardless of how the aggregator service spelled them.
#[serde_as]
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxSkeleton {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    /// Native value in wei. For native-source swaps this embeds the
    /// principal being swapped plus any aggregator-charged native fees.
    #[serde_as(as = "HexOrDecimalU256")]
    #[serde(default)]
    pub value: U256,
}

/// Gas annotation attached to a quote by the estimation guard.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum GasEstimate {
    /// The guard has not run for this quote yet.
    #[default]
    Pending,
    /// A successful estimate together with its refund-aware figure.
    Estimated { units: U256, with_refund: U256 },
    /// Estimation timed out or errored; callers fall back to the
    /// aggregator-provided average.
    Failed,
}

impl GasEstimate {
    /// The refund-aware gas figure, if an estimate succeeded and produced a
    /// usable (non-zero) value.
    pub fn with_refund(&self) -> Option<U256> {
        match self {
            Self::Estimated { with_refund, .. } if !with_refund.is_zero() => Some(*with_refund),
            _ => None,
        }
    }
}

/// One aggregator's candidate trade for a fetch request.
///
/// Raw responses with an error or without a trade are dropped by the
/// transport adapter, so a `Quote` always carries an executable skeleton.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Quote {
    pub aggregator_id: AggregatorId,
    pub trade: TxSkeleton,
    /// The ERC-20 approval transaction required before this trade, if the
    /// aggregator reported one.
    pub approval_needed: Option<TxSkeleton>,
    /// Swapped amount in minimal units of the source token.
    pub source_amount: U256,
    /// Received amount in minimal units of the destination token.
    pub destination_amount: U256,
    pub max_gas: U256,
    pub average_gas: Option<U256>,
    pub estimated_refund: U256,
    /// Fee charged by the swap-routing service itself, in basis points,
    /// distinct from aggregator fees embedded in the trade value.
    pub fee_bps: u32,
    pub gas_estimate: GasEstimate,
}

/// All quotes of one fetch cycle, keyed by aggregator id.
///
/// A `BTreeMap` so that iteration is in ascending id order, which makes
/// tie-breaking during ranking deterministic.
pub type QuoteSet = BTreeMap<AggregatorId, Quote>;
