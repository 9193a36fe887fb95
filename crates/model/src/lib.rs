//! Domain types shared between the quote transport, the gas estimation
//! guard, the quote ranking and the polling controller.

pub mod quote;
pub mod token;

use alloy::primitives::{Address, address};

pub use {
    quote::{GasEstimate, Quote, QuoteSet, TxSkeleton},
    token::Token,
};

/// The reserved sentinel address representing the chain's native asset in
/// token lists and fetch requests.
pub const NATIVE_TOKEN_ADDRESS: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

/// Identifier of a liquidity aggregator as reported by the quote service.
///
/// Ids sort lexicographically; every iteration that influences quote
/// selection runs in ascending id order so results are reproducible.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct AggregatorId(pub String);

impl std::fmt::Display for AggregatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AggregatorId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Restricts which aggregators a fetch may consult.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AggregatorFilter {
    /// Only consult the listed aggregators.
    Include(Vec<AggregatorId>),
    /// Consult everyone except the listed aggregators.
    Exclude(Vec<AggregatorId>),
}

/// Parameters of one quote comparison, immutable for the duration of a
/// polling session. Starting a new session with a new request resets the
/// poll-cycle counter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FetchRequest {
    pub source_token: Address,
    pub destination_token: Address,
    /// Amount to swap in minimal units of the source token.
    pub source_amount: alloy::primitives::U256,
    /// Maximum acceptable price movement in basis points.
    pub slippage_bps: u32,
    pub wallet_address: Address,
    pub aggregator_filter: Option<AggregatorFilter>,
    /// The wallet's balance does not cover the swap; quotes are still
    /// fetched for display but no approval handling takes place.
    pub balance_insufficient: bool,
}

impl FetchRequest {
    pub fn source_is_native(&self) -> bool {
        self.source_token == NATIVE_TOKEN_ADDRESS
    }

    pub fn destination_is_native(&self) -> bool {
        self.destination_token == NATIVE_TOKEN_ADDRESS
    }
}
