use {
    alloy::primitives::U256,
    bigdecimal::BigDecimal,
    model::{AggregatorId, FetchRequest, QuoteSet, Token, TxSkeleton},
    quote_ranking::Savings,
    std::time::Instant,
    thiserror::Error,
};

/// Typed failure states of a polling session. The session's error field is
/// the only channel for failure reporting; the orchestrator never throws
/// past its own boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum FetchErrorKind {
    /// The configured number of poll cycles was exhausted.
    #[error("quotes expired")]
    QuotesExpired,

    /// The embedding wallet reported that a submitted swap failed.
    #[error("swap failed")]
    SwapFailed,

    /// Generic transport or parse failure talking to the quote service or
    /// the rpc provider.
    #[error("error fetching quotes")]
    ErrorFetchingQuotes,

    /// The service answered but no quote survived filtering or ranking.
    #[error("no quotes available")]
    QuotesNotAvailable,

    /// The quote service is down for maintenance.
    #[error("offline for maintenance")]
    OfflineForMaintenance,

    /// A cycle completed after a newer cycle had already committed. Never
    /// surfaced to the session's error field; the discard is silent since
    /// the newer cycle's success already satisfies the caller.
    #[error("stale fetch discarded")]
    FetchOrderConflict,
}

/// Display-layer context accompanying a fetch request: the destination
/// token's info and its conversion rate into the reference unit, when one
/// is known.
#[derive(Clone, Debug)]
pub struct QuoteMetadata {
    pub destination_token: Token,
    pub destination_conversion_rate: Option<BigDecimal>,
}

/// The approval transaction a session needs before its swap, with the gas
/// it was estimated at. Resolved once on the first cycle and reused.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Approval {
    pub tx: TxSkeleton,
    pub gas: U256,
}

/// Mutable session state. Owned by the scheduler task; the mutex around it
/// exists only so snapshots can be taken from other tasks.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub request: Option<FetchRequest>,
    pub metadata: Option<QuoteMetadata>,
    pub custom_gas_price: Option<U256>,
    pub quotes: QuoteSet,
    pub best_aggregator: Option<AggregatorId>,
    pub savings: Option<Savings>,
    pub last_fetched_at: Option<Instant>,
    pub cycles_used: u32,
    pub is_polling: bool,
    pub is_fetching: bool,
    pub error: Option<FetchErrorKind>,
    pub approval: Option<Approval>,
}

/// Read-only view of the session for the embedding wallet.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub quotes: QuoteSet,
    pub best_aggregator: Option<AggregatorId>,
    pub savings: Option<Savings>,
    pub error: Option<FetchErrorKind>,
    pub is_polling: bool,
    pub is_fetching: bool,
    pub poll_cycles_remaining: u32,
    pub last_fetched_at: Option<Instant>,
    pub approval_tx: Option<TxSkeleton>,
}

impl SessionState {
    pub fn snapshot(&self, poll_count_limit: u32) -> SessionSnapshot {
        SessionSnapshot {
            quotes: self.quotes.clone(),
            best_aggregator: self.best_aggregator.clone(),
            savings: self.savings.clone(),
            error: self.error,
            is_polling: self.is_polling,
            is_fetching: self.is_fetching,
            poll_cycles_remaining: poll_count_limit.saturating_sub(self.cycles_used),
            last_fetched_at: self.last_fetched_at,
            approval_tx: self.approval.as_ref().map(|approval| approval.tx.clone()),
        }
    }
}
