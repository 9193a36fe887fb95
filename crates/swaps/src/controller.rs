use {
    crate::{
        arguments::Config,
        cache::StalenessCache,
        session::{Approval, FetchErrorKind, QuoteMetadata, SessionSnapshot, SessionState},
    },
    aggregator_api::{AggregatorApi, ApiError, TopAsset, TradesQuery},
    alloy::primitives::U256,
    gas_estimation::{DEFAULT_APPROVAL_GAS, EthereumRpc, GasEstimator, gas_estimate_with_refund},
    model::{FetchRequest, GasEstimate, QuoteSet, Token},
    quote_ranking::{EvaluationContext, Savings, compute_savings, evaluate},
    std::{
        sync::{Arc, Mutex},
        time::Instant,
    },
    tokio::{sync::mpsc, task::JoinHandle},
};

/// Entry point for the embedding wallet: owns a polling session over swap
/// quotes and the token/top-asset list caches.
///
/// All session mutation happens on a single scheduler task fed through a
/// command channel; public methods only enqueue commands or read a
/// snapshot.
pub struct SwapsController {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<Mutex<SessionState>>,
    token_cache: StalenessCache<Vec<Token>>,
    top_assets_cache: StalenessCache<Vec<TopAsset>>,
    api: Arc<dyn AggregatorApi>,
    config: Config,
    actor: JoinHandle<()>,
}

impl SwapsController {
    pub fn new(api: Arc<dyn AggregatorApi>, rpc: Arc<dyn EthereumRpc>, config: Config) -> Self {
        let state = Arc::new(Mutex::new(SessionState::default()));
        let (commands, receiver) = mpsc::unbounded_channel();
        let scheduler = Scheduler {
            api: api.clone(),
            estimator: Arc::new(GasEstimator::new(rpc, config.gas_estimate_timeout)),
            config: config.clone(),
            state: state.clone(),
            commands: commands.clone(),
            next_sequence: 0,
            last_committed_sequence: 0,
            timer: None,
        };
        let actor = tokio::spawn(scheduler.run(receiver));
        Self {
            commands,
            state,
            token_cache: StalenessCache::new(config.list_cache_max_age),
            top_assets_cache: StalenessCache::new(config.list_cache_max_age),
            api,
            config,
            actor,
        }
    }

    /// Begins a new polling session, replacing any session in progress. The
    /// poll-cycle counter restarts and the first fetch is dispatched
    /// immediately.
    pub fn start_fetch_and_set_quotes(
        &self,
        request: FetchRequest,
        metadata: QuoteMetadata,
        custom_gas_price: Option<U256>,
    ) {
        self.send(Command::Start {
            request: Box::new(request),
            metadata: Box::new(metadata),
            custom_gas_price,
        });
    }

    /// Terminates polling and resets session state to defaults. The token
    /// and top-asset caches survive. Any fetch already in flight is
    /// discarded when it arrives.
    pub fn stop_polling_and_reset_state(&self) {
        self.send(Command::Stop);
    }

    /// Triggers an immediate out-of-band fetch, unless a scheduled poll is
    /// already pending in which case this is a no-op.
    pub fn safe_refetch_quotes(&self) {
        self.send(Command::Refetch);
    }

    /// Records that a swap submitted from this session's quotes failed.
    pub fn record_swap_failure(&self) {
        self.send(Command::RecordSwapFailure);
    }

    /// The supported token list, refreshed only when stale.
    pub async fn tokens_with_cache(&self) -> Result<Vec<Token>, ApiError> {
        let api = self.api.clone();
        self.token_cache
            .get_or_fetch(|| async move { api.get_tokens().await })
            .await
    }

    /// The most-traded assets, refreshed only when stale.
    pub async fn top_assets_with_cache(&self) -> Result<Vec<TopAsset>, ApiError> {
        let api = self.api.clone();
        self.top_assets_cache
            .get_or_fetch(|| async move { api.get_top_assets().await })
            .await
    }

    /// A consistent read-only view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state
            .lock()
            .unwrap()
            .snapshot(self.config.poll_count_limit)
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("swap scheduler task is gone");
        }
    }
}

impl Drop for SwapsController {
    fn drop(&mut self) {
        self.actor.abort();
    }
}

enum Command {
    Start {
        request: Box<FetchRequest>,
        metadata: Box<QuoteMetadata>,
        custom_gas_price: Option<U256>,
    },
    Stop,
    Refetch,
    Tick,
    RecordSwapFailure,
    CycleDone {
        sequence: u64,
        result: Result<CycleOutcome, FetchErrorKind>,
    },
}

/// Everything a completed cycle wants to commit into session state.
struct CycleOutcome {
    quotes: QuoteSet,
    best_aggregator: model::AggregatorId,
    savings: Savings,
    approval: Option<Approval>,
}

/// Single owner of the session state machine. Runs until the controller is
/// dropped.
struct Scheduler {
    api: Arc<dyn AggregatorApi>,
    estimator: Arc<GasEstimator>,
    config: Config,
    state: Arc<Mutex<SessionState>>,
    commands: mpsc::UnboundedSender<Command>,
    /// Sequence number handed to the most recently dispatched cycle.
    next_sequence: u64,
    /// Completions below this sequence are stale and must be discarded.
    last_committed_sequence: u64,
    timer: Option<JoinHandle<()>>,
}

impl Scheduler {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Start {
                    request,
                    metadata,
                    custom_gas_price,
                } => self.handle_start(*request, *metadata, custom_gas_price),
                Command::Stop => self.handle_stop(),
                Command::Refetch => self.handle_refetch(),
                Command::Tick => self.handle_tick(),
                Command::RecordSwapFailure => self.handle_swap_failure(),
                Command::CycleDone { sequence, result } => {
                    self.handle_cycle_done(sequence, result)
                }
            }
        }
    }

    fn handle_start(
        &mut self,
        request: FetchRequest,
        metadata: QuoteMetadata,
        custom_gas_price: Option<U256>,
    ) {
        tracing::debug!(?request, "starting quote polling session");
        self.cancel_timer();
        self.invalidate_in_flight();
        {
            let mut state = self.state.lock().unwrap();
            *state = SessionState {
                request: Some(request),
                metadata: Some(metadata),
                custom_gas_price,
                is_polling: true,
                ..Default::default()
            };
        }
        self.dispatch_cycle();
    }

    fn handle_stop(&mut self) {
        tracing::debug!("stopping quote polling session");
        self.cancel_timer();
        self.invalidate_in_flight();
        let mut state = self.state.lock().unwrap();
        *state = SessionState::default();
    }

    fn handle_refetch(&mut self) {
        if self.timer_pending() {
            tracing::debug!("refetch skipped, a scheduled poll is pending");
            return;
        }
        let ready = {
            let state = self.state.lock().unwrap();
            state.request.is_some() && state.error.is_none()
        };
        if ready {
            self.dispatch_cycle();
        }
    }

    fn handle_tick(&mut self) {
        self.timer = None;
        let ready = {
            let state = self.state.lock().unwrap();
            state.is_polling && state.error.is_none()
        };
        if ready {
            self.dispatch_cycle();
        }
    }

    fn handle_swap_failure(&mut self) {
        self.cancel_timer();
        self.invalidate_in_flight();
        let mut state = self.state.lock().unwrap();
        state.error = Some(FetchErrorKind::SwapFailed);
        state.is_polling = false;
        state.is_fetching = false;
    }

    fn handle_cycle_done(
        &mut self,
        sequence: u64,
        result: Result<CycleOutcome, FetchErrorKind>,
    ) {
        if sequence < self.last_committed_sequence {
            // A newer cycle has already committed; this result is stale.
            tracing::debug!(
                sequence,
                last_committed = self.last_committed_sequence,
                "{}",
                FetchErrorKind::FetchOrderConflict
            );
            return;
        }
        self.last_committed_sequence = sequence;

        match result {
            Ok(outcome) => {
                let schedule_next = {
                    let mut state = self.state.lock().unwrap();
                    state.quotes = outcome.quotes;
                    state.best_aggregator = Some(outcome.best_aggregator);
                    state.savings = Some(outcome.savings);
                    if state.approval.is_none() {
                        state.approval = outcome.approval;
                    }
                    state.last_fetched_at = Some(Instant::now());
                    state.is_fetching = false;
                    state.error = None;
                    state.is_polling
                };
                if schedule_next {
                    self.schedule_tick();
                }
            }
            Err(kind) => {
                tracing::warn!(%kind, "quote fetch cycle failed");
                let mut state = self.state.lock().unwrap();
                state.error = Some(kind);
                state.is_polling = false;
                state.is_fetching = false;
            }
        }
    }

    fn dispatch_cycle(&mut self) {
        let input = {
            let mut state = self.state.lock().unwrap();
            let Some(request) = state.request.clone() else {
                return;
            };
            let Some(metadata) = state.metadata.clone() else {
                return;
            };
            state.cycles_used += 1;
            if state.cycles_used > self.config.poll_count_limit {
                tracing::debug!(limit = self.config.poll_count_limit, "poll cycle limit exhausted");
                state.error = Some(FetchErrorKind::QuotesExpired);
                state.is_polling = false;
                state.is_fetching = false;
                return;
            }
            state.is_fetching = true;
            CycleInput {
                check_approval: state.cycles_used == 1
                    && !request.source_is_native()
                    && !request.balance_insufficient
                    && state.approval.is_none(),
                approval: state.approval.clone(),
                custom_gas_price: state.custom_gas_price,
                request,
                metadata,
            }
        };

        self.next_sequence += 1;
        let sequence = self.next_sequence;
        let worker = CycleWorker {
            api: self.api.clone(),
            estimator: self.estimator.clone(),
            config: self.config.clone(),
        };
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let result = worker.run(input).await;
            let _ = commands.send(Command::CycleDone { sequence, result });
        });
    }

    fn schedule_tick(&mut self) {
        let commands = self.commands.clone();
        let interval = self.config.poll_interval;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = commands.send(Command::Tick);
        }));
    }

    fn timer_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Makes every already-dispatched cycle stale so its completion cannot
    /// commit into a session it no longer belongs to.
    fn invalidate_in_flight(&mut self) {
        self.last_committed_sequence = self.next_sequence + 1;
    }
}

struct CycleInput {
    request: FetchRequest,
    metadata: QuoteMetadata,
    custom_gas_price: Option<U256>,
    approval: Option<Approval>,
    check_approval: bool,
}

/// One fetch-annotate-rank pipeline run. Stateless; everything it learns is
/// reported back through the cycle's result.
struct CycleWorker {
    api: Arc<dyn AggregatorApi>,
    estimator: Arc<GasEstimator>,
    config: Config,
}

impl CycleWorker {
    async fn run(&self, input: CycleInput) -> Result<CycleOutcome, FetchErrorKind> {
        let query = TradesQuery::from_request(&input.request, self.config.quote_timeout);
        let mut quotes = self
            .api
            .get_trades(&query)
            .await
            .map_err(fetch_error_kind)?;

        let approval = match (input.approval, input.check_approval) {
            (Some(approval), _) => Some(approval),
            (None, true) => self.resolve_approval(&input.request, &quotes).await?,
            (None, false) => None,
        };

        // One independent, individually-bounded estimation per quote,
        // joined before ranking.
        let estimates = futures::future::join_all(quotes.values().map(|quote| {
            let estimator = self.estimator.clone();
            let id = quote.aggregator_id.clone();
            let trade = quote.trade.clone();
            async move {
                let estimate = estimator.estimate_gas_with_timeout(Some(&trade)).await;
                (id, estimate)
            }
        }))
        .await;
        for (id, estimate) in estimates {
            if let Some(quote) = quotes.get_mut(&id) {
                quote.gas_estimate = match estimate {
                    Some(units) => GasEstimate::Estimated {
                        units,
                        with_refund: gas_estimate_with_refund(
                            quote.max_gas,
                            quote.estimated_refund,
                            units,
                        ),
                    },
                    None => GasEstimate::Failed,
                };
            }
        }

        let gas_price = match input.custom_gas_price {
            Some(gas_price) => gas_price,
            None => self.estimator.gas_price().await.map_err(|err| {
                tracing::warn!(?err, "failed to fetch gas price");
                FetchErrorKind::ErrorFetchingQuotes
            })?,
        };

        let ctx = EvaluationContext {
            source_token: input.request.source_token,
            destination_token: input.metadata.destination_token.clone(),
            destination_conversion_rate: input.metadata.destination_conversion_rate.clone(),
            approval_gas: approval.as_ref().map(|approval| approval.gas),
        };
        let evaluation = evaluate(&quotes, gas_price, &ctx)
            .map_err(|_| FetchErrorKind::QuotesNotAvailable)?;
        let savings = compute_savings(&evaluation.best_aggregator, &evaluation.costs)
            .map_err(|_| FetchErrorKind::QuotesNotAvailable)?;

        tracing::debug!(
            best = %evaluation.best_aggregator,
            quotes = quotes.len(),
            savings_total = %number::conversions::big_rational_to_big_decimal(&savings.total),
            "quote fetch cycle complete"
        );
        Ok(CycleOutcome {
            quotes,
            best_aggregator: evaluation.best_aggregator,
            savings,
            approval,
        })
    }

    /// First-cycle allowance gating: when the spender has no allowance over
    /// the source token, the first quote's approval skeleton is estimated
    /// (with a fixed fallback) and attached to the session.
    async fn resolve_approval(
        &self,
        request: &FetchRequest,
        quotes: &QuoteSet,
    ) -> Result<Option<Approval>, FetchErrorKind> {
        let allowance = self
            .estimator
            .allowance(
                request.source_token,
                request.wallet_address,
                self.config.spender,
            )
            .await
            .map_err(|err| {
                tracing::warn!(?err, "allowance read failed");
                FetchErrorKind::ErrorFetchingQuotes
            })?;
        if !allowance.is_zero() {
            return Ok(None);
        }
        let Some(tx) = quotes
            .values()
            .find_map(|quote| quote.approval_needed.clone())
        else {
            return Ok(None);
        };
        let gas = self
            .estimator
            .estimate_gas_with_timeout(Some(&tx))
            .await
            .unwrap_or(DEFAULT_APPROVAL_GAS);
        Ok(Some(Approval { tx, gas }))
    }
}

fn fetch_error_kind(err: ApiError) -> FetchErrorKind {
    match err {
        ApiError::OfflineForMaintenance => FetchErrorKind::OfflineForMaintenance,
        ApiError::NoQuotesAvailable => FetchErrorKind::QuotesNotAvailable,
        err => {
            tracing::warn!(?err, "quote fetch failed");
            FetchErrorKind::ErrorFetchingQuotes
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        aggregator_api::{AggregatorMetadata, FeatureFlags},
        alloy::primitives::Address,
        model::{AggregatorId, Quote, TxSkeleton},
        std::{
            collections::{HashMap, VecDeque},
            sync::atomic::{AtomicUsize, Ordering},
            time::Duration,
        },
    };

    enum CannedTrades {
        Ok { delay: Duration, quotes: QuoteSet },
        Offline,
        NoQuotes,
    }

    struct FakeApi {
        responses: Mutex<VecDeque<CannedTrades>>,
        trades_calls: AtomicUsize,
        tokens_calls: AtomicUsize,
    }

    impl FakeApi {
        fn with(responses: impl IntoIterator<Item = CannedTrades>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().collect()),
                trades_calls: AtomicUsize::new(0),
                tokens_calls: AtomicUsize::new(0),
            })
        }

        fn trades_calls(&self) -> usize {
            self.trades_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl AggregatorApi for FakeApi {
        async fn get_trades(&self, _: &TradesQuery) -> Result<QuoteSet, ApiError> {
            self.trades_calls.fetch_add(1, Ordering::SeqCst);
            let canned = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(CannedTrades::Ok {
                    delay: Duration::ZERO,
                    quotes: quote_set("default", 10),
                });
            match canned {
                CannedTrades::Ok { delay, quotes } => {
                    tokio::time::sleep(delay).await;
                    Ok(quotes)
                }
                CannedTrades::Offline => Err(ApiError::OfflineForMaintenance),
                CannedTrades::NoQuotes => Err(ApiError::NoQuotesAvailable),
            }
        }

        async fn get_tokens(&self) -> Result<Vec<Token>, ApiError> {
            self.tokens_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Token::native()])
        }

        async fn get_top_assets(&self) -> Result<Vec<TopAsset>, ApiError> {
            Ok(vec![])
        }

        async fn get_aggregator_metadata(
            &self,
        ) -> Result<HashMap<AggregatorId, AggregatorMetadata>, ApiError> {
            Ok(HashMap::new())
        }

        async fn get_feature_flags(&self) -> Result<FeatureFlags, ApiError> {
            Ok(FeatureFlags::default())
        }
    }

    struct FakeRpc {
        allowance: U256,
        allowance_calls: AtomicUsize,
        gas_estimate: U256,
    }

    impl FakeRpc {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                allowance: U256::from(1),
                allowance_calls: AtomicUsize::new(0),
                gas_estimate: U256::from(100_000),
            })
        }

        fn without_allowance() -> Arc<Self> {
            Arc::new(Self {
                allowance: U256::ZERO,
                allowance_calls: AtomicUsize::new(0),
                gas_estimate: U256::from(60_000),
            })
        }
    }

    #[async_trait::async_trait]
    impl EthereumRpc for FakeRpc {
        async fn gas_price(&self) -> Result<U256, gas_estimation::RpcError> {
            Ok(U256::from(1))
        }

        async fn estimate_gas(&self, _: &TxSkeleton) -> Result<U256, gas_estimation::RpcError> {
            Ok(self.gas_estimate)
        }

        async fn allowance(
            &self,
            _: Address,
            _: Address,
            _: Address,
        ) -> Result<U256, gas_estimation::RpcError> {
            self.allowance_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.allowance)
        }
    }

    fn quote_set(id: &str, destination_amount: u64) -> QuoteSet {
        [(
            AggregatorId::from(id),
            Quote {
                aggregator_id: id.into(),
                trade: TxSkeleton::default(),
                source_amount: U256::from(1_000u64),
                destination_amount: U256::from(destination_amount),
                max_gas: U256::from(500_000u64),
                average_gas: Some(U256::from(120_000u64)),
                ..Default::default()
            },
        )]
        .into()
    }

    fn request() -> FetchRequest {
        FetchRequest {
            source_token: model::NATIVE_TOKEN_ADDRESS,
            destination_token: "0x0000000000000000000000000000000000000001"
                .parse()
                .unwrap(),
            source_amount: U256::from(1_000u64),
            slippage_bps: 200,
            wallet_address: "0x388c818ca8b9251b393131c08a736a67ccb19297"
                .parse()
                .unwrap(),
            aggregator_filter: None,
            balance_insufficient: false,
        }
    }

    fn metadata() -> QuoteMetadata {
        QuoteMetadata {
            destination_token: Token {
                address: "0x0000000000000000000000000000000000000001"
                    .parse()
                    .unwrap(),
                symbol: "UNIT".to_owned(),
                decimals: 0,
                name: None,
            },
            destination_conversion_rate: None,
        }
    }

    fn config(poll_interval: Duration, poll_count_limit: u32) -> Config {
        Config {
            poll_interval,
            poll_count_limit,
            quote_timeout: Duration::from_secs(10),
            gas_estimate_timeout: Duration::from_secs(5),
            list_cache_max_age: Duration::from_secs(3_600),
            spender: "0x881d40237659c251811cec9c364ef91dc08d300c"
                .parse()
                .unwrap(),
        }
    }

    /// Lets the scheduler drain its command queue.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_commits_quotes_and_savings() {
        let api = FakeApi::with([]);
        let controller = SwapsController::new(
            api.clone(),
            FakeRpc::new(),
            config(Duration::from_secs(50), 3),
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        settle().await;

        let snapshot = controller.snapshot();
        assert_eq!(api.trades_calls(), 1);
        assert!(snapshot.is_polling);
        assert!(!snapshot.is_fetching);
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.best_aggregator, Some("default".into()));
        assert_eq!(snapshot.poll_cycles_remaining, 2);
        assert!(snapshot.savings.is_some());
        assert!(snapshot.last_fetched_at.is_some());
        let quote = &snapshot.quotes[&AggregatorId::from("default")];
        assert_eq!(
            quote.gas_estimate,
            GasEstimate::Estimated {
                units: U256::from(100_000),
                with_refund: U256::from(100_000),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_completion_does_not_overwrite_newer_state() {
        let api = FakeApi::with([
            CannedTrades::Ok {
                delay: Duration::from_secs(100),
                quotes: quote_set("slow", 10),
            },
            CannedTrades::Ok {
                delay: Duration::ZERO,
                quotes: quote_set("fast", 12),
            },
        ]);
        let controller = SwapsController::new(
            api.clone(),
            FakeRpc::new(),
            config(Duration::from_secs(10_000), 3),
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        // no timer is pending while the first fetch is still in flight, so
        // this dispatches a second, overlapping cycle
        controller.safe_refetch_quotes();
        settle().await;

        // the fast second cycle has committed
        assert_eq!(
            controller.snapshot().best_aggregator,
            Some("fast".into())
        );

        // let the slow first cycle complete; its result must be discarded
        tokio::time::sleep(Duration::from_secs(200)).await;
        let snapshot = controller.snapshot();
        assert_eq!(api.trades_calls(), 2);
        assert_eq!(snapshot.best_aggregator, Some("fast".into()));
        assert_eq!(snapshot.error, None);
        assert!(snapshot.quotes.contains_key(&AggregatorId::from("fast")));
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_limit_transitions_to_quotes_expired() {
        let api = FakeApi::with([]);
        let controller = SwapsController::new(
            api.clone(),
            FakeRpc::new(),
            config(Duration::from_secs(50), 3),
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        settle().await;
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(51)).await;
        }

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.error, Some(FetchErrorKind::QuotesExpired));
        assert!(!snapshot.is_polling);
        assert_eq!(snapshot.poll_cycles_remaining, 0);
        assert_eq!(api.trades_calls(), 3);

        // the errored state is absorbing, no further network calls occur
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(api.trades_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_again_resets_the_cycle_counter_and_error() {
        let api = FakeApi::with([]);
        let controller = SwapsController::new(
            api.clone(),
            FakeRpc::new(),
            config(Duration::from_secs(50), 1),
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        settle().await;
        tokio::time::sleep(Duration::from_secs(51)).await;
        assert_eq!(
            controller.snapshot().error,
            Some(FetchErrorKind::QuotesExpired)
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        settle().await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.error, None);
        assert!(snapshot.is_polling);
        assert_eq!(api.trades_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_resets_state_but_keeps_caches() {
        let api = FakeApi::with([CannedTrades::Ok {
            delay: Duration::from_secs(50),
            quotes: quote_set("slow", 10),
        }]);
        let controller = SwapsController::new(
            api.clone(),
            FakeRpc::new(),
            config(Duration::from_secs(50), 3),
        );

        controller.tokens_with_cache().await.unwrap();
        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        controller.stop_polling_and_reset_state();
        // the in-flight fetch completes after the stop and must not commit
        tokio::time::sleep(Duration::from_secs(100)).await;

        let snapshot = controller.snapshot();
        assert!(snapshot.quotes.is_empty());
        assert_eq!(snapshot.best_aggregator, None);
        assert_eq!(snapshot.error, None);
        assert!(!snapshot.is_polling);
        assert_eq!(snapshot.poll_cycles_remaining, 3);

        // the token cache survived the reset
        controller.tokens_with_cache().await.unwrap();
        assert_eq!(api.tokens_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn safe_refetch_is_a_noop_while_a_timer_is_pending() {
        let api = FakeApi::with([]);
        let controller = SwapsController::new(
            api.clone(),
            FakeRpc::new(),
            config(Duration::from_secs(50), 5),
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        settle().await;
        assert_eq!(api.trades_calls(), 1);

        controller.safe_refetch_quotes();
        settle().await;
        assert_eq!(api.trades_calls(), 1);

        tokio::time::sleep(Duration::from_secs(51)).await;
        assert_eq!(api.trades_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn approval_is_resolved_once_per_session() {
        let approval_tx = TxSkeleton {
            to: "0x6b175474e89094c44da98b954eedeac495271d0f".parse().unwrap(),
            ..Default::default()
        };
        let mut quotes = quote_set("default", 10);
        for quote in quotes.values_mut() {
            quote.approval_needed = Some(approval_tx.clone());
        }
        let api = FakeApi::with([
            CannedTrades::Ok {
                delay: Duration::ZERO,
                quotes: quotes.clone(),
            },
            CannedTrades::Ok {
                delay: Duration::ZERO,
                quotes,
            },
        ]);
        let rpc = FakeRpc::without_allowance();
        let mut request = request();
        request.source_token = "0x6b175474e89094c44da98b954eedeac495271d0f".parse().unwrap();
        let controller =
            SwapsController::new(api.clone(), rpc.clone(), config(Duration::from_secs(50), 5));

        controller.start_fetch_and_set_quotes(request, metadata(), None);
        settle().await;
        assert_eq!(controller.snapshot().approval_tx, Some(approval_tx.clone()));
        assert_eq!(rpc.allowance_calls.load(Ordering::SeqCst), 1);

        // the second cycle reuses the approval instead of re-estimating
        tokio::time::sleep(Duration::from_secs(51)).await;
        assert_eq!(api.trades_calls(), 2);
        assert_eq!(controller.snapshot().approval_tx, Some(approval_tx));
        assert_eq!(rpc.allowance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn insufficient_balance_skips_the_allowance_check() {
        let api = FakeApi::with([]);
        let rpc = FakeRpc::without_allowance();
        let mut request = request();
        request.source_token = "0x6b175474e89094c44da98b954eedeac495271d0f".parse().unwrap();
        request.balance_insufficient = true;
        let controller =
            SwapsController::new(api, rpc.clone(), config(Duration::from_secs(50), 3));

        controller.start_fetch_and_set_quotes(request, metadata(), None);
        settle().await;
        assert_eq!(rpc.allowance_calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.snapshot().approval_tx, None);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_maintenance_errors_the_session() {
        let api = FakeApi::with([CannedTrades::Offline]);
        let controller = SwapsController::new(
            api.clone(),
            FakeRpc::new(),
            config(Duration::from_secs(50), 3),
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        settle().await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.error, Some(FetchErrorKind::OfflineForMaintenance));
        assert!(!snapshot.is_polling);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(api.trades_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_quote_response_is_quotes_not_available() {
        let api = FakeApi::with([CannedTrades::NoQuotes]);
        let controller = SwapsController::new(
            api,
            FakeRpc::new(),
            config(Duration::from_secs(50), 3),
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        settle().await;
        assert_eq!(
            controller.snapshot().error,
            Some(FetchErrorKind::QuotesNotAvailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn swap_failure_is_recorded() {
        let api = FakeApi::with([]);
        let controller = SwapsController::new(
            api,
            FakeRpc::new(),
            config(Duration::from_secs(50), 3),
        );

        controller.start_fetch_and_set_quotes(request(), metadata(), None);
        settle().await;
        controller.record_swap_failure();
        settle().await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.error, Some(FetchErrorKind::SwapFailed));
        assert!(!snapshot.is_polling);
    }
}
