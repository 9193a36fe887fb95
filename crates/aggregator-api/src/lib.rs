//! HTTP client for the swap aggregator service.
//!
//! The service exposes per-aggregator trade quotes plus the supported token
//! list and aggregator display metadata. This module normalizes the raw
//! responses into the typed domain model and applies the documented
//! filtering rules; everything here is an idempotent read and safe to
//! retry.

use {
    alloy::primitives::{Address, U256},
    anyhow::{Context, Result},
    model::{
        AggregatorFilter,
        AggregatorId,
        FetchRequest,
        Quote,
        QuoteSet,
        Token,
        TxSkeleton,
        NATIVE_TOKEN_ADDRESS,
    },
    number::serialization::HexOrDecimalU256,
    reqwest::{Client, IntoUrl, StatusCode, Url},
    serde::Deserialize,
    serde_with::serde_as,
    std::{collections::HashMap, time::Duration},
    thiserror::Error,
};

/// Parameters of one `GET /trades` call.
#[derive(Clone, Debug)]
pub struct TradesQuery {
    pub source_token: Address,
    pub destination_token: Address,
    /// Amount to swap in minimal units of the source token.
    pub source_amount: U256,
    pub slippage_bps: u32,
    pub wallet_address: Address,
    pub aggregator_filter: Option<AggregatorFilter>,
    /// Deadline forwarded to the service so it can cut off slow venues.
    pub timeout: Duration,
}

impl TradesQuery {
    pub fn from_request(request: &FetchRequest, timeout: Duration) -> Self {
        Self {
            source_token: request.source_token,
            destination_token: request.destination_token,
            source_amount: request.source_amount,
            slippage_bps: request.slippage_bps,
            wallet_address: request.wallet_address,
            aggregator_filter: request.aggregator_filter.clone(),
            timeout,
        }
    }

    /// Encodes the query as a url with get parameters.
    fn format_url(&self, base_url: &Url) -> Url {
        let mut url = base_url
            .join("trades")
            .expect("unexpectedly invalid URL segment");
        url.query_pairs_mut()
            .append_pair("sourceToken", &addr2str(self.source_token))
            .append_pair("destinationToken", &addr2str(self.destination_token))
            .append_pair("sourceAmount", &self.source_amount.to_string())
            .append_pair("slippage", &slippage_percentage(self.slippage_bps))
            .append_pair("walletAddress", &addr2str(self.wallet_address))
            .append_pair("timeout", &self.timeout.as_millis().to_string());
        if let Some(AggregatorFilter::Include(ids)) = &self.aggregator_filter {
            let list = ids
                .iter()
                .map(|id| id.0.as_str())
                .collect::<Vec<_>>()
                .join(",");
            url.query_pairs_mut().append_pair("exchangeList", &list);
        }
        url
    }
}

// The `Display` implementation for `Address` prints the EIP-55 checksummed
// form. The service expects plain lower-case hex.
fn addr2str(addr: Address) -> String {
    format!("{addr:#x}")
}

/// Renders basis points as the percentage string the service expects,
/// without going through floating point.
fn slippage_percentage(bps: u32) -> String {
    let whole = bps / 100;
    let frac = bps % 100;
    if frac == 0 {
        whole.to_string()
    } else if frac % 10 == 0 {
        format!("{whole}.{}", frac / 10)
    } else {
        format!("{whole}.{frac:02}")
    }
}

/// One raw per-aggregator entry of a `/trades` response.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrade {
    aggregator: AggregatorId,
    #[serde(default)]
    trade: Option<TxSkeleton>,
    #[serde(default)]
    approval_needed: Option<TxSkeleton>,
    #[serde_as(as = "HexOrDecimalU256")]
    #[serde(default)]
    source_amount: U256,
    #[serde_as(as = "HexOrDecimalU256")]
    #[serde(default)]
    destination_amount: U256,
    #[serde(default)]
    max_gas: u64,
    #[serde(default)]
    average_gas: Option<u64>,
    #[serde(default)]
    estimated_refund: u64,
    #[serde(default)]
    fee_bps: u32,
    #[serde(default)]
    error: Option<String>,
}

/// Display metadata of an aggregator, passed through verbatim.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatorMetadata {
    pub color: String,
    pub title: String,
    pub icon: String,
}

/// An entry of the `/topAssets` response.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopAsset {
    pub address: Address,
    pub symbol: String,
}

/// Remote kill switches for the swaps feature.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    #[serde(default)]
    pub mobile_active: bool,
    #[serde(default)]
    pub extension_active: bool,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to send request")]
    Send(#[source] reqwest::Error),

    #[error("failed to read response body")]
    Body(#[source] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("quote service is offline for maintenance")]
    OfflineForMaintenance,

    #[error("no quotes available for the requested trade")]
    NoQuotesAvailable,

    #[error("Error({0}) for response {1}")]
    Decode(serde_json::Error, String),
}

/// Abstract aggregator service API. Provides a mockable implementation.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait AggregatorApi: Send + Sync {
    /// Fetches one quote per aggregator for the given trade parameters.
    ///
    /// Entries with an error or without a trade are dropped; an empty
    /// filtered result is reported as [`ApiError::NoQuotesAvailable`].
    async fn get_trades(&self, query: &TradesQuery) -> Result<QuoteSet, ApiError>;

    /// Fetches the supported token list. The native-asset sentinel token is
    /// always present exactly once in the result.
    async fn get_tokens(&self) -> Result<Vec<Token>, ApiError>;

    /// Fetches the most-traded assets, in service-defined order.
    async fn get_top_assets(&self) -> Result<Vec<TopAsset>, ApiError>;

    /// Fetches per-aggregator display metadata.
    async fn get_aggregator_metadata(
        &self,
    ) -> Result<HashMap<AggregatorId, AggregatorMetadata>, ApiError>;

    /// Fetches the remote feature flags gating the swaps feature.
    async fn get_feature_flags(&self) -> Result<FeatureFlags, ApiError>;
}

/// Aggregator service client implementation.
#[derive(Debug)]
pub struct DefaultAggregatorApi {
    client: Client,
    base_url: Url,
}

impl DefaultAggregatorApi {
    /// Hard deadline for any single outbound call. Applied on the HTTP
    /// client so a hanging service degrades into a typed send error instead
    /// of blocking a poll cycle indefinitely.
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

    /// Creates a client for the service at `base_url`. The url is expected
    /// to already point at the chain-specific API root.
    pub fn new(base_url: impl IntoUrl, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url.into_url().context("aggregator api url")?,
        })
    }

    /// Creates a client with its own connection pool and the default
    /// request timeout.
    pub fn with_default_client(base_url: impl IntoUrl) -> Result<Self> {
        let client = Client::builder()
            .timeout(Self::DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("http client")?;
        Self::new(base_url, client)
    }

    fn endpoint(&self, segment: &str) -> Url {
        self.base_url
            .join(segment)
            .expect("unexpectedly invalid URL segment")
    }

    async fn request<T: for<'a> serde::Deserialize<'a>>(&self, url: Url) -> Result<T, ApiError> {
        tracing::debug!(%url, "querying aggregator service");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ApiError::Send)?;
        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ApiError::OfflineForMaintenance);
        }
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        let body = response.text().await.map_err(ApiError::Body)?;
        tracing::trace!(%body, "aggregator service response");
        serde_json::from_str(&body).map_err(|err| ApiError::Decode(err, body))
    }
}

#[async_trait::async_trait]
impl AggregatorApi for DefaultAggregatorApi {
    async fn get_trades(&self, query: &TradesQuery) -> Result<QuoteSet, ApiError> {
        let raw: Vec<RawTrade> = self.request(query.format_url(&self.base_url)).await?;
        into_quote_set(raw, query.aggregator_filter.as_ref())
    }

    async fn get_tokens(&self) -> Result<Vec<Token>, ApiError> {
        let tokens = self.request(self.endpoint("tokens")).await?;
        Ok(with_unique_native_sentinel(tokens))
    }

    async fn get_top_assets(&self) -> Result<Vec<TopAsset>, ApiError> {
        self.request(self.endpoint("topAssets")).await
    }

    async fn get_aggregator_metadata(
        &self,
    ) -> Result<HashMap<AggregatorId, AggregatorMetadata>, ApiError> {
        self.request(self.endpoint("aggregatorMetadata")).await
    }

    async fn get_feature_flags(&self) -> Result<FeatureFlags, ApiError> {
        self.request(self.endpoint("featureFlag")).await
    }
}

/// Whether the filter admits quotes from the given aggregator. The include
/// list is also forwarded to the service; re-checking here keeps the result
/// correct for services that ignore the parameter.
fn admitted(filter: Option<&AggregatorFilter>, id: &AggregatorId) -> bool {
    match filter {
        None => true,
        Some(AggregatorFilter::Include(ids)) => ids.contains(id),
        Some(AggregatorFilter::Exclude(ids)) => !ids.contains(id),
    }
}

fn into_quote_set(raw: Vec<RawTrade>, filter: Option<&AggregatorFilter>) -> Result<QuoteSet, ApiError> {
    let mut quotes = QuoteSet::new();
    for entry in raw {
        if let Some(error) = &entry.error {
            tracing::debug!(aggregator = %entry.aggregator, error, "dropping errored quote");
            continue;
        }
        let Some(trade) = entry.trade else {
            tracing::debug!(aggregator = %entry.aggregator, "dropping quote without trade");
            continue;
        };
        if !admitted(filter, &entry.aggregator) {
            continue;
        }
        quotes.insert(
            entry.aggregator.clone(),
            Quote {
                aggregator_id: entry.aggregator,
                trade,
                approval_needed: entry.approval_needed,
                source_amount: entry.source_amount,
                destination_amount: entry.destination_amount,
                max_gas: U256::from(entry.max_gas),
                average_gas: entry.average_gas.map(U256::from),
                estimated_refund: U256::from(entry.estimated_refund),
                fee_bps: entry.fee_bps,
                gas_estimate: Default::default(),
            },
        );
    }
    if quotes.is_empty() {
        return Err(ApiError::NoQuotesAvailable);
    }
    Ok(quotes)
}

/// Ensures the native-asset sentinel token is present exactly once,
/// removing any duplicate the remote list may contain for that address.
fn with_unique_native_sentinel(mut tokens: Vec<Token>) -> Vec<Token> {
    tokens.retain(|token| token.address != NATIVE_TOKEN_ADDRESS);
    tokens.push(Token::native());
    tokens
}
