//! Bounded-time gas estimation for prospective swap transactions.
//!
//! Estimation rides on the surrounding wallet's Ethereum JSON-RPC provider,
//! consumed through the [`EthereumRpc`] trait. Every estimate races a hard
//! timeout; on timeout or error callers fall back to the gas figures the
//! aggregator reported instead of failing the quote.

use {
    alloy::primitives::{Address, U256},
    model::TxSkeleton,
    std::{sync::Arc, time::Duration},
    thiserror::Error,
};

/// Gas units assumed for an approval transaction whose estimation timed
/// out.
pub const DEFAULT_APPROVAL_GAS: U256 = U256::from_limbs([0x1d4c0, 0, 0, 0]);

#[derive(Clone, Debug, Error)]
#[error("ethereum rpc error: {0}")]
pub struct RpcError(pub String);

/// The slice of the wallet's Ethereum JSON-RPC provider this crate
/// consumes.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait EthereumRpc: Send + Sync {
    /// Current gas price in wei.
    async fn gas_price(&self) -> Result<U256, RpcError>;

    /// `eth_estimateGas` for the given transaction skeleton.
    async fn estimate_gas(&self, tx: &TxSkeleton) -> Result<U256, RpcError>;

    /// ERC-20 `allowance(owner, spender)` of the given token.
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, RpcError>;
}

/// Races gas-estimation calls against a fixed deadline.
pub struct GasEstimator {
    rpc: Arc<dyn EthereumRpc>,
    timeout: Duration,
}

impl GasEstimator {
    /// Deadline for a single `eth_estimateGas` call.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(rpc: Arc<dyn EthereumRpc>, timeout: Duration) -> Self {
        Self { rpc, timeout }
    }

    /// Estimates gas for the transaction, bounded by the configured
    /// deadline.
    ///
    /// Returns `None` on timeout, RPC error or a missing skeleton. `None`
    /// means "use the aggregator-provided average or maximum gas", never a
    /// hard failure.
    pub async fn estimate_gas_with_timeout(&self, tx: Option<&TxSkeleton>) -> Option<U256> {
        let tx = tx?;
        match tokio::time::timeout(self.timeout, self.rpc.estimate_gas(tx)).await {
            Ok(Ok(gas)) => Some(gas),
            Ok(Err(err)) => {
                tracing::debug!(?err, to = ?tx.to, "gas estimation failed");
                None
            }
            Err(_) => {
                tracing::debug!(to = ?tx.to, timeout = ?self.timeout, "gas estimation timed out");
                None
            }
        }
    }

    /// Reads the ERC-20 allowance of `spender` over `owner`'s tokens. Only
    /// meaningful for non-native source tokens; there is no fallback, the
    /// caller surfaces the error.
    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, RpcError> {
        self.rpc.allowance(token, owner, spender).await
    }

    /// Current gas price in wei.
    pub async fn gas_price(&self) -> Result<U256, RpcError> {
        self.rpc.gas_price().await
    }
}

/// The refund-aware gas figure for a trade: the estimate, bounded by the
/// most gas the transaction can consume after its refund.
pub fn gas_estimate_with_refund(
    max_gas: U256,
    estimated_refund: U256,
    estimated_gas: U256,
) -> U256 {
    let max_gas_minus_refund = max_gas.saturating_sub(estimated_refund);
    std::cmp::min(max_gas_minus_refund, estimated_gas)
}
