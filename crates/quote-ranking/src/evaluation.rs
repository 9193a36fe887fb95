use {
    crate::EvaluationError,
    alloy::primitives::{Address, U256},
    bigdecimal::BigDecimal,
    model::{AggregatorId, NATIVE_TOKEN_ADDRESS, Quote, QuoteSet, Token},
    num::{BigInt, BigRational, One, Signed},
    number::{
        conversions::{big_decimal_to_big_rational, u256_to_big_int},
        units::{token_units, wei_to_reference_units},
    },
    std::collections::BTreeMap,
};

/// Hard ceiling assumed for a trade whose gas could not be estimated and
/// which carries no aggregator-provided average.
pub const MAX_GAS_LIMIT: u64 = 2_500_000;

/// Inputs the cost computation needs beyond the quotes themselves.
#[derive(Clone, Debug)]
pub struct EvaluationContext {
    pub source_token: Address,
    pub destination_token: Token,
    /// Reference units per whole destination token. Defaults to 1 when the
    /// rate is unknown, which keeps ranking meaningful within the set.
    pub destination_conversion_rate: Option<BigDecimal>,
    /// Gas of the approval transaction this session needs, if any.
    pub approval_gas: Option<U256>,
}

impl EvaluationContext {
    fn source_is_native(&self) -> bool {
        self.source_token == NATIVE_TOKEN_ADDRESS
    }

    fn destination_is_native(&self) -> bool {
        self.destination_token.address == NATIVE_TOKEN_ADDRESS
    }
}

/// The all-in cost and realized value of one quote, in reference units.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuoteCost {
    /// What executing this quote costs on top of the principal: gas plus
    /// any aggregator-charged native fees.
    pub fee: BigRational,
    /// Value of the received destination amount.
    pub destination_value: BigRational,
    /// The routing service's own cut.
    pub service_fee: BigRational,
}

/// Result of ranking a quote set.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Evaluation {
    pub best_aggregator: AggregatorId,
    pub costs: BTreeMap<AggregatorId, QuoteCost>,
}

/// Why a single quote was dropped from ranking. Never aborts the batch.
#[derive(Debug)]
enum QuoteDefect {
    /// Cost arithmetic overflowed U256.
    Overflow,
    /// The computed fee came out negative.
    NegativeFee,
    /// The service fee percentage is at or above 100%.
    FeeTooHigh,
}

/// Computes the all-in cost of every quote and selects the best one by
/// total realized value.
///
/// Iteration runs in ascending aggregator-id order and only a strictly
/// greater value displaces the incumbent, so the result is deterministic
/// regardless of how the quotes were produced. Per-quote failures drop the
/// quote; only an empty survivor set is an error.
pub fn evaluate(
    quotes: &QuoteSet,
    gas_price: U256,
    ctx: &EvaluationContext,
) -> Result<Evaluation, EvaluationError> {
    let rate = ctx
        .destination_conversion_rate
        .as_ref()
        .map(big_decimal_to_big_rational)
        .unwrap_or_else(BigRational::one);

    let mut costs = BTreeMap::new();
    let mut best: Option<(AggregatorId, BigRational)> = None;
    for (id, quote) in quotes {
        let (cost, overall_value) = match cost_of_quote(quote, gas_price, ctx, &rate) {
            Ok(evaluated) => evaluated,
            Err(defect) => {
                tracing::debug!(aggregator = %id, ?defect, "dropping quote from ranking");
                continue;
            }
        };
        if !best
            .as_ref()
            .is_some_and(|(_, incumbent)| *incumbent >= overall_value)
        {
            best = Some((id.clone(), overall_value));
        }
        costs.insert(id.clone(), cost);
    }

    let (best_aggregator, _) = best.ok_or(EvaluationError::NoQuotesAvailable)?;
    Ok(Evaluation {
        best_aggregator,
        costs,
    })
}

fn cost_of_quote(
    quote: &Quote,
    gas_price: U256,
    ctx: &EvaluationContext,
    rate: &BigRational,
) -> Result<(QuoteCost, BigRational), QuoteDefect> {
    let trade_gas = quote
        .gas_estimate
        .with_refund()
        .or(quote.average_gas)
        .unwrap_or(U256::from(MAX_GAS_LIMIT));
    let total_gas = trade_gas
        .checked_add(ctx.approval_gas.unwrap_or_default())
        .ok_or(QuoteDefect::Overflow)?;
    let total_wei_cost = total_gas
        .checked_mul(gas_price)
        .and_then(|gas_cost| gas_cost.checked_add(quote.trade.value))
        .ok_or(QuoteDefect::Overflow)?;

    // For a native-source swap the trade value embeds the principal, which
    // is not a fee.
    let mut fee_wei = u256_to_big_int(&total_wei_cost);
    if ctx.source_is_native() {
        fee_wei -= u256_to_big_int(&quote.source_amount);
    }
    if fee_wei.is_negative() {
        return Err(QuoteDefect::NegativeFee);
    }
    let fee = wei_to_reference_units(fee_wei);

    let destination_units = token_units(&quote.destination_amount, ctx.destination_token.decimals);
    let destination_value = &destination_units * rate;

    // The destination amount is already net of the service fee; gross it up
    // to recover the fee in destination tokens.
    let fee_fraction = BigRational::new(quote.fee_bps.into(), BigInt::from(10_000));
    if fee_fraction >= BigRational::one() {
        return Err(QuoteDefect::FeeTooHigh);
    }
    let pre_fee_destination = &destination_units / (BigRational::one() - &fee_fraction);
    let service_fee = pre_fee_destination * fee_fraction * rate;

    // Fee and destination value are the same currency only for a native
    // destination; otherwise they are reported side by side, not netted.
    let overall_value = if ctx.destination_is_native() {
        &destination_value - &fee
    } else {
        destination_value.clone()
    };

    Ok((
        QuoteCost {
            fee,
            destination_value,
            service_fee,
        },
        overall_value,
    ))
}
