use {
    alloy::primitives::Address,
    std::{
        fmt::{self, Display, Formatter},
        time::Duration,
    },
};

/// Swap polling configuration arguments.
#[derive(clap::Parser)]
#[group(skip)]
pub struct Arguments {
    /// Interval between successful quote fetches within a session.
    #[clap(
        long,
        env,
        default_value = "50s",
        value_parser = humantime::parse_duration,
    )]
    pub swap_poll_interval: Duration,

    /// How many poll cycles a session may run before its quotes are
    /// considered expired.
    #[clap(long, env, default_value = "3")]
    pub swap_poll_count_limit: u32,

    /// Deadline forwarded to the aggregator service with every trades
    /// request.
    #[clap(
        long,
        env,
        default_value = "10s",
        value_parser = humantime::parse_duration,
    )]
    pub swap_quote_timeout: Duration,

    /// Deadline for a single gas estimation rpc call.
    #[clap(
        long,
        env,
        default_value = "5s",
        value_parser = humantime::parse_duration,
    )]
    pub swap_gas_estimate_timeout: Duration,

    /// How long the cached token and top-asset lists stay valid.
    #[clap(
        long,
        env,
        default_value = "1h",
        value_parser = humantime::parse_duration,
    )]
    pub swap_list_cache_max_age: Duration,

    /// Address of the swap router contract that gets approved to spend
    /// ERC-20 source tokens.
    #[clap(long, env)]
    pub swap_router_spender: Address,
}

impl Arguments {
    pub fn config(&self) -> Config {
        Config {
            poll_interval: self.swap_poll_interval,
            poll_count_limit: self.swap_poll_count_limit,
            quote_timeout: self.swap_quote_timeout,
            gas_estimate_timeout: self.swap_gas_estimate_timeout,
            list_cache_max_age: self.swap_list_cache_max_age,
            spender: self.swap_router_spender,
        }
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Self {
            swap_poll_interval,
            swap_poll_count_limit,
            swap_quote_timeout,
            swap_gas_estimate_timeout,
            swap_list_cache_max_age,
            swap_router_spender,
        } = self;

        writeln!(f, "swap_poll_interval: {swap_poll_interval:?}")?;
        writeln!(f, "swap_poll_count_limit: {swap_poll_count_limit}")?;
        writeln!(f, "swap_quote_timeout: {swap_quote_timeout:?}")?;
        writeln!(f, "swap_gas_estimate_timeout: {swap_gas_estimate_timeout:?}")?;
        writeln!(f, "swap_list_cache_max_age: {swap_list_cache_max_age:?}")?;
        writeln!(f, "swap_router_spender: {swap_router_spender:?}")?;

        Ok(())
    }
}

/// Resolved controller configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub poll_interval: Duration,
    pub poll_count_limit: u32,
    pub quote_timeout: Duration,
    pub gas_estimate_timeout: Duration,
    pub list_cache_max_age: Duration,
    pub spender: Address,
}
