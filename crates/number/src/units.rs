use {
    crate::conversions::u256_to_big_rational,
    alloy::primitives::U256,
    num::{BigInt, BigRational},
};

/// Decimals of the native asset, which doubles as the reference unit all
/// quote costs and values are compared in.
pub const NATIVE_DECIMALS: u8 = 18;

/// Scales a minimal-unit token amount to its exact decimal representation,
/// i.e. `amount / 10^decimals`.
pub fn token_units(amount: &U256, decimals: u8) -> BigRational {
    u256_to_big_rational(amount) / BigRational::from_integer(BigInt::from(10).pow(decimals.into()))
}

/// Scales a signed wei quantity to the 18-decimal reference unit.
///
/// The input is signed because fee computations subtract principal from the
/// total cost and the result is meaningful either way.
pub fn wei_to_reference_units(wei: BigInt) -> BigRational {
    BigRational::new(wei, BigInt::from(10).pow(NATIVE_DECIMALS.into()))
}
