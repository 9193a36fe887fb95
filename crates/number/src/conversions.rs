use {
    alloy::primitives::U256,
    bigdecimal::BigDecimal,
    num::{BigInt, BigRational, BigUint, bigint::Sign},
};

pub fn u256_to_big_uint(input: &U256) -> BigUint {
    BigUint::from_bytes_be(&input.to_be_bytes::<32>())
}

pub fn u256_to_big_int(input: &U256) -> BigInt {
    BigInt::from_biguint(Sign::Plus, u256_to_big_uint(input))
}

pub fn u256_to_big_rational(input: &U256) -> BigRational {
    BigRational::new(u256_to_big_int(input), 1.into())
}

pub fn big_decimal_to_big_rational(value: &BigDecimal) -> BigRational {
    let (numer, scale) = value.as_bigint_and_exponent();
    let (adjusted_numer, denom) = match scale.cmp(&0) {
        std::cmp::Ordering::Equal => (numer, BigInt::from(1)),
        std::cmp::Ordering::Greater => (numer, BigInt::from(10).pow(scale as u32)),
        std::cmp::Ordering::Less => (
            numer * BigInt::from(10).pow((-scale) as u32),
            BigInt::from(1),
        ),
    };

    BigRational::new(adjusted_numer, denom)
}

/// Lossy by nature: a rational with a non-terminating decimal expansion
/// gets truncated to the default decimal precision. Display only, never
/// feed the result back into ranking math.
pub fn big_rational_to_big_decimal(value: &BigRational) -> BigDecimal {
    BigDecimal::new(value.numer().clone(), 0) / BigDecimal::new(value.denom().clone(), 0)
}
