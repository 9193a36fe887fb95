use {
    anyhow::{Result, ensure},
    num::{BigInt, BigRational},
};

/// Exact median of a sample: the middle element for odd counts, the
/// arithmetic mean of the two central elements for even counts.
///
/// Fails on an empty sample. Never goes through floating point; sorting and
/// averaging are exact.
pub fn median(samples: &[BigRational]) -> Result<BigRational> {
    ensure!(!samples.is_empty(), "median of an empty sample");

    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Ok(sorted[mid].clone())
    } else {
        Ok((&sorted[mid - 1] + &sorted[mid]) / BigRational::from_integer(BigInt::from(2)))
    }
}
