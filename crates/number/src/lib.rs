//! Exact big-number arithmetic for token amounts, gas costs and rates.
//!
//! All money math downstream of this crate is done on arbitrary-precision
//! integers and rationals. Converting through floating point is forbidden:
//! rounding error at the wei scale is observable and can flip a quote
//! comparison.

pub mod conversions;
pub mod median;
pub mod serialization;
pub mod units;
