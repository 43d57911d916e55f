//! Options-implied fair value for binary payoffs.
//!
//! Option-chain IVs are extracted around the contract level, interpolated to
//! the contract expiry in total variance, and fed into either a terminal
//! digital or a one-touch barrier pricer. The result is compared against a
//! market price to classify it as fair, cheap or expensive.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod models;
pub mod vol;
