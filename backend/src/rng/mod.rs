//! Deterministic random number generation
//!
//! Uses xorshift64* for fast, seedable generation. Only demo arrivals draw
//! from it; the scheduler itself is fully deterministic and never does.

mod xorshift;

pub use xorshift::RngManager;
