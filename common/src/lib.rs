//! Cambist Common Types
//!
//! Shared monetary leaf types used across the cambist workspace: ISO-4217
//! currency codes and exact-decimal money amounts. These types know nothing
//! about rate sources; conversion between currencies lives in `cambist-fx`.

pub mod currency;
pub mod monetary;

pub use currency::*;
pub use monetary::*;
