//! Pure campaign and marketplace logic: decoding contract tuples, currency
//! conversion, status derivation and the presentation views built on them.
//! Nothing in here performs I/O.

pub mod currency;
pub mod decode;
pub mod error;
pub mod ipfs;
pub mod rate;
pub mod records;
pub mod status;
pub mod token;
pub mod view;

pub use primitive_types::U256;
