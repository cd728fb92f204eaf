//! # pairchain-core
//! Foundation types, canonical headers, and crypto for the Pairchain
//! validator protocol.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod header;
pub mod merkle;
pub mod types;
