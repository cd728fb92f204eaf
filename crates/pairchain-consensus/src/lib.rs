//! # pairchain-consensus — Countersign voting and block construction.
//!
//! Implements the validator's share of the pairing protocol: verifying
//! user signatures on vote requests, countersigning approved hashes,
//! pre-checking product drops against the chain, and building the
//! user/product/repair blocks the coordinator asks for.

pub mod dto;
pub mod service;

pub use dto::{
    ApiResponse, DropVoteRequest, DropVoteResult, PairProductPayload, PairUserPayload,
    RepairPayload, VoteOutcome, VotePayload,
};
pub use service::ConsensusService;
