//! The chunking/reassembly engine.
//!
//! A message whose payload exceeds the asynchronous size threshold is split
//! into ordered `MessagePart`s, each small enough to travel in one envelope.
//! The receiver collects parts (in any order, possibly re-delivered) with a
//! `PartAssembler` and reassembles them once the set is complete.

pub mod assembler;
pub mod engine;

pub use assembler::PartAssembler;
pub use engine::{needs_split, reassemble, split};

/// Payloads larger than this are split before sending.
pub const MAX_ASYNC_MESSAGE_SIZE: usize = 40960;

/// The maximum number of payload bytes carried by a single part.
pub const MAX_MESSAGE_PART_SIZE: usize = 40960;

#[cfg(test)]
mod tests;
