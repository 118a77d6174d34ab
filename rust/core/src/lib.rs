//! # chain-reaction-core: Shared State Model
//!
//! Board, cell and turn model for a two-player Chain Reaction game played
//! between a human client and an external engine process. The two sides
//! communicate through one shared text resource; this crate defines that
//! text format and the rules for reading a game state out of it. It does no
//! I/O and knows nothing about explosions or search, which belong to the
//! engine.
//!
//! ## Core Modules
//!
//! - [`board`] - Colors, cells, coordinates and the fixed 9x6 board
//! - [`codec`] - Header variants and the text encode/decode pair
//! - [`state`] - Decoded game state, mover and winner resolution
//! - [`rules`] - Legality checks for human move requests
//! - [`errors`] - Decode and illegal-move error types
//!
//! ## Quick Start
//!
//! ```rust
//! use chain_reaction_core::board::Board;
//! use chain_reaction_core::codec::{decode, encode, Header};
//! use chain_reaction_core::state::TurnState;
//!
//! let text = encode(&Board::empty(), &Header::Initializing);
//! let state = decode(&text).expect("round trip");
//! assert_eq!(state.turn(), TurnState::AwaitingHumanMove);
//! ```

pub mod board;
pub mod codec;
pub mod errors;
pub mod rules;
pub mod state;
