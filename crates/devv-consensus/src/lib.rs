//! # Devv Consensus
//!
//! The message handlers behind the three worker pools. Each handler takes
//! the chain, pool, keys, and context it needs plus a publisher for its
//! outbound messages; locking is the caller's concern, so every handler is
//! directly unit-testable.
//!
//! The per-height state machine:
//!
//! ```text
//!         arrive TX_ANN               on leader turn
//! idle ────────────────► have_pending ──────────────► proposed
//!  ▲                                                     │
//!  │                                                     │ VALID threshold
//!  │   FINAL_BLOCK from a peer                           ▼
//!  └────────────────────── applied ◄──────────────── finalize_local
//! ```

pub mod errors;
pub mod handlers;
pub mod internetwork;

pub use errors::{ConsensusError, ConsensusResult};
pub use handlers::{
    create_next_proposal, handle_final_block, handle_proposal_block,
    handle_transaction_announcement, handle_validation,
};
pub use internetwork::{handle_blocks_since, handle_blocks_since_request, request_remote_blocks};
