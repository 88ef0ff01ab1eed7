//! Two-party atomic token swap escrow.
//!
//! Two parties agree out of band on the amounts of two mints and a shared secret.
//! Every account of one escrow instance (the record and both vaults) lives at an
//! address derived from that agreement, so only someone holding the secret can
//! address it. The program moves each leg into a vault it controls and releases
//! both legs crosswise in a single instruction.

pub mod error;
pub mod instruction;
pub mod machine;
pub mod pda;
pub mod processor;
pub mod state;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

solana_program::declare_id!("E2foSfEqmY3aJnofMzBHTWqZApVuYU4FDzo88umderTG");
