//! # jlinx-client
//!
//! Event-sourced documents on owner-signed ledgers.
//!
//! Each document is a ledger replayed through an [`EventMachine`]: a compiled
//! registry of event kinds, each with a payload schema, a business rule
//! against current state and a reducer. Events may splice another ledger
//! into the replay, which is how the contract protocol computes joint state
//! from two ledgers that no single party can write.
//!
//! ## Document types
//!
//! - [`Identifier`]: services of a `did:key` DID document
//! - [`Profile`]: open key/value record
//! - [`Contract`] and [`ContractParty`]: the offer/sign/reject handshake
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jlinx_client::{JlinxClient, OfferOptions};
//! use jlinx_ledger::{Keyring, MemoryHost};
//!
//! let host = Arc::new(MemoryHost::new("memory://host"));
//! let alice = JlinxClient::connect(host.clone(), Arc::new(Keyring::new())).await?;
//! let bob = JlinxClient::connect(host, Arc::new(Keyring::new())).await?;
//!
//! let contract = alice.contracts().create().await?;
//! contract
//!     .offer_contract(OfferOptions::new("did:key:z6mk...", "https://example.com/nda"))
//!     .await?;
//!
//! let offer = bob.contracts().get(contract.id()).await?;
//! let party = offer.sign("did:key:z6mk...").await?;
//!
//! contract.ack_signer_response(party.id()).await?;
//! assert_eq!(contract.status().name(), "signed");
//! ```

pub mod client;
pub mod config;
pub mod contract;
pub mod contract_party;
pub mod error;
pub mod identifier;
pub mod machine;
pub mod profile;
pub mod registry;
pub mod schema;
pub mod worklist;

pub use client::JlinxClient;
pub use config::ClientConfig;
pub use contract::{
    Contract, ContractEvent, ContractState, ContractStatus, Contracts, Offer, OfferOptions,
};
pub use contract_party::{ContractParty, PartyEvent, PartyState};
pub use error::{ClientError, ContractError, Result};
pub use identifier::{Identifier, IdentifierEvent, IdentifierState, Identifiers};
pub use machine::{AppliedEvent, EventMachine, EventOrigin, EventSchema, LedgerResolver};
pub use profile::{Profile, ProfileEvent, ProfileState, Profiles};
pub use registry::{CompiledRegistry, EventRegistry, EventSpec};
pub use schema::{ObjectSchema, Schema, Violation};
