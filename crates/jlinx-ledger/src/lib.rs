//! # jlinx-ledger
//!
//! Owner-signed, append-only ledgers for the jlinx client.
//!
//! ## Features
//!
//! - **Ledger trait**: the Log capability documents are replayed from
//! - **Host trait**: transport seam to the service that stores ledgers
//! - **HostLedger**: a ledger on a host, signing every appended record with
//!   the owner key and caching fetched records
//! - **MemoryHost**: in-process host honoring the full signature contract
//! - **Keyring**: local owner keys, keyed by ledger id
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jlinx_ledger::{HostLedger, Host, Ledger, MemoryHost, generate_signing_key};
//!
//! let host: Arc<dyn Host> = Arc::new(MemoryHost::new("memory://host"));
//! let owner = generate_signing_key();
//! let proof = owner.sign(host.public_key().await?.as_bytes());
//! let id = host.create(&owner.verifying_key(), &proof).await?;
//!
//! let ledger = HostLedger::open(host, id, Some(owner)).await?;
//! ledger.append(vec![b"{}".to_vec().into()], Some(0)).await?;
//! ```

pub mod error;
pub mod header;
pub mod host;
pub mod keyring;
pub mod ledger;
pub mod memory;

pub use error::{LedgerError, Result};
pub use header::LedgerHeader;
pub use host::Host;
pub use keyring::{Keyring, generate_signing_key};
pub use ledger::{HostLedger, Ledger};
pub use memory::MemoryHost;
