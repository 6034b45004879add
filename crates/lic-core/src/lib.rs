//! # lic-core: Foundational Types for License Issuance
//!
//! The leaf of the workspace DAG. Every other `lic-*` crate depends on it;
//! it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every byte sequence that gets signed or
//!    digested flows through `CanonicalBytes::new()`. There is no other
//!    constructor, so a signature can never be computed over a non-canonical
//!    encoding of a payload.
//!
//! 2. **UTC-only timestamps.** `Timestamp` is always UTC, truncated to seconds,
//!    and renders as `YYYY-MM-DDTHH:MM:SSZ`.
//!
//! 3. **Newtype identifiers.** `LicenseId`, `CustomerId`, `ProductId` and
//!    `EditionId` cannot be swapped for one another.
//!
//! 4. **`sha256_hex()` accepts only `&CanonicalBytes`.**
//!
//! ## Crate Policy
//!
//! - No dependencies on other `lic-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest};
pub use error::{CanonicalizationError, ValidationError};
pub use identity::{CustomerId, EditionId, LicenseId, ProductId, MAX_ID_LEN};
pub use temporal::Timestamp;
