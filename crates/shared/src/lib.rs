//! Warden Shared Types and Utilities
//!
//! Domain types, the persistence seams and the clock shared by the Warden services.

pub mod clock;
pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::*;
pub use error::*;
pub use store::{MemoryStore, PgStore, PrincipalStore, RedeemOutcome, Redemption, TokenStore};
pub use types::*;
