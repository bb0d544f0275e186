//! Core types and stores for the onboarding wizard state service.
//!
//! Three stores, each owning one record type:
//! - `SessionStore`: time-boxed wizard sessions
//! - `DraftStore`: versioned step-by-step draft data
//! - `OtpAttemptTracker`: per-mobile-number challenge and lockout state
//!
//! Expected conditions (not found, expired, locked) are returned as outcome
//! enums; `Err` is reserved for store faults.

pub mod clock;
pub mod draft;
pub mod error;
pub mod limits;
pub mod mobile;
pub mod otp;
pub mod session;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use draft::*;
pub use error::{Error, Result};
pub use mobile::MobileNumber;
pub use otp::*;
pub use session::*;
pub use store::{InMemoryStore, KeyedStore, Retention};
