//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → token.rs (verify signature, check expiry)
//!     → access_control.rs (role ∈ allowed set?)
//!     → rate_limit.rs (per-principal sliding window)
//!     → business logic
//!         → cipher.rs (seal sensitive fields before persistence,
//!                      open them on the way back out)
//! ```
//!
//! # Design Decisions
//! - Fail closed: authentication, authorization and rate-limit failures are
//!   rejections with categorical messages
//! - Every component is an explicitly constructed value; there is no
//!   process-wide security singleton
//! - Decryption is the one deliberate exception to failing closed, so read
//!   paths survive legacy or corrupt ciphertext

pub mod access_control;
pub mod cipher;
pub mod clock;
pub mod error;
pub mod password;
pub mod rate_limit;
pub mod sanitize;
pub mod token;

pub use access_control::{authorize, policy, roles};
pub use cipher::{FieldCipher, DECRYPTION_PLACEHOLDER};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SecurityError, SecurityResult};
pub use rate_limit::{LocalWindowStore, RateLimiter, RatePolicy, WindowStore};
pub use token::{IssuedToken, TokenClaims, TokenService};
