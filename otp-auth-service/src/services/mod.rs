pub mod auth;
pub mod database;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod memory;
pub mod notifier;
pub mod otp;
pub mod session;
pub mod store;
pub mod sweeper;

pub use auth::{AuthService, Authenticated};
pub use database::Database;
pub use error::{AuthError, CodeRejection};
pub use identity::{IdentityProvisioner, Resolved};
pub use memory::MemoryStore;
pub use notifier::{Notifier, RecordingNotifier, SmtpNotifier};
pub use otp::{IssuedCode, OtpIssuer, OtpVerifier};
pub use session::{SessionClaims, SessionIssuer, SessionToken};
pub use store::{HealthCheck, IdentityStore, OtpStore, StoreError};
pub use sweeper::{spawn_expired_code_sweeper, sweep_expired_codes};
