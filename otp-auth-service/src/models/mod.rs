//! Domain models: identities and one-time-passcode records.

pub mod identity;
pub mod otp_record;

pub use identity::{Identity, PublicIdentity};
pub use otp_record::{NewOtpRecord, OtpPurpose, OtpRecord, OtpState};
