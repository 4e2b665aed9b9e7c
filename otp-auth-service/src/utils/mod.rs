pub mod email;
pub mod validation;

pub use email::{is_valid_email, normalize_email};
pub use validation::ValidatedJson;
