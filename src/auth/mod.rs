pub mod session;

pub use session::{Principal, SessionClaims, SessionVerifier};
