pub mod issuer;
pub mod probe;
pub mod session;
pub mod token_store;

pub use issuer::{CredentialIssuer, OpenIdIssuer};
pub use probe::{HttpSessionProbe, ProbeOutcome, SessionProbe};
pub use session::{establish_session, SessionManager};
pub use token_store::TokenStore;
