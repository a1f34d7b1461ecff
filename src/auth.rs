//! Push-delivery authentication: identity tokens, push policies, and remote verification.

pub mod policy;
pub mod token;
pub mod verifier;

pub use policy::*;
pub use token::*;
pub use verifier::*;
