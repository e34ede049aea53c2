//! Identity: credential checks, session tokens, and the auth gate for protected routes.
//! Keep the public surface thin and split implementation across sub-modules.

mod gate;
mod principal;
mod provider;
mod token;

pub use gate::{extract_bearer, require_auth, AuthGate};
pub use principal::Principal;
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, RegisterRequest, MIN_PASSWORD_CHARS};
pub use token::{Claims, TokenError, TokenService};
