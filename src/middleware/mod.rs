/// Middleware module
///
/// Request authentication and development-mode error detail.
mod authenticator;
mod error_detail;

pub use authenticator::{
    bearer_token, resolve_principal, AuthenticatedPrincipal, Authenticator, Identity,
};
pub use error_detail::ErrorDetail;
