/// Authentication module
///
/// Password hashing, bearer token issuance/verification, and the
/// credential store that ties them to persisted principals.
mod claims;
mod credentials;
mod jwt;
mod password;
mod principal;

pub use claims::Claims;
pub use credentials::CredentialStore;
pub use jwt::{TokenError, TokenService, TOKEN_LIFETIME_DAYS, TOKEN_LIFETIME_LABEL};
pub use password::{PasswordHasher, MAX_PASSWORD_BYTES, MIN_PASSWORD_LENGTH};
pub use principal::{NewUser, PasswordHash, Principal, UserRecord};
