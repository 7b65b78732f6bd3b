//! Authentication core: password policy, Argon2id credentials, HS256 bearer
//! tokens, failed-login throttling, and the login/registration flows that tie
//! them together.

pub mod authenticator;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod policy;
pub mod rate_limit;
pub mod security;
pub mod store;
pub mod token;

pub use authenticator::{Authenticator, LoginRequest, ProviderIdentity};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{HashingConfig, RateLimitConfig, SecurityConfig, SecurityKeys, TokenConfig};
pub use credentials::{Credential, CredentialManager, PasswordHash};
pub use error::AuthError;
pub use policy::{validate_username, PasswordPolicy, PasswordRule, SYMBOLS};
pub use rate_limit::{LoginRateLimiter, LoginThrottle, ThrottleKey};
pub use security::SecurityCore;
pub use store::{CredentialStore, MemoryCredentialStore};
pub use token::{BearerToken, Claims, TokenIssuer, TokenResponse, TokenSecret};
