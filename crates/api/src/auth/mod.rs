//! Session and credential lifecycle

pub mod anti_forgery;
pub mod context;
pub mod cookies;
pub mod credentials;
pub mod inventory;
pub mod login;
pub mod logout;
pub mod middleware;
pub mod password;
pub mod registry;
pub mod reset;
pub mod validation;

pub use anti_forgery::{anti_forgery, AntiForgeryCoordinator};
pub use context::{AuthSession, RequestContext};
pub use credentials::CredentialVerifier;
pub use inventory::{humanize, humanize_remaining, SessionInventory, SessionView};
pub use login::{AuthenticationCoordinator, LoginResult};
pub use logout::LogoutCoordinator;
pub use middleware::{optional_session, require_admin, require_session, ADMIN_ROLE};
pub use password::{hash_password, verify_password, validate_password_strength, HashingParams};
pub use registry::{
    SessionId, SessionRecord, SessionRegistry, SessionStatus, SweepStats, TokenLookup, Touch,
};
pub use reset::ResetTokenManager;
