//! Audit logging constants
//!
//! Event names and categories emitted as structured `tracing` fields so the
//! session and credential flows can be filtered consistently in log storage.

/// Event categories
pub mod event_type {
    /// Login, logout and password changes
    pub const AUTHENTICATION: &str = "authentication";

    /// Session lifecycle transitions driven by the server
    pub const SESSION: &str = "session";

    /// Read access to administrative views
    pub const ADMIN_ACTION: &str = "admin_action";
}

/// Authentication event types
pub mod auth_event {
    // Login/Logout Events
    pub const LOGIN_SUCCESS: &str = "login_success";

    /// Invalid password or unknown username (not distinguished)
    pub const LOGIN_FAILED: &str = "login_failed";

    pub const LOGOUT_SUCCESS: &str = "logout_success";

    // Password Events
    pub const PASSWORD_RESET_REQUESTED: &str = "password_reset_requested";

    /// Reset requested for an identity that matches no principal
    pub const PASSWORD_RESET_UNKNOWN_IDENTITY: &str = "password_reset_unknown_identity";

    pub const PASSWORD_RESET_COMPLETED: &str = "password_reset_completed";

    /// Verify or consume with an unknown, used, expired or mismatched token
    pub const PASSWORD_RESET_REJECTED: &str = "password_reset_rejected";
}

/// Session lifecycle events
pub mod session_event {
    /// Older sessions ended because the principal logged in again
    pub const SUPERSEDED: &str = "session_superseded";

    /// Request presented a session ended by a newer login
    pub const CONCURRENT_REJECTED: &str = "session_concurrent_rejected";

    pub const TIMED_OUT: &str = "session_timed_out";

    pub const ANTI_FORGERY_FAILED: &str = "anti_forgery_failed";

    pub const SWEEP_COMPLETED: &str = "session_sweep_completed";
}

/// Admin action types
pub mod admin_action {
    pub const SESSIONS_LISTED: &str = "sessions_listed";
}
