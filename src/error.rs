use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `skypromo`.
///
/// Each subsystem defines its own error variant. Configuration and auth
/// failures are fatal and abort the run before any state mutation; remote
/// failures are caught at per-item scope and converted to skip-and-log;
/// state integrity refusals are never retried against the network.
#[derive(Debug, Error)]
pub enum PromoError {
    // ── Config / startup ────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Remote API ──────────────────────────────────────────────────────
    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    // ── Persisted state ─────────────────────────────────────────────────
    #[error("state: {0}")]
    State(#[from] StateError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credentials: set SKYPROMO_IDENTIFIER and SKYPROMO_PASSWORD")]
    MissingCredentials,

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("allow list and exclude list are mutually exclusive")]
    ConflictingAuthorLists,

    #[error("unresolvable source link: {0}")]
    UnresolvableLink(String),
}

// ─── Remote API errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("authentication failed for {identifier}: {message}")]
    Auth { identifier: String, message: String },

    #[error("{endpoint} request failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} response decode failed: {message}")]
    Decode { endpoint: String, message: String },
}

// ─── State errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file parse failed: {0}")]
    Parse(String),

    #[error("refusing to delete record {uri}: owned by {owner}, not {me}")]
    ForeignRecord {
        uri: String,
        owner: String,
        me: String,
    },

    #[error("malformed record uri: {0}")]
    MalformedUri(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, PromoError>;
