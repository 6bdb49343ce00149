use std::time::Duration;
use tracing::warn;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:2616";
const DEFAULT_SESSION_EXPIRATION_SECS: i64 = 3 * 60 * 60;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 5 * 60;
// Ten years; anything longer cannot be added to the current time safely
const MAX_SESSION_EXPIRATION_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Process configuration, read from the environment at startup
#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    pub cleanup_interval: Duration,
    /// (username, password) pairs for the development credential verifier
    pub users: Vec<(String, String)>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unparsable values fall
    /// back to their defaults with a warning
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("FIREEDGE_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using an insecure development secret");
            "your-secret-key-change-in-production".to_string()
        });

        let session_secs = match parse_or(
            &lookup,
            "SESSION_EXPIRATION_SECS",
            DEFAULT_SESSION_EXPIRATION_SECS,
        ) {
            secs if secs > MAX_SESSION_EXPIRATION_SECS => {
                warn!(
                    value = secs,
                    max = MAX_SESSION_EXPIRATION_SECS,
                    "SESSION_EXPIRATION_SECS out of range, using default"
                );
                DEFAULT_SESSION_EXPIRATION_SECS
            }
            secs => secs.max(1),
        };
        let cleanup_secs = parse_or(
            &lookup,
            "SESSION_CLEANUP_INTERVAL_SECS",
            DEFAULT_CLEANUP_INTERVAL_SECS,
        )
        .max(1);

        let users = lookup("FIREEDGE_USERS")
            .map(|raw| parse_users(&raw))
            .unwrap_or_default();

        Self {
            bind_addr,
            jwt_secret,
            session_ttl: chrono::Duration::seconds(session_secs),
            cleanup_interval: Duration::from_secs(cleanup_secs),
            users,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, "Invalid value, using default");
            default
        }),
        None => default,
    }
}

/// Parses `user:password,user2:password2`; malformed entries are skipped
fn parse_users(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once(':') {
            Some((user, password)) if !user.is_empty() && !password.is_empty() => {
                Some((user.to_string(), password.to_string()))
            }
            _ => {
                warn!("Skipping malformed FIREEDGE_USERS entry");
                None
            }
        })
        .collect()
}
