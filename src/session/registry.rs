use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, instrument, warn};

use super::types::{SessionLookup, TokenInfo};
use crate::shared::AppError;

#[derive(Debug, Clone)]
struct TokenEntry {
    expires: DateTime<Utc>,
    seq: u64, // Issue order within the registry
}

#[derive(Default)]
struct RegistryState {
    // user -> (token -> entry). A user only has an entry while it owns tokens.
    sessions: HashMap<String, HashMap<String, TokenEntry>>,
    // token -> user
    index: HashMap<String, String>,
    next_seq: u64,
}

impl RegistryState {
    /// Drops `token` from both maps. Returns the owning user if it was present.
    fn detach(&mut self, token: &str) -> Option<String> {
        let user = self.index.remove(token)?;

        match self.sessions.get_mut(&user) {
            Some(tokens) => {
                tokens.remove(token);
                if tokens.is_empty() {
                    self.sessions.remove(&user);
                    debug!(user = %user, "Last token removed, session dropped");
                }
            }
            None => {
                warn!(user = %user, "Reverse index pointed at a missing session");
            }
        }

        Some(user)
    }
}

/// Process-wide record of which bearer tokens are valid and who owns them.
///
/// Holds a forward map (user to tokens) and a reverse index (token to user)
/// behind a single mutex, so the two are never observed out of step. All
/// operations are synchronous and do no I/O.
///
/// The process creates one instance at startup and hands it out through
/// `AppState`; tests build their own isolated instances.
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }

    // Every mutation finishes before its guard drops, so a poisoned lock
    // still protects consistent data.
    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `token` for `user`, creating the user's session if needed.
    ///
    /// Empty arguments are rejected with `InvalidArgument`. A token that is
    /// already registered is rejected with `Conflict`, whichever user owns it.
    #[instrument(skip(self, token))]
    pub fn add_session(
        &self,
        user: &str,
        token: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if user.is_empty() {
            return Err(AppError::InvalidArgument("user must not be empty".to_string()));
        }
        if token.is_empty() {
            return Err(AppError::InvalidArgument("token must not be empty".to_string()));
        }

        let mut state = self.state();

        if state.index.contains_key(token) {
            warn!(user = %user, "Token is already registered");
            return Err(AppError::Conflict("token already registered".to_string()));
        }

        let seq = state.next_seq;
        state.next_seq += 1;

        state
            .sessions
            .entry(user.to_string())
            .or_default()
            .insert(token.to_string(), TokenEntry { expires, seq });
        state.index.insert(token.to_string(), user.to_string());

        debug!(
            user = %user,
            expires = %expires,
            user_tokens = state.sessions.get(user).map_or(0, |t| t.len()),
            "Session token added"
        );
        Ok(())
    }

    /// Resolves a token to its user and expiry. Expiry is not checked here.
    pub fn lookup_session(&self, token: &str) -> Option<SessionLookup> {
        let state = self.state();
        let user = state.index.get(token)?;
        let entry = state.sessions.get(user)?.get(token)?;

        Some(SessionLookup {
            user: user.clone(),
            expires: entry.expires,
        })
    }

    /// Revokes a token. Unknown tokens are a no-op and return `None`;
    /// otherwise the owning user is returned.
    #[instrument(skip(self, token))]
    pub fn remove_session(&self, token: &str) -> Option<String> {
        let removed = self.state().detach(token);

        match &removed {
            Some(user) => debug!(user = %user, "Session token removed"),
            None => debug!("Token not registered, nothing to remove"),
        }

        removed
    }

    /// Revokes every token owned by `user` and returns them
    #[instrument(skip(self))]
    pub fn remove_user_sessions(&self, user: &str) -> Vec<String> {
        let mut state = self.state();

        let tokens: Vec<String> = match state.sessions.remove(user) {
            Some(tokens) => tokens.into_keys().collect(),
            None => return Vec::new(),
        };
        for token in &tokens {
            state.index.remove(token);
        }

        debug!(user = %user, removed = tokens.len(), "All user tokens removed");
        tokens
    }

    /// Revokes every token whose expiry is at or before `now` and returns them
    #[instrument(skip(self))]
    pub fn remove_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut state = self.state();

        let expired: Vec<String> = state
            .sessions
            .values()
            .flat_map(|tokens| tokens.iter())
            .filter(|(_, entry)| entry.expires <= now)
            .map(|(token, _)| token.clone())
            .collect();

        for token in &expired {
            state.detach(token);
        }

        debug!(removed = expired.len(), "Expired tokens removed");
        expired
    }

    /// Number of users with at least one active token
    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    /// Number of active tokens across all users
    pub fn token_count(&self) -> usize {
        self.state().index.len()
    }

    pub fn has_session(&self, user: &str) -> bool {
        self.state().sessions.contains_key(user)
    }

    /// Active tokens for `user`, oldest first
    pub fn user_tokens(&self, user: &str) -> Vec<TokenInfo> {
        let state = self.state();
        let Some(tokens) = state.sessions.get(user) else {
            return Vec::new();
        };

        let mut entries: Vec<(&String, &TokenEntry)> = tokens.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.seq);
        entries
            .into_iter()
            .map(|(token, entry)| TokenInfo {
                token: token.clone(),
                expires: entry.expires,
            })
            .collect()
    }

    /// True when the forward map and the reverse index describe the same set
    /// of (user, token) pairs and no user is left with an empty collection.
    pub fn is_consistent(&self) -> bool {
        let state = self.state();

        let forward_total: usize = state.sessions.values().map(|t| t.len()).sum();
        if forward_total != state.index.len() {
            return false;
        }

        state.sessions.iter().all(|(user, tokens)| {
            !tokens.is_empty()
                && tokens
                    .keys()
                    .all(|token| state.index.get(token) == Some(user))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn in_an_hour() -> DateTime<Utc> {
        Utc::now() + Duration::hours(1)
    }

    #[test]
    fn test_add_then_lookup() {
        let registry = SessionRegistry::new();
        let expires = in_an_hour();

        registry.add_session("alice", "tok1", expires).unwrap();

        let found = registry.lookup_session("tok1").unwrap();
        assert_eq!(found.user, "alice");
        assert_eq!(found.expires, expires);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_lookup_never_issued() {
        let registry = SessionRegistry::new();
        assert!(registry.lookup_session("never-issued").is_none());
    }

    #[test]
    fn test_multiple_tokens_same_user() {
        let registry = SessionRegistry::new();
        let expires = in_an_hour();

        registry.add_session("alice", "tok1", expires).unwrap();
        registry.add_session("alice", "tok2", expires).unwrap();

        assert_eq!(registry.lookup_session("tok1").unwrap().user, "alice");
        assert_eq!(registry.lookup_session("tok2").unwrap().user, "alice");
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.token_count(), 2);

        assert_eq!(registry.remove_session("tok1"), Some("alice".to_string()));

        assert!(registry.lookup_session("tok1").is_none());
        assert_eq!(registry.lookup_session("tok2").unwrap().user, "alice");
        assert!(registry.has_session("alice"));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_last_token_removal_drops_session() {
        let registry = SessionRegistry::new();
        registry.add_session("alice", "tok1", in_an_hour()).unwrap();
        registry.add_session("alice", "tok2", in_an_hour()).unwrap();

        registry.remove_session("tok1");
        registry.remove_session("tok2");

        assert!(!registry.has_session("alice"));
        assert_eq!(registry.session_count(), 0);
        assert_eq!(registry.token_count(), 0);
        assert!(registry.user_tokens("alice").is_empty());
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let registry = SessionRegistry::new();
        registry.add_session("alice", "tok1", in_an_hour()).unwrap();
        registry.add_session("bob", "tokB", in_an_hour()).unwrap();

        assert!(registry.remove_session("tok1").is_some());
        assert!(registry.remove_session("tok1").is_none());

        assert_eq!(registry.lookup_session("tokB").unwrap().user, "bob");
        assert_eq!(registry.session_count(), 1);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_readd_after_removal() {
        let registry = SessionRegistry::new();
        let expires = Utc::now() + Duration::seconds(10);

        registry.add_session("bob", "tokA", expires).unwrap();
        registry.remove_session("tokA");
        registry.add_session("bob", "tokB", expires).unwrap();

        assert_eq!(registry.lookup_session("tokB").unwrap().user, "bob");
        let tokens = registry.user_tokens("bob");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, "tokB");
    }

    #[test]
    fn test_empty_arguments_rejected() {
        let registry = SessionRegistry::new();

        assert!(matches!(
            registry.add_session("", "tok", in_an_hour()),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.add_session("alice", "", in_an_hour()),
            Err(AppError::InvalidArgument(_))
        ));
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let registry = SessionRegistry::new();
        registry.add_session("alice", "tok1", in_an_hour()).unwrap();

        let same_user = registry.add_session("alice", "tok1", in_an_hour());
        assert!(matches!(same_user, Err(AppError::Conflict(_))));

        let other_user = registry.add_session("bob", "tok1", in_an_hour());
        assert!(matches!(other_user, Err(AppError::Conflict(_))));

        assert_eq!(registry.user_tokens("alice").len(), 1);
        assert!(!registry.has_session("bob"));
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_user_tokens_in_issue_order() {
        let registry = SessionRegistry::new();
        for token in ["c", "a", "b"] {
            registry.add_session("alice", token, in_an_hour()).unwrap();
        }

        let order: Vec<String> = registry
            .user_tokens("alice")
            .into_iter()
            .map(|t| t.token)
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_remove_user_sessions() {
        let registry = SessionRegistry::new();
        registry.add_session("alice", "tok1", in_an_hour()).unwrap();
        registry.add_session("alice", "tok2", in_an_hour()).unwrap();
        registry.add_session("bob", "tokB", in_an_hour()).unwrap();

        let mut removed = registry.remove_user_sessions("alice");
        removed.sort();
        assert_eq!(removed, vec!["tok1", "tok2"]);

        assert!(registry.lookup_session("tok1").is_none());
        assert!(registry.lookup_session("tok2").is_none());
        assert!(registry.lookup_session("tokB").is_some());
        assert!(registry.remove_user_sessions("alice").is_empty());
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_remove_expired() {
        let registry = SessionRegistry::new();
        let now = Utc::now();

        registry
            .add_session("alice", "old", now - Duration::minutes(5))
            .unwrap();
        registry.add_session("alice", "fresh", now + Duration::hours(1)).unwrap();
        registry.add_session("bob", "edge", now).unwrap();

        let mut expired = registry.remove_expired(now);
        expired.sort();
        assert_eq!(expired, vec!["edge", "old"]);

        assert!(registry.lookup_session("fresh").is_some());
        assert!(!registry.has_session("bob"));
        assert_eq!(registry.session_count(), 1);
        assert!(registry.is_consistent());
    }

    #[test]
    fn test_concurrent_add_remove_different_tokens() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(SessionRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let user = format!("user-{}", worker % 3);
                    for i in 0..200 {
                        let token = format!("tok-{}-{}", worker, i);
                        registry.add_session(&user, &token, in_an_hour()).unwrap();
                        if i % 2 == 0 {
                            registry.remove_session(&token);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.token_count(), 8 * 100);
        assert_eq!(registry.session_count(), 3);
        assert!(registry.is_consistent());
    }
}
