//! Token-keyed registry of deferred trace actions.
//!
//! A UI layer embeds the token (e.g. as a link target) and invokes it later,
//! possibly from another thread, without holding the action itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::domain::TraceAction;
use crate::error::{Result, SanityError};
use crate::obs::emit_trace_invoked;

/// Opaque handle for a registered trace action. Rendered as `trace-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceToken(u64);

impl fmt::Display for TraceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace-{}", self.0)
    }
}

impl FromStr for TraceToken {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.strip_prefix("trace-")
            .and_then(|n| n.parse::<u64>().ok())
            .map(TraceToken)
            .ok_or_else(|| format!("invalid trace token: {s}"))
    }
}

/// Maps fresh tokens to one-shot trace actions.
///
/// Tokens come from a monotonic counter and are never reused for the
/// registry's lifetime.
pub struct TraceActionRegistry {
    next: AtomicU64,
    actions: Mutex<HashMap<TraceToken, TraceAction>>,
}

impl TraceActionRegistry {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            actions: Mutex::new(HashMap::new()),
        }
    }

    /// Store `action` under a fresh token.
    pub fn register(&self, action: TraceAction) -> TraceToken {
        let token = TraceToken(self.next.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(token, action);
        debug!(token = %token, "registered trace action");
        token
    }

    /// Run the action stored under `token` and clear the association.
    ///
    /// The action runs outside the registry lock, so it may itself register
    /// or invoke tokens. Unknown, revoked or already-invoked tokens yield
    /// [`SanityError::StaleToken`].
    pub fn invoke(&self, token: TraceToken) -> Result<()> {
        let action = self.lock().remove(&token);
        match action {
            Some(action) => {
                emit_trace_invoked(&token.to_string(), true);
                action();
                Ok(())
            }
            None => {
                emit_trace_invoked(&token.to_string(), false);
                Err(SanityError::StaleToken(token))
            }
        }
    }

    /// Drop the given tokens; already-cleared tokens are ignored.
    pub fn revoke(&self, tokens: &[TraceToken]) -> usize {
        let mut actions = self.lock();
        tokens
            .iter()
            .filter(|t| actions.remove(*t).is_some())
            .count()
    }

    pub fn contains(&self, token: TraceToken) -> bool {
        self.lock().contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TraceToken, TraceAction>> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TraceActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TraceActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceActionRegistry")
            .field("registered", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_action(counter: &Arc<AtomicUsize>) -> TraceAction {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_token_display_and_parse() {
        let token = TraceToken(42);
        assert_eq!(token.to_string(), "trace-42");
        assert_eq!("trace-42".parse::<TraceToken>(), Ok(token));
        assert!("trace-x".parse::<TraceToken>().is_err());
        assert!("42".parse::<TraceToken>().is_err());
    }

    #[test]
    fn test_invoke_runs_action_once() {
        let registry = TraceActionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let token = registry.register(counting_action(&calls));

        registry.invoke(token).expect("first invoke failed");
        let second = registry.invoke(token);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(second, Err(SanityError::StaleToken(t)) if t == token));
    }

    #[test]
    fn test_unknown_token_is_stale() {
        let registry = TraceActionRegistry::new();
        let err = registry.invoke(TraceToken(999)).unwrap_err();
        assert!(err.to_string().contains("trace-999"));
    }

    #[test]
    fn test_tokens_are_fresh() {
        let registry = TraceActionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let token = registry.register(counting_action(&calls));
            registry.invoke(token).expect("invoke failed");
            assert!(seen.insert(token), "token {token} reused");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_revoke() {
        let registry = TraceActionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let a = registry.register(counting_action(&calls));
        let b = registry.register(counting_action(&calls));

        assert_eq!(registry.revoke(&[a, TraceToken(12345)]), 1);
        assert!(!registry.contains(a));
        assert!(registry.contains(b));
        assert!(registry.invoke(a).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_action_may_reenter_registry() {
        let registry = Arc::new(TraceActionRegistry::new());
        let inner = Arc::clone(&registry);
        let token = registry.register(Arc::new(move || {
            inner.register(Arc::new(|| {}));
        }));

        registry.invoke(token).expect("invoke failed");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_register_and_invoke() {
        let registry = Arc::new(TraceActionRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let token = registry.register(counting_action(&calls));
                        registry.invoke(token).expect("invoke failed");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 400);
        assert!(registry.is_empty());
    }
}
