//! Skill registry: explicit map from action identifiers to handlers.
//!
//! Catalog entries name their handler with a dot-delimited action such as
//! `"time.now"`. Handlers are registered up front, so a catalog that refers to
//! an action nobody registered can be reported at startup
//! ([`SkillRegistry::missing_actions`]) instead of failing on first use.
//!
//! Invocation never unwinds into the caller: a panicking handler becomes
//! [`SkillError::Panicked`], and with [`SkillRegistry::with_timeout`] a slow
//! handler becomes [`SkillError::Timeout`].

pub mod builtins;
pub mod error;
pub mod trait_def;

pub use error::SkillError;
pub use trait_def::{SkillContext, SkillFactory, SkillHandler};

use crate::dataset::Dataset;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, warn};

/// Action identifier → handler map.
#[derive(Clone, Default)]
pub struct SkillRegistry {
    handlers: BTreeMap<String, Arc<dyn SkillHandler>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("actions", &self.actions())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SkillRegistry {
    /// An empty registry with no invocation timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run each handler on its own thread and give up after `timeout`.
    ///
    /// A timed-out handler keeps running in the background; its result is
    /// discarded.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bind `handler` to `action`, replacing any previous binding.
    pub fn register(&mut self, action: impl Into<String>, handler: impl SkillHandler + 'static) {
        let action = action.into();
        if self
            .handlers
            .insert(action.clone(), Arc::new(handler))
            .is_some()
        {
            debug!(action = %action, "skill handler replaced");
        }
    }

    /// Bind a closure to `action`.
    pub fn register_fn<F>(&mut self, action: impl Into<String>, f: F)
    where
        F: Fn(&SkillContext) -> Result<String, SkillError> + Send + Sync + 'static,
    {
        self.register(action, f);
    }

    /// Whether `action` has a handler.
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action identifiers, sorted.
    pub fn actions(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Actions the catalog refers to that have no handler, sorted.
    pub fn missing_actions(&self, dataset: &Dataset) -> Vec<String> {
        dataset
            .actions()
            .into_iter()
            .filter(|action| !self.contains(action))
            .map(str::to_owned)
            .collect()
    }

    /// Invoke the handler bound to `ctx.action`.
    ///
    /// # Errors
    ///
    /// [`SkillError::UnknownAction`] if nothing is bound, otherwise whatever
    /// the handler returns, plus [`SkillError::Panicked`] and
    /// [`SkillError::Timeout`].
    pub fn invoke(&self, ctx: &SkillContext) -> Result<String, SkillError> {
        let Some(handler) = self.handlers.get(&ctx.action) else {
            return Err(SkillError::UnknownAction {
                action: ctx.action.clone(),
            });
        };
        match self.timeout {
            None => invoke_caught(handler.as_ref(), ctx),
            Some(timeout) => invoke_with_timeout(Arc::clone(handler), ctx, timeout),
        }
    }
}

fn invoke_caught(handler: &dyn SkillHandler, ctx: &SkillContext) -> Result<String, SkillError> {
    catch_unwind(AssertUnwindSafe(|| handler.invoke(ctx))).unwrap_or_else(|_| {
        Err(SkillError::Panicked {
            action: ctx.action.clone(),
        })
    })
}

fn invoke_with_timeout(
    handler: Arc<dyn SkillHandler>,
    ctx: &SkillContext,
    timeout: Duration,
) -> Result<String, SkillError> {
    let (tx, rx) = mpsc::channel();
    let owned = ctx.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("skill-{}", ctx.action))
        .spawn(move || {
            let result = invoke_caught(handler.as_ref(), &owned);
            let _ = tx.send(result);
        });
    if let Err(e) = spawned {
        return Err(SkillError::failed(
            ctx.action.clone(),
            format!("could not start skill thread: {e}"),
        ));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(action = %ctx.action, timeout_ms = timeout.as_millis(), "skill timed out");
            Err(SkillError::Timeout {
                action: ctx.action.clone(),
                timeout_secs: timeout.as_secs(),
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(SkillError::Panicked {
            action: ctx.action.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn ctx(action: &str) -> SkillContext {
        SkillContext::new(action, "ru")
    }

    #[test]
    fn registered_closure_is_invoked() {
        let mut registry = SkillRegistry::new();
        registry.register_fn("echo.lang", |ctx| Ok(format!("lang={}", ctx.language)));
        assert!(registry.contains("echo.lang"));
        assert_eq!(registry.invoke(&ctx("echo.lang")).unwrap(), "lang=ru");
    }

    #[test]
    fn unknown_action_is_an_error() {
        let registry = SkillRegistry::new();
        let err = registry.invoke(&ctx("web.search")).unwrap_err();
        assert!(matches!(err, SkillError::UnknownAction { ref action } if action == "web.search"));
    }

    #[test]
    fn panicking_handler_is_contained() {
        let mut registry = SkillRegistry::new();
        registry.register_fn("bad.skill", |_| panic!("boom"));
        let err = registry.invoke(&ctx("bad.skill")).unwrap_err();
        assert!(matches!(err, SkillError::Panicked { .. }));
    }

    #[test]
    fn slow_handler_times_out() {
        let mut registry = SkillRegistry::new().with_timeout(Duration::from_millis(20));
        registry.register_fn("slow.skill", |_| {
            std::thread::sleep(Duration::from_millis(500));
            Ok("late".to_owned())
        });
        registry.register_fn("fast.skill", |_| Ok("quick".to_owned()));
        assert!(matches!(
            registry.invoke(&ctx("slow.skill")),
            Err(SkillError::Timeout { .. })
        ));
        assert_eq!(registry.invoke(&ctx("fast.skill")).unwrap(), "quick");
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = SkillRegistry::new();
        registry.register_fn("a.b", |_| Ok("one".to_owned()));
        registry.register_fn("a.b", |_| Ok("two".to_owned()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.invoke(&ctx("a.b")).unwrap(), "two");
    }

    #[test]
    fn missing_actions_reports_unbound_catalog_actions() {
        let dataset = Dataset::from_toml_str(
            r#"
            [[skills.time.commands]]
            patterns = ["который час"]
            action = "time.now"
            response = "..."

            [[skills.web.commands]]
            patterns = ["найди в интернете"]
            action = "web.search"
            response = "..."
        "#,
        )
        .unwrap();
        let mut registry = SkillRegistry::new();
        registry.register_fn("time.now", |_| Ok("12:00".to_owned()));
        assert_eq!(registry.missing_actions(&dataset), vec!["web.search".to_owned()]);
        assert_eq!(registry.actions(), vec!["time.now"]);
    }
}
