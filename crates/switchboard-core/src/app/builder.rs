//! RouterBuilder - binds a set of endpoints up front, failing fast.
//!
//! `expect_endpoints` declares names that must exist; `build` checks that
//! every expected name ended up bound and reports all missing ones at once.

use std::sync::Arc;

use crate::domain::Status;
use crate::ports::{CallMonitor, Handler, NoopMonitor};
use crate::router::Router;
use crate::runtime::HostedRuntime;

/// Builds a [`Router`].
///
/// # Example
/// ```ignore
/// let router = RouterBuilder::new()
///     .script(runtime, SOURCE, "model")
///     .forward("predict", "model_v2")
///     .expect_endpoints(&["predict", "model_v2"])
///     .build()?;
/// ```
pub struct RouterBuilder {
    bindings: Vec<Binding>,
    expected_endpoints: Option<Vec<String>>,
    monitor: Option<Arc<dyn CallMonitor>>,
}

enum Binding {
    Handler(String, Arc<dyn Handler>),
    Forward { name: String, target: String },
    Script {
        runtime: Arc<HostedRuntime>,
        source: String,
        chunk_name: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing endpoints: {0:?}. These endpoints were expected but not bound.")]
    MissingEndpoints(Vec<String>),

    #[error("binding failed: {0}")]
    Bind(#[from] Status),
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            expected_endpoints: None,
            monitor: None,
        }
    }

    pub fn bind(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.bindings.push(Binding::Handler(name.into(), handler));
        self
    }

    pub fn forward(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.bindings.push(Binding::Forward {
            name: name.into(),
            target: target.into(),
        });
        self
    }

    /// Binds every function the script returns, under its table key.
    pub fn script(
        mut self,
        runtime: Arc<HostedRuntime>,
        source: impl Into<String>,
        chunk_name: impl Into<String>,
    ) -> Self {
        self.bindings.push(Binding::Script {
            runtime,
            source: source.into(),
            chunk_name: chunk_name.into(),
        });
        self
    }

    pub fn expect_endpoints(mut self, names: &[&str]) -> Self {
        self.expected_endpoints = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn monitor(mut self, monitor: Arc<dyn CallMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Binds everything in the order it was added.
    ///
    /// # Errors
    /// - `BuildError::Bind` when a binding fails (duplicate name, bad script)
    /// - `BuildError::MissingEndpoints` when an expected name is not bound
    pub fn build(self) -> Result<Arc<Router>, BuildError> {
        let monitor = self.monitor.unwrap_or_else(|| Arc::new(NoopMonitor));
        let router = Arc::new(Router::with_monitor(monitor));

        for binding in self.bindings {
            match binding {
                Binding::Handler(name, handler) => router.bind(&name, handler)?,
                Binding::Forward { name, target } => router.forward(&name, &target)?,
                Binding::Script {
                    runtime,
                    source,
                    chunk_name,
                } => {
                    router.bind_script(&runtime, &source, &chunk_name)?;
                }
            }
        }

        if let Some(expected) = &self.expected_endpoints {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !router.is_bound(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingEndpoints(missing));
            }
        }
        Ok(router)
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallArguments, CallResult, Payload, SerializedObject, StatusCode};
    use crate::handlers::FnHandler;

    fn unit() -> Arc<dyn Handler> {
        Arc::new(FnHandler::new(|_: &str, _: CallArguments| {
            Ok(CallResult::new(Payload::from_object(&SerializedObject::None)?))
        }))
    }

    #[test]
    fn test_build_success() {
        let router = RouterBuilder::new()
            .bind("ping", unit())
            .forward("alias", "ping")
            .expect_endpoints(&["ping", "alias"])
            .build()
            .unwrap();
        assert_eq!(router.names(), vec!["alias", "ping"]);
    }

    #[test]
    fn test_build_missing_endpoints() {
        let result = RouterBuilder::new()
            .bind("ping", unit())
            .expect_endpoints(&["ping", "pong", "predict"])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingEndpoints(missing)) if missing == vec!["pong".to_string(), "predict".to_string()]
        ));
    }

    #[test]
    fn test_build_duplicate_binding() {
        let result = RouterBuilder::new()
            .bind("ping", unit())
            .bind("ping", unit())
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Bind(status)) if status.code == StatusCode::AlreadyExists
        ));
    }

    #[tokio::test]
    async fn test_build_with_script() {
        let runtime = HostedRuntime::new().unwrap();
        let router = RouterBuilder::new()
            .script(runtime, "return { twice = function(x) return 2 * x end }", "math")
            .expect_endpoints(&["twice"])
            .build()
            .unwrap();

        let args = CallArguments::new()
            .with_arg(Payload::from_object(&SerializedObject::Int(21)).unwrap());
        let result = router.dispatch("twice", args).await.unwrap();
        assert_eq!(result.result.to_object().unwrap(), SerializedObject::Int(42));
    }
}
