use crate::domain::model::{Args, NeedsSet};
use crate::domain::ports::ProviderFn;
use crate::utils::error::{CallError, ConnectionError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Per-instance table mapping each declared need to its bound callable, or
/// unbound. Created empty at instantiation, populated during the wiring
/// phase, read-only by convention afterwards.
pub struct ConnectionRegistry {
    component: String,
    needs: NeedsSet,
    bindings: RwLock<HashMap<String, ProviderFn>>,
}

impl ConnectionRegistry {
    pub fn new(component: impl Into<String>, needs: NeedsSet) -> Self {
        ConnectionRegistry {
            component: component.into(),
            needs,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn needs(&self) -> &NeedsSet {
        &self.needs
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderFn>> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProviderFn>> {
        self.bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn assert_declared(&self, port: &str) -> Result<(), ConnectionError> {
        if self.needs.contains(port) {
            Ok(())
        } else {
            Err(ConnectionError::PortNotDeclared {
                component: self.component.clone(),
                port: port.to_string(),
            })
        }
    }

    pub fn connect(&self, port: &str, provider: ProviderFn) -> Result<(), ConnectionError> {
        self.assert_declared(port)?;
        let mut bindings = self.write();
        if bindings.contains_key(port) {
            return Err(ConnectionError::AlreadyBound {
                component: self.component.clone(),
                port: port.to_string(),
            });
        }
        bindings.insert(port.to_string(), provider);
        Ok(())
    }

    pub fn disconnect(&self, port: &str) -> Result<(), ConnectionError> {
        self.assert_declared(port)?;
        self.write().remove(port);
        Ok(())
    }

    pub fn is_bound(&self, port: &str) -> Result<bool, ConnectionError> {
        self.assert_declared(port)?;
        Ok(self.read().contains_key(port))
    }

    /// Declared needs without a binding, in declaration order.
    pub fn unbound_needs(&self) -> Vec<String> {
        let bindings = self.read();
        self.needs
            .names()
            .filter(|name| !bindings.contains_key(*name))
            .map(str::to_string)
            .collect()
    }

    /// Invokes the callable bound to `port`. Each call is an independent
    /// pass-through; nothing is memoized.
    pub fn call(&self, port: &str, args: Args) -> Result<Value, CallError> {
        let declared = self.needs.get(port).ok_or_else(|| CallError::PortNotDeclared {
            component: self.component.clone(),
            port: port.to_string(),
        })?;

        if let Some(signature) = &declared.signature {
            if let Err(reason) = signature.check_args(&args) {
                return Err(CallError::SignatureMismatch {
                    component: self.component.clone(),
                    port: port.to_string(),
                    reason,
                });
            }
        }

        // Clone the binding out so the lock is not held while the provider
        // runs; providers may call back into this registry.
        let provider = self
            .read()
            .get(port)
            .cloned()
            .ok_or_else(|| CallError::DisconnectedPort {
                component: self.component.clone(),
                port: port.to_string(),
            })?;

        provider(args).map_err(restore_call_error)
    }
}

/// Providers carry failures as `anyhow::Error`. When the failure is itself a
/// framework `CallError` (a disconnected port further down a wiring chain),
/// restore it instead of nesting it inside `Provider`.
pub(crate) fn restore_call_error(err: anyhow::Error) -> CallError {
    match err.downcast::<CallError>() {
        Ok(call_err) => call_err,
        Err(other) => CallError::Provider(other),
    }
}

/// Capability-restricted view a provider handler gets over its component's
/// registry: only the needs the provider declared as used are callable.
pub struct Deps<'a> {
    registry: &'a ConnectionRegistry,
    provide: &'a str,
    uses: &'a [String],
}

impl<'a> Deps<'a> {
    pub(crate) fn new(registry: &'a ConnectionRegistry, provide: &'a str, uses: &'a [String]) -> Self {
        Deps {
            registry,
            provide,
            uses,
        }
    }

    pub fn call(&self, need: &str, args: Args) -> Result<Value, CallError> {
        if !self.uses.iter().any(|u| u == need) {
            if self.registry.needs().contains(need) {
                return Err(CallError::UndeclaredNeedCall {
                    component: self.registry.component().to_string(),
                    provide: self.provide.to_string(),
                    need: need.to_string(),
                });
            }
            return Err(CallError::PortNotDeclared {
                component: self.registry.component().to_string(),
                port: need.to_string(),
            });
        }
        self.registry.call(need, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::NeedSpec;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn registry(needs: &[&str]) -> ConnectionRegistry {
        ConnectionRegistry::new("widget", NeedsSet::named(needs.to_vec()).unwrap())
    }

    #[test]
    fn test_call_through_returns_provider_result() {
        let reg = registry(&["lookup"]);
        reg.connect("lookup", Arc::new(|_| Ok(json!(42)))).unwrap();
        assert_eq!(reg.call("lookup", Args::new()).unwrap(), json!(42));
    }

    #[test]
    fn test_each_call_invokes_independently() {
        let reg = registry(&["next_id"]);
        let counter = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&counter);
        reg.connect(
            "next_id",
            Arc::new(move |_| Ok(json!(c.fetch_add(1, Ordering::SeqCst) + 1))),
        )
        .unwrap();

        assert_eq!(reg.call("next_id", Args::new()).unwrap(), json!(1));
        assert_eq!(reg.call("next_id", Args::new()).unwrap(), json!(2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unbound_call_is_deterministically_disconnected() {
        let reg = registry(&["lookup"]);
        for _ in 0..2 {
            let err = reg.call("lookup", Args::new()).unwrap_err();
            assert!(
                matches!(&err, CallError::DisconnectedPort { component, port }
                    if component == "widget" && port == "lookup")
            );
        }
        reg.connect("lookup", Arc::new(|_| Ok(json!(null)))).unwrap();
        assert!(reg.call("lookup", Args::new()).is_ok());
    }

    #[test]
    fn test_connect_unknown_port() {
        let reg = registry(&["lookup"]);
        let err = reg.connect("nope", Arc::new(|_| Ok(json!(null)))).unwrap_err();
        assert!(matches!(err, ConnectionError::PortNotDeclared { .. }));
    }

    #[test]
    fn test_rebind_requires_disconnect() {
        let reg = registry(&["lookup"]);
        reg.connect("lookup", Arc::new(|_| Ok(json!(1)))).unwrap();

        let err = reg.connect("lookup", Arc::new(|_| Ok(json!(2)))).unwrap_err();
        assert!(matches!(err, ConnectionError::AlreadyBound { .. }));

        reg.disconnect("lookup").unwrap();
        reg.connect("lookup", Arc::new(|_| Ok(json!(2)))).unwrap();
        assert_eq!(reg.call("lookup", Args::new()).unwrap(), json!(2));
    }

    #[test]
    fn test_provider_error_passes_through() {
        let reg = registry(&["flaky"]);
        reg.connect("flaky", Arc::new(|_| Err(anyhow::anyhow!("downstream broke"))))
            .unwrap();
        let err = reg.call("flaky", Args::new()).unwrap_err();
        assert!(matches!(&err, CallError::Provider(e) if e.to_string() == "downstream broke"));
    }

    #[test]
    fn test_signature_validation_on_call() {
        let needs =
            NeedsSet::interface([NeedSpec::new("store_order").param("requester")]).unwrap();
        let reg = ConnectionRegistry::new("orders", needs);
        reg.connect("store_order", Arc::new(|_| Ok(json!("ok")))).unwrap();

        let err = reg.call("store_order", Args::new()).unwrap_err();
        assert!(matches!(err, CallError::SignatureMismatch { .. }));

        let err = reg
            .call(
                "store_order",
                Args::new().arg("requester", "a").arg("bogus", 1),
            )
            .unwrap_err();
        assert!(matches!(err, CallError::SignatureMismatch { .. }));

        let ok = reg.call("store_order", Args::new().arg("requester", "a"));
        assert_eq!(ok.unwrap(), json!("ok"));
    }

    #[test]
    fn test_deps_scope_restricted_to_declared_uses() {
        let reg = registry(&["a", "b"]);
        reg.connect("a", Arc::new(|_| Ok(json!("a")))).unwrap();
        reg.connect("b", Arc::new(|_| Ok(json!("b")))).unwrap();

        let uses = vec!["a".to_string()];
        let deps = Deps::new(&reg, "do_thing", &uses);
        assert_eq!(deps.call("a", Args::new()).unwrap(), json!("a"));

        let err = deps.call("b", Args::new()).unwrap_err();
        assert!(matches!(err, CallError::UndeclaredNeedCall { .. }));

        let err = deps.call("missing", Args::new()).unwrap_err();
        assert!(matches!(err, CallError::PortNotDeclared { .. }));
    }
}
