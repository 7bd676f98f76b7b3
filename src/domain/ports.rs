use crate::domain::model::{Args, PortInfo};
use crate::utils::error::{CallError, ConnectionError, Result};
use serde_json::Value;
use std::sync::Arc;

/// A bound callable behind a need port. Failures propagate through
/// `call_port` unmodified.
pub type ProviderFn = Arc<dyn Fn(Args) -> anyhow::Result<Value> + Send + Sync>;

/// Instance contract shared by services, domains and adapters. An instance
/// owns a connection registry for its needs and dispatches calls to its
/// provides; after assembly the registry is treated as read-only.
pub trait Component: Send + Sync {
    /// Component identity used in diagnostics.
    fn name(&self) -> &str;

    /// Declared needs, in declaration order. Pure introspection.
    fn get_needs(&self) -> Vec<PortInfo>;

    /// Offered provides, in declaration order. Pure introspection.
    fn get_provides(&self) -> Vec<PortInfo>;

    fn is_bound(&self, port: &str) -> std::result::Result<bool, ConnectionError>;

    /// Binds a need to a callable. Rebinding a bound need fails; disconnect
    /// first to rebind deliberately.
    fn connect_port(
        &self,
        port: &str,
        provider: ProviderFn,
    ) -> std::result::Result<(), ConnectionError>;

    /// Resets a need to unbound.
    fn disconnect_port(&self, port: &str) -> std::result::Result<(), ConnectionError>;

    /// Invokes a provide port synchronously and returns its result
    /// unmodified.
    fn call_port(&self, port: &str, args: Args) -> std::result::Result<Value, CallError>;
}

/// Definition contract: the immutable blueprint a component instance is
/// produced from. Introspection works without instantiating, so tooling can
/// render the port graph from definitions alone.
pub trait ComponentDef: Send + Sync {
    fn name(&self) -> &str;

    fn needs(&self) -> Vec<PortInfo>;

    fn provides(&self) -> Vec<PortInfo>;

    /// Produces a fresh stateless instance with an empty connection registry.
    fn instantiate(self: Arc<Self>) -> Result<Arc<dyn Component>>;
}

/// Captures one of a component's provide ports as a standalone callable.
pub fn provider_of(
    component: Arc<dyn Component>,
    port: &str,
) -> std::result::Result<ProviderFn, ConnectionError> {
    if !component.get_provides().iter().any(|p| p.name == port) {
        return Err(ConnectionError::PortNotDeclared {
            component: component.name().to_string(),
            port: port.to_string(),
        });
    }
    let name = port.to_string();
    Ok(Arc::new(move |args| {
        component.call_port(&name, args).map_err(anyhow::Error::new)
    }))
}

/// Manual wiring bypass: binds `consumer`'s need directly to `provider`'s
/// same-named provide, outside any auto-wiring pass.
pub fn set_provider(
    consumer: &dyn Component,
    port: &str,
    provider: &Arc<dyn Component>,
) -> std::result::Result<(), ConnectionError> {
    let func = provider_of(Arc::clone(provider), port)?;
    consumer.connect_port(port, func)
}
