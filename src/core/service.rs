use crate::core::registry::{restore_call_error, ConnectionRegistry, Deps};
use crate::domain::model::{Args, Direction, Flags, NeedsSet, Port, PortInfo};
use crate::domain::ports::{Component, ComponentDef};
use crate::utils::error::{CallError, ConnectionError, DefinitionError, Result};
use crate::utils::validation::{check_port_name_format, check_reserved_name};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A provide implementation. Receives the capability-restricted `Deps` view
/// over the owning instance's registry plus the call arguments.
pub type Handler = Arc<dyn Fn(&Deps<'_>, Args) -> anyhow::Result<Value> + Send + Sync>;

/// One registered provide port: name, handler, the need names the handler
/// uses (declared explicitly, checked by the validator), and opaque flags.
pub struct ProvideDecl {
    port: Port,
    uses: Vec<String>,
    flags: Flags,
    handler: Handler,
}

impl ProvideDecl {
    pub fn name(&self) -> &str {
        &self.port.name
    }

    pub fn uses(&self) -> &[String] {
        &self.uses
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    fn info(&self) -> PortInfo {
        PortInfo {
            name: self.port.name.clone(),
            direction: Direction::Provide,
            signature: self.port.signature.clone(),
            flags: self.flags.clone(),
        }
    }
}

/// Immutable definition of a leaf component: a needs set plus a set of
/// provide implementations. Created once, validated once, then reused to
/// produce any number of stateless instances.
pub struct ServiceDef {
    name: String,
    needs: NeedsSet,
    provides: Vec<ProvideDecl>,
}

impl ServiceDef {
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder {
            name: name.into(),
            needs: NeedsSet::empty(),
            provides: Vec::new(),
            state: None,
        }
    }

    pub fn needs_set(&self) -> &NeedsSet {
        &self.needs
    }

    pub(crate) fn provide(&self, name: &str) -> Option<&ProvideDecl> {
        self.provides.iter().find(|p| p.port.name == name)
    }

    fn provide_infos(&self) -> Vec<PortInfo> {
        self.provides.iter().map(ProvideDecl::info).collect()
    }
}

// Handlers are opaque closures, so only the shape is printable.
impl fmt::Debug for ServiceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDef")
            .field("name", &self.name)
            .field("needs", &self.needs.len())
            .field("provides", &self.provides.len())
            .finish()
    }
}

impl ComponentDef for ServiceDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs(&self) -> Vec<PortInfo> {
        self.needs.infos()
    }

    fn provides(&self) -> Vec<PortInfo> {
        self.provide_infos()
    }

    fn instantiate(self: Arc<Self>) -> Result<Arc<dyn Component>> {
        let registry = ConnectionRegistry::new(self.name.clone(), self.needs.clone());
        Ok(Arc::new(ServiceInstance {
            def: self,
            registry,
        }))
    }
}

/// Builds and validates a `ServiceDef`. Validation runs once, in `build`,
/// before any instance can exist; a malformed definition is never
/// instantiable.
pub struct ServiceBuilder {
    name: String,
    needs: NeedsSet,
    provides: Vec<ProvideDecl>,
    state: Option<Value>,
}

impl ServiceBuilder {
    pub fn needs(mut self, needs: NeedsSet) -> Self {
        self.needs = needs;
        self
    }

    /// Registers a provide port. `uses` lists every need name the handler
    /// calls; the validator checks the list against the needs set rather
    /// than inferring it from the handler body.
    pub fn provides<I, F>(self, name: impl Into<String>, uses: I, handler: F) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        F: Fn(&Deps<'_>, Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.provides_with(name, uses, Flags::new(), handler)
    }

    /// Like `provides`, with opaque metadata flags attached for external
    /// tooling. The core never interprets them.
    pub fn provides_with<I, F>(
        mut self,
        name: impl Into<String>,
        uses: I,
        flags: Flags,
        handler: F,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        F: Fn(&Deps<'_>, Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.provides.push(ProvideDecl {
            port: Port {
                name: name.into(),
                direction: Direction::Provide,
                signature: None,
            },
            uses: uses.into_iter().map(Into::into).collect(),
            flags,
            handler: Arc::new(handler),
        });
        self
    }

    /// Attaches construction-time instance state. Components are stateless by
    /// contract, so `build` rejects any definition carrying state with
    /// `HasConstructor`; configuration belongs behind a need port.
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    /// The definition-time validator. Checks run in contract order and fail
    /// fast at the first violated rule.
    pub fn build(self) -> Result<Arc<ServiceDef>> {
        // Set integrity precedes the contract rules: provide names must be
        // unique (the needs set enforced its own uniqueness at construction).
        let mut seen = HashSet::new();
        for decl in &self.provides {
            if !seen.insert(decl.port.name.as_str()) {
                return Err(DefinitionError::DuplicatePort {
                    name: decl.port.name.clone(),
                }
                .into());
            }
        }

        // Rule 1: no construction-time state.
        if self.state.is_some() {
            return Err(DefinitionError::HasConstructor {
                component: self.name,
            }
            .into());
        }

        // Rule 2: every declared use names a port in the needs set.
        for decl in &self.provides {
            for used in &decl.uses {
                if !self.needs.contains(used) {
                    return Err(DefinitionError::UndeclaredNeedAccess {
                        component: self.name,
                        provide: decl.port.name.clone(),
                        need: used.clone(),
                    }
                    .into());
                }
            }
        }

        // Rule 3: every declared need is used by at least one provider.
        for need in self.needs.names() {
            if !self.provides.iter().any(|d| d.uses.iter().any(|u| u == need)) {
                return Err(DefinitionError::UnusedNeedDeclaration {
                    component: self.name,
                    need: need.to_string(),
                }
                .into());
            }
        }

        // Rules 4 and 5: name format, then the reserved vocabulary, over all
        // ports in declaration order (needs first).
        let all_names: Vec<&str> = self
            .needs
            .names()
            .chain(self.provides.iter().map(|d| d.port.name.as_str()))
            .collect();
        for name in &all_names {
            check_port_name_format(name)?;
        }
        for name in &all_names {
            check_reserved_name(name)?;
        }

        tracing::debug!(
            service = %self.name,
            needs = self.needs.len(),
            provides = self.provides.len(),
            "service definition validated"
        );

        Ok(Arc::new(ServiceDef {
            name: self.name,
            needs: self.needs,
            provides: self.provides,
        }))
    }
}

/// A live, stateless service instance: the shared definition plus its own
/// connection registry.
pub struct ServiceInstance {
    def: Arc<ServiceDef>,
    registry: ConnectionRegistry,
}

impl Component for ServiceInstance {
    fn name(&self) -> &str {
        self.def.name()
    }

    fn get_needs(&self) -> Vec<PortInfo> {
        self.def.needs_set().infos()
    }

    fn get_provides(&self) -> Vec<PortInfo> {
        self.def.provide_infos()
    }

    fn is_bound(&self, port: &str) -> std::result::Result<bool, ConnectionError> {
        self.registry.is_bound(port)
    }

    fn connect_port(
        &self,
        port: &str,
        provider: crate::domain::ports::ProviderFn,
    ) -> std::result::Result<(), ConnectionError> {
        self.registry.connect(port, provider)
    }

    fn disconnect_port(&self, port: &str) -> std::result::Result<(), ConnectionError> {
        self.registry.disconnect(port)
    }

    fn call_port(&self, port: &str, args: Args) -> std::result::Result<Value, CallError> {
        let decl = self.def.provide(port).ok_or_else(|| CallError::PortNotDeclared {
            component: self.def.name().to_string(),
            port: port.to_string(),
        })?;
        let deps = Deps::new(&self.registry, &decl.port.name, &decl.uses);
        (decl.handler)(&deps, args).map_err(restore_call_error)
    }
}
