use crate::domain::model::{Args, Direction, NeedsSet, Port, PortInfo, Signature};
use crate::domain::ports::{provider_of, Component, ComponentDef, ProviderFn};
use crate::utils::error::{
    Ambiguity, CallError, ConnectionError, DefinitionError, Result, WiringError,
};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// How a domain picks its published provides from the union of its
/// children's provide names.
#[derive(Debug, Clone, Default)]
pub enum ProvideSelection {
    /// Publish every provide offered by any child.
    #[default]
    All,
    /// Publish exactly these names, each of which must exist on some child.
    Names(Vec<String>),
    /// Publish every union name matching the regex.
    Pattern(Regex),
}

impl ProvideSelection {
    pub fn all() -> Self {
        ProvideSelection::All
    }

    pub fn names<I>(names: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        ProvideSelection::Names(names.into_iter().map(Into::into).collect())
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| DefinitionError::InvalidSelectionPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(ProvideSelection::Pattern(regex))
    }
}

/// One provide published by a domain, dispatching to the owning child.
#[derive(Clone)]
struct DomainProvide {
    info: PortInfo,
    owner: usize,
}

/// One internal connection recorded at definition time and materialised at
/// every instantiation.
struct InternalBinding {
    port: String,
    consumer: usize,
    provider: usize,
}

/// Composite component definition: an ordered list of child definitions plus
/// a provide selection. The internal wiring, the residual needs and the
/// published provides are all derived once, at definition time; instantiation
/// can no longer fail validation.
pub struct DomainDef {
    name: String,
    children: Vec<Arc<dyn ComponentDef>>,
    needs: NeedsSet,
    /// Residual need name -> children whose same-named need stayed unbound
    /// after the internal pass. Connects on the domain fan out to all of them.
    residual_consumers: Vec<(String, Vec<usize>)>,
    provides: Vec<DomainProvide>,
    internal_bindings: Vec<InternalBinding>,
}

// Children are trait objects, so only the shape is printable.
impl fmt::Debug for DomainDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainDef")
            .field("name", &self.name)
            .field("children", &self.children.len())
            .field("needs", &self.needs.len())
            .field("provides", &self.provides.len())
            .finish()
    }
}

impl DomainDef {
    pub fn builder(name: impl Into<String>) -> DomainBuilder {
        DomainBuilder {
            name: name.into(),
            children: Vec::new(),
            selection: ProvideSelection::default(),
        }
    }
}

pub struct DomainBuilder {
    name: String,
    children: Vec<Arc<dyn ComponentDef>>,
    selection: ProvideSelection,
}

impl DomainBuilder {
    pub fn child(mut self, def: Arc<dyn ComponentDef>) -> Self {
        self.children.push(def);
        self
    }

    pub fn children<I>(mut self, defs: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn ComponentDef>>,
    {
        self.children.extend(defs);
        self
    }

    pub fn provides(mut self, selection: ProvideSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn build(self) -> Result<Arc<DomainDef>> {
        let child_needs: Vec<Vec<PortInfo>> = self.children.iter().map(|c| c.needs()).collect();
        let child_provides: Vec<Vec<PortInfo>> =
            self.children.iter().map(|c| c.provides()).collect();

        // Union of provide names in first-appearance order.
        let mut provide_index: Vec<(String, Vec<usize>)> = Vec::new();
        for (ci, provides) in child_provides.iter().enumerate() {
            for port in provides {
                match provide_index.iter_mut().find(|(name, _)| *name == port.name) {
                    Some((_, owners)) => owners.push(ci),
                    None => provide_index.push((port.name.clone(), vec![ci])),
                }
            }
        }

        // Internal dry wiring over names: for each child need, scan all
        // *other* children's provides. A still-unbound need with two or more
        // candidates is ambiguous and fails the definition immediately.
        let mut internal_bindings = Vec::new();
        let mut residual: Vec<(String, Vec<usize>)> = Vec::new();
        for (ci, needs) in child_needs.iter().enumerate() {
            for port in needs {
                let candidates: Vec<usize> = provide_index
                    .iter()
                    .find(|(name, _)| *name == port.name)
                    .map(|(_, owners)| owners.iter().copied().filter(|o| *o != ci).collect())
                    .unwrap_or_default();

                match candidates.as_slice() {
                    [] => match residual.iter_mut().find(|(name, _)| *name == port.name) {
                        Some((_, consumers)) => consumers.push(ci),
                        None => residual.push((port.name.clone(), vec![ci])),
                    },
                    [provider] => {
                        tracing::debug!(
                            domain = %self.name,
                            port = %port.name,
                            consumer = %self.children[ci].name(),
                            provider = %self.children[*provider].name(),
                            "internal connection discovered"
                        );
                        internal_bindings.push(InternalBinding {
                            port: port.name.clone(),
                            consumer: ci,
                            provider: *provider,
                        });
                    }
                    many => {
                        return Err(WiringError {
                            ambiguities: vec![Ambiguity {
                                port: port.name.clone(),
                                consumer: self.children[ci].name().to_string(),
                                candidates: many
                                    .iter()
                                    .map(|o| self.children[*o].name().to_string())
                                    .collect(),
                            }],
                            unresolved: Vec::new(),
                        }
                        .into());
                    }
                }
            }
        }

        // Residual needs become the domain's own needs set. Signatures are
        // inherited from the consumers; consumers declaring different
        // signatures for the same name cannot be reconciled.
        let mut residual_ports: Vec<Port> = Vec::new();
        for (name, consumers) in &residual {
            let mut declared: Vec<(&str, &Signature)> = Vec::new();
            for ci in consumers {
                if let Some(sig) = child_needs[*ci]
                    .iter()
                    .find(|p| p.name == *name)
                    .and_then(|p| p.signature.as_ref())
                {
                    declared.push((self.children[*ci].name(), sig));
                }
            }
            if let Some((_, first)) = declared.first() {
                if declared.iter().any(|(_, sig)| sig != first) {
                    return Err(DefinitionError::ConflictingNeedSignatures {
                        domain: self.name,
                        need: name.clone(),
                        consumers: declared.iter().map(|(c, _)| c.to_string()).collect(),
                    }
                    .into());
                }
            }
            residual_ports.push(Port {
                name: name.clone(),
                direction: Direction::Need,
                signature: declared.first().map(|(_, sig)| (*sig).clone()),
            });
        }

        // Resolve the provide selection against the union.
        let selected: Vec<String> = match &self.selection {
            ProvideSelection::All => provide_index.iter().map(|(n, _)| n.clone()).collect(),
            ProvideSelection::Pattern(regex) => provide_index
                .iter()
                .map(|(n, _)| n.clone())
                .filter(|n| regex.is_match(n))
                .collect(),
            ProvideSelection::Names(names) => {
                for name in names {
                    if !provide_index.iter().any(|(n, _)| n == name) {
                        return Err(DefinitionError::UnknownProvideSelection {
                            domain: self.name,
                            name: name.clone(),
                        }
                        .into());
                    }
                }
                names.clone()
            }
        };

        let mut provides = Vec::new();
        for name in &selected {
            let owners: Vec<usize> = provide_index
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, owners)| owners.clone())
                .unwrap_or_default();
            if owners.len() > 1 {
                return Err(DefinitionError::AmbiguousProvideSelection {
                    domain: self.name,
                    name: name.clone(),
                    candidates: owners
                        .iter()
                        .map(|o| self.children[*o].name().to_string())
                        .collect(),
                }
                .into());
            }
            let owner = owners[0];
            let inherited = child_provides[owner]
                .iter()
                .find(|p| p.name == *name)
                .cloned()
                .unwrap_or_else(|| PortInfo {
                    name: name.clone(),
                    direction: Direction::Provide,
                    signature: None,
                    flags: Default::default(),
                });
            provides.push(DomainProvide {
                info: inherited,
                owner,
            });
        }

        tracing::debug!(
            domain = %self.name,
            children = self.children.len(),
            internal = internal_bindings.len(),
            residual = residual.len(),
            published = provides.len(),
            "domain definition composed"
        );

        Ok(Arc::new(DomainDef {
            name: self.name,
            children: self.children,
            needs: NeedsSet::from_ports(residual_ports),
            residual_consumers: residual,
            provides,
            internal_bindings,
        }))
    }
}

impl ComponentDef for DomainDef {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs(&self) -> Vec<PortInfo> {
        self.needs.infos()
    }

    fn provides(&self) -> Vec<PortInfo> {
        self.provides.iter().map(|p| p.info.clone()).collect()
    }

    fn instantiate(self: Arc<Self>) -> Result<Arc<dyn Component>> {
        // One child instance per definition; children live exactly as long
        // as the domain instance.
        let children: Vec<Arc<dyn Component>> = self
            .children
            .iter()
            .map(|def| Arc::clone(def).instantiate())
            .collect::<Result<_>>()?;

        for binding in &self.internal_bindings {
            let func = provider_of(Arc::clone(&children[binding.provider]), &binding.port)?;
            children[binding.consumer].connect_port(&binding.port, func)?;
            tracing::debug!(
                domain = %self.name,
                port = %binding.port,
                consumer = %children[binding.consumer].name(),
                provider = %children[binding.provider].name(),
                "internal connection wired"
            );
        }

        Ok(Arc::new(DomainInstance {
            def: self,
            children,
        }))
    }
}

/// A live domain: its child instances plus the dispatch derived at
/// definition time.
pub struct DomainInstance {
    def: Arc<DomainDef>,
    children: Vec<Arc<dyn Component>>,
}

impl DomainInstance {
    fn consumers_of(&self, port: &str) -> std::result::Result<&[usize], ConnectionError> {
        self.def
            .residual_consumers
            .iter()
            .find(|(name, _)| name == port)
            .map(|(_, consumers)| consumers.as_slice())
            .ok_or_else(|| ConnectionError::PortNotDeclared {
                component: self.def.name.clone(),
                port: port.to_string(),
            })
    }
}

impl Component for DomainInstance {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn get_needs(&self) -> Vec<PortInfo> {
        self.def.needs.infos()
    }

    fn get_provides(&self) -> Vec<PortInfo> {
        self.def.provides.iter().map(|p| p.info.clone()).collect()
    }

    fn is_bound(&self, port: &str) -> std::result::Result<bool, ConnectionError> {
        let consumers = self.consumers_of(port)?;
        for ci in consumers {
            if !self.children[*ci].is_bound(port)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn connect_port(
        &self,
        port: &str,
        provider: ProviderFn,
    ) -> std::result::Result<(), ConnectionError> {
        let consumers = self.consumers_of(port)?;
        for ci in consumers {
            self.children[*ci].connect_port(port, Arc::clone(&provider))?;
        }
        Ok(())
    }

    fn disconnect_port(&self, port: &str) -> std::result::Result<(), ConnectionError> {
        let consumers = self.consumers_of(port)?;
        for ci in consumers {
            self.children[*ci].disconnect_port(port)?;
        }
        Ok(())
    }

    fn call_port(&self, port: &str, args: Args) -> std::result::Result<Value, CallError> {
        let owner = self
            .def
            .provides
            .iter()
            .find(|p| p.info.name == port)
            .map(|p| p.owner)
            .ok_or_else(|| CallError::PortNotDeclared {
                component: self.def.name.clone(),
                port: port.to_string(),
            })?;
        self.children[owner].call_port(port, args)
    }
}
