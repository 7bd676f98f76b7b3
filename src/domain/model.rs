use crate::utils::error::DefinitionError;
use anyhow::anyhow;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Which side of a component a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Need,
    Provide,
}

/// One named parameter in a port signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub required: bool,
}

/// Declared call shape of a port: ordered parameters plus an optional return
/// descriptor. Ports declared by bare name carry no signature and are never
/// shape-checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Option<String>,
}

impl Signature {
    /// Validates named arguments against this signature. Returns the reason
    /// on the first mismatch: an argument name that was never declared, or a
    /// required parameter that is missing.
    pub fn check_args(&self, args: &Args) -> Result<(), String> {
        for name in args.names() {
            if !self.params.iter().any(|p| p.name == name) {
                return Err(format!("unexpected argument \"{}\"", name));
            }
        }
        for param in &self.params {
            if param.required && args.get(&param.name).is_none() {
                return Err(format!("missing required argument \"{}\"", param.name));
            }
        }
        Ok(())
    }
}

/// A named capability edge on a component.
#[derive(Debug, Clone, Serialize)]
pub struct Port {
    pub name: String,
    pub direction: Direction,
    pub signature: Option<Signature>,
}

/// Opaque key/value metadata attached to a provide port. Not interpreted by
/// the core; carried through introspection for external tooling.
pub type Flags = BTreeMap<String, Value>;

/// Introspection row returned by `get_needs` / `get_provides`, in declaration
/// order.
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub direction: Direction,
    pub signature: Option<Signature>,
    pub flags: Flags,
}

impl PortInfo {
    pub(crate) fn from_port(port: &Port) -> Self {
        PortInfo {
            name: port.name.clone(),
            direction: port.direction,
            signature: port.signature.clone(),
            flags: Flags::new(),
        }
    }
}

/// Named arguments for a port call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Args(BTreeMap<String, Value>);

impl Args {
    pub fn new() -> Self {
        Args::default()
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fetches an argument a handler cannot do without.
    pub fn require(&self, name: &str) -> anyhow::Result<&Value> {
        self.get(name)
            .ok_or_else(|| anyhow!("missing argument \"{}\"", name))
    }

    /// Fetches a required string argument.
    pub fn require_str(&self, name: &str) -> anyhow::Result<&str> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| anyhow!("argument \"{}\" is not a string", name))
    }
}

impl FromIterator<(String, Value)> for Args {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Args(iter.into_iter().collect())
    }
}

/// Declaration of one need port within an interface-style needs declaration.
#[derive(Debug, Clone)]
pub struct NeedSpec {
    name: String,
    params: Vec<Param>,
    returns: Option<String>,
}

impl NeedSpec {
    pub fn new(name: impl Into<String>) -> Self {
        NeedSpec {
            name: name.into(),
            params: Vec::new(),
            returns: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            required: true,
        });
        self
    }

    pub fn optional_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            required: false,
        });
        self
    }

    pub fn returns(mut self, descriptor: impl Into<String>) -> Self {
        self.returns = Some(descriptor.into());
        self
    }

    fn into_port(self) -> Port {
        Port {
            name: self.name,
            direction: Direction::Need,
            signature: Some(Signature {
                params: self.params,
                returns: self.returns,
            }),
        }
    }
}

/// Ordered, duplicate-free set of need ports. Fixed at component-definition
/// time; instances only ever bind against it.
#[derive(Debug, Clone, Default)]
pub struct NeedsSet {
    ports: Vec<Port>,
}

impl NeedsSet {
    pub fn empty() -> Self {
        NeedsSet::default()
    }

    /// Declares needs from bare names. Name format is checked later by the
    /// definition validator; only set integrity is enforced here.
    pub fn named<I>(names: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let ports = names
            .into_iter()
            .map(|name| Port {
                name: name.into(),
                direction: Direction::Need,
                signature: None,
            })
            .collect();
        Self::from_unique(ports)
    }

    /// Declares needs from an interface definition carrying per-port
    /// signatures.
    pub fn interface<I>(specs: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = NeedSpec>,
    {
        let ports = specs.into_iter().map(NeedSpec::into_port).collect();
        Self::from_unique(ports)
    }

    /// Assembles a set from ports that already went through validation, e.g.
    /// the residual needs a domain derives from its children.
    pub(crate) fn from_ports(ports: Vec<Port>) -> Self {
        NeedsSet { ports }
    }

    fn from_unique(ports: Vec<Port>) -> Result<Self, DefinitionError> {
        let mut seen = HashSet::new();
        for port in &ports {
            if !seen.insert(port.name.clone()) {
                return Err(DefinitionError::DuplicatePort {
                    name: port.name.clone(),
                });
            }
        }
        Ok(NeedsSet { ports })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ports.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn infos(&self) -> Vec<PortInfo> {
        self.ports.iter().map(PortInfo::from_port).collect()
    }
}
