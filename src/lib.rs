pub mod core;
pub mod domain;
pub mod utils;

pub use core::adapter::Adapter;
pub use core::composer::{DomainDef, DomainInstance, ProvideSelection};
pub use core::registry::{ConnectionRegistry, Deps};
pub use core::service::{Handler, ServiceBuilder, ServiceDef, ServiceInstance};
pub use core::wiring::auto_wire;
pub use domain::model::{Args, Direction, Flags, NeedSpec, NeedsSet, Param, PortInfo, Signature};
pub use domain::ports::{provider_of, set_provider, Component, ComponentDef, ProviderFn};
pub use utils::error::{
    CallError, ConnectionError, DefinitionError, PortwireError, Result, WiringError,
};
