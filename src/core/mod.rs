pub mod adapter;
pub mod composer;
pub mod registry;
pub mod service;
pub mod wiring;

pub use crate::domain::model::{Args, Flags, NeedSpec, NeedsSet, PortInfo};
pub use crate::domain::ports::{provider_of, set_provider, Component, ComponentDef, ProviderFn};
pub use crate::utils::error::Result;
