use crate::core::service::{ServiceDef, ServiceBuilder};
use crate::domain::model::{Args, NeedsSet};
use crate::utils::error::{DefinitionError, Result};
use serde_json::Value;
use std::sync::Arc;

type ArgsMapper = Arc<dyn Fn(Args) -> Args + Send + Sync>;
type ResultMapper = Arc<dyn Fn(Value) -> Value + Send + Sync>;

struct Mapping {
    provide: String,
    need: String,
    map_args: Option<ArgsMapper>,
    map_result: Option<ResultMapper>,
}

/// Builds a translation-only component: a bijective mapping from need names
/// to differently named provide ports, each implementation doing nothing but
/// forwarding (optionally reshaping arguments and results). The output is an
/// ordinary validated `ServiceDef` and takes part in wiring like any other
/// component; no extra mechanism exists at call time.
pub struct Adapter;

impl Adapter {
    pub fn builder(name: impl Into<String>) -> AdapterBuilder {
        AdapterBuilder {
            name: name.into(),
            mappings: Vec::new(),
        }
    }
}

pub struct AdapterBuilder {
    name: String,
    mappings: Vec<Mapping>,
}

impl AdapterBuilder {
    /// Publishes `provide` as a straight pass-through to `need`.
    pub fn forward(mut self, provide: impl Into<String>, need: impl Into<String>) -> Self {
        self.mappings.push(Mapping {
            provide: provide.into(),
            need: need.into(),
            map_args: None,
            map_result: None,
        });
        self
    }

    /// Publishes `provide` forwarding to `need` with the arguments reshaped
    /// on the way in.
    pub fn adapt<F>(mut self, provide: impl Into<String>, need: impl Into<String>, map_args: F) -> Self
    where
        F: Fn(Args) -> Args + Send + Sync + 'static,
    {
        self.mappings.push(Mapping {
            provide: provide.into(),
            need: need.into(),
            map_args: Some(Arc::new(map_args)),
            map_result: None,
        });
        self
    }

    /// Publishes `provide` forwarding to `need`, reshaping both the
    /// arguments and the result.
    pub fn translate<F, G>(
        mut self,
        provide: impl Into<String>,
        need: impl Into<String>,
        map_args: F,
        map_result: G,
    ) -> Self
    where
        F: Fn(Args) -> Args + Send + Sync + 'static,
        G: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.mappings.push(Mapping {
            provide: provide.into(),
            need: need.into(),
            map_args: Some(Arc::new(map_args)),
            map_result: Some(Arc::new(map_result)),
        });
        self
    }

    pub fn build(self) -> Result<Arc<ServiceDef>> {
        // An adapter exists to rename; a pair bridging a name to itself
        // would shadow the very port it is supposed to translate.
        for mapping in &self.mappings {
            if mapping.provide == mapping.need {
                return Err(DefinitionError::AdapterPassThrough {
                    component: self.name,
                    name: mapping.need.clone(),
                }
                .into());
            }
        }

        // Duplicate needs or provides break bijectivity and surface as
        // DuplicatePort from the regular definition machinery.
        let needs = NeedsSet::named(self.mappings.iter().map(|m| m.need.clone()))?;

        let mut builder: ServiceBuilder = ServiceDef::builder(self.name).needs(needs);
        for mapping in self.mappings {
            let need = mapping.need;
            let uses = [need.clone()];
            let map_args = mapping.map_args;
            let map_result = mapping.map_result;
            builder = builder.provides(mapping.provide, uses, move |deps, args| {
                let args = match &map_args {
                    Some(f) => f(args),
                    None => args,
                };
                let out = deps.call(&need, args)?;
                Ok(match &map_result {
                    Some(f) => f(out),
                    None => out,
                })
            });
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ComponentDef;
    use serde_json::json;

    #[test]
    fn test_forward_builds_renaming_service() {
        let def = Adapter::builder("ts_bridge")
            .forward("get_current_ts", "get_current_time")
            .build()
            .unwrap();

        let needs: Vec<String> = def.needs().into_iter().map(|p| p.name).collect();
        let provides: Vec<String> = def.provides().into_iter().map(|p| p.name).collect();
        assert_eq!(needs, vec!["get_current_time"]);
        assert_eq!(provides, vec!["get_current_ts"]);
    }

    #[test]
    fn test_identity_mapping_rejected() {
        let err = Adapter::builder("noop")
            .forward("same_name", "same_name")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("same_name"));
    }

    #[test]
    fn test_duplicate_need_breaks_bijectivity() {
        let err = Adapter::builder("fanout")
            .forward("alias_one", "target")
            .forward("alias_two", "target")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_forwarding_call_path() {
        let def = Adapter::builder("bridge")
            .translate(
                "fetch_amount",
                "lookup_total",
                |args| args,
                |value| json!({ "amount": value }),
            )
            .build()
            .unwrap();

        let instance = def.instantiate().unwrap();
        instance
            .connect_port("lookup_total", Arc::new(|_| Ok(json!(12))))
            .unwrap();

        let out = instance.call_port("fetch_amount", Args::new()).unwrap();
        assert_eq!(out, json!({ "amount": 12 }));
    }
}
