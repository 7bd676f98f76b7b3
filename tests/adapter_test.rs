use portwire::{
    auto_wire, Adapter, Args, ComponentDef, DefinitionError, DomainDef, NeedsSet, PortwireError,
    ServiceDef,
};
use serde_json::json;
use std::sync::Arc;

/// Consumer speaking one vocabulary, provider speaking another.
fn timestamp_consumer() -> Arc<ServiceDef> {
    ServiceDef::builder("report")
        .needs(NeedsSet::named(["get_timestamp"]).unwrap())
        .provides("render_report", ["get_timestamp"], |deps, _| {
            let ts = deps.call("get_timestamp", Args::new())?;
            Ok(json!(format!("report generated at {}", ts.as_str().unwrap_or("?"))))
        })
        .build()
        .unwrap()
}

fn clock_provider() -> Arc<ServiceDef> {
    ServiceDef::builder("wall_clock")
        .provides("get_current_time", Vec::<String>::new(), |_, _| {
            Ok(json!("2018-09-20T14:55:00"))
        })
        .build()
        .unwrap()
}

#[test]
fn test_adapter_bridges_mismatched_names_through_wiring() {
    let bridge = Adapter::builder("ts_bridge")
        .forward("get_timestamp", "get_current_time")
        .build()
        .unwrap();

    let report = timestamp_consumer().instantiate().unwrap();
    let clock = clock_provider().instantiate().unwrap();
    let bridge = bridge.instantiate().unwrap();

    // Without the bridge these two cannot talk; with it, wiring needs no
    // special casing at all.
    auto_wire(&[Arc::clone(&report), clock, bridge], true).unwrap();

    let out = report.call_port("render_report", Args::new()).unwrap();
    assert_eq!(out, json!("report generated at 2018-09-20T14:55:00"));
}

#[test]
fn test_adapter_reshapes_arguments() {
    // Provider expects "key"; consumer sends "name".
    let lookup = ServiceDef::builder("directory")
        .provides("lookup_by_key", Vec::<String>::new(), |_, args| {
            Ok(json!(format!("entry:{}", args.require_str("key")?)))
        })
        .build()
        .unwrap()
        .instantiate()
        .unwrap();

    let bridge = Adapter::builder("lookup_bridge")
        .adapt("lookup_by_name", "lookup_by_key", |args| {
            let name = args
                .get("name")
                .cloned()
                .unwrap_or(json!(null));
            Args::new().arg("key", name)
        })
        .build()
        .unwrap()
        .instantiate()
        .unwrap();

    auto_wire(&[Arc::clone(&bridge), lookup], true).unwrap();

    let out = bridge
        .call_port("lookup_by_name", Args::new().arg("name", "shawn"))
        .unwrap();
    assert_eq!(out, json!("entry:shawn"));
}

#[test]
fn test_adapter_reshapes_results() {
    let clock = clock_provider().instantiate().unwrap();
    let bridge = Adapter::builder("date_bridge")
        .translate(
            "get_date",
            "get_current_time",
            |args| args,
            |out| json!(out.as_str().map(|s| s[..10].to_string())),
        )
        .build()
        .unwrap()
        .instantiate()
        .unwrap();

    auto_wire(&[Arc::clone(&bridge), clock], true).unwrap();

    let out = bridge.call_port("get_date", Args::new()).unwrap();
    assert_eq!(out, json!("2018-09-20"));
}

#[test]
fn test_adapter_rejects_same_name_pair() {
    let err = Adapter::builder("noop")
        .forward("get_time", "get_time")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        PortwireError::Definition(DefinitionError::AdapterPassThrough { name, .. })
            if name == "get_time"
    ));
}

#[test]
fn test_adapter_rejects_duplicate_needs() {
    let err = Adapter::builder("fan_in")
        .forward("first", "get_time")
        .forward("second", "get_time")
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        PortwireError::Definition(DefinitionError::DuplicatePort { name }) if name == "get_time"
    ));
}

#[test]
fn test_adapter_participates_in_domain_composition() {
    // The adapter is an ordinary component, so domain-internal wiring picks
    // it up like any other child.
    let bridge = Adapter::builder("ts_bridge")
        .forward("get_timestamp", "get_current_time")
        .build()
        .unwrap();

    let domain = DomainDef::builder("reporting")
        .child(timestamp_consumer())
        .child(bridge)
        .build()
        .unwrap();

    // The consumer's need is satisfied internally; only the bridge's own
    // need escapes the boundary.
    let needs: Vec<String> = domain.needs().into_iter().map(|p| p.name).collect();
    assert_eq!(needs, vec!["get_current_time"]);

    let instance = domain.instantiate().unwrap();
    instance
        .connect_port("get_current_time", Arc::new(|_| Ok(json!("noon"))))
        .unwrap();
    let out = instance.call_port("render_report", Args::new()).unwrap();
    assert_eq!(out, json!("report generated at noon"));
}
