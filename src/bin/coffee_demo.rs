use clap::Parser;
use portwire::utils::logger;
use portwire::{
    auto_wire, Args, Component, ComponentDef, DomainDef, NeedSpec, NeedsSet, ProvideSelection,
    ServiceDef,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "coffee-demo")]
#[command(about = "Coffee ordering app assembled from ports-and-adapters components")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn menu_service() -> portwire::Result<Arc<ServiceDef>> {
    ServiceDef::builder("coffee_menu")
        .provides("get_menu_items", Vec::<String>::new(), |_, _| {
            Ok(json!(["Flat White", "Cappuccino", "Long Black"]))
        })
        .build()
}

fn barista_service() -> portwire::Result<Arc<ServiceDef>> {
    ServiceDef::builder("barista")
        .needs(
            NeedsSet::interface([
                NeedSpec::new("get_menu_items"),
                NeedSpec::new("store_new_order").param("record").returns("order_id"),
                NeedSpec::new("get_current_time").returns("iso8601"),
            ])?,
        )
        .provides(
            "place_order",
            ["get_menu_items", "store_new_order", "get_current_time"],
            |deps, args| {
                let item = args.require_str("order_item")?.to_string();
                let requester = args.require_str("requester")?.to_string();

                let menu = deps.call("get_menu_items", Args::new())?;
                let on_menu = menu
                    .as_array()
                    .map(|items| items.iter().any(|i| i == &json!(item)))
                    .unwrap_or(false);
                if !on_menu {
                    anyhow::bail!("\"{item}\" is not on the menu");
                }

                let placed_at = deps.call("get_current_time", Args::new())?;
                let record = json!({
                    "item": item,
                    "requester": requester,
                    "placed_at": placed_at,
                });
                deps.call("store_new_order", Args::new().arg("record", record))
                    .map_err(Into::into)
            },
        )
        .build()
}

fn order_history_service() -> portwire::Result<Arc<ServiceDef>> {
    ServiceDef::builder("order_history")
        .needs(NeedsSet::interface([NeedSpec::new("fetch_order").param("order_id")])?)
        .provides("get_order_history", ["fetch_order"], |deps, args| {
            let id = args.require("order_id")?.clone();
            let record = deps.call("fetch_order", Args::new().arg("order_id", id.clone()))?;
            Ok(json!({ "order_id": id, "record": record }))
        })
        .build()
}

/// The business side of the hexagon. Everything persistence-shaped leaves
/// through need ports.
fn coffee_domain() -> portwire::Result<Arc<DomainDef>> {
    DomainDef::builder("coffee_orders")
        .child(menu_service()?)
        .child(barista_service()?)
        .child(order_history_service()?)
        .build()
}

fn order_store_service() -> portwire::Result<Arc<ServiceDef>> {
    ServiceDef::builder("order_store")
        .needs(
            NeedsSet::interface([
                NeedSpec::new("kv_store").param("key").param("value"),
                NeedSpec::new("get_new_order_id"),
            ])?,
        )
        .provides(
            "store_new_order",
            ["kv_store", "get_new_order_id"],
            |deps, args| {
                let record = args.require("record")?.clone();
                let id = deps.call("get_new_order_id", Args::new())?;
                let key = format!("order:{id}");
                deps.call("kv_store", Args::new().arg("key", key).arg("value", record))?;
                Ok(id)
            },
        )
        .build()
}

fn history_store_service() -> portwire::Result<Arc<ServiceDef>> {
    ServiceDef::builder("history_store")
        .needs(NeedsSet::interface([NeedSpec::new("kv_fetch").param("key")])?)
        .provides("fetch_order", ["kv_fetch"], |deps, args| {
            let id = args.require("order_id")?;
            let key = format!("order:{id}");
            deps.call("kv_fetch", Args::new().arg("key", key))
                .map_err(Into::into)
        })
        .build()
}

fn db_domain() -> portwire::Result<Arc<DomainDef>> {
    DomainDef::builder("db")
        .child(order_store_service()?)
        .child(history_store_service()?)
        .build()
}

fn order_id_service() -> portwire::Result<Arc<ServiceDef>> {
    let counter = AtomicU64::new(0);
    ServiceDef::builder("order_ids")
        .provides("get_new_order_id", Vec::<String>::new(), move |_, _| {
            Ok(json!(counter.fetch_add(1, Ordering::SeqCst) + 1))
        })
        .build()
}

fn clock_service() -> portwire::Result<Arc<ServiceDef>> {
    ServiceDef::builder("wall_clock")
        .provides("get_current_time", Vec::<String>::new(), |_, _| {
            Ok(json!(chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()))
        })
        .build()
}

fn assemble() -> portwire::Result<Arc<dyn Component>> {
    let app = DomainDef::builder("coffee_app")
        .child(coffee_domain()?)
        .child(db_domain()?)
        .child(order_id_service()?)
        .provides(ProvideSelection::names([
            "get_menu_items",
            "place_order",
            "get_order_history",
        ]))
        .build()?;

    let app = app.instantiate()?;

    // The kv ports are bound at the edge by hand; everything a component can
    // satisfy goes through strict auto wiring instead.
    let store: Arc<Mutex<HashMap<String, Value>>> = Arc::new(Mutex::new(HashMap::new()));
    let writer = Arc::clone(&store);
    app.connect_port(
        "kv_store",
        Arc::new(move |args| {
            let key = args.require_str("key")?.to_string();
            let value = args.require("value")?.clone();
            writer
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(key, value);
            Ok(json!(null))
        }),
    )?;
    let reader = Arc::clone(&store);
    app.connect_port(
        "kv_fetch",
        Arc::new(move |args| {
            let key = args.require_str("key")?;
            reader
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .get(key)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no record stored under \"{key}\""))
        }),
    )?;

    let clock = clock_service()?.instantiate()?;
    auto_wire(&[Arc::clone(&app), clock], true)?;
    tracing::info!("✅ Application wired; every need is bound");

    Ok(app)
}

fn place(app: &Arc<dyn Component>, requester: &str, item: &str) {
    let result = app.call_port(
        "place_order",
        Args::new().arg("requester", requester).arg("order_item", item),
    );
    match result {
        Ok(order_id) => {
            tracing::info!("☕ Order {} placed: {} for {}", order_id, item, requester)
        }
        Err(e) => tracing::warn!("⚠️  Order for {} rejected: {}", requester, e),
    }
}

fn run() -> portwire::Result<()> {
    let app = assemble()?;

    let menu = app.call_port("get_menu_items", Args::new())?;
    tracing::info!("📋 Menu: {}", menu);

    place(&app, "shawn", "Flat White");
    place(&app, "dana", "Cappuccino");
    place(&app, "lee", "Bubble Tea");

    let history = app.call_port("get_order_history", Args::new().arg("order_id", 1))?;
    tracing::info!("🧾 First order on record: {}", history);

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting coffee ordering demo");

    if let Err(e) = run() {
        tracing::error!("❌ {}", e);
        if e.is_startup_error() {
            eprintln!("💡 {}", e.recovery_suggestion());
        }
        std::process::exit(1);
    }
}
