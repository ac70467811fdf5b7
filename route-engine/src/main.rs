use std::collections::BTreeSet;
use std::error::Error;
use std::path::PathBuf;

use route_engine::domain::{RouteId, StopPrimitive};
use route_engine::engine::{EngineConfig, RouteEngine};
use route_engine::store::{StoreConfig, StoreHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Snapshot location. Unset means an in-memory store.
const STORE_PATH_VAR: &str = "ROUTE_STORE_PATH";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "route_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var_os(STORE_PATH_VAR) {
        Some(path) => StoreConfig::new(PathBuf::from(path)),
        None => StoreConfig::in_memory(),
    };
    let store = StoreHandle::open(config)?;
    let engine = RouteEngine::new(store.clone(), EngineConfig::default())?;

    let route = engine.create_route();
    engine.add_stop(&route, "1 Main Street", "Springfield");
    engine.insert(
        &route,
        [
            StopPrimitive::new("22 Oak Avenue", "Springfield"),
            StopPrimitive::new("5 Harbour Road", "Shelbyville"),
            StopPrimitive::new("22 Oak Avenue", "Springfield"),
        ],
    );
    engine.flush().await;
    print_route(&store, &route, "after inserting");

    if let Some(current) = store.lookup_route(&route)
        && let Some(second) = current.stops.get(1)
    {
        engine.select_stop(&route, second);
    }
    engine.move_stops(&route, BTreeSet::from([2]), 0);
    engine.flush().await;
    print_route(&store, &route, "after moving the last stop to the front");

    engine.delete_stops(&route, &BTreeSet::from([2]));
    engine.flush().await;
    print_route(&store, &route, "after deleting the selected stop");

    engine.shutdown().await;
    store.close().await;
    Ok(())
}

fn print_route(store: &StoreHandle, route: &RouteId, label: &str) {
    let Some(snapshot) = store.route_snapshot(route) else {
        println!("Route {route} no longer exists");
        return;
    };
    println!("Route {route} {label}:");
    for stop in &snapshot.stops {
        let marker = if snapshot.route.is_selected(&stop.id) {
            '*'
        } else {
            ' '
        };
        println!("  {marker} {}, {} (x{})", stop.street, stop.city, stop.count);
    }
}
