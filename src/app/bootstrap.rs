use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::app::controller::HarvestController;
use crate::config::HarvestConfig;
use crate::error::{Context, Result};
use crate::fetch::{HttpTransport, ShutdownSignal};
use crate::records::{load_item_types, load_stations};
use crate::storage::SqliteStore;

/// Open (and migrate) the configured database.
pub fn open_store(config: &HarvestConfig) -> Result<Arc<SqliteStore>> {
    let path = &config.database_path;
    let store = SqliteStore::open(path)
        .with_context(|| format!("failed to open market database at {}", path.display()))?;
    info!("using market database {}", path.display());
    Ok(Arc::new(store))
}

/// Entry point used by `main` to wire the controller stack over live HTTP.
pub fn build_controller(
    config: HarvestConfig,
    store: Arc<SqliteStore>,
    shutdown: ShutdownSignal,
) -> Result<HarvestController> {
    let transport = Arc::new(HttpTransport::new(&config.http)?);
    Ok(HarvestController::new(config, store, transport, shutdown))
}

/// Load the types catalog and station list into storage.
pub fn seed_reference_data(
    store: &SqliteStore,
    types_path: &Path,
    stations_path: &Path,
) -> Result<(usize, usize)> {
    let items = load_item_types(types_path)?;
    let stations = load_stations(stations_path)?;

    let item_count = store.store_items(&items)?;
    let station_count = store.store_stations(&stations)?;
    info!(
        "seeded {item_count} item type(s) ({} marketable) and {station_count} station(s)",
        items.iter().filter(|item| item.marketable).count()
    );
    Ok((item_count, station_count))
}
