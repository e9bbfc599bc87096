#![allow(dead_code)]

pub mod driver;
pub mod strategies;

pub use driver::*;

use sqlcache::{ProviderOptions, QueryCache, Settings};
use std::sync::Arc;
use std::time::Duration;

/// Settings pointed at the scripted driver's default database
pub fn test_settings() -> Settings {
    Settings::for_database(DEFAULT_DATABASE)
        .with_provider("native", ProviderOptions::new())
        .with_connection_limit(4)
        .with_connect_attempts(1)
        .with_reconnect_delay(Duration::from_millis(20))
}

/// Initialize a query cache on top of a fresh scripted driver
pub async fn scripted_cache(settings: Settings) -> (QueryCache, ScriptedDriver) {
    let driver = ScriptedDriver::new();
    let cache = QueryCache::initialize_with_driver(settings, Arc::new(driver.clone()))
        .await
        .expect("scripted driver should always connect");
    (cache, driver)
}
