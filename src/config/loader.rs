//! Layered settings loading
//!
//! Precedence, lowest first: built-in defaults, `sqlcache.{toml,yaml,json}`
//! in the working directory, an explicit file, then `SQLCACHE__*`
//! environment variables.

use super::error::ConfigResult;
use super::{RawSettings, Settings};
use config::{Config, Environment, File};
use std::path::Path;
use tracing::debug;

const LOCAL_CONFIG_BASENAME: &str = "sqlcache";
const ENV_PREFIX: &str = "SQLCACHE";
const ENV_SEPARATOR: &str = "__";

/// Load settings from the default locations plus the environment
pub fn load() -> ConfigResult<Settings> {
    load_from(None)
}

/// Load settings, additionally reading `path` (which must exist)
pub fn load_from(path: Option<&Path>) -> ConfigResult<Settings> {
    let mut builder = Config::builder()
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    let settings = Settings::try_from(raw)?;

    debug!(
        host = %settings.host,
        port = settings.port,
        database = %settings.database,
        connection_limit = settings.connection_limit,
        cache_provider = %settings.cache_provider,
        caching = settings.caching,
        "Configuration loaded"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::DigestAlgorithm;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_load_from_toml_file() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
database = "inventory"
user = "reporting"
connection_limit = 4
ttl = 30
cache_provider = "LRU"
digest_algorithm = "sha256"

[cache_provider_settings]
max_entries = 500
"#
        )
        .unwrap();

        let settings = load_from(Some(file.path())).unwrap();
        assert_eq!(settings.database, "inventory");
        assert_eq!(settings.user, "reporting");
        assert_eq!(settings.connection_limit, 4);
        assert_eq!(settings.ttl, 30);
        assert_eq!(settings.cache_provider, "LRU");
        assert_eq!(settings.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(
            settings.cache_provider_settings.get_u64("max_entries").unwrap(),
            Some(500)
        );
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = load_from(Some(Path::new("/definitely/not/here/sqlcache.toml")));
        assert!(result.is_err());
    }
}
