//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::Store;
use std::path::PathBuf;
use tracing::info;

/// Initialize archivist configuration and database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<()> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::Config(format!(
            "Already initialized at {} (use --force to overwrite)",
            config.paths.base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.validate()?;
    config.save()?;
    info!("Created config at {:?}", config.paths.config_file);

    // Opening the store creates the schema and the default domain
    let store = Store::new(&config.paths.db_file).await?;
    store.ensure_default_domain().await?;
    info!("Created database at {:?}", config.paths.db_file);

    println!("✓ Initialized archivist at {}", config.paths.base_dir.display());
    println!("\nConfiguration: {}", config.paths.config_file.display());
    println!("Database: {}", config.paths.db_file.display());
    println!("\nNext steps:");
    println!("  archivist domains add billing --name 账单 --keywords 发票,账单  # Register a domain");
    println!("  archivist add ./path/to/docs --namespace billing               # Add documents");
    println!("  archivist index                                                # Build the index");
    println!("  archivist query \"怎么开发票\"                                   # Search");

    Ok(())
}
