//! Embedded PostgreSQL for single-binary local use.
//!
//! With the `embedded-db` feature the PostgreSQL binaries are bundled at compile time and a
//! private instance is started alongside the service. Without the feature, [`EmbeddedDatabase::start`]
//! returns an error telling the operator how to rebuild.

#[cfg(feature = "embedded-db")]
use postgresql_embedded::{PostgreSQL, Settings, V16};
use std::path::PathBuf;
#[cfg(feature = "embedded-db")]
use tracing::{debug, info};

const DATABASE_NAME: &str = "dealflow";

/// Default location for persistent embedded data: `$HOME/.dealflow_data/postgres`
pub fn default_data_dir() -> PathBuf {
    match std::env::home_dir() {
        Some(home) => home.join(".dealflow_data").join("postgres"),
        None => PathBuf::from("dealflow_data/postgres"),
    }
}

#[cfg(feature = "embedded-db")]
pub struct EmbeddedDatabase {
    postgres: PostgreSQL,
    connection_string: String,
}

#[cfg(feature = "embedded-db")]
impl EmbeddedDatabase {
    /// Set up and start an instance on an OS-assigned port.
    ///
    /// When `persistent` is false the data directory is temporary and removed on shutdown.
    pub async fn start(data_dir: Option<PathBuf>, persistent: bool) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        if persistent {
            debug!("Starting embedded PostgreSQL with data directory: {}", data_dir.display());
        } else {
            debug!("Starting ephemeral embedded PostgreSQL");
        }

        let settings = Settings {
            version: V16.clone(),
            port: 0,
            username: "postgres".to_string(),
            password: "password".to_string(),
            temporary: !persistent,
            installation_dir: data_dir.join("installation"),
            data_dir: data_dir.join("data"),
            ..Default::default()
        };

        let mut postgres = PostgreSQL::new(settings);
        postgres
            .setup()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to setup embedded PostgreSQL: {e}"))?;
        postgres
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start embedded PostgreSQL: {e}"))?;

        // Persistent data directories keep the database between runs
        if !postgres
            .database_exists(DATABASE_NAME)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to inspect embedded PostgreSQL: {e}"))?
        {
            postgres
                .create_database(DATABASE_NAME)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to create database '{DATABASE_NAME}': {e}"))?;
        }

        let connection_string = postgres.settings().url(DATABASE_NAME);
        info!("Embedded PostgreSQL started on port {}", postgres.settings().port);

        Ok(Self {
            postgres,
            connection_string,
        })
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub async fn stop(self) -> anyhow::Result<()> {
        info!("Stopping embedded PostgreSQL");
        self.postgres
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to stop embedded PostgreSQL: {e}"))?;
        Ok(())
    }
}

#[cfg(not(feature = "embedded-db"))]
pub struct EmbeddedDatabase;

#[cfg(not(feature = "embedded-db"))]
impl EmbeddedDatabase {
    pub async fn start(_data_dir: Option<PathBuf>, _persistent: bool) -> anyhow::Result<Self> {
        anyhow::bail!(
            "Embedded database is configured but the feature is not enabled. \
             Rebuild with --features embedded-db to use it."
        )
    }

    pub fn connection_string(&self) -> &str {
        ""
    }

    pub async fn stop(self) -> anyhow::Result<()> {
        Ok(())
    }
}
