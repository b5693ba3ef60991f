//! `Dragonfly` (Redis-compatible) settings storage.
//!
//! The two operator tunables live as plain integer strings so they can be
//! inspected and edited with any Redis client.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `settings:transition_delay_seconds` | Integer | Gap between countdowns |
//! | `settings:broadcast_delay_seconds` | Integer | Delayed view lag |

use fred::prelude::*;
use onair_types::Settings;

use crate::error::StoreError;

/// Key holding the transition delay.
pub const TRANSITION_DELAY_KEY: &str = "settings:transition_delay_seconds";

/// Key holding the broadcast delay.
pub const BROADCAST_DELAY_KEY: &str = "settings:broadcast_delay_seconds";

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if the URL cannot be parsed.
    /// Returns [`StoreError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let config = Config::from_url(url)
            .map_err(|e| StoreError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Read both settings. Missing keys read as zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if a read fails.
    /// Returns [`StoreError::Corrupt`] if a stored value is not an integer.
    pub async fn settings(&self) -> Result<Settings, StoreError> {
        Ok(Settings {
            transition_delay_seconds: self.get_seconds(TRANSITION_DELAY_KEY).await?,
            broadcast_delay_seconds: self.get_seconds(BROADCAST_DELAY_KEY).await?,
        })
    }

    /// Store the transition delay.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the write fails.
    pub async fn set_transition_delay(&self, seconds: u32) -> Result<(), StoreError> {
        self.set_seconds(TRANSITION_DELAY_KEY, seconds).await
    }

    /// Store the broadcast delay.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the write fails.
    pub async fn set_broadcast_delay(&self, seconds: u32) -> Result<(), StoreError> {
        self.set_seconds(BROADCAST_DELAY_KEY, seconds).await
    }

    /// Delete a key from `Dragonfly`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Dragonfly`] if the delete fails.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _: u32 = self.client.del(key).await?;
        Ok(())
    }

    /// Close the connection.
    pub async fn close(&self) {
        if let Err(e) = self.client.quit().await {
            tracing::warn!(error = %e, "Dragonfly quit failed");
        }
    }

    async fn get_seconds(&self, key: &str) -> Result<u32, StoreError> {
        let value: Option<String> = self.client.get(key).await?;
        value.map_or(Ok(0), |s| {
            s.parse::<u32>().map_err(|e| StoreError::Corrupt {
                table: "settings",
                reason: format!("{key} is not a valid u32: {e}"),
            })
        })
    }

    async fn set_seconds(&self, key: &str, seconds: u32) -> Result<(), StoreError> {
        let _: () = self
            .client
            .set(key, seconds.to_string().as_str(), None, None, false)
            .await?;
        Ok(())
    }
}
