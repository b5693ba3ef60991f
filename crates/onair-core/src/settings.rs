//! Validated settings updates.

use onair_store::Store;
use onair_types::Settings;
use serde::Deserialize;

use crate::error::EngineError;
use crate::validation::{validate_broadcast_delay, validate_transition_delay};

/// A partial settings change. Absent fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    /// New transition delay, `0..=60`.
    #[serde(default, alias = "transitionDelay")]
    pub transition_delay_seconds: Option<i64>,
    /// New broadcast delay, `0..=600`.
    #[serde(default, alias = "broadcastDelay")]
    pub broadcast_delay_seconds: Option<i64>,
}

/// Validate every field first, then write, then echo the stored values.
///
/// Nothing is written if any field is out of range.
pub async fn apply(store: &Store, update: SettingsUpdate) -> Result<Settings, EngineError> {
    let transition = update
        .transition_delay_seconds
        .map(validate_transition_delay)
        .transpose()?;
    let broadcast = update
        .broadcast_delay_seconds
        .map(validate_broadcast_delay)
        .transpose()?;

    if let Some(seconds) = transition {
        store.set_transition_delay(seconds).await?;
        tracing::info!(seconds, "Transition delay updated");
    }
    if let Some(seconds) = broadcast {
        store.set_broadcast_delay(seconds).await?;
        tracing::info!(seconds, "Broadcast delay updated");
    }

    Ok(store.settings().await?)
}
