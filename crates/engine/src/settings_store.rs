//! Persisted trading settings shared by every loop.
//!
//! All mutation goes through [`SettingsStore::update`], which runs the whole
//! read-modify-write under one lock and writes the file before releasing it.
//! Two loops updating different fields can therefore never lose each
//! other's writes.
//!
//! The file is JSON, written to a sibling temp file and renamed into place.
//! A missing or unreadable file starts from defaults.

use auto_trade_core::{Instrument, PersistenceError, TradingSettings};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct SettingsStore {
    path: Option<PathBuf>,
    universe: Vec<Instrument>,
    state: Mutex<TradingSettings>,
}

impl SettingsStore {
    /// Store without a backing file.
    #[must_use]
    pub fn in_memory(universe: Vec<Instrument>) -> Self {
        let settings = TradingSettings::for_universe(&universe);
        Self {
            path: None,
            universe,
            state: Mutex::new(settings),
        }
    }

    /// Opens `path`, falling back to defaults when it is missing or corrupt.
    ///
    /// The loaded settings are reconciled with `universe`; a reconciled copy
    /// is written back right away.
    pub fn open(path: impl Into<PathBuf>, universe: Vec<Instrument>) -> Self {
        let path = path.into();
        let mut settings = load(&path).unwrap_or_else(|| TradingSettings::for_universe(&universe));

        if settings.reconcile(&universe) {
            info!(path = %path.display(), "Instrument settings reconciled with universe");
            if let Err(e) = write_atomic(&path, &settings) {
                warn!(path = %path.display(), error = %e, "Failed to persist reconciled settings");
            }
        }

        Self {
            path: Some(path),
            universe,
            state: Mutex::new(settings),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of the current settings.
    pub async fn get_settings(&self) -> TradingSettings {
        self.state.lock().await.clone()
    }

    /// Replaces the settings wholesale.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written. The in-memory value is
    /// replaced regardless.
    pub async fn save_settings(&self, mut settings: TradingSettings) -> Result<(), PersistenceError> {
        settings.reconcile(&self.universe);
        let mut state = self.state.lock().await;
        *state = settings;
        self.persist(&state)
    }

    /// Applies `f` to the settings and persists the result atomically with
    /// respect to every other caller.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written. The in-memory change
    /// stays applied, so callers may log and carry on.
    pub async fn update<F, R>(&self, f: F) -> Result<R, PersistenceError>
    where
        F: FnOnce(&mut TradingSettings) -> R,
    {
        let mut state = self.state.lock().await;
        let result = f(&mut state);
        self.persist(&state)?;
        Ok(result)
    }

    /// Restores defaults, dropping the position cache too.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn reset(&self) -> Result<(), PersistenceError> {
        self.save_settings(TradingSettings::for_universe(&self.universe))
            .await
    }

    fn persist(&self, settings: &TradingSettings) -> Result<(), PersistenceError> {
        match &self.path {
            Some(path) => write_atomic(path, settings),
            None => Ok(()),
        }
    }
}

fn load(path: &Path) -> Option<TradingSettings> {
    if !path.exists() {
        info!(path = %path.display(), "No settings file found, starting from defaults");
        return None;
    }

    let parsed = File::open(path)
        .map_err(PersistenceError::from)
        .and_then(|file| {
            serde_json::from_reader::<_, TradingSettings>(BufReader::new(file))
                .map_err(PersistenceError::from)
        });

    match parsed {
        Ok(settings) => {
            info!(
                path = %path.display(),
                positions = settings.positions.len(),
                "Loaded settings"
            );
            Some(settings)
        }
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to load settings, starting from defaults"
            );
            None
        }
    }
}

fn write_atomic(path: &Path, settings: &TradingSettings) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(&mut writer, settings)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;

    debug!(path = %path.display(), positions = settings.positions.len(), "Saved settings");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auto_trade_core::{Direction, MarketHours, Position, SignalTier};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn universe() -> Vec<Instrument> {
        vec![
            Instrument::new("Bitcoin", "BTCUSD", MarketHours::Crypto),
            Instrument::new("Gold", "GOLD", MarketHours::ForexCommodities),
        ]
    }

    fn position(deal: &str) -> Position {
        Position {
            deal_id: deal.to_string(),
            instrument_id: "GOLD".to_string(),
            instrument_name: "Gold".to_string(),
            direction: Direction::Buy,
            open_price: dec!(2350),
            size: dec!(0.04),
            opened_at: Utc::now(),
        }
    }

    // =========================================================================
    // Load
    // =========================================================================

    #[tokio::test]
    async fn test_missing_file_starts_from_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.json"), universe());

        let settings = store.get_settings().await;
        assert_eq!(settings.instruments.len(), 2);
        assert!(settings.positions.is_empty());
        // Reconciling the fresh defaults is not a change, so nothing is written yet
        assert!(!dir.path().join("settings.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_from_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let store = SettingsStore::open(&path, universe());
        assert_eq!(store.get_settings().await.signal_tier, SignalTier::Strong);
    }

    #[tokio::test]
    async fn test_reload_after_update() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = SettingsStore::open(&path, universe());
        store
            .update(|s| {
                s.signal_tier = SignalTier::Manual;
                s.positions.insert("d1".to_string(), position("d1"));
            })
            .await
            .unwrap();

        let reopened = SettingsStore::open(&path, universe());
        let settings = reopened.get_settings().await;
        assert_eq!(settings.signal_tier, SignalTier::Manual);
        assert_eq!(settings.positions["d1"].size, dec!(0.04));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_unknown_instruments_are_dropped_on_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let mut stale = TradingSettings::for_universe(&universe());
        stale
            .instruments
            .insert("Delisted".to_string(), Default::default());
        fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        let store = SettingsStore::open(&path, universe());
        assert!(!store.get_settings().await.instruments.contains_key("Delisted"));
    }

    // =========================================================================
    // Update
    // =========================================================================

    #[tokio::test]
    async fn test_update_returns_closure_result() {
        let store = SettingsStore::in_memory(universe());
        let removed = store
            .update(|s| s.positions.remove("missing").is_some())
            .await
            .unwrap();
        assert!(!removed);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SettingsStore::open(dir.path().join("s.json"), universe()));

        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let deal = format!("deal-{i}");
                store
                    .update(|s| {
                        s.positions.insert(deal.clone(), position(&deal));
                    })
                    .await
                    .unwrap();
            }));
        }
        // A concurrent writer of an unrelated field
        let toggler = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store.update(|s| s.stop_loss_percent = 3.5).await.unwrap();
            })
        };

        for task in tasks {
            task.await.unwrap();
        }
        toggler.await.unwrap();

        let settings = store.get_settings().await;
        assert_eq!(settings.positions.len(), 20);
        assert!((settings.stop_loss_percent - 3.5).abs() < f64::EPSILON);

        let on_disk = SettingsStore::open(dir.path().join("s.json"), universe());
        assert_eq!(on_disk.get_settings().await.positions.len(), 20);
    }

    #[tokio::test]
    async fn test_save_settings_reconciles() {
        let store = SettingsStore::in_memory(universe());
        let mut settings = store.get_settings().await;
        settings.instruments.clear();

        store.save_settings(settings).await.unwrap();
        assert_eq!(store.get_settings().await.instruments.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_clears_positions() {
        let store = SettingsStore::in_memory(universe());
        store
            .update(|s| {
                s.positions.insert("d1".to_string(), position("d1"));
                s.max_open_trades = 9;
            })
            .await
            .unwrap();

        store.reset().await.unwrap();
        let settings = store.get_settings().await;
        assert!(settings.positions.is_empty());
        assert_eq!(settings.max_open_trades, 3);
    }
}
