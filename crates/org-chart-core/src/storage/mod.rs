// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Storage gateway over a [`KeyValueStore`].
//!
//! The gateway owns the key layout and the failure policy: loads never fail
//! (absent, unparsable or unrecoverable data degrades to `None` or a default),
//! saves validate before writing and evict older sibling keys when the store is
//! full.

mod envelope;
mod memory;
mod port;

pub use envelope::{decode, has_valid_shape, migrate_legacy, recover, Envelope, SCHEMA_VERSION};
pub use memory::MemoryStore;
pub use port::{KeyValueStore, StorageError};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bookmarks::BookmarkSet;
use crate::clock::{Clock, SystemClock};
use crate::designations::DesignationCatalog;
use crate::model::HierarchyTable;
use crate::prefs::{Settings, Theme, ViewMode};

/// Key of the table envelope.
pub const ORG_CHART_KEY: &str = "orgChart";
/// Key of the bookmark map.
pub const BOOKMARKS_KEY: &str = "orgChartBookmarks";
/// Key of the schema version marker ("already migrated").
pub const VERSION_KEY: &str = "orgChartVersion";
/// Key of the last table write time.
pub const LAST_MODIFIED_KEY: &str = "orgChartLastModified";
/// Key of the view-mode preference.
pub const VIEW_KEY: &str = "orgChartView";
/// Key of the theme preference.
pub const THEME_KEY: &str = "theme";
/// Key of the designation catalog.
pub const DESIGNATIONS_KEY: &str = "designations";
/// Key of host settings.
pub const SETTINGS_KEY: &str = "settings";
/// Suffix of per-key modification markers used to order evictions.
pub const MODIFIED_SUFFIX: &str = "_modified";
/// Maximum evict-and-retry rounds after a quota error.
pub const STORAGE_RETRY_LIMIT: u32 = 3;

const EVICTABLE_PREFIXES: [&str; 2] = ["orgChart", "bookmark"];
const PROBE_KEY: &str = "__storage_test__";

/// A table read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedTable {
    /// The table, internally consistent.
    pub table: HierarchyTable,
    /// Envelope write time, when recorded.
    pub last_modified: Option<u64>,
    /// Envelope schema version.
    pub schema_version: String,
    /// True when the stored payload was invalid and had to be rebuilt.
    pub recovered: bool,
}

/// What [`StorageGateway::initialize`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Storage was already at the current schema.
    Ready,
    /// First run: the version marker was written (and legacy data wrapped).
    Migrated {
        /// Whether a legacy bare table was found and wrapped.
        legacy_data: bool,
    },
    /// Stored data was invalid and has been rebuilt.
    Recovered,
    /// Stored data was unrecoverable and has been cleared.
    Cleared,
}

/// Validated access to the persisted organization chart and its side-tables.
pub struct StorageGateway<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: KeyValueStore> StorageGateway<S> {
    /// Gateway stamping writes with the system clock.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> StorageGateway<S, C> {
    /// Gateway stamping writes with `clock`.
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Clock stamping writes.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the gateway and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Probe: write then remove a sentinel key. False on any failure.
    pub fn is_storage_available(&self) -> bool {
        self.store.set(PROBE_KEY, PROBE_KEY).is_ok() && self.store.remove(PROBE_KEY).is_ok()
    }

    /// First-run migration and validation of existing data.
    pub fn initialize(&self) -> InitOutcome {
        match self.store.get(VERSION_KEY) {
            Ok(Some(_)) => match self.load() {
                Some(loaded) if loaded.recovered => InitOutcome::Recovered,
                None if !self.store.get(VERSION_KEY).is_ok_and(|v| v.is_some()) => {
                    InitOutcome::Cleared
                }
                _ => InitOutcome::Ready,
            },
            Ok(None) => {
                let legacy_data = self.migrate_legacy_slot();
                if let Err(err) = self.store.set(VERSION_KEY, SCHEMA_VERSION) {
                    warn!(%err, "failed to record schema version");
                }
                InitOutcome::Migrated { legacy_data }
            }
            Err(err) => {
                warn!(%err, "storage initialization failed");
                InitOutcome::Ready
            }
        }
    }

    fn migrate_legacy_slot(&self) -> bool {
        let Some(raw) = self.store.get(ORG_CHART_KEY).ok().flatten() else {
            return false;
        };
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            return false;
        };
        let Some(wrapped) = migrate_legacy(&value, self.clock.now_millis()) else {
            return false;
        };
        match self.write_with_eviction(ORG_CHART_KEY, &wrapped.to_string()) {
            Ok(()) => {
                info!("wrapped legacy organization chart into a versioned envelope");
                true
            }
            Err(err) => {
                warn!(%err, "failed to migrate legacy organization chart");
                false
            }
        }
    }

    /// Read the persisted table.
    ///
    /// Returns `None` when the slot is absent, unreadable, not JSON, or beyond
    /// recovery (in which case the chart slots are cleared). An invalid but
    /// recoverable payload is rebuilt, written back and returned with
    /// `recovered = true`.
    pub fn load(&self) -> Option<LoadedTable> {
        let raw = match self.store.get(ORG_CHART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(%err, "load operation failed");
                return None;
            }
        };
        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "stored organization chart is not valid JSON");
                return None;
            }
        };

        match decode(&value) {
            Ok(envelope) => {
                if envelope.version != SCHEMA_VERSION {
                    warn!(
                        found = %envelope.version,
                        expected = SCHEMA_VERSION,
                        "data version mismatch, migration may be needed"
                    );
                }
                Some(LoadedTable {
                    table: envelope.data,
                    last_modified: envelope.last_modified,
                    schema_version: envelope.version,
                    recovered: false,
                })
            }
            Err(reason) => {
                warn!(%reason, "invalid data structure detected, attempting recovery");
                match recover(&value) {
                    Ok(table) => {
                        if let Err(err) = self.save(&table) {
                            warn!(%err, "failed to write recovered organization chart");
                        }
                        info!(employees = table.len(), "data recovery successful");
                        Some(LoadedTable {
                            table,
                            last_modified: Some(self.clock.now_millis()),
                            schema_version: SCHEMA_VERSION.to_owned(),
                            recovered: true,
                        })
                    }
                    Err(err) => {
                        warn!(%err, "data recovery failed, clearing storage");
                        self.clear_storage();
                        None
                    }
                }
            }
        }
    }

    /// Validate and persist `table` inside a fresh envelope.
    pub fn save(&self, table: &HierarchyTable) -> Result<(), StorageError> {
        let violations = table.violations();
        if !violations.is_empty() {
            warn!(count = violations.len(), "refusing to save an invalid table");
            return Err(StorageError::Validation(violations));
        }
        let now = self.clock.now_millis();
        let envelope = Envelope {
            data: table,
            last_modified: Some(now),
            version: SCHEMA_VERSION.to_owned(),
        };
        let payload = serde_json::to_string(&envelope)?;
        self.write_with_eviction(ORG_CHART_KEY, &payload)?;
        debug!(version = table.version(), bytes = payload.len(), "organization chart saved");
        Ok(())
    }

    /// Write `value` under `key` plus its modification stamps, evicting older
    /// siblings and retrying while the store reports a quota error.
    fn write_with_eviction(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut retries = 0;
        loop {
            match self.write_stamped(key, value) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_quota_exceeded() && retries < STORAGE_RETRY_LIMIT => {
                    retries += 1;
                    warn!(key, retries, "storage quota exceeded, evicting older entries");
                    self.evict_siblings();
                }
                Err(err) => {
                    warn!(key, %err, "save operation failed");
                    return Err(err);
                }
            }
        }
    }

    fn write_stamped(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let now = self.clock.now_millis().to_string();
        self.store.set(key, value)?;
        if key == ORG_CHART_KEY {
            self.store.set(LAST_MODIFIED_KEY, &now)?;
        }
        self.store.set(&format!("{key}{MODIFIED_SUFFIX}"), &now)?;
        Ok(())
    }

    /// Remove every evictable key except the most recently modified one.
    fn evict_siblings(&self) {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%err, "cannot list keys for eviction");
                return;
            }
        };
        let mut candidates: Vec<(u64, String)> = keys
            .into_iter()
            .filter(|k| EVICTABLE_PREFIXES.iter().any(|p| k.starts_with(p)))
            .filter(|k| !k.ends_with(MODIFIED_SUFFIX))
            .map(|k| (self.modified_at(&k), k))
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        for (_, key) in candidates.into_iter().skip(1) {
            info!(%key, "evicting storage entry");
            let _ = self.store.remove(&key);
            let _ = self.store.remove(&format!("{key}{MODIFIED_SUFFIX}"));
        }
    }

    fn modified_at(&self, key: &str) -> u64 {
        self.store
            .get(&format!("{key}{MODIFIED_SUFFIX}"))
            .ok()
            .flatten()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0)
    }

    /// Remove every key the gateway owns.
    pub fn clear_storage(&self) {
        for key in [
            ORG_CHART_KEY,
            BOOKMARKS_KEY,
            VERSION_KEY,
            LAST_MODIFIED_KEY,
        ] {
            for slot in [key.to_owned(), format!("{key}{MODIFIED_SUFFIX}")] {
                if let Err(err) = self.store.remove(&slot) {
                    warn!(key = %slot, %err, "failed to clear storage");
                }
            }
        }
    }

    /// Typed JSON read of an arbitrary slot. `Ok(None)` when absent.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.store.get(key)? {
            Some(raw) if !raw.is_empty() => Ok(Some(serde_json::from_str(&raw)?)),
            _ => Ok(None),
        }
    }

    /// Typed JSON write of an arbitrary slot.
    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }

    /// Bookmarks; corrupt or unreadable data degrades to an empty set.
    pub fn load_bookmarks(&self) -> BookmarkSet {
        self.load_json(BOOKMARKS_KEY)
            .unwrap_or_else(|err| {
                warn!(%err, "failed to load bookmarks");
                None
            })
            .unwrap_or_default()
    }

    /// Replace the persisted bookmark set.
    pub fn save_bookmarks(&self, bookmarks: &BookmarkSet) -> Result<(), StorageError> {
        let raw = serde_json::to_string(bookmarks)?;
        self.write_with_eviction(BOOKMARKS_KEY, &raw)
    }

    /// Add or replace one named bookmark.
    pub fn save_bookmark(&self, name: &str, state: Option<Value>) -> Result<(), StorageError> {
        let mut bookmarks = self.load_bookmarks();
        bookmarks.insert(name, state, self.clock.now_millis());
        self.save_bookmarks(&bookmarks)
    }

    /// Delete one bookmark; returns whether it existed.
    pub fn delete_bookmark(&self, name: &str) -> Result<bool, StorageError> {
        let mut bookmarks = self.load_bookmarks();
        let existed = bookmarks.remove(name);
        self.save_bookmarks(&bookmarks)?;
        Ok(existed)
    }

    /// Designation catalog; absent or corrupt data yields the default catalog.
    pub fn load_designations(&self) -> DesignationCatalog {
        self.load_json(DESIGNATIONS_KEY)
            .unwrap_or_else(|err| {
                warn!(%err, "failed to load designations");
                None
            })
            .unwrap_or_default()
    }

    /// Persist the designation catalog.
    pub fn save_designations(&self, catalog: &DesignationCatalog) -> Result<(), StorageError> {
        self.save_json(DESIGNATIONS_KEY, catalog)
    }

    /// Host settings; absent or corrupt data yields defaults.
    pub fn load_settings(&self) -> Settings {
        self.load_json(SETTINGS_KEY).ok().flatten().unwrap_or_default()
    }

    /// Persist host settings.
    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        self.save_json(SETTINGS_KEY, settings)
    }

    /// View-mode preference (bare string slot); unknown values yield the default.
    pub fn load_view_mode(&self) -> ViewMode {
        self.load_bare(VIEW_KEY)
    }

    /// Persist the view-mode preference.
    pub fn save_view_mode(&self, mode: ViewMode) -> Result<(), StorageError> {
        self.store.set(VIEW_KEY, mode.as_str())
    }

    /// Theme preference (bare string slot); unknown values yield the default.
    pub fn load_theme(&self) -> Theme {
        self.load_bare(THEME_KEY)
    }

    /// Persist the theme preference.
    pub fn save_theme(&self, theme: Theme) -> Result<(), StorageError> {
        self.store.set(THEME_KEY, theme.as_str())
    }

    fn load_bare<T: std::str::FromStr + Default>(&self, key: &str) -> T {
        self.store
            .get(key)
            .ok()
            .flatten()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::hierarchy::HierarchyStore;
    use crate::model::{EmployeeId, NewEmployee};
    use serde_json::json;

    fn gateway(store: &MemoryStore) -> StorageGateway<MemoryStore, ManualClock> {
        StorageGateway::with_clock(store.clone(), ManualClock::at_millis(1_000))
    }

    fn sample_table() -> HierarchyTable {
        let mut s = HierarchyStore::new(ManualClock::at_millis(1_000));
        s.add_employee(NewEmployee::new("Ada", "CEO", None), Some("e1".into()))
            .unwrap();
        s.add_employee(
            NewEmployee::new("Bo", "CTO", Some(EmployeeId::new("e1"))),
            Some("e2".into()),
        )
        .unwrap();
        s.table().clone()
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        let table = sample_table();
        gw.save(&table).unwrap();

        let loaded = gw.load().unwrap();
        assert_eq!(loaded.table, table);
        assert!(!loaded.recovered);
        assert_eq!(loaded.schema_version, "1.0");
        assert_eq!(loaded.last_modified, Some(1_000));
        assert_eq!(store.peek(LAST_MODIFIED_KEY).as_deref(), Some("1000"));
    }

    #[test]
    fn save_rejects_invalid_table_without_writing() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        let table = sample_table();
        let broken = HierarchyTable::from_parts(
            table.by_id().clone(),
            vec![EmployeeId::new("e1")],
            table.version(),
        );
        assert!(matches!(gw.save(&broken), Err(StorageError::Validation(_))));
        assert_eq!(store.set_count(), 0);
    }

    #[test]
    fn load_absent_or_garbage_is_none() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        assert!(gw.load().is_none());
        store.set(ORG_CHART_KEY, "{not json").unwrap();
        assert!(gw.load().is_none());
    }

    #[test]
    fn load_recovers_unlisted_entries_and_writes_back() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        let table = sample_table();
        let mut value = serde_json::to_value(Envelope {
            data: &table,
            last_modified: Some(1),
            version: SCHEMA_VERSION.to_owned(),
        })
        .unwrap();
        value["data"]["allIds"] = json!(["e1"]);
        store.set(ORG_CHART_KEY, &value.to_string()).unwrap();

        let loaded = gw.load().unwrap();
        assert!(loaded.recovered);
        let ids: Vec<&str> = loaded.table.all_ids().iter().map(EmployeeId::as_str).collect();
        assert_eq!(ids, vec!["e1", "e2"]);

        let again = gw.load().unwrap();
        assert!(!again.recovered);
        assert_eq!(again.table, loaded.table);
    }

    #[test]
    fn unrecoverable_payload_clears_storage() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        store.set(ORG_CHART_KEY, "[1,2,3]").unwrap();
        store.set(VERSION_KEY, "1.0").unwrap();
        assert!(gw.load().is_none());
        assert!(!store.contains_key(ORG_CHART_KEY));
        assert!(!store.contains_key(VERSION_KEY));
    }

    #[test]
    fn quota_error_evicts_older_siblings_and_retries() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        store.set("orgChartSnapshotOld", &"x".repeat(400)).unwrap();
        store.set("orgChartSnapshotOld_modified", "10").unwrap();
        store.set("orgChartSnapshotNew", &"y".repeat(400)).unwrap();
        store.set("orgChartSnapshotNew_modified", "20").unwrap();
        store.set("unrelated", "keep").unwrap();
        store.set_quota(Some(store.used_bytes() + 400));

        let table = sample_table();
        gw.save(&table).unwrap();

        assert!(!store.contains_key("orgChartSnapshotOld"));
        assert!(store.contains_key("orgChartSnapshotNew"));
        assert!(store.contains_key("unrelated"));
        assert_eq!(gw.load().unwrap().table, table);
    }

    #[test]
    fn quota_retries_are_bounded() {
        let store = MemoryStore::with_quota(16);
        let gw = gateway(&store);
        let err = gw.save(&sample_table()).unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.set_count(), 1 + STORAGE_RETRY_LIMIT as usize);
    }

    #[test]
    fn bookmarks_degrade_to_empty_on_corruption() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        gw.save_bookmark("team", Some(json!({"focus": "e2"}))).unwrap();
        assert!(gw.load_bookmarks().contains("team"));
        assert!(gw.delete_bookmark("team").unwrap());
        assert!(!gw.delete_bookmark("team").unwrap());

        store.set(BOOKMARKS_KEY, "][").unwrap();
        assert!(gw.load_bookmarks().is_empty());
    }

    #[test]
    fn availability_probe() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        assert!(gw.is_storage_available());
        assert!(!store.contains_key("__storage_test__"));
        store.set_fail_on_set(true);
        assert!(!gw.is_storage_available());
    }

    #[test]
    fn initialize_wraps_legacy_data_once() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        let table = sample_table();
        store
            .set(ORG_CHART_KEY, &serde_json::to_string(&table).unwrap())
            .unwrap();

        assert_eq!(gw.initialize(), InitOutcome::Migrated { legacy_data: true });
        assert_eq!(store.peek(VERSION_KEY).as_deref(), Some("1.0"));
        assert_eq!(gw.load().unwrap().table, table);
        assert_eq!(gw.initialize(), InitOutcome::Ready);
    }

    #[test]
    fn prefs_use_bare_strings() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        assert_eq!(gw.load_view_mode(), ViewMode::Graph);
        gw.save_view_mode(ViewMode::Grid).unwrap();
        gw.save_theme(Theme::Dark).unwrap();
        assert_eq!(store.peek(VIEW_KEY).as_deref(), Some("grid"));
        assert_eq!(gw.load_theme(), Theme::Dark);
        store.set(THEME_KEY, "neon").unwrap();
        assert_eq!(gw.load_theme(), Theme::Light);
    }

    #[test]
    fn clear_storage_removes_owned_keys_only() {
        let store = MemoryStore::new();
        let gw = gateway(&store);
        gw.save(&sample_table()).unwrap();
        gw.save_theme(Theme::Dark).unwrap();
        gw.clear_storage();
        assert!(gw.load().is_none());
        assert!(!store.contains_key(LAST_MODIFIED_KEY));
        assert_eq!(gw.load_theme(), Theme::Dark);
    }
}
