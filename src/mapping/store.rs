//! Mapping resolution and persistence with device-scoped fallback.
//!
//! All reads go through [`MappingStore::resolve`] so every call site shares
//! one fallback policy: device-specific table -> legacy global table ->
//! built-in default. Writes land at the most specific writable scope and
//! are announced over the plugin broadcast channel; observers re-resolve on
//! notification instead of receiving diffs.

use crate::device::DeviceIdentity;
use crate::host::{PluginMessage, Storage, StorageScope};
use crate::mapping::{default_mapping, ControllerMapping, MappingError};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Synced-storage key of the pre-device-aware shared table.
const LEGACY_MAPPING_KEY: &str = "controllerMapping";

/// Granularity at which a mapping table is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingScope {
    /// Built-in table, immutable.
    Default,
    /// Single shared table from before mappings became device-aware.
    LegacyGlobal,
    /// Table keyed by a parsed device identity.
    Device(DeviceIdentity),
}

impl MappingScope {
    /// The synced-storage key written for this scope, `None` for the
    /// built-in default (which is never persisted).
    pub fn storage_key(&self) -> Option<String> {
        match self {
            MappingScope::Default => None,
            MappingScope::LegacyGlobal => Some(LEGACY_MAPPING_KEY.to_string()),
            MappingScope::Device(identity) => Some(identity.storage_key()),
        }
    }
}

impl fmt::Display for MappingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingScope::Default => write!(f, "default"),
            MappingScope::LegacyGlobal => write!(f, "legacy-global"),
            MappingScope::Device(identity) => write!(f, "device {identity}"),
        }
    }
}

/// Resolver and writer for controller mapping tables.
///
/// Cloning is cheap; clones share the storage backend and the notifier.
#[derive(Debug)]
pub struct MappingStore<S: Storage> {
    storage: Arc<S>,
    notifier: broadcast::Sender<PluginMessage>,
    defaults: ControllerMapping,
}

impl<S: Storage> Clone for MappingStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            notifier: self.notifier.clone(),
            defaults: self.defaults.clone(),
        }
    }
}

impl<S: Storage> MappingStore<S> {
    pub fn new(storage: Arc<S>, notifier: broadcast::Sender<PluginMessage>) -> Self {
        Self {
            storage,
            notifier,
            defaults: default_mapping(),
        }
    }

    /// Receiver for mapping-change (and other plugin) broadcasts.
    pub fn subscribe(&self) -> broadcast::Receiver<PluginMessage> {
        self.notifier.subscribe()
    }

    /// The built-in default table.
    pub fn defaults(&self) -> &ControllerMapping {
        &self.defaults
    }

    /// Seeds the legacy global key with the default table if nothing is
    /// stored there yet, so fresh installs have a visible starting point.
    pub async fn ensure_default(&self) -> Result<(), MappingError> {
        if self
            .storage
            .get(StorageScope::Synced, LEGACY_MAPPING_KEY)
            .await?
            .is_none()
        {
            info!("Seeding legacy global mapping with default table");
            let content = toml::to_string_pretty(&self.defaults)?;
            self.storage
                .set(StorageScope::Synced, LEGACY_MAPPING_KEY, content)
                .await?;
        }
        Ok(())
    }

    /// Resolves the mapping table for a raw device identifier.
    ///
    /// Never fails: storage errors and unparsable identifiers degrade along
    /// the fallback chain, worst case returning the built-in default.
    pub async fn resolve(&self, raw_id: Option<&str>) -> (ControllerMapping, MappingScope) {
        if let Some(identity) = raw_id.and_then(DeviceIdentity::parse) {
            if let Some(table) = self.read_table(&identity.storage_key()).await {
                debug!("Resolved device-specific mapping for {identity}");
                return (table, MappingScope::Device(identity));
            }
        }

        if let Some(table) = self.read_table(LEGACY_MAPPING_KEY).await {
            debug!("Resolved legacy global mapping");
            return (table, MappingScope::LegacyGlobal);
        }

        debug!("No stored mapping, using built-in default");
        (self.defaults.clone(), MappingScope::Default)
    }

    /// Rebinds a button to a new action and persists the updated table.
    ///
    /// With `swap` the existing entry's action is changed in place,
    /// preserving group and label; without it the old entry is removed and a
    /// fresh one (group/label re-derived from the default table) is appended.
    /// A button the default table does not know cannot be bound at all.
    ///
    /// Writes target the most specific writable scope: the device table when
    /// the identifier parses, the legacy global table otherwise. On success
    /// a [`PluginMessage::MappingChanged`] broadcast tells observers to
    /// re-resolve.
    pub async fn upsert(
        &self,
        raw_id: Option<&str>,
        button_index: u8,
        action: crate::mapping::ReviewAction,
        swap: bool,
    ) -> Result<MappingScope, MappingError> {
        let scope = match raw_id.and_then(DeviceIdentity::parse) {
            Some(identity) => MappingScope::Device(identity),
            None => MappingScope::LegacyGlobal,
        };
        let key = scope
            .storage_key()
            .unwrap_or_else(|| LEGACY_MAPPING_KEY.to_string());

        let mut table = match self.read_table(&key).await {
            Some(table) => table,
            None => self.defaults.clone(),
        };

        let position = table
            .buttons
            .iter()
            .rposition(|m| m.button_index == button_index);

        match position {
            None => {
                let template = self.default_entry(button_index)?;
                warn!(
                    "No mapping for button index {} at scope {}, adding new binding",
                    button_index, scope
                );
                table.buttons.push(crate::mapping::ButtonMapping {
                    button_index,
                    action,
                    group: template.group,
                    label: template.label.clone(),
                });
            }
            Some(pos) if swap => {
                let old_action = table.buttons[pos].action;
                table.buttons[pos].action = action;
                info!(
                    "Button mapping for {} changed to {} (was {})",
                    table.buttons[pos].label, action, old_action
                );
            }
            Some(pos) => {
                let template = self.default_entry(button_index)?;
                let old = table.buttons.remove(pos);
                info!(
                    "Button mapping for {} replaced with {} (was {})",
                    old.label, action, old.action
                );
                table.buttons.push(crate::mapping::ButtonMapping {
                    button_index,
                    action,
                    group: template.group,
                    label: template.label.clone(),
                });
            }
        }

        let content = toml::to_string_pretty(&table)?;
        self.storage.set(StorageScope::Synced, &key, content).await?;

        let message = PluginMessage::MappingChanged {
            scope_key: match &scope {
                MappingScope::Device(_) => Some(key),
                _ => None,
            },
        };
        if self.notifier.send(message).is_err() {
            debug!("No subscribers for mapping change broadcast");
        }

        Ok(scope)
    }

    fn default_entry(&self, button_index: u8) -> Result<&crate::mapping::ButtonMapping, MappingError> {
        self.defaults
            .buttons
            .iter()
            .find(|m| m.button_index == button_index)
            .ok_or(MappingError::UnknownButtonIndex(button_index))
    }

    /// Reads and parses a stored table; any failure degrades to `None` so
    /// resolution falls through to the next scope.
    async fn read_table(&self, key: &str) -> Option<ControllerMapping> {
        let content = match self.storage.get(StorageScope::Synced, key).await {
            Ok(content) => content?,
            Err(e) => {
                warn!("Storage read for mapping key {} failed: {}", key, e);
                return None;
            }
        };

        match toml::from_str::<ControllerMapping>(&content) {
            Ok(table) if !table.is_empty() => Some(table),
            Ok(_) => {
                debug!("Stored mapping at {} is empty, falling through", key);
                None
            }
            Err(e) => {
                warn!("Stored mapping at {} is corrupt, falling through: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryStorage;
    use crate::mapping::ReviewAction;

    const XBOX_ID: &str = "Xbox 360 Controller (Vendor: 045e Product: 028e)";
    const XBOX_ID_REV2: &str = "045e-028e-Xbox 360 Controller rev2";

    fn store() -> MappingStore<MemoryStorage> {
        let (notifier, _) = broadcast::channel(16);
        MappingStore::new(Arc::new(MemoryStorage::new()), notifier)
    }

    #[tokio::test]
    async fn resolve_falls_back_to_default_when_nothing_stored() {
        let store = store();
        let (table, scope) = store.resolve(Some(XBOX_ID)).await;
        assert_eq!(scope, MappingScope::Default);
        assert_eq!(table, default_mapping());
    }

    #[tokio::test]
    async fn resolve_with_unparsable_id_never_fails() {
        let store = store();
        let (table, scope) = store.resolve(Some("Generic USB Joystick")).await;
        assert_eq!(scope, MappingScope::Default);
        assert!(!table.is_empty());

        let (_, scope) = store.resolve(None).await;
        assert_eq!(scope, MappingScope::Default);
    }

    #[tokio::test]
    async fn upsert_without_identity_writes_legacy_global() {
        let store = store();
        let scope = store
            .upsert(None, 3, ReviewAction::AnswerGood, true)
            .await
            .expect("upsert should succeed");
        assert_eq!(scope, MappingScope::LegacyGlobal);

        let (table, scope) = store.resolve(None).await;
        assert_eq!(scope, MappingScope::LegacyGlobal);
        assert_eq!(table.action_for(3), Some(ReviewAction::AnswerGood));
    }

    #[tokio::test]
    async fn upsert_with_identity_writes_device_scope() {
        let store = store();
        let scope = store
            .upsert(Some(XBOX_ID), 0, ReviewAction::AnswerAgain, true)
            .await
            .expect("upsert should succeed");
        assert!(matches!(scope, MappingScope::Device(_)));

        // The device table shadows the legacy table for the same hardware,
        // even when the raw descriptor differs by firmware revision.
        let (table, scope) = store.resolve(Some(XBOX_ID_REV2)).await;
        assert!(matches!(scope, MappingScope::Device(_)));
        assert_eq!(table.action_for(0), Some(ReviewAction::AnswerAgain));

        // Another device still sees the fallback chain.
        let (_, scope) = store.resolve(Some("Vendor: 054c Product: 09cc")).await;
        assert_eq!(scope, MappingScope::Default);
    }

    #[tokio::test]
    async fn swap_preserves_group_and_label() {
        let store = store();
        store
            .upsert(Some(XBOX_ID), 3, ReviewAction::AnswerEasy, true)
            .await
            .expect("upsert should succeed");

        let (table, _) = store.resolve(Some(XBOX_ID)).await;
        let entry = table
            .buttons
            .iter()
            .find(|m| m.button_index == 3)
            .expect("entry should exist");
        assert_eq!(entry.action, ReviewAction::AnswerEasy);
        assert_eq!(entry.group, crate::mapping::ButtonGroup::FaceButton);
        assert_eq!(entry.label, "North Button");
        // Swap keeps the entry in place.
        assert_eq!(table.buttons[0].button_index, 3);
    }

    #[tokio::test]
    async fn replace_appends_rederived_entry() {
        let store = store();
        store
            .upsert(None, 3, ReviewAction::AnswerEasy, false)
            .await
            .expect("upsert should succeed");

        let (table, _) = store.resolve(None).await;
        assert_eq!(table.buttons.len(), default_mapping().buttons.len());
        let last = table.buttons.last().expect("table is not empty");
        assert_eq!(last.button_index, 3);
        assert_eq!(last.action, ReviewAction::AnswerEasy);
        assert_eq!(last.label, "North Button");
    }

    #[tokio::test]
    async fn unknown_button_index_is_rejected_and_table_untouched() {
        let store = store();
        let err = store
            .upsert(None, 11, ReviewAction::AnswerGood, true)
            .await
            .expect_err("stick click is not in the default layout");
        assert!(matches!(err, MappingError::UnknownButtonIndex(11)));

        let (table, scope) = store.resolve(None).await;
        assert_eq!(scope, MappingScope::Default);
        assert_eq!(table, default_mapping());
    }

    #[tokio::test]
    async fn resolve_is_idempotent_between_writes() {
        let store = store();
        store
            .upsert(Some(XBOX_ID), 1, ReviewAction::ScrollDown, true)
            .await
            .expect("upsert should succeed");

        let first = store.resolve(Some(XBOX_ID)).await;
        let second = store.resolve(Some(XBOX_ID)).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn upsert_broadcasts_changed_scope_key() {
        let store = store();
        let mut rx = store.subscribe();

        store
            .upsert(Some(XBOX_ID), 3, ReviewAction::AnswerGood, true)
            .await
            .expect("upsert should succeed");
        let msg = rx.recv().await.expect("broadcast should arrive");
        assert_eq!(
            msg,
            PluginMessage::MappingChanged {
                scope_key: Some("controllerMapping_045e_028e".to_string())
            }
        );

        store
            .upsert(None, 3, ReviewAction::AnswerHard, true)
            .await
            .expect("upsert should succeed");
        let msg = rx.recv().await.expect("broadcast should arrive");
        assert_eq!(msg, PluginMessage::MappingChanged { scope_key: None });
    }

    #[tokio::test]
    async fn ensure_default_seeds_legacy_key_once() {
        let store = store();
        store.ensure_default().await.expect("seed should succeed");

        let (table, scope) = store.resolve(None).await;
        assert_eq!(scope, MappingScope::LegacyGlobal);
        assert_eq!(table, default_mapping());

        // A customized table is not overwritten by a second call.
        store
            .upsert(None, 3, ReviewAction::AnswerGood, true)
            .await
            .expect("upsert should succeed");
        store.ensure_default().await.expect("seed should succeed");
        let (table, _) = store.resolve(None).await;
        assert_eq!(table.action_for(3), Some(ReviewAction::AnswerGood));
    }
}
