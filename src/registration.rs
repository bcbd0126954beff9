use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_NAME: &str = "Living Room Speaker";
pub const DEFAULT_DEVICE_ID: &str = "esp32-audio-01";
pub const DEFAULT_HOST: &str = "192.168.1.175";

/// A registered speaker. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub device_id: String,
    pub host: String,
}

impl DeviceConfig {
    pub fn title(&self) -> &str {
        &self.name
    }
}

/// User input for the registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub name: String,
    pub device_id: String,
    pub host: String,
}

impl Default for RegistrationForm {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            host: DEFAULT_HOST.to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("field '{0}' is required")]
    MissingField(&'static str),

    #[error("device '{0}' is already configured")]
    AlreadyConfigured(String),
}

/// Registered devices keyed by their canonical device id.
#[derive(Debug, Default, Clone)]
pub struct DeviceStore {
    records: BTreeMap<String, DeviceConfig>,
}

/// Canonical uniqueness key for a device identifier.
/// The id is used verbatim: no trimming or case folding, so
/// "Speaker" and "speaker" are different devices.
pub fn canonical_key(device_id: &str) -> String {
    device_id.to_string()
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceConfig> {
        self.records.get(&canonical_key(device_id))
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceConfig> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load a store from a JSON array of records. A missing file is an empty
    /// store. Each record goes through [`submit`], so duplicates and records
    /// with empty fields are skipped.
    pub fn load(path: &Path) -> Result<Self, String> {
        let mut store = Self::new();
        if !path.exists() {
            return Ok(store);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let records: Vec<RegistrationForm> = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;

        for record in records {
            let device_id = record.device_id.clone();
            if let Err(e) = submit(&mut store, record) {
                warn!("Skipping stored device '{}': {}", device_id, e);
            }
        }
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let records: Vec<&DeviceConfig> = self.records.values().collect();
        let content = serde_json::to_string_pretty(&records)
            .map_err(|e| format!("Failed to serialize devices: {e}"))?;
        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))
    }
}

/// Validate a form and register it in `store`.
pub fn submit(
    store: &mut DeviceStore,
    form: RegistrationForm,
) -> Result<DeviceConfig, RegistrationError> {
    if form.name.is_empty() {
        return Err(RegistrationError::MissingField("name"));
    }
    if form.device_id.is_empty() {
        return Err(RegistrationError::MissingField("device_id"));
    }
    if form.host.is_empty() {
        return Err(RegistrationError::MissingField("host"));
    }

    if store.get(&form.device_id).is_some() {
        return Err(RegistrationError::AlreadyConfigured(form.device_id));
    }

    let record = DeviceConfig {
        name: form.name,
        device_id: form.device_id,
        host: form.host,
    };
    info!(
        "Registered device '{}' ({}) at {}",
        record.title(),
        record.device_id,
        record.host
    );
    store
        .records
        .insert(canonical_key(&record.device_id), record.clone());
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn form(name: &str, device_id: &str, host: &str) -> RegistrationForm {
        RegistrationForm {
            name: name.to_string(),
            device_id: device_id.to_string(),
            host: host.to_string(),
        }
    }

    #[test]
    fn default_form_registers() {
        let mut store = DeviceStore::new();
        let record = submit(&mut store, RegistrationForm::default()).unwrap();

        assert_eq!(record.title(), "Living Room Speaker");
        assert_eq!(record.device_id, "esp32-audio-01");
        assert_eq!(record.host, "192.168.1.175");
        assert_eq!(store.get("esp32-audio-01"), Some(&record));
    }

    #[test]
    fn duplicate_device_id_is_aborted() {
        let mut store = DeviceStore::new();
        submit(&mut store, form("Kitchen", "speaker-1", "10.0.0.2")).unwrap();

        let err = submit(&mut store, form("Bedroom", "speaker-1", "10.0.0.3")).unwrap_err();

        assert_eq!(err, RegistrationError::AlreadyConfigured("speaker-1".into()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("speaker-1").unwrap().name, "Kitchen");
    }

    #[rstest]
    #[case(form("", "id", "host"), "name")]
    #[case(form("name", "", "host"), "device_id")]
    #[case(form("name", "id", ""), "host")]
    fn empty_fields_are_rejected(#[case] input: RegistrationForm, #[case] field: &str) {
        let mut store = DeviceStore::new();
        match submit(&mut store, input) {
            Err(RegistrationError::MissingField(f)) => assert_eq!(f, field),
            other => panic!("expected missing field, got {:?}", other),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn device_id_is_case_sensitive() {
        let mut store = DeviceStore::new();
        submit(&mut store, form("Upper", "Speaker", "10.0.0.2")).unwrap();
        submit(&mut store, form("Lower", "speaker", "10.0.0.3")).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(canonical_key(" Speaker"), " Speaker");
    }

    #[test]
    fn slash_in_device_id_is_accepted() {
        let mut store = DeviceStore::new();
        let record = submit(&mut store, form("Living Room", "living/room", "10.0.0.4")).unwrap();
        assert_eq!(store.get("living/room"), Some(&record));
    }

    #[test]
    fn host_is_not_format_checked() {
        let mut store = DeviceStore::new();
        let record = submit(&mut store, form("Odd", "odd", "not a host:99999")).unwrap();
        assert_eq!(record.host, "not a host:99999");
    }

    #[test]
    fn store_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        let mut store = DeviceStore::new();
        submit(&mut store, form("Kitchen", "kitchen", "10.0.0.2")).unwrap();
        submit(&mut store, form("Porch", "porch", "10.0.0.9")).unwrap();
        store.save(&path).unwrap();

        let loaded = DeviceStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("porch").unwrap().host, "10.0.0.9");
    }

    #[test]
    fn load_skips_duplicates_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "A", "device_id": "dup", "host": "10.0.0.1"},
                {"name": "B", "device_id": "dup", "host": "10.0.0.2"},
                {"name": "", "device_id": "nameless", "host": "10.0.0.3"}
            ]"#,
        )
        .unwrap();

        let store = DeviceStore::load(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("dup").unwrap().name, "A");
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceStore::load(&dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
    }
}
