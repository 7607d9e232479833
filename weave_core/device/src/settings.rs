//! Device-specific settings (spec.md §4.11 supplement): firmware/model
//! identity, pairing capability declarations, and the persisted device name.
//!
//! Grounded on `original_source/include/uweave/settings.h` +
//! `src/settings.c`: everything except `name` is supplied once by the host
//! at startup and never persisted; `name` starts at the host-supplied
//! default but is overridden by whatever was last persisted, and every
//! subsequent `/setup` write updates both the in-memory value and storage.

use weave_common::cbor::{encode_to_buffer, Decoder};
use weave_common::status::Result;
use weave_common::value::Value;

use crate::config::{Config, SETTINGS_MAX_NAME_LENGTH};
use crate::storage::{align_up, BlobName, Storage};

const STORAGE_KEY_NAME: i64 = 1;

/// `UwPairingType`: powers of two so a device can advertise more than one
/// supported pairing mode in a single bitmask.
pub const PAIRING_TYPE_NONE: u8 = 0;
pub const PAIRING_TYPE_PIN_CODE: u8 = 1 << 0;
pub const PAIRING_TYPE_EMBEDDED_CODE: u8 = 1 << 1;

/// `UwEmbeddedCode`: where the embedded pairing code (if supported) comes
/// from. The original's tagged union of a string pointer or callback
/// function pointer becomes an enum carrying the string case directly; a
/// host that needs the callback case can poll for a fresh code each time it
/// builds [`Settings`] instead of this crate calling back into host code.
#[derive(Debug, Clone)]
pub enum EmbeddedCodeSource {
    None,
    Fixed(String),
}

/// Host-supplied identity and capability declaration for one device.
/// Mirrors `UwSettings`, minus the pairing begin/end function pointers
/// (`UwPairingCallback`), which belong to the pairing collaborator a host
/// wires in directly rather than storing on this struct.
#[derive(Debug, Clone)]
pub struct Settings {
    pub firmware_version: String,
    pub oem_name: String,
    pub model_name: String,
    pub model_id: [u8; 3],
    pub device_class: [u8; 2],
    pub supported_pairing_types: u8,
    pub embedded_code: EmbeddedCodeSource,
    pub supports_wifi_24ghz: bool,
    pub supports_wifi_50ghz: bool,
    pub supports_ble_40: bool,
    pub enable_multipairing: bool,
    name: String,
}

impl Settings {
    pub fn new(
        firmware_version: impl Into<String>,
        oem_name: impl Into<String>,
        model_name: impl Into<String>,
        model_id: [u8; 3],
        device_class: [u8; 2],
        default_name: impl Into<String>,
    ) -> Self {
        Settings {
            firmware_version: firmware_version.into(),
            oem_name: oem_name.into(),
            model_name: model_name.into(),
            model_id,
            device_class,
            supported_pairing_types: PAIRING_TYPE_NONE,
            embedded_code: EmbeddedCodeSource::None,
            supports_wifi_24ghz: false,
            supports_wifi_50ghz: false,
            supports_ble_40: false,
            enable_multipairing: false,
            name: truncate_name(default_name.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the device name, persists it, and truncates to
    /// [`SETTINGS_MAX_NAME_LENGTH`] bytes if necessary (the `/setup`
    /// handler's entry point). Mirrors the name field's update path.
    pub fn set_name(&mut self, name: impl Into<String>, storage: &mut impl Storage, config: &Config) -> Result<()> {
        self.name = truncate_name(name.into());
        self.write_to_storage(storage, config)
    }

    /// The 5-byte model manifest id: 2 bytes of device class followed by 3
    /// bytes of model id. Mirrors `uw_settings_get_model_manifest_id`.
    pub fn model_manifest_id(&self) -> [u8; 5] {
        let mut id = [0u8; 5];
        id[..2].copy_from_slice(&self.device_class);
        id[2..].copy_from_slice(&self.model_id);
        id
    }

    /// Overrides `name` with whatever was last persisted, leaving every
    /// other field at its host-supplied default. Absence or a corrupt blob
    /// is not an error — the original value is kept either way. Mirrors
    /// `uw_settings_read_from_storage_`.
    pub fn load_persisted(&mut self, storage: &impl Storage) -> Result<()> {
        let Some(bytes) = storage.get(BlobName::Settings)? else {
            return Ok(());
        };
        if bytes.is_empty() {
            return Ok(());
        }
        let mut dec = Decoder::new(&bytes);
        let map = match dec.read_item().and_then(|item| item.as_map()) {
            Ok(map) => map,
            Err(_) => return Ok(()),
        };
        if let Some(item) = map.get(STORAGE_KEY_NAME)? {
            if let Ok(name) = item.as_text() {
                self.name = truncate_name(name.to_string());
            }
        }
        Ok(())
    }

    fn write_to_storage(&self, storage: &mut impl Storage, config: &Config) -> Result<()> {
        let entries: Vec<(i64, Value)> = if self.name.is_empty() {
            Vec::new()
        } else {
            vec![(STORAGE_KEY_NAME, Value::Text(&self.name))]
        };
        let buf = encode_to_buffer(&Value::map(&entries), 512)?;
        let padded_len = align_up(buf.len(), config.storage_alignment);
        let mut bytes = buf.as_bytes().to_vec();
        bytes.resize(padded_len, 0);
        storage.put(BlobName::Settings, &bytes)
    }
}

fn truncate_name(mut name: String) -> String {
    if name.len() > SETTINGS_MAX_NAME_LENGTH {
        while !name.is_char_boundary(SETTINGS_MAX_NAME_LENGTH) {
            name.pop();
        }
        name.truncate(SETTINGS_MAX_NAME_LENGTH);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn settings() -> Settings {
        Settings::new("1.0", "Acme", "Widget", [b'A', b'B', b'C'], [b'X', b'Y'], "My Device")
    }

    #[test]
    fn model_manifest_id_concatenates_class_and_model() {
        let s = settings();
        assert_eq!(s.model_manifest_id(), *b"XYABC");
    }

    #[test]
    fn set_name_persists_and_reloads() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut s = settings();
        s.set_name("Kitchen Light", &mut storage, &config).unwrap();

        let mut reloaded = settings();
        assert_eq!(reloaded.name(), "My Device");
        reloaded.load_persisted(&storage).unwrap();
        assert_eq!(reloaded.name(), "Kitchen Light");
    }

    #[test]
    fn name_is_truncated_to_max_length() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut s = settings();
        let long_name = "x".repeat(SETTINGS_MAX_NAME_LENGTH + 50);
        s.set_name(long_name, &mut storage, &config).unwrap();
        assert_eq!(s.name().len(), SETTINGS_MAX_NAME_LENGTH);
    }

    #[test]
    fn missing_persisted_settings_keeps_default_name() {
        let storage = MemoryStorage::new();
        let mut s = settings();
        s.load_persisted(&storage).unwrap();
        assert_eq!(s.name(), "My Device");
    }
}
