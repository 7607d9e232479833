//! Device identity & key store (spec.md §3/§4.5): the persistent device
//! authentication key, client authorization key (plus a pending one awaiting
//! confirmation), ephemeral pairing key, and device id.
//!
//! Grounded on `original_source/src/device_crypto.c`: load-on-init,
//! generate-if-missing, save-inline-on-mutation. The CBOR shape follows
//! spec.md §6's `Keys` blob (`{1: device_auth_key, 2: client_authz_key,
//! 3: device_id}`).

use weave_common::buffer::Buffer;
use weave_common::cbor::{encode_to_buffer, Decoder};
use weave_common::status::{Result, Status};
use weave_common::value::Value;
use weave_crypto::providers::Csprng;

use crate::config::Config;
use crate::storage::{align_up, BlobName, Storage};

const KEY_DEVICE_AUTH_KEY: i64 = 1;
const KEY_CLIENT_AUTHZ_KEY: i64 = 2;
const KEY_DEVICE_ID: i64 = 3;

const DEVICE_AUTH_KEY_LEN: usize = 16;
const CLIENT_AUTHZ_KEY_LEN: usize = 16;
const DEVICE_ID_LEN: usize = 4;
pub const EPHEMERAL_PAIRING_KEY_LEN: usize = 56;

/// Persistent + ephemeral key material for one device, mirroring
/// `UwDeviceCrypto`.
#[derive(Debug, Clone)]
pub struct DeviceCrypto {
    device_auth_key: [u8; DEVICE_AUTH_KEY_LEN],
    has_device_auth_key: bool,

    client_authz_key: [u8; CLIENT_AUTHZ_KEY_LEN],
    has_client_authz_key: bool,

    pending_client_authz_key: [u8; CLIENT_AUTHZ_KEY_LEN],
    has_pending_client_authz_key: bool,

    ephemeral_pairing_key: [u8; EPHEMERAL_PAIRING_KEY_LEN],
    has_ephemeral_pairing_key: bool,
    ephemeral_issue_time_uptime: u32,

    device_id: [u8; DEVICE_ID_LEN],
    has_device_id: bool,
}

impl DeviceCrypto {
    /// Loads whatever key material `storage` has, generating and
    /// persisting a device auth key / device id if either is missing.
    /// Mirrors `uw_device_crypto_init_`.
    pub fn load_or_init<R: Csprng, S: Storage>(storage: &mut S, config: &Config, rng: &R) -> Result<Self> {
        let mut this = Self::from_storage(storage)?;

        let mut dirty = false;
        if !this.has_device_auth_key {
            this.device_auth_key = rng.random_array()?;
            this.has_device_auth_key = true;
            dirty = true;
        }
        if !this.has_device_id {
            this.device_id = rng.random_array()?;
            this.has_device_id = true;
            dirty = true;
        }
        if dirty {
            this.save(storage, config)?;
        }
        Ok(this)
    }

    fn from_storage(storage: &impl Storage) -> Result<Self> {
        let mut this = DeviceCrypto {
            device_auth_key: [0u8; DEVICE_AUTH_KEY_LEN],
            has_device_auth_key: false,
            client_authz_key: [0u8; CLIENT_AUTHZ_KEY_LEN],
            has_client_authz_key: false,
            pending_client_authz_key: [0u8; CLIENT_AUTHZ_KEY_LEN],
            has_pending_client_authz_key: false,
            ephemeral_pairing_key: [0u8; EPHEMERAL_PAIRING_KEY_LEN],
            has_ephemeral_pairing_key: false,
            ephemeral_issue_time_uptime: 0,
            device_id: [0u8; DEVICE_ID_LEN],
            has_device_id: false,
        };

        let Some(bytes) = storage.get(BlobName::Keys)? else {
            return Ok(this);
        };
        if bytes.is_empty() {
            return Ok(this);
        }

        let mut dec = Decoder::new(&bytes);
        let map = match dec.read_item() {
            Ok(item) => item.as_map()?,
            Err(_) => return Ok(this),
        };

        if let Some(item) = map.get(KEY_DEVICE_AUTH_KEY)? {
            if let Ok(b) = item.as_bytes() {
                if b.len() == DEVICE_AUTH_KEY_LEN {
                    this.device_auth_key.copy_from_slice(b);
                    this.has_device_auth_key = true;
                }
            }
        }
        if let Some(item) = map.get(KEY_CLIENT_AUTHZ_KEY)? {
            if let Ok(b) = item.as_bytes() {
                if b.len() == CLIENT_AUTHZ_KEY_LEN {
                    this.client_authz_key.copy_from_slice(b);
                    this.has_client_authz_key = true;
                }
            }
        }
        if let Some(item) = map.get(KEY_DEVICE_ID)? {
            if let Ok(b) = item.as_bytes() {
                if !b.is_empty() {
                    let len = b.len().min(DEVICE_ID_LEN);
                    this.device_id[..len].copy_from_slice(&b[..len]);
                    this.has_device_id = true;
                }
            }
        }

        Ok(this)
    }

    fn save(&self, storage: &mut impl Storage, config: &Config) -> Result<()> {
        let mut entries: Vec<(i64, Value)> = Vec::with_capacity(3);
        if self.has_device_auth_key {
            entries.push((KEY_DEVICE_AUTH_KEY, Value::ByteString(&self.device_auth_key)));
        }
        if self.has_client_authz_key {
            entries.push((KEY_CLIENT_AUTHZ_KEY, Value::ByteString(&self.client_authz_key)));
        }
        if self.has_device_id {
            entries.push((KEY_DEVICE_ID, Value::ByteString(&self.device_id)));
        }

        let buf = encode_to_buffer(&Value::map(&entries), 256)?;
        let padded_len = align_up(buf.len(), config.storage_alignment);
        let mut padded = Buffer::with_capacity(padded_len);
        padded.append(buf.as_bytes())?;
        padded.set_length(padded_len)?;

        storage.put(BlobName::Keys, padded.as_bytes())
    }

    /// Wipes all key material and regenerates the base identity, mirroring
    /// `uw_device_crypto_reset_` (factory reset).
    pub fn reset<R: Csprng, S: Storage>(storage: &mut S, config: &Config, rng: &R) -> Result<Self> {
        storage.put(BlobName::Keys, &[])?;
        Self::load_or_init(storage, config, rng)
    }

    pub fn device_auth_key(&self) -> Option<&[u8; DEVICE_AUTH_KEY_LEN]> {
        self.has_device_auth_key.then_some(&self.device_auth_key)
    }

    pub fn client_authz_key(&self) -> Option<&[u8; CLIENT_AUTHZ_KEY_LEN]> {
        self.has_client_authz_key.then_some(&self.client_authz_key)
    }

    pub fn device_id(&self) -> Option<[u8; DEVICE_ID_LEN]> {
        self.has_device_id.then_some(self.device_id)
    }

    /// A device is "set up" once it has a committed client authorization
    /// key (spec.md §3 `DeviceCrypto` invariant).
    pub fn is_set_up(&self) -> bool {
        self.has_client_authz_key
    }

    pub fn ephemeral_pairing_key(&self) -> Option<&[u8; EPHEMERAL_PAIRING_KEY_LEN]> {
        self.has_ephemeral_pairing_key.then_some(&self.ephemeral_pairing_key)
    }

    /// Records a freshly-derived SPAKE2 shared key as the ephemeral pairing
    /// key, timestamped by uptime for later expiration checks. Mirrors
    /// `uw_device_crypto_remember_pairing_key_`.
    pub fn remember_pairing_key(&mut self, key: [u8; EPHEMERAL_PAIRING_KEY_LEN], issued_at_uptime: u32) {
        self.ephemeral_pairing_key = key;
        self.has_ephemeral_pairing_key = true;
        self.ephemeral_issue_time_uptime = issued_at_uptime;
    }

    pub fn clear_ephemeral_pairing_key(&mut self) {
        self.ephemeral_pairing_key = [0u8; EPHEMERAL_PAIRING_KEY_LEN];
        self.has_ephemeral_pairing_key = false;
    }

    pub fn ephemeral_pairing_key_issued_at(&self) -> Option<u32> {
        self.has_ephemeral_pairing_key.then_some(self.ephemeral_issue_time_uptime)
    }

    /// Generates and stashes a fresh pending client authorization key
    /// (`/accessControl/claim`), not yet persisted. Mirrors
    /// `uw_device_crypto_generate_pending_client_authz_key_`.
    pub fn generate_pending_client_authz_key<R: Csprng>(&mut self, rng: &R) -> Result<[u8; CLIENT_AUTHZ_KEY_LEN]> {
        let key: [u8; CLIENT_AUTHZ_KEY_LEN] = rng.random_array()?;
        self.pending_client_authz_key = key;
        self.has_pending_client_authz_key = true;
        Ok(key)
    }

    pub fn pending_client_authz_key(&self) -> Option<&[u8; CLIENT_AUTHZ_KEY_LEN]> {
        self.has_pending_client_authz_key.then_some(&self.pending_client_authz_key)
    }

    /// Promotes the pending key to the committed `client_authz_key` and
    /// persists it. Mirrors `uw_device_crypto_commit_pending_client_authz_key_`.
    pub fn commit_pending_client_authz_key(&mut self, storage: &mut impl Storage, config: &Config) -> Result<()> {
        if !self.has_pending_client_authz_key {
            return Err(Status::DeviceCryptoNoKeys);
        }
        self.client_authz_key = self.pending_client_authz_key;
        self.has_client_authz_key = true;
        self.save(storage, config)?;

        self.has_pending_client_authz_key = false;
        self.pending_client_authz_key = [0u8; CLIENT_AUTHZ_KEY_LEN];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use weave_crypto::providers::host::HostCsprng;

    #[test]
    fn init_generates_and_persists_identity() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let crypto = DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap();
        assert!(crypto.device_auth_key().is_some());
        assert!(crypto.device_id().is_some());
        assert!(!crypto.is_set_up());

        // A second load should reuse the persisted identity, not regenerate it.
        let reloaded = DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap();
        assert_eq!(reloaded.device_auth_key(), crypto.device_auth_key());
        assert_eq!(reloaded.device_id(), crypto.device_id());
    }

    #[test]
    fn claim_then_confirm_commits_client_authz_key() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let mut crypto = DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap();

        let pending = crypto.generate_pending_client_authz_key(&HostCsprng).unwrap();
        assert!(!crypto.is_set_up());

        crypto.commit_pending_client_authz_key(&mut storage, &config).unwrap();
        assert!(crypto.is_set_up());
        assert_eq!(crypto.client_authz_key(), Some(&pending));
        assert!(crypto.pending_client_authz_key().is_none());
    }

    #[test]
    fn reset_wipes_and_regenerates() {
        let mut storage = MemoryStorage::new();
        let config = Config::default();
        let before = DeviceCrypto::load_or_init(&mut storage, &config, &HostCsprng).unwrap();
        let after = DeviceCrypto::reset(&mut storage, &config, &HostCsprng).unwrap();
        assert_ne!(before.device_id(), after.device_id());
        assert!(!after.is_set_up());
    }
}
