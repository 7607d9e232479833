//! The 20-byte BLE advertising payload (spec.md §4.11), built from device
//! settings and identity rather than sent as a live radio op — the actual
//! `uwp_ble_set_advertising_data` call belongs to a host's radio
//! collaborator, not this crate.
//!
//! Grounded on `original_source/src/ble_advertising.c` + `.h`: two
//! length-prefixed TLV-ish fields packed into a fixed 20-byte buffer, the
//! rest left zeroed. Field layout, tag bytes, and flag bit positions are
//! reproduced exactly since they are part of the over-the-air contract.

pub const ADVERTISING_PAYLOAD_LEN: usize = 20;

/// `kGoogleId_`, the BLE manufacturer id this payload is published under.
pub const GOOGLE_MANUFACTURER_ID: u16 = 0xE000;

const FIELD_PRIVET_DATA_TAG: u8 = 0x0D;
const FIELD_PUBLIC_ID_TAG: u8 = 0x0E;

const ADVERTISING_LAYOUT_LEN: u8 = 8; // 1 + 2 + 3 + 2
const PUBLIC_ID_LAYOUT_LEN: u8 = 5; // 1 + 4

pub const FLAG_NEEDS_WIFI_SETUP: u8 = 1 << 0;
pub const FLAG_NEEDS_WEAVE_REGISTRATION: u8 = 1 << 1;

pub const FLAG_WIFI_24GHZ: u8 = 1 << 0;
pub const FLAG_WIFI_50GHZ: u8 = 1 << 1;
pub const FLAG_BLE_40: u8 = 1 << 2;

/// Everything [`build_advertising_data`] needs, pulled out of `Settings` and
/// `DeviceCrypto` so this module stays independent of either's internals.
#[derive(Debug, Clone, Copy)]
pub struct AdvertisingInputs {
    pub device_class: [u8; 2],
    pub model_id: [u8; 3],
    pub supports_wifi_24ghz: bool,
    pub supports_wifi_50ghz: bool,
    pub supports_ble_40: bool,
    pub is_set_up: bool,
    pub device_id: [u8; 4],
}

/// Builds the 20-byte advertising payload, mirroring
/// `uw_ble_advertising_get_data_` byte-for-byte.
pub fn build_advertising_data(inputs: &AdvertisingInputs) -> [u8; ADVERTISING_PAYLOAD_LEN] {
    let mut caps = 0u8;
    if inputs.supports_wifi_24ghz {
        caps |= FLAG_WIFI_24GHZ;
    }
    if inputs.supports_wifi_50ghz {
        caps |= FLAG_WIFI_50GHZ;
    }
    if inputs.supports_ble_40 {
        caps |= FLAG_BLE_40;
    }

    let setup_flags = if inputs.is_set_up { 0 } else { FLAG_NEEDS_WEAVE_REGISTRATION };

    let mut data = [0u8; ADVERTISING_PAYLOAD_LEN];
    let mut pos = 0usize;

    data[pos] = ADVERTISING_LAYOUT_LEN;
    pos += 1;
    data[pos] = FIELD_PRIVET_DATA_TAG;
    data[pos + 1] = inputs.device_class[0];
    data[pos + 2] = inputs.device_class[1];
    data[pos + 3] = inputs.model_id[0];
    data[pos + 4] = inputs.model_id[1];
    data[pos + 5] = inputs.model_id[2];
    data[pos + 6] = setup_flags;
    data[pos + 7] = caps;
    pos += ADVERTISING_LAYOUT_LEN as usize;

    data[pos] = PUBLIC_ID_LAYOUT_LEN;
    pos += 1;
    data[pos] = FIELD_PUBLIC_ID_TAG;
    data[pos + 1..pos + 5].copy_from_slice(&inputs.device_id);

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> AdvertisingInputs {
        AdvertisingInputs {
            device_class: [0x01, 0x02],
            model_id: [0xAA, 0xBB, 0xCC],
            supports_wifi_24ghz: false,
            supports_wifi_50ghz: false,
            supports_ble_40: false,
            is_set_up: false,
            device_id: [0x11, 0x22, 0x33, 0x44],
        }
    }

    #[test]
    fn lays_out_exact_bytes() {
        let data = build_advertising_data(&base_inputs());
        assert_eq!(data[0], 8);
        assert_eq!(data[1], FIELD_PRIVET_DATA_TAG);
        assert_eq!(&data[2..4], &[0x01, 0x02]);
        assert_eq!(&data[4..7], &[0xAA, 0xBB, 0xCC]);
        assert_eq!(data[7], FLAG_NEEDS_WEAVE_REGISTRATION);
        assert_eq!(data[8], 0);
        assert_eq!(data[9], 5);
        assert_eq!(data[10], FIELD_PUBLIC_ID_TAG);
        assert_eq!(&data[11..15], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(&data[15..], &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn setup_clears_registration_flag_and_sets_capabilities() {
        let mut inputs = base_inputs();
        inputs.is_set_up = true;
        inputs.supports_wifi_24ghz = true;
        inputs.supports_ble_40 = true;
        let data = build_advertising_data(&inputs);
        assert_eq!(data[7], 0);
        assert_eq!(data[8], FLAG_WIFI_24GHZ | FLAG_BLE_40);
    }
}
