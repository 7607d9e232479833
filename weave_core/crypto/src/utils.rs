//! Small constant-time helpers shared by the modes above, mirroring
//! `original_source/src/crypto_utils.c`'s `uw_crypto_utils_equal_`.

use subtle::ConstantTimeEq;

/// Constant-time byte comparison. Returns `false` (rather than panicking)
/// if the slices differ in length, since a length mismatch is itself
/// public information in every caller here.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
