//! SPAKE2 password-authenticated key exchange over NIST P-224, used to
//! derive the `ephemeral_pairing_key` during `/pairing/start` +
//! `/pairing/confirm` (`original_source/src/crypto_spake.c`).
//!
//! The original hardcodes its M/N base points as raw field-element limbs
//! with no documented derivation. Rather than reproduce undocumented magic
//! numbers, M and N here are each derived from a fixed domain string by
//! hash-and-increment (SHA-256 of the label and a counter, reinterpreted as
//! a compressed SEC1 point, retried until a valid point is found). Anyone
//! auditing this code can recompute M/N from the label strings alone.

use elliptic_curve::group::GroupEncoding;
use elliptic_curve::ops::Reduce;
use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p224::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};

use crate::providers::{Csprng, Sha256};
use weave_common::status::{Result, Status};

/// Size in bytes of a P-224 scalar, matching `UW_SPAKE_P224_SCALAR_SIZE`.
pub const SCALAR_SIZE: usize = 28;
/// Size in bytes of an uncompressed P-224 point with no type prefix
/// (28-byte X followed by 28-byte Y), matching `POINT_SIZE`.
pub const POINT_SIZE: usize = 56;

const LABEL_M: &[u8] = b"uweave SPAKE2 M";
const LABEL_N: &[u8] = b"uweave SPAKE2 N";

fn hash_and_increment<S: Sha256>(label: &[u8]) -> AffinePoint {
    for counter in 0u32.. {
        let digest = S::digest(&[label, &counter.to_be_bytes()].concat());
        let mut candidate = [0u8; 1 + SCALAR_SIZE];
        candidate[0] = 0x02; // SEC1 compressed, even y
        candidate[1..].copy_from_slice(&digest[..SCALAR_SIZE]);
        let encoded = match EncodedPoint::from_bytes(candidate) {
            Ok(e) => e,
            Err(_) => continue,
        };
        let point = AffinePoint::from_encoded_point(&encoded);
        if point.is_some().into() {
            return point.unwrap();
        }
    }
    unreachable!("a valid point is found within a handful of counter values")
}

fn base_point_m<S: Sha256>() -> ProjectivePoint {
    hash_and_increment::<S>(LABEL_M).into()
}

fn base_point_n<S: Sha256>() -> ProjectivePoint {
    hash_and_increment::<S>(LABEL_N).into()
}

fn scalar_from_bytes_reduced(bytes: &[u8; SCALAR_SIZE]) -> Scalar {
    let mut padded = FieldBytes::default();
    padded[FieldBytes::len() - SCALAR_SIZE..].copy_from_slice(bytes);
    Scalar::reduce_bytes(&padded)
}

fn point_to_bytes(point: ProjectivePoint) -> [u8; POINT_SIZE] {
    let encoded = point.to_affine().to_encoded_point(false);
    let mut out = [0u8; POINT_SIZE];
    // `encoded` is `0x04 || X(28) || Y(28)`; the type byte is dropped since
    // both sides already know the point is uncompressed.
    out.copy_from_slice(&encoded.as_bytes()[1..]);
    out
}

fn point_from_bytes(bytes: &[u8]) -> Result<ProjectivePoint> {
    if bytes.len() != POINT_SIZE {
        return Err(Status::ValueInvalidInput);
    }
    let mut uncompressed = [0u8; 1 + POINT_SIZE];
    uncompressed[0] = 0x04;
    uncompressed[1..].copy_from_slice(bytes);
    let encoded = EncodedPoint::from_bytes(uncompressed).map_err(|_| Status::ValueInvalidInput)?;
    let affine = AffinePoint::from_encoded_point(&encoded);
    if affine.is_none().into() {
        return Err(Status::ValueInvalidInput);
    }
    Ok(affine.unwrap().into())
}

/// One party's SPAKE2 state, from password acquisition through to the
/// shared key. Mirrors `UwSpakeState`.
pub struct SpakeState {
    is_server: bool,
    pw: Scalar,
    x: Scalar,
}

impl SpakeState {
    /// `password` is hashed down to a scalar (`SHA-256(password)` truncated
    /// to [`SCALAR_SIZE`] bytes); `x` is a fresh random scalar for this
    /// exchange.
    pub fn init<S: Sha256, R: Csprng>(is_server: bool, password: &[u8], rng: &R) -> Result<Self> {
        let digest = S::digest(password);
        let mut pw_bytes = [0u8; SCALAR_SIZE];
        pw_bytes.copy_from_slice(&digest[..SCALAR_SIZE]);
        let pw = scalar_from_bytes_reduced(&pw_bytes);

        let x_bytes: [u8; SCALAR_SIZE] = rng.random_array()?;
        let x = scalar_from_bytes_reduced(&x_bytes);

        Ok(SpakeState { is_server, pw, x })
    }

    /// Computes this party's masked commitment (`Xmasked`/`Ymasked`): the
    /// server masks with `N`, the client masks with `M`.
    pub fn compute_commitment<S: Sha256>(&self) -> [u8; POINT_SIZE] {
        let mask_base = if self.is_server {
            base_point_n::<S>()
        } else {
            base_point_m::<S>()
        };
        let masked = mask_base * self.pw + ProjectivePoint::GENERATOR * self.x;
        point_to_bytes(masked)
    }

    /// Combines the remote party's masked commitment with this party's
    /// secret exponent to derive the raw shared point (`key = x*Y`),
    /// serialized as [`POINT_SIZE`] bytes. The remote mask is removed using
    /// the *opposite* base point from the one used in
    /// [`Self::compute_commitment`] for the same `is_server` value.
    pub fn finalize<S: Sha256>(&self, remote_masked: &[u8]) -> Result<[u8; POINT_SIZE]> {
        let unmask_base = if self.is_server {
            base_point_m::<S>()
        } else {
            base_point_n::<S>()
        };
        let remote_point = point_from_bytes(remote_masked)?;
        let unmasked = remote_point + (-(unmask_base * self.pw));
        let shared = unmasked * self.x;
        Ok(point_to_bytes(shared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::host::{HostCsprng, HostSha256};

    #[test]
    fn both_parties_derive_the_same_shared_point() {
        let server = SpakeState::init::<HostSha256, _>(true, b"password", &HostCsprng).unwrap();
        let client = SpakeState::init::<HostSha256, _>(false, b"password", &HostCsprng).unwrap();

        let server_commitment = server.compute_commitment::<HostSha256>();
        let client_commitment = client.compute_commitment::<HostSha256>();

        let server_key = server.finalize::<HostSha256>(&client_commitment).unwrap();
        let client_key = client.finalize::<HostSha256>(&server_commitment).unwrap();

        assert_eq!(server_key, client_key);
    }

    #[test]
    fn mismatched_passwords_do_not_agree() {
        let server = SpakeState::init::<HostSha256, _>(true, b"password", &HostCsprng).unwrap();
        let client = SpakeState::init::<HostSha256, _>(false, b"wrong-password", &HostCsprng).unwrap();

        let server_commitment = server.compute_commitment::<HostSha256>();
        let client_commitment = client.compute_commitment::<HostSha256>();

        let server_key = server.finalize::<HostSha256>(&client_commitment).unwrap();
        let client_key = client.finalize::<HostSha256>(&server_commitment).unwrap();

        assert_ne!(server_key, client_key);
    }
}
