//! Tag-chain construction: `uw_macaroon_create_from_root_key_` and
//! `uw_macaroon_extend_` from `original_source/src/macaroon.c`.
//!
//! `tag_0 = CMAC_key(caveat_0)`, then `tag_i = CMAC_{tag_{i-1}}(caveat_i)`;
//! the final tag is the macaroon's integrity value.

use weave_common::status::{Result, Status};
use weave_crypto::cmac::cmac;
use weave_crypto::providers::BlockCipher128;

use crate::caveat::Caveat;
use crate::MAC_LEN;

/// A minted or received macaroon: its final tag plus the ordered caveats
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    pub tag: [u8; MAC_LEN],
    pub caveats: Vec<Caveat>,
}

impl Macaroon {
    /// Mints a fresh macaroon under `root_key` by chaining CMAC over
    /// `caveats` in order. Mirrors `uw_macaroon_create_from_root_key_`; the
    /// `context` parameter the original threads through is unused by the
    /// tag computation itself (caveats carry their own values already) and
    /// is accepted here only at [`crate::validate::validate`] time.
    pub fn mint<C: BlockCipher128>(cipher: &C, root_key: &[u8; 16], caveats: Vec<Caveat>) -> Result<Self> {
        if caveats.is_empty() {
            return Err(Status::InvalidArgument);
        }
        let mut tag = *root_key;
        for caveat in &caveats {
            tag = cmac(cipher, &tag, &caveat.to_bytes());
        }
        Ok(Macaroon { tag, caveats })
    }

    /// Appends one caveat to an existing macaroon, re-chaining from its
    /// current tag (`uw_macaroon_extend_`). The caller does not need the
    /// root key — that is the point of a macaroon: anyone holding a valid
    /// token can narrow it further without access to the signing secret.
    pub fn extend(&self, cipher: &impl BlockCipher128, caveat: Caveat) -> Self {
        let tag = cmac(cipher, &self.tag, &caveat.to_bytes());
        let mut caveats = self.caveats.clone();
        caveats.push(caveat);
        Macaroon { tag, caveats }
    }

    /// Returns a copy of this macaroon with its last caveat removed (used
    /// by the symmetric handshake to recover the original SAT's tag from
    /// SAT′ = SAT + one authentication-challenge caveat — spec.md §4.3
    /// step 2). Panics if there are no caveats to strip, which cannot
    /// happen for a macaroon produced by [`Self::mint`] or [`Self::extend`].
    pub fn without_last_caveat<C: BlockCipher128>(&self, cipher: &C, root_key: &[u8; 16]) -> Result<Self> {
        if self.caveats.len() < 2 {
            return Err(Status::ValueInvalidInput);
        }
        let prefix = self.caveats[..self.caveats.len() - 1].to_vec();
        Self::mint(cipher, root_key, prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caveat::Scope;
    use weave_crypto::providers::host::HostBlockCipher;

    #[test]
    fn mint_is_deterministic() {
        let key = [1u8; 16];
        let caveats = vec![Caveat::Nonce(vec![1, 2, 3]), Caveat::Scope(Scope::Owner)];
        let a = Macaroon::mint(&HostBlockCipher, &key, caveats.clone()).unwrap();
        let b = Macaroon::mint(&HostBlockCipher, &key, caveats).unwrap();
        assert_eq!(a.tag, b.tag);
    }

    #[test]
    fn extend_changes_tag() {
        let key = [1u8; 16];
        let base = Macaroon::mint(&HostBlockCipher, &key, vec![Caveat::Nonce(vec![9])]).unwrap();
        let extended = base.extend(&HostBlockCipher, Caveat::Scope(Scope::Viewer));
        assert_ne!(base.tag, extended.tag);
        assert_eq!(extended.caveats.len(), 2);
    }

    #[test]
    fn without_last_caveat_recovers_original_tag() {
        let key = [1u8; 16];
        let base = Macaroon::mint(&HostBlockCipher, &key, vec![Caveat::Nonce(vec![9])]).unwrap();
        let extended = base.extend(&HostBlockCipher, Caveat::Scope(Scope::Viewer));
        let recovered = extended.without_last_caveat(&HostBlockCipher, &key).unwrap();
        assert_eq!(recovered.tag, base.tag);
        assert_eq!(recovered.caveats, base.caveats);
    }
}
