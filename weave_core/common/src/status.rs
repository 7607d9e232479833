//! The single status/error sum used across the device core.
//!
//! Mirrors `original_source/include/uweave/status.h`'s flat `UwStatus` enum,
//! grouped the way that file groups its constants. Every fallible core
//! operation returns `Result<T>` with this error type; handlers convert a
//! non-success into either an in-band error reply or a disconnect decision
//! (see `weave_dispatch::dispatch::Outcome`), never by unwinding.

use thiserror::Error;

pub type Result<T, E = Status> = std::result::Result<T, E>;

/// Status codes for uWeave-style operations.
///
/// Grouped exactly as `status.h` groups `UwStatus`: generic, auth/crypto,
/// privet (RPC envelope), value codec, storage, command, pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Status {
    // Generic
    #[error("success")]
    Success,
    #[error("not found")]
    NotFound,
    #[error("invalid input")]
    InvalidInput,
    #[error("value too long")]
    TooLong,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("command not found")]
    CommandNotFound,

    // Auth / crypto
    #[error("device crypto has no keys")]
    DeviceCryptoNoKeys,
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("insufficient role")]
    InsufficientRole,
    #[error("pairing required")]
    PairingRequired,
    #[error("verification failed")]
    VerificationFailed,
    #[error("crypto random number failure")]
    CryptoRandomNumberFailure,
    #[error("session expired")]
    SessionExpired,
    #[error("incoming encrypted message invalid")]
    CryptoIncomingMessageInvalid,
    #[error("encryption failed")]
    CryptoEncryptionFailed,
    #[error("wall clock time required")]
    TimeRequired,
    #[error("encryption required")]
    EncryptionRequired,

    // Privet (RPC envelope)
    #[error("privet resource not found")]
    PrivetNotFound,
    #[error("privet invalid parameter")]
    PrivetInvalidParam,
    #[error("privet parse error")]
    PrivetParseError,
    #[error("privet response too large")]
    PrivetResponseTooLarge,

    // Value codec
    #[error("value: invalid input")]
    ValueInvalidInput,
    #[error("value: repeated map key")]
    ValueRepeatedMapKey,
    #[error("value: type mismatch")]
    ValueTypeMismatch,
    #[error("value: unsupported type")]
    ValueTypeUnsupported,
    #[error("value: unsupported encoding type")]
    ValueEncodingTypeUnsupported,
    #[error("value: encoding out of space")]
    ValueEncodingOutOfSpace,

    // Storage
    #[error("storage error")]
    StorageError,
    #[error("storage: not found")]
    StorageNotFound,
    #[error("storage: buffer too small")]
    StorageBufferTooSmall,
    #[error("storage: file too large")]
    StorageFileTooLarge,
    #[error("storage: no available space")]
    StorageNoAvailableSpace,
    #[error("storage: alignment error")]
    StorageAlignmentError,
    #[error("storage: verify error")]
    StorageVerifyError,
    #[error("storage: no writable space")]
    StorageNoWritableSpace,

    // Command
    #[error("no available command buffers")]
    CommandNoAvailableBuffers,

    // Pairing
    #[error("pairing: pin code type unsupported")]
    PairingPinCodeTypeUnsupported,
    #[error("pairing: embedded code type unsupported")]
    PairingEmbeddedCodeTypeUnsupported,
    #[error("pairing: pin code generation failed")]
    PairingPinCodeGenerationFailed,
    #[error("pairing: embedded code provider failed")]
    PairingEmbeddedCodeProviderFailed,
    #[error("pairing: embedded code append failed")]
    PairingEmbeddedCodeAppendFailed,
    #[error("pairing: reset required")]
    PairingResetRequired,
}

impl Status {
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }

    /// Numeric wire code, stable across releases, kept under 16384 (status.h
    /// doc comment) so it can be packed into a `u16` on the wire.
    pub fn code(self) -> u16 {
        use Status::*;
        match self {
            Success => 0,
            NotFound => 1,
            InvalidInput => 2,
            TooLong => 3,
            InvalidArgument => 4,
            CommandNotFound => 5,

            DeviceCryptoNoKeys => 10,
            AuthenticationRequired => 11,
            AuthenticationFailed => 12,
            InsufficientRole => 13,
            PairingRequired => 14,
            VerificationFailed => 15,
            CryptoRandomNumberFailure => 16,
            SessionExpired => 17,
            CryptoIncomingMessageInvalid => 18,
            CryptoEncryptionFailed => 19,
            TimeRequired => 20,
            EncryptionRequired => 21,

            PrivetNotFound => 50,
            PrivetInvalidParam => 51,
            PrivetParseError => 52,
            PrivetResponseTooLarge => 53,

            ValueInvalidInput => 100,
            ValueRepeatedMapKey => 101,
            ValueTypeMismatch => 102,
            ValueTypeUnsupported => 103,
            ValueEncodingTypeUnsupported => 104,
            ValueEncodingOutOfSpace => 105,

            StorageError => 110,
            StorageNotFound => 111,
            StorageBufferTooSmall => 112,
            StorageFileTooLarge => 113,
            StorageNoAvailableSpace => 114,
            StorageAlignmentError => 115,
            StorageVerifyError => 116,
            StorageNoWritableSpace => 117,

            CommandNoAvailableBuffers => 130,

            PairingPinCodeTypeUnsupported => 140,
            PairingEmbeddedCodeTypeUnsupported => 141,
            PairingPinCodeGenerationFailed => 142,
            PairingEmbeddedCodeProviderFailed => 143,
            PairingEmbeddedCodeAppendFailed => 144,
            PairingResetRequired => 145,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_success() {
        assert!(Status::Success.is_success());
        assert!(!Status::NotFound.is_success());
    }

    #[test]
    fn codes_stay_under_16384() {
        for code in [
            Status::Success.code(),
            Status::EncryptionRequired.code(),
            Status::PairingResetRequired.code(),
        ] {
            assert!(code < 16384);
        }
    }
}
