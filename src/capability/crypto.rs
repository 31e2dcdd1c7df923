//! The `Crypto` capability (§6) and the `KeyManager` that sits on top of it
//! (§5): `unlock`/`lock`/`is_unlocked`/`signer` per AID, so the engines can
//! require an unlocked signer for anything that signs and fail with
//! `Locked` rather than ever producing an unsigned event.

use std::collections::HashMap;
use std::sync::RwLock;

use ed25519_dalek::{Keypair, SecretKey, Signer as DalekSigner, Verifier as DalekVerifier};
use thiserror::Error;
use zeroize::Zeroize;

use crate::codec::prefix::{BasicPrefix, DigestAlgorithm, IdentifierPrefix, SelfSigningPrefix};

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("seed must be 32 bytes, got {0}")]
    BadSeedLength(usize),
    #[error("malformed key material")]
    BadKey,
    #[error("unsupported digest algorithm")]
    UnsupportedDigest,
}

/// A verification key together with the suite that produced it (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verfer {
    pub prefix: BasicPrefix,
}

/// A private signing key. Zeroized on drop, following the teacher's own
/// `PrivateKey` discipline.
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl Drop for SigningKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Capability consumed from an external collaborator (§6). Signature
/// primitives and hash primitives live behind this fixed contract; the
/// core never reaches past it for key material.
pub trait Crypto: Send + Sync {
    fn keypair_from_seed(&self, seed: &[u8; 32]) -> Result<(Verfer, SigningKey), CryptoError>;
    fn sign(&self, signer: &SigningKey, bytes: &[u8]) -> Result<Vec<u8>, CryptoError>;
    fn verify(&self, verfer: &Verfer, bytes: &[u8], sig: &[u8]) -> Result<bool, CryptoError>;
    fn digest(&self, bytes: &[u8], alg: DigestAlgorithm) -> Result<Vec<u8>, CryptoError>;
}

/// Default suite named in §6: Ed25519 signatures, Blake3-256 digests.
#[derive(Default)]
pub struct Ed25519Blake3;

impl Crypto for Ed25519Blake3 {
    fn keypair_from_seed(&self, seed: &[u8; 32]) -> Result<(Verfer, SigningKey), CryptoError> {
        let secret = SecretKey::from_bytes(seed).map_err(|_| CryptoError::BadKey)?;
        let public = ed25519_dalek::PublicKey::from(&secret);
        let verfer = Verfer {
            prefix: BasicPrefix::Ed25519(public.to_bytes().to_vec()),
        };
        let signer = SigningKey {
            bytes: secret.to_bytes().to_vec(),
        };
        Ok((verfer, signer))
    }

    fn sign(&self, signer: &SigningKey, bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let secret = SecretKey::from_bytes(&signer.bytes).map_err(|_| CryptoError::BadKey)?;
        let public = ed25519_dalek::PublicKey::from(&secret);
        let keypair = Keypair { secret, public };
        Ok(keypair.sign(bytes).to_bytes().to_vec())
    }

    fn verify(&self, verfer: &Verfer, bytes: &[u8], sig: &[u8]) -> Result<bool, CryptoError> {
        let BasicPrefix::Ed25519(ref key_bytes) = verfer.prefix else {
            return Err(CryptoError::BadKey);
        };
        let public =
            ed25519_dalek::PublicKey::from_bytes(key_bytes).map_err(|_| CryptoError::BadKey)?;
        if sig.len() != 64 {
            return Ok(false);
        }
        let signature = ed25519_dalek::Signature::from(*arrayref::array_ref![sig, 0, 64]);
        Ok(public.verify(bytes, &signature).is_ok())
    }

    fn digest(&self, bytes: &[u8], alg: DigestAlgorithm) -> Result<Vec<u8>, CryptoError> {
        Ok(alg.digest(bytes))
    }
}

/// `signer(...)` exposes a signable handle plus the matching SAID
/// construction helpers; the signature suite tag lets callers build an
/// [`crate::codec::prefix::AttachedSignaturePrefix`] without re-deriving it.
pub struct ActiveSigner<'a> {
    crypto: &'a dyn Crypto,
    key: SigningKey,
    pub verfer: Verfer,
}

impl<'a> ActiveSigner<'a> {
    pub fn sign(&self, bytes: &[u8]) -> Result<SelfSigningPrefix, CryptoError> {
        let sig = self.crypto.sign(&self.key, bytes)?;
        Ok(SelfSigningPrefix::Ed25519Sha512(sig))
    }
}

/// Unlock state for one AID's signing key (§5).
struct Unlocked {
    key: SigningKey,
    verfer: Verfer,
}

#[derive(Error, Debug)]
pub enum KeyManagerError {
    #[error("signing key for {0} is locked")]
    Locked(IdentifierPrefix),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// `unlock(AID, mnemonic)`, `lock(AID)`, `is_unlocked(AID)`, `signer(AID)`
/// (§5). Any operation that signs MUST go through a `KeyManager` and MUST
/// fail with `Locked` if the key isn't unlocked — never silently emitting
/// an unsigned event.
pub trait KeyManager: Send + Sync {
    fn unlock(&self, aid: &IdentifierPrefix, seed: &[u8; 32]) -> Result<Verfer, KeyManagerError>;
    fn lock(&self, aid: &IdentifierPrefix);
    fn is_unlocked(&self, aid: &IdentifierPrefix) -> bool;
    fn signer<'a>(&'a self, aid: &IdentifierPrefix) -> Result<ActiveSigner<'a>, KeyManagerError>;
}

/// Process-local, in-memory `KeyManager`. Per §9's note on global mutable
/// state ("prefer passing an explicit builder value... avoid a
/// singleton"), a `KeyRing` is an explicit value owned by the builder, not
/// a static — there is exactly one per `Builder` instance.
pub struct KeyRing<'c> {
    crypto: &'c dyn Crypto,
    unlocked: RwLock<HashMap<IdentifierPrefix, Unlocked>>,
}

impl<'c> KeyRing<'c> {
    pub fn new(crypto: &'c dyn Crypto) -> Self {
        Self {
            crypto,
            unlocked: RwLock::new(HashMap::new()),
        }
    }
}

impl<'c> KeyManager for KeyRing<'c> {
    fn unlock(&self, aid: &IdentifierPrefix, seed: &[u8; 32]) -> Result<Verfer, KeyManagerError> {
        let (verfer, key) = self.crypto.keypair_from_seed(seed)?;
        let mut guard = self.unlocked.write().expect("keyring lock poisoned");
        guard.insert(
            aid.clone(),
            Unlocked {
                key,
                verfer: verfer.clone(),
            },
        );
        Ok(verfer)
    }

    fn lock(&self, aid: &IdentifierPrefix) {
        let mut guard = self.unlocked.write().expect("keyring lock poisoned");
        guard.remove(aid);
    }

    fn is_unlocked(&self, aid: &IdentifierPrefix) -> bool {
        let guard = self.unlocked.read().expect("keyring lock poisoned");
        guard.contains_key(aid)
    }

    fn signer<'a>(&'a self, aid: &IdentifierPrefix) -> Result<ActiveSigner<'a>, KeyManagerError> {
        let guard = self.unlocked.read().expect("keyring lock poisoned");
        let unlocked = guard
            .get(aid)
            .ok_or_else(|| KeyManagerError::Locked(aid.clone()))?;
        Ok(ActiveSigner {
            crypto: self.crypto,
            key: SigningKey {
                bytes: unlocked.key.bytes.clone(),
            },
            verfer: unlocked.verfer.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyring_requires_unlock() {
        use crate::codec::prefix::SelfAddressingPrefix;

        let crypto = Ed25519Blake3::default();
        let ring = KeyRing::new(&crypto);
        let aid = IdentifierPrefix::SelfAddressing(SelfAddressingPrefix::derive(
            DigestAlgorithm::Blake3_256,
            b"seed-aid",
        ));

        assert!(!ring.is_unlocked(&aid));
        assert!(matches!(
            ring.signer(&aid),
            Err(KeyManagerError::Locked(_))
        ));

        ring.unlock(&aid, &[7u8; 32]).unwrap();
        assert!(ring.is_unlocked(&aid));
        let signer = ring.signer(&aid).unwrap();
        let sig = signer.sign(b"hello").unwrap();
        assert!(matches!(sig, SelfSigningPrefix::Ed25519Sha512(_)));

        ring.lock(&aid);
        assert!(!ring.is_unlocked(&aid));
    }

    #[test]
    fn sign_verify_roundtrip() {
        let crypto = Ed25519Blake3::default();
        let (verfer, key) = crypto.keypair_from_seed(&[1u8; 32]).unwrap();
        let sig = crypto.sign(&key, b"payload").unwrap();
        assert!(crypto.verify(&verfer, b"payload", &sig).unwrap());
        assert!(!crypto.verify(&verfer, b"tampered", &sig).unwrap());
    }
}
