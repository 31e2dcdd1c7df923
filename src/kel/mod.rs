//! The Key Event Log engine (§4.3): inception, rotation, and interaction
//! for one AID at a time, plus ingest-time validation of an external KEL.
//!
//! The "state machine" (§4.3: `uninitialized -> established(sn, keys,
//! next_digests)`) is never held in memory here — it is replayed from the
//! store on every call, the same query-time discipline the indexer uses.
//! A single builder instance only ever touches one AID per call, so the
//! extra replay is cheap and there is no cache-invalidation surface (§9).

pub mod error;

pub use error::Error;

use std::collections::HashSet;

use serde_json::Value;

use crate::capability::crypto::{Crypto, KeyManager, Verfer};
use crate::codec::prefix::{BasicPrefix, DigestAlgorithm, IdentifierPrefix, Prefix, SelfAddressingPrefix};
use crate::event::kel::{IcpData, IxnData, KelEvent, KelEventData, RotData};
use crate::event::{EventKind, Seal};
use crate::store::Store;

/// The KEL's current, replayed state for one AID.
#[derive(Debug, Clone)]
pub struct KelState {
    pub sn: u64,
    pub d: String,
    pub k: Vec<String>,
    pub kt: String,
    pub n: Vec<String>,
    pub nt: String,
}

fn parse_threshold(kt: &str, key_count: usize) -> Result<usize, Error> {
    let t: usize = kt
        .parse()
        .map_err(|_| Error::Event(crate::event::EventError::BadField(format!("bad `kt` {kt:?}"))))?;
    if t == 0 || t > key_count.max(1) {
        return Err(Error::ThresholdUnmet { required: t, got: 0 });
    }
    Ok(t)
}

fn key_digest(crypto: &dyn Crypto, key_text: &str) -> Result<String, Error> {
    let basic: BasicPrefix = key_text
        .parse()
        .map_err(|_| Error::Event(crate::event::EventError::BadField(format!("bad key prefix {key_text:?}"))))?;
    let pubkey = basic.derivative();
    let digest = crypto.digest(&pubkey, DigestAlgorithm::Blake3_256).map_err(|_| Error::SignatureInvalid)?;
    Ok(SelfAddressingPrefix::new(DigestAlgorithm::Blake3_256, digest).to_text())
}

/// Derives the "next" seed committed to by pre-rotation (§3, §4.3), from
/// the current seed via the `Crypto` digest capability. A real deployment
/// generates and stores the next seed out of band; this crate derives it
/// deterministically so the library alone can both commit to and later
/// reveal the same key without an external secret-management surface.
fn derive_next_seed(crypto: &dyn Crypto, seed: &[u8; 32]) -> Result<[u8; 32], Error> {
    let digest = crypto.digest(seed, DigestAlgorithm::Blake3_256).map_err(|_| Error::SignatureInvalid)?;
    let mut next = [0u8; 32];
    if digest.len() != 32 {
        return Err(Error::SignatureInvalid);
    }
    next.copy_from_slice(&digest);
    Ok(next)
}

pub struct KelEngine<'a> {
    store: &'a Store<'a>,
    crypto: &'a dyn Crypto,
    keys: &'a dyn KeyManager,
}

impl<'a> KelEngine<'a> {
    pub fn new(store: &'a Store<'a>, crypto: &'a dyn Crypto, keys: &'a dyn KeyManager) -> Self {
        Self { store, crypto, keys }
    }

    /// Replays `aid`'s KEL and returns its current established state, if
    /// any event has been stored.
    pub fn current_state(&self, aid: &str) -> Result<Option<KelState>, Error> {
        let events = self.store.list_kel(aid)?;
        let Some(last) = events.last() else { return Ok(None) };
        let event = KelEvent::from_value(last)?;
        let (k, kt, n, nt) = match &event.data {
            KelEventData::Icp(d) => (d.k.clone(), d.kt.clone(), d.n.clone(), d.nt.clone()),
            KelEventData::Rot(d) => (d.k.clone(), d.kt.clone(), d.n.clone(), d.nt.clone()),
            KelEventData::Ixn(_) => {
                // ixn carries no key change; walk back for the last icp/rot.
                let established = events
                    .iter()
                    .rev()
                    .find_map(|v| {
                        let e = KelEvent::from_value(v).ok()?;
                        match e.data {
                            KelEventData::Icp(d) => Some((d.k, d.kt, d.n, d.nt)),
                            KelEventData::Rot(d) => Some((d.k, d.kt, d.n, d.nt)),
                            KelEventData::Ixn(_) => None,
                        }
                    })
                    .ok_or_else(|| Error::NotIncepted(aid.to_string()))?;
                established
            }
        };
        Ok(Some(KelState {
            sn: event.data.sequence().parse().unwrap_or(0),
            d: event.d,
            k,
            kt,
            n,
            nt,
        }))
    }

    fn sign_and_ingest(&self, aid_text: &str, value: Value) -> Result<String, Error> {
        let (sized, _said) =
            crate::codec::encode_saidified(&value, &["d"], crate::codec::Family::Keri, DigestAlgorithm::Blake3_256)?;

        let aid = aid_text
            .parse::<IdentifierPrefix>()
            .map_err(|_| Error::Event(crate::event::EventError::BadField(format!("bad AID {aid_text:?}"))))?;
        let signer = self.keys.signer(&aid)?;
        let signature = signer.sign(&sized).map_err(|_| Error::SignatureInvalid)?;
        let signed = crate::codec::sign_event(&sized, 0, &signature)?;
        self.ingest(&signed)
    }

    /// `incept(keys, next_digests)` (§4.3): derives a verifier-keyed AID
    /// from `seed`, commits to the deterministic next key, and emits the
    /// signed `icp` event.
    pub fn incept(&self, seed: &[u8; 32]) -> Result<String, Error> {
        let (verfer, _key) = self.crypto.keypair_from_seed(seed).map_err(|_| Error::SignatureInvalid)?;
        let aid_text = verfer.prefix.to_text();

        if self.current_state(&aid_text)?.is_some() {
            return Err(Error::AlreadyIncepted(aid_text));
        }

        let next_seed = derive_next_seed(self.crypto, seed)?;
        let (next_verfer, _) = self.crypto.keypair_from_seed(&next_seed).map_err(|_| Error::SignatureInvalid)?;
        let n0 = key_digest(self.crypto, &next_verfer.prefix.to_text())?;

        let aid = IdentifierPrefix::Basic(verfer.prefix.clone());
        self.keys.unlock(&aid, seed)?;

        let event = KelEvent {
            v: crate::codec::VersionString::empty(crate::codec::Family::Keri),
            d: String::new(),
            data: KelEventData::Icp(IcpData {
                i: aid_text.clone(),
                s: "0".to_string(),
                kt: "1".to_string(),
                k: vec![verfer.prefix.to_text()],
                nt: "1".to_string(),
                n: vec![n0],
            }),
        };
        self.sign_and_ingest(&aid_text, event.to_value()?)?;
        Ok(aid_text)
    }

    /// `rotate(new_keys, new_next_digests)` (§4.3): requires the revealed
    /// key to match a prior next-key digest, then establishes it (and a
    /// fresh next-key commitment) as current.
    pub fn rotate(&self, aid: &str, new_seed: &[u8; 32]) -> Result<(), Error> {
        let prior = self
            .current_state(aid)?
            .ok_or_else(|| Error::NotIncepted(aid.to_string()))?;

        let (new_verfer, _key) = self.crypto.keypair_from_seed(new_seed).map_err(|_| Error::SignatureInvalid)?;
        let new_key_text = new_verfer.prefix.to_text();
        let revealed_digest = key_digest(self.crypto, &new_key_text)?;
        if !prior.n.iter().any(|n| n == &revealed_digest) {
            return Err(Error::PreRotationMismatch);
        }

        let next_seed = derive_next_seed(self.crypto, new_seed)?;
        let (next_verfer, _) = self.crypto.keypair_from_seed(&next_seed).map_err(|_| Error::SignatureInvalid)?;
        let n0 = key_digest(self.crypto, &next_verfer.prefix.to_text())?;

        let identifier: IdentifierPrefix = aid
            .parse()
            .map_err(|_| Error::Event(crate::event::EventError::BadField(format!("bad AID {aid:?}"))))?;
        self.keys.unlock(&identifier, new_seed)?;

        let event = KelEvent {
            v: crate::codec::VersionString::empty(crate::codec::Family::Keri),
            d: String::new(),
            data: KelEventData::Rot(RotData {
                i: aid.to_string(),
                s: (prior.sn + 1).to_string(),
                p: prior.d,
                kt: "1".to_string(),
                k: vec![new_key_text],
                nt: "1".to_string(),
                n: vec![n0],
                a: vec![],
            }),
        };
        self.sign_and_ingest(aid, event.to_value()?)?;
        Ok(())
    }

    /// `interact(seals)` (§4.3): anchors `seals` without changing keys.
    /// The only mechanism by which a KEL commits to TEL content.
    pub fn interact(&self, aid: &str, seals: Vec<Seal>) -> Result<(), Error> {
        let prior = self
            .current_state(aid)?
            .ok_or_else(|| Error::NotIncepted(aid.to_string()))?;

        let event = KelEvent {
            v: crate::codec::VersionString::empty(crate::codec::Family::Keri),
            d: String::new(),
            data: KelEventData::Ixn(IxnData {
                i: aid.to_string(),
                s: (prior.sn + 1).to_string(),
                p: prior.d,
                a: seals,
            }),
        };
        self.sign_and_ingest(aid, event.to_value()?)?;
        Ok(())
    }

    /// Validates `bytes` against the invariants in §3/§4.3 (sequence,
    /// prior-SAID linkage, pre-rotation, signature threshold) and stores
    /// it. Used both by the convenience methods above and for ingesting
    /// an externally produced KEL.
    pub fn ingest(&self, bytes: &[u8]) -> Result<String, Error> {
        let decoded = crate::codec::frame::decode(bytes)?;
        if !matches!(
            EventKind::classify(&decoded.json)?,
            EventKind::Icp | EventKind::Rot | EventKind::Ixn
        ) {
            return Err(Error::Event(crate::event::EventError::UnknownType(
                "not a KEL event".to_string(),
            )));
        }
        let event = KelEvent::from_value(&decoded.json)?;
        let aid = event.data.identifier().to_string();
        let sn: u64 = event
            .data
            .sequence()
            .parse()
            .map_err(|_| Error::Event(crate::event::EventError::BadField("bad `s`".to_string())))?;

        let prior = self.current_state(&aid)?;
        let (signing_keys, threshold) = match (&event.data, &prior) {
            (KelEventData::Icp(d), None) => {
                if sn != 0 {
                    return Err(Error::SequenceGap { expected: 0, actual: sn });
                }
                (d.k.clone(), d.kt.clone())
            }
            (KelEventData::Icp(_), Some(_)) => return Err(Error::AlreadyIncepted(aid)),
            (KelEventData::Rot(d), Some(prior)) => {
                if sn != prior.sn + 1 {
                    return Err(Error::SequenceGap { expected: prior.sn + 1, actual: sn });
                }
                if d.p != prior.d {
                    return Err(Error::PriorMismatch { expected: prior.d.clone(), actual: d.p.clone() });
                }
                for k in &d.k {
                    let digest = key_digest(self.crypto, k)?;
                    if !prior.n.iter().any(|n| n == &digest) {
                        return Err(Error::PreRotationMismatch);
                    }
                }
                (d.k.clone(), d.kt.clone())
            }
            (KelEventData::Ixn(d), Some(prior)) => {
                if sn != prior.sn + 1 {
                    return Err(Error::SequenceGap { expected: prior.sn + 1, actual: sn });
                }
                if d.p != prior.d {
                    return Err(Error::PriorMismatch { expected: prior.d.clone(), actual: d.p.clone() });
                }
                (prior.k.clone(), prior.kt.clone())
            }
            (KelEventData::Rot(_), None) | (KelEventData::Ixn(_), None) => {
                return Err(Error::NotIncepted(aid))
            }
        };

        self.verify_threshold(&signing_keys, &threshold, &decoded)?;
        Ok(self.store.put_event(bytes)?)
    }

    fn verify_threshold(
        &self,
        keys: &[String],
        kt: &str,
        decoded: &crate::codec::frame::DecodedFrame,
    ) -> Result<(), Error> {
        let required = parse_threshold(kt, keys.len())?;
        let body = crate::codec::encode(&decoded.json, decoded.version.family)?;
        let sigs = crate::codec::parse_indexed_signatures(&decoded.attachments)?;

        let mut seen = HashSet::new();
        let mut valid = 0usize;
        for (index, sig) in sigs {
            if !seen.insert(index) {
                continue;
            }
            let Some(key_text) = keys.get(index as usize) else { continue };
            let Ok(basic) = key_text.parse::<BasicPrefix>() else { continue };
            let verfer = Verfer { prefix: basic };
            let raw = sig.derivative();
            if self.crypto.verify(&verfer, &body, &raw).unwrap_or(false) {
                valid += 1;
            }
        }
        if valid < required {
            return Err(Error::ThresholdUnmet { required, got: valid });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::crypto::{Ed25519Blake3, KeyRing};
    use crate::capability::kv::MemoryKv;

    #[test]
    fn incept_then_rotate_satisfies_pre_rotation() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let crypto = Ed25519Blake3::default();
        let keys = KeyRing::new(&crypto);
        let engine = KelEngine::new(&store, &crypto, &keys);

        let aid = engine.incept(&[2u8; 32]).unwrap();
        assert!(aid.starts_with('D'));
        let kel = store.list_kel(&aid).unwrap();
        assert_eq!(kel.len(), 1);
        assert_eq!(kel[0]["t"], "icp");

        let next_seed = derive_next_seed(&crypto, &[2u8; 32]).unwrap();
        engine.rotate(&aid, &next_seed).unwrap();

        let kel = store.list_kel(&aid).unwrap();
        assert_eq!(kel.len(), 2);
        assert_eq!(kel[1]["t"], "rot");

        let (new_verfer, _) = crypto.keypair_from_seed(&next_seed).unwrap();
        assert_eq!(kel[1]["k"][0], new_verfer.prefix.to_text());

        let committed_digest = key_digest(&crypto, &new_verfer.prefix.to_text()).unwrap();
        assert_eq!(kel[0]["n"][0], committed_digest);
    }

    #[test]
    fn rotation_with_wrong_key_is_rejected() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let crypto = Ed25519Blake3::default();
        let keys = KeyRing::new(&crypto);
        let engine = KelEngine::new(&store, &crypto, &keys);

        let aid = engine.incept(&[5u8; 32]).unwrap();
        let err = engine.rotate(&aid, &[9u8; 32]);
        assert!(matches!(err, Err(Error::PreRotationMismatch)));
    }

    #[test]
    fn interact_anchors_seal_without_changing_keys() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let crypto = Ed25519Blake3::default();
        let keys = KeyRing::new(&crypto);
        let engine = KelEngine::new(&store, &crypto, &keys);

        let aid = engine.incept(&[7u8; 32]).unwrap();
        engine
            .interact(&aid, vec![Seal::new("Eregistry", "0", "Evcp")])
            .unwrap();

        let kel = store.list_kel(&aid).unwrap();
        assert_eq!(kel.len(), 2);
        assert_eq!(kel[1]["t"], "ixn");
        assert_eq!(kel[1]["a"][0]["i"], "Eregistry");
    }
}
