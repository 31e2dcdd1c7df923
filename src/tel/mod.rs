//! The Transaction Event Log engine (§4.4): registry inception (coupled
//! with its KEL anchor), credential issuance, and revocation.

pub mod error;

pub use error::Error;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::crypto::{Crypto, KeyManager};
use crate::codec::prefix::{DigestAlgorithm, IdentifierPrefix};
use crate::codec::{Family, VersionString};
use crate::event::seal::{ParentSeal, Seal};
use crate::event::tel::{IssData, RevData, TelEvent, TelEventData, VcpData, VcpEdges};
use crate::event::{Acdc, Edge, EventKind};
use crate::kel::KelEngine;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Issued,
    Revoked,
}

pub struct TelEngine<'a> {
    store: &'a Store<'a>,
    crypto: &'a dyn Crypto,
    keys: &'a dyn KeyManager,
}

impl<'a> TelEngine<'a> {
    pub fn new(store: &'a Store<'a>, crypto: &'a dyn Crypto, keys: &'a dyn KeyManager) -> Self {
        Self { store, crypto, keys }
    }

    /// Sizes and self-addresses `value` (placeholdering `fields` together,
    /// §4.1 order: size the frame first, then hash, then bind — the same
    /// discipline `kel::sign_and_ingest` follows), signs it, and stores it.
    fn sign_and_store(&self, signer_aid: &str, value: Value, fields: &[&str], family: Family) -> Result<String, Error> {
        let (sized, _said) = crate::codec::encode_saidified(&value, fields, family, DigestAlgorithm::Blake3_256)?;
        let identifier: IdentifierPrefix = signer_aid
            .parse()
            .map_err(|_| Error::Event(crate::event::EventError::BadField(format!("bad AID {signer_aid:?}"))))?;
        let signer = self.keys.signer(&identifier)?;
        let signature = signer
            .sign(&sized)
            .map_err(|_| Error::Event(crate::event::EventError::BadField("signing failed".into())))?;
        let signed = crate::codec::sign_event(&sized, 0, &signature)?;
        Ok(self.store.put_event(&signed)?)
    }

    /// Creates a registry: builds and stores its `vcp`, then anchors it in
    /// the issuer's KEL with an `ixn` seal (§4.4). If the anchor write
    /// fails, the registry is left orphaned on purpose (§5) — the TEL
    /// already committed, and `reanchor` recovers it on next use.
    pub fn create_registry(
        &self,
        issuer_aid: &str,
        backers: Vec<String>,
        parent_registry_id: Option<String>,
    ) -> Result<String, Error> {
        if let Some(parent) = &parent_registry_id {
            self.load_vcp(parent)?;
        }

        let vcp = VcpData {
            i: String::new(),
            ii: issuer_aid.to_string(),
            s: "0".to_string(),
            b: backers,
            e: parent_registry_id.map(|n| VcpEdges { parent: Some(ParentSeal { n }) }),
        };
        let event = TelEvent {
            v: VersionString::empty(Family::Keri),
            d: String::new(),
            data: TelEventData::Vcp(vcp),
        };
        let registry_id = self.sign_and_store(issuer_aid, event.to_value()?, &["i", "d"], Family::Keri)?;

        let kel = KelEngine::new(self.store, self.crypto, self.keys);
        let seal = Seal::new(registry_id.clone(), "0", registry_id.clone());
        if let Err(e) = kel.interact(issuer_aid, vec![seal]) {
            log::warn!("registry {registry_id} created but KEL anchor failed: {e}; call reanchor() before use");
        }
        Ok(registry_id)
    }

    /// Whether `registry_id`'s `vcp` has a matching `ixn` seal in its
    /// issuer's KEL (§4.4, invariant 5).
    pub fn is_anchored(&self, registry_id: &str) -> Result<bool, Error> {
        let vcp = self.load_vcp(registry_id)?;
        let kel = self.store.list_kel(&vcp.ii)?;
        Ok(kel.iter().any(|event| {
            event["t"] == "ixn"
                && event["a"]
                    .as_array()
                    .map(|seals| {
                        seals.iter().any(|s| s["i"] == registry_id && s["d"] == registry_id)
                    })
                    .unwrap_or(false)
        }))
    }

    /// Emits the missing anchor seal for an orphaned registry (§5).
    pub fn reanchor(&self, registry_id: &str) -> Result<(), Error> {
        if self.is_anchored(registry_id)? {
            return Ok(());
        }
        let vcp = self.load_vcp(registry_id)?;
        let kel = KelEngine::new(self.store, self.crypto, self.keys);
        let seal = Seal::new(registry_id.to_string(), "0", registry_id.to_string());
        kel.interact(&vcp.ii, vec![seal])?;
        Ok(())
    }

    fn load_vcp(&self, registry_id: &str) -> Result<VcpData, Error> {
        let record = self.store.get_event(registry_id)?;
        match TelEvent::from_value(&record.json)?.data {
            TelEventData::Vcp(d) => Ok(d),
            _ => Err(Error::Event(crate::event::EventError::BadField(format!(
                "{registry_id} is not a registry"
            )))),
        }
    }

    fn require_anchored(&self, registry_id: &str) -> Result<VcpData, Error> {
        let vcp = self.load_vcp(registry_id)?;
        if !self.is_anchored(registry_id)? {
            return Err(Error::Unanchored(registry_id.to_string()));
        }
        Ok(vcp)
    }

    /// Issues a credential (§4.4): stores the ACDC object itself, then an
    /// `iss` event anchoring it into the registry. Edge targets must
    /// already exist; an edge with a required schema must match the
    /// target's.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        &self,
        registry_id: &str,
        schema_said: &str,
        subject: Value,
        edges: Option<BTreeMap<String, Edge>>,
        issued_at: &str,
    ) -> Result<String, Error> {
        let vcp = self.require_anchored(registry_id)?;

        if let Some(edges) = &edges {
            for (label, edge) in edges {
                let target = self
                    .store
                    .get_acdc(&edge.n)
                    .map_err(|_| Error::EdgeTargetMissing(edge.n.clone()))?;
                if let Some(expected) = &edge.s {
                    if &target.s != expected {
                        return Err(Error::EdgeSchemaMismatch {
                            label: label.clone(),
                            expected: expected.clone(),
                            actual: target.s.clone(),
                        });
                    }
                }
            }
        }

        let acdc = Acdc {
            v: VersionString::empty(Family::Acdc),
            d: String::new(),
            i: vcp.ii.clone(),
            ri: registry_id.to_string(),
            s: schema_said.to_string(),
            a: subject,
            e: edges,
        };
        let credential_id = self.sign_and_store(&vcp.ii, acdc.to_value()?, &["d"], Family::Acdc)?;

        let iss = IssData {
            i: credential_id.clone(),
            s: "0".to_string(),
            ri: registry_id.to_string(),
            dt: issued_at.to_string(),
        };
        let iss_event = TelEvent {
            v: VersionString::empty(Family::Keri),
            d: String::new(),
            data: TelEventData::Iss(iss),
        };
        self.sign_and_store(&vcp.ii, iss_event.to_value()?, &["d"], Family::Keri)?;

        Ok(credential_id)
    }

    /// Revokes a credential (§4.4). A second revocation is rejected.
    pub fn revoke(&self, registry_id: &str, credential_id: &str, revoked_at: &str) -> Result<(), Error> {
        let vcp = self.require_anchored(registry_id)?;

        let events = self.store.list_tel(registry_id)?;
        let mut prior_iss_said = None;
        for event in &events {
            match EventKind::classify(event)? {
                EventKind::Iss if event["i"] == credential_id => {
                    prior_iss_said = Some(
                        event["d"]
                            .as_str()
                            .expect("stored events always carry a `d` SAID")
                            .to_string(),
                    );
                }
                EventKind::Rev if event["i"] == credential_id => {
                    return Err(Error::AlreadyRevoked(credential_id.to_string()));
                }
                _ => {}
            }
        }
        let prior_iss_said = prior_iss_said.ok_or_else(|| Error::NotIssued(credential_id.to_string()))?;

        let rev = RevData {
            i: credential_id.to_string(),
            s: "1".to_string(),
            p: prior_iss_said,
            ri: registry_id.to_string(),
            dt: revoked_at.to_string(),
        };
        let rev_event = TelEvent {
            v: VersionString::empty(Family::Keri),
            d: String::new(),
            data: TelEventData::Rev(rev),
        };
        self.sign_and_store(&vcp.ii, rev_event.to_value()?, &["d"], Family::Keri)?;
        Ok(())
    }

    /// The most recent TEL event for `credential_id` determines status
    /// (§3 invariant 6).
    pub fn status(&self, registry_id: &str, credential_id: &str) -> Result<CredentialStatus, Error> {
        let events = self.store.list_tel(registry_id)?;
        let mut status = None;
        for event in &events {
            match EventKind::classify(event)? {
                EventKind::Iss if event["i"] == credential_id => status = Some(CredentialStatus::Issued),
                EventKind::Rev if event["i"] == credential_id => status = Some(CredentialStatus::Revoked),
                _ => {}
            }
        }
        status.ok_or_else(|| Error::NotIssued(credential_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::crypto::{Ed25519Blake3, KeyRing};
    use crate::capability::kv::MemoryKv;
    use crate::kel::KelEngine;
    use serde_json::json;

    #[test]
    fn create_registry_anchors_and_issue_revoke_roundtrips() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let crypto = Ed25519Blake3::default();
        let keys = KeyRing::new(&crypto);
        let kel = KelEngine::new(&store, &crypto, &keys);
        let tel = TelEngine::new(&store, &crypto, &keys);

        let alice = kel.incept(&[1u8; 32]).unwrap();
        let registry_id = tel.create_registry(&alice, vec![], None).unwrap();
        assert!(tel.is_anchored(&registry_id).unwrap());

        let schema = crate::codec::saidify(&json!({"$id": "", "type": "object"}), "$id", DigestAlgorithm::Blake3_256).unwrap();
        let schema_said = schema["$id"].as_str().unwrap().to_string();

        let credential_id = tel
            .issue(&registry_id, &schema_said, json!({"i": alice, "name": "BS"}), None, "2026-01-01T00:00:00Z")
            .unwrap();
        assert_eq!(tel.status(&registry_id, &credential_id).unwrap(), CredentialStatus::Issued);

        tel.revoke(&registry_id, &credential_id, "2026-01-02T00:00:00Z").unwrap();
        assert_eq!(tel.status(&registry_id, &credential_id).unwrap(), CredentialStatus::Revoked);

        assert!(matches!(
            tel.revoke(&registry_id, &credential_id, "2026-01-03T00:00:00Z"),
            Err(Error::AlreadyRevoked(_))
        ));

        let telelog = store.list_tel(&registry_id).unwrap();
        assert_eq!(telelog.len(), 3);
    }

    #[test]
    fn issue_with_missing_edge_target_fails() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let crypto = Ed25519Blake3::default();
        let keys = KeyRing::new(&crypto);
        let kel = KelEngine::new(&store, &crypto, &keys);
        let tel = TelEngine::new(&store, &crypto, &keys);

        let alice = kel.incept(&[4u8; 32]).unwrap();
        let registry_id = tel.create_registry(&alice, vec![], None).unwrap();
        let schema = crate::codec::saidify(&json!({"$id": "", "type": "object"}), "$id", DigestAlgorithm::Blake3_256).unwrap();
        let schema_said = schema["$id"].as_str().unwrap().to_string();

        let mut edges = BTreeMap::new();
        edges.insert("parent".to_string(), Edge { n: "Emissing".to_string(), s: None });

        let err = tel.issue(&registry_id, &schema_said, json!({"i": alice}), Some(edges), "2026-01-01T00:00:00Z");
        assert!(matches!(err, Err(Error::EdgeTargetMissing(_))));
    }
}
