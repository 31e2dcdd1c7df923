//! Content-addressed event storage over a [`Kv`] capability (§4.2): one
//! immutable, write-once table for raw framed events, denormalized
//! tables for fast ACDC/schema lookup, and the secondary indices that let
//! [`list_kel`](Store::list_kel)/[`list_tel`](Store::list_tel) replay a
//! log in `s` order without scanning `events/` itself.

pub mod error;

pub use error::Error;

use serde_json::Value;

use crate::capability::kv::Kv;
use crate::codec;
use crate::event::schema::uses_legacy_d_label;
use crate::event::{Acdc, EventError, EventKind, KelEvent, TelEvent};

fn events_key(said: &str) -> Vec<u8> {
    format!("events/{said}").into_bytes()
}

fn schemas_key(said: &str) -> Vec<u8> {
    format!("schemas/{said}").into_bytes()
}

fn acdc_key(said: &str) -> Vec<u8> {
    format!("acdc/{said}").into_bytes()
}

fn kel_prefix(aid: &str) -> Vec<u8> {
    format!("kel/{aid}/").into_bytes()
}

fn kel_key(aid: &str, sn: u64) -> Vec<u8> {
    format!("kel/{aid}/{sn:016x}").into_bytes()
}

fn tel_prefix(registry_id: &str) -> Vec<u8> {
    format!("tel/{registry_id}/").into_bytes()
}

fn tel_key(registry_id: &str, sn: u64, credential_said: Option<&str>) -> Vec<u8> {
    match credential_said {
        Some(cred) => format!("tel/{registry_id}/{sn:016x}/{cred}").into_bytes(),
        None => format!("tel/{registry_id}/{sn:016x}").into_bytes(),
    }
}

fn alias_key(namespace: &str, alias: &str) -> Vec<u8> {
    format!("aliases/{namespace}/{alias}").into_bytes()
}

fn alias_rev_key(namespace: &str, id: &str) -> Vec<u8> {
    format!("aliases-rev/{namespace}/{id}").into_bytes()
}

fn alias_prefix(namespace: &str) -> Vec<u8> {
    format!("aliases/{namespace}/").into_bytes()
}

fn index_key(namespace: &str, owner: &str, id: &str) -> Vec<u8> {
    format!("index/{namespace}/{owner}/{id}").into_bytes()
}

fn index_prefix(namespace: &str, owner: &str) -> Vec<u8> {
    format!("index/{namespace}/{owner}/").into_bytes()
}

fn schemas_prefix() -> Vec<u8> {
    b"schemas/".to_vec()
}

fn parse_sn(s: &str) -> Result<u64, Error> {
    s.parse()
        .map_err(|_| EventError::BadField(format!("not a decimal sequence number: {s:?}")).into())
}

fn bytes_to_said(bytes: Vec<u8>) -> Result<String, Error> {
    String::from_utf8(bytes)
        .map_err(|_| EventError::BadField("stored SAID is not UTF-8".into()).into())
}

/// A decoded, classified event as returned by [`Store::get_event`].
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub raw: Vec<u8>,
    pub json: Value,
    pub kind: EventKind,
}

/// Wraps a [`Kv`] capability with the logical tables of §4.2. Borrows its
/// backend the same way [`crate::capability::crypto::KeyRing`] borrows its
/// `Crypto` capability — one per builder instance, never a singleton.
pub struct Store<'k> {
    kv: &'k dyn Kv,
}

impl<'k> Store<'k> {
    pub fn new(kv: &'k dyn Kv) -> Self {
        Self { kv }
    }

    /// Decodes and validates `bytes`, stores it idempotently under
    /// `events/<SAID>`, and synchronously appends it to the secondary
    /// index implied by its type tag (§4.2).
    pub fn put_event(&self, bytes: &[u8]) -> Result<String, Error> {
        let decoded = codec::decode(bytes)?;
        let kind = EventKind::classify(&decoded.json)?;
        // A registry's `vcp` self-addresses both `i` and `d` to the same
        // SAID (§4.4); every other event only self-addresses `d`.
        let said_fields: &[&str] = match kind {
            EventKind::Vcp => &["i", "d"],
            _ => &["d"],
        };
        if !codec::verify_said_multi(&decoded.json, said_fields, "d")? {
            return Err(codec::Error::BadSaid { label: "d".to_string() }.into());
        }
        let said = decoded
            .json
            .get("d")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("d"))?
            .to_string();

        let key = events_key(&said);
        if let Some(existing) = self.kv.get(&key)? {
            if existing != bytes {
                return Err(Error::SaidConflict { said });
            }
            return Ok(said);
        }

        self.index_event(&said, &decoded.json, kind)?;
        self.kv.put(&key, bytes)?;
        Ok(said)
    }

    fn index_event(&self, said: &str, json: &Value, kind: EventKind) -> Result<(), Error> {
        match kind {
            EventKind::Icp | EventKind::Rot | EventKind::Ixn => {
                let event = KelEvent::from_value(json)?;
                let sn = parse_sn(event.data.sequence())?;
                let key = kel_key(event.data.identifier(), sn);
                self.kv.put(&key, said.as_bytes())?;
            }
            EventKind::Vcp => {
                let key = tel_key(said, 0, None);
                self.kv.put(&key, said.as_bytes())?;
            }
            EventKind::Iss | EventKind::Rev => {
                let event = TelEvent::from_value(json)?;
                let sn = parse_sn(event.data.sequence())?;
                let registry = event.data.registry_id(said).to_string();
                let credential = event
                    .data
                    .credential_id()
                    .expect("iss/rev always carries a credential id")
                    .to_string();
                let key = tel_key(&registry, sn, Some(&credential));
                self.kv.put(&key, said.as_bytes())?;
            }
            EventKind::Acdc => {
                let acdc = Acdc::from_value(json)?;
                let bytes = serde_json::to_vec(json).map_err(codec::Error::from)?;
                self.kv.put(&acdc_key(&acdc.d), &bytes)?;
            }
        }
        Ok(())
    }

    /// Fetches and classifies the event stored under `said`.
    pub fn get_event(&self, said: &str) -> Result<EventRecord, Error> {
        let raw = self
            .kv
            .get(&events_key(said))?
            .ok_or_else(|| Error::NotFound(said.to_string()))?;
        let decoded = codec::decode(&raw)?;
        let kind = EventKind::classify(&decoded.json)?;
        Ok(EventRecord { raw, json: decoded.json, kind })
    }

    /// The ACDC denormalized at `acdc/<said>` (§4.2); source of truth
    /// remains `events/<said>`.
    pub fn get_acdc(&self, said: &str) -> Result<Acdc, Error> {
        let raw = self
            .kv
            .get(&acdc_key(said))?
            .ok_or_else(|| Error::NotFound(said.to_string()))?;
        let json: Value = serde_json::from_slice(&raw).map_err(codec::Error::from)?;
        Ok(Acdc::from_value(&json)?)
    }

    /// Every event of `aid`'s KEL, ordered by `s`. Unknown AIDs yield `[]`.
    pub fn list_kel(&self, aid: &str) -> Result<Vec<Value>, Error> {
        self.list_indexed(&kel_prefix(aid))
    }

    /// Every event of `registry_id`'s TEL, ordered first by `s` and then
    /// (for events sharing an `s` bucket across different credentials) by
    /// credential SAID. Unknown registries yield `[]`.
    pub fn list_tel(&self, registry_id: &str) -> Result<Vec<Value>, Error> {
        self.list_indexed(&tel_prefix(registry_id))
    }

    fn list_indexed(&self, prefix: &[u8]) -> Result<Vec<Value>, Error> {
        let keys = self.kv.list(prefix)?;
        let mut events = Vec::with_capacity(keys.len());
        for key in keys {
            let said_bytes = self
                .kv
                .get(&key)?
                .ok_or_else(|| Error::NotFound(String::from_utf8_lossy(&key).into_owned()))?;
            let said = bytes_to_said(said_bytes)?;
            events.push(self.get_event(&said)?.json);
        }
        Ok(events)
    }

    /// Stores a schema body, enforcing the `$id`-labeled SAID convention
    /// (§9 Open Question) by rejecting the legacy `d`-labeled shape.
    pub fn put_schema(&self, body: &Value) -> Result<String, Error> {
        if uses_legacy_d_label(body) {
            return Err(Error::SchemaConflict);
        }
        if !codec::verify_said(body, "$id")? {
            return Err(codec::Error::BadSaid { label: "$id".to_string() }.into());
        }
        let said = body
            .get("$id")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingField("$id"))?
            .to_string();
        let bytes = serde_json::to_vec(body).map_err(codec::Error::from)?;
        self.kv.put(&schemas_key(&said), &bytes)?;
        Ok(said)
    }

    pub fn get_schema(&self, said: &str) -> Result<Value, Error> {
        let raw = self
            .kv
            .get(&schemas_key(said))?
            .ok_or_else(|| Error::NotFound(said.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| codec::Error::from(e).into())
    }

    pub fn put_alias(&self, namespace: &str, id: &str, alias: &str) -> Result<(), Error> {
        if self.kv.get(&alias_key(namespace, alias))?.is_some() {
            return Err(Error::AliasConflict {
                namespace: namespace.to_string(),
                alias: alias.to_string(),
            });
        }
        self.kv.put(&alias_key(namespace, alias), id.as_bytes())?;
        self.kv.put(&alias_rev_key(namespace, id), alias.as_bytes())?;
        Ok(())
    }

    pub fn alias_to_id(&self, namespace: &str, alias: &str) -> Result<Option<String>, Error> {
        self.kv
            .get(&alias_key(namespace, alias))?
            .map(bytes_to_said)
            .transpose()
    }

    pub fn id_to_alias(&self, namespace: &str, id: &str) -> Result<Option<String>, Error> {
        self.kv
            .get(&alias_rev_key(namespace, id))?
            .map(bytes_to_said)
            .transpose()
    }

    pub fn del_alias(&self, namespace: &str, alias: &str) -> Result<(), Error> {
        let id = self
            .alias_to_id(namespace, alias)?
            .ok_or_else(|| Error::AliasNotFound {
                namespace: namespace.to_string(),
                alias: alias.to_string(),
            })?;
        self.kv.del(&alias_key(namespace, alias))?;
        self.kv.del(&alias_rev_key(namespace, &id))?;
        Ok(())
    }

    /// Every `(alias, id)` pair bound in `namespace` (§6 alias namespaces:
    /// `kel`, `tel`, `schema`, `acdc`, `contact`).
    pub fn list_aliases(&self, namespace: &str) -> Result<Vec<(String, String)>, Error> {
        let prefix = alias_prefix(namespace);
        let keys = self.kv.list(&prefix)?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let alias = String::from_utf8(key[prefix.len()..].to_vec())
                .map_err(|_| EventError::BadField("alias is not UTF-8".into()))?;
            let id = bytes_to_said(
                self.kv
                    .get(&key)?
                    .ok_or_else(|| Error::NotFound(alias.clone()))?,
            )?;
            out.push((alias, id));
        }
        Ok(out)
    }

    /// Records `id` under a builder-maintained secondary index scoped to
    /// `owner` (e.g. "which registries did this AID issue", "which
    /// credentials name this AID as holder") — the same append-only,
    /// replay-friendly key layout as the KEL/TEL indices above, just keyed
    /// by an arbitrary owner instead of a log identifier.
    pub fn index_put(&self, namespace: &str, owner: &str, id: &str) -> Result<(), Error> {
        self.kv.put(&index_key(namespace, owner, id), id.as_bytes())?;
        Ok(())
    }

    pub fn index_list(&self, namespace: &str, owner: &str) -> Result<Vec<String>, Error> {
        let keys = self.kv.list(&index_prefix(namespace, owner))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(bytes_to_said(self.kv.get(&key)?.ok_or_else(|| {
                Error::NotFound(String::from_utf8_lossy(&key).into_owned())
            })?)?);
        }
        Ok(out)
    }

    /// Every schema body ever stored, in no particular order.
    pub fn list_schemas(&self) -> Result<Vec<Value>, Error> {
        let keys = self.kv.list(&schemas_prefix())?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes = self
                .kv
                .get(&key)?
                .ok_or_else(|| Error::NotFound(String::from_utf8_lossy(&key).into_owned()))?;
            out.push(serde_json::from_slice(&bytes).map_err(codec::Error::from)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::kv::MemoryKv;
    use crate::codec::prefix::DigestAlgorithm;
    use crate::codec::said::saidify;
    use crate::codec::version::Family;
    use serde_json::json;

    fn framed_icp(aid: &str) -> Vec<u8> {
        let body = json!({"v": "", "t": "icp", "s": "0", "d": "", "i": aid, "kt": "1", "k": [aid], "nt": "0", "n": []});
        let (bytes, _said) =
            codec::encode_saidified(&body, &["d"], Family::Keri, DigestAlgorithm::Blake3_256).unwrap();
        bytes
    }

    #[test]
    fn put_event_is_idempotent_and_indexes_kel() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let bytes = framed_icp("Dalice");
        let said = store.put_event(&bytes).unwrap();
        let said_again = store.put_event(&bytes).unwrap();
        assert_eq!(said, said_again);

        let kel = store.list_kel("Dalice").unwrap();
        assert_eq!(kel.len(), 1);
        assert_eq!(kel[0]["t"], "icp");
    }

    #[test]
    fn put_event_rejects_conflicting_content_under_same_said() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let bytes = framed_icp("Dalice");
        let decoded = codec::decode(&bytes).unwrap();
        let said = decoded.json["d"].as_str().unwrap().to_string();

        // Simulate another writer's bytes already occupying this SAID's slot.
        store.kv.put(&events_key(&said), b"different-bytes").unwrap();

        let err = store.put_event(&bytes);
        assert!(matches!(err, Err(Error::SaidConflict { .. })));
    }

    #[test]
    fn unknown_kel_returns_empty() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        assert_eq!(store.list_kel("Dnobody").unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn alias_rebind_conflicts_and_delete_clears_it() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        store.put_alias("kel", "Dalice", "alice").unwrap();
        assert_eq!(store.alias_to_id("kel", "alice").unwrap().as_deref(), Some("Dalice"));
        assert!(matches!(
            store.put_alias("kel", "Dbob", "alice"),
            Err(Error::AliasConflict { .. })
        ));
        store.del_alias("kel", "alice").unwrap();
        assert_eq!(store.alias_to_id("kel", "alice").unwrap(), None);
    }

    #[test]
    fn schema_rejects_legacy_d_label() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let legacy = json!({"d": "Esomething", "type": "object"});
        assert!(matches!(store.put_schema(&legacy), Err(Error::SchemaConflict)));

        let modern = saidify(&json!({"$id": "", "type": "object"}), "$id", DigestAlgorithm::Blake3_256).unwrap();
        let said = store.put_schema(&modern).unwrap();
        assert_eq!(store.get_schema(&said).unwrap(), modern);
    }

    #[test]
    fn list_aliases_returns_every_bound_pair() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        store.put_alias("contact", "Dalice", "alice").unwrap();
        store.put_alias("contact", "Dbob", "bob").unwrap();
        let mut pairs = store.list_aliases("contact").unwrap();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![("alice".to_string(), "Dalice".to_string()), ("bob".to_string(), "Dbob".to_string())]
        );
    }

    #[test]
    fn secondary_index_lists_ids_scoped_to_owner() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        store.index_put("registries", "Dalice", "Edegrees").unwrap();
        store.index_put("registries", "Dalice", "Ecerts").unwrap();
        store.index_put("registries", "Dbob", "Eother").unwrap();

        let mut alice_registries = store.index_list("registries", "Dalice").unwrap();
        alice_registries.sort();
        assert_eq!(alice_registries, vec!["Ecerts".to_string(), "Edegrees".to_string()]);
        assert_eq!(store.index_list("registries", "Dbob").unwrap(), vec!["Eother".to_string()]);
    }
}
