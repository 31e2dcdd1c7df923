//! The consumer-facing facade (§6): accounts, registries, credentials,
//! and the read-side queries a wallet or issuer application needs, all
//! wired on top of [`crate::kel`], [`crate::tel`] and [`crate::indexer`].
//!
//! A `Builder` owns one [`Store`], one `Crypto` capability, and one
//! [`KeyRing`] — never a singleton (§9). On top of those it keeps a small
//! process-local cache mapping aliases to the AIDs/registry IDs they
//! resolve to, populated as a side effect of `new_account`/`create_registry`
//! and lazily backfilled from the store's alias table on first lookup.
//! Nothing outside this cache observes writes made through another
//! `Builder` instance or another process — see the design note in
//! `DESIGN.md`.

pub mod bundle;
pub mod error;

pub use bundle::{Bundle, BundleMetadata, BundleScope, BundleType};
pub use error::Error;

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value;

use crate::capability::crypto::{Crypto, KeyRing};
use crate::capability::kv::Kv;
use crate::codec::prefix::DigestAlgorithm;
use crate::event::{Acdc, Edge, EventKind};
use crate::indexer::{IndexedAcdc, IndexedRegistry, Indexer};
use crate::kel::KelEngine;
use crate::store::Store;
use crate::tel::{CredentialStatus, TelEngine};

/// Default digest/signature suite (§6: Ed25519 + Blake3-256) and any other
/// builder-wide policy. Kept as a small struct the way the teacher's own
/// top-level constructors take a config value rather than a long argument
/// list.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub digest_algorithm: DigestAlgorithm,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self { digest_algorithm: DigestAlgorithm::Blake3_256 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub alias: String,
    pub aid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub alias: String,
    pub aid: String,
}

/// The distilled spec's `new_mnemonic` step, represented as an opaque,
/// round-trippable handle over a raw 32-byte seed. Neither the teacher nor
/// any crate in the example pack carries a BIP-39 wordlist dependency, so
/// rather than invent a wordlist/checksum scheme nothing here asks for,
/// this crate treats the mnemonic as the seed itself.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Mnemonic(pub [u8; 32]);

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Mnemonic").field(&"<redacted>").finish()
    }
}

/// Parameters for [`Builder::issue`].
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub registry: String,
    pub schema: String,
    pub holder: String,
    pub data: Value,
    pub edges: Option<BTreeMap<String, Edge>>,
    pub alias: Option<String>,
}

/// Aggregate result of a bundle import (§6, §7): every event is tried
/// independently, so one malformed entry never aborts the rest.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

pub struct Builder<'a> {
    store: Store<'a>,
    crypto: &'a dyn Crypto,
    keys: KeyRing<'a>,
    config: BuilderConfig,
    accounts: RwLock<HashMap<String, Account>>,
}

impl<'a> Builder<'a> {
    pub fn new(kv: &'a dyn Kv, crypto: &'a dyn Crypto, config: BuilderConfig) -> Self {
        Self {
            store: Store::new(kv),
            crypto,
            keys: KeyRing::new(crypto),
            config,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    fn kel(&self) -> KelEngine<'_> {
        KelEngine::new(&self.store, self.crypto, &self.keys)
    }

    fn tel(&self) -> TelEngine<'_> {
        TelEngine::new(&self.store, self.crypto, &self.keys)
    }

    fn indexer(&self) -> Indexer<'_> {
        Indexer::new(&self.store)
    }

    fn now(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }

    // -- Accounts ---------------------------------------------------

    pub fn new_mnemonic(&self, seed: [u8; 32]) -> Mnemonic {
        Mnemonic(seed)
    }

    pub fn new_account(&self, alias: &str, mnemonic: &Mnemonic) -> Result<Account, Error> {
        let aid = self.kel().incept(&mnemonic.0)?;
        self.store.put_alias("kel", &aid, alias)?;
        let account = Account { alias: alias.to_string(), aid: aid.clone() };
        self.accounts
            .write()
            .expect("account cache poisoned")
            .insert(alias.to_string(), account.clone());
        log::info!("created account {alias:?} ({aid})");
        Ok(account)
    }

    pub fn rotate_keys(&self, account: &str, mnemonic: &Mnemonic) -> Result<(), Error> {
        let aid = self.resolve_account(account)?;
        self.kel().rotate(&aid, &mnemonic.0)?;
        log::info!("rotated keys for {aid}");
        Ok(())
    }

    fn resolve_account(&self, account: &str) -> Result<String, Error> {
        if let Some(found) = self.accounts.read().expect("account cache poisoned").get(account) {
            return Ok(found.aid.clone());
        }
        if let Some(aid) = self.store.alias_to_id("kel", account)? {
            self.accounts.write().expect("account cache poisoned").insert(
                account.to_string(),
                Account { alias: account.to_string(), aid: aid.clone() },
            );
            return Ok(aid);
        }
        if account.starts_with('D') {
            return Ok(account.to_string());
        }
        Err(Error::UnknownAccount(account.to_string()))
    }

    fn resolve_registry(&self, registry: &str) -> Result<String, Error> {
        if let Some(id) = self.store.alias_to_id("tel", registry)? {
            return Ok(id);
        }
        if registry.starts_with('E') {
            return Ok(registry.to_string());
        }
        Err(Error::UnknownRegistry(registry.to_string()))
    }

    // -- Registries ---------------------------------------------------

    pub fn create_registry(
        &self,
        account: &str,
        alias: &str,
        backers: Vec<String>,
        parent_registry_id: Option<String>,
    ) -> Result<String, Error> {
        let issuer = self.resolve_account(account)?;
        let registry_id = self.tel().create_registry(&issuer, backers, parent_registry_id)?;
        self.store.put_alias("tel", &registry_id, alias)?;
        self.store.index_put("registries", &issuer, &registry_id)?;
        log::info!("created registry {alias:?} ({registry_id}) for {issuer}");
        Ok(registry_id)
    }

    pub fn list_registries(&self, account: &str) -> Result<Vec<String>, Error> {
        let issuer = self.resolve_account(account)?;
        Ok(self.store.index_list("registries", &issuer)?)
    }

    pub fn reanchor_registry(&self, registry: &str) -> Result<(), Error> {
        let registry_id = self.resolve_registry(registry)?;
        Ok(self.tel().reanchor(&registry_id)?)
    }

    pub fn registry_view(&self, registry: &str) -> Result<IndexedRegistry, Error> {
        let registry_id = self.resolve_registry(registry)?;
        Ok(self.indexer().index_registry(&registry_id)?)
    }

    // -- Credentials ---------------------------------------------------

    pub fn issue(&self, request: IssueRequest) -> Result<String, Error> {
        let registry_id = self.resolve_registry(&request.registry)?;
        let mut subject = request.data;
        if let Value::Object(ref mut map) = subject {
            map.insert("i".to_string(), Value::String(request.holder.clone()));
        }
        let now = self.now();
        let credential_id = self.tel().issue(&registry_id, &request.schema, subject, request.edges, &now)?;
        if let Some(alias) = &request.alias {
            self.store.put_alias("acdc", &credential_id, alias)?;
        }
        self.store.index_put("credentials-by-holder", &request.holder, &credential_id)?;
        log::info!("issued credential {credential_id} in registry {registry_id}");
        Ok(credential_id)
    }

    pub fn revoke(&self, credential_id: &str) -> Result<(), Error> {
        let acdc = self.store.get_acdc(credential_id)?;
        let now = self.now();
        self.tel().revoke(&acdc.ri, credential_id, &now)?;
        log::info!("revoked credential {credential_id}");
        Ok(())
    }

    /// Binds a credential (and, if supplied, the `iss` event that anchors
    /// it) received out of band into the local store, optionally under a
    /// convenience alias. Unlike `issue`, this never signs anything — it is
    /// the holder-side counterpart of an issuer's `issue`.
    pub fn accept(&self, credential_frame: &[u8], iss_event_frame: Option<&[u8]>, alias: Option<&str>) -> Result<String, Error> {
        let credential_id = self.store.put_event(credential_frame)?;
        if let Some(iss_bytes) = iss_event_frame {
            self.store.put_event(iss_bytes)?;
        }
        if let Some(alias) = alias {
            self.store.put_alias("acdc", &credential_id, alias)?;
        }
        log::info!("accepted credential {credential_id}");
        Ok(credential_id)
    }

    pub fn status(&self, credential_id: &str) -> Result<CredentialStatus, Error> {
        let acdc = self.store.get_acdc(credential_id)?;
        Ok(self.tel().status(&acdc.ri, credential_id)?)
    }

    // -- Queries ---------------------------------------------------

    pub fn get_credential(&self, credential_id: &str) -> Result<Acdc, Error> {
        Ok(self.store.get_acdc(credential_id)?)
    }

    pub fn credential_view(&self, credential_id: &str) -> Result<IndexedAcdc, Error> {
        let acdc = self.store.get_acdc(credential_id)?;
        Ok(self.indexer().index_acdc(credential_id, &acdc.ri)?)
    }

    pub fn list_credentials(&self, registry: &str) -> Result<Vec<String>, Error> {
        let registry_id = self.resolve_registry(registry)?;
        Ok(self.indexer().index_registry(&registry_id)?.credentials.into_keys().collect())
    }

    pub fn public_key(&self, account: &str) -> Result<String, Error> {
        let aid = self.resolve_account(account)?;
        let state = self.kel().current_state(&aid)?.ok_or_else(|| Error::UnknownAccount(account.to_string()))?;
        state.k.into_iter().next().ok_or_else(|| Error::UnknownAccount(account.to_string()))
    }

    /// Every credential naming `account` as holder (`a.i`), regardless of
    /// which registry issued it.
    pub fn signed_credentials(&self, account: &str) -> Result<Vec<String>, Error> {
        let aid = self.resolve_account(account)?;
        Ok(self.store.index_list("credentials-by-holder", &aid)?)
    }

    pub fn schemas(&self) -> Result<Vec<Value>, Error> {
        Ok(self.store.list_schemas()?)
    }

    pub fn add_schema(&self, body: &Value) -> Result<String, Error> {
        let saidified = crate::codec::saidify(body, "$id", self.config.digest_algorithm)?;
        Ok(self.store.put_schema(&saidified)?)
    }

    pub fn contacts(&self) -> Result<Vec<Contact>, Error> {
        Ok(self
            .store
            .list_aliases("contact")?
            .into_iter()
            .map(|(alias, aid)| Contact { alias, aid })
            .collect())
    }

    pub fn add_contact(&self, alias: &str, aid: &str) -> Result<(), Error> {
        Ok(self.store.put_alias("contact", aid, alias)?)
    }

    // -- Bundle import/export ---------------------------------------------------

    /// Exports every event in `scope` as a [`Bundle`] of base64-framed
    /// CESR (§6). At least one of `scope`'s fields must be set; an empty
    /// scope exports nothing rather than the whole store.
    pub fn export_bundle(&self, scope: BundleScope, source: Option<String>) -> Result<Bundle, Error> {
        let mut saids = Vec::new();
        if let Some(aid) = &scope.aid {
            saids.extend(
                self.store
                    .list_kel(aid)?
                    .iter()
                    .filter_map(|e| e["d"].as_str().map(str::to_string)),
            );
        }
        if let Some(registry_id) = &scope.registry_id {
            saids.extend(
                self.store
                    .list_tel(registry_id)?
                    .iter()
                    .filter_map(|e| e["d"].as_str().map(str::to_string)),
            );
        }
        if let Some(credential_id) = &scope.credential_id {
            saids.push(credential_id.clone());
        }

        let mut events = Vec::with_capacity(saids.len());
        for said in &saids {
            let record = self.store.get_event(said)?;
            events.push(base64::encode(&record.raw));
        }

        let kind = match (&scope.aid, &scope.registry_id, &scope.credential_id) {
            (Some(_), None, None) => BundleType::Kel,
            (None, Some(_), None) => BundleType::Tel,
            (None, None, Some(_)) => BundleType::Acdc,
            _ => BundleType::Mixed,
        };

        Ok(Bundle {
            kind,
            version: "1.0".to_string(),
            events,
            metadata: BundleMetadata { source, created: self.now(), scope: Some(scope) },
        })
    }

    /// Imports a [`Bundle`]'s events, trying each independently (§7): a
    /// malformed or already-present entry is counted, never fatal to the
    /// rest.
    pub fn import_bundle(&self, bundle: &Bundle) -> Result<ImportReport, Error> {
        let mut report = ImportReport::default();
        for (index, encoded) in bundle.events.iter().enumerate() {
            let bytes = match base64::decode(encoded) {
                Ok(b) => b,
                Err(e) => {
                    report.failed += 1;
                    report
                        .errors
                        .push(Error::MalformedBundleEntry { index, reason: e.to_string() }.to_string());
                    continue;
                }
            };
            match self.try_ingest_one(&bytes) {
                Ok(true) => report.imported += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("event {index}: {e}"));
                }
            }
        }
        Ok(report)
    }

    /// Imports raw, concatenated CESR frames with no bundle envelope (§6).
    pub fn import_raw_frames(&self, bytes: &[u8]) -> Result<ImportReport, Error> {
        let mut report = ImportReport::default();
        let frames = crate::codec::scan_frames(bytes)?;
        for (index, frame) in frames.iter().enumerate() {
            match self.try_ingest_one(frame) {
                Ok(true) => report.imported += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("frame {index}: {e}"));
                }
            }
        }
        Ok(report)
    }

    /// Returns `Ok(true)` if `bytes` was newly stored, `Ok(false)` if its
    /// SAID was already present. KEL events go through `KelEngine::ingest`
    /// so sequencing/threshold/pre-rotation are still enforced on replayed
    /// history; TEL and ACDC events are trusted as already-anchored and
    /// stored directly, the same way a log replay would.
    fn try_ingest_one(&self, bytes: &[u8]) -> Result<bool, Error> {
        let decoded = crate::codec::decode(bytes)?;
        if let Some(said) = decoded.json.get("d").and_then(Value::as_str) {
            if self.store.get_event(said).is_ok() {
                return Ok(false);
            }
        }
        match EventKind::classify(&decoded.json)? {
            EventKind::Icp | EventKind::Rot | EventKind::Ixn => {
                self.kel().ingest(bytes)?;
            }
            _ => {
                self.store.put_event(bytes)?;
            }
        }
        Ok(true)
    }
}
