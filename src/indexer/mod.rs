//! Query-time replay of KEL/TEL logs into derived views (§4.5): per-registry
//! credential status and edge linkage, and a combined node/edge graph.
//! Nothing here is persisted — every call re-reads the [`Store`] from
//! scratch, the same discipline [`crate::kel::KelEngine`] and
//! [`crate::tel::TelEngine`] follow for their own state.

pub mod error;

pub use error::Error;

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::event::tel::{TelEvent, TelEventData, VcpData};
use crate::event::{Acdc, Edge, EventKind};
use crate::store::Store;
use crate::tel::CredentialStatus;

/// One credential's derived view within a registry (§4.5).
#[derive(Debug, Clone)]
pub struct IndexedAcdc {
    pub credential_id: String,
    pub issuer_aid: String,
    pub holder_aid: Option<String>,
    pub schema: String,
    pub edges: BTreeMap<String, Edge>,
    pub linked_to: Vec<String>,
    pub linked_from: Vec<String>,
    pub status: CredentialStatus,
    pub tel_events: Vec<String>,
}

/// A registry's derived view: every credential it has ever issued (§4.5).
#[derive(Debug, Clone)]
pub struct IndexedRegistry {
    pub registry_id: String,
    pub issuer_aid: String,
    pub credentials: BTreeMap<String, IndexedAcdc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Aid,
    KelEvt,
    TelRegistry,
    TelEvt,
    Acdc,
    Schema,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Prior,
    Anchor,
    Issues,
    Revokes,
    UsesSchema,
    Edge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub from: String,
    pub to: String,
}

/// The combined graph named in §4.5: one pass per log, never persisted.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<GraphEdge>,
}

fn load_vcp(store: &Store<'_>, registry_id: &str) -> Result<VcpData, Error> {
    let record = store.get_event(registry_id)?;
    match TelEvent::from_value(&record.json)?.data {
        TelEventData::Vcp(d) => Ok(d),
        _ => Err(Error::NotARegistry(registry_id.to_string())),
    }
}

fn event_said(event: &Value) -> &str {
    event["d"].as_str().unwrap_or_default()
}

pub struct Indexer<'a> {
    store: &'a Store<'a>,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a Store<'a>) -> Self {
        Self { store }
    }

    /// `index_registry(registryId) -> IndexedRegistry` (§4.5): forward pass
    /// over the TEL building each credential's `issued`/`revoked` view, then
    /// a second pass populating `linked_from` as the reverse of `linked_to`.
    pub fn index_registry(&self, registry_id: &str) -> Result<IndexedRegistry, Error> {
        let vcp = load_vcp(self.store, registry_id)?;
        let tel = self.store.list_tel(registry_id)?;

        let mut credentials: BTreeMap<String, IndexedAcdc> = BTreeMap::new();
        for event in &tel {
            match EventKind::classify(event)? {
                EventKind::Iss => {
                    let credential_id = event["i"].as_str().unwrap_or_default().to_string();
                    let acdc = self.store.get_acdc(&credential_id)?;
                    let edges = acdc.e.clone().unwrap_or_default();
                    let linked_to = edges.values().map(|e| e.n.clone()).collect();
                    credentials.insert(
                        credential_id.clone(),
                        IndexedAcdc {
                            credential_id,
                            issuer_aid: acdc.i.clone(),
                            holder_aid: acdc.holder().map(str::to_string),
                            schema: acdc.s.clone(),
                            edges,
                            linked_to,
                            linked_from: Vec::new(),
                            status: CredentialStatus::Issued,
                            tel_events: vec![event_said(event).to_string()],
                        },
                    );
                }
                EventKind::Rev => {
                    let credential_id = event["i"].as_str().unwrap_or_default();
                    if let Some(entry) = credentials.get_mut(credential_id) {
                        entry.status = CredentialStatus::Revoked;
                        entry.tel_events.push(event_said(event).to_string());
                    }
                }
                _ => {}
            }
        }

        let reverse: Vec<(String, String)> = credentials
            .values()
            .flat_map(|c| c.linked_to.iter().map(move |target| (c.credential_id.clone(), target.clone())))
            .collect();
        for (source, target) in reverse {
            if let Some(entry) = credentials.get_mut(&target) {
                entry.linked_from.push(source);
            }
        }

        Ok(IndexedRegistry { registry_id: registry_id.to_string(), issuer_aid: vcp.ii, credentials })
    }

    /// `index_acdc(credentialId, registryId)` (§4.5): the subset of
    /// [`index_registry`]'s view for one credential.
    pub fn index_acdc(&self, credential_id: &str, registry_id: &str) -> Result<IndexedAcdc, Error> {
        self.index_registry(registry_id)?
            .credentials
            .remove(credential_id)
            .ok_or_else(|| Error::NotFound(credential_id.to_string()))
    }

    /// Builds the combined graph (§4.5) reachable from `aid`'s KEL: its own
    /// events, every registry it has anchored, and the ACDCs/schemas those
    /// registries issue against. A registry is expanded at most once even
    /// if multiple `ixn` seals reference it.
    pub fn build_graph(&self, aid: &str) -> Result<Graph, Error> {
        let mut graph = Graph::default();
        let mut visited_registries = HashSet::new();

        graph.nodes.push(Node { kind: NodeKind::Aid, id: aid.to_string() });

        for event in self.store.list_kel(aid)? {
            let said = event_said(&event).to_string();
            graph.nodes.push(Node { kind: NodeKind::KelEvt, id: said.clone() });
            if let Some(p) = event.get("p").and_then(Value::as_str) {
                graph.edges.push(GraphEdge { kind: EdgeKind::Prior, from: said.clone(), to: p.to_string() });
            }
            if event["t"] == "ixn" {
                if let Some(seals) = event["a"].as_array() {
                    for seal in seals {
                        let Some(registry_id) = seal["i"].as_str() else { continue };
                        graph.edges.push(GraphEdge {
                            kind: EdgeKind::Anchor,
                            from: said.clone(),
                            to: registry_id.to_string(),
                        });
                        if visited_registries.insert(registry_id.to_string()) {
                            self.extend_graph_with_registry(registry_id, &mut graph)?;
                        }
                    }
                }
            }
        }

        Ok(graph)
    }

    fn extend_graph_with_registry(&self, registry_id: &str, graph: &mut Graph) -> Result<(), Error> {
        graph.nodes.push(Node { kind: NodeKind::TelRegistry, id: registry_id.to_string() });

        let mut seen_acdc = HashSet::new();
        for event in self.store.list_tel(registry_id)? {
            let said = event_said(&event).to_string();
            graph.nodes.push(Node { kind: NodeKind::TelEvt, id: said.clone() });

            match EventKind::classify(&event)? {
                EventKind::Iss => {
                    let credential_id = event["i"].as_str().unwrap_or_default().to_string();
                    graph.edges.push(GraphEdge {
                        kind: EdgeKind::Issues,
                        from: said.clone(),
                        to: credential_id.clone(),
                    });
                    if seen_acdc.insert(credential_id.clone()) {
                        self.extend_graph_with_acdc(&credential_id, graph)?;
                    }
                }
                EventKind::Rev => {
                    let credential_id = event["i"].as_str().unwrap_or_default();
                    graph.edges.push(GraphEdge {
                        kind: EdgeKind::Revokes,
                        from: said,
                        to: credential_id.to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn extend_graph_with_acdc(&self, credential_id: &str, graph: &mut Graph) -> Result<(), Error> {
        graph.nodes.push(Node { kind: NodeKind::Acdc, id: credential_id.to_string() });
        let acdc: Acdc = self.store.get_acdc(credential_id)?;

        graph.nodes.push(Node { kind: NodeKind::Schema, id: acdc.s.clone() });
        graph.edges.push(GraphEdge {
            kind: EdgeKind::UsesSchema,
            from: credential_id.to_string(),
            to: acdc.s.clone(),
        });

        if let Some(edges) = &acdc.e {
            for edge in edges.values() {
                graph.edges.push(GraphEdge {
                    kind: EdgeKind::Edge,
                    from: credential_id.to_string(),
                    to: edge.n.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::crypto::{Ed25519Blake3, KeyRing};
    use crate::capability::kv::MemoryKv;
    use crate::codec::prefix::DigestAlgorithm;
    use crate::kel::KelEngine;
    use crate::tel::TelEngine;
    use serde_json::json;

    #[test]
    fn index_registry_tracks_status_and_reverse_edges() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let crypto = Ed25519Blake3::default();
        let keys = KeyRing::new(&crypto);
        let kel = KelEngine::new(&store, &crypto, &keys);
        let tel = TelEngine::new(&store, &crypto, &keys);
        let indexer = Indexer::new(&store);

        let issuer = kel.incept(&[11u8; 32]).unwrap();
        let registry_id = tel.create_registry(&issuer, vec![], None).unwrap();
        let schema =
            crate::codec::saidify(&json!({"$id": "", "type": "object"}), "$id", DigestAlgorithm::Blake3_256).unwrap();
        let schema_said = schema["$id"].as_str().unwrap().to_string();

        let root = tel
            .issue(&registry_id, &schema_said, json!({"i": issuer}), None, "2026-01-01T00:00:00Z")
            .unwrap();

        let mut edges = BTreeMap::new();
        edges.insert("parent".to_string(), Edge { n: root.clone(), s: Some(schema_said.clone()) });
        let child = tel
            .issue(&registry_id, &schema_said, json!({"i": issuer}), Some(edges), "2026-01-02T00:00:00Z")
            .unwrap();

        tel.revoke(&registry_id, &root, "2026-01-03T00:00:00Z").unwrap();

        let indexed = indexer.index_registry(&registry_id).unwrap();
        assert_eq!(indexed.issuer_aid, issuer);
        assert_eq!(indexed.credentials.len(), 2);
        assert_eq!(indexed.credentials[&root].status, CredentialStatus::Revoked);
        assert_eq!(indexed.credentials[&child].status, CredentialStatus::Issued);
        assert_eq!(indexed.credentials[&child].linked_to, vec![root.clone()]);
        assert_eq!(indexed.credentials[&root].linked_from, vec![child.clone()]);

        let single = indexer.index_acdc(&child, &registry_id).unwrap();
        assert_eq!(single.credential_id, child);
    }

    #[test]
    fn build_graph_reaches_kel_tel_and_acdc_nodes() {
        let kv = MemoryKv::new();
        let store = Store::new(&kv);
        let crypto = Ed25519Blake3::default();
        let keys = KeyRing::new(&crypto);
        let kel = KelEngine::new(&store, &crypto, &keys);
        let tel = TelEngine::new(&store, &crypto, &keys);
        let indexer = Indexer::new(&store);

        let issuer = kel.incept(&[13u8; 32]).unwrap();
        let registry_id = tel.create_registry(&issuer, vec![], None).unwrap();
        let schema =
            crate::codec::saidify(&json!({"$id": "", "type": "object"}), "$id", DigestAlgorithm::Blake3_256).unwrap();
        let schema_said = schema["$id"].as_str().unwrap().to_string();
        let credential_id = tel
            .issue(&registry_id, &schema_said, json!({"i": issuer}), None, "2026-01-01T00:00:00Z")
            .unwrap();

        let graph = indexer.build_graph(&issuer).unwrap();
        assert!(graph.nodes.iter().any(|n| n.kind == NodeKind::TelRegistry && n.id == registry_id));
        assert!(graph.nodes.iter().any(|n| n.kind == NodeKind::Acdc && n.id == credential_id));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::Anchor && e.to == registry_id));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::Issues && e.to == credential_id));
        assert!(graph
            .edges
            .iter()
            .any(|e| e.kind == EdgeKind::UsesSchema && e.from == credential_id));
    }
}
