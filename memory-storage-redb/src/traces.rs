//! Trace table accessors, plus the edge tables a trace participates in:
//! `trace_sources`, `trace_entities` (and its `entity_traces` reverse
//! index), and `trace_neighbors`.

use memory_core::types::{Entity, Trace, TraceNeighbor};
use memory_core::{Error, NewTrace, Result};
use redb::ReadableTable;
use uuid::Uuid;

use crate::codec::{decode, encode};
use crate::tables::{
    ENTITIES_TABLE, ENTITY_TRACES_TABLE, TRACES_TABLE, TRACE_ENTITIES_TABLE, TRACE_NEIGHBORS_TABLE,
    TRACE_SHORT_ID_INDEX, TRACE_SOURCES_TABLE,
};
use crate::{with_db_timeout, RedbStore};

impl RedbStore {
    pub(crate) async fn add_trace_impl(&self, draft: NewTrace, source_episode_ids: &[Uuid]) -> Result<Trace> {
        if source_episode_ids.is_empty() {
            return Err(Error::InvalidInput(
                "a trace must have at least one source episode".into(),
            ));
        }
        let source_episode_ids = source_episode_ids.to_vec();
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;

            let id = Uuid::new_v4();
            let short_id = {
                let index = write_txn
                    .open_table(TRACE_SHORT_ID_INDEX)
                    .map_err(|e| Error::Storage(format!("open trace_short_id_index: {e}")))?;
                memory_core::short_id::generate_unique(id, |candidate| {
                    Ok(index
                        .get(candidate)
                        .map_err(|e| Error::Storage(format!("lookup short id: {e}")))?
                        .is_some())
                })?
            };

            let now = memory_core::graph::now();
            let trace = Trace {
                id,
                short_id: short_id.clone(),
                summary: draft.summary,
                topic: draft.topic,
                trace_type: draft.trace_type,
                embedding: draft.embedding,
                strength: 0,
                activation: 1.0,
                is_core: draft.is_core,
                created_at: now,
                last_accessed: now,
            };

            {
                let mut traces = write_txn
                    .open_table(TRACES_TABLE)
                    .map_err(|e| Error::Storage(format!("open traces: {e}")))?;
                traces
                    .insert(id.as_bytes().as_slice(), encode(&trace)?.as_slice())
                    .map_err(|e| Error::Storage(format!("insert trace: {e}")))?;

                let mut index = write_txn
                    .open_table(TRACE_SHORT_ID_INDEX)
                    .map_err(|e| Error::Storage(format!("open trace_short_id_index: {e}")))?;
                index
                    .insert(short_id.as_str(), id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("insert short id index: {e}")))?;

                let mut sources = write_txn
                    .open_table(TRACE_SOURCES_TABLE)
                    .map_err(|e| Error::Storage(format!("open trace_sources: {e}")))?;
                sources
                    .insert(id.as_bytes().as_slice(), encode(&source_episode_ids)?.as_slice())
                    .map_err(|e| Error::Storage(format!("insert trace sources: {e}")))?;
            }

            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;

            Ok(trace)
        })
        .await
    }

    pub(crate) async fn get_trace_impl(&self, id: Uuid) -> Result<Option<Trace>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let traces = read_txn
                .open_table(TRACES_TABLE)
                .map_err(|e| Error::Storage(format!("open traces: {e}")))?;
            match traces
                .get(id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get trace: {e}")))?
            {
                Some(row) => Ok(Some(decode(row.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub(crate) async fn set_trace_core_impl(&self, id: Uuid, is_core: bool) -> Result<()> {
        self.update_trace(id, move |trace| trace.is_core = is_core).await
    }

    pub(crate) async fn mark_trace_done_impl(&self, id: Uuid, resolution_episode_id: Uuid) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut traces = write_txn
                    .open_table(TRACES_TABLE)
                    .map_err(|e| Error::Storage(format!("open traces: {e}")))?;
                let Some(row) = traces
                    .get(id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get trace: {e}")))?
                else {
                    return Err(Error::NotFound(format!("trace {id}")));
                };
                let mut trace: Trace = decode(row.value())?;
                drop(row);
                trace.strength += 1;
                trace.last_accessed = memory_core::graph::now();
                traces
                    .insert(id.as_bytes().as_slice(), encode(&trace)?.as_slice())
                    .map_err(|e| Error::Storage(format!("update trace: {e}")))?;

                let mut sources = write_txn
                    .open_table(TRACE_SOURCES_TABLE)
                    .map_err(|e| Error::Storage(format!("open trace_sources: {e}")))?;
                let mut ids: Vec<Uuid> = match sources
                    .get(id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get trace sources: {e}")))?
                {
                    Some(row) => decode(row.value())?,
                    None => Vec::new(),
                };
                if !ids.contains(&resolution_episode_id) {
                    ids.push(resolution_episode_id);
                    sources
                        .insert(id.as_bytes().as_slice(), encode(&ids)?.as_slice())
                        .map_err(|e| Error::Storage(format!("update trace sources: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn boost_trace_access_impl(&self, ids: &[Uuid], delta: u32) -> Result<()> {
        let ids = ids.to_vec();
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut traces = write_txn
                    .open_table(TRACES_TABLE)
                    .map_err(|e| Error::Storage(format!("open traces: {e}")))?;
                let now = memory_core::graph::now();
                for id in ids {
                    let Some(row) = traces
                        .get(id.as_bytes().as_slice())
                        .map_err(|e| Error::Storage(format!("get trace: {e}")))?
                    else {
                        continue;
                    };
                    let mut trace: Trace = decode(row.value())?;
                    drop(row);
                    trace.strength += delta;
                    trace.last_accessed = now;
                    traces
                        .insert(id.as_bytes().as_slice(), encode(&trace)?.as_slice())
                        .map_err(|e| Error::Storage(format!("update trace: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn decay_activations_impl(&self, half_life: chrono::Duration) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut traces = write_txn
                    .open_table(TRACES_TABLE)
                    .map_err(|e| Error::Storage(format!("open traces: {e}")))?;
                let now = memory_core::graph::now();
                let keys: Vec<Vec<u8>> = traces
                    .iter()
                    .map_err(|e| Error::Storage(format!("iterate traces: {e}")))?
                    .filter_map(|item| item.ok())
                    .map(|(k, _)| k.value().to_vec())
                    .collect();
                for key in keys {
                    let Some(row) = traces
                        .get(key.as_slice())
                        .map_err(|e| Error::Storage(format!("get trace: {e}")))?
                    else {
                        continue;
                    };
                    let mut trace: Trace = decode(row.value())?;
                    drop(row);
                    let elapsed = now - trace.last_accessed;
                    trace.activation *= memory_core::graph::decay_factor(elapsed, half_life);
                    traces
                        .insert(key.as_slice(), encode(&trace)?.as_slice())
                        .map_err(|e| Error::Storage(format!("update trace: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn get_trace_sources_impl(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let sources = read_txn
                .open_table(TRACE_SOURCES_TABLE)
                .map_err(|e| Error::Storage(format!("open trace_sources: {e}")))?;
            match sources
                .get(id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get trace sources: {e}")))?
            {
                Some(row) => decode(row.value()),
                None => Ok(Vec::new()),
            }
        })
        .await
    }

    pub(crate) async fn get_trace_entities_impl(&self, id: Uuid) -> Result<Vec<Entity>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let trace_entities = read_txn
                .open_table(TRACE_ENTITIES_TABLE)
                .map_err(|e| Error::Storage(format!("open trace_entities: {e}")))?;
            let entity_ids: Vec<Uuid> = match trace_entities
                .get(id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get trace_entities: {e}")))?
            {
                Some(row) => decode(row.value())?,
                None => Vec::new(),
            };

            let entities = read_txn
                .open_table(ENTITIES_TABLE)
                .map_err(|e| Error::Storage(format!("open entities: {e}")))?;
            entity_ids
                .into_iter()
                .filter_map(|eid| {
                    entities
                        .get(eid.as_bytes().as_slice())
                        .ok()
                        .flatten()
                        .map(|row| decode(row.value()))
                })
                .collect()
        })
        .await
    }

    pub(crate) async fn get_trace_neighbors_impl(&self, id: Uuid) -> Result<Vec<TraceNeighbor>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let neighbors = read_txn
                .open_table(TRACE_NEIGHBORS_TABLE)
                .map_err(|e| Error::Storage(format!("open trace_neighbors: {e}")))?;
            match neighbors
                .get(id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get trace neighbors: {e}")))?
            {
                Some(row) => decode(row.value()),
                None => Ok(Vec::new()),
            }
        })
        .await
    }

    pub(crate) async fn all_traces_impl(&self) -> Result<Vec<Trace>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let traces = read_txn
                .open_table(TRACES_TABLE)
                .map_err(|e| Error::Storage(format!("open traces: {e}")))?;
            traces
                .iter()
                .map_err(|e| Error::Storage(format!("iterate traces: {e}")))?
                .filter_map(|item| item.ok())
                .map(|(_, v)| decode(v.value()))
                .collect()
        })
        .await
    }

    pub(crate) async fn link_trace_to_entity_impl(&self, trace_id: Uuid, entity_id: Uuid) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut trace_entities = write_txn
                    .open_table(TRACE_ENTITIES_TABLE)
                    .map_err(|e| Error::Storage(format!("open trace_entities: {e}")))?;
                let mut ids: Vec<Uuid> = match trace_entities
                    .get(trace_id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get trace_entities: {e}")))?
                {
                    Some(row) => decode(row.value())?,
                    None => Vec::new(),
                };
                if !ids.contains(&entity_id) {
                    ids.push(entity_id);
                    trace_entities
                        .insert(trace_id.as_bytes().as_slice(), encode(&ids)?.as_slice())
                        .map_err(|e| Error::Storage(format!("update trace_entities: {e}")))?;
                }

                let mut entity_traces = write_txn
                    .open_table(ENTITY_TRACES_TABLE)
                    .map_err(|e| Error::Storage(format!("open entity_traces: {e}")))?;
                let mut trace_ids: Vec<Uuid> = match entity_traces
                    .get(entity_id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get entity_traces: {e}")))?
                {
                    Some(row) => decode(row.value())?,
                    None => Vec::new(),
                };
                if !trace_ids.contains(&trace_id) {
                    trace_ids.push(trace_id);
                    entity_traces
                        .insert(entity_id.as_bytes().as_slice(), encode(&trace_ids)?.as_slice())
                        .map_err(|e| Error::Storage(format!("update entity_traces: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn add_trace_neighbor_impl(&self, neighbor: TraceNeighbor) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut neighbors = write_txn
                    .open_table(TRACE_NEIGHBORS_TABLE)
                    .map_err(|e| Error::Storage(format!("open trace_neighbors: {e}")))?;
                let mut edges: Vec<TraceNeighbor> =
                    match neighbors
                        .get(neighbor.from.as_bytes().as_slice())
                        .map_err(|e| Error::Storage(format!("get trace_neighbors: {e}")))?
                    {
                        Some(row) => decode(row.value())?,
                        None => Vec::new(),
                    };
                if let Some(existing) = edges
                    .iter_mut()
                    .find(|e| e.to == neighbor.to && e.edge_type == neighbor.edge_type)
                {
                    existing.weight = neighbor.weight;
                } else {
                    edges.push(neighbor);
                }
                neighbors
                    .insert(neighbor.from.as_bytes().as_slice(), encode(&edges)?.as_slice())
                    .map_err(|e| Error::Storage(format!("update trace_neighbors: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn update_trace(&self, id: Uuid, f: impl FnOnce(&mut Trace) + Send + 'static) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut traces = write_txn
                    .open_table(TRACES_TABLE)
                    .map_err(|e| Error::Storage(format!("open traces: {e}")))?;
                let Some(row) = traces
                    .get(id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get trace: {e}")))?
                else {
                    return Err(Error::NotFound(format!("trace {id}")));
                };
                let mut trace: Trace = decode(row.value())?;
                drop(row);
                f(&mut trace);
                traces
                    .insert(id.as_bytes().as_slice(), encode(&trace)?.as_slice())
                    .map_err(|e| Error::Storage(format!("update trace: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }
}
