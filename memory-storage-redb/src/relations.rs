//! Entity-relation table accessors, including the subject-predicate index
//! the Invalidator's contradiction-candidate query needs.

use memory_core::types::{EntityRelation, RelationType};
use memory_core::{Error, NewEntityRelation, Result};
use redb::ReadableTable;
use uuid::Uuid;

use crate::codec::{decode, encode};
use crate::tables::{subject_relation_key, ENTITY_RELATIONS_TABLE, SUBJECT_RELATIONS_INDEX};
use crate::{with_db_timeout, RedbStore};

impl RedbStore {
    pub(crate) async fn add_entity_relation_impl(&self, draft: NewEntityRelation) -> Result<Uuid> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;

            let id = Uuid::new_v4();
            let relation = EntityRelation {
                id,
                from_id: draft.from_id,
                to_id: draft.to_id,
                relation_type: draft.relation_type.clone(),
                weight: draft.weight,
                valid_at: draft.valid_at,
                invalid_at: None,
                invalidated_by: None,
                source_episode_id: draft.source_episode_id,
                created_at: memory_core::graph::now(),
            };

            {
                let mut relations = write_txn
                    .open_table(ENTITY_RELATIONS_TABLE)
                    .map_err(|e| Error::Storage(format!("open entity_relations: {e}")))?;
                relations
                    .insert(id.as_bytes().as_slice(), encode(&relation)?.as_slice())
                    .map_err(|e| Error::Storage(format!("insert relation: {e}")))?;

                let mut index = write_txn
                    .open_table(SUBJECT_RELATIONS_INDEX)
                    .map_err(|e| Error::Storage(format!("open subject_relations_index: {e}")))?;
                let index_key = subject_relation_key(draft.from_id, &draft.relation_type);
                let mut ids: Vec<Uuid> = match index
                    .get(index_key.as_slice())
                    .map_err(|e| Error::Storage(format!("get subject_relations_index: {e}")))?
                {
                    Some(row) => decode(row.value())?,
                    None => Vec::new(),
                };
                ids.push(id);
                index
                    .insert(index_key.as_slice(), encode(&ids)?.as_slice())
                    .map_err(|e| Error::Storage(format!("update subject_relations_index: {e}")))?;
            }

            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;

            Ok(id)
        })
        .await
    }

    pub(crate) async fn get_entity_relation_impl(&self, id: Uuid) -> Result<Option<EntityRelation>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let relations = read_txn
                .open_table(ENTITY_RELATIONS_TABLE)
                .map_err(|e| Error::Storage(format!("open entity_relations: {e}")))?;
            match relations
                .get(id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get relation: {e}")))?
            {
                Some(row) => Ok(Some(decode(row.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub(crate) async fn get_valid_relations_for_impl(&self, entity_id: Uuid) -> Result<Vec<EntityRelation>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let relations = read_txn
                .open_table(ENTITY_RELATIONS_TABLE)
                .map_err(|e| Error::Storage(format!("open entity_relations: {e}")))?;
            let all: Vec<EntityRelation> = relations
                .iter()
                .map_err(|e| Error::Storage(format!("iterate entity_relations: {e}")))?
                .filter_map(|item| item.ok())
                .map(|(_, v)| decode::<EntityRelation>(v.value()))
                .collect::<Result<Vec<_>>>()?;
            Ok(all
                .into_iter()
                .filter(|r| r.is_active() && (r.from_id == entity_id || r.to_id == entity_id))
                .collect())
        })
        .await
    }

    pub(crate) async fn find_invalidation_candidates_impl(
        &self,
        subject: Uuid,
        relation_type: &RelationType,
    ) -> Result<Vec<EntityRelation>> {
        let key = subject_relation_key(subject, relation_type);
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let index = read_txn
                .open_table(SUBJECT_RELATIONS_INDEX)
                .map_err(|e| Error::Storage(format!("open subject_relations_index: {e}")))?;
            let ids: Vec<Uuid> = match index
                .get(key.as_slice())
                .map_err(|e| Error::Storage(format!("get subject_relations_index: {e}")))?
            {
                Some(row) => decode(row.value())?,
                None => Vec::new(),
            };

            let relations = read_txn
                .open_table(ENTITY_RELATIONS_TABLE)
                .map_err(|e| Error::Storage(format!("open entity_relations: {e}")))?;
            let mut candidates = Vec::new();
            for id in ids {
                if let Some(row) = relations
                    .get(id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get relation: {e}")))?
                {
                    let relation: EntityRelation = decode(row.value())?;
                    if relation.is_active() {
                        candidates.push(relation);
                    }
                }
            }
            Ok(candidates)
        })
        .await
    }

    pub(crate) async fn invalidate_relation_impl(&self, id: Uuid, invalidated_by: Uuid) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut relations = write_txn
                    .open_table(ENTITY_RELATIONS_TABLE)
                    .map_err(|e| Error::Storage(format!("open entity_relations: {e}")))?;
                let Some(row) = relations
                    .get(id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get relation: {e}")))?
                else {
                    return Err(Error::NotFound(format!("entity relation {id}")));
                };
                let mut relation: EntityRelation = decode(row.value())?;
                drop(row);
                relation.invalid_at = Some(memory_core::graph::now());
                relation.invalidated_by = Some(invalidated_by);
                relations
                    .insert(id.as_bytes().as_slice(), encode(&relation)?.as_slice())
                    .map_err(|e| Error::Storage(format!("update relation: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }
}
