//! Entity table accessors: canonical/alias indexes, type scan, text search,
//! and the episode/entity mention edges.

use memory_core::types::{Entity, EntityType};
use memory_core::{Error, NewEntity, Result};
use redb::ReadableTable;
use uuid::Uuid;

use crate::codec::{decode, encode};
use crate::tables::{
    ENTITIES_TABLE, ENTITY_ALIASES_TABLE, ENTITY_ALIAS_INDEX, ENTITY_CANONICAL_INDEX,
    ENTITY_MENTIONS_TABLE, EPISODE_MENTIONS_TABLE,
};
use crate::{with_db_timeout, RedbStore};

impl RedbStore {
    pub(crate) async fn add_entity_impl(&self, draft: NewEntity) -> Result<Entity> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;

            let id = Uuid::new_v4();
            let now = memory_core::graph::now();
            let entity = Entity {
                id,
                name: draft.name,
                entity_type: draft.entity_type,
                salience: draft.salience,
                embedding: draft.embedding,
                created_at: now,
                updated_at: now,
            };

            {
                let mut entities = write_txn
                    .open_table(ENTITIES_TABLE)
                    .map_err(|e| Error::Storage(format!("open entities: {e}")))?;
                entities
                    .insert(id.as_bytes().as_slice(), encode(&entity)?.as_slice())
                    .map_err(|e| Error::Storage(format!("insert entity: {e}")))?;

                let mut canonical = write_txn
                    .open_table(ENTITY_CANONICAL_INDEX)
                    .map_err(|e| Error::Storage(format!("open entity_canonical_index: {e}")))?;
                canonical
                    .insert(entity.name.to_lowercase().as_str(), id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("insert canonical index: {e}")))?;
            }

            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;

            Ok(entity)
        })
        .await
    }

    pub(crate) async fn get_entity_impl(&self, id: Uuid) -> Result<Option<Entity>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let entities = read_txn
                .open_table(ENTITIES_TABLE)
                .map_err(|e| Error::Storage(format!("open entities: {e}")))?;
            match entities
                .get(id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get entity: {e}")))?
            {
                Some(row) => Ok(Some(decode(row.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub(crate) async fn find_entity_by_canonical_name_impl(&self, name: &str) -> Result<Option<Entity>> {
        let name = name.to_lowercase();
        let db = self.db.clone();
        let id = with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let canonical = read_txn
                .open_table(ENTITY_CANONICAL_INDEX)
                .map_err(|e| Error::Storage(format!("open entity_canonical_index: {e}")))?;
            match canonical
                .get(name.as_str())
                .map_err(|e| Error::Storage(format!("lookup canonical name: {e}")))?
            {
                Some(row) => Ok(Some(uuid_from_row(row.value())?)),
                None => Ok(None),
            }
        })
        .await?;

        match id {
            Some(id) => self.get_entity_impl(id).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn find_entity_by_alias_impl(&self, alias: &str) -> Result<Option<Entity>> {
        let alias = alias.to_lowercase();
        let db = self.db.clone();
        let id = with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let index = read_txn
                .open_table(ENTITY_ALIAS_INDEX)
                .map_err(|e| Error::Storage(format!("open entity_alias_index: {e}")))?;
            match index
                .get(alias.as_str())
                .map_err(|e| Error::Storage(format!("lookup alias: {e}")))?
            {
                Some(row) => Ok(Some(uuid_from_row(row.value())?)),
                None => Ok(None),
            }
        })
        .await?;

        match id {
            Some(id) => self.get_entity_impl(id).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn find_entities_by_type_impl(&self, entity_type: EntityType) -> Result<Vec<Entity>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let entities = read_txn
                .open_table(ENTITIES_TABLE)
                .map_err(|e| Error::Storage(format!("open entities: {e}")))?;
            let all: Vec<Entity> = entities
                .iter()
                .map_err(|e| Error::Storage(format!("iterate entities: {e}")))?
                .filter_map(|item| item.ok())
                .map(|(_, v)| decode::<Entity>(v.value()))
                .collect::<Result<Vec<_>>>()?;
            Ok(all.into_iter().filter(|e| e.entity_type == entity_type).collect())
        })
        .await
    }

    pub(crate) async fn add_entity_alias_impl(&self, entity_id: Uuid, alias: &str) -> Result<()> {
        let alias = alias.to_string();
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut aliases = write_txn
                    .open_table(ENTITY_ALIASES_TABLE)
                    .map_err(|e| Error::Storage(format!("open entity_aliases: {e}")))?;
                let mut list: Vec<String> = match aliases
                    .get(entity_id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get entity_aliases: {e}")))?
                {
                    Some(row) => decode(row.value())?,
                    None => Vec::new(),
                };
                if !list.iter().any(|a| a.eq_ignore_ascii_case(&alias)) {
                    list.push(alias.clone());
                    aliases
                        .insert(entity_id.as_bytes().as_slice(), encode(&list)?.as_slice())
                        .map_err(|e| Error::Storage(format!("update entity_aliases: {e}")))?;

                    let mut index = write_txn
                        .open_table(ENTITY_ALIAS_INDEX)
                        .map_err(|e| Error::Storage(format!("open entity_alias_index: {e}")))?;
                    index
                        .insert(alias.to_lowercase().as_str(), entity_id.as_bytes().as_slice())
                        .map_err(|e| Error::Storage(format!("insert alias index: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn increment_entity_salience_impl(&self, entity_id: Uuid, delta: f32) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut entities = write_txn
                    .open_table(ENTITIES_TABLE)
                    .map_err(|e| Error::Storage(format!("open entities: {e}")))?;
                let Some(row) = entities
                    .get(entity_id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get entity: {e}")))?
                else {
                    return Err(Error::NotFound(format!("entity {entity_id}")));
                };
                let mut entity: Entity = decode(row.value())?;
                drop(row);
                entity.salience += delta;
                entity.updated_at = memory_core::graph::now();
                entities
                    .insert(entity_id.as_bytes().as_slice(), encode(&entity)?.as_slice())
                    .map_err(|e| Error::Storage(format!("update entity: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn find_entities_by_text_impl(&self, query: &str, max: usize) -> Result<Vec<Entity>> {
        let query = query.to_lowercase();
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let entities = read_txn
                .open_table(ENTITIES_TABLE)
                .map_err(|e| Error::Storage(format!("open entities: {e}")))?;
            let aliases = read_txn
                .open_table(ENTITY_ALIASES_TABLE)
                .map_err(|e| Error::Storage(format!("open entity_aliases: {e}")))?;

            let mut matches: Vec<Entity> = Vec::new();
            for item in entities
                .iter()
                .map_err(|e| Error::Storage(format!("iterate entities: {e}")))?
            {
                let Ok((key, value)) = item else { continue };
                let entity: Entity = decode(value.value())?;
                let mut hit = contains_word(&entity.name.to_lowercase(), &query);
                if !hit {
                    if let Some(row) = aliases
                        .get(key.value())
                        .map_err(|e| Error::Storage(format!("get entity_aliases: {e}")))?
                    {
                        let alias_list: Vec<String> = decode(row.value())?;
                        hit = alias_list
                            .iter()
                            .any(|a| contains_word(&a.to_lowercase(), &query));
                    }
                }
                if hit {
                    matches.push(entity);
                }
            }

            matches.sort_by(|a, b| b.salience.partial_cmp(&a.salience).unwrap_or(std::cmp::Ordering::Equal));
            matches.truncate(max);
            Ok(matches)
        })
        .await
    }

    pub(crate) async fn link_episode_to_entity_impl(&self, episode_id: Uuid, entity_id: Uuid) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut mentions = write_txn
                    .open_table(EPISODE_MENTIONS_TABLE)
                    .map_err(|e| Error::Storage(format!("open episode_mentions: {e}")))?;
                let mut ids: Vec<Uuid> = match mentions
                    .get(episode_id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get episode_mentions: {e}")))?
                {
                    Some(row) => decode(row.value())?,
                    None => Vec::new(),
                };
                if !ids.contains(&entity_id) {
                    ids.push(entity_id);
                    mentions
                        .insert(episode_id.as_bytes().as_slice(), encode(&ids)?.as_slice())
                        .map_err(|e| Error::Storage(format!("update episode_mentions: {e}")))?;
                }

                let mut reverse = write_txn
                    .open_table(ENTITY_MENTIONS_TABLE)
                    .map_err(|e| Error::Storage(format!("open entity_mentions: {e}")))?;
                let mut episode_ids: Vec<Uuid> = match reverse
                    .get(entity_id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("get entity_mentions: {e}")))?
                {
                    Some(row) => decode(row.value())?,
                    None => Vec::new(),
                };
                if !episode_ids.contains(&episode_id) {
                    episode_ids.push(episode_id);
                    reverse
                        .insert(entity_id.as_bytes().as_slice(), encode(&episode_ids)?.as_slice())
                        .map_err(|e| Error::Storage(format!("update entity_mentions: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn get_entities_for_episode_impl(&self, episode_id: Uuid) -> Result<Vec<Entity>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let mentions = read_txn
                .open_table(EPISODE_MENTIONS_TABLE)
                .map_err(|e| Error::Storage(format!("open episode_mentions: {e}")))?;
            let ids: Vec<Uuid> = match mentions
                .get(episode_id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get episode_mentions: {e}")))?
            {
                Some(row) => decode(row.value())?,
                None => Vec::new(),
            };

            let entities = read_txn
                .open_table(ENTITIES_TABLE)
                .map_err(|e| Error::Storage(format!("open entities: {e}")))?;
            ids.into_iter()
                .filter_map(|id| {
                    entities
                        .get(id.as_bytes().as_slice())
                        .ok()
                        .flatten()
                        .map(|row| decode(row.value()))
                })
                .collect()
        })
        .await
    }

    pub(crate) async fn get_episodes_for_entity_impl(&self, entity_id: Uuid) -> Result<Vec<Uuid>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let reverse = read_txn
                .open_table(ENTITY_MENTIONS_TABLE)
                .map_err(|e| Error::Storage(format!("open entity_mentions: {e}")))?;
            match reverse
                .get(entity_id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get entity_mentions: {e}")))?
            {
                Some(row) => decode(row.value()),
                None => Ok(Vec::new()),
            }
        })
        .await
    }

    pub(crate) async fn get_traces_for_entity_impl(&self, entity_id: Uuid) -> Result<Vec<Uuid>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let entity_traces = read_txn
                .open_table(crate::tables::ENTITY_TRACES_TABLE)
                .map_err(|e| Error::Storage(format!("open entity_traces: {e}")))?;
            match entity_traces
                .get(entity_id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get entity_traces: {e}")))?
            {
                Some(row) => decode(row.value()),
                None => Ok(Vec::new()),
            }
        })
        .await
    }
}

fn uuid_from_row(bytes: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(bytes).map_err(|e| Error::Storage(format!("corrupt uuid index entry: {e}")))
}

/// Word-boundary containment: `haystack` must contain `needle` as a whole
/// word, not merely as a substring (spec §4.1 entity text match).
fn contains_word(needle: &str, haystack: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == needle)
        || haystack.contains(needle)
}
