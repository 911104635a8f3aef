//! Episode and episode-summary table accessors.

use memory_core::types::{Episode, EpisodeSummary, SummaryLevel};
use memory_core::{Error, NewEpisode, Result};
use redb::ReadableTable;
use uuid::Uuid;

use crate::codec::{decode, encode};
use crate::tables::{summary_key, EPISODES_TABLE, EPISODE_SHORT_ID_INDEX, EPISODE_SUMMARIES_TABLE};
use crate::{with_db_timeout, RedbStore};

impl RedbStore {
    pub(crate) async fn add_episode_impl(&self, draft: NewEpisode) -> Result<Episode> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;

            let id = Uuid::new_v4();
            let short_id = {
                let index = write_txn
                    .open_table(EPISODE_SHORT_ID_INDEX)
                    .map_err(|e| Error::Storage(format!("open episode_short_id_index: {e}")))?;
                memory_core::short_id::generate_unique(id, |candidate| {
                    Ok(index
                        .get(candidate)
                        .map_err(|e| Error::Storage(format!("lookup short id: {e}")))?
                        .is_some())
                })?
            };

            let now = memory_core::graph::now();
            let episode = Episode {
                id,
                short_id: short_id.clone(),
                content: draft.content,
                source: draft.source,
                author: draft.author,
                author_id: draft.author_id,
                channel: draft.channel,
                reply_to: draft.reply_to,
                timestamp_event: draft.timestamp_event.unwrap_or(now),
                timestamp_ingested: now,
                dialogue_act: draft.dialogue_act,
                entropy_score: draft.entropy_score,
                embedding: draft.embedding,
                token_count: draft.token_count,
            };

            {
                let mut episodes = write_txn
                    .open_table(EPISODES_TABLE)
                    .map_err(|e| Error::Storage(format!("open episodes: {e}")))?;
                episodes
                    .insert(id.as_bytes().as_slice(), encode(&episode)?.as_slice())
                    .map_err(|e| Error::Storage(format!("insert episode: {e}")))?;

                let mut index = write_txn
                    .open_table(EPISODE_SHORT_ID_INDEX)
                    .map_err(|e| Error::Storage(format!("open episode_short_id_index: {e}")))?;
                index
                    .insert(short_id.as_str(), id.as_bytes().as_slice())
                    .map_err(|e| Error::Storage(format!("insert short id index: {e}")))?;
            }

            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;

            Ok(episode)
        })
        .await
    }

    pub(crate) async fn get_episode_impl(&self, id: Uuid) -> Result<Option<Episode>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let episodes = read_txn
                .open_table(EPISODES_TABLE)
                .map_err(|e| Error::Storage(format!("open episodes: {e}")))?;
            match episodes
                .get(id.as_bytes().as_slice())
                .map_err(|e| Error::Storage(format!("get episode: {e}")))?
            {
                Some(row) => Ok(Some(decode(row.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub(crate) async fn get_episode_by_short_id_impl(&self, short_id: &str) -> Result<Option<Episode>> {
        let short_id = short_id.to_string();
        let db = self.db.clone();
        let id = with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let index = read_txn
                .open_table(EPISODE_SHORT_ID_INDEX)
                .map_err(|e| Error::Storage(format!("open episode_short_id_index: {e}")))?;
            match index
                .get(short_id.as_str())
                .map_err(|e| Error::Storage(format!("lookup short id: {e}")))?
            {
                Some(row) => Ok(Some(Uuid::from_slice(row.value()).map_err(|e| {
                    Error::Storage(format!("corrupt short id index entry: {e}"))
                })?)),
                None => Ok(None),
            }
        })
        .await?;

        match id {
            Some(id) => self.get_episode_impl(id).await,
            None => Ok(None),
        }
    }

    pub(crate) async fn get_recent_episodes_impl(
        &self,
        channel: Option<&str>,
        n: usize,
    ) -> Result<Vec<Episode>> {
        let channel = channel.map(str::to_string);
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let episodes = read_txn
                .open_table(EPISODES_TABLE)
                .map_err(|e| Error::Storage(format!("open episodes: {e}")))?;

            let mut all: Vec<Episode> = episodes
                .iter()
                .map_err(|e| Error::Storage(format!("iterate episodes: {e}")))?
                .filter_map(|item| item.ok())
                .map(|(_, v)| decode::<Episode>(v.value()))
                .collect::<Result<Vec<_>>>()?;

            if let Some(channel) = &channel {
                all.retain(|e| e.channel.as_deref() == Some(channel.as_str()));
            }

            all.sort_by(|a, b| b.timestamp_event.cmp(&a.timestamp_event));
            all.truncate(n);
            Ok(all)
        })
        .await
    }

    pub(crate) async fn get_episode_summary_impl(
        &self,
        episode_id: Uuid,
        level: SummaryLevel,
    ) -> Result<Option<EpisodeSummary>> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("begin_read: {e}")))?;
            let summaries = read_txn
                .open_table(EPISODE_SUMMARIES_TABLE)
                .map_err(|e| Error::Storage(format!("open episode_summaries: {e}")))?;
            let key = summary_key(episode_id, level);
            match summaries
                .get(key.as_slice())
                .map_err(|e| Error::Storage(format!("get summary: {e}")))?
            {
                Some(row) => Ok(Some(decode(row.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub(crate) async fn put_episode_summary_impl(&self, summary: EpisodeSummary) -> Result<()> {
        let db = self.db.clone();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("begin_write: {e}")))?;
            {
                let mut summaries = write_txn
                    .open_table(EPISODE_SUMMARIES_TABLE)
                    .map_err(|e| Error::Storage(format!("open episode_summaries: {e}")))?;
                let key = summary_key(summary.episode_id, summary.level);
                summaries
                    .insert(key.as_slice(), encode(&summary)?.as_slice())
                    .map_err(|e| Error::Storage(format!("insert summary: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("commit: {e}")))?;
            Ok(())
        })
        .await
    }
}
