//! Key-value store abstraction offering the primitive operations the game
//! state is built on: strings, hashes, and sorted sets. No cross-key
//! transactions exist; callers coordinate through single-key atomic
//! primitives such as [`KvStore::hset_if_absent`] and [`KvStore::zpop_by_score`].

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::dao::storage::{StorageError, StorageResult};

/// A sorted-set member together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    /// Member payload (entity identifier in every index this crate keeps).
    pub member: String,
    /// Sort score (epoch milliseconds or guess value depending on the set).
    pub score: f64,
}

/// Abstraction over the persistence layer primitives.
///
/// Every operation is atomic with respect to its own key; that is the only
/// guarantee implementations must provide.
pub trait KvStore: Send + Sync {
    /// Read a string value.
    fn get(&self, key: String) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Write a string value, replacing any previous one.
    fn set(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a key of any kind.
    fn del(&self, key: String) -> BoxFuture<'static, StorageResult<()>>;

    /// Write one or more hash fields.
    fn hset(
        &self,
        key: String,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Read a single hash field.
    fn hget(&self, key: String, field: String)
    -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Set a hash field only when it does not exist yet. Returns whether the
    /// write happened. This is the conditional primitive duplicate checks
    /// rely on.
    fn hset_if_absent(
        &self,
        key: String,
        field: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete a single hash field.
    fn hdel(&self, key: String, field: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Read every field of a hash; an absent key reads as empty.
    fn hgetall(&self, key: String) -> BoxFuture<'static, StorageResult<Vec<(String, String)>>>;
    /// Number of fields in a hash.
    fn hlen(&self, key: String) -> BoxFuture<'static, StorageResult<u64>>;

    /// Add a member to a sorted set or update its score in place.
    fn zadd(
        &self,
        key: String,
        member: String,
        score: f64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove a member from a sorted set.
    fn zrem(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Cardinality of a sorted set.
    fn zcard(&self, key: String) -> BoxFuture<'static, StorageResult<u64>>;
    /// Inclusive rank range in ascending score order. Negative indices count
    /// from the end, `-1` being the last member.
    fn zrange_by_rank(
        &self,
        key: String,
        start: i64,
        stop: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoredMember>>>;
    /// All members with `min <= score <= max`, ascending.
    fn zrange_by_score(
        &self,
        key: String,
        min: f64,
        max: f64,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoredMember>>>;
    /// Atomically remove and return every member with `score <= max`. Two
    /// concurrent callers never receive the same member, which makes this the
    /// claim primitive for scheduled work.
    fn zpop_by_score(
        &self,
        key: String,
        max: f64,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoredMember>>>;

    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Value stored under a single key.
#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    Hash(HashMap<String, String>),
    Sorted(HashMap<String, f64>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Str(_) => "string",
            Entry::Hash(_) => "hash",
            Entry::Sorted(_) => "sorted set",
        }
    }
}

fn wrong_kind(key: &str, expected: &str, entry: &Entry) -> StorageError {
    StorageError::integrity(
        key,
        format!("expected {expected} value, found {}", entry.kind()),
    )
}

/// In-process store backing single-node deployments and tests.
///
/// A [`DashMap`] shard lock guards each key, so every trait operation is
/// atomic per key without further coordination.
#[derive(Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_pairs(map: &HashMap<String, f64>) -> Vec<ScoredMember> {
        let mut pairs: Vec<ScoredMember> = map
            .iter()
            .map(|(member, score)| ScoredMember {
                member: member.clone(),
                score: *score,
            })
            .collect();
        pairs.sort_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then_with(|| a.member.cmp(&b.member))
        });
        pairs
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: String) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            match entries.get(&key) {
                None => Ok(None),
                Some(entry) => match entry.value() {
                    Entry::Str(value) => Ok(Some(value.clone())),
                    other => Err(wrong_kind(&key, "string", other)),
                },
            }
        })
    }

    fn set(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            entries.insert(key, Entry::Str(value));
            Ok(())
        })
    }

    fn del(&self, key: String) -> BoxFuture<'static, StorageResult<()>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            entries.remove(&key);
            Ok(())
        })
    }

    fn hset(
        &self,
        key: String,
        fields: Vec<(String, String)>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut slot = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::Hash(HashMap::new()));
            match slot.value_mut() {
                Entry::Hash(map) => {
                    for (field, value) in fields {
                        map.insert(field, value);
                    }
                    Ok(())
                }
                other => Err(wrong_kind(&key, "hash", other)),
            }
        })
    }

    fn hget(
        &self,
        key: String,
        field: String,
    ) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            match entries.get(&key) {
                None => Ok(None),
                Some(entry) => match entry.value() {
                    Entry::Hash(map) => Ok(map.get(&field).cloned()),
                    other => Err(wrong_kind(&key, "hash", other)),
                },
            }
        })
    }

    fn hset_if_absent(
        &self,
        key: String,
        field: String,
        value: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut slot = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::Hash(HashMap::new()));
            match slot.value_mut() {
                Entry::Hash(map) => {
                    if map.contains_key(&field) {
                        Ok(false)
                    } else {
                        map.insert(field, value);
                        Ok(true)
                    }
                }
                other => Err(wrong_kind(&key, "hash", other)),
            }
        })
    }

    fn hdel(&self, key: String, field: String) -> BoxFuture<'static, StorageResult<()>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            if let Some(mut slot) = entries.get_mut(&key) {
                match slot.value_mut() {
                    Entry::Hash(map) => {
                        map.remove(&field);
                    }
                    other => return Err(wrong_kind(&key, "hash", other)),
                }
            }
            Ok(())
        })
    }

    fn hgetall(&self, key: String) -> BoxFuture<'static, StorageResult<Vec<(String, String)>>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            match entries.get(&key) {
                None => Ok(Vec::new()),
                Some(entry) => match entry.value() {
                    Entry::Hash(map) => {
                        Ok(map.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
                    }
                    other => Err(wrong_kind(&key, "hash", other)),
                },
            }
        })
    }

    fn hlen(&self, key: String) -> BoxFuture<'static, StorageResult<u64>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            match entries.get(&key) {
                None => Ok(0),
                Some(entry) => match entry.value() {
                    Entry::Hash(map) => Ok(map.len() as u64),
                    other => Err(wrong_kind(&key, "hash", other)),
                },
            }
        })
    }

    fn zadd(
        &self,
        key: String,
        member: String,
        score: f64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            let mut slot = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::Sorted(HashMap::new()));
            match slot.value_mut() {
                Entry::Sorted(map) => {
                    map.insert(member, score);
                    Ok(())
                }
                other => Err(wrong_kind(&key, "sorted set", other)),
            }
        })
    }

    fn zrem(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<()>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            if let Some(mut slot) = entries.get_mut(&key) {
                match slot.value_mut() {
                    Entry::Sorted(map) => {
                        map.remove(&member);
                    }
                    other => return Err(wrong_kind(&key, "sorted set", other)),
                }
            }
            Ok(())
        })
    }

    fn zcard(&self, key: String) -> BoxFuture<'static, StorageResult<u64>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            match entries.get(&key) {
                None => Ok(0),
                Some(entry) => match entry.value() {
                    Entry::Sorted(map) => Ok(map.len() as u64),
                    other => Err(wrong_kind(&key, "sorted set", other)),
                },
            }
        })
    }

    fn zrange_by_rank(
        &self,
        key: String,
        start: i64,
        stop: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoredMember>>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            let pairs = match entries.get(&key) {
                None => return Ok(Vec::new()),
                Some(entry) => match entry.value() {
                    Entry::Sorted(map) => Self::sorted_pairs(map),
                    other => return Err(wrong_kind(&key, "sorted set", other)),
                },
            };

            let len = pairs.len() as i64;
            let resolve = |index: i64| -> i64 {
                if index < 0 { len + index } else { index }
            };
            let start = resolve(start).max(0);
            let stop = resolve(stop).min(len - 1);
            if start > stop || len == 0 {
                return Ok(Vec::new());
            }

            Ok(pairs[start as usize..=stop as usize].to_vec())
        })
    }

    fn zrange_by_score(
        &self,
        key: String,
        min: f64,
        max: f64,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoredMember>>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            match entries.get(&key) {
                None => Ok(Vec::new()),
                Some(entry) => match entry.value() {
                    Entry::Sorted(map) => Ok(Self::sorted_pairs(map)
                        .into_iter()
                        .filter(|pair| pair.score >= min && pair.score <= max)
                        .collect()),
                    other => Err(wrong_kind(&key, "sorted set", other)),
                },
            }
        })
    }

    fn zpop_by_score(
        &self,
        key: String,
        max: f64,
    ) -> BoxFuture<'static, StorageResult<Vec<ScoredMember>>> {
        let entries = self.entries.clone();
        Box::pin(async move {
            let Some(mut slot) = entries.get_mut(&key) else {
                return Ok(Vec::new());
            };
            match slot.value_mut() {
                Entry::Sorted(map) => {
                    let claimed: Vec<String> = map
                        .iter()
                        .filter(|(_, score)| **score <= max)
                        .map(|(member, _)| member.clone())
                        .collect();
                    let mut popped = Vec::with_capacity(claimed.len());
                    for member in claimed {
                        if let Some(score) = map.remove(&member) {
                            popped.push(ScoredMember { member, score });
                        }
                    }
                    popped.sort_by(|a, b| {
                        a.score
                            .total_cmp(&b.score)
                            .then_with(|| a.member.cmp(&b.member))
                    });
                    Ok(popped)
                }
                other => Err(wrong_kind(&key, "sorted set", other)),
            }
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async move { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_writes_only_once() {
        let store = MemoryKvStore::new();
        let first = store
            .hset_if_absent("guessers".into(), "user-1".into(), "guess-a".into())
            .await
            .unwrap();
        let second = store
            .hset_if_absent("guessers".into(), "user-1".into(), "guess-b".into())
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(
            store
                .hget("guessers".into(), "user-1".into())
                .await
                .unwrap()
                .as_deref(),
            Some("guess-a")
        );
    }

    #[tokio::test]
    async fn pop_by_score_claims_each_member_once() {
        let store = MemoryKvStore::new();
        store.zadd("due".into(), "a".into(), 10.0).await.unwrap();
        store.zadd("due".into(), "b".into(), 20.0).await.unwrap();
        store.zadd("due".into(), "c".into(), 30.0).await.unwrap();

        let first = store.zpop_by_score("due".into(), 25.0).await.unwrap();
        let second = store.zpop_by_score("due".into(), 25.0).await.unwrap();

        assert_eq!(
            first.iter().map(|p| p.member.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(second.is_empty());
        assert_eq!(store.zcard("due".into()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rank_range_supports_negative_indices() {
        let store = MemoryKvStore::new();
        for (member, score) in [("low", 1.0), ("mid", 2.0), ("high", 3.0)] {
            store
                .zadd("values".into(), member.into(), score)
                .await
                .unwrap();
        }

        let all = store
            .zrange_by_rank("values".into(), 0, -1)
            .await
            .unwrap();
        assert_eq!(
            all.iter().map(|p| p.member.as_str()).collect::<Vec<_>>(),
            vec!["low", "mid", "high"]
        );

        let tail = store
            .zrange_by_rank("values".into(), -2, -1)
            .await
            .unwrap();
        assert_eq!(
            tail.iter().map(|p| p.member.as_str()).collect::<Vec<_>>(),
            vec!["mid", "high"]
        );
    }

    #[tokio::test]
    async fn type_mismatch_surfaces_as_integrity_error() {
        let store = MemoryKvStore::new();
        store.set("game:1".into(), "payload".into()).await.unwrap();

        let err = store
            .hgetall("game:1".into())
            .await
            .expect_err("string key read as hash must fail");
        assert!(matches!(err, StorageError::Integrity { .. }));
    }

    #[tokio::test]
    async fn readding_a_member_updates_the_score_in_place() {
        let store = MemoryKvStore::new();
        store.zadd("set".into(), "m".into(), 1.0).await.unwrap();
        store.zadd("set".into(), "m".into(), 5.0).await.unwrap();

        assert_eq!(store.zcard("set".into()).await.unwrap(), 1);
        let members = store.zrange_by_score("set".into(), 5.0, 5.0).await.unwrap();
        assert_eq!(members.len(), 1);
    }
}
