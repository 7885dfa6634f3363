//! Code index shared by the store backends.
//!
//! The index maps each code to its entry and a backend-specific payload handle.
//! The lock is held only for short, non-suspending sections; payload handles are
//! cloned out before any I/O so that readers keep the payload alive on their own.
//!
//! Uploads in flight hold a [`Reservation`] for their code. A reserved code counts
//! as taken for conflict checks but stays invisible to lookups until committed.

use chrono::{DateTime, Utc};
use codedrop_core::FileEntry;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) struct Slot<P> {
    pub(crate) entry: FileEntry,
    pub(crate) payload: P,
}

struct IndexState<P> {
    entries: HashMap<String, Slot<P>>,
    reserved: HashSet<String>,
}

pub(crate) struct EntryIndex<P> {
    state: RwLock<IndexState<P>>,
}

impl<P: Clone> EntryIndex<P> {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(IndexState {
                entries: HashMap::new(),
                reserved: HashSet::new(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState<P>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState<P>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `code` for an upload. `None` if a live entry or another upload holds it.
    pub(crate) fn reserve(&self, code: &str, now: DateTime<Utc>) -> Option<Reservation<'_, P>> {
        let mut state = self.write();

        let live = state
            .entries
            .get(code)
            .is_some_and(|slot| !slot.entry.is_expired_at(now));
        if live || state.reserved.contains(code) {
            return None;
        }

        state.reserved.insert(code.to_string());
        Some(Reservation {
            index: self,
            code: code.to_string(),
            committed: false,
        })
    }

    /// Live entry and a clone of its payload handle.
    pub(crate) fn get(&self, code: &str, now: DateTime<Utc>) -> Option<(FileEntry, P)> {
        let state = self.read();
        state
            .entries
            .get(code)
            .filter(|slot| !slot.entry.is_expired_at(now))
            .map(|slot| (slot.entry.clone(), slot.payload.clone()))
    }

    /// Remove an entry regardless of expiry. The caller drops the slot outside the lock.
    pub(crate) fn remove(&self, code: &str) -> Option<Slot<P>> {
        self.write().entries.remove(code)
    }

    /// Remove an entry only if it is still expired at `now`. A code that was reissued
    /// since the caller saw it expire is left alone.
    pub(crate) fn remove_expired(&self, code: &str, now: DateTime<Utc>) -> Option<Slot<P>> {
        self.remove_where(code, |entry| entry.is_expired_at(now))
    }

    /// Remove an entry only if it is live at `now`.
    pub(crate) fn remove_live(&self, code: &str, now: DateTime<Utc>) -> Option<Slot<P>> {
        self.remove_where(code, |entry| !entry.is_expired_at(now))
    }

    fn remove_where(&self, code: &str, matches_entry: impl Fn(&FileEntry) -> bool) -> Option<Slot<P>> {
        let mut state = self.write();
        let matches = state
            .entries
            .get(code)
            .is_some_and(|slot| matches_entry(&slot.entry));
        if matches {
            state.entries.remove(code)
        } else {
            None
        }
    }

    pub(crate) fn expired_codes(&self, now: DateTime<Utc>) -> Vec<String> {
        self.read()
            .entries
            .values()
            .filter(|slot| slot.entry.is_expired_at(now))
            .map(|slot| slot.entry.code.clone())
            .collect()
    }

    pub(crate) fn live_count(&self, now: DateTime<Utc>) -> usize {
        self.read()
            .entries
            .values()
            .filter(|slot| !slot.entry.is_expired_at(now))
            .count()
    }

    /// Entries physically held, expired ones included.
    pub(crate) fn stored_count(&self) -> usize {
        self.read().entries.len()
    }

    /// Insert an entry found while recovering from disk. When two recovered entries share a
    /// code the newer upload wins and the other slot is returned for disposal.
    pub(crate) fn insert_recovered(&self, entry: FileEntry, payload: P) -> Option<Slot<P>> {
        let mut state = self.write();
        let code = entry.code.clone();
        let incoming = Slot { entry, payload };

        match state.entries.remove(&code) {
            Some(existing) if existing.entry.upload_time >= incoming.entry.upload_time => {
                state.entries.insert(code, existing);
                Some(incoming)
            }
            previous => {
                state.entries.insert(code, incoming);
                previous
            }
        }
    }
}

/// Claim on a code held by an upload in flight. Released on drop unless committed.
pub(crate) struct Reservation<'a, P: Clone> {
    index: &'a EntryIndex<P>,
    code: String,
    committed: bool,
}

impl<P: Clone> Reservation<'_, P> {
    /// Publish the entry. Returns the expired slot it replaced, if any.
    pub(crate) fn commit(mut self, entry: FileEntry, payload: P) -> Option<Slot<P>> {
        debug_assert_eq!(entry.code, self.code);
        let mut state = self.index.write();
        state.reserved.remove(&self.code);
        self.committed = true;
        state
            .entries
            .insert(self.code.clone(), Slot { entry, payload })
    }
}

impl<P: Clone> Drop for Reservation<'_, P> {
    fn drop(&mut self) {
        if !self.committed {
            self.index.write().reserved.remove(&self.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(code: &str, now: DateTime<Utc>, ttl: Duration) -> FileEntry {
        FileEntry {
            code: code.to_string(),
            file_name: "f.bin".to_string(),
            file_size: 1,
            content_type: "application/octet-stream".to_string(),
            upload_time: now,
            expires_at: now + ttl,
        }
    }

    #[test]
    fn test_reserved_code_is_taken_but_invisible() {
        let index: EntryIndex<u8> = EntryIndex::new();
        let now = Utc::now();

        let reservation = index.reserve("AAAA", now).unwrap();
        assert!(index.reserve("AAAA", now).is_none());
        assert!(index.get("AAAA", now).is_none());

        reservation.commit(entry("AAAA", now, Duration::hours(1)), 7);
        assert_eq!(index.get("AAAA", now).map(|(_, p)| p), Some(7));
        assert!(index.reserve("AAAA", now).is_none());
    }

    #[test]
    fn test_dropped_reservation_frees_code() {
        let index: EntryIndex<u8> = EntryIndex::new();
        let now = Utc::now();

        drop(index.reserve("BBBB", now).unwrap());
        assert!(index.reserve("BBBB", now).is_some());
    }

    #[test]
    fn test_expired_entry_can_be_replaced() {
        let index: EntryIndex<u8> = EntryIndex::new();
        let start = Utc::now();

        index
            .reserve("CCCC", start)
            .unwrap()
            .commit(entry("CCCC", start, Duration::hours(1)), 1);

        let later = start + Duration::hours(2);
        assert!(index.get("CCCC", later).is_none());
        assert_eq!(index.expired_codes(later), vec!["CCCC".to_string()]);

        let replaced = index
            .reserve("CCCC", later)
            .unwrap()
            .commit(entry("CCCC", later, Duration::hours(1)), 2);
        assert_eq!(replaced.map(|slot| slot.payload), Some(1));
        assert_eq!(index.get("CCCC", later).map(|(_, p)| p), Some(2));
        assert_eq!(index.stored_count(), 1);
    }

    #[test]
    fn test_remove_expired_spares_reissued_code() {
        let index: EntryIndex<u8> = EntryIndex::new();
        let start = Utc::now();

        index
            .reserve("EEEE", start)
            .unwrap()
            .commit(entry("EEEE", start, Duration::hours(1)), 1);
        assert!(index.remove_expired("EEEE", start).is_none());

        let later = start + Duration::hours(2);
        index
            .reserve("EEEE", later)
            .unwrap()
            .commit(entry("EEEE", later, Duration::hours(1)), 2);
        assert!(index.remove_expired("EEEE", later).is_none());
        assert_eq!(index.get("EEEE", later).map(|(_, p)| p), Some(2));

        let much_later = later + Duration::hours(1);
        assert_eq!(index.remove_expired("EEEE", much_later).map(|s| s.payload), Some(2));
        assert_eq!(index.stored_count(), 0);
    }

    #[test]
    fn test_remove_live_leaves_expired_entry_for_eviction() {
        let index: EntryIndex<u8> = EntryIndex::new();
        let start = Utc::now();

        index
            .reserve("FFFF", start)
            .unwrap()
            .commit(entry("FFFF", start, Duration::hours(1)), 1);

        let later = start + Duration::hours(2);
        assert!(index.remove_live("FFFF", later).is_none());
        assert_eq!(index.stored_count(), 1);

        assert_eq!(index.remove_live("FFFF", start).map(|s| s.payload), Some(1));
        assert!(index.remove_live("FFFF", start).is_none());
        assert_eq!(index.stored_count(), 0);
    }

    #[test]
    fn test_recovered_duplicates_keep_newest() {
        let index: EntryIndex<u8> = EntryIndex::new();
        let now = Utc::now();

        assert!(index
            .insert_recovered(entry("DDDD", now, Duration::hours(1)), 1)
            .is_none());
        let older = entry("DDDD", now - Duration::minutes(5), Duration::hours(1));
        let loser = index.insert_recovered(older, 2).unwrap();
        assert_eq!(loser.payload, 2);
        assert_eq!(index.get("DDDD", now).map(|(_, p)| p), Some(1));
    }
}
