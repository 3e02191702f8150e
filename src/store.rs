use std::collections::{HashMap, VecDeque};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::Shoot;

/// In-memory, capped history of shoots plus cancellation handles for running ones.
#[derive(Debug)]
pub struct ShootStore {
    shoots: HashMap<Uuid, Shoot>,
    order: VecDeque<Uuid>,
    running: HashMap<Uuid, CancellationToken>,
    limit: usize,
}

impl ShootStore {
    pub fn new(limit: usize) -> Self {
        Self { shoots: HashMap::new(), order: VecDeque::new(), running: HashMap::new(), limit: limit.max(1) }
    }

    /// Inserts a shoot, evicting the oldest finished entries beyond the history limit.
    pub fn insert(&mut self, shoot: Shoot) {
        let id = shoot.id;
        if self.shoots.insert(id, shoot).is_none() {
            self.order.push_back(id);
        }
        self.trim();
    }

    /// Running shoots are never evicted; the history may exceed the limit until they finish.
    fn trim(&mut self) {
        while self.order.len() > self.limit {
            let Some(pos) = self.order.iter().position(|id| !self.running.contains_key(id)) else {
                break;
            };
            if let Some(old) = self.order.remove(pos) {
                self.shoots.remove(&old);
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<&Shoot> {
        self.shoots.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Shoot> {
        self.shoots.get_mut(id)
    }

    /// Newest first.
    pub fn history(&self) -> Vec<Shoot> {
        self.order.iter().rev().filter_map(|id| self.shoots.get(id).cloned()).collect()
    }

    pub fn track(&mut self, id: Uuid, token: CancellationToken) {
        self.running.insert(id, token);
    }

    /// Tracks before inserting so the new entry can't be trimmed away on arrival.
    pub fn insert_running(&mut self, shoot: Shoot, token: CancellationToken) {
        self.track(shoot.id, token);
        self.insert(shoot);
    }

    pub fn untrack(&mut self, id: &Uuid) {
        self.running.remove(id);
        self.trim();
    }

    /// Returns `true` if a running shoot was signalled.
    pub fn cancel(&self, id: &Uuid) -> bool {
        match self.running.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GarmentAnalysis, Gender, Progress, ShootStatus};
    use chrono::Utc;

    fn shoot() -> Shoot {
        Shoot {
            id: Uuid::new_v4(),
            analysis: GarmentAnalysis {
                garment_type: "dress".into(),
                fabric: "linen".into(),
                color_palette: vec!["white".into()],
                style: "a-line".into(),
                gender: Gender::Female,
                uniqueness_level: "none".into(),
            },
            scene: "s".into(),
            model: "m".into(),
            poses: vec![],
            frames: vec![],
            status: ShootStatus::Completed,
            progress: Progress::default(),
            error: None,
            error_code: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            garment: None,
        }
    }

    #[test]
    fn history_is_capped_and_newest_first() {
        let mut store = ShootStore::new(2);
        let (a, b, c) = (shoot(), shoot(), shoot());
        let (ida, idb, idc) = (a.id, b.id, c.id);
        store.insert(a);
        store.insert(b);
        store.insert(c);
        assert!(store.get(&ida).is_none());
        let ids: Vec<_> = store.history().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![idc, idb]);
    }

    #[test]
    fn running_shoots_survive_eviction() {
        let mut store = ShootStore::new(1);
        let (a, b) = (shoot(), shoot());
        let (ida, idb) = (a.id, b.id);
        store.insert_running(a, CancellationToken::new());
        store.insert_running(b, CancellationToken::new());
        assert!(store.get(&ida).is_some());
        assert!(store.get(&idb).is_some());

        // once finished, the older shoot becomes evictable again
        store.untrack(&ida);
        assert!(store.get(&ida).is_none());
        assert_eq!(store.history().len(), 1);
    }

    #[test]
    fn cancel_only_hits_running_shoots() {
        let mut store = ShootStore::new(5);
        let s = shoot();
        let id = s.id;
        store.insert(s);
        assert!(!store.cancel(&id));
        let token = CancellationToken::new();
        store.track(id, token.clone());
        assert!(store.cancel(&id));
        assert!(token.is_cancelled());
        store.untrack(&id);
        assert!(!store.cancel(&id));
    }
}
