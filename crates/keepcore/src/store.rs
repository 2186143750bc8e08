use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, Pool, ProficiencyRecord, Role, Vitals, actor_key, validate_name};
use crate::error::StoreError;

/// On-disk shape of one actor. Cooldowns are stored as time remaining so a restart
/// neither forgets nor extends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRecord {
    pub name: String,
    #[serde(default)]
    pub is_keeper: bool,
    pub room: String,
    pub vitals: VitalsRecord,
    #[serde(default)]
    pub spellbook: BTreeMap<String, ProficiencyRecord>,
    #[serde(default)]
    pub cooldowns_ms: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalsRecord {
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    #[serde(rename = "move")]
    pub moves: i32,
    #[serde(rename = "max_move")]
    pub max_moves: i32,
}

impl Actor {
    pub fn to_record(&self, now_ms: u64) -> ActorRecord {
        let v = &self.vitals;
        ActorRecord {
            name: self.name.clone(),
            is_keeper: self.role.is_keeper(),
            room: self.room_id.clone(),
            vitals: VitalsRecord {
                hp: v.hp.cur,
                max_hp: v.hp.max,
                mana: v.mana.cur,
                max_mana: v.mana.max,
                moves: v.moves.cur,
                max_moves: v.moves.max,
            },
            spellbook: self.spellbook.clone(),
            cooldowns_ms: self
                .cooldowns
                .iter()
                .filter(|(_, until)| **until > now_ms)
                .map(|(id, until)| (id.clone(), until - now_ms))
                .collect(),
        }
    }

    pub fn from_record(rec: ActorRecord, now_ms: u64) -> Self {
        let v = rec.vitals;
        let cooldowns = rec
            .cooldowns_ms
            .into_iter()
            .filter(|(_, left)| *left > 0)
            .map(|(id, left)| (id, now_ms.saturating_add(left)))
            .collect::<HashMap<_, _>>();
        let spellbook = rec
            .spellbook
            .into_iter()
            .map(|(id, r)| (id, ProficiencyRecord::starting_at(r.proficiency).with_uses(r.uses)))
            .collect();
        Self {
            name: rec.name,
            role: Role::from_keeper_flag(rec.is_keeper),
            vitals: Vitals {
                hp: Pool::new(v.hp, v.max_hp),
                mana: Pool::new(v.mana, v.max_mana),
                moves: Pool::new(v.moves, v.max_moves),
            },
            room_id: rec.room,
            spellbook,
            cooldowns,
        }
    }
}

impl ProficiencyRecord {
    fn with_uses(mut self, uses: u32) -> Self {
        self.uses = uses;
        self
    }
}

pub trait ActorStore: Send {
    /// `Ok(None)` when no record exists for `name`.
    fn load(&self, name: &str) -> Result<Option<ActorRecord>, StoreError>;
    fn save(&self, rec: &ActorRecord) -> Result<(), StoreError>;
}

/// One pretty-printed JSON file per actor under a directory.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name).map_err(|_| StoreError::BadName(name.to_string()))?;
        Ok(self.dir.join(format!("{}.json", actor_key(name))))
    }
}

impl ActorStore for JsonDirStore {
    fn load(&self, name: &str) -> Result<Option<ActorRecord>, StoreError> {
        let path = self.path_for(name)?;
        let s = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Some(serde_json::from_str(&s)?))
    }

    fn save(&self, rec: &ActorRecord) -> Result<(), StoreError> {
        let path = self.path_for(&rec.name)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let s = serde_json::to_string_pretty(rec)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, s).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(())
    }
}

/// In-memory store for tests. Clones share the same records; `fail_saves` makes every
/// save return an io error until cleared.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryStore {
    records: std::sync::Arc<std::sync::Mutex<HashMap<String, ActorRecord>>>,
    fail: std::sync::Arc<std::sync::atomic::AtomicBool>,
    fail_loads: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) fn fail_saves(&self, on: bool) {
        self.fail.store(on, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn fail_loads(&self, on: bool) {
        self.fail_loads.store(on, std::sync::atomic::Ordering::SeqCst);
    }

    pub(crate) fn get(&self, name: &str) -> Option<ActorRecord> {
        self.records.lock().unwrap().get(&actor_key(name)).cloned()
    }

    pub(crate) fn put(&self, rec: ActorRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(actor_key(&rec.name), rec);
    }
}

#[cfg(test)]
impl ActorStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<ActorRecord>, StoreError> {
        if self.fail_loads.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("memory"),
                source: std::io::Error::other("unreadable"),
            });
        }
        Ok(self.get(name))
    }

    fn save(&self, rec: &ActorRecord) -> Result<(), StoreError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("memory"),
                source: std::io::Error::other("disk full"),
            });
        }
        self.put(rec.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::StarterKit;

    fn sample() -> Actor {
        let mut a = StarterKit::find("wanderer").unwrap().outfit("Vex", "hollow.library");
        a.role = Role::Keeper;
        a.vitals.hp.cur = 40;
        a.spellbook.get_mut("slash").unwrap().uses = 12;
        a.start_cooldown("slash", 10_000, 2_000);
        a.start_cooldown("arcane_bolt", 0, 1_000);
        a
    }

    #[test]
    fn record_carries_everything_that_matters() {
        let rec = sample().to_record(11_000);
        assert!(rec.is_keeper);
        assert_eq!(rec.vitals.hp, 40);
        assert_eq!(rec.spellbook["slash"].uses, 12);
        // expired cooldowns are dropped, live ones stored as time left
        assert_eq!(rec.cooldowns_ms.len(), 1);
        assert_eq!(rec.cooldowns_ms["slash"], 1_000);

        let back = Actor::from_record(rec, 500);
        assert_eq!(back.role, Role::Keeper);
        assert_eq!(back.cooldown_remaining("slash", 500), Some(1_000));
        assert_eq!(back.room_id, "hollow.library");
        assert_eq!(back.proficiency("arcane_bolt"), 20);
    }

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path().join("players"));
        assert!(store.load("Vex").unwrap().is_none());

        let rec = sample().to_record(10_000);
        store.save(&rec).unwrap();
        assert!(dir.path().join("players/vex.json").exists());
        assert!(!dir.path().join("players/vex.json.tmp").exists());
        assert_eq!(store.load("VEX").unwrap(), Some(rec));

        let raw = std::fs::read_to_string(dir.path().join("players/vex.json")).unwrap();
        assert!(raw.contains("\"is_keeper\": true"));
        assert!(raw.contains("\"max_move\""));
    }

    #[test]
    fn bad_names_never_touch_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        assert!(matches!(
            store.load("../etc/passwd"),
            Err(StoreError::BadName(_))
        ));
    }

    #[test]
    fn corrupt_records_are_errors_not_blank_actors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vex.json"), "{ not json").unwrap();
        let store = JsonDirStore::new(dir.path());
        assert!(matches!(store.load("Vex"), Err(StoreError::Json(_))));
    }

    #[test]
    fn older_records_without_optional_fields_load() {
        let s = r#"{"name":"Old","room":"hollow.square",
            "vitals":{"hp":5,"max_hp":10,"mana":1,"max_mana":2,"move":3,"max_move":4}}"#;
        let rec: ActorRecord = serde_json::from_str(s).unwrap();
        let a = Actor::from_record(rec, 0);
        assert_eq!(a.role, Role::Player);
        assert!(a.spellbook.is_empty());
        assert_eq!(a.vitals.moves, Pool::new(3, 4));
    }
}
