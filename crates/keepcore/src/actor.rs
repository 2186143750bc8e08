use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::abilities::Resource;

pub const STUDY_BASELINE: u8 = 30;
/// Maneuvers picked up from a trainer start lower than studied ones.
pub const TRAINING_BASELINE: u8 = 10;
pub const MAX_PROFICIENCY: u8 = 100;

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    Player,
    Keeper,
}

impl Role {
    pub fn is_keeper(self) -> bool {
        matches!(self, Role::Keeper)
    }

    pub fn from_keeper_flag(is_keeper: bool) -> Self {
        if is_keeper { Role::Keeper } else { Role::Player }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Keeper => "keeper",
        }
    }
}

/// A bounded resource. `cur` is kept in `[0, max]` by every mutator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pool {
    pub cur: i32,
    pub max: i32,
}

impl Pool {
    pub fn full(max: i32) -> Self {
        let max = max.max(1);
        Self { cur: max, max }
    }

    pub fn new(cur: i32, max: i32) -> Self {
        let max = max.max(1);
        Self {
            cur: cur.clamp(0, max),
            max,
        }
    }

    /// Lower by `n`, never below zero. Returns the new value.
    pub fn drain(&mut self, n: i32) -> i32 {
        self.cur = (self.cur - n.max(0)).max(0);
        self.cur
    }

    /// Raise by `n`, never above max. Returns how much was actually restored.
    pub fn restore(&mut self, n: i32) -> i32 {
        let before = self.cur;
        self.cur = (self.cur + n.max(0)).min(self.max);
        self.cur - before
    }

    pub fn refill(&mut self) {
        self.cur = self.max;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vitals {
    pub hp: Pool,
    pub mana: Pool,
    pub moves: Pool,
}

impl Vitals {
    pub fn full(hp: i32, mana: i32, moves: i32) -> Self {
        Self {
            hp: Pool::full(hp),
            mana: Pool::full(mana),
            moves: Pool::full(moves),
        }
    }

    pub fn pool(&self, r: Resource) -> Pool {
        match r {
            Resource::Mana => self.mana,
            Resource::Move => self.moves,
        }
    }

    pub fn pool_mut(&mut self, r: Resource) -> &mut Pool {
        match r {
            Resource::Mana => &mut self.mana,
            Resource::Move => &mut self.moves,
        }
    }

    pub fn refill(&mut self) {
        self.hp.refill();
        self.mana.refill();
        self.moves.refill();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProficiencyRecord {
    pub proficiency: u8,
    #[serde(default)]
    pub uses: u32,
}

impl ProficiencyRecord {
    pub fn starting_at(proficiency: u8) -> Self {
        Self {
            proficiency: proficiency.min(MAX_PROFICIENCY),
            uses: 0,
        }
    }

    /// Count one use. Only a hit moves proficiency. Returns the gain.
    pub fn record_use(&mut self, hit: bool) -> u8 {
        self.uses = self.uses.saturating_add(1);
        if !hit {
            return 0;
        }
        let gain = proficiency_gain(self.proficiency);
        self.proficiency = (self.proficiency + gain).min(MAX_PROFICIENCY);
        gain
    }
}

/// Gain for one successful use: a twentieth of the remaining gap, rounded up.
/// Always at least 1 below the cap, 0 at the cap.
pub fn proficiency_gain(current: u8) -> u8 {
    MAX_PROFICIENCY.saturating_sub(current).div_ceil(20)
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub name: String,
    pub role: Role,
    pub vitals: Vitals,
    pub room_id: String,
    pub spellbook: BTreeMap<String, ProficiencyRecord>,
    /// ability id -> world ms at which it becomes usable again.
    pub cooldowns: HashMap<String, u64>,
}

impl Actor {
    pub fn new(name: &str, room_id: &str, vitals: Vitals) -> Self {
        Self {
            name: name.to_string(),
            role: Role::Player,
            vitals,
            room_id: room_id.to_string(),
            spellbook: BTreeMap::new(),
            cooldowns: HashMap::new(),
        }
    }

    pub fn key(&self) -> String {
        actor_key(&self.name)
    }

    pub fn knows(&self, ability_id: &str) -> bool {
        self.spellbook.contains_key(ability_id)
    }

    pub fn proficiency(&self, ability_id: &str) -> u8 {
        self.spellbook
            .get(ability_id)
            .map(|r| r.proficiency)
            .unwrap_or(0)
    }

    /// Add a spellbook entry. False (and no change) if it already exists.
    pub fn learn(&mut self, ability_id: &str, proficiency: u8) -> bool {
        if self.knows(ability_id) {
            return false;
        }
        self.spellbook
            .insert(ability_id.to_string(), ProficiencyRecord::starting_at(proficiency));
        true
    }

    pub fn cooldown_remaining(&self, ability_id: &str, now_ms: u64) -> Option<u64> {
        let until = *self.cooldowns.get(ability_id)?;
        (until > now_ms).then(|| until - now_ms)
    }

    pub fn start_cooldown(&mut self, ability_id: &str, now_ms: u64, dur_ms: u64) {
        if dur_ms == 0 {
            self.cooldowns.remove(ability_id);
            return;
        }
        self.cooldowns
            .insert(ability_id.to_string(), now_ms.saturating_add(dur_ms));
    }

    pub fn prune_cooldowns(&mut self, now_ms: u64) {
        self.cooldowns.retain(|_, until| *until > now_ms);
    }
}

/// Canonical lookup key for an actor name.
pub fn actor_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let n = name.trim();
    if n.len() < NAME_MIN_LEN || n.len() > NAME_MAX_LEN {
        return Err(format!(
            "names are {NAME_MIN_LEN}-{NAME_MAX_LEN} characters"
        ));
    }
    if !n.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err("names are letters and digits only".to_string());
    }
    if !n.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err("names start with a letter".to_string());
    }
    Ok(())
}

/// Starting vitals and spellbook for a brand new actor.
#[derive(Debug, Clone, Copy)]
pub struct StarterKit {
    pub id: &'static str,
    pub hp: i32,
    pub mana: i32,
    pub moves: i32,
    pub abilities: &'static [(&'static str, u8)],
}

static STARTER_KITS: [StarterKit; 3] = [
    StarterKit {
        id: "scholar",
        hp: 100,
        mana: 150,
        moves: 100,
        abilities: &[("arcane_bolt", 30)],
    },
    StarterKit {
        id: "warrior",
        hp: 150,
        mana: 50,
        moves: 120,
        abilities: &[("slash", 10)],
    },
    StarterKit {
        id: "wanderer",
        hp: 125,
        mana: 100,
        moves: 110,
        abilities: &[("arcane_bolt", 20), ("slash", 5)],
    },
];

impl StarterKit {
    pub fn find(id: &str) -> Option<&'static StarterKit> {
        STARTER_KITS
            .iter()
            .find(|k| k.id.eq_ignore_ascii_case(id.trim()))
    }

    pub fn default_kit() -> &'static StarterKit {
        &STARTER_KITS[2]
    }

    pub fn ids() -> impl Iterator<Item = &'static str> {
        STARTER_KITS.iter().map(|k| k.id)
    }

    pub fn outfit(&self, name: &str, room_id: &str) -> Actor {
        let mut a = Actor::new(name, room_id, Vitals::full(self.hp, self.mana, self.moves));
        for (id, p) in self.abilities {
            a.learn(id, *p);
        }
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_clamps_both_ends() {
        let mut p = Pool::new(250, 100);
        assert_eq!(p.cur, 100);
        assert_eq!(p.drain(130), 0);
        assert_eq!(p.restore(30), 30);
        assert_eq!(p.restore(500), 70);
        assert_eq!(p.cur, 100);
        assert_eq!(Pool::new(-4, 10).cur, 0);
    }

    #[test]
    fn gain_shrinks_toward_the_cap() {
        assert_eq!(proficiency_gain(0), 5);
        assert_eq!(proficiency_gain(30), 4);
        assert_eq!(proficiency_gain(99), 1);
        assert_eq!(proficiency_gain(100), 0);

        let mut r = ProficiencyRecord::starting_at(98);
        assert_eq!(r.record_use(true), 1);
        assert_eq!(r.record_use(true), 1);
        assert_eq!(r.record_use(true), 0);
        assert_eq!(r.proficiency, 100);
        assert_eq!(r.uses, 3);
    }

    #[test]
    fn misses_count_uses_but_not_proficiency() {
        let mut r = ProficiencyRecord::starting_at(STUDY_BASELINE);
        assert_eq!(r.record_use(false), 0);
        assert_eq!(r.proficiency, 30);
        assert_eq!(r.uses, 1);
    }

    #[test]
    fn learn_refuses_duplicates() {
        let mut a = Actor::new("Vex", "r", Vitals::full(10, 10, 10));
        assert!(a.learn("fireball", STUDY_BASELINE));
        a.spellbook.get_mut("fireball").unwrap().proficiency = 55;
        assert!(!a.learn("fireball", STUDY_BASELINE));
        assert_eq!(a.proficiency("fireball"), 55);
    }

    #[test]
    fn cooldowns_expire_by_world_time() {
        let mut a = Actor::new("Vex", "r", Vitals::full(10, 10, 10));
        a.start_cooldown("slash", 1_000, 2_000);
        assert_eq!(a.cooldown_remaining("slash", 1_500), Some(1_500));
        assert_eq!(a.cooldown_remaining("slash", 3_000), None);
        a.prune_cooldowns(3_000);
        assert!(a.cooldowns.is_empty());
    }

    #[test]
    fn names_are_checked() {
        assert!(validate_name("Vex").is_ok());
        assert!(validate_name("ab").is_err());
        assert!(validate_name("9lives").is_err());
        assert!(validate_name("bad name").is_err());
        assert_eq!(actor_key("  Vex "), "vex");
    }

    #[test]
    fn kits_outfit_new_actors() {
        let kit = StarterKit::find("Scholar").unwrap();
        let a = kit.outfit("Mira", "hollow.square");
        assert_eq!(a.vitals.mana, Pool::full(150));
        assert_eq!(a.proficiency("arcane_bolt"), 30);
        assert_eq!(a.role, Role::Player);
        assert!(StarterKit::find("pirate").is_none());
    }
}
