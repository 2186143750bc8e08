use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::abilities::Catalog;
use crate::actor::{Actor, actor_key};
use crate::error::CommandError;
use crate::items::ItemInstance;
use crate::mobs::{MobInstance, MobTemplate};
use crate::rng::Roll;
use crate::rooms::Rooms;

/// Mutable contents of one room.
#[derive(Debug, Default)]
pub struct RoomState {
    /// Actor keys present.
    pub actors: BTreeSet<String>,
    pub items: Vec<ItemInstance>,
    pub mobs: Vec<MobInstance>,
}

/// All live state. Owned by exactly one task; every command runs to completion against it
/// before the next one starts.
pub struct World {
    rooms: Rooms,
    state: HashMap<String, RoomState>,
    actors: HashMap<String, Actor>,
    catalog: Catalog,
    rng: Box<dyn Roll>,
    now_ms: u64,
    next_instance_id: u64,
}

impl World {
    pub fn new(rooms: Rooms, catalog: Catalog, rng: Box<dyn Roll>) -> Self {
        let mut w = Self {
            rooms,
            state: HashMap::new(),
            actors: HashMap::new(),
            catalog,
            rng,
            now_ms: 0,
            next_instance_id: 1,
        };
        w.populate();
        w
    }

    fn populate(&mut self) {
        let seeds = self
            .rooms
            .iter()
            .map(|(id, r)| (id.clone(), r.items.clone(), r.mobs.clone()))
            .collect::<Vec<_>>();
        for (room_id, items, mobs) in seeds {
            let mut st = RoomState::default();
            for template in items {
                let id = self.alloc_id();
                st.items.push(ItemInstance { id, template });
            }
            for m in mobs {
                let id = self.alloc_id();
                st.mobs.push(MobInstance::spawn(id, m.template, m.level));
            }
            self.state.insert(room_id, st);
        }
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        id
    }

    pub fn rooms(&self) -> &Rooms {
        &self.rooms
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rng(&mut self) -> &mut dyn Roll {
        self.rng.as_mut()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// World time only moves forward.
    pub fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    pub fn room_state(&self, room_id: &str) -> Option<&RoomState> {
        self.state.get(room_id)
    }

    // Actors

    pub fn actor(&self, key: &str) -> Option<&Actor> {
        self.actors.get(key)
    }

    pub fn actor_mut(&mut self, key: &str) -> Option<&mut Actor> {
        self.actors.get_mut(key)
    }

    /// Place an actor in the world. Unknown rooms fall back to the start room.
    /// Returns the key, or hands the actor back if the name is already live.
    pub fn add_actor(&mut self, mut actor: Actor) -> Result<String, Actor> {
        let key = actor.key();
        if self.actors.contains_key(&key) {
            return Err(actor);
        }
        if !self.rooms.has_room(&actor.room_id) {
            debug!(actor = %actor.name, room = %actor.room_id, "unknown saved room; using start room");
            actor.room_id = self.rooms.start_room().to_string();
        }
        self.state
            .entry(actor.room_id.clone())
            .or_default()
            .actors
            .insert(key.clone());
        self.actors.insert(key.clone(), actor);
        Ok(key)
    }

    pub fn remove_actor(&mut self, key: &str) -> Option<Actor> {
        let a = self.actors.remove(key)?;
        if let Some(st) = self.state.get_mut(&a.room_id) {
            st.actors.remove(key);
        }
        Some(a)
    }

    /// Move an actor between rooms. Returns the room it left.
    pub fn move_actor(&mut self, key: &str, to: &str) -> Result<String, CommandError> {
        if !self.rooms.has_room(to) {
            return Err(CommandError::NotFound(format!("no such room: {to}")));
        }
        let a = self
            .actors
            .get_mut(key)
            .ok_or_else(|| CommandError::NotFound(format!("no actor named {key}")))?;
        let from = std::mem::replace(&mut a.room_id, to.to_string());
        if let Some(st) = self.state.get_mut(&from) {
            st.actors.remove(key);
        }
        self.state
            .entry(to.to_string())
            .or_default()
            .actors
            .insert(key.to_string());
        Ok(from)
    }

    pub fn actor_keys_in_room(&self, room_id: &str) -> Vec<String> {
        self.state
            .get(room_id)
            .map(|st| st.actors.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolve a name token against the actors in a room. Exact key first, then prefix.
    pub fn find_actor_in_room(&self, room_id: &str, token: &str) -> Option<String> {
        let t = actor_key(token);
        if t.is_empty() {
            return None;
        }
        let st = self.state.get(room_id)?;
        if st.actors.contains(&t) {
            return Some(t);
        }
        st.actors.iter().find(|k| k.starts_with(&t)).cloned()
    }

    // Mobs

    pub fn find_mob(&self, room_id: &str, token: &str) -> Option<u64> {
        let st = self.state.get(room_id)?;
        st.mobs
            .iter()
            .find(|m| m.is_alive() && m.template.matches_token(token))
            .map(|m| m.id)
    }

    pub fn mob(&self, room_id: &str, mob_id: u64) -> Option<&MobInstance> {
        self.state.get(room_id)?.mobs.iter().find(|m| m.id == mob_id)
    }

    pub fn mob_mut(&mut self, room_id: &str, mob_id: u64) -> Option<&mut MobInstance> {
        self.state
            .get_mut(room_id)?
            .mobs
            .iter_mut()
            .find(|m| m.id == mob_id)
    }

    /// Remove a mob by instance id. Removing one that is already gone is a no-op.
    pub fn remove_mob(&mut self, room_id: &str, mob_id: u64) -> Option<MobInstance> {
        let st = self.state.get_mut(room_id)?;
        let idx = st.mobs.iter().position(|m| m.id == mob_id)?;
        Some(st.mobs.remove(idx))
    }

    pub fn spawn_mob(
        &mut self,
        room_id: &str,
        template: &'static MobTemplate,
        level: u32,
    ) -> Result<MobInstance, CommandError> {
        if !self.rooms.has_room(room_id) {
            return Err(CommandError::NotFound(format!("no such room: {room_id}")));
        }
        let id = self.alloc_id();
        let m = MobInstance::spawn(id, template, level);
        self.state.entry(room_id.to_string()).or_default().mobs.push(m);
        Ok(m)
    }

    // Items

    pub fn find_item(&self, room_id: &str, token: &str) -> Option<u64> {
        let st = self.state.get(room_id)?;
        st.items
            .iter()
            .find(|i| i.template.matches_token(token))
            .map(|i| i.id)
    }

    pub fn item(&self, room_id: &str, item_id: u64) -> Option<&ItemInstance> {
        self.state.get(room_id)?.items.iter().find(|i| i.id == item_id)
    }

    /// Take an item out of a room. `None` if someone got there first.
    pub fn take_item(&mut self, room_id: &str, item_id: u64) -> Option<ItemInstance> {
        let st = self.state.get_mut(room_id)?;
        let idx = st.items.iter().position(|i| i.id == item_id)?;
        Some(st.items.remove(idx))
    }

    pub fn render_room(&self, room_id: &str, viewer_key: &str) -> String {
        let Some(room) = self.rooms.get(room_id) else {
            return "room not found\r\n".to_string();
        };
        let mut s = format!(
            "== {} ({}) ==\r\n",
            room.name,
            self.rooms.zone_name()
        );
        if !room.description.is_empty() {
            for line in room.description.lines() {
                s.push_str(line);
                s.push_str("\r\n");
            }
        }
        s.push_str(&self.rooms.render_exits(room_id));
        if let Some(st) = self.state.get(room_id) {
            for i in &st.items {
                s.push_str(&format!("  {} lies here.\r\n", i.name()));
            }
            for m in &st.mobs {
                let lvl = if m.level > 1 {
                    format!(" [lvl {}]", m.level)
                } else {
                    String::new()
                };
                s.push_str(&format!(
                    "  {} is here{} ({}/{} hp).\r\n",
                    capitalize(m.name()),
                    lvl,
                    m.hp,
                    m.max_hp
                ));
            }
            for k in st.actors.iter().filter(|k| k.as_str() != viewer_key) {
                if let Some(a) = self.actors.get(k) {
                    s.push_str(&format!("  {} is here.\r\n", a.name));
                }
            }
        }
        s
    }

    /// `look <thing>`: a mob, item, or actor in the room, in that order.
    pub fn describe(&self, room_id: &str, token: &str) -> Option<String> {
        let st = self.state.get(room_id)?;
        if let Some(m) = self.find_mob(room_id, token).and_then(|id| self.mob(room_id, id)) {
            let mut s = format!("{}\r\n", capitalize(m.name()));
            s.push_str(&format!("{}\r\n", m.template.description));
            s.push_str(&format!("It has {}/{} hp.\r\n", m.hp, m.max_hp));
            if let Some(id) = m.template.trainer {
                if let Some(def) = self.catalog.get(id) {
                    s.push_str(&format!("It offers to teach {}.\r\n", def.display));
                }
            }
            return Some(s);
        }
        if let Some(i) = st.items.iter().find(|i| i.template.matches_token(token)) {
            let mut s = format!("{}\r\n{}\r\n", capitalize(i.name()), i.template.description);
            if let Some(def) = i.template.grants.and_then(|id| self.catalog.get(id)) {
                s.push_str(&format!("You could study it to learn {}.\r\n", def.display));
            }
            return Some(s);
        }
        let a = self
            .find_actor_in_room(room_id, token)
            .and_then(|k| self.actors.get(&k))?;
        Some(format!(
            "{} the {}\r\n{}\r\n",
            a.name,
            a.role.as_str(),
            if a.vitals.hp.cur < a.vitals.hp.max {
                "They look a little worse for wear."
            } else {
                "They look to be in fine shape."
            }
        ))
    }
}

pub fn capitalize(s: &str) -> String {
    let mut cs = s.chars();
    match cs.next() {
        Some(c) => c.to_uppercase().chain(cs).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::rng::ScriptedRoll;

    pub(crate) const AREA: &str = r#"
zone_id: test
zone_name: Test Zone
start_room: t.hall
rooms:
  - id: t.hall
    name: Hall
    desc: A bare hall.
    exits:
      - { dir: north, to: t.den }
    items: [wand_of_fireball, rusty_bucket, training_lectern]
  - id: t.den
    name: Den
    exits:
      - { dir: south, to: t.hall }
    mobs:
      - { template: goblin }
      - { template: training_dummy }
      - { template: drillmaster }
"#;

    pub(crate) fn world_with(rolls: &[i32]) -> World {
        let rooms = Rooms::from_yaml_str("test", AREA).expect("test area");
        World::new(rooms, Catalog::builtin(), Box::new(ScriptedRoll::new(rolls)))
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::world_with;
    use crate::actor::{Actor, Vitals};

    #[test]
    fn populate_places_items_and_mobs() {
        let w = world_with(&[]);
        let hall = w.room_state("t.hall").unwrap();
        assert_eq!(hall.items.len(), 3);
        let den = w.room_state("t.den").unwrap();
        assert_eq!(den.mobs.len(), 3);
        assert!(w.find_mob("t.den", "gob").is_some());
        assert!(w.find_mob("t.hall", "gob").is_none());
    }

    #[test]
    fn remove_mob_is_idempotent() {
        let mut w = world_with(&[]);
        let id = w.find_mob("t.den", "goblin").unwrap();
        assert!(w.remove_mob("t.den", id).is_some());
        assert!(w.remove_mob("t.den", id).is_none());
        assert!(w.find_mob("t.den", "goblin").is_none());
    }

    #[test]
    fn take_item_only_once() {
        let mut w = world_with(&[]);
        let id = w.find_item("t.hall", "wand").unwrap();
        assert!(w.take_item("t.hall", id).is_some());
        assert!(w.take_item("t.hall", id).is_none());
        assert!(w.find_item("t.hall", "wand").is_none());
    }

    #[test]
    fn actors_move_and_show_up_in_look() {
        let mut w = world_with(&[]);
        let vex = w
            .add_actor(Actor::new("Vex", "nowhere", Vitals::full(10, 10, 10)))
            .unwrap();
        assert_eq!(w.actor(&vex).unwrap().room_id, "t.hall");
        w.add_actor(Actor::new("Mira", "t.hall", Vitals::full(10, 10, 10)))
            .unwrap();
        assert!(w.add_actor(Actor::new("VEX", "t.hall", Vitals::full(1, 1, 1))).is_err());

        let look = w.render_room("t.hall", "vex");
        assert!(look.contains("Mira is here."));
        assert!(!look.contains("Vex is here."));
        assert!(look.contains("wand of fireball lies here."));

        assert_eq!(w.move_actor("vex", "t.den").unwrap(), "t.hall");
        assert_eq!(w.actor_keys_in_room("t.den"), vec!["vex".to_string()]);
        assert_eq!(w.find_actor_in_room("t.hall", "mi").as_deref(), Some("mira"));
        assert!(w.move_actor("vex", "t.void").is_err());
    }

    #[test]
    fn look_at_things_shows_their_descriptions() {
        let mut w = world_with(&[]);
        w.add_actor(Actor::new("Mira", "t.den", Vitals::full(10, 10, 10)))
            .unwrap();
        let gob = w.describe("t.den", "goblin").unwrap();
        assert!(gob.starts_with("A goblin\r\n"));
        assert!(gob.contains("10/10 hp"));
        assert!(w.describe("t.den", "drillmaster").unwrap().contains("teach Power Attack"));
        assert!(w.describe("t.hall", "wand").unwrap().contains("learn Fireball"));
        assert!(w.describe("t.den", "mira").unwrap().starts_with("Mira the player"));
        assert!(w.describe("t.hall", "goblin").is_none());
    }

    #[test]
    fn time_never_runs_backwards() {
        let mut w = world_with(&[]);
        w.advance_to(500);
        w.advance_to(100);
        assert_eq!(w.now_ms(), 500);
    }
}
