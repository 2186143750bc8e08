use crate::actor::Actor;
use crate::mobs::MobInstance;
use crate::world::capitalize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterattack {
    pub mob_name: &'static str,
    pub damage: i32,
    pub hp_left: i32,
    /// The blow took the attacker to 0 hp.
    pub downed: bool,
}

impl Counterattack {
    pub fn line_for_attacker(&self, max_hp: i32) -> String {
        format!(
            "{} strikes back at you for {} damage. ({}/{} hp)",
            capitalize(self.mob_name),
            self.damage,
            self.hp_left,
            max_hp
        )
    }

    pub fn line_for_room(&self, attacker: &str) -> String {
        format!(
            "* {} strikes back at {} for {} damage.",
            capitalize(self.mob_name),
            attacker,
            self.damage
        )
    }
}

/// A surviving hostile mob hits back at whoever just used an ability on it.
/// Non-hostile and dead mobs never react.
pub fn counterattack(mob: &MobInstance, attacker: &mut Actor) -> Option<Counterattack> {
    if !mob.template.hostile || !mob.is_alive() {
        return None;
    }
    let damage = mob.template.counter.damage_at(mob.level);
    let hp_left = attacker.vitals.hp.drain(damage);
    Some(Counterattack {
        mob_name: mob.name(),
        damage,
        hp_left,
        downed: hp_left == 0,
    })
}
