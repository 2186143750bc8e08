//! Ability resolution: precondition checks, the roll, and every resulting mutation, applied
//! as one unit against the world.

use tracing::debug;

use crate::abilities::{AbilityDef, AbilityKind};
use crate::actor::{Actor, ProficiencyRecord};
use crate::error::CommandError;
use crate::reaction::{self, Counterattack};
use crate::world::{World, capitalize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Mob(u64),
    Actor(String),
}

#[derive(Debug, Clone)]
pub struct ExecReport {
    pub ability_id: &'static str,
    pub room: String,
    pub hit: bool,
    pub amount: i32,
    pub killed: bool,
    pub proficiency: u8,
    pub gained: u8,
    pub counter: Option<Counterattack>,
    /// (room left, room woken in) when the counterattack put the actor down.
    pub knocked_out: Option<(String, String)>,
    /// Narration for the acting actor.
    pub actor_lines: Vec<String>,
    /// Narration for everyone else in `room`.
    pub room_lines: Vec<String>,
}

/// Resolve `cast <words>` to a spell the actor can use plus the leftover target text.
pub fn resolve_cast(
    world: &World,
    actor_key: &str,
    args: &str,
) -> Result<(&'static str, Option<String>), CommandError> {
    let words = args.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return Err(CommandError::Usage("cast <spell> [target]"));
    }
    let actor = actor_ref(world, actor_key)?;
    let usable = |d: &AbilityDef| d.kind == AbilityKind::Spell && (d.innate || actor.knows(d.id));
    if let Some((d, rest)) = world.catalog().longest_prefix(&words, true, usable) {
        let target = (!rest.is_empty()).then(|| rest.join(" "));
        return Ok((d.id, target));
    }

    // Name the spell if it exists at all, so "you don't know Fireball" reads right.
    let any_spell = |d: &AbilityDef| d.kind == AbilityKind::Spell;
    let name = world
        .catalog()
        .longest_prefix(&words, true, any_spell)
        .map(|(d, _)| d.display.to_string())
        .unwrap_or_else(|| words[0].to_string());
    Err(CommandError::UnknownAbility(name))
}

/// Use an ability. Every precondition is checked before anything changes; a failed
/// check leaves the world untouched.
pub fn execute(
    world: &mut World,
    actor_key: &str,
    ability_id: &str,
    target: Option<&str>,
) -> Result<ExecReport, CommandError> {
    let def = *world
        .catalog()
        .get(ability_id)
        .ok_or_else(|| CommandError::UnknownAbility(ability_id.to_string()))?;
    let now = world.now_ms();
    let actor = actor_ref(world, actor_key)?;

    if !def.innate && !actor.knows(def.id) {
        return Err(CommandError::UnknownAbility(def.display.to_string()));
    }
    if let Some(remaining_ms) = actor.cooldown_remaining(def.id, now) {
        return Err(CommandError::OnCooldown {
            ability: def.display.to_string(),
            remaining_ms,
        });
    }
    let pool = actor.vitals.pool(def.resource());
    if pool.cur < def.cost {
        return Err(CommandError::InsufficientResource {
            resource: def.resource().as_str(),
            need: def.cost,
            have: pool.cur,
        });
    }
    let room = actor.room_id.clone();
    let actor_name = actor.name.clone();
    let prof = actor.proficiency(def.id);
    let target = resolve_target(world, &room, actor_key, &def, target)?;

    // Committed from here on.
    let hit_pct = def.curve.hit_pct(prof);
    let hit = world.rng().chance(hit_pct);
    let amount = if hit {
        def.roll_amount(prof, world.rng())
    } else {
        0
    };

    let a = actor_mut(world, actor_key)?;
    a.vitals.pool_mut(def.resource()).drain(def.cost);
    a.start_cooldown(def.id, now, def.cooldown_ms);
    let rec = a
        .spellbook
        .entry(def.id.to_string())
        .or_insert(ProficiencyRecord::starting_at(0));
    let gained = rec.record_use(hit);
    let proficiency = rec.proficiency;

    debug!(
        actor = %actor_name,
        ability = def.id,
        hit,
        amount,
        hit_pct,
        proficiency,
        "ability used"
    );

    let mut report = ExecReport {
        ability_id: def.id,
        room: room.clone(),
        hit,
        amount,
        killed: false,
        proficiency,
        gained,
        counter: None,
        knocked_out: None,
        actor_lines: Vec::new(),
        room_lines: Vec::new(),
    };

    // resolve_target only yields mobs for damage and actors for heals.
    match target {
        Target::Mob(mob_id) => {
            damage_mob(world, actor_key, &actor_name, &def, mob_id, &mut report)?;
        }
        Target::Actor(k) => {
            heal_actor(world, actor_key, &actor_name, &def, &k, &mut report)?;
        }
    }

    if gained > 0 {
        report.actor_lines.push(format!(
            "You feel more practiced with {}. ({}%)",
            def.display, proficiency
        ));
    }
    Ok(report)
}

fn damage_mob(
    world: &mut World,
    actor_key: &str,
    actor_name: &str,
    def: &AbilityDef,
    mob_id: u64,
    report: &mut ExecReport,
) -> Result<(), CommandError> {
    let room = report.room.clone();
    let mob = world
        .mob_mut(&room, mob_id)
        .ok_or_else(|| CommandError::InvalidTarget(mob_id.to_string()))?;
    let mob_name = mob.name();

    if report.hit {
        let left = mob.take_damage(report.amount);
        let max_hp = mob.max_hp;
        report.actor_lines.push(format!(
            "Your {} hits {} for {} damage. ({}/{} hp)",
            def.display, mob_name, report.amount, left, max_hp
        ));
        report.room_lines.push(format!(
            "* {} {} {} for {} damage.",
            actor_name, def.verb, mob_name, report.amount
        ));
    } else {
        report
            .actor_lines
            .push(format!("Your {} misses {}.", def.display, mob_name));
        report.room_lines.push(format!(
            "* {}'s {} misses {}.",
            actor_name,
            def.display.to_ascii_lowercase(),
            mob_name
        ));
    }

    let snapshot = *mob;
    if !snapshot.is_alive() {
        world.remove_mob(&room, mob_id);
        report.killed = true;
        let line = format!("* {} collapses and dies.", capitalize(mob_name));
        report.actor_lines.push(line.clone());
        report.room_lines.push(line);
        return Ok(());
    }

    let a = actor_mut(world, actor_key)?;
    let Some(counter) = reaction::counterattack(&snapshot, a) else {
        return Ok(());
    };
    report
        .actor_lines
        .push(counter.line_for_attacker(a.vitals.hp.max));
    report.room_lines.push(counter.line_for_room(actor_name));
    if counter.downed {
        knock_out(world, actor_key, actor_name, report)?;
    }
    report.counter = Some(counter);
    Ok(())
}

fn heal_actor(
    world: &mut World,
    actor_key: &str,
    actor_name: &str,
    def: &AbilityDef,
    target_key: &str,
    report: &mut ExecReport,
) -> Result<(), CommandError> {
    let target = actor_mut(world, target_key)?;
    let target_name = target.name.clone();
    let self_target = target_key == actor_key;
    if !report.hit {
        report
            .actor_lines
            .push(format!("Your {} fizzles.", def.display));
        report.room_lines.push(format!(
            "* {}'s {} fizzles.",
            actor_name,
            def.display.to_ascii_lowercase()
        ));
        return Ok(());
    }

    let restored = target.vitals.hp.restore(report.amount);
    let (cur, max) = (target.vitals.hp.cur, target.vitals.hp.max);
    report.amount = restored;
    if self_target {
        report.actor_lines.push(format!(
            "Your {} restores {} hp. ({}/{} hp)",
            def.display, restored, cur, max
        ));
        report
            .room_lines
            .push(format!("* {} {} themself.", actor_name, def.verb));
    } else {
        report.actor_lines.push(format!(
            "Your {} restores {} hp to {}. ({}/{} hp)",
            def.display, restored, target_name, cur, max
        ));
        report.room_lines.push(format!(
            "* {} {} {} (+{} hp).",
            actor_name, def.verb, target_name, restored
        ));
    }
    Ok(())
}

/// 0 hp sends an actor back to the start room, patched up.
fn knock_out(
    world: &mut World,
    actor_key: &str,
    actor_name: &str,
    report: &mut ExecReport,
) -> Result<(), CommandError> {
    let start = world.rooms().start_room().to_string();
    let from = world.move_actor(actor_key, &start)?;
    let a = actor_mut(world, actor_key)?;
    a.vitals.hp.refill();
    report
        .actor_lines
        .push("You black out...".to_string());
    report.actor_lines.push(format!(
        "You come to in {}, bruised but whole.",
        world
            .rooms()
            .get(&start)
            .map(|r| r.name.as_str())
            .unwrap_or("a familiar place")
    ));
    report.room_lines.push(format!("* {actor_name} crumples to the ground and is gone."));
    report.knocked_out = Some((from, start));
    Ok(())
}

fn resolve_target(
    world: &World,
    room: &str,
    actor_key: &str,
    def: &AbilityDef,
    token: Option<&str>,
) -> Result<Target, CommandError> {
    let token = token.map(str::trim).filter(|t| !t.is_empty());
    if def.requires_target() {
        let Some(t) = token else {
            return Err(CommandError::MissingTarget(def.display.to_string()));
        };
        // Actors are never valid damage targets.
        return world
            .find_mob(room, t)
            .map(Target::Mob)
            .ok_or_else(|| CommandError::InvalidTarget(t.to_string()));
    }
    let Some(t) = token else {
        return Ok(Target::Actor(actor_key.to_string()));
    };
    if matches!(t.to_ascii_lowercase().as_str(), "self" | "me") {
        return Ok(Target::Actor(actor_key.to_string()));
    }
    world
        .find_actor_in_room(room, t)
        .map(Target::Actor)
        .ok_or_else(|| CommandError::InvalidTarget(t.to_string()))
}

fn actor_ref<'w>(world: &'w World, key: &str) -> Result<&'w Actor, CommandError> {
    world
        .actor(key)
        .ok_or_else(|| CommandError::NotFound(format!("no actor named {key}")))
}

fn actor_mut<'w>(world: &'w mut World, key: &str) -> Result<&'w mut Actor, CommandError> {
    world
        .actor_mut(key)
        .ok_or_else(|| CommandError::NotFound(format!("no actor named {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, STUDY_BASELINE, Vitals};
    use crate::world::testutil::world_with;

    fn join(world: &mut World, name: &str, room: &str, book: &[(&str, u8)]) -> String {
        let mut a = Actor::new(name, room, Vitals::full(100, 50, 50));
        for (id, p) in book {
            a.learn(id, *p);
        }
        world.add_actor(a).unwrap()
    }

    #[test]
    fn unknown_ability_changes_nothing() {
        let mut w = world_with(&[]);
        let k = join(&mut w, "Vex", "t.den", &[]);
        let err = execute(&mut w, &k, "fireball", Some("goblin")).unwrap_err();
        assert_eq!(err, CommandError::UnknownAbility("Fireball".to_string()));
        let a = w.actor(&k).unwrap();
        assert_eq!(a.vitals.mana.cur, 50);
        assert!(a.cooldowns.is_empty());
    }

    #[test]
    fn resolve_cast_uses_only_known_spells() {
        let mut w = world_with(&[]);
        let k = join(&mut w, "Vex", "t.den", &[("fireball", STUDY_BASELINE)]);
        let (id, target) = resolve_cast(&w, &k, "fire gob").unwrap();
        assert_eq!(id, "fireball");
        assert_eq!(target.as_deref(), Some("gob"));

        let err = resolve_cast(&w, &k, "frost lance goblin").unwrap_err();
        assert_eq!(err, CommandError::UnknownAbility("Frost Lance".to_string()));
        assert!(matches!(
            resolve_cast(&w, &k, "  "),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn two_slashes_kill_a_ten_hp_goblin() {
        // chance roll, damage roll, per use.
        let mut w = world_with(&[1, 6, 1, 6]);
        let k = join(&mut w, "Vex", "t.den", &[("slash", 0)]);

        let r1 = execute(&mut w, &k, "slash", Some("goblin")).unwrap();
        assert!(r1.hit);
        assert_eq!(r1.amount, 6);
        assert!(!r1.killed);
        let c = r1.counter.as_ref().unwrap();
        assert_eq!(c.damage, 2);
        assert_eq!(w.actor(&k).unwrap().vitals.hp.cur, 98);

        w.advance_to(2_000);
        let r2 = execute(&mut w, &k, "slash", Some("goblin")).unwrap();
        assert!(r2.killed);
        assert!(r2.counter.is_none());
        assert!(w.find_mob("t.den", "goblin").is_none());
        assert!(r2.room_lines.iter().any(|l| l.contains("dies")));

        let a = w.actor(&k).unwrap();
        assert_eq!(a.spellbook["slash"].uses, 2);
        // 0 -> 5 -> 10
        assert_eq!(a.spellbook["slash"].proficiency, 10);
        assert_eq!(a.vitals.moves.cur, 44);
    }

    #[test]
    fn cooldown_blocks_until_expiry() {
        let mut w = world_with(&[]);
        let k = join(&mut w, "Vex", "t.den", &[("slash", 10)]);
        execute(&mut w, &k, "slash", Some("dummy")).unwrap();
        let after_first = w.actor(&k).unwrap().vitals.moves.cur;
        let uses_after_first = w.actor(&k).unwrap().spellbook["slash"].uses;
        w.advance_to(500);
        let err = execute(&mut w, &k, "slash", Some("dummy")).unwrap_err();
        assert_eq!(
            err,
            CommandError::OnCooldown {
                ability: "Slash".to_string(),
                remaining_ms: 1_500
            }
        );
        // The rejected use charged nothing and counted for nothing.
        let a = w.actor(&k).unwrap();
        assert_eq!(a.vitals.moves.cur, after_first);
        assert_eq!(a.spellbook["slash"].uses, uses_after_first);

        w.advance_to(2_000);
        execute(&mut w, &k, "slash", Some("dummy")).unwrap();
        assert_eq!(w.actor(&k).unwrap().vitals.moves.cur, after_first - 3);
    }

    #[test]
    fn exact_resource_is_enough_and_one_short_is_not() {
        let mut w = world_with(&[]);
        let k = join(&mut w, "Vex", "t.den", &[("fireball", STUDY_BASELINE)]);
        w.actor_mut(&k).unwrap().vitals.mana.cur = 14;
        let err = execute(&mut w, &k, "fireball", Some("dummy")).unwrap_err();
        assert_eq!(
            err,
            CommandError::InsufficientResource {
                resource: "mana",
                need: 15,
                have: 14
            }
        );
        assert!(w.actor(&k).unwrap().cooldowns.is_empty());

        w.actor_mut(&k).unwrap().vitals.mana.cur = 15;
        execute(&mut w, &k, "fireball", Some("dummy")).unwrap();
        assert_eq!(w.actor(&k).unwrap().vitals.mana.cur, 0);
    }

    #[test]
    fn bad_or_missing_target_costs_nothing() {
        let mut w = world_with(&[]);
        let k = join(&mut w, "Vex", "t.den", &[("slash", 10)]);
        join(&mut w, "Mira", "t.den", &[]);

        for t in [Some("dragon"), Some("mira"), None] {
            let err = execute(&mut w, &k, "slash", t).unwrap_err();
            assert!(matches!(
                err,
                CommandError::InvalidTarget(_) | CommandError::MissingTarget(_)
            ));
        }
        let a = w.actor(&k).unwrap();
        assert_eq!(a.vitals.moves.cur, 50);
        assert!(a.cooldowns.is_empty());
        assert_eq!(a.spellbook["slash"].uses, 0);
    }

    #[test]
    fn miss_costs_and_counts_but_does_not_teach() {
        let mut w = world_with(&[100]);
        let k = join(&mut w, "Vex", "t.den", &[("slash", 40)]);
        let r = execute(&mut w, &k, "slash", Some("dummy")).unwrap();
        assert!(!r.hit);
        assert_eq!(r.gained, 0);
        let a = w.actor(&k).unwrap();
        assert_eq!(a.spellbook["slash"].proficiency, 40);
        assert_eq!(a.spellbook["slash"].uses, 1);
        assert_eq!(a.vitals.moves.cur, 47);
        assert!(a.cooldown_remaining("slash", w.now_ms()).is_some());
        assert_eq!(w.mob(&r.room, w.find_mob("t.den", "dummy").unwrap()).unwrap().hp, 10);
    }

    #[test]
    fn innate_kick_needs_no_spellbook_entry() {
        let mut w = world_with(&[]);
        let k = join(&mut w, "Vex", "t.den", &[]);
        let r = execute(&mut w, &k, "kick", Some("dummy")).unwrap();
        assert!(r.hit);
        assert_eq!(w.actor(&k).unwrap().spellbook["kick"].uses, 1);
    }

    #[test]
    fn lethal_counterattack_sends_actor_home() {
        let mut w = world_with(&[]);
        let k = join(&mut w, "Vex", "t.den", &[]);
        w.actor_mut(&k).unwrap().vitals.hp.cur = 2;
        let r = execute(&mut w, &k, "kick", Some("goblin")).unwrap();
        assert!(r.counter.as_ref().unwrap().downed);
        assert_eq!(
            r.knocked_out,
            Some(("t.den".to_string(), "t.hall".to_string()))
        );
        let a = w.actor(&k).unwrap();
        assert_eq!(a.room_id, "t.hall");
        assert_eq!(a.vitals.hp.cur, a.vitals.hp.max);
    }

    #[test]
    fn mend_heals_self_by_default_and_clamps() {
        let mut w = world_with(&[1, 12]);
        let k = join(&mut w, "Vex", "t.hall", &[("mend", 0)]);
        w.actor_mut(&k).unwrap().vitals.hp.cur = 95;
        let r = execute(&mut w, &k, "mend", None).unwrap();
        assert_eq!(r.amount, 5);
        assert_eq!(w.actor(&k).unwrap().vitals.hp.cur, 100);
        assert!(matches!(
            execute(&mut w, &k, "mend", Some("nobody")),
            Err(CommandError::OnCooldown { .. })
        ));
    }
}
