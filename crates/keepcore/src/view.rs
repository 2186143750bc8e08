use crate::abilities::{AbilityDef, AbilityKind, Catalog, Effect};
use crate::actor::Actor;
use crate::error::CommandError;
use crate::world::{World, capitalize};

pub fn render_stats(actor: &Actor) -> String {
    let v = &actor.vitals;
    let mut s = format!("{} the {}\r\n", actor.name, actor.role.as_str());
    s.push_str(&format!(
        "hp {}/{}  mana {}/{}  move {}/{}\r\n",
        v.hp.cur, v.hp.max, v.mana.cur, v.mana.max, v.moves.cur, v.moves.max
    ));
    s
}

/// Known abilities grouped by kind, plus any innate ones.
pub fn render_abilities(actor: &Actor, catalog: &Catalog, now_ms: u64) -> String {
    let mut s = String::new();
    for (kind, title) in [(AbilityKind::Spell, "spells"), (AbilityKind::Maneuver, "maneuvers")] {
        let rows = catalog
            .iter()
            .filter(|d| d.kind == kind && (d.innate || actor.knows(d.id)))
            .collect::<Vec<_>>();
        s.push_str(&format!("{title}:\r\n"));
        if rows.is_empty() {
            s.push_str("  (none)\r\n");
            continue;
        }
        for d in rows {
            let (prof, uses) = actor
                .spellbook
                .get(d.id)
                .map(|r| (r.proficiency, r.uses))
                .unwrap_or((0, 0));
            let ready = match actor.cooldown_remaining(d.id, now_ms) {
                Some(ms) => format!("ready in {:.1}s", ms as f64 / 1000.0),
                None => "ready".to_string(),
            };
            s.push_str(&format!(
                "  {:<14} {:>3}%  uses {:<4} cost {} {:<4} cd {:.1}s  {}\r\n",
                d.display,
                prof,
                uses,
                d.cost,
                d.resource().as_str(),
                d.cooldown_ms as f64 / 1000.0,
                ready
            ));
        }
    }
    s
}

/// `abilities <name>`: one ability in full, whether or not the actor knows it.
pub fn render_ability(def: &AbilityDef, actor: &Actor) -> String {
    let (verb, min, max) = match def.effect {
        Effect::Damage { min, max } => ("damage", min, max),
        Effect::Heal { min, max } => ("healing", min, max),
    };
    let mut s = format!("{} ({})\r\n", def.display, def.kind.as_str());
    s.push_str(&format!("{}\r\n", def.description));
    s.push_str(&format!(
        "  cost {} {}  cooldown {:.1}s  {}-{} {}\r\n",
        def.cost,
        def.resource().as_str(),
        def.cooldown_ms as f64 / 1000.0,
        min,
        max,
        verb
    ));
    match actor.spellbook.get(def.id) {
        Some(r) => s.push_str(&format!("  known: {}% after {} uses\r\n", r.proficiency, r.uses)),
        None if def.innate => s.push_str("  known: innate\r\n"),
        None => s.push_str("  not known\r\n"),
    }
    s
}

/// `consider <target>`: compare the actor's staying power with a mob's (or another
/// actor's) and say how a fight would likely go.
pub fn consider(world: &World, actor_key: &str, token: &str) -> Result<String, CommandError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CommandError::Usage("consider <target>"));
    }
    let actor = world
        .actor(actor_key)
        .ok_or_else(|| CommandError::NotFound(format!("no actor named {actor_key}")))?;
    if matches!(token.to_ascii_lowercase().as_str(), "self" | "me") {
        return Ok("You look capable enough to handle yourself.\r\n".to_string());
    }
    let room = &actor.room_id;
    let ours = actor.vitals.hp.max;
    if let Some(m) = world.find_mob(room, token).and_then(|id| world.mob(room, id)) {
        return Ok(format!("You size up {}. {}\r\n", m.name(), assess(ours, m.threat())));
    }
    let other = world
        .find_actor_in_room(room, token)
        .filter(|k| k != actor_key)
        .and_then(|k| world.actor(&k))
        .ok_or_else(|| CommandError::InvalidTarget(token.to_string()))?;
    Ok(format!(
        "You size up {}. {}\r\n",
        capitalize(&other.name),
        assess(ours, other.vitals.hp.max)
    ))
}

fn assess(ours: i32, theirs: i32) -> &'static str {
    let ours = i64::from(ours.max(1));
    let theirs = i64::from(theirs.max(1));
    // theirs / ours against 0.5, 0.8, 1.2, 1.6
    match theirs * 10 {
        t if t <= ours * 5 => "It looks trivial.",
        t if t <= ours * 8 => "You would have the advantage.",
        t if t <= ours * 12 => "It seems evenly matched.",
        t if t <= ours * 16 => "It looks dangerous.",
        _ => "You would likely be defeated.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{StarterKit, Vitals};
    use crate::world::testutil::world_with;

    #[test]
    fn abilities_lists_known_and_innate() {
        let c = Catalog::builtin();
        let mut a = StarterKit::find("scholar").unwrap().outfit("Vex", "r");
        a.learn("fireball", 30);
        a.start_cooldown("fireball", 0, 6_000);
        let s = render_abilities(&a, &c, 1_000);
        assert!(s.contains("Fireball"));
        assert!(s.contains(" 30%"));
        assert!(s.contains("ready in 5.0s"));
        assert!(s.contains("Kick"));
        assert!(!s.contains("Frost Lance"));
    }

    #[test]
    fn stats_show_role_and_pools() {
        let a = Actor::new("Vex", "r", Vitals::full(10, 20, 30));
        let s = render_stats(&a);
        assert!(s.starts_with("Vex the player"));
        assert!(s.contains("mana 20/20"));
    }

    #[test]
    fn ability_detail_shows_description_and_standing() {
        let c = Catalog::builtin();
        let mut a = Actor::new("Vex", "r", Vitals::full(10, 10, 10));
        let fb = c.find_any("fb").unwrap();
        let s = render_ability(fb, &a);
        assert!(s.starts_with("Fireball (spell)\r\n"));
        assert!(s.contains(fb.description));
        assert!(s.contains("not known"));
        a.learn("fireball", 30);
        assert!(render_ability(fb, &a).contains("known: 30% after 0 uses"));
        let fresh = Actor::new("Mo", "r", Vitals::full(1, 1, 1));
        assert!(render_ability(c.find_any("kick").unwrap(), &fresh).contains("innate"));
    }

    #[test]
    fn consider_scales_with_the_opponent() {
        let mut w = world_with(&[]);
        let k = w
            .add_actor(Actor::new("Vex", "t.den", Vitals::full(100, 10, 10)))
            .unwrap();
        assert_eq!(
            consider(&w, &k, "goblin").unwrap(),
            "You size up a goblin. It looks trivial.\r\n"
        );
        let ogre = crate::mobs::find_mob_template("ogre").unwrap();
        w.spawn_mob("t.den", ogre, 2).unwrap();
        // 60 hp + 8 * 10 retaliation against 100
        assert!(consider(&w, &k, "ogre").unwrap().ends_with("It looks dangerous.\r\n"));
        assert!(consider(&w, &k, "me").unwrap().contains("handle yourself"));
        assert!(matches!(consider(&w, &k, "dragon"), Err(CommandError::InvalidTarget(_))));
        assert!(matches!(consider(&w, &k, ""), Err(CommandError::Usage(_))));
    }
}
