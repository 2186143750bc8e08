use tracing::debug;

use crate::abilities::AbilityKind;
use crate::actor::{STUDY_BASELINE, TRAINING_BASELINE};
use crate::error::CommandError;
use crate::world::{World, capitalize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyReport {
    pub ability_id: &'static str,
    pub ability_display: &'static str,
    pub item_name: &'static str,
    pub consumed: bool,
    pub proficiency: u8,
}

/// Learn an ability from an item lying in the actor's room. The grant and the removal of a
/// consumable item happen together or not at all; of two actors racing for one item, the
/// first gets the ability and the second finds nothing.
pub fn study(world: &mut World, actor_key: &str, keyword: &str) -> Result<StudyReport, CommandError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(CommandError::Usage("study <item>"));
    }
    let actor = world
        .actor(actor_key)
        .ok_or_else(|| CommandError::NotFound(format!("no actor named {actor_key}")))?;
    let room = actor.room_id.clone();

    let item_id = world
        .find_item(&room, keyword)
        .ok_or_else(|| CommandError::ItemNotFound(keyword.to_string()))?;
    let Some(item) = world.item(&room, item_id).copied() else {
        return Err(CommandError::ItemNotFound(keyword.to_string()));
    };
    let Some(grant) = item.template.grants else {
        return Err(CommandError::NotFound(format!(
            "there is nothing to learn from {}",
            item.name()
        )));
    };
    let Some(def) = world.catalog().get(grant).copied() else {
        return Err(CommandError::NotFound(format!(
            "the lesson in {} is unreadable",
            item.name()
        )));
    };
    if actor.knows(def.id) {
        return Err(CommandError::AlreadyKnown(def.display.to_string()));
    }

    if item.template.consumable && world.take_item(&room, item_id).is_none() {
        return Err(CommandError::ItemNotFound(keyword.to_string()));
    }
    let actor = world
        .actor_mut(actor_key)
        .ok_or_else(|| CommandError::NotFound(format!("no actor named {actor_key}")))?;
    actor.learn(def.id, STUDY_BASELINE);

    debug!(actor = %actor.name, ability = def.id, item = item.name(), "studied");
    Ok(StudyReport {
        ability_id: def.id,
        ability_display: def.display,
        item_name: item.name(),
        consumed: item.template.consumable,
        proficiency: STUDY_BASELINE,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainReport {
    pub ability_id: &'static str,
    pub ability_display: &'static str,
    pub trainer_name: &'static str,
    pub proficiency: u8,
}

/// `train <trainer> [maneuver]`: learn the maneuver a trainer mob in the room teaches.
/// Trainers are not used up, so the only mutation is the new spellbook entry.
pub fn train(world: &mut World, actor_key: &str, args: &str) -> Result<TrainReport, CommandError> {
    let mut words = args.split_whitespace();
    let Some(keyword) = words.next() else {
        return Err(CommandError::Usage("train <trainer> [maneuver]"));
    };
    let wanted = words.collect::<Vec<_>>().join(" ").to_ascii_lowercase();
    let actor = world
        .actor(actor_key)
        .ok_or_else(|| CommandError::NotFound(format!("no actor named {actor_key}")))?;
    let room = actor.room_id.clone();

    let mob = world
        .find_mob(&room, keyword)
        .and_then(|id| world.mob(&room, id))
        .ok_or_else(|| CommandError::InvalidTarget(keyword.to_string()))?;
    let trainer_name = mob.name();
    let Some(teaches) = mob.template.trainer else {
        return Err(CommandError::NotFound(format!(
            "{} doesn't offer training",
            capitalize(trainer_name)
        )));
    };
    let Some(def) = world
        .catalog()
        .get(teaches)
        .filter(|d| d.kind == AbilityKind::Maneuver)
        .copied()
    else {
        return Err(CommandError::NotFound(format!(
            "{} has nothing to teach",
            capitalize(trainer_name)
        )));
    };
    if !wanted.is_empty()
        && !def.display.to_ascii_lowercase().contains(&wanted)
        && !def.id.contains(&wanted.replace(' ', "_"))
    {
        return Err(CommandError::NotFound(format!(
            "{} teaches {}; try: train {keyword}",
            capitalize(trainer_name),
            def.display
        )));
    }
    if actor.knows(def.id) {
        return Err(CommandError::AlreadyKnown(def.display.to_string()));
    }

    let actor = world
        .actor_mut(actor_key)
        .ok_or_else(|| CommandError::NotFound(format!("no actor named {actor_key}")))?;
    actor.learn(def.id, TRAINING_BASELINE);

    debug!(actor = %actor.name, ability = def.id, trainer = trainer_name, "trained");
    Ok(TrainReport {
        ability_id: def.id,
        ability_display: def.display,
        trainer_name,
        proficiency: TRAINING_BASELINE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Actor, Vitals};
    use crate::world::testutil::world_with;

    #[test]
    fn study_grants_at_baseline_and_consumes() {
        let mut w = world_with(&[]);
        let k = w
            .add_actor(Actor::new("Vex", "t.hall", Vitals::full(10, 10, 10)))
            .unwrap();
        let r = study(&mut w, &k, "wand").unwrap();
        assert_eq!(r.ability_id, "fireball");
        assert!(r.consumed);
        assert_eq!(w.actor(&k).unwrap().proficiency("fireball"), STUDY_BASELINE);
        assert!(w.find_item("t.hall", "wand").is_none());
    }

    #[test]
    fn second_student_finds_nothing() {
        let mut w = world_with(&[]);
        let a = w
            .add_actor(Actor::new("Vex", "t.hall", Vitals::full(10, 10, 10)))
            .unwrap();
        let b = w
            .add_actor(Actor::new("Mira", "t.hall", Vitals::full(10, 10, 10)))
            .unwrap();
        study(&mut w, &a, "wand of fireball").unwrap();
        assert_eq!(
            study(&mut w, &b, "wand of fireball"),
            Err(CommandError::ItemNotFound("wand of fireball".to_string()))
        );
        assert!(!w.actor(&b).unwrap().knows("fireball"));
    }

    #[test]
    fn already_known_keeps_item_and_proficiency() {
        let mut w = world_with(&[]);
        let mut vex = Actor::new("Vex", "t.hall", Vitals::full(10, 10, 10));
        vex.learn("fireball", 70);
        let k = w.add_actor(vex).unwrap();
        assert_eq!(
            study(&mut w, &k, "wand"),
            Err(CommandError::AlreadyKnown("Fireball".to_string()))
        );
        assert_eq!(w.actor(&k).unwrap().proficiency("fireball"), 70);
        assert!(w.find_item("t.hall", "wand").is_some());
    }

    #[test]
    fn fixtures_teach_without_being_used_up() {
        let mut w = world_with(&[]);
        let k = w
            .add_actor(Actor::new("Vex", "t.hall", Vitals::full(10, 10, 10)))
            .unwrap();
        let r = study(&mut w, &k, "lectern").unwrap();
        assert_eq!(r.ability_id, "cleave");
        assert!(!r.consumed);
        assert!(w.find_item("t.hall", "lectern").is_some());
    }

    #[test]
    fn plain_items_teach_nothing() {
        let mut w = world_with(&[]);
        let k = w
            .add_actor(Actor::new("Vex", "t.hall", Vitals::full(10, 10, 10)))
            .unwrap();
        assert!(matches!(study(&mut w, &k, "bucket"), Err(CommandError::NotFound(_))));
        assert!(matches!(study(&mut w, &k, ""), Err(CommandError::Usage(_))));
        assert!(matches!(
            study(&mut w, &k, "grimoire"),
            Err(CommandError::ItemNotFound(_))
        ));
    }

    #[test]
    fn trainer_teaches_at_training_baseline() {
        let mut w = world_with(&[]);
        let k = w
            .add_actor(Actor::new("Vex", "t.den", Vitals::full(10, 10, 10)))
            .unwrap();
        let r = train(&mut w, &k, "drillmaster power").unwrap();
        assert_eq!(r.ability_id, "power_attack");
        assert_eq!(r.trainer_name, "a grizzled drillmaster");
        assert_eq!(w.actor(&k).unwrap().proficiency("power_attack"), TRAINING_BASELINE);
        assert!(w.find_mob("t.den", "drillmaster").is_some());
    }

    #[test]
    fn training_refuses_what_is_already_known() {
        let mut w = world_with(&[]);
        let mut vex = Actor::new("Vex", "t.den", Vitals::full(10, 10, 10));
        vex.learn("power_attack", 55);
        let k = w.add_actor(vex).unwrap();
        assert_eq!(
            train(&mut w, &k, "trainer"),
            Err(CommandError::AlreadyKnown("Power Attack".to_string()))
        );
        assert_eq!(w.actor(&k).unwrap().proficiency("power_attack"), 55);
    }

    #[test]
    fn only_trainers_train() {
        let mut w = world_with(&[]);
        let k = w
            .add_actor(Actor::new("Vex", "t.den", Vitals::full(10, 10, 10)))
            .unwrap();
        assert_eq!(
            train(&mut w, &k, "goblin"),
            Err(CommandError::NotFound("A goblin doesn't offer training".to_string()))
        );
        assert!(matches!(
            train(&mut w, &k, "drillmaster fireball"),
            Err(CommandError::NotFound(_))
        ));
        assert!(matches!(
            train(&mut w, &k, "ogre"),
            Err(CommandError::InvalidTarget(_))
        ));
        assert!(matches!(train(&mut w, &k, "  "), Err(CommandError::Usage(_))));
        assert!(!w.actor(&k).unwrap().knows("power_attack"));
    }
}
