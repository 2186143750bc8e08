pub const MAX_MOB_LEVEL: u32 = 50;

/// Counterattack damage. Deterministic so that fights are predictable from the stats alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamagePattern {
    pub base: i32,
    pub per_level: i32,
}

impl DamagePattern {
    pub fn damage_at(self, level: u32) -> i32 {
        let lvl = level.clamp(1, MAX_MOB_LEVEL) as i32;
        (self.base + self.per_level * (lvl - 1)).max(0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MobTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub max_hp: i32,
    /// Hostile mobs strike back when hit and survive.
    pub hostile: bool,
    pub counter: DamagePattern,
    /// Maneuver this mob teaches through `train`.
    pub trainer: Option<&'static str>,
    pub description: &'static str,
}

impl MobTemplate {
    pub fn hp_at(&self, level: u32) -> i32 {
        let lvl = level.clamp(1, MAX_MOB_LEVEL) as i32;
        (self.max_hp + (lvl - 1) * self.max_hp / 2).max(1)
    }

    pub fn matches_token(&self, token: &str) -> bool {
        let t = token.trim().to_ascii_lowercase();
        if t.is_empty() {
            return false;
        }
        let bare = self
            .name
            .strip_prefix("a ")
            .or_else(|| self.name.strip_prefix("an "))
            .unwrap_or(self.name)
            .to_ascii_lowercase();
        bare == t
            || bare.starts_with(&t)
            || self.id == t
            || self
                .keywords
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&t) || k.starts_with(&t))
    }
}

static MOB_TEMPLATES: &[MobTemplate] = &[
    MobTemplate {
        id: "rat",
        name: "a sewer rat",
        keywords: &["rat"],
        max_hp: 6,
        hostile: false,
        counter: DamagePattern {
            base: 1,
            per_level: 0,
        },
        trainer: None,
        description: "It is mostly tail and nerves.",
    },
    MobTemplate {
        id: "training_dummy",
        name: "a training dummy",
        keywords: &["dummy"],
        max_hp: 10,
        hostile: false,
        counter: DamagePattern {
            base: 0,
            per_level: 0,
        },
        trainer: None,
        description: "Straw and burlap, stitched into the shape of a bad day.",
    },
    MobTemplate {
        id: "goblin",
        name: "a goblin",
        keywords: &["goblin", "gob"],
        max_hp: 10,
        hostile: true,
        counter: DamagePattern {
            base: 2,
            per_level: 1,
        },
        trainer: None,
        description: "Small, green, and holding a knife it clearly stole.",
    },
    MobTemplate {
        id: "wolf",
        name: "a grey wolf",
        keywords: &["wolf"],
        max_hp: 14,
        hostile: true,
        counter: DamagePattern {
            base: 3,
            per_level: 1,
        },
        trainer: None,
        description: "Lean and patient.",
    },
    MobTemplate {
        id: "ogre",
        name: "an ogre",
        keywords: &["ogre"],
        max_hp: 40,
        hostile: true,
        counter: DamagePattern {
            base: 6,
            per_level: 2,
        },
        trainer: None,
        description: "It has to duck under the doorframe and resents you for it.",
    },
    MobTemplate {
        id: "drillmaster",
        name: "a grizzled drillmaster",
        keywords: &["drillmaster", "trainer"],
        max_hp: 30,
        hostile: false,
        counter: DamagePattern {
            base: 0,
            per_level: 0,
        },
        trainer: Some("power_attack"),
        description: "Scarred knuckles, a bad knee, and opinions about your footwork.",
    },
];

pub fn find_mob_template(id: &str) -> Option<&'static MobTemplate> {
    let t = id.trim();
    MOB_TEMPLATES
        .iter()
        .find(|m| m.id.eq_ignore_ascii_case(t))
        .or_else(|| MOB_TEMPLATES.iter().find(|m| m.matches_token(t)))
}

pub fn all_mob_templates() -> &'static [MobTemplate] {
    MOB_TEMPLATES
}

#[derive(Debug, Clone, Copy)]
pub struct MobInstance {
    pub id: u64,
    pub template: &'static MobTemplate,
    pub level: u32,
    pub hp: i32,
    pub max_hp: i32,
}

impl MobInstance {
    pub fn spawn(id: u64, template: &'static MobTemplate, level: u32) -> Self {
        let level = level.clamp(1, MAX_MOB_LEVEL);
        let max_hp = template.hp_at(level);
        Self {
            id,
            template,
            level,
            hp: max_hp,
            max_hp,
        }
    }

    pub fn name(&self) -> &'static str {
        self.template.name
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Rough threat measure used by `consider`: bulk plus ten rounds of retaliation.
    pub fn threat(&self) -> i32 {
        let sting = if self.template.hostile {
            self.template.counter.damage_at(self.level)
        } else {
            0
        };
        self.max_hp + sting * 10
    }

    /// Apply damage, clamped at zero. Returns remaining hp.
    pub fn take_damage(&mut self, n: i32) -> i32 {
        self.hp = (self.hp - n.max(0)).max(0);
        self.hp
    }
}
