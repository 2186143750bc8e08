use crate::rng::Roll;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbilityKind {
    Maneuver,
    Spell,
}

impl AbilityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AbilityKind::Maneuver => "maneuver",
            AbilityKind::Spell => "spell",
        }
    }

    /// Maneuvers burn move, spells burn mana.
    pub fn resource(self) -> Resource {
        match self {
            AbilityKind::Maneuver => Resource::Move,
            AbilityKind::Spell => Resource::Mana,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Mana,
    Move,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Mana => "mana",
            Resource::Move => "move",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Damage { min: i32, max: i32 },
    Heal { min: i32, max: i32 },
}

impl Effect {
    pub fn range(self) -> (i32, i32) {
        match self {
            Effect::Damage { min, max } | Effect::Heal { min, max } => (min, max.max(min)),
        }
    }
}

/// Proficiency -> hit chance. `floor_pct` applies at proficiency 0, `ceil_pct` at 100.
/// Both stay strictly inside (0, 100) so nothing is ever a guaranteed hit or miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SuccessCurve {
    pub floor_pct: u32,
    pub ceil_pct: u32,
}

impl SuccessCurve {
    pub fn hit_pct(self, proficiency: u8) -> u32 {
        let floor = self.floor_pct.clamp(1, 99);
        let ceil = self.ceil_pct.clamp(floor, 99);
        let p = u32::from(proficiency.min(100));
        floor + (ceil - floor) * p / 100
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AbilityDef {
    pub id: &'static str,
    pub display: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: AbilityKind,
    pub cost: i32,
    pub cooldown_ms: u64,
    pub effect: Effect,
    pub curve: SuccessCurve,
    /// Usable by every actor without a spellbook entry.
    pub innate: bool,
    /// Third-person verb for the hit line: "* Vex {verb} a goblin for 6 damage."
    pub verb: &'static str,
    pub description: &'static str,
}

impl AbilityDef {
    pub fn resource(&self) -> Resource {
        self.kind.resource()
    }

    /// Damage abilities need someone to hit; heals fall back to the caster.
    pub fn requires_target(&self) -> bool {
        matches!(self.effect, Effect::Damage { .. })
    }

    fn matches_exact(&self, token: &str) -> bool {
        let t = token.trim();
        if t.is_empty() {
            return false;
        }
        let underscored = t.replace(' ', "_");
        self.id.eq_ignore_ascii_case(t)
            || self.id.eq_ignore_ascii_case(&underscored)
            || self.display.eq_ignore_ascii_case(t)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(t))
    }

    fn matches_partial(&self, token: &str) -> bool {
        let t = token.trim().to_ascii_lowercase();
        if t.is_empty() {
            return false;
        }
        self.display.to_ascii_lowercase().contains(&t) || self.id.contains(&t.replace(' ', "_"))
    }

    /// Roll the raw amount for a connecting use. Proficiency lifts the bottom of the range
    /// (halfway at 100) without ever lifting the top.
    pub fn roll_amount(&self, proficiency: u8, rng: &mut dyn Roll) -> i32 {
        let (min, max) = self.effect.range();
        let lift = (max - min) * i32::from(proficiency.min(100)) / 200;
        rng.roll_range(min + lift, max)
    }
}

static ALL_ABILITIES: [AbilityDef; 8] = [
    // Maneuvers
    AbilityDef {
        id: "kick",
        display: "Kick",
        aliases: &[],
        kind: AbilityKind::Maneuver,
        cost: 2,
        cooldown_ms: 2000,
        effect: Effect::Damage { min: 1, max: 3 },
        curve: SuccessCurve {
            floor_pct: 60,
            ceil_pct: 90,
        },
        innate: true,
        verb: "kicks",
        description: "A graceless boot anyone can throw.",
    },
    AbilityDef {
        id: "slash",
        display: "Slash",
        aliases: &["sl"],
        kind: AbilityKind::Maneuver,
        cost: 3,
        cooldown_ms: 2000,
        effect: Effect::Damage { min: 2, max: 6 },
        curve: SuccessCurve {
            floor_pct: 55,
            ceil_pct: 95,
        },
        innate: false,
        verb: "slashes at",
        description: "A quick cut with whatever edge is at hand.",
    },
    AbilityDef {
        id: "power_attack",
        display: "Power Attack",
        aliases: &["power"],
        kind: AbilityKind::Maneuver,
        cost: 6,
        cooldown_ms: 5000,
        effect: Effect::Damage { min: 4, max: 10 },
        curve: SuccessCurve {
            floor_pct: 45,
            ceil_pct: 90,
        },
        innate: false,
        verb: "hammers",
        description: "Everything behind one blow.",
    },
    AbilityDef {
        id: "cleave",
        display: "Cleave",
        aliases: &[],
        kind: AbilityKind::Maneuver,
        cost: 8,
        cooldown_ms: 6000,
        effect: Effect::Damage { min: 5, max: 12 },
        curve: SuccessCurve {
            floor_pct: 45,
            ceil_pct: 90,
        },
        innate: false,
        verb: "cleaves into",
        description: "A wide, heavy arc.",
    },
    // Spells
    AbilityDef {
        id: "arcane_bolt",
        display: "Arcane Bolt",
        aliases: &["bolt"],
        kind: AbilityKind::Spell,
        cost: 5,
        cooldown_ms: 2000,
        effect: Effect::Damage { min: 3, max: 7 },
        curve: SuccessCurve {
            floor_pct: 60,
            ceil_pct: 95,
        },
        innate: false,
        verb: "blasts",
        description: "A dart of raw force.",
    },
    AbilityDef {
        id: "fireball",
        display: "Fireball",
        aliases: &["fb"],
        kind: AbilityKind::Spell,
        cost: 15,
        cooldown_ms: 6000,
        effect: Effect::Damage { min: 8, max: 16 },
        curve: SuccessCurve {
            floor_pct: 50,
            ceil_pct: 92,
        },
        innate: false,
        verb: "engulfs",
        description: "A roaring sphere of flame.",
    },
    AbilityDef {
        id: "frost_lance",
        display: "Frost Lance",
        aliases: &["lance"],
        kind: AbilityKind::Spell,
        cost: 10,
        cooldown_ms: 4000,
        effect: Effect::Damage { min: 5, max: 10 },
        curve: SuccessCurve {
            floor_pct: 55,
            ceil_pct: 93,
        },
        innate: false,
        verb: "impales",
        description: "A spear of ice flung from an open palm.",
    },
    AbilityDef {
        id: "mend",
        display: "Mend",
        aliases: &["heal"],
        kind: AbilityKind::Spell,
        cost: 8,
        cooldown_ms: 5000,
        effect: Effect::Heal { min: 6, max: 12 },
        curve: SuccessCurve {
            floor_pct: 70,
            ceil_pct: 98,
        },
        innate: false,
        verb: "mends",
        description: "Knits flesh back together.",
    },
];

/// Immutable ability registry. Built once at startup and never written afterwards.
#[derive(Clone, Debug)]
pub struct Catalog {
    defs: Vec<AbilityDef>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self::from_defs(ALL_ABILITIES.to_vec())
    }

    pub fn from_defs(defs: Vec<AbilityDef>) -> Self {
        Self { defs }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbilityDef> {
        self.defs.iter()
    }

    pub fn get(&self, id: &str) -> Option<&AbilityDef> {
        self.defs.iter().find(|d| d.id == id)
    }

    pub fn find_any(&self, token: &str) -> Option<&AbilityDef> {
        self.defs.iter().find(|d| d.matches_exact(token))
    }

    /// Maneuver invoked by its own command word(s), e.g. `power attack goblin`.
    /// Exact names only; returns the maneuver plus whatever words follow it.
    pub fn maneuver_command<'w>(&self, words: &[&'w str]) -> Option<(&AbilityDef, Vec<&'w str>)> {
        self.longest_prefix(words, false, |d| d.kind == AbilityKind::Maneuver)
    }

    /// Split `words` into (ability, rest) using the longest leading phrase that names an
    /// ability accepted by `filter`. Exact names beat partial matches at every length; ties
    /// between partial matches go to catalog order.
    pub fn longest_prefix<'w>(
        &self,
        words: &[&'w str],
        allow_partial: bool,
        filter: impl Fn(&AbilityDef) -> bool,
    ) -> Option<(&AbilityDef, Vec<&'w str>)> {
        for n in (1..=words.len()).rev() {
            let phrase = words[..n].join(" ");
            let hit = self
                .defs
                .iter()
                .filter(|d| filter(d))
                .find(|d| d.matches_exact(&phrase))
                .or_else(|| {
                    if !allow_partial {
                        return None;
                    }
                    self.defs
                        .iter()
                        .filter(|d| filter(d))
                        .find(|d| d.matches_partial(&phrase))
                });
            if let Some(d) = hit {
                return Some((d, words[n..].to_vec()));
            }
        }
        None
    }
}
