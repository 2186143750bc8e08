#[derive(Debug, Clone, Copy)]
pub struct ItemTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Ability id learned by studying this item, if any.
    pub grants: Option<&'static str>,
    /// Studied items crumble when true; fixtures like lecterns stay put.
    pub consumable: bool,
    pub description: &'static str,
}

impl ItemTemplate {
    pub fn matches_token(&self, token: &str) -> bool {
        let t = token.trim().to_ascii_lowercase();
        if t.is_empty() {
            return false;
        }
        let name_lc = self.name.to_ascii_lowercase();
        if name_lc == t || name_lc.starts_with(&t) {
            return true;
        }
        // "wand of fireball" also answers to "fireball" and "wand".
        if name_lc.split_whitespace().any(|w| w.starts_with(&t)) {
            return true;
        }
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(&t))
    }
}

static ITEM_TEMPLATES: &[ItemTemplate] = &[
    ItemTemplate {
        id: "wand_of_fireball",
        name: "wand of fireball",
        aliases: &["wand"],
        grants: Some("fireball"),
        consumable: true,
        description: "A charred stick that hums with trapped heat.",
    },
    ItemTemplate {
        id: "scroll_of_frost_lance",
        name: "scroll of frost lance",
        aliases: &["scroll"],
        grants: Some("frost_lance"),
        consumable: true,
        description: "Rime creeps along the edges of the parchment.",
    },
    ItemTemplate {
        id: "scroll_of_mending",
        name: "scroll of mending",
        aliases: &["scroll", "mend"],
        grants: Some("mend"),
        consumable: true,
        description: "A healer's notes, mostly legible.",
    },
    ItemTemplate {
        id: "tattered_manual",
        name: "tattered combat manual",
        aliases: &["manual"],
        grants: Some("power_attack"),
        consumable: true,
        description: "Diagrams of people hitting other people very hard.",
    },
    ItemTemplate {
        id: "training_lectern",
        name: "training lectern",
        aliases: &["lectern"],
        grants: Some("cleave"),
        consumable: false,
        description: "An iron lectern bolted to the floor, its lesson carved into the top.",
    },
    ItemTemplate {
        id: "rusty_bucket",
        name: "rusty bucket",
        aliases: &["bucket"],
        grants: None,
        consumable: false,
        description: "It has seen better days. It has never seen a spell.",
    },
];

pub fn find_item_template(id: &str) -> Option<&'static ItemTemplate> {
    ITEM_TEMPLATES.iter().find(|t| t.id.eq_ignore_ascii_case(id.trim()))
}

#[derive(Debug, Clone, Copy)]
pub struct ItemInstance {
    pub id: u64,
    pub template: &'static ItemTemplate,
}

impl ItemInstance {
    pub fn name(&self) -> &'static str {
        self.template.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_and_word_matches() {
        let wand = find_item_template("wand_of_fireball").unwrap();
        assert!(wand.matches_token("wand"));
        assert!(wand.matches_token("Wand of Fire"));
        assert!(wand.matches_token("fireball"));
        assert!(wand.matches_token("fire"));
        assert!(!wand.matches_token("frost"));
        assert!(!wand.matches_token("  "));
    }

    #[test]
    fn every_grant_names_a_real_ability() {
        let c = crate::abilities::Catalog::builtin();
        for t in ITEM_TEMPLATES {
            if let Some(id) = t.grants {
                assert!(c.get(id).is_some(), "{} grants unknown {}", t.id, id);
            }
        }
    }
}
