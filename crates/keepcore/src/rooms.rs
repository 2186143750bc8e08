use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::items::{ItemTemplate, find_item_template};
use crate::mobs::{MobTemplate, find_mob_template};

const EMBEDDED_AREA: (&str, &str) = ("hollow.yaml", include_str!("../areas/hollow.yaml"));

#[derive(Debug, thiserror::Error)]
pub enum AreaError {
    #[error("read area file {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse area yaml {name}: {source}")]
    Yaml {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("area {0}: {1}")]
    Invalid(String, String),
}

#[derive(Clone, Debug)]
pub struct ExitDef {
    pub dir: String,
    pub to: String,
}

#[derive(Clone, Debug)]
pub struct MobSpawn {
    pub template: &'static MobTemplate,
    pub level: u32,
}

#[derive(Clone, Debug)]
pub struct RoomDef {
    pub name: String,
    pub description: String,
    pub exits: Vec<ExitDef>,
    pub items: Vec<&'static ItemTemplate>,
    pub mobs: Vec<MobSpawn>,
}

/// Static room graph plus what each room starts out holding.
#[derive(Clone, Debug)]
pub struct Rooms {
    rooms: HashMap<String, RoomDef>,
    start_room: String,
    zone_name: String,
}

impl Rooms {
    /// The area compiled into the binary.
    pub fn embedded() -> Result<Self, AreaError> {
        let (name, s) = EMBEDDED_AREA;
        Self::from_yaml_str(name, s)
    }

    pub fn load_file(path: &Path) -> Result<Self, AreaError> {
        let s = std::fs::read_to_string(path).map_err(|source| AreaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&path.display().to_string(), &s)
    }

    pub fn from_yaml_str(name: &str, s: &str) -> Result<Self, AreaError> {
        let a = serde_yaml::from_str::<AreaFile>(s).map_err(|source| AreaError::Yaml {
            name: name.to_string(),
            source,
        })?;
        let invalid = |msg: String| AreaError::Invalid(name.to_string(), msg);

        if a.rooms.is_empty() {
            return Err(invalid("no rooms".to_string()));
        }

        let mut rooms = HashMap::new();
        let mut first_room = None;
        for r in a.rooms {
            let mut exits = Vec::new();
            for e in r.exits.unwrap_or_default() {
                let dir = e.dir.trim().to_ascii_lowercase();
                let to = e.to.trim().to_string();
                if !dir.is_empty() && !to.is_empty() {
                    exits.push(ExitDef { dir, to });
                }
            }

            let mut items = Vec::new();
            for id in r.items.unwrap_or_default() {
                let t = find_item_template(&id)
                    .ok_or_else(|| invalid(format!("room {}: unknown item {id}", r.id)))?;
                items.push(t);
            }

            let mut mobs = Vec::new();
            for m in r.mobs.unwrap_or_default() {
                let template = find_mob_template(&m.template)
                    .ok_or_else(|| invalid(format!("room {}: unknown mob {}", r.id, m.template)))?;
                mobs.push(MobSpawn {
                    template,
                    level: m.level.unwrap_or(1),
                });
            }

            if first_room.is_none() {
                first_room = Some(r.id.clone());
            }
            let prev = rooms.insert(
                r.id.clone(),
                RoomDef {
                    name: r.name,
                    description: r.desc.unwrap_or_default().trim().to_string(),
                    exits,
                    items,
                    mobs,
                },
            );
            if prev.is_some() {
                return Err(invalid(format!("duplicate room id {}", r.id)));
            }
        }

        for (id, r) in &rooms {
            for e in &r.exits {
                if !rooms.contains_key(&e.to) {
                    return Err(invalid(format!("room {id}: exit {} leads to unknown {}", e.dir, e.to)));
                }
            }
        }

        let start_room = a
            .start_room
            .filter(|s| rooms.contains_key(s))
            .or(first_room)
            .ok_or_else(|| invalid("no start room".to_string()))?;

        Ok(Self {
            rooms,
            start_room,
            zone_name: a.zone_name.unwrap_or(a.zone_id),
        })
    }

    pub fn start_room(&self) -> &str {
        &self.start_room
    }

    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    pub fn has_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn get(&self, room_id: &str) -> Option<&RoomDef> {
        self.rooms.get(room_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RoomDef)> {
        self.rooms.iter()
    }

    pub fn find_exit(&self, room_id: &str, token: &str) -> Option<&ExitDef> {
        let room = self.rooms.get(room_id)?;
        let t = token.trim();
        if t.is_empty() {
            return None;
        }
        if let Some(ex) = room.exits.iter().find(|e| e.dir.eq_ignore_ascii_case(t)) {
            return Some(ex);
        }
        let canon = normalize_dir_token(t)?;
        room.exits.iter().find(|e| e.dir == canon)
    }

    pub fn render_exits(&self, room_id: &str) -> String {
        let Some(room) = self.rooms.get(room_id) else {
            return "exits: (room not found)\r\n".to_string();
        };
        if room.exits.is_empty() {
            return "exits: none\r\n".to_string();
        }
        let mut xs = room
            .exits
            .iter()
            .map(|e| e.dir.as_str())
            .collect::<Vec<_>>();
        xs.sort_unstable();
        format!("exits: {}\r\n", xs.join(", "))
    }
}

/// Canonical direction for a movement word, if it is one.
pub fn normalize_dir_token(token: &str) -> Option<&'static str> {
    match token.trim().to_ascii_lowercase().as_str() {
        "north" | "n" => Some("north"),
        "south" | "s" => Some("south"),
        "east" | "e" => Some("east"),
        "west" | "w" => Some("west"),
        "up" | "u" => Some("up"),
        "down" | "d" => Some("down"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct AreaFile {
    #[allow(dead_code)]
    version: Option<u32>,
    zone_id: String,
    zone_name: Option<String>,
    start_room: Option<String>,
    rooms: Vec<AreaRoom>,
}

#[derive(Debug, Deserialize)]
struct AreaRoom {
    id: String,
    name: String,
    desc: Option<String>,
    exits: Option<Vec<AreaExit>>,
    items: Option<Vec<String>>,
    mobs: Option<Vec<AreaMob>>,
}

#[derive(Debug, Deserialize)]
struct AreaExit {
    dir: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct AreaMob {
    template: String,
    level: Option<u32>,
}
