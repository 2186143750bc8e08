use crate::abilities::Catalog;
use crate::authz::Privileged;
use crate::error::CommandError;
use crate::rooms::normalize_dir_token;

/// One parsed input line. Privileged commands keep their arguments raw: nothing about a
/// privileged command's arguments is validated until the caller has been authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help,
    /// Room view when empty, otherwise a closer look at one thing in the room.
    Look(String),
    Stats,
    /// Full listing when empty, otherwise the details of one ability.
    Abilities(String),
    Go(String),
    Cast(String),
    Maneuver {
        ability_id: &'static str,
        target: Option<String>,
    },
    Study(String),
    Train(String),
    Consider(String),
    Save,
    Quit,
    Teleport(String),
    Spawn(String),
    GrantKeeper(String),
    RevokeKeeper(String),
    Restore(String),
}

impl Command {
    pub fn privilege(&self) -> Option<Privileged> {
        match self {
            Command::Teleport(_) => Some(Privileged::Teleport),
            Command::Spawn(_) => Some(Privileged::Spawn),
            Command::GrantKeeper(_) => Some(Privileged::GrantRole),
            Command::RevokeKeeper(_) => Some(Privileged::RevokeRole),
            Command::Restore(_) => Some(Privileged::Restore),
            _ => None,
        }
    }
}

pub fn parse(line: &str, catalog: &Catalog) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Command::Empty);
    }
    let (verb, args) = match line.split_once(char::is_whitespace) {
        Some((v, rest)) => (v, rest.trim()),
        None => (line, ""),
    };
    let verb_lc = verb.to_ascii_lowercase();

    let cmd = match verb_lc.as_str() {
        "help" | "?" | "commands" => Command::Help,
        "look" | "l" => Command::Look(args.to_string()),
        "stats" | "score" | "sc" => Command::Stats,
        "abilities" | "spellbook" | "skills" | "spells" => Command::Abilities(args.to_string()),
        "go" | "walk" => {
            if args.is_empty() {
                return Err(CommandError::Usage("go <exit>"));
            }
            Command::Go(args.to_string())
        }
        "cast" | "c" => Command::Cast(args.to_string()),
        "study" | "learn" => Command::Study(args.to_string()),
        "train" | "practice" => Command::Train(args.to_string()),
        "consider" | "con" => Command::Consider(args.to_string()),
        "save" => Command::Save,
        "quit" | "logout" => Command::Quit,
        "teleport" | "goto" => Command::Teleport(args.to_string()),
        "spawn" => Command::Spawn(args.to_string()),
        "makekeeper" | "grant-role" => Command::GrantKeeper(args.to_string()),
        "removekeeper" | "revoke-role" => Command::RevokeKeeper(args.to_string()),
        "restore" => Command::Restore(args.to_string()),
        _ => {
            if args.is_empty() && normalize_dir_token(&verb_lc).is_some() {
                return Ok(Command::Go(verb_lc));
            }
            let words = line.split_whitespace().collect::<Vec<_>>();
            let Some((def, rest)) = catalog.maneuver_command(&words) else {
                return Err(CommandError::UnknownCommand(verb.to_string()));
            };
            Command::Maneuver {
                ability_id: def.id,
                target: (!rest.is_empty()).then(|| rest.join(" ")),
            }
        }
    };
    Ok(cmd)
}
