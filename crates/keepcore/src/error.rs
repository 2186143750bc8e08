use std::path::PathBuf;

/// Every way a command can fail. None of these are fatal to the connection; each becomes
/// one response line and the command leaves world state exactly as it found it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("huh? (you don't know any ability called '{0}')")]
    UnknownAbility(String),
    #[error("huh? ({ability} is on cooldown: {:.1}s remaining)", secs(.remaining_ms))]
    OnCooldown { ability: String, remaining_ms: u64 },
    #[error("huh? (not enough {resource}: need {need}, have {have})")]
    InsufficientResource {
        resource: &'static str,
        need: i32,
        have: i32,
    },
    #[error("huh? (you don't see '{0}' here)")]
    InvalidTarget(String),
    #[error("huh? ({0} needs a target)")]
    MissingTarget(String),
    #[error("huh? (you don't see '{0}' here to study)")]
    ItemNotFound(String),
    #[error("huh? (you already know {0})")]
    AlreadyKnown(String),
    #[error("nope: you do not have the authority to do that (keeper only)")]
    PermissionDenied,
    #[error("huh? (unknown command '{0}'; try: help)")]
    UnknownCommand(String),
    #[error("huh? (try: {0})")]
    Usage(&'static str),
    #[error("huh? ({0})")]
    NotFound(String),
    #[error("save failed: {0}")]
    Store(String),
    #[error("load failed: {0}")]
    StoreRead(String),
}

fn secs(ms: &u64) -> f64 {
    *ms as f64 / 1000.0
}

impl CommandError {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::UnknownAbility(_) => "unknown_ability",
            CommandError::OnCooldown { .. } => "on_cooldown",
            CommandError::InsufficientResource { .. } => "insufficient_resource",
            CommandError::InvalidTarget(_) => "invalid_target",
            CommandError::MissingTarget(_) => "missing_target",
            CommandError::ItemNotFound(_) => "item_not_found",
            CommandError::AlreadyKnown(_) => "already_known",
            CommandError::PermissionDenied => "permission_denied",
            CommandError::UnknownCommand(_) => "unknown_command",
            CommandError::Usage(_) => "usage",
            CommandError::NotFound(_) => "not_found",
            CommandError::Store(_) => "store",
            CommandError::StoreRead(_) => "store_read",
        }
    }

    /// Wrap a failed record read. `From<StoreError>` is for writes.
    pub fn from_load(e: StoreError) -> Self {
        CommandError::StoreRead(e.to_string())
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        CommandError::Store(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("actor record io {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("actor record json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid actor name {0:?}")]
    BadName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_reads_differently_from_not_found() {
        let denied = CommandError::PermissionDenied.to_string();
        let missing = CommandError::NotFound("no such room: void".to_string()).to_string();
        assert!(denied.starts_with("nope:"));
        assert!(denied.contains("authority"));
        assert!(missing.starts_with("huh?"));
        assert!(!missing.contains("authority"));
    }

    #[test]
    fn cooldown_message_carries_remaining_time() {
        let e = CommandError::OnCooldown {
            ability: "Slash".to_string(),
            remaining_ms: 1500,
        };
        assert_eq!(e.to_string(), "huh? (Slash is on cooldown: 1.5s remaining)");
        assert_eq!(e.kind(), "on_cooldown");
    }
}
