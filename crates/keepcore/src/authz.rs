use crate::actor::Role;
use crate::error::CommandError;

/// Commands that reach past a single actor's own abilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Privileged {
    Teleport,
    Spawn,
    GrantRole,
    RevokeRole,
    Restore,
}

impl Privileged {
    pub const ALL: [Privileged; 5] = [
        Privileged::Teleport,
        Privileged::Spawn,
        Privileged::GrantRole,
        Privileged::RevokeRole,
        Privileged::Restore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Privileged::Teleport => "teleport",
            Privileged::Spawn => "spawn",
            Privileged::GrantRole => "makekeeper",
            Privileged::RevokeRole => "removekeeper",
            Privileged::Restore => "restore",
        }
    }
}

pub fn is_allowed(role: Role, cmd: Privileged) -> bool {
    match role {
        Role::Keeper => true,
        Role::Player => match cmd {
            Privileged::Teleport
            | Privileged::Spawn
            | Privileged::GrantRole
            | Privileged::RevokeRole
            | Privileged::Restore => false,
        },
    }
}

/// Checked against the live role before any argument is looked at, so a denied caller
/// learns nothing about whether the target exists.
pub fn authorize(role: Role, cmd: Privileged) -> Result<(), CommandError> {
    if is_allowed(role, cmd) {
        Ok(())
    } else {
        Err(CommandError::PermissionDenied)
    }
}
