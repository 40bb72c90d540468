/// Permission gate: derives a caller's role from board membership.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::BoardError;
use crate::mutation::Mutation;
use crate::types::Board;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Member,
    None,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Member => "member",
            Role::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Role::Owner),
            "member" => Some(Role::Member),
            "none" => Some(Role::None),
            _ => None,
        }
    }

    /// Owners and members may edit columns and cards.
    pub fn can_edit(&self) -> bool {
        matches!(self, Role::Owner | Role::Member)
    }

    pub fn can_delete(&self) -> bool {
        matches!(self, Role::Owner)
    }

    pub fn can_invite(&self) -> bool {
        matches!(self, Role::Owner)
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Edit => self.can_edit(),
            Capability::Invite => self.can_invite(),
            Capability::Delete => self.can_delete(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a mutation needs from the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Edit,
    Invite,
    Delete,
}

impl Capability {
    pub fn action(&self) -> &'static str {
        match self {
            Capability::Edit => "edit this board",
            Capability::Invite => "manage members of this board",
            Capability::Delete => "delete this board",
        }
    }
}

pub fn role(board: &Board, user_id: &str) -> Role {
    if user_id.is_empty() {
        return Role::None;
    }
    if board.owner_id == user_id {
        Role::Owner
    } else if board.member_ids.contains(user_id) {
        Role::Member
    } else {
        Role::None
    }
}

pub fn can_edit(board: &Board, user_id: &str) -> bool {
    role(board, user_id).can_edit()
}

pub fn can_delete(board: &Board, user_id: &str) -> bool {
    role(board, user_id).can_delete()
}

pub fn can_invite(board: &Board, user_id: &str) -> bool {
    role(board, user_id).can_invite()
}

/// Check a capability for `user_id`, rejecting with `BoardError::Permission`.
pub fn require(board: &Board, user_id: &str, capability: Capability) -> Result<Role, BoardError> {
    let role = role(board, user_id);
    if role.allows(capability) {
        Ok(role)
    } else {
        Err(BoardError::Permission {
            role,
            action: capability.action(),
        })
    }
}

/// Gate a mutation request before it is accepted.
pub fn authorize(board: &Board, user_id: &str, mutation: &Mutation) -> Result<Role, BoardError> {
    require(board, user_id, mutation.capability())
}
