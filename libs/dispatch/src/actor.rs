//! Acting user resolved for a single call

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, User};

/// Identity handed over by the session resolver in front of the core.
///
/// The role is what the token claims; the core re-checks it against the
/// stored user before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

impl Session {
    pub fn customer(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Customer }
    }

    pub fn driver(user_id: Uuid) -> Self {
        Self { user_id, role: Role::Driver }
    }
}

/// Verified actor. Role-dependent behaviour matches on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer(Uuid),
    Driver(Uuid),
}

impl Actor {
    pub fn of(user: &User) -> Self {
        match user.role {
            Role::Customer => Actor::Customer(user.id),
            Role::Driver => Actor::Driver(user.id),
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            Actor::Customer(id) | Actor::Driver(id) => id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Customer(_) => Role::Customer,
            Actor::Driver(_) => Role::Driver,
        }
    }
}
