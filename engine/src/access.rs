//! # Access Control Registry
//!
//! Role membership and operator delegation. Nothing here knows about
//! requests or shares; the vault calls [`AccessControl::require_role`] or
//! [`AccessControl::require_authorized_for`] at the top of each operation and
//! bails with a typed error before touching any other state.
//!
//! Two bootstrap roles are granted at construction (`Admin`,
//! `PriceSetter`). `Keeper` is granted later by an admin and gates the
//! automated fulfillment path.

use std::collections::{BTreeSet, HashMap, HashSet};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Roles recognised by the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Grants and revokes roles, sets the fee, pauses, freezes, fulfills.
    Admin,
    /// Publishes the share price.
    PriceSetter,
    /// Runs automated fulfillment.
    Keeper,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::PriceSetter => write!(f, "PriceSetter"),
            Role::Keeper => write!(f, "Keeper"),
        }
    }
}

/// Role membership plus the owner → operator approval table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControl {
    members: HashMap<Role, BTreeSet<Address>>,
    operators: HashMap<Address, HashSet<Address>>,
}

impl AccessControl {
    /// Creates a registry with the two bootstrap roles assigned.
    pub fn bootstrap(admin: Address, price_setter: Address) -> Self {
        let mut access = Self::default();
        access.grant(Role::Admin, admin);
        access.grant(Role::PriceSetter, price_setter);
        access
    }

    /// Returns `true` if `account` holds `role`.
    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(&account))
            .unwrap_or(false)
    }

    /// Adds `account` to `role`. Returns `false` if it was already a member.
    pub fn grant(&mut self, role: Role, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }

    /// Removes `account` from `role`. Returns `false` if it was not a member.
    pub fn revoke(&mut self, role: Role, account: Address) -> bool {
        self.members
            .get_mut(&role)
            .map(|set| set.remove(&account))
            .unwrap_or(false)
    }

    /// All current members of `role`, in address order.
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Fails with [`VaultError::MissingRole`] unless `account` holds `role`.
    pub fn require_role(&self, role: Role, account: Address) -> VaultResult<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(VaultError::MissingRole { account, role })
        }
    }

    /// Passes if `account` holds any of `roles`; otherwise reports the first.
    pub fn require_any_role(&self, roles: &[Role], account: Address) -> VaultResult<()> {
        if roles.iter().any(|role| self.has_role(*role, account)) {
            return Ok(());
        }
        Err(VaultError::MissingRole {
            account,
            role: roles.first().copied().unwrap_or(Role::Admin),
        })
    }

    /// Records `owner`'s approval (or revocation) of `operator`.
    pub fn set_operator(&mut self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.operators.entry(owner).or_default().insert(operator);
        } else if let Some(set) = self.operators.get_mut(&owner) {
            set.remove(&operator);
            if set.is_empty() {
                self.operators.remove(&owner);
            }
        }
    }

    /// Returns `true` if `owner` has approved `operator`.
    pub fn is_operator(&self, owner: Address, operator: Address) -> bool {
        self.operators
            .get(&owner)
            .map(|set| set.contains(&operator))
            .unwrap_or(false)
    }

    /// `caller` may act for `owner` if it *is* the owner or an approved operator.
    pub fn require_authorized_for(&self, caller: Address, owner: Address) -> VaultResult<()> {
        if caller == owner || self.is_operator(owner, caller) {
            Ok(())
        } else {
            Err(VaultError::NotOperator { caller, owner })
        }
    }
}
