//! Write gating for a loaded plantation.
//!
//! A session may edit only when the current user owns the plantation and
//! the host did not request view-only mode.

use crate::model::plantation::{Plantation, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    pub owner_id: UserId,
    pub current_user: Option<UserId>,
    pub view_only: bool,
}

impl AccessPolicy {
    pub fn new(
        owner_id: impl Into<UserId>,
        current_user: Option<UserId>,
        view_only: bool,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            current_user,
            view_only,
        }
    }

    /// Policy for `plantation` as seen by `current_user`.
    pub fn for_plantation(
        plantation: &Plantation,
        current_user: Option<&str>,
        view_only: bool,
    ) -> Self {
        Self::new(
            plantation.owner_id.clone(),
            current_user.map(str::to_string),
            view_only,
        )
    }

    /// Owner session with editing enabled.
    pub fn owner(owner_id: impl Into<UserId>) -> Self {
        let owner_id = owner_id.into();
        Self::new(owner_id.clone(), Some(owner_id), false)
    }

    pub fn is_owner(&self) -> bool {
        self.current_user.as_deref() == Some(self.owner_id.as_str())
    }

    pub fn can_edit(&self) -> bool {
        !self.view_only && self.is_owner()
    }
}
