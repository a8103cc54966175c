//! Signed-in account context, passed explicitly to every view.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The auth record of a registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    /// Display name captured at sign-up
    pub full_name: Option<String>,
}

/// An authenticated session. Created by sign-in or sign-up, consumed by sign-out.
#[derive(Debug, Clone)]
pub struct Session {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.account.id
    }

    pub fn is(&self, user_id: Uuid) -> bool {
        self.account.id == user_id
    }
}
