//! Fixed role → permission table.

use reservo_core::UserRole;
use serde::Serialize;

/// A named capability granted per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Permission {
    ViewUsers,
    CreateUsers,
    UpdateUsers,
    DeleteUsers,
    ViewReservations,
    ManageReservations,
    ViewSettings,
    UpdateSettings,
    ViewLogs,
    ManageAdmins,
    ViewOwnProfile,
    UpdateOwnProfile,
    CreateReservations,
    ViewOwnReservations,
}

const ADMIN: &[Permission] = &[
    Permission::ViewUsers,
    Permission::CreateUsers,
    Permission::UpdateUsers,
    Permission::DeleteUsers,
    Permission::ViewReservations,
    Permission::ManageReservations,
    Permission::ViewSettings,
    Permission::UpdateSettings,
    Permission::ViewLogs,
    Permission::ManageAdmins,
];

const MANAGER: &[Permission] = &[
    Permission::ViewUsers,
    Permission::ViewReservations,
    Permission::ManageReservations,
    Permission::ViewSettings,
];

const USER: &[Permission] = &[
    Permission::ViewOwnProfile,
    Permission::UpdateOwnProfile,
    Permission::CreateReservations,
    Permission::ViewOwnReservations,
];

/// Permissions granted to `role`.
#[must_use]
pub const fn role_permissions(role: UserRole) -> &'static [Permission] {
    match role {
        UserRole::Admin => ADMIN,
        UserRole::Manager => MANAGER,
        UserRole::User => USER,
    }
}

impl Permission {
    /// Whether `role` holds this permission.
    #[must_use]
    pub fn granted_to(self, role: UserRole) -> bool {
        role_permissions(role).contains(&self)
    }
}
