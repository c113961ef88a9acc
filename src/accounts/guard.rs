//! Route guards for the auth server's pages.
//!
//! Each guard either lets the request through or returns a [`Rejection`]
//! (redirect target plus optional flash message). `admin_guarded` applies
//! them in a fixed order: login first, then admin.

use super::store::UserStore;
use super::UserRecord;

pub const LOGIN_PATH: &str = "/login";
pub const INDEX_PATH: &str = "/";
pub const ADMIN_ONLY_MESSAGE: &str = "Access denied: Admins only.";

/// Per-request session context handed to the guards explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<u64>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(id: u64) -> Self {
        Self { user_id: Some(id) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub redirect_to: &'static str,
    pub flash: Option<&'static str>,
}

/// The logged-in user, or a redirect to the login page.
///
/// A session pointing at a deleted user counts as logged out, and so does a
/// session whose user cannot be loaded.
pub fn login_required(session: &Session, store: &UserStore) -> Result<UserRecord, Rejection> {
    session
        .user_id
        .and_then(|id| match store.find_by_id(id) {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("Cannot load session user {}: {}", id, e);
                None
            }
        })
        .ok_or(Rejection {
            redirect_to: LOGIN_PATH,
            flash: None,
        })
}

pub fn admin_required(user: &UserRecord) -> Result<(), Rejection> {
    if user.is_admin {
        Ok(())
    } else {
        tracing::warn!("Non-admin '{}' tried to reach an admin page", user.username);
        Err(Rejection {
            redirect_to: INDEX_PATH,
            flash: Some(ADMIN_ONLY_MESSAGE),
        })
    }
}

/// `login_required` → `admin_required` → `handler`.
pub fn admin_guarded<T, F>(session: &Session, store: &mut UserStore, handler: F) -> Result<T, Rejection>
where
    F: FnOnce(&mut UserStore, &UserRecord) -> T,
{
    let user = login_required(session, store)?;
    admin_required(&user)?;
    Ok(handler(store, &user))
}
