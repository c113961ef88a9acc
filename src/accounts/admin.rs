//! 계정 관리 작업 (관리 CLI + 관리자 페이지가 사용)

use super::password::hash_password_with;
use super::store::UserStore;
use super::{AccountError, UserRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { id: u64 },
    /// The username already existed; it is now an admin with the new password.
    Promoted { id: u64 },
}

impl CreateOutcome {
    pub fn id(self) -> u64 {
        match self {
            Self::Created { id } | Self::Promoted { id } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct UserUpdate<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub is_admin: bool,
    /// Empty or `None` keeps the current password.
    pub password: Option<&'a str>,
}

/// Create an admin, or promote an existing username and reset its password.
///
/// Looks the user up by username only; an existing record keeps its email.
pub fn create_admin(
    store: &mut UserStore,
    username: &str,
    email: &str,
    password: &str,
) -> Result<CreateOutcome, AccountError> {
    let hash = hash_password_with(password, store.hash_iterations());
    let outcome = store.transaction(|table| {
        if let Some(existing) = table.find_by_username(username)? {
            table.set_admin(existing.id, true)?;
            table.set_password_hash(existing.id, &hash)?;
            return Ok(CreateOutcome::Promoted { id: existing.id });
        }
        if table.find_conflict(username, email, None)?.is_some() {
            return Err(AccountError::AlreadyExists);
        }
        let id = table.insert(username, email, &hash, true)?;
        Ok(CreateOutcome::Created { id })
    })?;
    tracing::info!("Admin '{}' set ({:?})", username, outcome);
    Ok(outcome)
}

/// Self-service signup. Always creates a regular user.
pub fn signup(store: &mut UserStore, username: &str, email: &str, password: &str) -> Result<u64, AccountError> {
    add_user(
        store,
        NewUser {
            username,
            email,
            password,
            is_admin: false,
        },
    )
}

/// Admin "add user". Rejects a username or email that is already taken.
pub fn add_user(store: &mut UserStore, new: NewUser<'_>) -> Result<u64, AccountError> {
    if store.find_conflict(new.username, new.email, None)?.is_some() {
        return Err(AccountError::AlreadyExists);
    }
    let hash = hash_password_with(new.password, store.hash_iterations());
    // UNIQUE 제약이 해시 계산 중 끼어든 쓰기까지 막음
    let id = store.transaction(|table| table.insert(new.username, new.email, &hash, new.is_admin))?;
    tracing::info!("User '{}' added (id {}, admin: {})", new.username, id, new.is_admin);
    Ok(id)
}

/// Admin "edit user".
pub fn edit_user(store: &mut UserStore, id: u64, update: UserUpdate<'_>) -> Result<(), AccountError> {
    let hash = update
        .password
        .filter(|p| !p.is_empty())
        .map(|p| hash_password_with(p, store.hash_iterations()));
    store.transaction(|table| {
        if table.find_by_id(id)?.is_none() {
            return Err(AccountError::NotFound(id));
        }
        if table.find_conflict(update.username, update.email, Some(id))?.is_some() {
            return Err(AccountError::AlreadyExists);
        }
        table.update(id, update.username, update.email, update.is_admin)?;
        if let Some(hash) = &hash {
            table.set_password_hash(id, hash)?;
        }
        Ok(())
    })?;
    tracing::info!("User {} updated", id);
    Ok(())
}

/// Admin "delete user". An admin can never delete their own account.
pub fn delete_user(store: &mut UserStore, actor_id: u64, target_id: u64) -> Result<UserRecord, AccountError> {
    if actor_id == target_id {
        return Err(AccountError::SelfDeletion);
    }
    let removed = store.transaction(|table| table.remove(target_id)?.ok_or(AccountError::NotFound(target_id)))?;
    tracing::info!("User '{}' deleted by {}", removed.username, actor_id);
    Ok(removed)
}

pub fn authenticate(store: &UserStore, username: &str, password: &str) -> Result<Option<UserRecord>, AccountError> {
    Ok(store
        .find_by_username(username)?
        .filter(|u| u.check_password(password)))
}

/// Change one's own password after re-checking the current one.
pub fn change_password(
    store: &mut UserStore,
    user_id: u64,
    current: &str,
    new_password: &str,
) -> Result<(), AccountError> {
    let user = store.find_by_id(user_id)?.ok_or(AccountError::NotFound(user_id))?;
    if !user.check_password(current) {
        return Err(AccountError::InvalidCredentials);
    }
    let hash = hash_password_with(new_password, store.hash_iterations());
    store.transaction(|table| table.set_password_hash(user_id, &hash))
}
