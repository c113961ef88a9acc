//! 사용자 계정: 인증 서버와 관리 CLI가 공유하는 사용자 저장소
//!
//! 웹 계층(로그인 페이지, 세션 쿠키)은 외부 서비스가 담당하고, 여기서는
//! 레코드 저장과 관리 작업만 다룹니다.

pub mod admin;
pub mod guard;
pub mod password;
pub mod store;

pub use admin::{
    add_user, authenticate, change_password, create_admin, delete_user, edit_user, signup, CreateOutcome,
    NewUser, UserUpdate,
};
pub use guard::{admin_guarded, admin_required, login_required, Rejection, Session};
pub use store::{UserStore, UserTable};

/// 인증 서버의 `sqlite:///users.db`가 가리키는 위치 (Flask 인스턴스 폴더 기준)
pub const DEFAULT_USERS_DB: &str = "instance/users.db";

/// `DASHKIT_USERS_DB`, else [`DEFAULT_USERS_DB`].
pub fn users_db_path() -> String {
    std::env::var("DASHKIT_USERS_DB").unwrap_or_else(|_| DEFAULT_USERS_DB.to_string())
}

/// One row of the auth server's `user` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

impl UserRecord {
    pub fn check_password(&self, password: &str) -> bool {
        password::verify_password(password, &self.password_hash)
    }

    pub fn role_tag(&self) -> &'static str {
        if self.is_admin {
            "[ADMIN]"
        } else {
            "[USER]"
        }
    }
}

/// Messages match what the web layer flashes to the user.
#[derive(thiserror::Error, Debug)]
pub enum AccountError {
    #[error("Username or email already exists")]
    AlreadyExists,

    #[error("You cannot delete your own admin account!")]
    SelfDeletion,

    #[error("User {0} not found")]
    NotFound(u64),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("cannot create directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open user database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("user database error: {0}")]
    Database(#[from] rusqlite::Error),
}
