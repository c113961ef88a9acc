use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};

use super::password::DEFAULT_PBKDF2_ITERATIONS;
use super::{AccountError, UserRecord};

/// 다른 프로세스(인증 서버)가 쓰기 중일 때 기다리는 시간
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Same layout the auth server's `User` model creates. Only applied when the
/// table does not exist yet.
const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS "user" (
        id INTEGER NOT NULL PRIMARY KEY,
        username VARCHAR(80) NOT NULL UNIQUE,
        email VARCHAR(120) NOT NULL UNIQUE,
        password_hash VARCHAR(256),
        is_admin BOOLEAN
    );
"#;

const SELECT_USER: &str = r#"SELECT id, username, email, password_hash, is_admin FROM "user""#;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        is_admin: row.get::<_, Option<bool>>(4)?.unwrap_or(false),
    })
}

/// UNIQUE 위반은 도메인 오류로
fn map_write_error(e: rusqlite::Error) -> AccountError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            AccountError::AlreadyExists
        }
        other => AccountError::Database(other),
    }
}

fn list_users(conn: &Connection) -> Result<Vec<UserRecord>, AccountError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_USER))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

fn user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRecord>, AccountError> {
    let sql = format!("{} WHERE username = ?1", SELECT_USER);
    Ok(conn.query_row(&sql, params![username], user_from_row).optional()?)
}

fn user_by_id(conn: &Connection, id: u64) -> Result<Option<UserRecord>, AccountError> {
    let sql = format!("{} WHERE id = ?1", SELECT_USER);
    Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
}

fn conflicting_user(
    conn: &Connection,
    username: &str,
    email: &str,
    except: Option<u64>,
) -> Result<Option<UserRecord>, AccountError> {
    let sql = format!(
        "{} WHERE (username = ?1 OR email = ?2) AND (?3 IS NULL OR id != ?3) LIMIT 1",
        SELECT_USER
    );
    Ok(conn
        .query_row(&sql, params![username, email, except], user_from_row)
        .optional()?)
}

/// The `user` table inside an open write transaction.
pub struct UserTable<'a> {
    conn: &'a Connection,
}

impl UserTable<'_> {
    pub fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AccountError> {
        user_by_username(self.conn, username)
    }

    pub fn find_by_id(&self, id: u64) -> Result<Option<UserRecord>, AccountError> {
        user_by_id(self.conn, id)
    }

    /// A record other than `except` that already uses `username` or `email`.
    pub fn find_conflict(
        &self,
        username: &str,
        email: &str,
        except: Option<u64>,
    ) -> Result<Option<UserRecord>, AccountError> {
        conflicting_user(self.conn, username, email, except)
    }

    /// Insert a record and return the ID SQLite assigned to it.
    pub fn insert(&self, username: &str, email: &str, password_hash: &str, is_admin: bool) -> Result<u64, AccountError> {
        self.conn
            .execute(
                r#"INSERT INTO "user" (username, email, password_hash, is_admin) VALUES (?1, ?2, ?3, ?4)"#,
                params![username, email, password_hash, is_admin],
            )
            .map_err(map_write_error)?;
        let rowid = self.conn.last_insert_rowid();
        u64::try_from(rowid).map_err(|_| AccountError::Database(rusqlite::Error::IntegralValueOutOfRange(0, rowid)))
    }

    pub fn update(&self, id: u64, username: &str, email: &str, is_admin: bool) -> Result<(), AccountError> {
        let changed = self
            .conn
            .execute(
                r#"UPDATE "user" SET username = ?1, email = ?2, is_admin = ?3 WHERE id = ?4"#,
                params![username, email, is_admin, id],
            )
            .map_err(map_write_error)?;
        if changed == 0 {
            return Err(AccountError::NotFound(id));
        }
        Ok(())
    }

    pub fn set_password_hash(&self, id: u64, password_hash: &str) -> Result<(), AccountError> {
        let changed = self.conn.execute(
            r#"UPDATE "user" SET password_hash = ?1 WHERE id = ?2"#,
            params![password_hash, id],
        )?;
        if changed == 0 {
            return Err(AccountError::NotFound(id));
        }
        Ok(())
    }

    pub fn set_admin(&self, id: u64, is_admin: bool) -> Result<(), AccountError> {
        let changed = self
            .conn
            .execute(r#"UPDATE "user" SET is_admin = ?1 WHERE id = ?2"#, params![is_admin, id])?;
        if changed == 0 {
            return Err(AccountError::NotFound(id));
        }
        Ok(())
    }

    pub fn remove(&self, id: u64) -> Result<Option<UserRecord>, AccountError> {
        let Some(user) = self.find_by_id(id)? else {
            return Ok(None);
        };
        self.conn.execute(r#"DELETE FROM "user" WHERE id = ?1"#, params![id])?;
        Ok(Some(user))
    }
}

/// 사용자 저장소: 인증 서버와 공유하는 SQLite `user` 테이블
///
/// Reads go straight to the database. Every write goes through
/// [`UserStore::transaction`], which holds SQLite's write lock for the whole
/// closure, so concurrent writers (this CLI, the auth server) serialize
/// instead of overwriting each other.
pub struct UserStore {
    path: PathBuf,
    conn: Connection,
    hash_iterations: u32,
}

impl UserStore {
    /// Open the database at `path`, creating it and the `user` table if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AccountError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| AccountError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let open_err = |source: rusqlite::Error| AccountError::Open {
            path: path.display().to_string(),
            source,
        };
        let conn = Connection::open(&path).map_err(open_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;

        tracing::debug!("Opened user database {}", path.display());
        Ok(Self {
            path,
            conn,
            hash_iterations: DEFAULT_PBKDF2_ITERATIONS,
        })
    }

    /// PBKDF2 iterations for hashes written through this store.
    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations.max(1);
        self
    }

    pub fn hash_iterations(&self) -> u32 {
        self.hash_iterations
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ID 순
    pub fn list(&self) -> Result<Vec<UserRecord>, AccountError> {
        list_users(&self.conn)
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AccountError> {
        user_by_username(&self.conn, username)
    }

    pub fn find_by_id(&self, id: u64) -> Result<Option<UserRecord>, AccountError> {
        user_by_id(&self.conn, id)
    }

    pub fn find_conflict(
        &self,
        username: &str,
        email: &str,
        except: Option<u64>,
    ) -> Result<Option<UserRecord>, AccountError> {
        conflicting_user(&self.conn, username, email, except)
    }

    /// Run `f` inside an immediate (write-locked) transaction and commit if it
    /// succeeds. On error the transaction is rolled back.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T, AccountError>
    where
        F: FnOnce(&UserTable<'_>) -> Result<T, AccountError>,
    {
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&UserTable { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }
}
