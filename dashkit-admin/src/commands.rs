//! `manage_admin` 명령 파싱과 실행
//!
//! ```text
//! manage_admin create <username> <email> <password>   # 관리자 생성 또는 승격
//! manage_admin list                                    # 사용자 목록
//! ```

use std::io::Write;

use dashkit::accounts::{create_admin, CreateOutcome, UserStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        username: String,
        email: String,
        password: String,
    },
    List,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageScope {
    All,
    Create,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum UsageError {
    #[error("no command given")]
    NoCommand,
    #[error("Error: Missing arguments for create.")]
    CreateArgs,
    #[error("Unknown command: {0}")]
    Unknown(String),
}

impl UsageError {
    /// Line printed above the usage text, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::NoCommand => None,
            other => Some(other.to_string()),
        }
    }

    pub fn usage_scope(&self) -> UsageScope {
        match self {
            Self::CreateArgs => UsageScope::Create,
            _ => UsageScope::All,
        }
    }
}

pub fn usage(scope: UsageScope) -> &'static str {
    match scope {
        UsageScope::All => {
            "Usage:\n  manage_admin create <username> <email> <password>\n  manage_admin list\n"
        }
        UsageScope::Create => "Usage: manage_admin create <username> <email> <password>\n",
    }
}

pub fn parse(args: &[String]) -> Result<Command, UsageError> {
    let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
    match args_ref.as_slice() {
        [] => Err(UsageError::NoCommand),
        ["help" | "--help" | "-h", ..] => Ok(Command::Help),
        ["create", username, email, password] => Ok(Command::Create {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }),
        ["create", ..] => Err(UsageError::CreateArgs),
        ["list", ..] => Ok(Command::List),
        [other, ..] => Err(UsageError::Unknown(other.to_string())),
    }
}

pub fn run(command: Command, store: &mut UserStore, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Create {
            username,
            email,
            password,
        } => {
            if store.find_by_username(&username)?.is_some() {
                writeln!(
                    out,
                    "User {} already exists. Promoting to admin and resetting password...",
                    username
                )?;
            }
            let outcome = create_admin(store, &username, &email, &password)?;
            if let CreateOutcome::Created { id } = outcome {
                tracing::debug!("Created admin '{}' with id {}", username, id);
            }
            writeln!(out, "Successfully set {} as Admin.", username)?;
        }
        Command::List => {
            writeln!(out)?;
            writeln!(out, "--- User List ---")?;
            for u in store.list()? {
                writeln!(
                    out,
                    "ID: {} | Username: {} | Email: {} | Status: {}",
                    u.id,
                    u.username,
                    u.email,
                    u.role_tag()
                )?;
            }
            writeln!(out, "-----------------")?;
            writeln!(out)?;
        }
        Command::Help => write!(out, "{}", usage(UsageScope::All))?,
    }
    Ok(())
}
