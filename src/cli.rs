use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::IdentityResolver;
use crate::engine::{Engine, EngineError};
use crate::model::RoomId;

#[derive(Parser, Debug)]
#[command(name = "roomkeep")]
#[command(about = "Hotel room inventory and reservations")]
#[command(after_help = "Without a command, reads one command per line from stdin. \
Arguments containing spaces may be wrapped in double quotes.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Register a hotel and print its access token
    Create {
        name: String,
        password: String,
        rooms: u32,
    },

    /// Exchange a hotel name and password for a token
    Login { name: String, password: String },

    /// Show the hotel behind a token
    Show { token: String },

    /// Look up a hotel by name
    Find { name: String },

    /// Rename a hotel or change its password
    Update {
        token: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },

    /// Show one room
    Room {
        token: String,
        #[arg(value_name = "ROOM")]
        room_id: RoomId,
    },

    /// Reserve a room; the remaining words form the owner name
    Reserve {
        token: String,
        #[arg(value_name = "ROOM")]
        room_id: RoomId,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        owner: Vec<String>,
    },

    /// Check out a reserved room
    Checkout {
        token: String,
        #[arg(value_name = "ROOM")]
        room_id: RoomId,
    },

    /// Append vacant rooms
    Grow { token: String, count: u32 },

    /// Remove the highest-numbered rooms
    Shrink { token: String, count: u32 },

    /// Check the hotel's inventory invariants
    Verify { token: String },

    /// Rewrite the WAL as a snapshot of current state
    Compact,
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Command::Create { .. } => "create",
            Command::Login { .. } => "login",
            Command::Show { .. } => "show",
            Command::Find { .. } => "find",
            Command::Update { .. } => "update",
            Command::Room { .. } => "room",
            Command::Reserve { .. } => "reserve",
            Command::Checkout { .. } => "checkout",
            Command::Grow { .. } => "grow",
            Command::Shrink { .. } => "shrink",
            Command::Verify { .. } => "verify",
            Command::Compact => "compact",
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("empty command")]
    Empty,
    #[error("unterminated quote")]
    UnterminatedQuote,
    #[error(transparent)]
    Parse(#[from] clap::Error),
}

/// Split on whitespace, keeping double-quoted runs together.
pub fn split_args(line: &str) -> Result<Vec<String>, CliError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return Err(CliError::UnterminatedQuote);
    }
    if has_token {
        args.push(current);
    }
    Ok(args)
}

/// Parse one shell line with the same grammar as the process arguments.
pub fn parse_line(line: &str) -> Result<Command, CliError> {
    let words = split_args(line)?;
    if words.is_empty() {
        return Err(CliError::Empty);
    }
    let cli = Cli::try_parse_from(std::iter::once("roomkeep".to_string()).chain(words))?;
    cli.command.ok_or(CliError::Empty)
}

/// Run a parsed command and render its result as JSON.
pub async fn execute(engine: &Engine, cmd: Command) -> Result<Value, EngineError> {
    match cmd {
        Command::Create { name, password, rooms } => {
            let (hotel, token) = engine.create_hotel(&name, &password, rooms).await?;
            Ok(json!({ "hotel": hotel, "token": token }))
        }
        Command::Login { name, password } => {
            let (hotel, token) = engine.login(&name, &password).await?;
            Ok(json!({ "hotel": hotel, "token": token }))
        }
        Command::Show { token } => {
            let id = engine.resolve(&token).await?;
            Ok(json!(engine.get_own_hotel(id).await?))
        }
        Command::Find { name } => Ok(json!(engine.get_hotel_by_name(&name).await?)),
        Command::Update { token, name, password } => {
            let id = engine.resolve(&token).await?;
            let hotel = engine
                .update_hotel_info(id, name.as_deref(), password.as_deref())
                .await?;
            Ok(json!(hotel))
        }
        Command::Room { token, room_id } => {
            let id = engine.resolve(&token).await?;
            Ok(json!(engine.get_room(id, room_id).await?))
        }
        Command::Reserve { token, room_id, owner } => {
            let id = engine.resolve(&token).await?;
            let owner = owner.join(" ");
            Ok(json!(engine.reserve_room(id, room_id, &owner).await?))
        }
        Command::Checkout { token, room_id } => {
            let id = engine.resolve(&token).await?;
            Ok(json!(engine.checkout_room(id, room_id).await?))
        }
        Command::Grow { token, count } => {
            let id = engine.resolve(&token).await?;
            Ok(json!(engine.grow_capacity(id, count).await?))
        }
        Command::Shrink { token, count } => {
            let id = engine.resolve(&token).await?;
            Ok(json!(engine.shrink_capacity(id, count).await?))
        }
        Command::Verify { token } => {
            let id = engine.resolve(&token).await?;
            let violation = engine.verify(id).await?;
            Ok(json!({ "consistent": violation.is_none(), "violation": violation }))
        }
        Command::Compact => {
            engine.compact_wal().await?;
            Ok(json!({ "compacted": true }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse_error(line: &str) -> ErrorKind {
        match parse_line(line) {
            Err(CliError::Parse(e)) => e.kind(),
            other => panic!("expected a parse error for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn split_plain_and_quoted() {
        assert_eq!(split_args("grow abc 3").unwrap(), vec!["grow", "abc", "3"]);
        assert_eq!(
            split_args(r#"create "Grand Budapest" password1 10"#).unwrap(),
            vec!["create", "Grand Budapest", "password1", "10"]
        );
        assert_eq!(split_args(r#"find """#).unwrap(), vec!["find", ""]);
        assert_eq!(split_args("   ").unwrap(), Vec::<String>::new());
        assert!(matches!(split_args(r#"find "open"#), Err(CliError::UnterminatedQuote)));
    }

    #[test]
    fn command_definitions_are_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_create() {
        let cmd = parse_line(r#"create "Hotel Rio" s3cretpass 25"#).unwrap();
        assert_eq!(
            cmd,
            Command::Create {
                name: "Hotel Rio".into(),
                password: "s3cretpass".into(),
                rooms: 25,
            }
        );
        assert_eq!(cmd.label(), "create");
    }

    #[test]
    fn argv_and_shell_lines_parse_alike() {
        let cli = Cli::try_parse_from(["roomkeep", "grow", "tok", "3"]).unwrap();
        assert_eq!(cli.command, Some(parse_line("grow tok 3").unwrap()));

        let cli = Cli::try_parse_from(["roomkeep"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn parse_reserve_collects_owner_words() {
        let cmd = parse_line("reserve tok 4 Ada King Lovelace").unwrap();
        assert_eq!(
            cmd,
            Command::Reserve {
                token: "tok".into(),
                room_id: 4,
                owner: vec!["Ada".into(), "King".into(), "Lovelace".into()],
            }
        );
        let cmd = parse_line(r#"reserve tok 4 "Jean-Luc" -the-elder"#).unwrap();
        assert!(matches!(cmd, Command::Reserve { owner, .. } if owner == ["Jean-Luc", "-the-elder"]));
    }

    #[test]
    fn parse_update_options() {
        let cmd = parse_line("update tok --name Lakeview --password newpassword").unwrap();
        assert_eq!(
            cmd,
            Command::Update {
                token: "tok".into(),
                name: Some("Lakeview".into()),
                password: Some("newpassword".into()),
            }
        );
        let cmd = parse_line(r#"update tok --name "Lake View""#).unwrap();
        assert!(matches!(cmd, Command::Update { name: Some(n), password: None, .. } if n == "Lake View"));
        let cmd = parse_line("update tok").unwrap();
        assert!(matches!(cmd, Command::Update { name: None, password: None, .. }));
        assert_eq!(parse_error("update tok --colour blue"), ErrorKind::UnknownArgument);
    }

    #[test]
    fn missing_and_malformed_arguments() {
        assert!(matches!(parse_line(""), Err(CliError::Empty)));
        assert_eq!(parse_error("grow tok"), ErrorKind::MissingRequiredArgument);
        assert_eq!(parse_error("reserve tok 1"), ErrorKind::MissingRequiredArgument);
        assert_eq!(parse_error("checkout tok one"), ErrorKind::ValueValidation);
        assert_eq!(parse_error("create hotel pw 99999999999"), ErrorKind::ValueValidation);
        assert!(matches!(parse_line("shrink tok -1"), Err(CliError::Parse(_))));
        assert_eq!(parse_error("compact now"), ErrorKind::UnknownArgument);
        assert_eq!(parse_error("dance"), ErrorKind::InvalidSubcommand);
    }
}
