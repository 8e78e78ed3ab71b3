//! Slash-command recognition, kept free of teloxide types so it can be
//! unit-tested as plain string handling.

/// A recognised bot command, arguments still unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Add(String),
    Today,
    On(String),
    Daily(String),
    Tz(String),
    Help,
    Unknown(String),
}

/// Recognise `text` as a command. Returns `None` for plain messages.
///
/// Accepts the `/cmd@BotName` form Telegram uses in groups; the command
/// name is case-insensitive, arguments are passed through verbatim.
pub fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let (head, args) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    let name = head[1..].split('@').next().unwrap_or("").to_ascii_lowercase();

    Some(match name.as_str() {
        "start" => Command::Start,
        "add" => Command::Add(args.to_string()),
        "today" => Command::Today,
        "on" => Command::On(args.to_string()),
        "daily" => Command::Daily(args.to_string()),
        "tz" => Command::Tz(args.to_string()),
        "help" => Command::Help,
        _ => Command::Unknown(name),
    })
}

pub const HELP_TEXT: &str = "I keep track of your tasks and ping you before they start.\n\n\
Add a task:\n\
  /add 15:30 24.12 Buy the tree\n\
  ...or just tell me in your own words.\n\n\
Commands:\n\
  /today — tasks for today\n\
  /on DD.MM — tasks for a date\n\
  /daily HH:MM — when to send the morning summary\n\
  /tz Area/City — set your timezone\n\
  /help — this message";
