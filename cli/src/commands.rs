//! Slash commands typed at the prompt.

use parley_types::{ChatId, PromptId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Tokens,
    Messages,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    New,
    Chats,
    Open(ChatId),
    Cancel,
    /// Apply a saved prompt to the current draft.
    Prompt(PromptId),
    Undo,
    Prompts,
    AddPrompt { name: String, prompt: String },
    /// Open a prompt in the panel.
    Panel(PromptId),
    /// Send text through the open panel prompt.
    Ask(String),
    Draft(String),
    Limit(LimitKind, u32),
    Temperature(f32),
    Model(String),
    Pin(usize),
    Exclude(usize),
    Include(usize),
    Show,
    Stats,
    Export,
    Help,
    Quit,
}

pub const HELP: &str = "\
/new                      start a new chat
/show                     show the current chat
/chats                    list chats
/open <id>                open a chat
/cancel                   stop the current response
/draft <text>             put text in the input box without sending
/prompt <id>              apply a saved prompt to the draft
/undo                     restore the draft from before /prompt
/prompts                  list saved prompts
/addprompt <name> | <instruction>
/panel <id>               open a prompt in the panel
/ask <text>               send text to the panel prompt
/limit tokens|messages <n>
/temperature <t>  /model <name>
/pin <n>  /exclude <n>  /include <n>   (n = message number from /show)
/stats  /export  /quit";

/// Parse one input line. Lines not starting with `/` are not commands.
pub fn parse(line: &str) -> Option<Result<Command, String>> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    Some(parse_command(name, arg))
}

fn parse_command(name: &str, arg: &str) -> Result<Command, String> {
    let command = match name {
        "new" => Command::New,
        "chats" => Command::Chats,
        "open" => Command::Open(ChatId::new(number(arg)?)),
        "cancel" => Command::Cancel,
        "prompt" => Command::Prompt(PromptId::new(number(arg)?)),
        "undo" => Command::Undo,
        "prompts" => Command::Prompts,
        "addprompt" => {
            let (name, prompt) = arg
                .split_once('|')
                .map(|(n, p)| (n.trim(), p.trim()))
                .filter(|(n, p)| !n.is_empty() && !p.is_empty())
                .ok_or_else(|| "usage: /addprompt <name> | <instruction>".to_string())?;
            Command::AddPrompt {
                name: name.to_string(),
                prompt: prompt.to_string(),
            }
        }
        "panel" => Command::Panel(PromptId::new(number(arg)?)),
        "ask" => Command::Ask(arg.to_string()),
        "draft" => Command::Draft(arg.to_string()),
        "limit" => {
            let (kind, value) = arg
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: /limit tokens|messages <n>".to_string())?;
            let kind = match kind {
                "tokens" => LimitKind::Tokens,
                "messages" => LimitKind::Messages,
                other => return Err(format!("unknown limit {other:?}")),
            };
            let value = value
                .trim()
                .parse()
                .map_err(|_| format!("invalid limit {value:?}"))?;
            Command::Limit(kind, value)
        }
        "temperature" => Command::Temperature(
            arg.parse()
                .map_err(|_| format!("invalid temperature {arg:?}"))?,
        ),
        "model" if !arg.is_empty() => Command::Model(arg.to_string()),
        "pin" => Command::Pin(index(arg)?),
        "exclude" => Command::Exclude(index(arg)?),
        "include" => Command::Include(index(arg)?),
        "show" => Command::Show,
        "stats" => Command::Stats,
        "export" => Command::Export,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command /{other}; try /help")),
    };
    Ok(command)
}

fn number(arg: &str) -> Result<i64, String> {
    arg.parse().map_err(|_| format!("expected a number, got {arg:?}"))
}

/// One-based message numbers as shown to the user.
fn index(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("expected a message number, got {arg:?}")),
    }
}
