//! Command names, usage strings and message parsing.

use const_format::concatcp;

use crate::error::QuoteError;

/// The bot can be summoned through commands prefixed by:
pub const BOT_PREFIX: &str = "m.";

/// The name of the command used to add codes to an item (admins only)
pub const ADD_CMD: &str = "addstock";

/// The name of the command used to receive a code by direct message
pub const GEN_CMD: &str = "gen";

/// The name of the command used to show available stock
pub const STOCK_CMD: &str = "stock";

/// The name of the command used to remove an item and its codes (admins only)
pub const DEL_CMD: &str = "delstock";

/// The name of the command used to show the help menu
pub const HELP_CMD: &str = "helpme";

pub const ADD_USAGE: &str = concatcp!(BOT_PREFIX, ADD_CMD, " <item> <code1> <code2> ...");
pub const GEN_USAGE: &str = concatcp!(BOT_PREFIX, GEN_CMD, " <item>");
pub const STOCK_USAGE: &str = concatcp!(BOT_PREFIX, STOCK_CMD);
pub const DEL_USAGE: &str = concatcp!(BOT_PREFIX, DEL_CMD, " <item>");

/// Possible commands for the stock bot:
/// m.addstock <item> <codes...>: Adds codes to an item (admins only)
/// m.gen <item>: DMs the oldest code of an item, subject to a cooldown
/// m.stock: Lists every item with its number of codes
/// m.delstock <item>: Removes an item and all its codes (admins only)
/// m.helpme: Shows the help menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddStock { item: String, codes: Vec<String> },
    Generate { item: String },
    Stock,
    DeleteStock { item: String },
    Help,
}

/// A known command was invoked with missing arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage(pub &'static str);

/// Split a raw message into a command name and the rest of the line. Returns
/// `None` for messages that are not addressed to the bot.
pub fn split(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix(BOT_PREFIX)?;
    // The first word should be the name of the command, directly after the prefix
    if rest.starts_with(char::is_whitespace) {
        return None;
    }
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (name, args) = rest.split_at(end);
    if name.is_empty() {
        return None;
    }
    Some((name, args))
}

/// Opening quotes and the quote that closes each
const QUOTES: [(char, char); 2] = [('"', '"'), ('“', '”')];

/// Break an argument line into words. A word starting with a quote runs to
/// the matching closing quote, whitespace included, and `\"` inside it is a
/// literal quote. Quotes inside an unquoted word are kept as they are.
pub fn tokenize(line: &str) -> Result<Vec<String>, QuoteError> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(first) = chars.next() else {
            break;
        };

        let mut word = String::new();
        match QUOTES.iter().find(|(open, _)| *open == first) {
            Some(&(open, close)) => loop {
                match chars.next() {
                    None => return Err(QuoteError::Unclosed),
                    Some('\\') => match chars.next_if(|c| *c == close || *c == open) {
                        Some(quote) => word.push(quote),
                        None => word.push('\\'),
                    },
                    Some(c) if c == close => {
                        if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                            return Err(QuoteError::TextAfterQuote);
                        }
                        break;
                    }
                    Some(c) => word.push(c),
                }
            },
            None => {
                word.push(first);
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    word.push(c);
                }
            }
        }
        args.push(word);
    }

    Ok(args)
}

impl Command {
    /// Build a command from its name and arguments. `None` means the name is
    /// not one of ours; unknown commands are ignored.
    pub fn parse(name: &str, args: &[&str]) -> Option<Result<Self, Usage>> {
        let command = match name {
            ADD_CMD => match args.split_first() {
                // A missing code list is a validation failure reported by the ledger
                Some((item, codes)) => Ok(Command::AddStock {
                    item: item.to_string(),
                    codes: codes.iter().map(|c| c.to_string()).collect(),
                }),
                None => Err(Usage(ADD_USAGE)),
            },
            GEN_CMD => match args.first() {
                Some(item) => Ok(Command::Generate {
                    item: item.to_string(),
                }),
                None => Err(Usage(GEN_USAGE)),
            },
            STOCK_CMD => Ok(Command::Stock),
            DEL_CMD => match args.first() {
                Some(item) => Ok(Command::DeleteStock {
                    item: item.to_string(),
                }),
                None => Err(Usage(DEL_USAGE)),
            },
            HELP_CMD => Ok(Command::Help),
            _ => return None,
        };
        Some(command)
    }
}
