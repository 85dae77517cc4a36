//! Maps an inbound command onto the stock ledger and cooldowns and describes
//! the reply. Platform concerns (roles, channels, DMs) stay outside: callers
//! arrive with their capabilities already resolved.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::command::{self, Command, Usage, BOT_PREFIX};
use crate::cooldown::{Action, Cooldowns, Gate};
use crate::error::StockError;
use crate::ledger::{self, StockLedger};
use crate::response::{Card, Payload, Rejection, Response, Tone, UserKey};

/// Shown when the stock file could not be written
const SAVE_FAILED: &str = "⚠️ Stock could not be saved, try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// May add and delete stock
    Admin,

    /// May generate codes
    Generate,
}

/// The user behind a command, as resolved by the platform.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub id: UserKey,
    pub capabilities: HashSet<Capability>,
}

impl Caller {
    pub fn new(id: UserKey, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            id,
            capabilities: capabilities.into_iter().collect(),
        }
    }
}

/// Whether one generation cooldown covers every item or each item separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownScope {
    User,
    Item,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub gen_cooldown: Duration,
    pub cooldown_scope: CooldownScope,
    /// Minimum spacing between any two commands of one user
    pub rate_limit: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gen_cooldown: Duration::from_secs(6 * 60 * 60),
            cooldown_scope: CooldownScope::User,
            rate_limit: None,
        }
    }
}

// Refuses the command unless the caller holds the capability
macro_rules! capability_gate {
    ($caller:ident, $capability:expr, $action:expr) => {
        if !$caller.capabilities.contains(&$capability) {
            debug!(user = $caller.id, action = $action, "missing capability");
            return Response::Rejected(Rejection::Unauthorized { action: $action });
        }
    };
}

/// Owns the ledger and the cooldowns. Cooldowns live in memory only, so a
/// restart forgets them.
#[derive(Debug)]
pub struct Dispatcher {
    ledger: StockLedger,
    cooldowns: Cooldowns<(UserKey, Action)>,
    settings: Settings,
}

impl Dispatcher {
    pub fn new(ledger: StockLedger, settings: Settings) -> Self {
        Self {
            ledger,
            cooldowns: Cooldowns::new(),
            settings,
        }
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    /// Run the command `name` with `args` for `caller`. `None` means the
    /// command is not ours and nothing should be sent.
    pub fn invoke(
        &mut self,
        name: &str,
        args: &[&str],
        caller: &Caller,
        now: Instant,
    ) -> Option<Response> {
        let command = Command::parse(name, args)?;

        if let Some(limit) = self.settings.rate_limit {
            let key = (caller.id, Action::AnyCommand);
            if let Gate::OnCooldown(remaining) = self.cooldowns.check_and_arm(key, now, limit) {
                debug!(user = caller.id, command = name, "rate limited");
                return Some(Response::Rejected(Rejection::RateLimited(remaining)));
            }
        }

        Some(match command {
            Ok(command) => self.execute(command, caller, now),
            Err(Usage(usage)) => Response::PublicReply(format!("❌ Usage: `{usage}`").into()),
        })
    }

    /// Run a raw chat message. Messages without the prefix and unknown
    /// commands yield `None`.
    pub fn invoke_message(
        &mut self,
        content: &str,
        caller: &Caller,
        now: Instant,
    ) -> Option<Response> {
        let (name, rest) = command::split(content)?;
        let args = match command::tokenize(rest) {
            Ok(args) => args,
            Err(err) => {
                if Command::parse(name, &[]).is_none() {
                    return None;
                }
                debug!(user = caller.id, command = name, error = %err, "malformed arguments");
                return Some(Response::PublicReply(format!("❌ {err}.").into()));
            }
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.invoke(name, &args, caller, now)
    }

    pub fn execute(&mut self, command: Command, caller: &Caller, now: Instant) -> Response {
        match command {
            Command::AddStock { item, codes } => self.add_stock(&item, codes, caller),
            Command::Generate { item } => self.generate(&item, caller, now),
            Command::Stock => self.stock(),
            Command::DeleteStock { item } => self.delete_stock(&item, caller),
            Command::Help => self.help(),
        }
    }

    fn add_stock(&mut self, item: &str, codes: Vec<String>, caller: &Caller) -> Response {
        capability_gate!(caller, Capability::Admin, "manage stock");

        let item = ledger::normalize(item);
        let reply = match self.ledger.add(&item, codes) {
            Ok(added) => format!(
                "✅ Added **{added}** code(s) to stock for **{item}**. Total: {}",
                self.ledger.count(&item)
            ),
            Err(StockError::Validation(_)) => {
                "❌ You must provide at least one code to add.".to_string()
            }
            Err(err) => return storage_failure(err),
        };
        Response::PublicReply(reply.into())
    }

    fn generate(&mut self, item: &str, caller: &Caller, now: Instant) -> Response {
        capability_gate!(caller, Capability::Generate, "generate codes");

        let item = ledger::normalize(item);
        let key = (
            caller.id,
            Action::Generate {
                item: match self.settings.cooldown_scope {
                    CooldownScope::User => None,
                    CooldownScope::Item => Some(item.clone()),
                },
            },
        );
        if let Gate::OnCooldown(remaining) = self.cooldowns.check(&key, now) {
            debug!(user = caller.id, %item, ?remaining, "generation on cooldown");
            return Response::Rejected(Rejection::OnCooldown(remaining));
        }

        let code = match self.ledger.generate(&item) {
            Ok(code) => code,
            Err(StockError::NotFound(item)) => {
                return Response::PublicReply(
                    format!("No stock available for **{item}**.").into(),
                )
            }
            Err(err) => return storage_failure(err),
        };
        // Only a dispensed code starts the cooldown
        self.cooldowns.arm(key, now, self.settings.gen_cooldown);

        let notice = Card::new(Tone::Info)
            .description(format!(
                "**Your {item} code has been generated successfully!**\n\n\
                 Check your DMs for the details 📬"
            ))
            .footer("Thanks for using our bot!");
        let payload = Card::new(Tone::Gift)
            .title("🎁 Your Code is Ready!")
            .description(format!(
                "**Item:** {item}\n**Code:**\n```{code}```\nRedeem it as soon as possible!"
            ))
            .footer("Generated with ❤️ by Stock Bot");

        Response::PrivateReply {
            target: caller.id,
            notice: notice.into(),
            payload: payload.into(),
        }
    }

    fn stock(&self) -> Response {
        let counts = self.ledger.list();
        if counts.is_empty() {
            let card = Card::new(Tone::Danger)
                .title("📦 Current Stock")
                .description(format!(
                    "❌ No stock available for any item.\nAdd stock using `{BOT_PREFIX}{} <item> <code>`",
                    command::ADD_CMD
                ));
            return Response::PublicReply(card.into());
        }

        let mut card = Card::new(Tone::Success)
            .title("📦 Current Stock")
            .description("Here's the list of all available items and their stock counts:");
        for (item, count) in &counts {
            card = card.field(
                format!("🎯 {item}"),
                format!("**{count}** code(s) available"),
            );
        }
        let card = card.footer(format!(
            "📊 Total items: {} | Use {} to get a code",
            counts.len(),
            command::GEN_USAGE
        ));
        Response::PublicReply(card.into())
    }

    fn delete_stock(&mut self, item: &str, caller: &Caller) -> Response {
        capability_gate!(caller, Capability::Admin, "manage stock");

        let reply = match self.ledger.delete(item) {
            Ok(_) => format!("🗑️ Deleted stock category **{}**.", ledger::normalize(item)),
            Err(StockError::NotFound(item)) => format!("❌ No stock found for **{item}**."),
            Err(err) => return storage_failure(err),
        };
        Response::PublicReply(reply.into())
    }

    fn help(&self) -> Response {
        let scope = match self.settings.cooldown_scope {
            CooldownScope::User => "per user",
            CooldownScope::Item => "per user and item",
        };
        let card = Card::new(Tone::Help)
            .title("📖 Bot Help Menu")
            .description("Here are all the available commands:")
            .field("➕ Add Stock", format!("`{}` (Admin only)", command::ADD_USAGE))
            .field(
                "🎁 Generate Code",
                format!(
                    "`{}` ({} cooldown {scope})",
                    command::GEN_USAGE,
                    describe(self.settings.gen_cooldown)
                ),
            )
            .field("📦 Check Stock", format!("`{}`", command::STOCK_USAGE))
            .field("🗑️ Delete Stock", format!("`{}` (Admin only)", command::DEL_USAGE))
            .footer("Only trusted roles can manage stock.");
        Response::PublicReply(Payload::Card(card))
    }
}

fn storage_failure(err: StockError) -> Response {
    error!(error = %err, "failed to persist stock");
    Response::PublicReply(SAVE_FAILED.into())
}

/// Short human form of a cooldown, e.g. `6h`, `90m`, `45s`.
fn describe(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}
