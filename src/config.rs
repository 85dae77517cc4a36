use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::{CooldownScope, Settings};
use crate::error::ConfigError;

/// Where the bot token should be stored in the process or .env environment
/// variables
pub const SECRET_KEY: &str = "BOT_TOKEN";

/// Path of the stock file
pub const STOCK_FILE_KEY: &str = "STOCK_FILE";

/// Roles allowed to add and delete stock
pub const ADMIN_ROLES_KEY: &str = "ADMIN_ROLES";

/// Roles allowed to generate codes. Unset means everyone may generate.
pub const GEN_ROLES_KEY: &str = "GEN_ROLES";

/// Seconds a user waits between two generated codes
pub const GEN_COOLDOWN_KEY: &str = "GEN_COOLDOWN_SECS";

/// Whether the generation cooldown is shared across items (`user`) or kept
/// per item (`item`)
pub const GEN_SCOPE_KEY: &str = "GEN_COOLDOWN_SCOPE";

/// Milliseconds a user waits between any two commands; 0 disables the limiter
pub const RATE_LIMIT_KEY: &str = "COMMAND_RATE_LIMIT_MS";

const DEFAULT_STOCK_FILE: &str = "stock.json";
const DEFAULT_ADMIN_ROLE: &str = "Admin";
const DEFAULT_GEN_COOLDOWN_SECS: u64 = 6 * 60 * 60;

/// Upper bound for any configured duration: ten years
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// A role as written in the configuration: all digits is a role ID, anything
/// else a role name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSelector {
    Id(u64),
    Name(String),
}

impl RoleSelector {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<u64>() {
            Ok(id) if raw.bytes().all(|b| b.is_ascii_digit()) => RoleSelector::Id(id),
            _ => RoleSelector::Name(raw.to_string()),
        }
    }

    pub fn matches(&self, role_id: u64, role_name: &str) -> bool {
        match self {
            RoleSelector::Id(id) => *id == role_id,
            RoleSelector::Name(name) => name == role_name,
        }
    }
}

fn parse_roles(raw: &str) -> Vec<RoleSelector> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RoleSelector::parse)
        .collect()
}

pub struct Config {
    pub token: String,
    pub stock_file: PathBuf,
    pub admin_roles: Vec<RoleSelector>,
    /// Empty means every caller holds the generation capability
    pub gen_roles: Vec<RoleSelector>,
    pub gen_cooldown: Duration,
    pub cooldown_scope: CooldownScope,
    pub rate_limit: Option<Duration>,
}

// The token never shows up in logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("stock_file", &self.stock_file)
            .field("admin_roles", &self.admin_roles)
            .field("gen_roles", &self.gen_roles)
            .field("gen_cooldown", &self.gen_cooldown)
            .field("cooldown_scope", &self.cooldown_scope)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl Config {
    /// Read the configuration from the process environment. Call
    /// `dotenv().ok()` first so a `.env` file is honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Blank values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // The bot token is necessary for the bot to function
        let token = get(SECRET_KEY).ok_or(ConfigError::MissingToken(SECRET_KEY))?;

        let stock_file = get(STOCK_FILE_KEY)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STOCK_FILE));

        let admin_roles =
            parse_roles(&get(ADMIN_ROLES_KEY).unwrap_or_else(|| DEFAULT_ADMIN_ROLE.into()));
        let gen_roles = get(GEN_ROLES_KEY).map(|raw| parse_roles(&raw)).unwrap_or_default();

        let gen_cooldown = match get(GEN_COOLDOWN_KEY) {
            Some(raw) => {
                Duration::from_secs(parse_bounded(GEN_COOLDOWN_KEY, &raw, MAX_DURATION_SECS)?)
            }
            None => Duration::from_secs(DEFAULT_GEN_COOLDOWN_SECS),
        };

        let cooldown_scope = match get(GEN_SCOPE_KEY) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "user" => CooldownScope::User,
                "item" => CooldownScope::Item,
                _ => {
                    return Err(ConfigError::InvalidScope {
                        var: GEN_SCOPE_KEY,
                        value: raw,
                    })
                }
            },
            None => CooldownScope::User,
        };

        let rate_limit = match get(RATE_LIMIT_KEY) {
            Some(raw) => Some(parse_bounded(RATE_LIMIT_KEY, &raw, MAX_DURATION_SECS * 1000)?)
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            None => None,
        };

        Ok(Self {
            token,
            stock_file,
            admin_roles,
            gen_roles,
            gen_cooldown,
            cooldown_scope,
            rate_limit,
        })
    }

    pub fn settings(&self) -> Settings {
        Settings {
            gen_cooldown: self.gen_cooldown,
            cooldown_scope: self.cooldown_scope,
            rate_limit: self.rate_limit,
        }
    }
}

/// Parse a whole number no larger than `max`.
fn parse_bounded(var: &'static str, raw: &str, max: u64) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|n| *n <= max)
        .ok_or_else(|| ConfigError::InvalidNumber {
            var,
            value: raw.to_string(),
            max,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingToken(SECRET_KEY))));
        assert!(matches!(
            load(&[(SECRET_KEY, "  ")]),
            Err(ConfigError::MissingToken(_))
        ));
    }

    #[test]
    fn defaults() {
        let config = load(&[(SECRET_KEY, "t")]).unwrap();

        assert_eq!(config.stock_file, PathBuf::from("stock.json"));
        assert_eq!(config.admin_roles, vec![RoleSelector::Name("Admin".into())]);
        assert!(config.gen_roles.is_empty());
        assert_eq!(config.gen_cooldown, Duration::from_secs(21600));
        assert_eq!(config.cooldown_scope, CooldownScope::User);
        assert_eq!(config.rate_limit, None);
    }

    #[test]
    fn overrides() {
        let config = load(&[
            (SECRET_KEY, "t"),
            (STOCK_FILE_KEY, "data/codes.json"),
            (ADMIN_ROLES_KEY, "Staff, 1405983771043430410"),
            (GEN_ROLES_KEY, "Member"),
            (GEN_COOLDOWN_KEY, "60"),
            (GEN_SCOPE_KEY, "Item"),
            (RATE_LIMIT_KEY, "1000"),
        ])
        .unwrap();

        assert_eq!(config.stock_file, PathBuf::from("data/codes.json"));
        assert_eq!(
            config.admin_roles,
            vec![
                RoleSelector::Name("Staff".into()),
                RoleSelector::Id(1405983771043430410)
            ]
        );
        assert_eq!(config.gen_roles, vec![RoleSelector::Name("Member".into())]);
        assert_eq!(config.gen_cooldown, Duration::from_secs(60));
        assert_eq!(config.cooldown_scope, CooldownScope::Item);
        assert_eq!(config.rate_limit, Some(Duration::from_secs(1)));
    }

    #[test]
    fn zero_rate_limit_disables_it() {
        let config = load(&[(SECRET_KEY, "t"), (RATE_LIMIT_KEY, "0")]).unwrap();
        assert_eq!(config.rate_limit, None);
    }

    #[test]
    fn bad_values_are_fatal() {
        assert!(matches!(
            load(&[(SECRET_KEY, "t"), (GEN_COOLDOWN_KEY, "6h")]),
            Err(ConfigError::InvalidNumber { var: GEN_COOLDOWN_KEY, .. })
        ));
        assert!(matches!(
            load(&[(SECRET_KEY, "t"), (GEN_SCOPE_KEY, "guild")]),
            Err(ConfigError::InvalidScope { .. })
        ));
    }

    #[test]
    fn durations_are_capped_at_ten_years() {
        let ten_years = MAX_DURATION_SECS.to_string();
        let config = load(&[(SECRET_KEY, "t"), (GEN_COOLDOWN_KEY, ten_years.as_str())]).unwrap();
        assert_eq!(config.gen_cooldown, Duration::from_secs(315_360_000));

        let too_long = (MAX_DURATION_SECS + 1).to_string();
        assert!(matches!(
            load(&[(SECRET_KEY, "t"), (GEN_COOLDOWN_KEY, too_long.as_str())]),
            Err(ConfigError::InvalidNumber { var: GEN_COOLDOWN_KEY, .. })
        ));
        assert!(matches!(
            load(&[(SECRET_KEY, "t"), (GEN_COOLDOWN_KEY, "18446744073709551615")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            load(&[(SECRET_KEY, "t"), (RATE_LIMIT_KEY, "18446744073709551615")]),
            Err(ConfigError::InvalidNumber { var: RATE_LIMIT_KEY, .. })
        ));
    }

    #[test]
    fn role_selectors() {
        assert_eq!(RoleSelector::parse("42"), RoleSelector::Id(42));
        assert_eq!(RoleSelector::parse("+42"), RoleSelector::Name("+42".into()));
        assert!(RoleSelector::parse("Admin").matches(1, "Admin"));
        assert!(!RoleSelector::parse("Admin").matches(1, "admin"));
        assert!(RoleSelector::parse("7").matches(7, "Whatever"));
    }

    #[test]
    fn debug_hides_token() {
        let config = load(&[(SECRET_KEY, "super-secret")]).unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
