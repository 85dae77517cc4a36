use std::time::Instant;

use serenity::async_trait;
use serenity::client::{Context, EventHandler};
use serenity::model::{channel::Message, gateway::Ready, id::UserId};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::command;
use crate::config::{Config, RoleSelector};
use crate::dispatch::{Caller, Capability, Dispatcher};
use crate::error::DeliveryFailure;
use crate::render;
use crate::response::{Payload, Response, UserKey, DM_FAILED};

/// Where responses go: the channel a command came from, and users' DMs.
#[async_trait]
pub trait Outbox: Sync {
    async fn reply(&self, payload: &Payload);

    async fn direct_message(
        &self,
        target: UserKey,
        payload: &Payload,
    ) -> Result<(), DeliveryFailure>;
}

/// Hand a dispatcher response to the platform.
pub async fn deliver<O: Outbox + ?Sized>(outbox: &O, response: Response) {
    match response {
        Response::PublicReply(payload) => outbox.reply(&payload).await,
        Response::PrivateReply {
            target,
            notice,
            payload,
        } => {
            outbox.reply(&notice).await;
            // Not retried: the code stays dispensed
            if let Err(why) = outbox.direct_message(target, &payload).await {
                warn!(user = target, error = %why, "could not deliver code by DM");
                outbox.reply(&Payload::from(DM_FAILED)).await;
            }
        }
        Response::Rejected(rejection) => match rejection.reason() {
            Some(reason) => outbox.reply(&Payload::Text(reason)).await,
            None => debug!(?rejection, "dropped command"),
        },
    }
}

/// Replies into the channel of `msg`.
struct ChannelOutbox<'a> {
    context: &'a Context,
    msg: &'a Message,
}

#[async_trait]
impl Outbox for ChannelOutbox<'_> {
    async fn reply(&self, payload: &Payload) {
        if let Err(why) = self
            .msg
            .channel_id
            .send_message(&self.context.http, render::message(payload))
            .await
        {
            error!(channel = %self.msg.channel_id, error = %why, "failed to send reply");
        }
    }

    async fn direct_message(
        &self,
        target: UserKey,
        payload: &Payload,
    ) -> Result<(), DeliveryFailure> {
        UserId::new(target)
            .direct_message(self.context, render::message(payload))
            .await
            .map(|_| ())
            .map_err(|why| DeliveryFailure(why.to_string()))
    }
}

/// Stock bot event handler. Commands are processed one at a time under the
/// dispatcher lock, so a check, the ledger mutation and its write to disk
/// never interleave with another command.
pub struct Handler {
    dispatcher: Mutex<Dispatcher>,

    // Roles granting the admin capability
    admin_roles: Vec<RoleSelector>,

    // Roles granting the generate capability; empty grants it to everyone
    gen_roles: Vec<RoleSelector>,
}

impl Handler {
    pub fn new(dispatcher: Dispatcher, config: &Config) -> Self {
        Self {
            dispatcher: Mutex::new(dispatcher),
            admin_roles: config.admin_roles.clone(),
            gen_roles: config.gen_roles.clone(),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "connected");
    }

    async fn message(&self, context: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        // Ignore all messages without the prefix
        if command::split(&msg.content).is_none() {
            return;
        }

        let roles = member_roles(&context, &msg);
        let caller = Caller::new(
            msg.author.id.get(),
            resolve_capabilities(&self.admin_roles, &self.gen_roles, &roles),
        );

        // The stock file is small and written synchronously while the lock is
        // held; the write is part of the command's critical section.
        let response = {
            let mut dispatcher = self.dispatcher.lock().await;
            dispatcher.invoke_message(&msg.content, &caller, Instant::now())
        };
        if let Some(response) = response {
            let outbox = ChannelOutbox {
                context: &context,
                msg: &msg,
            };
            deliver(&outbox, response).await;
        }
    }
}

/// The author's roles as `(id, name)` pairs. Names come from the guild cache
/// and are empty when the guild is not cached. Direct messages carry no roles.
fn member_roles(context: &Context, msg: &Message) -> Vec<(u64, String)> {
    let Some(member) = &msg.member else {
        return Vec::new();
    };
    let guild = msg.guild(&context.cache);
    member
        .roles
        .iter()
        .map(|id| {
            let name = guild
                .as_ref()
                .and_then(|guild| guild.roles.get(id))
                .map(|role| role.name.clone())
                .unwrap_or_default();
            (id.get(), name)
        })
        .collect()
}

pub fn resolve_capabilities(
    admin_roles: &[RoleSelector],
    gen_roles: &[RoleSelector],
    roles: &[(u64, String)],
) -> Vec<Capability> {
    let holds = |selectors: &[RoleSelector]| {
        roles
            .iter()
            .any(|(id, name)| selectors.iter().any(|s| s.matches(*id, name)))
    };

    let mut capabilities = Vec::new();
    if holds(admin_roles) {
        capabilities.push(Capability::Admin);
    }
    if gen_roles.is_empty() || holds(gen_roles) {
        capabilities.push(Capability::Generate);
    }
    capabilities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Settings;
    use crate::ledger::StockLedger;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq)]
    enum Sent {
        Reply(Payload),
        Dm(UserKey, Payload),
    }

    /// Records what would have been sent; direct messages fail on demand.
    struct Recorder {
        sent: StdMutex<Vec<Sent>>,
        dms_blocked: bool,
    }

    impl Recorder {
        fn new(dms_blocked: bool) -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
                dms_blocked,
            }
        }

        fn sent(self) -> Vec<Sent> {
            self.sent.into_inner().unwrap()
        }
    }

    #[async_trait]
    impl Outbox for Recorder {
        async fn reply(&self, payload: &Payload) {
            self.sent.lock().unwrap().push(Sent::Reply(payload.clone()));
        }

        async fn direct_message(
            &self,
            target: UserKey,
            payload: &Payload,
        ) -> Result<(), DeliveryFailure> {
            self.sent.lock().unwrap().push(Sent::Dm(target, payload.clone()));
            if self.dms_blocked {
                return Err(DeliveryFailure("cannot send messages to this user".into()));
            }
            Ok(())
        }
    }

    fn generated(dir: &TempDir) -> (Dispatcher, Response) {
        let ledger = StockLedger::load(dir.path().join("stock.json")).unwrap();
        let mut bot = Dispatcher::new(ledger, Settings::default());
        let admin = Caller::new(1, [Capability::Admin]);
        let user = Caller::new(2, [Capability::Generate]);
        let now = Instant::now();
        bot.invoke("addstock", &["x", "a", "b"], &admin, now);
        let response = bot.invoke("gen", &["x"], &user, now).unwrap();
        (bot, response)
    }

    #[tokio::test]
    async fn blocked_dm_is_reported_once_and_code_stays_used() {
        let dir = TempDir::new().unwrap();
        let (bot, response) = generated(&dir);
        let Response::PrivateReply {
            notice, payload, ..
        } = response.clone()
        else {
            panic!("expected a private reply");
        };

        let outbox = Recorder::new(true);
        deliver(&outbox, response).await;

        assert_eq!(
            outbox.sent(),
            vec![
                Sent::Reply(notice),
                Sent::Dm(2, payload),
                Sent::Reply(Payload::from(DM_FAILED)),
            ]
        );
        assert_eq!(bot.ledger().count("x"), 1);
    }

    #[tokio::test]
    async fn delivered_dm_sends_no_failure_notice() {
        let dir = TempDir::new().unwrap();
        let (_bot, response) = generated(&dir);

        let outbox = Recorder::new(false);
        deliver(&outbox, response).await;

        let sent = outbox.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[1], Sent::Dm(2, _)));
    }

    #[tokio::test]
    async fn silent_rejection_sends_nothing() {
        let outbox = Recorder::new(false);
        let response = Response::Rejected(crate::response::Rejection::RateLimited(
            std::time::Duration::from_millis(200),
        ));
        deliver(&outbox, response).await;

        assert!(outbox.sent().is_empty());
    }

    fn roles(list: &[(u64, &str)]) -> Vec<(u64, String)> {
        list.iter().map(|(id, name)| (*id, name.to_string())).collect()
    }

    #[test]
    fn admin_by_name() {
        let admin = [RoleSelector::Name("Admin".into())];
        let caps = resolve_capabilities(&admin, &[], &roles(&[(5, "Admin")]));
        assert_eq!(caps, vec![Capability::Admin, Capability::Generate]);
    }

    #[test]
    fn generate_by_id() {
        let generate = [RoleSelector::Id(1405983771043430410)];
        let admin = [RoleSelector::Name("Admin".into())];

        let caps = resolve_capabilities(&admin, &generate, &roles(&[(1405983771043430410, "")]));
        assert_eq!(caps, vec![Capability::Generate]);
        assert!(resolve_capabilities(&admin, &generate, &roles(&[(9, "Member")])).is_empty());
    }

    #[test]
    fn no_roles_still_generates_when_unrestricted() {
        let admin = [RoleSelector::Name("Admin".into())];
        assert_eq!(
            resolve_capabilities(&admin, &[], &[]),
            vec![Capability::Generate]
        );
    }
}
