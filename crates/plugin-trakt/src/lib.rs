pub mod activity;
mod client;
mod error;
mod store;

#[cfg(test)]
mod testing;

pub use activity::Activity;
pub use client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, TraktClient, TraktConfig};
pub use error::{HandlerError, ResolveError, StoreError};
pub use store::{BUCKET, UserStore};

use anyhow::Result;
use async_trait::async_trait;
use plugin_core::{Plugin, PluginContext, PluginSpec, PluginTriggers};
use tracing::{error, info, warn};

/// Module name reported to the gowon host.
pub const MODULE: &str = "trakt";

pub const HELP: &str = "get users last played tv or film on trakt";

/// Reply when no username was given and none is stored for the nick.
pub const USERNAME_NEEDED: &str = "Error: username needed";

/// The `trakt` command: register a nick's Trakt account or look one up.
#[derive(Debug)]
pub struct Trakt {
    client: TraktClient,
    store: UserStore,
}

impl Trakt {
    #[must_use]
    pub const fn new(client: TraktClient, store: UserStore) -> Self {
        Self { client, store }
    }

    /// Answer one invocation from `nick`.
    ///
    /// `set <user>` stores the mapping, `<user>` looks that user up directly
    /// and no argument looks up whoever is stored for `nick`.
    pub async fn handle(&self, nick: &str, args: &str) -> Result<String, HandlerError> {
        let fields: Vec<&str> = args.split_whitespace().collect();

        match fields.as_slice() {
            ["set", user, ..] => {
                self.store.set(nick, user).await?;
                info!(%nick, %user, "Stored trakt user");
                Ok(format!("set {nick}'s user to {user}"))
            }
            [user, ..] => Ok(self.client.resolve(user).await?),
            [] => match self.store.get(nick).await? {
                Some(user) if !user.is_empty() => Ok(self.client.resolve(&user).await?),
                Some(_) | None => Ok(USERNAME_NEEDED.to_owned()),
            },
        }
    }
}

#[async_trait]
impl Plugin for Trakt {
    fn id(&self) -> &'static str {
        MODULE
    }

    fn help(&self) -> &'static str {
        HELP
    }

    fn error_reply(&self) -> &'static str {
        "{red}Error when looking up trakt history{clear}"
    }

    fn spec(&self) -> PluginSpec {
        PluginSpec {
            id: MODULE.to_owned(),
            enabled: true,
            triggers: PluginTriggers {
                commands: vec![MODULE.to_owned()],
            },
        }
    }

    async fn run(&self, ctx: &PluginContext, args: &str, _spec: &PluginSpec) -> Result<String> {
        match self.handle(ctx.nick(), args).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if let HandlerError::Resolve(ResolveError::Decode { url, .. }) = &e {
                    error!(kind = e.kind(), nick = %ctx.nick(), %url, error = ?e, "Trakt response did not match the expected shape");
                } else {
                    warn!(kind = e.kind(), nick = %ctx.nick(), error = ?e, "Trakt lookup failed");
                }
                Err(e.into())
            }
        }
    }
}
