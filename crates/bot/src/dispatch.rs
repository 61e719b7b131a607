use std::sync::Arc;

use plugin_core::{Message, PluginContext, PluginEntry, PluginRegistry, truncate};
use tracing::{debug, info, warn};

/// What became of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// No enabled plugin claimed the message.
    Ignored,
    Replied(Message),
    /// The plugin failed; the envelope carries its user-facing error text.
    Failed(Message),
}

/// Routes gowon messages to plugins. Shared by every transport.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    prefix: String,
    fallback: Option<String>,
}

impl Dispatcher {
    pub fn new(registry: Arc<PluginRegistry>, prefix: impl Into<String>) -> Self {
        Self {
            registry,
            prefix: prefix.into(),
            fallback: None,
        }
    }

    /// Plugin that takes messages no command matched, with the envelope's
    /// `args` as its argument text. Used where the host routes by endpoint.
    #[must_use]
    pub fn with_fallback(mut self, plugin_id: impl Into<String>) -> Self {
        self.fallback = Some(plugin_id.into());
        self
    }

    pub async fn dispatch(&self, message: Message) -> Dispatch {
        let Some((entry, trigger, args)) = self.route(&message).await else {
            debug!(nick = %message.nick, body = %truncate(&message.msg, 200), "No plugin for message");
            return Dispatch::Ignored;
        };

        let plugin_id = entry.spec.id.clone();
        if !self.registry.is_enabled(&plugin_id).await {
            info!(plugin = %plugin_id, "Plugin disabled");
            return Dispatch::Ignored;
        }

        info!(plugin = %plugin_id, nick = %message.nick, dest = %message.dest, args = %args, "Running command");
        let ctx = PluginContext { message, trigger };
        match entry.plugin.run(&ctx, &args, &entry.spec).await {
            Ok(text) => Dispatch::Replied(ctx.message.reply(&plugin_id, text)),
            Err(e) => {
                let error = format!("{e:#}");
                warn!(%error, plugin = %plugin_id, "Plugin failed");
                Dispatch::Failed(ctx.message.reply(&plugin_id, entry.plugin.error_reply()))
            }
        }
    }

    /// Help envelope for the fallback plugin, or the first registered one.
    pub async fn help(&self) -> Option<Message> {
        let preferred = match self.fallback.as_deref() {
            Some(id) => self.registry.entry(id).await,
            None => None,
        };
        let entry = match preferred {
            Some(entry) => entry,
            None => self.registry.entries().await.into_iter().next()?.1,
        };
        Some(Message {
            module: entry.spec.id.clone(),
            msg: entry.plugin.help().to_owned(),
            ..Message::default()
        })
    }

    async fn route(&self, message: &Message) -> Option<(PluginEntry, String, String)> {
        if let Some(invocation) = message.invocation(&self.prefix)
            && let Some(entry) = self.registry.entry_by_command(&invocation.command).await
        {
            return Some((entry, invocation.command, invocation.args));
        }

        let id = self.fallback.as_deref()?;
        let entry = self.registry.entry(id).await?;
        Some((entry, id.to_owned(), message.args.trim().to_owned()))
    }
}
