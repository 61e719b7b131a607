use std::{collections::HashMap, sync::Arc};

use plugin_core::{Plugin, PluginRegistry, PluginSpec};
use tracing::warn;

use crate::BotConfig;

/// Register `plugins` using the specs from `config`, falling back to each
/// plugin's own defaults for anything the config leaves out.
pub async fn build_registry(config: &BotConfig, plugins: Vec<Arc<dyn Plugin>>) -> Arc<PluginRegistry> {
    let plugins: HashMap<&'static str, Arc<dyn Plugin>> =
        plugins.into_iter().map(|p| (p.id(), p)).collect();

    let mut specs = config.plugins.clone();
    // Merge defaults from each plugin implementation, without duplicating IDs.
    for p in plugins.values() {
        merge_default_spec(&mut specs, p.spec());
    }

    let registry = Arc::new(PluginRegistry::new());
    for spec in specs {
        let Some(plugin) = plugins.get(spec.id.as_str()) else {
            warn!("Unknown plugin ID: {}", spec.id);
            continue;
        };
        registry.register(spec, Arc::clone(plugin)).await;
    }

    registry
}

fn merge_default_spec(specs: &mut Vec<PluginSpec>, default: PluginSpec) {
    if let Some(existing) = specs.iter_mut().find(|s| s.id == default.id) {
        // add any commands not present; `enabled` stays as configured
        for cmd in default.triggers.commands {
            if !existing
                .triggers
                .commands
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&cmd))
            {
                existing.triggers.commands.push(cmd);
            }
        }
    } else {
        specs.push(default);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::tests::{Boom, Echo};
    use plugin_core::PluginTriggers;

    fn plugins() -> Vec<Arc<dyn Plugin>> {
        vec![Arc::new(Echo), Arc::new(Boom)]
    }

    fn config(yaml: &str) -> BotConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn defaults_register_every_plugin() {
        let registry = build_registry(&BotConfig::default(), plugins()).await;
        let ids: Vec<String> = registry.entries().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["boom", "echo"]);
        assert!(registry.entry_by_command("echo").await.is_some());
    }

    #[tokio::test]
    async fn config_can_disable_and_alias() {
        let config = config(
            "plugins:\n  - id: echo\n    enabled: false\n    triggers:\n      commands: [say]\n",
        );
        let registry = build_registry(&config, plugins()).await;

        assert!(!registry.is_enabled("echo").await);
        assert!(registry.is_enabled("boom").await);
        let say = registry.entry_by_command("say").await.unwrap();
        assert_eq!(say.spec.id, "echo");
        // the plugin's own command is kept next to the alias
        assert!(registry.entry_by_command("echo").await.is_some());
    }

    #[tokio::test]
    async fn unknown_ids_are_skipped() {
        let config = config("plugins:\n  - id: weather\n");
        let registry = build_registry(&config, plugins()).await;
        assert!(registry.entry("weather").await.is_none());
        assert_eq!(registry.entries().await.len(), 2);
    }

    #[test]
    fn merge_ignores_case_duplicates() {
        let mut specs = vec![PluginSpec {
            id: "echo".to_owned(),
            enabled: true,
            triggers: PluginTriggers {
                commands: vec!["ECHO".to_owned()],
            },
        }];
        merge_default_spec(&mut specs, Echo.spec());
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].triggers.commands, ["ECHO"]);
    }
}
