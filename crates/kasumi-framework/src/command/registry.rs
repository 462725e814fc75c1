//! Command and permission tables.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use kasumi_core::{Permissions, Snowflake};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::definition::{Command, CommandGroup};

/// Commands by canonical name, plus the alias table.
///
/// Readers get `Arc` handles, so commands removed while an invocation is in
/// flight finish running.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    inner: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    commands: BTreeMap<String, Arc<Command>>,
    aliases: HashMap<String, String>,
    groups: BTreeMap<String, CommandGroup>,
}

impl Tables {
    fn unlink(&mut self, name: &str) -> Option<Arc<Command>> {
        let command = self.commands.remove(name)?;
        for alias in command.aliases() {
            if self.aliases.get(alias).is_some_and(|target| target == name) {
                self.aliases.remove(alias);
            }
        }
        Some(command)
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command. A command already registered under the same
    /// canonical name is replaced; colliding aliases are re-pointed.
    pub fn register(&self, command: Command) -> Arc<Command> {
        let command = Arc::new(command);
        let name = command.name().to_owned();
        let mut tables = self.inner.write();
        if tables.unlink(&name).is_some() {
            warn!(command = %name, "replacing existing command");
        }
        for alias in command.aliases() {
            if let Some(previous) = tables.aliases.insert(alias.clone(), name.clone())
                && previous != name
            {
                warn!(alias = %alias, from = %previous, to = %name, "alias re-pointed");
            }
        }
        tables.commands.insert(name.clone(), Arc::clone(&command));
        debug!(command = %name, aliases = ?command.aliases(), "command registered");
        command
    }

    /// Resolves a canonical name or alias (case-insensitive).
    pub fn lookup(&self, name: &str) -> Option<Arc<Command>> {
        let name = name.to_lowercase();
        let tables = self.inner.read();
        if let Some(command) = tables.commands.get(&name) {
            return Some(Arc::clone(command));
        }
        let canonical = tables.aliases.get(&name)?;
        tables.commands.get(canonical).cloned()
    }

    /// Removes the command answering to `name`, together with all of its
    /// aliases.
    pub fn remove(&self, name: &str) -> Option<Arc<Command>> {
        let name = name.to_lowercase();
        let mut tables = self.inner.write();
        let canonical = match tables.aliases.get(&name) {
            Some(canonical) if !tables.commands.contains_key(&name) => canonical.clone(),
            _ => name,
        };
        let removed = tables.unlink(&canonical);
        if removed.is_some() {
            debug!(command = %canonical, "command removed");
        }
        removed
    }

    /// Every command, sorted by name.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.inner.read().commands.values().cloned().collect()
    }

    /// Commands grouped by their `group` attribute.
    pub fn by_group(&self) -> BTreeMap<String, Vec<Arc<Command>>> {
        let mut groups: BTreeMap<String, Vec<Arc<Command>>> = BTreeMap::new();
        for command in self.inner.read().commands.values() {
            groups
                .entry(command.attributes().group.clone())
                .or_default()
                .push(Arc::clone(command));
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.inner.read().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_group(&self, group: CommandGroup) {
        debug!(group = %group.name, "command group added");
        self.inner.write().groups.insert(group.name.clone(), group);
    }

    pub fn remove_group(&self, name: &str) -> Option<CommandGroup> {
        self.inner.write().groups.remove(name)
    }

    pub fn group(&self, name: &str) -> Option<CommandGroup> {
        self.inner.read().groups.get(name).cloned()
    }

    pub fn groups(&self) -> Vec<CommandGroup> {
        self.inner.read().groups.values().cloned().collect()
    }
}

/// Capability grants of users and roles.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    users: RwLock<HashMap<Snowflake, Permissions>>,
    roles: RwLock<HashMap<Snowflake, Permissions>>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants of `user`; empty when nothing was granted.
    pub fn user(&self, user: Snowflake) -> Permissions {
        self.users.read().get(&user).cloned().unwrap_or_default()
    }

    pub fn role(&self, role: Snowflake) -> Permissions {
        self.roles.read().get(&role).cloned().unwrap_or_default()
    }

    pub fn grant_user<I, S>(&self, user: Snowflake, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut users = self.users.write();
        let grants = users.entry(user).or_default();
        for flag in flags {
            grants.insert(flag);
        }
    }

    pub fn grant_role<I, S>(&self, role: Snowflake, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roles = self.roles.write();
        let grants = roles.entry(role).or_default();
        for flag in flags {
            grants.insert(flag);
        }
    }

    pub fn revoke_user(&self, user: Snowflake, flag: &str) -> bool {
        self.users
            .write()
            .get_mut(&user)
            .is_some_and(|grants| grants.remove(flag))
    }

    pub fn revoke_role(&self, role: Snowflake, flag: &str) -> bool {
        self.roles
            .write()
            .get_mut(&role)
            .is_some_and(|grants| grants.remove(flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::definition::CommandAttributes;
    use crate::command::layer::Invocation;
    use tower::BoxError;
    use tower::util::BoxCloneSyncService;

    fn command(name: &str, aliases: &[&str]) -> Command {
        let service = BoxCloneSyncService::new(tower::service_fn(|_: Invocation| async {
            Ok::<(), BoxError>(())
        }));
        Command::new(name, aliases.iter().copied(), CommandAttributes::default(), service)
    }

    #[test]
    fn lookup_by_name_or_alias() {
        let registry = CommandRegistry::new();
        registry.register(command("Roll", &["dice", "r"]));
        assert_eq!(registry.lookup("roll").map(|c| c.name().to_owned()), Some("roll".into()));
        assert_eq!(registry.lookup("DICE").map(|c| c.name().to_owned()), Some("roll".into()));
        assert!(registry.lookup("flip").is_none());
    }

    #[test]
    fn remove_drops_every_alias() {
        let registry = CommandRegistry::new();
        registry.register(command("roll", &["dice", "r"]));
        registry.register(command("flip", &["coin"]));

        assert!(registry.remove("dice").is_some());
        for name in ["roll", "dice", "r"] {
            assert!(registry.lookup(name).is_none(), "{name} still resolves");
        }
        assert!(registry.lookup("coin").is_some());
        assert!(registry.remove("roll").is_none());
    }

    #[test]
    fn replacing_keeps_tables_consistent() {
        let registry = CommandRegistry::new();
        registry.register(command("roll", &["dice"]));
        registry.register(command("roll", &["r"]));
        assert!(registry.lookup("dice").is_none());
        assert!(registry.lookup("r").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn groups() {
        let registry = CommandRegistry::new();
        registry.register(command("roll", &[]));
        registry.add_group(CommandGroup::new("Fun").owner_only(true));
        assert!(registry.group("Fun").is_some_and(|g| g.owner_only));
        assert_eq!(registry.by_group().keys().collect::<Vec<_>>(), ["Generic"]);
        assert!(registry.remove_group("Fun").is_some());
        assert!(registry.group("Fun").is_none());
    }

    #[test]
    fn permission_grants() {
        let perms = PermissionRegistry::new();
        assert!(perms.user(Snowflake(1)).is_empty());
        perms.grant_user(Snowflake(1), ["kick", "ban"]);
        perms.grant_role(Snowflake(9), ["kick"]);
        assert!(perms.user(Snowflake(1)).contains("ban"));
        assert!(perms.revoke_user(Snowflake(1), "ban"));
        assert!(!perms.user(Snowflake(1)).contains("ban"));
        assert!(perms.role(Snowflake(9)).contains("kick"));
        assert!(!perms.revoke_role(Snowflake(8), "kick"));
    }
}
