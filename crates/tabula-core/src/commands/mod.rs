//! Typed command registry
//!
//! Commands are closures registered under an interned id. Keystroke
//! sequences and composed mouse tokens are bound to ids per scope: the
//! global scope applies everywhere, a view scope only while a view of
//! that kind is on top of the active pane.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::session::SessionContext;
use crate::view::Pane;

/// Command body. Runs on the coordinating thread with the whole session.
pub type CommandFn = dyn Fn(&mut SessionContext) -> Result<()> + Send + Sync;

/// Mouse handler body, given the pane-relative target under the cursor
pub type MouseHandler = dyn Fn(&mut SessionContext, &MouseTarget) -> Result<()> + Send + Sync;

/// Interned command name, e.g. `error-recent`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(Arc<str>);

impl CommandId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for CommandId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// A registered command
#[derive(Clone)]
pub struct Command {
    pub id: CommandId,
    pub help: String,
    run: Arc<CommandFn>,
}

impl Command {
    pub fn new<F>(id: impl Into<CommandId>, help: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut SessionContext) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            help: help.into(),
            run: Arc::new(run),
        }
    }

    pub fn execute(&self, ctx: &mut SessionContext) -> Result<()> {
        (self.run)(ctx)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("help", &self.help)
            .finish_non_exhaustive()
    }
}

/// Where a binding applies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    /// Views whose `kind()` equals this string
    View(String),
}

impl Scope {
    pub fn view(kind: impl Into<String>) -> Self {
        Self::View(kind.into())
    }
}

/// Decoded mouse event resolved to the pane under the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseTarget {
    pub pane: Pane,
    /// Column relative to the pane
    pub x: u16,
    /// Row relative to the pane
    pub y: u16,
    /// Composed token, e.g. `CTRL-BUTTON1_PRESSED`
    pub token: String,
}

/// What a mouse token does
#[derive(Clone)]
pub enum MouseAction {
    /// Run these commands in order
    Commands(Vec<CommandId>),
    Handler(Arc<MouseHandler>),
}

impl MouseAction {
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&mut SessionContext, &MouseTarget) -> Result<()> + Send + Sync + 'static,
    {
        Self::Handler(Arc::new(f))
    }
}

impl fmt::Debug for MouseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commands(ids) => f.debug_tuple("Commands").field(ids).finish(),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Result of looking up an accumulated key sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Command(CommandId),
    /// Strict prefix of at least one longer binding
    Prefix,
    Unbound,
}

/// Keystroke binding lookup used by the input dispatcher
pub trait BindingSource {
    /// Exact binding for `keys` in the scope of a view `kind`, falling back to global
    fn lookup(&self, kind: Option<&str>, keys: &str) -> Option<CommandId>;

    /// Every strict prefix of every binding visible from `kind`
    fn prefixes(&self, kind: Option<&str>) -> BTreeSet<String>;

    fn is_prefix(&self, kind: Option<&str>, keys: &str) -> bool {
        self.prefixes(kind).contains(keys)
    }

    /// A sequence that is both bound and a strict prefix keeps waiting
    fn resolve(&self, kind: Option<&str>, keys: &str) -> Resolution {
        if self.is_prefix(kind, keys) {
            return Resolution::Prefix;
        }
        match self.lookup(kind, keys) {
            Some(id) => Resolution::Command(id),
            None => Resolution::Unbound,
        }
    }
}

/// Commands plus their key and mouse bindings
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<CommandId, Command>,
    bindings: HashMap<Scope, HashMap<String, CommandId>>,
    prefixes: HashMap<Scope, BTreeSet<String>>,
    mouse: HashMap<Scope, HashMap<String, MouseAction>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, replacing any previous one with the same id
    pub fn register(&mut self, command: Command) {
        if self.commands.contains_key(&command.id) {
            tracing::warn!(command = %command.id, "Replacing registered command");
        }
        self.commands.insert(command.id.clone(), command);
    }

    /// Register a command and bind it to key sequences in one go
    pub fn add<F>(&mut self, id: &str, help: &str, scope: Scope, keys: &[&str], run: F)
    where
        F: Fn(&mut SessionContext) -> Result<()> + Send + Sync + 'static,
    {
        self.register(Command::new(id, help, run));
        for keys in keys {
            self.bind(scope.clone(), keys, id);
        }
    }

    /// Bind a key sequence to a command id within a scope
    pub fn bind(&mut self, scope: Scope, keys: &str, id: impl Into<CommandId>) {
        if keys.is_empty() {
            tracing::warn!(?scope, "Ignoring empty key binding");
            return;
        }
        let id = id.into();
        tracing::debug!(?scope, keys, command = %id, "Binding keys");
        let prefixes = self.prefixes.entry(scope.clone()).or_default();
        prefixes.extend(
            keys.char_indices()
                .skip(1)
                .map(|(at, _)| keys[..at].to_string()),
        );
        self.bindings.entry(scope).or_default().insert(keys.to_string(), id);
    }

    /// Bind a composed mouse token within a scope
    pub fn bind_mouse(&mut self, scope: Scope, token: &str, action: MouseAction) {
        self.mouse
            .entry(scope)
            .or_default()
            .insert(token.to_string(), action);
    }

    pub fn command(&self, id: &CommandId) -> Option<&Command> {
        self.commands.get(id)
    }

    pub fn command_by_name(&self, name: &str) -> Option<&Command> {
        self.commands.get(&CommandId::from(name))
    }

    /// All commands sorted by id
    pub fn commands(&self) -> Vec<&Command> {
        let mut commands: Vec<_> = self.commands.values().collect();
        commands.sort_by(|a, b| a.id.cmp(&b.id));
        commands
    }

    /// Key sequences bound to `id` in any scope
    pub fn keys_for(&self, id: &CommandId) -> Vec<String> {
        let mut keys: Vec<String> = self
            .bindings
            .values()
            .flatten()
            .filter(|(_, bound)| *bound == id)
            .map(|(keys, _)| keys.clone())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Mouse action for a composed token; view scope shadows global
    pub fn mouse_action(&self, kind: Option<&str>, token: &str) -> Option<&MouseAction> {
        kind.and_then(|kind| self.mouse.get(&Scope::view(kind)))
            .and_then(|actions| actions.get(token))
            .or_else(|| self.mouse.get(&Scope::Global)?.get(token))
    }

    /// Replay entries name a command id first, then a key sequence
    pub fn resolve_replay(&self, kind: Option<&str>, entry: &str) -> Option<CommandId> {
        let id = CommandId::from(entry);
        if self.commands.contains_key(&id) {
            return Some(id);
        }
        self.lookup(kind, entry)
    }

    fn scopes<'a>(&self, kind: Option<&'a str>) -> impl Iterator<Item = Scope> + 'a {
        kind.map(Scope::view)
            .into_iter()
            .chain(std::iter::once(Scope::Global))
    }
}

impl BindingSource for CommandRegistry {
    fn lookup(&self, kind: Option<&str>, keys: &str) -> Option<CommandId> {
        self.scopes(kind)
            .find_map(|scope| self.bindings.get(&scope)?.get(keys).cloned())
    }

    fn prefixes(&self, kind: Option<&str>) -> BTreeSet<String> {
        self.scopes(kind)
            .filter_map(|scope| self.prefixes.get(&scope))
            .flatten()
            .cloned()
            .collect()
    }

    fn is_prefix(&self, kind: Option<&str>, keys: &str) -> bool {
        self.scopes(kind)
            .any(|scope| self.prefixes.get(&scope).is_some_and(|set| set.contains(keys)))
    }
}
