use crate::error::CompileError;
use crate::graph::{Channel, Fanout, Layout};
use indexmap::IndexMap;
use itertools::Itertools;

#[derive(Debug, Clone)]
struct ChannelEntry {
    channel: Channel,
    /// Enclosing `For` loops, outermost first.
    scope: Vec<(String, String)>,
}

/// The ordered channel table built during synthesis.
///
/// Declaration order is document order. Redeclaring a channel with the same owner merges the
/// user lists; any other redeclaration is an error.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    entries: IndexMap<String, ChannelEntry>,
}

impl ChannelMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(
        &mut self,
        name: &str,
        layout: Layout,
        owner: &str,
        users: Vec<Fanout<String>>,
    ) -> Result<(), CompileError> {
        self.declare_scoped(&[], name, layout, owner, users)
    }

    /// Declares a channel templated over the given loop variables.
    pub fn declare_scoped(
        &mut self,
        scope: &[(&str, &str)],
        name: &str,
        layout: Layout,
        owner: &str,
        users: Vec<Fanout<String>>,
    ) -> Result<(), CompileError> {
        if let Some(existing) = self.entries.get_mut(name) {
            if existing.channel.owner != owner {
                return Err(CompileError::DuplicateOwner {
                    channel: name.to_string(),
                    existing: existing.channel.owner.clone(),
                    conflicting: owner.to_string(),
                });
            }
            if existing.channel.layout != layout {
                return Err(CompileError::LayoutConflict {
                    channel: name.to_string(),
                });
            }
            merge_users(&mut existing.channel.users, users);
            return Ok(());
        }

        tracing::debug!(channel = name, owner, layout = layout.as_str(), "Declared channel");
        let mut channel = Channel {
            name: name.to_string(),
            layout,
            owner: owner.to_string(),
            users: Vec::new(),
        };
        merge_users(&mut channel.users, users);
        self.entries.insert(
            name.to_string(),
            ChannelEntry {
                channel,
                scope: scope
                    .iter()
                    .map(|(var, range)| (var.to_string(), range.to_string()))
                    .collect(),
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Converts the table into document form, wrapping consecutive channels that share a
    /// scope in one set of nested `For` loops.
    pub fn into_fanouts(self) -> Vec<Fanout<Channel>> {
        let mut out = Vec::new();
        let chunks = self.entries.into_values().chunk_by(|e| e.scope.clone());
        for (scope, group) in &chunks {
            let items = group.map(|e| Fanout::Item(e.channel)).collect();
            out.extend(nest(&scope, items));
        }
        out
    }
}

fn merge_users(users: &mut Vec<Fanout<String>>, incoming: Vec<Fanout<String>>) {
    for user in incoming {
        if !users.contains(&user) {
            users.push(user);
        }
    }
}

fn nest(scope: &[(String, String)], items: Vec<Fanout<Channel>>) -> Vec<Fanout<Channel>> {
    match scope.split_first() {
        None => items,
        Some(((var, range), rest)) => vec![Fanout::for_each_in(var, range, nest(rest, items))],
    }
}
