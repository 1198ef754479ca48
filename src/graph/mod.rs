//! The compiled interface graph.
//!
//! An [`InterfaceGraph`] is the typed form of the interface document the orchestration
//! runtime walks: performers, shared-data channels, ordered stages of operations, and the
//! optimizer option block. It is produced by [`Compiler::compile`](crate::compiler::Compiler::compile)
//! and serialized with [`InterfaceGraph::to_xml`] or saved as a binary artifact.

use serde::{Deserialize, Serialize};

mod artifact;
mod xml;

pub use xml::ToXml;

/// Shape of the data held by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    /// A global vector of known length (scalars have length 1).
    Global(usize),
    NodalField,
    ElementField,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Global(_) => "Global",
            Layout::NodalField => "Nodal Field",
            Layout::ElementField => "Element Field",
        }
    }

    /// The `Size` entry: the explicit length, or `IGNORE` for mesh-sized fields.
    pub fn size(&self) -> String {
        match self {
            Layout::Global(n) => n.to_string(),
            Layout::NodalField | Layout::ElementField => "IGNORE".to_string(),
        }
    }
}

/// A `For(var, in)` wrapper: one instance of `body` per value of `var` in `range`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForLoop<T> {
    pub var: String,
    pub range: String,
    pub body: Vec<T>,
}

/// Either a plain item or a data-parallel fan-out of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fanout<T> {
    Item(T),
    For(ForLoop<Fanout<T>>),
}

impl<T> Fanout<T> {
    pub fn for_each_in(var: &str, range: &str, body: Vec<Fanout<T>>) -> Self {
        Fanout::For(ForLoop {
            var: var.to_string(),
            range: range.to_string(),
            body,
        })
    }

    /// Visits every item, however deeply nested in loops.
    pub fn items(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_items(&mut out);
        out
    }

    fn collect_items<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            Fanout::Item(item) => out.push(item),
            Fanout::For(fl) => fl.body.iter().for_each(|f| f.collect_items(out)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performer {
    pub name: String,
    pub code: String,
    pub id: u32,
    /// Set when the performer is an ensemble expanded over a loop variable.
    pub fanout: Option<(String, String)>,
}

/// A named shared-data slot with exactly one writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub layout: Layout,
    pub owner: String,
    pub users: Vec<Fanout<String>>,
}

impl Channel {
    pub fn user_names(&self) -> Vec<&str> {
        self.users
            .iter()
            .flat_map(|u| u.items())
            .map(String::as_str)
            .collect()
    }
}

/// Binds an operation argument to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub argument: String,
    pub channel: String,
}

impl Argument {
    pub fn new(argument: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            argument: argument.into(),
            channel: channel.into(),
        }
    }
}

/// A literal argument passed to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub argument: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub performer: String,
    pub parameters: Vec<Parameter>,
    pub inputs: Vec<Fanout<Argument>>,
    pub outputs: Vec<Fanout<Argument>>,
}

impl Operation {
    pub fn new(name: impl Into<String>, performer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            performer: performer.into(),
            parameters: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn input(mut self, argument: impl Into<String>, channel: impl Into<String>) -> Self {
        self.inputs.push(Fanout::Item(Argument::new(argument, channel)));
        self
    }

    pub fn output(mut self, argument: impl Into<String>, channel: impl Into<String>) -> Self {
        self.outputs.push(Fanout::Item(Argument::new(argument, channel)));
        self
    }

    pub fn parameter(mut self, argument: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter {
            argument: argument.into(),
            value: value.into(),
        });
        self
    }

    pub fn input_fanout(mut self, inputs: Fanout<Argument>) -> Self {
        self.inputs.push(inputs);
        self
    }

    pub fn input_channels(&self) -> Vec<&str> {
        self.inputs
            .iter()
            .flat_map(|f| f.items())
            .map(|a| a.channel.as_str())
            .collect()
    }

    pub fn output_channels(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .flat_map(|f| f.items())
            .map(|a| a.channel.as_str())
            .collect()
    }
}

/// A node in a stage's operation list.
///
/// Siblings inside a `Batch` may run concurrently; top-level siblings run in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationNode {
    Single(Operation),
    Batch(Vec<OperationNode>),
    For(ForLoop<OperationNode>),
}

impl OperationNode {
    pub fn for_each_in(var: &str, range: &str, body: Vec<OperationNode>) -> Self {
        OperationNode::For(ForLoop {
            var: var.to_string(),
            range: range.to_string(),
            body,
        })
    }

    fn collect_operations<'a>(&'a self, out: &mut Vec<&'a Operation>) {
        match self {
            OperationNode::Single(op) => out.push(op),
            OperationNode::Batch(nodes) => nodes.iter().for_each(|n| n.collect_operations(out)),
            OperationNode::For(fl) => fl.body.iter().for_each(|n| n.collect_operations(out)),
        }
    }
}

impl From<Operation> for OperationNode {
    fn from(op: Operation) -> Self {
        OperationNode::Single(op)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub inputs: Vec<String>,
    pub operations: Vec<OperationNode>,
    pub outputs: Vec<String>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            operations: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Every operation in the stage, depth first.
    pub fn operations(&self) -> Vec<&Operation> {
        let mut out = Vec::new();
        self.operations
            .iter()
            .for_each(|n| n.collect_operations(&mut out));
        out
    }
}

/// An entry of the optimizer option block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionNode {
    Value { key: String, value: String },
    Block { key: String, children: Vec<OptionNode> },
}

impl OptionNode {
    pub fn value(key: impl Into<String>, value: impl Into<String>) -> Self {
        OptionNode::Value {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn block(key: impl Into<String>, children: Vec<OptionNode>) -> Self {
        OptionNode::Block {
            key: key.into(),
            children,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            OptionNode::Value { key, .. } | OptionNode::Block { key, .. } => key,
        }
    }

    /// Looks up a direct child by key.
    pub fn child(&self, key: &str) -> Option<&OptionNode> {
        match self {
            OptionNode::Block { children, .. } => children.iter().find(|c| c.key() == key),
            OptionNode::Value { .. } => None,
        }
    }

    /// All direct children with the given key.
    pub fn children_named<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a OptionNode> {
        let children: &[OptionNode] = match self {
            OptionNode::Block { children, .. } => children,
            OptionNode::Value { .. } => &[],
        };
        children.iter().filter(move |c| c.key() == key)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            OptionNode::Value { value, .. } => Some(value),
            OptionNode::Block { .. } => None,
        }
    }
}

/// The complete compiled interface document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceGraph {
    /// Emits `<include filename="defines.xml"/>` for ensemble runs.
    pub include_defines: bool,
    pub verbose: bool,
    pub performers: Vec<Performer>,
    pub channels: Vec<Fanout<Channel>>,
    pub stages: Vec<Stage>,
    pub optimizer: OptionNode,
}

impl InterfaceGraph {
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels
            .iter()
            .flat_map(|c| c.items())
            .find(|c| c.name == name)
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels
            .iter()
            .flat_map(|c| c.items())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn performer(&self, name: &str) -> Option<&Performer> {
        self.performers.iter().find(|p| p.name == name)
    }

    /// Every operation of every stage, in document order.
    pub fn operations(&self) -> Vec<&Operation> {
        self.stages.iter().flat_map(|s| s.operations()).collect()
    }

    /// Number of operations with the given name across the document.
    pub fn count_operations(&self, name: &str) -> usize {
        self.operations().iter().filter(|op| op.name == name).count()
    }
}
