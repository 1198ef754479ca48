//! Structural checks on a finished graph.
//!
//! Loop-templated names (`plato_esp_{I}`, `Parameter Sensitivity {I}`) are compared in their
//! template form, which is how both channels and operations refer to them.

use crate::error::CompileError;
use crate::graph::{InterfaceGraph, Stage};
use ahash::{AHashMap, AHashSet};

/// Checks that every channel an operation or stage touches is declared, that operations only
/// write channels their performer owns, and that channels only name declared performers.
/// Within each stage, operations run in order: declared outputs must be written by the stage
/// and no operation may read a channel that only a later operation of the stage writes.
pub fn verify(graph: &InterfaceGraph) -> Result<(), CompileError> {
    let performers: AHashSet<&str> = graph.performers.iter().map(|p| p.name.as_str()).collect();
    let owners: AHashMap<&str, &str> = graph
        .channels
        .iter()
        .flat_map(|c| c.items())
        .map(|c| (c.name.as_str(), c.owner.as_str()))
        .collect();

    for channel in graph.channels.iter().flat_map(|c| c.items()) {
        let named = std::iter::once(channel.owner.as_str()).chain(channel.user_names());
        for performer in named {
            if !performers.contains(performer) {
                return Err(CompileError::UndeclaredPerformer {
                    channel: channel.name.clone(),
                    performer: performer.to_string(),
                });
            }
        }
    }

    let declared = |location: String, channel: &str| -> Result<(), CompileError> {
        if owners.contains_key(channel) {
            Ok(())
        } else {
            Err(CompileError::UndeclaredChannel {
                location,
                channel: channel.to_string(),
            })
        }
    };

    for stage in &graph.stages {
        for channel in stage.inputs.iter().chain(&stage.outputs) {
            declared(format!("Stage '{}'", stage.name), channel)?;
        }
        for op in stage.operations() {
            let location = format!("Operation '{}' in stage '{}'", op.name, stage.name);
            for channel in op.input_channels() {
                declared(location.clone(), channel)?;
            }
            for channel in op.output_channels() {
                declared(location.clone(), channel)?;
                let owner = owners.get(channel).copied().unwrap_or_default();
                if owner != op.performer {
                    return Err(CompileError::WriterNotOwner {
                        location,
                        channel: channel.to_string(),
                        owner: owner.to_string(),
                    });
                }
            }
        }
        check_stage_order(stage)?;
    }
    Ok(())
}

fn check_stage_order(stage: &Stage) -> Result<(), CompileError> {
    let operations = stage.operations();
    let mut written: AHashSet<&str> = AHashSet::new();
    for (index, op) in operations.iter().enumerate() {
        for channel in op.input_channels() {
            let later = operations[index + 1..]
                .iter()
                .any(|next| next.output_channels().contains(&channel));
            if later && !written.contains(channel) {
                return Err(CompileError::ReadBeforeWrite {
                    location: format!("Operation '{}' in stage '{}'", op.name, stage.name),
                    channel: channel.to_string(),
                });
            }
        }
        written.extend(op.output_channels());
    }

    match stage.outputs.iter().find(|c| !written.contains(c.as_str())) {
        Some(channel) => Err(CompileError::UnwrittenStageOutput {
            stage: stage.name.clone(),
            channel: channel.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Channel, Fanout, Layout, Operation, OptionNode, Performer, Stage};

    fn graph_with(stage: Stage) -> InterfaceGraph {
        InterfaceGraph {
            include_defines: false,
            verbose: false,
            performers: vec![
                Performer {
                    name: "platomain".to_string(),
                    code: "platomain".to_string(),
                    id: 0,
                    fanout: None,
                },
                Performer {
                    name: "plato_analyze_1".to_string(),
                    code: "plato_analyze".to_string(),
                    id: 1,
                    fanout: None,
                },
            ],
            channels: vec![Fanout::Item(Channel {
                name: "Control".to_string(),
                layout: Layout::NodalField,
                owner: "platomain".to_string(),
                users: vec![
                    Fanout::Item("platomain".to_string()),
                    Fanout::Item("plato_analyze_1".to_string()),
                ],
            })],
            stages: vec![stage],
            optimizer: OptionNode::block("Optimizer", vec![]),
        }
    }

    #[test]
    fn test_accepts_owner_writes() {
        let mut stage = Stage::new("Initial Guess");
        stage.operations.push(
            Operation::new("Initialize Field", "platomain")
                .output("Initialized Field", "Control")
                .into(),
        );
        assert!(verify(&graph_with(stage)).is_ok());
    }

    #[test]
    fn test_rejects_foreign_writer() {
        let mut stage = Stage::new("Initial Guess");
        stage.operations.push(
            Operation::new("Initialize Field", "plato_analyze_1")
                .output("Initialized Field", "Control")
                .into(),
        );
        match verify(&graph_with(stage)).err().unwrap() {
            CompileError::WriterNotOwner { channel, owner, .. } => {
                assert_eq!(channel, "Control");
                assert_eq!(owner, "platomain");
            }
            e => panic!("Expected WriterNotOwner, got {:?}", e),
        }
    }

    #[test]
    fn test_rejects_read_before_write() {
        let mut stage = Stage::new("Initial Guess");
        stage.operations.push(
            Operation::new("Copy Field", "platomain")
                .input("InputField", "Control")
                .into(),
        );
        stage.operations.push(
            Operation::new("Initialize Field", "platomain")
                .output("Initialized Field", "Control")
                .into(),
        );
        match verify(&graph_with(stage)).err().unwrap() {
            CompileError::ReadBeforeWrite { channel, location } => {
                assert_eq!(channel, "Control");
                assert!(location.contains("Copy Field"));
            }
            e => panic!("Expected ReadBeforeWrite, got {:?}", e),
        }
    }

    #[test]
    fn test_accepts_read_of_earlier_stage_data() {
        let mut stage = Stage::new("Compute Objective Value");
        stage.inputs.push("Control".to_string());
        stage.operations.push(
            Operation::new("Compute Objective Value", "plato_analyze_1")
                .input("Control", "Control")
                .into(),
        );
        assert!(verify(&graph_with(stage)).is_ok());
    }

    #[test]
    fn test_rejects_unwritten_stage_output() {
        let mut stage = Stage::new("Initial Guess");
        stage.operations.push(Operation::new("Initialize Field", "platomain").into());
        stage.outputs.push("Control".to_string());
        match verify(&graph_with(stage)).err().unwrap() {
            CompileError::UnwrittenStageOutput { stage, channel } => {
                assert_eq!(stage, "Initial Guess");
                assert_eq!(channel, "Control");
            }
            e => panic!("Expected UnwrittenStageOutput, got {:?}", e),
        }
    }

    #[test]
    fn test_rejects_undeclared_input() {
        let mut stage = Stage::new("Objective Value");
        stage.inputs.push("Control".to_string());
        stage.operations.push(
            Operation::new("Compute Objective Value", "plato_analyze_1")
                .input("Topology", "Topology")
                .into(),
        );
        match verify(&graph_with(stage)).err().unwrap() {
            CompileError::UndeclaredChannel { channel, .. } => assert_eq!(channel, "Topology"),
            e => panic!("Expected UndeclaredChannel, got {:?}", e),
        }
    }
}
