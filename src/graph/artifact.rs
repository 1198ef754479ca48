//! Binary artifact form of a compiled graph.
//!
//! An artifact is a 4-byte magic, one format version byte and the bincode-encoded graph.

use super::InterfaceGraph;
use crate::error::SerializeError;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use std::fs;

const ARTIFACT_MAGIC: &[u8; 4] = b"PLIG";
const ARTIFACT_VERSION: u8 = 1;

fn io_error(path: &str, e: std::io::Error) -> SerializeError {
    SerializeError::Io {
        path: path.to_string(),
        message: e.to_string(),
    }
}

impl InterfaceGraph {
    /// Saves the compiled graph to a file.
    pub fn save(&self, path: &str) -> Result<(), SerializeError> {
        let bytes = self.to_bytes()?;
        fs::write(path, bytes).map_err(|e| io_error(path, e))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        let body =
            encode_to_vec(self, standard()).map_err(|e| SerializeError::Encode(e.to_string()))?;
        let mut bytes = Vec::with_capacity(ARTIFACT_MAGIC.len() + 1 + body.len());
        bytes.extend_from_slice(ARTIFACT_MAGIC);
        bytes.push(ARTIFACT_VERSION);
        bytes.extend(body);
        Ok(bytes)
    }

    /// Loads a compiled graph from a file written by [`InterfaceGraph::save`].
    pub fn from_file(path: &str) -> Result<Self, SerializeError> {
        let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
        Self::from_bytes(&bytes)
    }

    /// Decodes a compiled graph, rejecting data without the artifact magic or from another
    /// format version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializeError> {
        let body = bytes
            .strip_prefix(ARTIFACT_MAGIC.as_slice())
            .ok_or(SerializeError::NotAnArtifact)?;
        let (&version, body) = body.split_first().ok_or(SerializeError::NotAnArtifact)?;
        if version != ARTIFACT_VERSION {
            return Err(SerializeError::UnsupportedVersion {
                found: version,
                expected: ARTIFACT_VERSION,
            });
        }
        let (graph, read) =
            decode_from_slice(body, standard()).map_err(|e| SerializeError::Decode(e.to_string()))?;
        if read != body.len() {
            return Err(SerializeError::Decode(format!(
                "{} trailing bytes after the graph",
                body.len() - read
            )));
        }
        Ok(graph)
    }
}
