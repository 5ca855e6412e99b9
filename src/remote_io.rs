//! Read and write small artifacts in a remote directory
//!
//! Content is staged in a local scratch directory that is removed when the call returns, whether
//! or not the transfer succeeded.

use std::fs;
use std::io;

use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::TempDir;

use crate::error::Result;
use crate::transport::Transport;

pub fn write_text(transport: &mut dyn Transport, dir: &str, name: &str, content: &str) -> Result<()> {
    check_name(name)?;
    let scratch = TempDir::new()?;
    let local = scratch.path().join(name);
    fs::write(&local, content)?;
    info!("Writing {}/{}", dir, name);
    transport.put_files(&[local], dir, &[name.to_string()])?;
    Ok(())
}

/// Serialise `record` as JSON and write it
pub fn write_structured<T: Serialize>(transport: &mut dyn Transport, dir: &str, name: &str, record: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    write_text(transport, dir, name, &json)
}

pub fn read_text(transport: &mut dyn Transport, dir: &str, name: &str) -> Result<String> {
    check_name(name)?;
    let scratch = TempDir::new()?;
    info!("Reading {}/{}", dir, name);
    transport.get_files(&[name.to_string()], scratch.path(), dir)?;
    let content = fs::read_to_string(scratch.path().join(name))?;
    Ok(content)
}

pub fn read_structured<T: DeserializeOwned>(transport: &mut dyn Transport, dir: &str, name: &str) -> Result<T> {
    let json = read_text(transport, dir, name)?;
    Ok(serde_json::from_str::<T>(&json)?)
}

/// Artifact names are plain file names inside the directory
fn check_name(name: &str) -> Result<()> {
    match name.is_empty() || name == "." || name == ".." || name.contains('/') {
        true => Err(io::Error::new(io::ErrorKind::InvalidInput, format!("'{name}' is not a file name")).into()),
        false => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::mock::ScriptedTransport;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        values: Vec<f64>,
    }

    #[test]
    fn structured_round_trip() {
        let mut transport = ScriptedTransport::new();
        let record = Record { name: "a".to_string(), values: vec![1.5, -2.0] };
        write_structured(&mut transport, "jobs/1", "r.json", &record).unwrap();
        let back: Record = read_structured(&mut transport, "jobs/1", "r.json").unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn text_lands_in_the_directory() {
        let mut transport = ScriptedTransport::new();
        let record = transport.record();
        write_text(&mut transport, "jobs/1", "note.txt", "hi\n").unwrap();
        assert_eq!(record.lock().unwrap().files["jobs/1/note.txt"], "hi\n");
    }

    #[test]
    fn path_like_names_are_refused() {
        let mut transport = ScriptedTransport::new();
        let record = transport.record();
        let err = write_text(&mut transport, "jobs/1", "../escape.txt", "x").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(record.lock().unwrap().files.is_empty());
    }

    #[test]
    fn missing_artifact_is_a_transport_error() {
        let mut transport = ScriptedTransport::new();
        let err = read_text(&mut transport, "jobs/1", "absent.txt").unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
