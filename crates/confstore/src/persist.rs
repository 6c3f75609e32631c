//! Whole-tree persistence in JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use confstore_path::Address;
use serde_json::Value;

use crate::error::Result;
use crate::schema::SchemaModel;
use crate::tree::{Node, NodeRef};

/// JSON encoding of a datastore snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStorage {
    pub pretty: bool,
}

impl JsonStorage {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn read_value<R: Read>(&self, reader: R) -> Result<Value> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn write_value<W: Write>(&self, mut writer: W, value: &Value) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, value)?;
        } else {
            serde_json::to_writer(&mut writer, value)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_path(&self, path: &Path) -> Result<Value> {
        self.read_value(BufReader::new(File::open(path)?))
    }

    pub fn write_path(&self, path: &Path, value: &Value) -> Result<()> {
        self.write_value(BufWriter::new(File::create(path)?), value)
    }
}

/// Validate a raw document into a new root.
pub fn decode(schema: &dyn SchemaModel, raw: &Value) -> Result<NodeRef> {
    Ok(schema.from_raw(&Address::root(), raw)?)
}

pub fn encode(schema: &dyn SchemaModel, root: &Node) -> Value {
    schema.to_raw(root)
}
