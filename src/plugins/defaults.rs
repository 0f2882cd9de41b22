//! Repairs published documents whose header fails validation.
//!
//! Valid fields survive, invalid ones are dropped and the required fields
//! are filled from the defaults. A document without a header gets one
//! injected above its body; a document with a broken header has it
//! replaced. Valid documents are left byte-for-byte alone.

use crate::metadata::{MetaError, PartialMeta, RawHeader};
use crate::plugin::{BuildTools, PluginDescriptor, PluginError, Visit, WalkOutcome, Walker};

pub const NAME: &str = "meta-defaults";

pub struct MetaDefaults;

impl Walker for MetaDefaults {
    fn walk(&self, visit: &Visit<'_>, tools: &BuildTools<'_>) -> Result<WalkOutcome, PluginError> {
        let node = visit.node;
        if !node.is_text_document() || node.build_info.is_none() {
            return Ok(WalkOutcome::Continue);
        }
        let path = node.effective_path();
        let meta = tools.meta();

        match meta.extract_from_file(path) {
            Ok(_) => return Ok(WalkOutcome::Continue),
            Err(MetaError::Validation { .. } | MetaError::Malformed { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let raw = meta.read_header(path)?;
        let partial = match &raw.header {
            RawHeader::Mapping(m) => PartialMeta::from_mapping(m.clone()),
            RawHeader::Absent | RawHeader::Malformed(_) => PartialMeta::new(),
        };
        let repaired = meta.generate(&partial);
        match raw.header {
            RawHeader::Absent => meta.inject(path, &repaired, None)?,
            _ => meta.replace(path, &repaired, None)?,
        }
        tools
            .logger
            .warn(&format!("Repaired header of {}", node.id));
        Ok(WalkOutcome::Continue)
    }
}

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::walker(NAME, MetaDefaults)
}
