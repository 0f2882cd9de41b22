//! Drops documents marked `draft: true` before anything is published.
//!
//! Only the raw header is consulted, so a draft with an otherwise invalid
//! header is still dropped.

use crate::metadata::RawHeader;
use crate::plugin::{BuildTools, PluginDescriptor, PluginError, Visit, WalkOutcome, Walker};
use serde_yaml::Value;

pub const NAME: &str = "drafts";
pub const DRAFT: &str = "draft";

pub struct Drafts;

impl Walker for Drafts {
    fn walk(&self, visit: &Visit<'_>, tools: &BuildTools<'_>) -> Result<WalkOutcome, PluginError> {
        if !visit.node.is_text_document() {
            return Ok(WalkOutcome::Continue);
        }
        let raw = tools.meta().read_header(&visit.node.absolute_path)?;
        match raw.header {
            RawHeader::Mapping(m) if m.get(DRAFT) == Some(&Value::Bool(true)) => {
                tools.logger.info(&format!("Skipping draft {}", visit.node.id));
                Ok(WalkOutcome::Exclude)
            }
            _ => Ok(WalkOutcome::Continue),
        }
    }
}

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::walker(NAME, Drafts)
}
