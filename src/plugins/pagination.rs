//! Prev/next links between sibling documents of the generated tree.
//!
//! Siblings are the text documents of one output folder in listing order.
//! Each link carries the sibling's title and `href`; a sibling without a
//! valid header links by file stem and path. A document with no text
//! siblings is left untouched.

use super::page_link;
use crate::metadata::{Pagination, PartialMeta};
use crate::plugin::{BuildTools, PluginDescriptor, PluginError, Visit, WalkOutcome, Walker};
use crate::tree::NodeId;

pub const NAME: &str = "pagination";

pub struct Paginate;

impl Walker for Paginate {
    fn walk(&self, visit: &Visit<'_>, tools: &BuildTools<'_>) -> Result<WalkOutcome, PluginError> {
        if !visit.node.is_text_document() {
            return Ok(WalkOutcome::Continue);
        }
        let documents: Vec<NodeId> = visit
            .siblings
            .iter()
            .copied()
            .filter(|id| visit.tree.get(*id).is_text_document())
            .collect();
        let Some(position) = documents.iter().position(|id| *id == visit.id) else {
            return Ok(WalkOutcome::Continue);
        };

        let link = |id: NodeId| page_link(tools, visit.tree.get(id));
        let pagination = Pagination {
            prev: position.checked_sub(1).map(|i| link(documents[i])),
            next: documents.get(position + 1).map(|id| link(*id)),
        };
        if pagination.prev.is_none() && pagination.next.is_none() {
            return Ok(WalkOutcome::Continue);
        }

        tools.meta().update(
            visit.node.effective_path(),
            &PartialMeta::new().pagination(&pagination),
        )?;
        Ok(WalkOutcome::Continue)
    }
}

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::walker(NAME, Paginate)
}
