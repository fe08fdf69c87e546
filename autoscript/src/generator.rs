//! Path generation: the mirror of resolution.
//!
//! Given a live control, produce an [`ElementPath`] that resolves back to it.
//! Consumed by inspection tooling rather than by the interpreter, but kept in
//! the engine so that generation and resolution share one notion of what a
//! segment matches.

use tracing::warn;

use crate::errors::AutomationError;
use crate::path::{ElementPath, NameMatch, Segment};
use crate::provider::UiElement;
use crate::resolver::segment_matches;

/// Cutoff for the parent-link walk. Exceeding it truncates the lineage,
/// which degrades the path but is not a failure.
pub const LINEAGE_DEPTH_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Prefer `AutomationId`; short-circuit to a single unchained segment
    /// when the control exposes one (assumed unique within a window).
    Modern,
    /// Prefer `ClassName` and always attach `foundIndex`, for applications
    /// whose names and ids are unstable across runs.
    Legacy,
}

pub struct PathGenerator {
    mode: GenerationMode,
}

impl PathGenerator {
    pub fn new(mode: GenerationMode) -> Self {
        PathGenerator { mode }
    }

    /// Generate an address for `control`, relative to its owning top-level
    /// window. The window itself yields the empty path.
    pub fn generate(&self, control: &UiElement) -> Result<ElementPath, AutomationError> {
        let Some(root) = control.containing_window()? else {
            // No owning window known; the best we can do is a single
            // unchained segment.
            return Ok(ElementPath::single(self.segment(control, None)));
        };
        if control.is_same(&root) {
            return Ok(ElementPath::window());
        }

        if self.mode == GenerationMode::Modern
            && control.automation_id().is_some_and(|id| !id.is_empty())
        {
            return Ok(ElementPath::single(self.segment(control, None)));
        }

        // Collect lineage from the control up to (excluding) the window.
        let mut lineage = vec![control.clone()];
        let mut current = control.clone();
        let mut hops = 0;
        loop {
            if hops >= LINEAGE_DEPTH_LIMIT {
                warn!(
                    "lineage exceeds {LINEAGE_DEPTH_LIMIT} hops for '{}'; truncating path",
                    control.display_name()
                );
                break;
            }
            match current.parent() {
                Ok(Some(parent)) => {
                    if parent.is_same(&root) {
                        break;
                    }
                    lineage.push(parent.clone());
                    current = parent;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("parent walk failed: {e}; truncating path");
                    break;
                }
            }
            hops += 1;
        }
        lineage.reverse();

        let mut segments = Vec::with_capacity(lineage.len());
        let mut parent = root;
        for item in lineage {
            segments.push(self.segment(&item, Some(&parent)));
            parent = item;
        }
        Ok(ElementPath { segments })
    }

    /// Build one segment for `control`, computing a sibling index relative to
    /// its immediate `parent` when that parent is known. A chained segment
    /// always carries `searchDepth=1` to keep each hop's lookup cheap and
    /// unambiguous.
    fn segment(&self, control: &UiElement, parent: Option<&UiElement>) -> Segment {
        let mut segment = Segment::new(control.control_type());
        let automation_id = control.automation_id().filter(|s| !s.is_empty());
        let name = control.name().filter(|s| !s.is_empty());
        let class_name = control.class_name().filter(|s| !s.is_empty());

        if self.mode == GenerationMode::Modern && automation_id.is_some() {
            segment.automation_id = automation_id;
        } else if let Some(name) = name {
            segment.name = Some(NameMatch::Exact(name));
        }
        if self.mode == GenerationMode::Legacy {
            segment.class_name = class_name.clone();
        }
        if segment.automation_id.is_none()
            && segment.name.is_none()
            && segment.class_name.is_none()
        {
            segment.class_name = class_name;
        }

        if let Some(parent) = parent {
            let (index, matching_siblings) = match self.sibling_index(control, parent, &segment) {
                Ok(found) => found,
                Err(e) => {
                    // Transient elements (a menu closing mid-walk) make the
                    // enumeration fail; index 1 is usually safe for those.
                    warn!("sibling index computation failed ({e}); defaulting to 1");
                    (1, 1)
                }
            };
            if matching_siblings > 1 || self.mode == GenerationMode::Legacy {
                segment.index = Some(index);
            }
            segment.depth = Some(1);
        }
        segment
    }

    /// Enumerate only the parent's direct children (never the whole subtree)
    /// and locate `control` among those matching the segment's predicates.
    /// Returns `(1-based index, total matching siblings)`.
    fn sibling_index(
        &self,
        control: &UiElement,
        parent: &UiElement,
        segment: &Segment,
    ) -> Result<(usize, usize), AutomationError> {
        let mut index = 1;
        let mut matches = 0;
        for child in parent.children()? {
            if !segment_matches(&child, segment)? {
                continue;
            }
            matches += 1;
            if child.is_same(control) {
                index = matches;
            }
        }
        Ok((index, matches.max(1)))
    }
}
