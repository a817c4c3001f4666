//! Agent categories with single-string tags and a parent hierarchy.

use std::sync::Arc;

/// A category tag plus its direct parents.
///
/// `is_a` is the reflexive-transitive closure over parents, so a
/// `"truck"` with parent `"vehicle"` satisfies both `is_a("truck")` and
/// `is_a("vehicle")`.  Categories are shared via `Arc` — building the
/// hierarchy once at scenario setup and tagging thousands of agents with it
/// costs one pointer per agent.
#[derive(Clone, Debug)]
pub struct AgentCategory {
    tag:     String,
    parents: Vec<Arc<AgentCategory>>,
}

impl AgentCategory {
    /// A root category with no parents.
    pub fn new(tag: impl Into<String>) -> Arc<Self> {
        Arc::new(Self { tag: tag.into(), parents: Vec::new() })
    }

    /// A category below the given parents.
    pub fn with_parents(tag: impl Into<String>, parents: Vec<Arc<AgentCategory>>) -> Arc<Self> {
        Arc::new(Self { tag: tag.into(), parents })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Reflexive-transitive membership test.
    pub fn is_a(&self, tag: &str) -> bool {
        if self.tag == tag {
            return true;
        }
        self.parents.iter().any(|p| p.is_a(tag))
    }
}

impl PartialEq for AgentCategory {
    /// Categories compare by tag only — the hierarchy is a property of the
    /// scenario, not of the identity.
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl Eq for AgentCategory {}
