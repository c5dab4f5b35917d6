//! Ordered rule chain mapping envelopes to a topic and link fan-out.
//!
//! Rules are pure closures so routing decisions are replayable in tests:
//! given the same envelope, `decide` always returns the same
//! [`Decision`]. The first rule to return `Some` wins; when every rule
//! passes, the fallback is publish-only on the envelope's existing topic.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::envelope::Envelope;

/// Outcome of routing one envelope: where to publish it and which links
/// (bridge names) to fan it out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub topic: String,
    pub links: SmallVec<[String; 2]>,
}

impl Decision {
    /// Publish on `topic` with no transport fan-out.
    pub fn publish_only(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            links: SmallVec::new(),
        }
    }

    /// Publish on `topic` and enqueue a delivery per named link.
    pub fn with_links(
        topic: impl Into<String>,
        links: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            links: links.into_iter().map(Into::into).collect(),
        }
    }
}

/// A single routing rule.
///
/// Must be pure and side-effect-free; return `None` to pass to the next
/// rule in the chain.
pub type RouterRule = Arc<dyn Fn(&Envelope) -> Option<Decision> + Send + Sync>;

/// Ordered chain of [`RouterRule`]s.
#[derive(Clone, Default)]
pub struct Router {
    rules: Vec<RouterRule>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule to the chain. Rules are evaluated in the order added.
    pub fn rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Envelope) -> Option<Decision> + Send + Sync + 'static,
    {
        self.rules.push(Arc::new(rule));
        self
    }

    /// First non-`None` rule result, or the publish-only fallback on the
    /// envelope's current topic.
    pub fn decide(&self, env: &Envelope) -> Decision {
        for rule in &self.rules {
            if let Some(decision) = rule(env) {
                return decision;
            }
        }
        Decision::publish_only(env.routing.topic.clone())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("rule_count", &self.rules.len())
            .finish()
    }
}
