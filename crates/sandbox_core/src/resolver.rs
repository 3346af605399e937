//! Visibility resolver: descriptor to storage label translation.
//!
//! # Invariants
//! - A descriptor without source and without workspace tokens resolves to
//!   the empty (public) label.
//! - Workspace tokens are emitted in sorted order, so equal descriptors
//!   always resolve to equal labels.

use crate::model::visibility::{VisibilityDescriptor, VisibilityLabel};

/// Translates visibility descriptors into opaque storage labels.
pub trait VisibilityResolver {
    fn to_visibility_label(&self, descriptor: &VisibilityDescriptor) -> VisibilityLabel;

    fn add_workspace(&self, descriptor: &VisibilityDescriptor, workspace_id: &str) -> VisibilityDescriptor {
        descriptor.with_workspace(workspace_id)
    }

    fn remove_workspace(&self, descriptor: &VisibilityDescriptor, workspace_id: &str) -> VisibilityDescriptor {
        descriptor.without_workspace(workspace_id)
    }
}

/// Label form: `(source)&(ws-a|ws-b)`, omitting empty parts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVisibilityResolver;

impl VisibilityResolver for DefaultVisibilityResolver {
    fn to_visibility_label(&self, descriptor: &VisibilityDescriptor) -> VisibilityLabel {
        let mut parts = Vec::with_capacity(2);
        let source = descriptor.source.trim();
        if !source.is_empty() {
            parts.push(format!("({source})"));
        }
        if descriptor.has_workspace_tokens() {
            let tokens: Vec<&str> = descriptor.workspaces.iter().map(String::as_str).collect();
            parts.push(format!("({})", tokens.join("|")));
        }
        VisibilityLabel::new(parts.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::{DefaultVisibilityResolver, VisibilityResolver};
    use crate::model::visibility::VisibilityDescriptor;

    #[test]
    fn public_descriptor_resolves_to_empty_label() {
        let label = DefaultVisibilityResolver.to_visibility_label(&VisibilityDescriptor::default());
        assert_eq!(label.as_str(), "");
    }

    #[test]
    fn combines_source_and_sorted_workspace_tokens() {
        let resolver = DefaultVisibilityResolver;
        let descriptor = resolver.add_workspace(
            &VisibilityDescriptor::in_workspace("secret", "ws-b"),
            "ws-a",
        );
        assert_eq!(
            resolver.to_visibility_label(&descriptor).as_str(),
            "(secret)&(ws-a|ws-b)"
        );

        let stripped = resolver.remove_workspace(&resolver.remove_workspace(&descriptor, "ws-a"), "ws-b");
        assert_eq!(resolver.to_visibility_label(&stripped).as_str(), "(secret)");
    }
}
