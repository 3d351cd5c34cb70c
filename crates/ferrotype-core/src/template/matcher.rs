//! Wildcard-aware structural comparison of template trees.

use super::TemplateNode;

impl TemplateNode
{
    /// Case-insensitive structural match.
    ///
    /// A whole-name wildcard on either side matches anything. Leaves only
    /// match leaves; templates need equal names, pairwise-matching
    /// parameters (a `?*` on either side accepts the rest) and matching
    /// nested types. `const` is ignored.
    pub fn matches(&self, other: &TemplateNode) -> bool
    {
        if self.is_whole_wildcard() || other.is_whole_wildcard() {
            return true;
        }

        match (self, other) {
            (TemplateNode::Leaf(left), TemplateNode::Leaf(right)) => left.full_name.eq_ignore_ascii_case(&right.full_name),
            (TemplateNode::Template(left), TemplateNode::Template(right)) => {
                left.template_name.eq_ignore_ascii_case(&right.template_name)
                    && parameters_match(&left.parameters, &right.parameters)
                    && match (&left.nested, &right.nested) {
                        (None, None) => true,
                        (Some(left), Some(right)) => left.matches(right),
                        _ => false,
                    }
            }
            _ => false,
        }
    }

    fn is_whole_wildcard(&self) -> bool
    {
        self.is_single_wildcard() || self.is_multi_wildcard()
    }
}

fn parameters_match(left: &[TemplateNode], right: &[TemplateNode]) -> bool
{
    for index in 0..left.len().max(right.len()) {
        let (left, right) = (left.get(index), right.get(index));
        if left.is_some_and(TemplateNode::is_multi_wildcard) || right.is_some_and(TemplateNode::is_multi_wildcard) {
            return true;
        }
        match (left, right) {
            (Some(left), Some(right)) if left.matches(right) => {}
            _ => return false,
        }
    }
    true
}
