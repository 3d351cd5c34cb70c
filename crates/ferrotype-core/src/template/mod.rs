//! # Template Names
//!
//! Parsing of C++ type display names into template trees, and wildcard-aware
//! matching between them.
//!
//! ```text
//! std::vector<int,std::allocator<int> >::iterator
//! └── Template "std::vector"
//!     ├── Leaf "int"
//!     ├── Template "std::allocator"
//!     │   └── Leaf "int"
//!     └── nested: Leaf "iterator"
//! ```
//!
//! Patterns may use two wildcards as template parameters:
//!
//! - `?` matches exactly one parameter (or, as a whole name, any type)
//! - `?*` matches all remaining parameters; it must come last
//!
//! ## Example
//!
//! ```rust
//! use ferrotype_core::template::Template;
//!
//! let pattern = Template::new("std::vector<?*>").unwrap();
//! assert!(pattern.matches("std::vector<int,std::allocator<int> >"));
//! assert!(Template::new("Foo<?*,Bar>").is_err());
//! ```

mod matcher;
mod parser;

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::OnceCell;

pub use parser::crack;

use crate::error::{TypeError, TypeResult};

pub(crate) const SINGLE_WILDCARD: &str = "?";
pub(crate) const MULTI_WILDCARD: &str = "?*";

/// Parsed form of a type name
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode
{
    /// A name that is not a template instantiation (or could not be parsed as one)
    Leaf(LeafName),
    Template(TemplateName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafName
{
    pub(crate) full_name: String,
    pub(crate) has_const: bool,
}

/// A template instantiation, possibly followed by a nested type
#[derive(Debug, Clone)]
pub struct TemplateName
{
    pub(crate) full_name: String,
    pub(crate) template_name: String,
    pub(crate) parameters: Vec<TemplateNode>,
    pub(crate) nested: Option<Box<TemplateNode>>,
    pub(crate) has_const: bool,
    pub(crate) single_wildcards: OnceCell<u32>,
    pub(crate) multi_wildcard: OnceCell<bool>,
}

impl PartialEq for TemplateName
{
    fn eq(&self, other: &Self) -> bool
    {
        self.full_name == other.full_name
            && self.template_name == other.template_name
            && self.parameters == other.parameters
            && self.nested == other.nested
            && self.has_const == other.has_const
    }
}

impl TemplateNode
{
    pub(crate) fn leaf(full_name: &str, has_const: bool) -> Self
    {
        TemplateNode::Leaf(LeafName {
            full_name: full_name.to_string(),
            has_const,
        })
    }

    /// Name as parsed, without any `const` qualifier.
    pub fn full_name(&self) -> &str
    {
        match self {
            TemplateNode::Leaf(leaf) => &leaf.full_name,
            TemplateNode::Template(template) => &template.full_name,
        }
    }

    pub fn has_const(&self) -> bool
    {
        match self {
            TemplateNode::Leaf(leaf) => leaf.has_const,
            TemplateNode::Template(template) => template.has_const,
        }
    }

    pub fn is_template(&self) -> bool
    {
        matches!(self, TemplateNode::Template(_))
    }

    /// Name before the opening `<`, for templates.
    pub fn template_name(&self) -> Option<&str>
    {
        match self {
            TemplateNode::Leaf(_) => None,
            TemplateNode::Template(template) => Some(&template.template_name),
        }
    }

    pub fn parameters(&self) -> &[TemplateNode]
    {
        match self {
            TemplateNode::Leaf(_) => &[],
            TemplateNode::Template(template) => &template.parameters,
        }
    }

    /// Type following `::` or `+` after the closing `>`.
    pub fn nested(&self) -> Option<&TemplateNode>
    {
        match self {
            TemplateNode::Leaf(_) => None,
            TemplateNode::Template(template) => template.nested.as_deref(),
        }
    }

    pub fn is_single_wildcard(&self) -> bool
    {
        matches!(self, TemplateNode::Leaf(leaf) if leaf.full_name == SINGLE_WILDCARD)
    }

    pub fn is_multi_wildcard(&self) -> bool
    {
        matches!(self, TemplateNode::Leaf(leaf) if leaf.full_name == MULTI_WILDCARD)
    }

    /// Single wildcards among this node's direct parameters and along its
    /// nested-type chain. Memoized.
    pub fn single_wildcard_count(&self) -> u32
    {
        match self {
            TemplateNode::Leaf(_) => u32::from(self.is_single_wildcard()),
            TemplateNode::Template(template) => *template.single_wildcards.get_or_init(|| {
                let own = template
                    .parameters
                    .iter()
                    .filter(|parameter| parameter.is_single_wildcard())
                    .count();
                let nested = template
                    .nested
                    .as_ref()
                    .map_or(0, |nested| nested.single_wildcard_count());
                u32::try_from(own).unwrap_or(u32::MAX).saturating_add(nested)
            }),
        }
    }

    /// Whether a trailing `?*` appears in this node's parameters or along its
    /// nested-type chain. Memoized.
    pub fn has_multi_wildcard(&self) -> bool
    {
        match self {
            TemplateNode::Leaf(_) => self.is_multi_wildcard(),
            TemplateNode::Template(template) => *template.multi_wildcard.get_or_init(|| {
                template.parameters.last().is_some_and(TemplateNode::is_multi_wildcard)
                    || template.nested.as_ref().is_some_and(|nested| nested.has_multi_wildcard())
            }),
        }
    }

    /// Rank two patterns that both match some name.
    ///
    /// `Ordering::Less` means `self` is the more specific pattern: fewer
    /// single wildcards wins, then having no `?*` wins.
    pub fn compare_precedence(&self, other: &TemplateNode) -> Ordering
    {
        (self.single_wildcard_count(), self.has_multi_wildcard())
            .cmp(&(other.single_wildcard_count(), other.has_multi_wildcard()))
    }

    fn validate(&self) -> TypeResult<()>
    {
        let TemplateNode::Template(template) = self else {
            return Ok(());
        };
        let last = template.parameters.len().saturating_sub(1);
        for (index, parameter) in template.parameters.iter().enumerate() {
            if parameter.is_multi_wildcard() && index != last {
                return Err(TypeError::InvalidArgument(format!(
                    "`{MULTI_WILDCARD}` must be the last template parameter: {}",
                    template.full_name
                )));
            }
            parameter.validate()?;
        }
        if let Some(nested) = &template.nested {
            nested.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for TemplateNode
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.has_const() {
            write!(f, "const ")?;
        }
        write!(f, "{}", self.full_name())
    }
}

/// A validated name pattern
#[derive(Debug, Clone, PartialEq)]
pub struct Template
{
    node: TemplateNode,
}

impl Template
{
    /// Parse a pattern.
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `?*` appears anywhere but the last position of a
    /// parameter list.
    pub fn new(pattern: &str) -> TypeResult<Self>
    {
        let node = crack(pattern);
        node.validate()?;
        Ok(Self { node })
    }

    pub fn node(&self) -> &TemplateNode
    {
        &self.node
    }

    /// Does `name` match this pattern?
    pub fn matches(&self, name: &str) -> bool
    {
        self.node.matches(&crack(name))
    }

    pub fn matches_node(&self, node: &TemplateNode) -> bool
    {
        self.node.matches(node)
    }

    /// See [`TemplateNode::compare_precedence`].
    pub fn compare_precedence(&self, other: &Template) -> Ordering
    {
        self.node.compare_precedence(&other.node)
    }
}

impl fmt::Display for Template
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.node)
    }
}
