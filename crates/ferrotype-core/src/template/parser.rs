//! Recursive-descent cracking of type display names.

use once_cell::sync::OnceCell;
use thiserror::Error;

use super::{TemplateName, TemplateNode};

const LAMBDA_PREFIX: &[u8] = b"<lambda_";
const LAMBDA_HEX_DIGITS: usize = 32;

/// Why a name with a template opener could not be cracked
#[derive(Debug, Error, PartialEq, Eq)]
enum CrackError
{
    #[error("unbalanced brackets starting at byte {position}")]
    Unbalanced
    {
        position: usize,
    },
    #[error("template parameter {index} is empty")]
    EmptyParameter
    {
        index: usize,
    },
    #[error("nothing precedes the template argument list")]
    MissingTemplateName,
    #[error("unexpected text after template arguments: {0:?}")]
    UnexpectedTrailer(String),
    #[error("nested type name is empty")]
    EmptyNested,
}

/// Parse a type name into a [`TemplateNode`].
///
/// Never fails: names that look like templates but cannot be parsed are
/// logged and returned as an opaque leaf over the whole name.
///
/// ```rust
/// use ferrotype_core::template::crack;
///
/// let node = crack("std::vector<int,std::allocator<int> >");
/// assert_eq!(node.template_name(), Some("std::vector"));
/// assert_eq!(node.parameters().len(), 2);
///
/// assert!(!crack("Foo<int>*").is_template());
/// ```
pub fn crack(name: &str) -> TemplateNode
{
    let trimmed = name.trim();
    let (body, has_const) = strip_const(trimmed);
    if body.is_empty() || body.ends_with(['*', '&', ']', ')']) {
        return TemplateNode::leaf(body, has_const);
    }

    match parse(body, has_const) {
        Ok(node) => node,
        Err(err) => {
            tracing::warn!(name = trimmed, error = %err, "could not crack type name; treating it as opaque");
            TemplateNode::leaf(body, has_const)
        }
    }
}

fn strip_const(name: &str) -> (&str, bool)
{
    let mut body = name;
    let mut has_const = false;
    if let Some(rest) = body.strip_prefix("const ") {
        body = rest.trim_start();
        has_const = true;
    }
    if let Some(rest) = body.strip_suffix(" const") {
        body = rest.trim_end();
        has_const = true;
    }
    (body, has_const)
}

fn parse(body: &str, has_const: bool) -> Result<TemplateNode, CrackError>
{
    let bytes = body.as_bytes();
    let Some(open) = find_opener(bytes)? else {
        return Ok(TemplateNode::leaf(body, has_const));
    };

    let template_name = body[..open].trim();
    if template_name.is_empty() {
        return Err(CrackError::MissingTemplateName);
    }

    let (ranges, close) = split_parameters(bytes, open)?;
    let mut parameters = Vec::with_capacity(ranges.len());
    if !body[open + 1..close].trim().is_empty() {
        for (index, (start, end)) in ranges.into_iter().enumerate() {
            let text = body[start..end].trim();
            if text.is_empty() {
                return Err(CrackError::EmptyParameter { index });
            }
            parameters.push(crack(text));
        }
    }

    let trailer = &body[close + 1..];
    let nested = if trailer.trim().is_empty() {
        None
    } else if let Some(rest) = trailer.strip_prefix("::") {
        Some(Box::new(nested(rest)?))
    } else if let Some(rest) = trailer.strip_prefix('+') {
        Some(Box::new(nested(rest)?))
    } else {
        return Err(CrackError::UnexpectedTrailer(trailer.trim().to_string()));
    };

    Ok(TemplateNode::Template(TemplateName {
        full_name: body.to_string(),
        template_name: template_name.to_string(),
        parameters,
        nested,
        has_const,
        single_wildcards: OnceCell::new(),
        multi_wildcard: OnceCell::new(),
    }))
}

fn nested(rest: &str) -> Result<TemplateNode, CrackError>
{
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(CrackError::EmptyNested);
    }
    Ok(crack(rest))
}

/// Index of the `<` that opens the template argument list, if any.
///
/// `::<...>` regions and compiler lambda markers are skipped whole.
fn find_opener(bytes: &[u8]) -> Result<Option<usize>, CrackError>
{
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] != b'<' {
            index += 1;
            continue;
        }
        if index >= 2 && &bytes[index - 2..index] == b"::" {
            let (_, close) = split_parameters(bytes, index)?;
            index = close + 1;
            continue;
        }
        if let Some(end) = lambda_marker_end(bytes, index) {
            index = end;
            continue;
        }
        return Ok(Some(index));
    }
    Ok(None)
}

/// End (exclusive) of a `<lambda_` + 32 hex digits + `>` marker at `start`.
fn lambda_marker_end(bytes: &[u8], start: usize) -> Option<usize>
{
    if !bytes[start..].starts_with(LAMBDA_PREFIX) {
        return None;
    }
    let digits_start = start + LAMBDA_PREFIX.len();
    let digits = bytes.get(digits_start..digits_start + LAMBDA_HEX_DIGITS)?;
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let close = digits_start + LAMBDA_HEX_DIGITS;
    (bytes.get(close) == Some(&b'>')).then_some(close + 1)
}

/// Byte ranges of the top-level parameters after the `<` at `open`, and the
/// index of the matching `>`.
fn split_parameters(bytes: &[u8], open: usize) -> Result<(Vec<(usize, usize)>, usize), CrackError>
{
    let mut angle = 0usize;
    let mut paren = 0usize;
    let mut start = open + 1;
    let mut ranges = Vec::new();
    let mut index = open + 1;

    while index < bytes.len() {
        match bytes[index] {
            b'<' if paren == 0 => {
                if let Some(end) = lambda_marker_end(bytes, index) {
                    index = end;
                    continue;
                }
                angle += 1;
            }
            b'>' if paren == 0 => {
                if angle == 0 {
                    ranges.push((start, index));
                    return Ok((ranges, index));
                }
                angle -= 1;
            }
            b'(' => paren += 1,
            b')' => {
                if paren == 0 {
                    return Err(CrackError::Unbalanced { position: index });
                }
                paren -= 1;
            }
            b',' if angle == 0 && paren == 0 => {
                ranges.push((start, index));
                start = index + 1;
            }
            _ => {}
        }
        index += 1;
    }

    Err(CrackError::Unbalanced { position: open })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_crack_plain_name_is_leaf()
    {
        let node = crack("  MyNamespace::Widget ");
        assert!(!node.is_template());
        assert_eq!(node.full_name(), "MyNamespace::Widget");
        assert!(!node.has_const());
    }

    #[test]
    fn test_crack_vector_with_allocator()
    {
        let node = crack("std::vector<int,std::allocator<int>>");
        assert_eq!(node.template_name(), Some("std::vector"));
        assert_eq!(node.parameters().len(), 2);
        assert_eq!(node.parameters()[0].full_name(), "int");
        let allocator = &node.parameters()[1];
        assert_eq!(allocator.template_name(), Some("std::allocator"));
        assert_eq!(allocator.parameters()[0].full_name(), "int");
    }

    #[test]
    fn test_crack_const_is_flag_not_name()
    {
        let prefixed = crack("const Foo<int>");
        assert!(prefixed.has_const());
        assert_eq!(prefixed.template_name(), Some("Foo"));

        let suffixed = crack("Bar const");
        assert!(suffixed.has_const());
        assert_eq!(suffixed.full_name(), "Bar");
    }

    #[test]
    fn test_crack_pointer_reference_array_function_are_leaves()
    {
        for name in [
            "Foo<int>*",
            "Foo<int>&",
            "Foo<int>[4]",
            "Foo<int>[]",
            "void (Foo<int>*)",
        ] {
            let node = crack(name);
            assert!(!node.is_template(), "{name} should be a leaf");
            assert_eq!(node.full_name(), name);
        }
    }

    #[test]
    fn test_crack_skips_lambda_marker()
    {
        let node = crack("Foo::<lambda_00000000000000000000000000000001>::Bar");
        assert!(!node.is_template());

        let bare = crack("Outer<lambda_0123456789abcdef0123456789ABCDEF>");
        assert!(!bare.is_template());
    }

    #[test]
    fn test_crack_skips_colon_colon_region_and_finds_later_opener()
    {
        let node = crack("Foo::<unnamed>::Holder<int>");
        assert_eq!(node.template_name(), Some("Foo::<unnamed>::Holder"));
        assert_eq!(node.parameters().len(), 1);
    }

    #[test]
    fn test_crack_lambda_marker_inside_parameters()
    {
        let node = crack("std::function<<lambda_00000000000000000000000000000abc>,int>");
        assert_eq!(node.template_name(), Some("std::function"));
        assert_eq!(node.parameters().len(), 2);
        assert_eq!(node.parameters()[1].full_name(), "int");
    }

    #[test]
    fn test_crack_nested_type_after_template()
    {
        let node = crack("std::list<int>::iterator");
        assert_eq!(node.template_name(), Some("std::list"));
        assert_eq!(node.nested().map(TemplateNode::full_name), Some("iterator"));

        let plus = crack("Outer<int>+Inner<char>");
        let nested = plus.nested().expect("nested node");
        assert_eq!(nested.template_name(), Some("Inner"));
    }

    #[test]
    fn test_crack_function_type_parameter_commas_do_not_split()
    {
        let node = crack("Callback<void (int,char),bool>");
        assert_eq!(node.parameters().len(), 2);
        assert_eq!(node.parameters()[0].full_name(), "void (int,char)");
    }

    #[test]
    fn test_crack_empty_parameter_list()
    {
        let node = crack("Empty<>");
        assert_eq!(node.template_name(), Some("Empty"));
        assert!(node.parameters().is_empty());
    }

    #[test]
    fn test_crack_malformed_falls_back_to_leaf()
    {
        for name in ["Foo<int", "Foo<int,,char>", "<int>", "Foo<int> volatile", "Foo<int>::"] {
            let node = crack(name);
            assert!(!node.is_template(), "{name} should fall back to a leaf");
            assert_eq!(node.full_name(), name);
        }
    }

    #[test]
    fn test_lambda_marker_requires_exact_shape()
    {
        let good = b"<lambda_00000000000000000000000000000001>";
        assert_eq!(lambda_marker_end(good, 0), Some(good.len()));
        assert_eq!(lambda_marker_end(b"<lambda_123>", 0), None);
        assert_eq!(lambda_marker_end(b"<lambda_0000000000000000000000000000000g>", 0), None);
    }
}
