//! Tests for template name cracking and matching

use std::cmp::Ordering;

use ferrotype_core::error::TypeError;
use ferrotype_core::template::{crack, Template};

#[test]
fn test_crack_vector_has_two_parameters()
{
    let node = crack("std::vector<int,std::allocator<int>>");

    assert!(node.is_template());
    assert_eq!(node.template_name(), Some("std::vector"));
    assert_eq!(node.parameters().len(), 2);
    assert!(node.nested().is_none());
}

#[test]
fn test_crack_lambda_segment_is_opaque()
{
    let node = crack("Foo::<lambda_00000000000000000000000000000001>::Bar");

    assert!(!node.is_template());
    assert_eq!(node.full_name(), "Foo::<lambda_00000000000000000000000000000001>::Bar");
}

#[test]
fn test_crack_nested_type_after_template()
{
    let node = crack("std::map<int,Foo<bool> >::iterator");
    let nested = node.nested().unwrap();

    assert_eq!(node.template_name(), Some("std::map"));
    assert_eq!(node.parameters()[1].template_name(), Some("Foo"));
    assert_eq!(nested.full_name(), "iterator");
    assert!(!nested.is_template());
}

#[test]
fn test_crack_unbalanced_name_falls_back_to_leaf()
{
    let node = crack("Broken<int");

    assert!(!node.is_template());
    assert_eq!(node.full_name(), "Broken<int");
}

#[test]
fn test_single_and_multi_wildcards()
{
    let single = Template::new("Foo<?>").unwrap();
    let multi = Template::new("Foo<?*>").unwrap();

    assert!(single.matches("Foo<Bar>"));
    assert!(!single.matches("Foo<Bar,Baz>"));
    assert!(multi.matches("Foo<Bar,Baz>"));
    assert!(multi.matches("foo<bar>"));
    assert!(!multi.matches("Other<Bar>"));
}

#[test]
fn test_misplaced_multi_wildcard_is_rejected()
{
    assert!(matches!(Template::new("Foo<?*,Bar>"), Err(TypeError::InvalidArgument(_))));
    assert!(matches!(
        Template::new("Outer<Inner<?*,int>>"),
        Err(TypeError::InvalidArgument(_))
    ));
}

#[test]
fn test_leaf_never_matches_template()
{
    let leaf = Template::new("Foo").unwrap();

    assert!(leaf.matches("FOO"));
    assert!(!leaf.matches("Foo<int>"));
}

#[test]
fn test_nested_types_must_both_be_present()
{
    let pattern = Template::new("std::list<?>::iterator").unwrap();

    assert!(pattern.matches("std::list<int>::iterator"));
    assert!(!pattern.matches("std::list<int>"));
    assert!(!pattern.matches("std::list<int>::const_iterator"));
}

#[test]
fn test_more_specific_pattern_wins()
{
    let exact = Template::new("Foo<int,bool>").unwrap();
    let single = Template::new("Foo<?,bool>").unwrap();
    let multi = Template::new("Foo<int,?*>").unwrap();

    assert_eq!(exact.compare_precedence(&single), Ordering::Less);
    assert_eq!(exact.compare_precedence(&multi), Ordering::Less);
    assert_eq!(multi.compare_precedence(&exact), Ordering::Greater);
}
