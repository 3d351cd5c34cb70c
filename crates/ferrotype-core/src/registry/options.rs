//! Registry configuration.

/// Interface names that structural equality treats as the same type
///
/// Projected WinRT and classic COM interfaces appear under several spellings
/// across modules.
pub const DEFAULT_INTERFACE_SYNONYMS: &[&[&str]] = &[
    &["IUnknown", "__abi_IUnknown", "::IUnknown"],
    &["IInspectable", "__abi_IInspectable", "::IInspectable"],
];

/// Options for [`crate::TypeRegistry::with_options`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions
{
    /// Log when a UDT's layout extends past its declared size
    pub warn_on_size_mismatch: bool,
    /// Sets of UDT names that compare equal regardless of contents
    pub interface_synonyms: Vec<Vec<String>>,
}

impl Default for RegistryOptions
{
    fn default() -> Self
    {
        Self {
            warn_on_size_mismatch: true,
            interface_synonyms: DEFAULT_INTERFACE_SYNONYMS
                .iter()
                .map(|set| set.iter().map(|name| (*name).to_string()).collect())
                .collect(),
        }
    }
}

impl RegistryOptions
{
    /// Index of the synonym set containing `name`, if any.
    pub fn synonym_set(&self, name: &str) -> Option<usize>
    {
        self.interface_synonyms
            .iter()
            .position(|set| set.iter().any(|candidate| candidate == name))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_default_synonyms()
    {
        let options = RegistryOptions::default();
        assert!(options.warn_on_size_mismatch);
        assert_eq!(options.synonym_set("IUnknown"), options.synonym_set("__abi_IUnknown"));
        assert_eq!(options.synonym_set("::IInspectable"), Some(1));
        assert_eq!(options.synonym_set("IDispatch"), None);
    }
}
