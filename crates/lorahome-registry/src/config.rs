/// Controls how the registry treats re-registration.
///
/// The default overwrites silently: the last class factory or device
/// registered under a key wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryPolicy {
    /// When true, registering a second device with an existing identity
    /// fails with `RegistryError::DuplicateDevice`.
    pub reject_duplicate_ids: bool,
    /// When true, registering a second factory under an existing class
    /// identifier fails with `RegistryError::DuplicateClass`.
    pub reject_duplicate_classes: bool,
}

impl RegistryPolicy {
    /// Reject both kinds of duplicates.
    pub fn strict() -> Self {
        Self {
            reject_duplicate_ids: true,
            reject_duplicate_classes: true,
        }
    }
}
