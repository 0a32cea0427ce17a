use std::collections::HashMap;

use super::{MetadataKey, ModuleInspector};

/// Mock module for testing without a real assembly on disk
#[derive(Debug, Clone, Default)]
pub struct MockModule {
    fields: HashMap<MetadataKey, String>,
}

impl MockModule {
    /// Create a mock module with only a name
    pub fn new(name: impl Into<String>) -> Self {
        let mut fields = HashMap::new();
        fields.insert(MetadataKey::Name, name.into());
        MockModule { fields }
    }

    /// Set a metadata field
    pub fn with(mut self, key: MetadataKey, value: impl Into<String>) -> Self {
        self.fields.insert(key, value.into());
        self
    }
}

impl ModuleInspector for MockModule {
    fn lookup(&self, key: MetadataKey) -> Option<&str> {
        self.fields.get(&key).map(String::as_str)
    }
}
