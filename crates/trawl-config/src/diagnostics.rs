use std::collections::BTreeSet;

use serde::de::DeserializeOwned;

/// Non-fatal findings from loading a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiagnostics {
    /// Keys in the input that the schema does not recognize, as dotted paths
    /// (`search.max_paralelism`).
    pub unknown_keys: Vec<String>,
}

impl ConfigDiagnostics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unknown_keys.is_empty()
    }
}

/// Deserialize `text`, collecting every key the target type ignored.
pub(crate) fn parse_collecting_unknown<T: DeserializeOwned>(
    text: &str,
) -> Result<(T, Vec<String>), toml::de::Error> {
    let mut ignored = BTreeSet::new();
    let value: T = serde_ignored::deserialize(toml::de::Deserializer::new(text), |path| {
        // Root-level paths render with a leading dot.
        ignored.insert(path.to_string().trim_start_matches('.').to_owned());
    })?;
    Ok((value, ignored.into_iter().collect()))
}
