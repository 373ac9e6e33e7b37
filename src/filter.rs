use serde::{Deserialize, Serialize};

/// Drops transactions whose description contains one of `exclude`, unless it
/// also contains one of `keep`. Matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub keep: Vec<String>,
}

impl TransactionFilter {
    pub fn is_excluded(&self, description: &str) -> bool {
        let desc = description.to_lowercase();
        let contains_any = |needles: &[String]| {
            needles
                .iter()
                .filter(|n| !n.trim().is_empty())
                .any(|n| desc.contains(&n.trim().to_lowercase()))
        };
        contains_any(&self.exclude) && !contains_any(&self.keep)
    }
}
