use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_CATEGORY: &str = "other";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkEntry {
    pub name: String,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
struct BenchmarkMeta {
    #[serde(default)]
    category: Option<String>,
}

/// Benchmark names and categories, loaded once from a YAML mapping of
/// `name -> { category, ... }`. Other metadata keys are ignored.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkCatalog {
    entries: Vec<BenchmarkEntry>,
}

impl BenchmarkCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read benchmark catalog {}: {}", path.display(), e))?;
        Self::from_yaml_str(&raw)
            .map_err(|e| anyhow!("invalid benchmark catalog {}: {}", path.display(), e))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let parsed: BTreeMap<String, Option<BenchmarkMeta>> = serde_yaml::from_str(raw)?;
        let entries = parsed
            .into_iter()
            .map(|(name, meta)| BenchmarkEntry {
                name,
                category: meta
                    .unwrap_or_default()
                    .category
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[BenchmarkEntry] {
        &self.entries
    }

    pub fn names_in_categories(&self, categories: &[String]) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| categories.iter().any(|c| c == &e.category))
            .map(|e| e.name.clone())
            .collect()
    }
}

pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
activerecord:
  desc: ActiveRecord queries against sqlite
  category: headline
railsbench:
  category: headline
hexapdf:
  category: other
fib:
  category: micro
chunky-png:
"#;

    #[test]
    fn missing_category_defaults_to_other() {
        let catalog = BenchmarkCatalog::from_yaml_str(CATALOG).expect("catalog");
        let png = catalog
            .entries()
            .iter()
            .find(|e| e.name == "chunky-png")
            .expect("chunky-png entry");
        assert_eq!(png.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn filtered_names_belong_to_requested_categories() {
        let catalog = BenchmarkCatalog::from_yaml_str(CATALOG).expect("catalog");
        let requested = vec!["headline".to_string(), "micro".to_string()];
        let names = catalog.names_in_categories(&requested);
        assert!(!names.is_empty());
        for name in &names {
            let entry = catalog
                .entries()
                .iter()
                .find(|e| &e.name == name)
                .expect("entry");
            assert!(requested.contains(&entry.category), "{} leaked", name);
        }
    }

    #[test]
    fn headline_only_selects_headline_benchmark() {
        let catalog = BenchmarkCatalog::from_yaml_str(
            "a:\n  category: headline\nb:\n  category: other\n",
        )
        .expect("catalog");
        let names = catalog.names_in_categories(&["headline".to_string()]);
        assert_eq!(names, vec!["a".to_string()]);
    }

    #[test]
    fn name_list_trims_and_drops_empty() {
        assert_eq!(
            parse_name_list(" headline, other ,,"),
            vec!["headline".to_string(), "other".to_string()]
        );
    }

    #[test]
    fn non_mapping_catalog_is_rejected() {
        assert!(BenchmarkCatalog::from_yaml_str("- a\n- b\n").is_err());
    }
}
