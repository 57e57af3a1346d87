use anyhow::Context;
use serde::Deserialize;

static DEFAULT_CATALOG: &str = include_str!("../data/catalog.json");

/// Static reference data: the car models the shop services and the fixed set
/// of issue categories. Loaded once at startup and never mutated.
#[derive(Clone, Debug, Deserialize)]
pub struct Catalog {
    pub cars: Vec<String>,
    pub issues: Vec<String>,
}

impl Catalog {
    /// Load the catalog from `path`, falling back to the embedded fixture
    /// when no path is configured.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let raw = match path {
            Some(p) => std::fs::read_to_string(p)
                .with_context(|| format!("failed to read catalog file {p}"))?,
            None => DEFAULT_CATALOG.to_string(),
        };

        let catalog: Catalog = serde_json::from_str(&raw).context("invalid catalog JSON")?;
        anyhow::ensure!(!catalog.cars.is_empty(), "catalog lists no car models");
        anyhow::ensure!(!catalog.issues.is_empty(), "catalog lists no issue categories");
        Ok(catalog)
    }

    /// Case-insensitive exact match, returning the catalog's canonical
    /// spelling of the model.
    pub fn find_exact(&self, input: &str) -> Option<&str> {
        self.cars
            .iter()
            .find(|model| model.eq_ignore_ascii_case(input))
            .map(String::as_str)
    }

    /// Models that look similar to the input: the input contains the model
    /// name or the model name contains the input, ignoring case.
    pub fn find_similar(&self, input: &str) -> Vec<String> {
        let needle = input.to_lowercase();
        self.cars
            .iter()
            .filter(|model| {
                let model = model.to_lowercase();
                model.contains(&needle) || needle.contains(&model)
            })
            .cloned()
            .collect()
    }
}
