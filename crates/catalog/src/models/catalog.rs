use super::CatalogEntry;
use std::collections::HashMap;

/// The full catalog snapshot, in export order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}
impl Catalog {
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Looks up an entry by its exact identifier.
    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Groups entries under a caller-supplied key, preserving catalog order
    /// inside each group. Entries whose key is empty are left out.
    pub fn group_by<F>(&self, key: F) -> HashMap<String, Vec<&CatalogEntry>>
    where
        F: Fn(&CatalogEntry) -> String,
    {
        let mut groups: HashMap<String, Vec<&CatalogEntry>> = HashMap::new();
        for entry in &self.entries {
            let k = key(entry);
            if !k.is_empty() {
                groups.entry(k).or_default().push(entry);
            }
        }
        groups
    }
}
impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;
    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str) -> CatalogEntry {
        CatalogEntry::new(id, title, ["Author"], None::<String>)
    }

    #[test]
    fn test_group_by_preserves_order() {
        let catalog = Catalog::new([entry("B000000001", "Dune"), entry("B000000002", "Emma"), entry("B000000003", "Dune")]);
        let groups = catalog.group_by(|e| e.title.to_lowercase());
        let dunes: Vec<_> = groups["dune"].iter().map(|e| e.id.as_str()).collect();
        assert_eq!(dunes, ["B000000001", "B000000003"]);
        assert_eq!(groups["emma"].len(), 1);
    }

    #[test]
    fn test_group_by_skips_empty_keys() {
        let catalog = Catalog::new([entry("B000000001", "!!!")]);
        let groups = catalog.group_by(|e| e.title.chars().filter(|c| c.is_alphanumeric()).collect());
        assert!(groups.is_empty());
    }

    #[test]
    fn test_get() {
        let catalog = Catalog::new([entry("B000000001", "Dune")]);
        assert_eq!(catalog.get("B000000001").map(|e| e.title.as_str()), Some("Dune"));
        assert!(catalog.get("b000000001").is_none());
    }
}
