//! Content pool loading and validation.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur while loading the content pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Content pool is empty: no non-blank lines in the source")]
    Empty,

    #[error("Failed to read content pool: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable, ordered list of items served to users.
///
/// Indices are stable for the lifetime of the process: the history store
/// records them, so the pool is never mutated after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPool {
    items: Vec<String>,
}

impl ContentPool {
    /// Loads the pool from a text file, one item per line.
    ///
    /// Lines are trimmed; blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Io`] if the file cannot be read and
    /// [`PoolError::Empty`] if it contains no items.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_items(content.lines())
    }

    /// Builds a pool from an in-memory source with the same filtering as [`ContentPool::load`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Empty`] if no item survives filtering.
    pub fn from_items<I, S>(items: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let items: Vec<String> = items
            .into_iter()
            .map(|s| s.as_ref().trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();

        if items.is_empty() {
            return Err(PoolError::Empty);
        }

        Ok(Self { items })
    }

    /// Returns the number of items. Always at least 1.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if the pool has no items. Never true for a loaded pool.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`. Callers only pass indices drawn from `0..len()`.
    #[must_use]
    pub fn item_at(&self, index: usize) -> &str {
        &self.items[index]
    }

    /// Returns the item at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    /// Iterates over all items in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Example pool for `--generate-pool`.
    #[must_use]
    pub fn example() -> Self {
        Self {
            items: vec![
                "Bitcoin will test your patience before it tests a new high.".to_owned(),
                "A forgotten wallet will remind you of itself this week.".to_owned(),
                "TON will surprise those who stopped watching.".to_owned(),
                "Today is a good day to take profit and a bad day to FOMO.".to_owned(),
                "The next airdrop you ignore will be the one that mattered.".to_owned(),
            ],
        }
    }

    /// Writes the pool to a file, one item per line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), PoolError> {
        let mut content = self.items.join("\n");
        content.push('\n');
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_items_skips_blank_lines() {
        let pool = ContentPool::from_items(["A", "", "  ", " B ", "C"]).unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.item_at(1), "B");
    }

    #[test]
    fn test_empty_source_is_rejected() {
        assert!(matches!(
            ContentPool::from_items(["", "   "]),
            Err(PoolError::Empty)
        ));
        assert!(matches!(
            ContentPool::from_items(Vec::<String>::new()),
            Err(PoolError::Empty)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.txt");
        std::fs::write(&path, "first\n\nsecond\r\nthird\n").unwrap();

        let pool = ContentPool::load(&path).unwrap();
        assert_eq!(pool.iter().collect::<Vec<_>>(), ["first", "second", "third"]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ContentPool::load(dir.path().join("missing.txt"));
        assert!(matches!(result, Err(PoolError::Io(_))));
    }

    #[test]
    fn test_get_out_of_range() {
        let pool = ContentPool::from_items(["only"]).unwrap();
        assert_eq!(pool.get(0), Some("only"));
        assert_eq!(pool.get(1), None);
    }

    #[test]
    #[should_panic]
    fn test_item_at_out_of_range_panics() {
        let pool = ContentPool::from_items(["only"]).unwrap();
        let _ = pool.item_at(1);
    }

    #[test]
    fn test_example_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.txt");
        let example = ContentPool::example();
        example.save_to_file(&path).unwrap();
        assert_eq!(ContentPool::load(&path).unwrap(), example);
    }
}
