use std::collections::HashSet;

/// Dedup keys the coordinator has seen, growing for the whole run
#[derive(Debug, Default, Clone)]
pub struct VisitedSet {
    keys: HashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` visited; returns false if it already was
    pub fn mark(&mut self, key: &str) -> bool {
        if self.keys.contains(key) {
            return false;
        }
        self.keys.insert(key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_is_first_wins() {
        let mut visited = VisitedSet::new();
        assert!(visited.mark("abc"));
        assert!(!visited.mark("abc"));
        assert!(visited.contains("abc"));
        assert_eq!(visited.len(), 1);
    }
}
