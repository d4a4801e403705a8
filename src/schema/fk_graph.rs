//! Undirected table graph built from declared foreign keys.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{ForeignKey, SchemaView};

/// Adjacency between tables connected by at least one foreign key.
#[derive(Debug, Clone, Default)]
pub struct FkGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl FkGraph {
    pub fn build(schema: &SchemaView) -> Self {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (table, fk) in schema.foreign_key_edges() {
            // Dangling references are ignored
            let Some(target) = schema.find_table(&fk.target_table) else {
                continue;
            };
            edges
                .entry(table.to_string())
                .or_default()
                .insert(target.to_string());
            edges
                .entry(target.to_string())
                .or_default()
                .insert(table.to_string());
        }
        Self { edges }
    }

    pub fn neighbors(&self, table: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(table)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Breadth-first expansion of `seeds` up to `hops` edges away.
    /// Seeds are always part of the result.
    pub fn expand(&self, seeds: &[String], hops: usize) -> BTreeSet<String> {
        let mut visited: BTreeSet<String> = seeds.iter().cloned().collect();
        let mut queue: VecDeque<(String, usize)> = seeds.iter().map(|t| (t.clone(), 0)).collect();

        while let Some((table, depth)) = queue.pop_front() {
            if depth >= hops {
                continue;
            }
            for neighbor in self.neighbors(&table) {
                if visited.insert(neighbor.to_string()) {
                    queue.push_back((neighbor.to_string(), depth + 1));
                }
            }
        }
        visited
    }

    /// Shortest table path from `from` to `to`, empty when unreachable.
    pub fn path(&self, from: &str, to: &str) -> Vec<String> {
        if from == to {
            return vec![from.to_string()];
        }
        let mut visited = BTreeSet::from([from.to_string()]);
        let mut queue = VecDeque::from([vec![from.to_string()]]);

        while let Some(path) = queue.pop_front() {
            let Some(current) = path.last() else { continue };
            for neighbor in self.neighbors(current) {
                if neighbor == to {
                    let mut found = path.clone();
                    found.push(neighbor.to_string());
                    return found;
                }
                if visited.insert(neighbor.to_string()) {
                    let mut next = path.clone();
                    next.push(neighbor.to_string());
                    queue.push_back(next);
                }
            }
        }
        Vec::new()
    }
}

/// Foreign-key edges touching `table`, in either direction, as
/// `(owning table, fk)` pairs.
pub fn edges_touching<'a>(schema: &'a SchemaView, table: &str) -> Vec<(&'a str, &'a ForeignKey)> {
    schema
        .foreign_key_edges()
        .into_iter()
        .filter(|(owner, fk)| {
            owner.eq_ignore_ascii_case(table) || fk.target_table.eq_ignore_ascii_case(table)
        })
        .collect()
}
