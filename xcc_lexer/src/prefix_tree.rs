//! Longest-match lookup over a fixed set of lexemes (spec.md §4.1).
//!
//! A trie of `char -> node` with an attached value at nodes that terminate
//! a registered lexeme. Lookup at a given start index walks as far as
//! possible and falls back to the deepest valued ancestor on an exhausted
//! branch, yielding the *longest* match rather than the first.

use std::collections::HashMap;

struct Node<V> {
    children: HashMap<char, Node<V>>,
    value: Option<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            value: None,
        }
    }
}

pub struct PrefixTree<V> {
    root: Node<V>,
}

impl<V: Clone> PrefixTree<V> {
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    pub fn insert(&mut self, lexeme: &str, value: V) {
        let mut node = &mut self.root;
        for ch in lexeme.chars() {
            node = node.children.entry(ch).or_insert_with(Node::new);
        }
        node.value = Some(value);
    }

    /// Longest matching lexeme starting at `chars`, returning the value and
    /// the number of source characters consumed. `None` if nothing in the
    /// tree is a prefix of the input at this position.
    pub fn longest_match(&self, chars: &[char]) -> Option<(V, usize)> {
        let mut node = &self.root;
        let mut best: Option<(V, usize)> = None;

        for (i, ch) in chars.iter().enumerate() {
            match node.children.get(ch) {
                Some(next) => {
                    node = next;
                    if let Some(v) = &node.value {
                        best = Some((v.clone(), i + 1));
                    }
                }
                None => break,
            }
        }

        best
    }
}

impl<V: Clone> Default for PrefixTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> PrefixTree<&'static str> {
        let mut tree = PrefixTree::new();
        tree.insert("&", "amp");
        tree.insert("&&", "andand");
        tree.insert("&&=", "andandassign");
        tree.insert("&=", "ampassign");
        tree
    }

    #[test]
    fn returns_longest_match() {
        let tree = build();
        let chars: Vec<char> = "&&=rest".chars().collect();
        assert_eq!(tree.longest_match(&chars), Some(("andandassign", 3)));
    }

    #[test]
    fn falls_back_to_deepest_valued_ancestor() {
        let tree = build();
        let chars: Vec<char> = "&&x".chars().collect();
        assert_eq!(tree.longest_match(&chars), Some(("andand", 2)));
    }

    #[test]
    fn no_match_returns_none() {
        let tree = build();
        let chars: Vec<char> = "x".chars().collect();
        assert_eq!(tree.longest_match(&chars), None);
    }
}
