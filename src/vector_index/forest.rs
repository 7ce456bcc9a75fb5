use std::{cmp::Ordering, collections::BinaryHeap};

use rand::prelude::*;
use serde::{Deserialize, Serialize};

// Attempts at a hyperplane between two random items before falling back to a random split.
const SPLIT_ATTEMPTS: usize = 3;

/// Flat storage of fixed-length vectors, addressed by ordinal.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub(super) struct Vectors {
    dimension: usize,
    data: Vec<f32>,
}

impl Vectors {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: vec![],
        }
    }

    pub fn push(&mut self, vec: &[f32]) -> u32 {
        debug_assert_eq!(vec.len(), self.dimension);
        let ordinal = self.len() as u32;
        self.data.extend_from_slice(vec);
        ordinal
    }

    pub fn get(&self, ordinal: u32) -> &[f32] {
        let start = ordinal as usize * self.dimension;
        &self.data[start..start + self.dimension]
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len().checked_div(self.dimension).unwrap_or(0)
    }

    pub fn is_consistent(&self) -> bool {
        self.dimension > 0 && self.data.len() % self.dimension == 0
    }
}

pub(super) fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
enum Node {
    /// Items with `dot(normal, v) + offset > 0` descend right.
    Split {
        normal: Vec<f32>,
        offset: f32,
        left: u32,
        right: u32,
    },
    Leaf(Vec<u32>),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(super) struct Tree {
    nodes: Vec<Node>,
    root: u32,
}

impl Tree {
    /// Build one random projection tree over `items`. All randomness is drawn from `rng`.
    pub fn build(vectors: &Vectors, items: Vec<u32>, leaf_size: usize, rng: &mut StdRng) -> Self {
        let mut nodes = vec![];
        let root = build_node(vectors, items, leaf_size.max(1), rng, &mut nodes);
        Self { nodes, root }
    }

    /// Every item ordinal held in a leaf.
    pub fn leaf_items(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Leaf(items) => Some(items),
                Node::Split { .. } => None,
            })
            .flatten()
            .copied()
    }

    pub fn child_links_are_valid(&self) -> bool {
        let n = self.nodes.len() as u32;
        self.root < n
            && self.nodes.iter().all(|node| match node {
                Node::Split { left, right, .. } => *left < n && *right < n,
                Node::Leaf(_) => true,
            })
    }
}

fn build_node(
    vectors: &Vectors,
    items: Vec<u32>,
    leaf_size: usize,
    rng: &mut StdRng,
    nodes: &mut Vec<Node>,
) -> u32 {
    if items.len() <= leaf_size {
        nodes.push(Node::Leaf(items));
        return (nodes.len() - 1) as u32;
    }

    let (normal, offset, left_items, right_items) = split(vectors, items, rng);

    let left = build_node(vectors, left_items, leaf_size, rng, nodes);
    let right = build_node(vectors, right_items, leaf_size, rng, nodes);
    nodes.push(Node::Split {
        normal,
        offset,
        left,
        right,
    });
    (nodes.len() - 1) as u32
}

// Partition items by the hyperplane equidistant from two randomly chosen items. Items lying
// exactly on the plane go to a random side. If every attempt leaves one side empty (e.g. the
// items are all identical) the items are shuffled and halved.
fn split(
    vectors: &Vectors,
    items: Vec<u32>,
    rng: &mut StdRng,
) -> (Vec<f32>, f32, Vec<u32>, Vec<u32>) {
    for _ in 0..SPLIT_ATTEMPTS {
        let mut pair = items.choose_multiple(rng, 2);
        let (Some(&a), Some(&b)) = (pair.next(), pair.next()) else {
            break;
        };
        let (va, vb) = (vectors.get(a), vectors.get(b));

        let normal = va.iter().zip(vb).map(|(x, y)| x - y).collect::<Vec<_>>();
        let midpoint = va.iter().zip(vb).map(|(x, y)| (x + y) / 2.0).collect::<Vec<_>>();
        let offset = -dot(&normal, &midpoint);

        let (mut left, mut right) = (vec![], vec![]);
        for &item in &items {
            let margin = dot(&normal, vectors.get(item)) + offset;
            let goes_right = match margin.partial_cmp(&0.0) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Less) => false,
                _ => rng.gen(),
            };
            if goes_right {
                right.push(item);
            } else {
                left.push(item);
            }
        }

        if !left.is_empty() && !right.is_empty() {
            return (normal, offset, left, right);
        }
    }

    // an all-zero normal has no preference, so the query explores both halves equally.
    let mut items = items;
    items.shuffle(rng);
    let right = items.split_off(items.len() / 2);
    (vec![0.0; vectors.dimension()], 0.0, items, right)
}

/// Priority queue entry: larger priority is explored first.
#[derive(Debug, Clone, Copy)]
struct Pending {
    priority: f32,
    tree: u32,
    node: u32,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.tree.cmp(&self.tree))
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Collect at least `search_k` candidate ordinals (or every item, if there are fewer), exploring
/// the nodes of all trees best-first by their distance from the query's side of each split.
/// The candidates are returned sorted and without duplicates.
pub(super) fn candidates(trees: &[Tree], query: &[f32], search_k: usize) -> Vec<u32> {
    let mut queue = trees
        .iter()
        .zip(0u32..)
        .map(|(tree, tree_idx)| Pending {
            priority: f32::INFINITY,
            tree: tree_idx,
            node: tree.root,
        })
        .collect::<BinaryHeap<_>>();

    let mut found = vec![];
    while found.len() < search_k {
        let Some(Pending {
            priority,
            tree,
            node,
        }) = queue.pop()
        else {
            break;
        };

        match &trees[tree as usize].nodes[node as usize] {
            Node::Leaf(items) => found.extend_from_slice(items),
            Node::Split {
                normal,
                offset,
                left,
                right,
            } => {
                let margin = dot(normal, query) + offset;
                queue.push(Pending {
                    priority: priority.min(margin),
                    tree,
                    node: *right,
                });
                queue.push(Pending {
                    priority: priority.min(-margin),
                    tree,
                    node: *left,
                });
            }
        }
    }

    found.sort_unstable();
    found.dedup();
    found
}
