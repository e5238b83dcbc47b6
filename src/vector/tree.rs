//! Random projection forest for approximate angular search.
//!
//! **Technical Name**: Random Projection Forest (Annoy-style)
//!
//! Algorithm:
//! - Each tree splits its items by the hyperplane through the origin that
//!   bisects two randomly chosen items, recursing until a node holds at most
//!   `max_leaf_size` items
//! - Queries walk all trees at once through a priority queue ordered by the
//!   smallest margin seen on the path, collecting leaf items until `search_k`
//!   distinct candidates are found, then rank candidates exactly
//!
//! The forest must be rebuilt after insertions. Rebuilding is deferred to the
//! next search through [`BuildState`], so a batch of inserts pays for one
//! build.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TreeConfig;
use crate::error::VectorResult;
use crate::vector::types::{VectorDimension, angular_distance, dot, norm};

/// Fraction of a node below which a hyperplane split counts as degenerate.
const MIN_SPLIT_FRACTION: f32 = 0.05;

/// Attempts at finding a usable hyperplane before splitting by halves.
const SPLIT_ATTEMPTS: usize = 3;

/// Whether the trees reflect every inserted item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Trees cover all items; queries run directly
    Fresh,
    /// Items were added since the last build; the next search rebuilds
    Dirty,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        /// Unit normal; `None` when the node was split by halves
        normal: Option<Vec<f32>>,
        left: usize,
        right: usize,
    },
    Leaf {
        items: Vec<u32>,
    },
}

/// Heap entry ordered by priority, then by node index for determinism.
#[derive(Debug, Clone, Copy)]
struct Pending {
    priority: f32,
    node: usize,
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
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Forest of random projection trees over angular distance.
#[derive(Debug, Clone)]
pub struct RpForest {
    dimension: VectorDimension,
    config: TreeConfig,
    seed: u64,
    /// Row-major vector data, `len * dimension` values
    vectors: Vec<f32>,
    nodes: Vec<Node>,
    roots: Vec<usize>,
    state: BuildState,
}

impl RpForest {
    pub fn new(dimension: VectorDimension, config: &TreeConfig) -> VectorResult<Self> {
        config.validate()?;
        Ok(Self {
            dimension,
            config: *config,
            seed: config.seed.unwrap_or_else(rand::random),
            vectors: Vec::new(),
            nodes: Vec::new(),
            roots: Vec::new(),
            state: BuildState::Fresh,
        })
    }

    /// Appends a vector at the next position and marks the forest dirty.
    pub fn add(&mut self, vector: &[f32]) -> VectorResult<usize> {
        self.dimension.validate_vector(vector)?;
        let position = self.len();
        self.vectors.extend_from_slice(vector);
        self.state = BuildState::Dirty;
        Ok(position)
    }

    /// Rebuilds every tree if items were added since the last build.
    pub fn build(&mut self) {
        if self.state == BuildState::Fresh {
            return;
        }

        // Same seed, same data: same trees
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut nodes = Vec::new();
        let mut roots = Vec::with_capacity(self.config.num_trees);

        let all: Vec<u32> = (0..self.len() as u32).collect();
        for _ in 0..self.config.num_trees {
            roots.push(self.build_node(&mut nodes, all.clone(), &mut rng));
        }

        tracing::debug!(
            "rebuilt {} trees over {} items ({} nodes)",
            roots.len(),
            self.len(),
            nodes.len()
        );

        self.nodes = nodes;
        self.roots = roots;
        self.state = BuildState::Fresh;
    }

    fn build_node(&self, nodes: &mut Vec<Node>, items: Vec<u32>, rng: &mut StdRng) -> usize {
        if items.len() <= self.config.max_leaf_size {
            nodes.push(Node::Leaf { items });
            return nodes.len() - 1;
        }

        let (normal, left_items, right_items) = self.split(items, rng);

        let left = self.build_node(nodes, left_items, rng);
        let right = self.build_node(nodes, right_items, rng);
        nodes.push(Node::Split {
            normal,
            left,
            right,
        });
        nodes.len() - 1
    }

    /// Splits `items` by a bisecting hyperplane, falling back to halves when
    /// no balanced plane turns up.
    fn split(
        &self,
        mut items: Vec<u32>,
        rng: &mut StdRng,
    ) -> (Option<Vec<f32>>, Vec<u32>, Vec<u32>) {
        let min_side = ((items.len() as f32 * MIN_SPLIT_FRACTION) as usize).max(1);

        for _ in 0..SPLIT_ATTEMPTS {
            let a = items[rng.random_range(0..items.len())];
            let b = items[rng.random_range(0..items.len())];
            let Some(normal) = bisector(self.vector(a), self.vector(b)) else {
                continue;
            };

            let (right, left): (Vec<u32>, Vec<u32>) = items
                .iter()
                .copied()
                .partition(|&item| dot(&normal, self.vector(item)) > 0.0);

            if left.len() >= min_side && right.len() >= min_side {
                return (Some(normal), left, right);
            }
        }

        let right = items.split_off(items.len() / 2);
        (None, items, right)
    }

    /// Searches, rebuilding first if the forest is dirty.
    ///
    /// Returns `(position, angular distance)` pairs, nearest first, ties
    /// broken by position.
    pub fn search(&mut self, query: &[f32], k: usize) -> VectorResult<Vec<(usize, f32)>> {
        self.dimension.validate_vector(query)?;
        self.build();
        Ok(self.query(query, k))
    }

    /// Searches an already built forest.
    pub(crate) fn query(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        debug_assert_eq!(self.state, BuildState::Fresh);

        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let search_k = self
            .config
            .search_k
            .unwrap_or(self.config.num_trees * k)
            .max(k);

        let mut heap: BinaryHeap<Pending> = self
            .roots
            .iter()
            .map(|&node| Pending {
                priority: f32::INFINITY,
                node,
            })
            .collect();
        let mut candidates = BTreeSet::new();

        while candidates.len() < search_k {
            let Some(Pending { priority, node }) = heap.pop() else {
                break;
            };
            match &self.nodes[node] {
                Node::Leaf { items } => candidates.extend(items.iter().copied()),
                Node::Split {
                    normal,
                    left,
                    right,
                } => {
                    // Halves splits carry no geometry; both sides keep the
                    // parent's priority
                    let (right_priority, left_priority) = match normal {
                        Some(normal) => {
                            let margin = dot(normal, query);
                            (priority.min(margin), priority.min(-margin))
                        }
                        None => (priority, priority),
                    };
                    heap.push(Pending {
                        priority: right_priority,
                        node: *right,
                    });
                    heap.push(Pending {
                        priority: left_priority,
                        node: *left,
                    });
                }
            }
        }

        let mut hits: Vec<(usize, f32)> = candidates
            .into_iter()
            .map(|item| {
                let position = item as usize;
                (position, angular_distance(query, self.vector(item)))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        hits
    }

    /// Drops every item and tree. The seed is kept, so refilling with the
    /// same data reproduces the same forest.
    pub fn clear(&mut self) {
        self.vectors.clear();
        self.nodes.clear();
        self.roots.clear();
        self.state = BuildState::Fresh;
    }

    fn vector(&self, item: u32) -> &[f32] {
        let dim = self.dimension.get();
        let start = item as usize * dim;
        &self.vectors[start..start + dim]
    }

    #[must_use]
    pub fn state(&self) -> BuildState {
        self.state
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimension.get()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Configuration with the seed in use filled in.
    #[must_use]
    pub fn config(&self) -> TreeConfig {
        TreeConfig {
            seed: Some(self.seed),
            ..self.config
        }
    }
}

/// Unit normal of the plane through the origin bisecting the directions of
/// `a` and `b`, or `None` when they point the same way.
fn bisector(a: &[f32], b: &[f32]) -> Option<Vec<f32>> {
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    let mut normal: Vec<f32> = a.iter().zip(b).map(|(x, y)| x / na - y / nb).collect();
    let len = norm(&normal);
    if len < 1e-6 {
        return None;
    }
    normal.iter_mut().for_each(|x| *x /= len);
    Some(normal)
}
