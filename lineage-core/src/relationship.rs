//! Relationship Path Engine
//!
//! Computes and labels the shortest genealogical relationship between two
//! persons in the family graph. Pure and synchronous: the full node set
//! must be materialized by the caller before traversal starts (per-node
//! fetching during the walk would reintroduce the N+1 cost the batch
//! loading layer exists to avoid).
//!
//! Traversal is breadth-first over a combined adjacency of stored parent,
//! child and spouse links plus derived sibling links (persons sharing any
//! parent). A visited set guards every expansion, so cyclic or malformed
//! family data cannot hang the walk. BFS over unweighted edges guarantees
//! the first path that reaches the target has minimum step count.
//!
//! Labeling is an explicit decision table, not a formula; the output
//! strings are part of the public contract and are reproduced exactly.

use crate::{Family, Person, PersonId};
use std::collections::{HashMap, HashSet, VecDeque};

/// One typed step along a relationship path.
///
/// A `Sibling` step is shorthand for up-to-a-shared-parent-and-back-down,
/// so it contributes one generation up AND one down when classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelStep {
    Parent,
    Child,
    Spouse,
    Sibling,
}

/// A step paired with the person it arrives at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub step: RelStep,
    pub person_id: PersonId,
}

/// Ephemeral result of a relationship query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipPath {
    pub from: PersonId,
    pub to: PersonId,
    /// Steps from `from` to `to`; empty for the identity case.
    pub steps: Vec<PathStep>,
    /// Number of steps taken.
    pub distance: usize,
    /// Human-readable label, e.g. "Grandparent" or "1st Cousin once removed".
    pub relationship: String,
}

/// Adjacency for one person node.
#[derive(Debug, Clone, Default)]
struct Node {
    parents: Vec<PersonId>,
    children: Vec<PersonId>,
    spouses: Vec<PersonId>,
}

/// In-memory family graph over a fully loaded person set.
///
/// Edges are only created between persons present in the node set;
/// dangling family references are ignored rather than invented.
#[derive(Debug, Default)]
pub struct FamilyGraph {
    nodes: HashMap<PersonId, Node>,
}

impl FamilyGraph {
    /// Build the graph from materialized persons and families.
    ///
    /// Each family contributes a spousal edge between husband and wife and
    /// parent-child edges from each present parent to each child.
    pub fn build(persons: &[Person], families: &[Family]) -> Self {
        let mut nodes: HashMap<PersonId, Node> = persons
            .iter()
            .map(|p| (p.person_id.clone(), Node::default()))
            .collect();

        for family in families {
            if let (Some(h), Some(w)) = (&family.husband_id, &family.wife_id) {
                if nodes.contains_key(h) && nodes.contains_key(w) {
                    push_unique(&mut nodes.get_mut(h).unwrap().spouses, w);
                    push_unique(&mut nodes.get_mut(w).unwrap().spouses, h);
                }
            }
            for parent in family
                .parent_ids()
                .cloned()
                .collect::<Vec<_>>()
            {
                if !nodes.contains_key(&parent) {
                    continue;
                }
                for child in &family.child_ids {
                    if !nodes.contains_key(child) {
                        continue;
                    }
                    push_unique(&mut nodes.get_mut(&parent).unwrap().children, child);
                    push_unique(&mut nodes.get_mut(child).unwrap().parents, &parent);
                }
            }
        }

        Self { nodes }
    }

    /// Number of persons in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Derived siblings of a person: everyone sharing at least one parent.
    ///
    /// Never persisted; computed on demand from parent-child links. Half
    /// and full siblings are not distinguished.
    pub fn siblings_of(&self, id: &PersonId) -> Vec<PersonId> {
        let mut out: Vec<PersonId> = Vec::new();
        let Some(node) = self.nodes.get(id) else {
            return out;
        };
        for parent in &node.parents {
            if let Some(parent_node) = self.nodes.get(parent) {
                for child in &parent_node.children {
                    if child != id {
                        push_unique(&mut out, child);
                    }
                }
            }
        }
        out
    }

    /// Compute the shortest relationship between two persons.
    ///
    /// Returns `None` when the two persons are in disconnected components
    /// (or either id is unknown); identical ids short-circuit to a
    /// zero-distance "Same person" result before any traversal.
    pub fn relationship_between(
        &self,
        from: &PersonId,
        to: &PersonId,
    ) -> Option<RelationshipPath> {
        if from == to {
            return Some(RelationshipPath {
                from: from.clone(),
                to: to.clone(),
                steps: Vec::new(),
                distance: 0,
                relationship: "Same person".to_string(),
            });
        }
        if !self.nodes.contains_key(from) || !self.nodes.contains_key(to) {
            return None;
        }

        // prev maps each discovered node to (predecessor, arriving step)
        let mut prev: HashMap<PersonId, (PersonId, RelStep)> = HashMap::new();
        let mut visited: HashSet<PersonId> = HashSet::new();
        let mut queue: VecDeque<PersonId> = VecDeque::new();
        visited.insert(from.clone());
        queue.push_back(from.clone());

        while let Some(current) = queue.pop_front() {
            for (next, step) in self.neighbors(&current) {
                if !visited.insert(next.clone()) {
                    continue;
                }
                prev.insert(next.clone(), (current.clone(), step));
                if &next == to {
                    let steps = reconstruct(&prev, from, to);
                    let relationship = label_steps(&steps);
                    return Some(RelationshipPath {
                        from: from.clone(),
                        to: to.clone(),
                        distance: steps.len(),
                        steps,
                        relationship,
                    });
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Combined adjacency of one node: parents, children, spouses, then
    /// derived siblings. Order is fixed so traversal is deterministic.
    fn neighbors(&self, id: &PersonId) -> Vec<(PersonId, RelStep)> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<(PersonId, RelStep)> = Vec::new();
        for p in &node.parents {
            out.push((p.clone(), RelStep::Parent));
        }
        for c in &node.children {
            out.push((c.clone(), RelStep::Child));
        }
        for s in &node.spouses {
            out.push((s.clone(), RelStep::Spouse));
        }
        for s in self.siblings_of(id) {
            out.push((s, RelStep::Sibling));
        }
        out
    }
}

fn push_unique(vec: &mut Vec<PersonId>, id: &PersonId) {
    if !vec.contains(id) {
        vec.push(id.clone());
    }
}

fn reconstruct(
    prev: &HashMap<PersonId, (PersonId, RelStep)>,
    from: &PersonId,
    to: &PersonId,
) -> Vec<PathStep> {
    let mut steps: Vec<PathStep> = Vec::new();
    let mut current = to.clone();
    while &current != from {
        let (pred, step) = &prev[&current];
        steps.push(PathStep {
            step: *step,
            person_id: current.clone(),
        });
        current = pred.clone();
    }
    steps.reverse();
    steps
}

// ============================================================================
// LABEL DECISION TABLE
// ============================================================================

/// (up, down) step counts of a path segment. Sibling counts as both.
fn segment_counts(steps: &[RelStep]) -> (usize, usize) {
    let mut up = 0;
    let mut down = 0;
    for step in steps {
        match step {
            RelStep::Parent => up += 1,
            RelStep::Child => down += 1,
            RelStep::Sibling => {
                up += 1;
                down += 1;
            }
            RelStep::Spouse => {}
        }
    }
    (up, down)
}

/// Label a resolved step sequence.
pub fn label_steps(path: &[PathStep]) -> String {
    let steps: Vec<RelStep> = path.iter().map(|s| s.step).collect();
    label_step_kinds(&steps)
}

fn label_step_kinds(steps: &[RelStep]) -> String {
    if steps.is_empty() {
        return "Same person".to_string();
    }
    if steps.len() == 1 {
        return match steps[0] {
            RelStep::Parent => "Parent",
            RelStep::Child => "Child",
            RelStep::Spouse => "Spouse",
            RelStep::Sibling => "Sibling",
        }
        .to_string();
    }

    let spouse_positions: Vec<usize> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| **s == RelStep::Spouse)
        .map(|(i, _)| i)
        .collect();
    if !spouse_positions.is_empty() {
        return label_marriage(steps, &spouse_positions);
    }

    let (up, down) = segment_counts(steps);
    match (up, down) {
        (up, 0) => ancestor_label(up, "grandparent", "Parent"),
        (0, down) => ancestor_label(down, "grandchild", "Child"),
        (1, 1) => "Sibling".to_string(),
        (2, 1) => "Aunt/Uncle".to_string(),
        (1, 2) => "Niece/Nephew".to_string(),
        (up, down) if up == down && up >= 2 => {
            format!("{} Cousin", ordinal(up - 1))
        }
        (up, down) if up > 1 && down > 1 => {
            let degree = up.min(down) - 1;
            format!(
                "{} Cousin {}",
                ordinal(degree),
                removed_suffix(up.abs_diff(down))
            )
        }
        (up, down) => format!("{} generations up, {} generations down", up, down),
    }
}

/// Direct-line label: Parent/Child at one generation, Grandparent at two,
/// then "Great-" repeated (n - 2) times.
fn ancestor_label(generations: usize, base: &str, direct: &str) -> String {
    debug_assert!(generations >= 1);
    match generations {
        1 => direct.to_string(),
        2 => format!("Grand{}", base.trim_start_matches("grand")),
        n => {
            let mut label = "great-".repeat(n - 2);
            label.push_str(base);
            capitalize(&label)
        }
    }
}

/// In-law classification: the fixed table of before/after-spouse step
/// counts. Anything outside the table, including paths with more than one
/// spouse edge, is generically "Related by marriage".
fn label_marriage(steps: &[RelStep], spouse_positions: &[usize]) -> String {
    if spouse_positions.len() != 1 {
        return "Related by marriage".to_string();
    }
    let pos = spouse_positions[0];
    let before = segment_counts(&steps[..pos]);
    let after = segment_counts(&steps[pos + 1..]);

    match (before, after) {
        ((0, 0), (1, 0)) => "Parent-in-law".to_string(),
        ((0, 0), (2, 0)) => "Grandparent-in-law".to_string(),
        ((0, 0), (0, 1)) => "Step-child".to_string(),
        ((0, 0), (1, 1)) => "Sibling-in-law".to_string(),
        ((0, 1), (0, 0)) => "Child-in-law".to_string(),
        ((1, 1), (0, 0)) => "Sibling-in-law".to_string(),
        _ => "Related by marriage".to_string(),
    }
}

fn removed_suffix(k: usize) -> String {
    match k {
        1 => "once removed".to_string(),
        2 => "twice removed".to_string(),
        k => format!("{} times removed", k),
    }
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
