//! Parent-pointer trees for roles (one parent) and menus (many parents).
//!
//! Callers load the whole table into a lookup and pass closures; both tables
//! are small and the walks stay bounded by [`MAX_DEPTH`].

use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

use serde::Serialize;

use crate::{HrError, HrResult};

/// A root sits on level 1; nothing may sit below level 5.
pub const MAX_DEPTH: usize = 5;

/// Level `node` would occupy under `parent`, checked against the depth limit
/// and for cycles.
///
/// `subtree_height` is the height of the subtree already hanging off `node`
/// (1 for a leaf or a node being created), so re-parenting also accounts for
/// the descendants that move with it.
pub fn place_under_parent<K, F>(
    node: Option<&K>,
    parent: Option<&K>,
    parent_of: F,
    subtree_height: usize,
) -> HrResult<usize>
where
    K: Eq + Hash + Clone + Display,
    F: Fn(&K) -> Option<K>,
{
    let mut level = 1;
    let mut seen = HashSet::new();
    let mut cursor = parent.cloned();
    while let Some(current) = cursor {
        if node == Some(&current) || !seen.insert(current.clone()) {
            return Err(HrError::Cycle(display_node(node, &current)));
        }
        level += 1;
        if level > MAX_DEPTH {
            return Err(HrError::DepthExceeded { max: MAX_DEPTH });
        }
        cursor = parent_of(&current);
    }
    ensure_fits(level, subtree_height)?;
    Ok(level)
}

/// Multi-parent variant: the level is one more than the deepest parent.
pub fn place_under_parents<K, F>(
    node: Option<&K>,
    parents: &[K],
    parents_of: F,
    subtree_height: usize,
) -> HrResult<usize>
where
    K: Eq + Hash + Clone + Display,
    F: Fn(&K) -> Vec<K>,
{
    let mut levels = HashMap::new();
    let mut deepest = 0;
    for parent in parents {
        if node == Some(parent) {
            return Err(HrError::Cycle(parent.to_string()));
        }
        let mut path = Vec::new();
        let level = level_of(parent, node, &parents_of, &mut levels, &mut path)?;
        deepest = deepest.max(level);
    }
    let level = deepest + 1;
    ensure_fits(level, subtree_height)?;
    Ok(level)
}

fn level_of<K, F>(
    key: &K,
    node: Option<&K>,
    parents_of: &F,
    memo: &mut HashMap<K, usize>,
    path: &mut Vec<K>,
) -> HrResult<usize>
where
    K: Eq + Hash + Clone + Display,
    F: Fn(&K) -> Vec<K>,
{
    if let Some(level) = memo.get(key) {
        return Ok(*level);
    }
    if node == Some(key) || path.contains(key) {
        return Err(HrError::Cycle(display_node(node, key)));
    }
    if path.len() >= MAX_DEPTH {
        return Err(HrError::DepthExceeded { max: MAX_DEPTH });
    }
    path.push(key.clone());
    let mut deepest = 0;
    for parent in parents_of(key) {
        deepest = deepest.max(level_of(&parent, node, parents_of, memo, path)?);
    }
    path.pop();
    let level = deepest + 1;
    memo.insert(key.clone(), level);
    Ok(level)
}

fn ensure_fits(level: usize, subtree_height: usize) -> HrResult<()> {
    if level + subtree_height.max(1) - 1 > MAX_DEPTH {
        return Err(HrError::DepthExceeded { max: MAX_DEPTH });
    }
    Ok(())
}

fn display_node<K: Display>(node: Option<&K>, fallback: &K) -> String {
    node.map(ToString::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Height of the subtree rooted at `root`, counting `root` itself.
pub fn subtree_height<K, F>(root: &K, children_of: F) -> usize
where
    K: Eq + Hash + Clone,
    F: Fn(&K) -> Vec<K>,
{
    fn walk<K, F>(key: &K, children_of: &F, seen: &mut HashSet<K>) -> usize
    where
        K: Eq + Hash + Clone,
        F: Fn(&K) -> Vec<K>,
    {
        if !seen.insert(key.clone()) {
            return 0;
        }
        let below = children_of(key)
            .iter()
            .map(|child| walk(child, children_of, seen))
            .max()
            .unwrap_or(0);
        seen.remove(key);
        below + 1
    }
    walk(root, &children_of, &mut HashSet::new())
}

/// True when `target` sits strictly below `manager`.
pub fn is_ancestor<K, F>(manager: &K, target: &K, parent_of: F) -> bool
where
    K: Eq + Hash + Clone,
    F: Fn(&K) -> Option<K>,
{
    let mut seen = HashSet::new();
    let mut cursor = parent_of(target);
    while let Some(current) = cursor {
        if &current == manager {
            return true;
        }
        if !seen.insert(current.clone()) {
            return false;
        }
        cursor = parent_of(&current);
    }
    false
}

#[derive(Clone, Debug, Serialize)]
pub struct TreeNode<T> {
    #[serde(flatten)]
    pub item: T,
    pub children: Vec<TreeNode<T>>,
}

/// Nests `items` under their parents.
///
/// An item with several parents is repeated under each. Items whose parents
/// are all absent from `items` become roots, which lets a filtered subset
/// still render.
pub fn build_forest<T, K, I, P>(items: Vec<T>, id_of: I, parents_of: P) -> Vec<TreeNode<T>>
where
    T: Clone,
    K: Eq + Hash + Clone,
    I: Fn(&T) -> K,
    P: Fn(&T) -> Vec<K>,
{
    let ids: HashSet<K> = items.iter().map(&id_of).collect();
    let mut children: HashMap<K, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let present: Vec<K> = parents_of(item)
            .into_iter()
            .filter(|parent| ids.contains(parent))
            .collect();
        if present.is_empty() {
            roots.push(index);
        }
        for parent in present {
            children.entry(parent).or_default().push(index);
        }
    }

    fn attach<T, K, I>(
        index: usize,
        items: &[T],
        id_of: &I,
        children: &HashMap<K, Vec<usize>>,
        depth: usize,
    ) -> TreeNode<T>
    where
        T: Clone,
        K: Eq + Hash + Clone,
        I: Fn(&T) -> K,
    {
        let item = items[index].clone();
        let nested = if depth >= MAX_DEPTH {
            Vec::new()
        } else {
            children
                .get(&id_of(&item))
                .map(|kids| {
                    kids.iter()
                        .map(|kid| attach(*kid, items, id_of, children, depth + 1))
                        .collect()
                })
                .unwrap_or_default()
        };
        TreeNode {
            item,
            children: nested,
        }
    }

    roots
        .into_iter()
        .map(|index| attach(index, &items, &id_of, &children, 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(len: u32) -> HashMap<u32, Option<u32>> {
        (1..=len)
            .map(|id| (id, if id == 1 { None } else { Some(id - 1) }))
            .collect()
    }

    #[test]
    fn single_parent_depth_is_limited() {
        let tree = chain(5);
        let parent_of = |k: &u32| tree.get(k).copied().flatten();
        assert_eq!(place_under_parent(None, None, parent_of, 1), Ok(1));
        assert_eq!(place_under_parent(None, Some(&4), parent_of, 1), Ok(5));
        assert_eq!(
            place_under_parent(None, Some(&5), parent_of, 1),
            Err(HrError::DepthExceeded { max: MAX_DEPTH })
        );
        // Moving a two-level subtree under level 4 would push a leaf to level 6.
        assert_eq!(
            place_under_parent(Some(&99), Some(&4), parent_of, 2),
            Err(HrError::DepthExceeded { max: MAX_DEPTH })
        );
    }

    #[test]
    fn single_parent_cycles_are_rejected() {
        let tree = chain(4);
        let parent_of = |k: &u32| tree.get(k).copied().flatten();
        assert_eq!(
            place_under_parent(Some(&2), Some(&4), parent_of, 1),
            Err(HrError::Cycle("2".into()))
        );
        assert_eq!(
            place_under_parent(Some(&3), Some(&3), parent_of, 1),
            Err(HrError::Cycle("3".into()))
        );
    }

    #[test]
    fn multi_parent_uses_deepest_path() {
        // 1 -> 2 -> 3, and 4 is a root; 5 hangs off both 3 and 4.
        let parents: HashMap<u32, Vec<u32>> = HashMap::from([
            (1, vec![]),
            (2, vec![1]),
            (3, vec![2]),
            (4, vec![]),
            (5, vec![3, 4]),
        ]);
        let parents_of = |k: &u32| parents.get(k).cloned().unwrap_or_default();
        assert_eq!(place_under_parents(None, &[3, 4], parents_of, 1), Ok(4));
        assert_eq!(place_under_parents(None, &[5], parents_of, 1), Ok(5));
        assert_eq!(
            place_under_parents(Some(&2), &[5], parents_of, 1),
            Err(HrError::Cycle("2".into()))
        );
        assert_eq!(
            place_under_parents(Some(&5), &[5], parents_of, 1),
            Err(HrError::Cycle("5".into()))
        );
    }

    #[test]
    fn menu_with_five_ancestor_levels_is_rejected() {
        let parents: HashMap<u32, Vec<u32>> = (1..=5)
            .map(|id| (id, if id == 1 { vec![] } else { vec![id - 1] }))
            .collect();
        let parents_of = |k: &u32| parents.get(k).cloned().unwrap_or_default();
        assert_eq!(
            place_under_parents(None, &[5], parents_of, 1),
            Err(HrError::DepthExceeded { max: MAX_DEPTH })
        );
    }

    #[test]
    fn measures_subtree_height() {
        let children: HashMap<u32, Vec<u32>> =
            HashMap::from([(1, vec![2, 3]), (2, vec![4]), (4, vec![])]);
        let children_of = |k: &u32| children.get(k).cloned().unwrap_or_default();
        assert_eq!(subtree_height(&1, children_of), 3);
        assert_eq!(subtree_height(&3, children_of), 1);
    }

    #[test]
    fn ancestry_checks_only_strict_descendants() {
        let tree = chain(4);
        let parent_of = |k: &u32| tree.get(k).copied().flatten();
        assert!(is_ancestor(&1, &4, parent_of));
        assert!(is_ancestor(&2, &3, parent_of));
        assert!(!is_ancestor(&3, &3, parent_of));
        assert!(!is_ancestor(&4, &2, parent_of));
    }

    #[test]
    fn forest_repeats_shared_children_and_promotes_orphans() {
        #[derive(Clone, Debug, PartialEq, Serialize)]
        struct Item {
            id: u32,
            parents: Vec<u32>,
        }
        let item = |id, parents: &[u32]| Item {
            id,
            parents: parents.to_vec(),
        };
        let forest = build_forest(
            vec![
                item(1, &[]),
                item(2, &[]),
                item(3, &[1, 2]),
                item(4, &[42]),
            ],
            |i| i.id,
            |i| i.parents.clone(),
        );
        let roots: Vec<u32> = forest.iter().map(|n| n.item.id).collect();
        assert_eq!(roots, vec![1, 2, 4]);
        assert_eq!(forest[0].children[0].item.id, 3);
        assert_eq!(forest[1].children[0].item.id, 3);
        let json = serde_json::to_value(&forest[0]).unwrap();
        assert_eq!(json["children"][0]["id"], 3);
    }
}
