use nalgebra_sparse::pattern::SparsityPattern;
use std::collections::VecDeque;

/// Computes a reverse Cuthill-McKee ordering of the (symmetrized) graph of a square pattern.
///
/// The result `perm` maps new indices to old indices, i.e. row `i` of the reordered matrix is
/// row `perm[i]` of the original. Every connected component is started from a vertex of
/// minimum degree, and neighbors are visited in order of increasing degree (ties broken by
/// index), which makes the ordering deterministic.
pub fn reverse_cuthill_mckee(pattern: &SparsityPattern) -> Vec<usize> {
    assert_eq!(
        pattern.major_dim(),
        pattern.minor_dim(),
        "Reordering requires a square pattern"
    );
    let n = pattern.major_dim();

    let mut adjacency = vec![Vec::new(); n];
    for i in 0..n {
        for &j in pattern.lane(i) {
            if i != j {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }
    for neighbors in &mut adjacency {
        neighbors.sort_unstable();
        neighbors.dedup();
    }
    let degree = |i: usize| adjacency[i].len();

    let mut by_degree: Vec<usize> = (0..n).collect();
    by_degree.sort_by_key(|&i| (degree(i), i));

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();
    let mut neighbors = Vec::new();
    for &start in &by_degree {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            neighbors.clear();
            neighbors.extend(adjacency[i].iter().copied().filter(|&j| !visited[j]));
            neighbors.sort_by_key(|&j| (degree(j), j));
            for &j in &neighbors {
                visited[j] = true;
                queue.push_back(j);
            }
        }
    }

    order.reverse();
    order
}

/// Returns the inverse of a permutation.
pub fn invert_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![usize::MAX; perm.len()];
    for (new, &old) in perm.iter().enumerate() {
        inverse[old] = new;
    }
    inverse
}
