//! Cross-join primitives used to build the dense grid.

/// Pairs every element of `left` with every element of `right`, left-major.
pub fn cartesian_pair<A: Clone, B: Clone>(left: &[A], right: &[B]) -> Vec<(A, B)> {
    let mut pairs = Vec::with_capacity(left.len() * right.len());
    for a in left {
        for b in right {
            pairs.push((a.clone(), b.clone()));
        }
    }
    pairs
}

/// N-ary cross product of value sets, keeping one column per set.
///
/// Folds pairwise: the accumulated combinations are cross-joined with the next set.
/// For sets of sizes n1..nk the result holds n1 * ... * nk combinations; an empty
/// list of sets yields no combinations.
pub fn cartesian_product<T: Clone>(value_sets: &[Vec<T>]) -> Vec<Vec<T>> {
    let Some((first, rest)) = value_sets.split_first() else {
        return Vec::new();
    };

    let seed: Vec<Vec<T>> = first.iter().map(|value| vec![value.clone()]).collect();

    rest.iter().fold(seed, |acc, values| {
        cartesian_pair(&acc, values)
            .into_iter()
            .map(|(mut combination, value)| {
                combination.push(value);
                combination
            })
            .collect()
    })
}
