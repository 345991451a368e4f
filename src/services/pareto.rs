/// `a` strictly beats `b` on both dimensions
pub fn dominates(a: (f64, f64), b: (f64, f64)) -> bool {
    a.0 > b.0 && a.1 > b.1
}

/// Indices of the points no other point dominates, in input order
pub fn efficient_indices(points: &[(f64, f64)]) -> Vec<usize> {
    (0..points.len())
        .filter(|&i| {
            !points
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && dominates(*other, points[i]))
        })
        .collect()
}

/// Peels successive Pareto frontiers until every point is assigned
///
/// Each front holds indices into `points`; the first front is the efficient
/// set of the whole input, the second that of what remains, and so on.
pub fn peel_fronts(points: &[(f64, f64)]) -> Vec<Vec<usize>> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut fronts = Vec::new();

    while !remaining.is_empty() {
        let subset: Vec<(f64, f64)> = remaining.iter().map(|&i| points[i]).collect();
        let efficient = efficient_indices(&subset);

        let front: Vec<usize> = efficient.iter().map(|&k| remaining[k]).collect();
        let mut keep = vec![true; remaining.len()];
        for &k in &efficient {
            keep[k] = false;
        }
        remaining = remaining
            .into_iter()
            .zip(keep)
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();

        fronts.push(front);
    }
    fronts
}
