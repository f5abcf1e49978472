//! Union-find clustering of overlapping candidate windows.
use std::collections::HashMap;

use crate::shared::bounding_box::BoundingBox;

/// Find root of element `i` with path halving for amortized near-O(1).
pub fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge the sets containing `a` and `b`.
pub fn union(parent: &mut [usize], a: usize, b: usize) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent[ra] = rb;
    }
}

/// A group of overlapping candidates collapsed into their mean box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cluster {
    pub bbox: BoundingBox,
    pub members: usize,
}

/// Links every pair of candidates whose IoU exceeds `link_iou` and returns
/// one averaged box per connected component. Output is ordered by member
/// count, largest first, then by position.
pub fn cluster_boxes(candidates: &[BoundingBox], link_iou: f64) -> Vec<Cluster> {
    let n = candidates.len();
    let mut parent: Vec<usize> = (0..n).collect();

    for i in 0..n {
        for j in (i + 1)..n {
            if candidates[i].iou(&candidates[j]) > link_iou {
                union(&mut parent, i, j);
            }
        }
    }

    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }

    let mut clusters: Vec<Cluster> = groups
        .into_values()
        .map(|members| {
            let count = members.len() as f64;
            let mean = |f: fn(&BoundingBox) -> i32| {
                (members.iter().map(|&i| f(&candidates[i]) as f64).sum::<f64>() / count).round()
                    as i32
            };
            Cluster {
                bbox: BoundingBox::new(
                    mean(|b| b.x),
                    mean(|b| b.y),
                    mean(|b| b.width),
                    mean(|b| b.height),
                ),
                members: members.len(),
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.members
            .cmp(&a.members)
            .then(a.bbox.y.cmp(&b.bbox.y))
            .then(a.bbox.x.cmp(&b.bbox.x))
    });
    clusters
}
