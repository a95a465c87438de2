//! Display order of pretty names.
//!
//! Names are bucketed level by level: the first level splits them by the
//! first label each name contains (`Infinite` before `Real`), the next
//! level splits every resulting group again (by family), and so on. Each
//! final bucket is sorted alphabetically and the buckets are concatenated.

use crate::OrderError;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What happens to a name that contains none of a level's labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmatchedPolicy {
    /// Keep it in an extra bucket after all labeled buckets of that level.
    #[default]
    SortLast,
    /// Fail with [`OrderError::UnmatchedLabel`].
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderLevels {
    /// Labels per level, coarsest first.
    pub levels: Vec<Vec<String>>,
    pub unmatched: UnmatchedPolicy,
}

impl Default for OrderLevels {
    fn default() -> Self {
        let labels = |labels: &[&str]| labels.iter().map(|l| l.to_string()).collect();
        OrderLevels {
            levels: vec![
                labels(&["Infinite", "Real"]),
                labels(&["DFCM HashOnHash", "DFCM GradeK", "SVM"]),
            ],
            unmatched: UnmatchedPolicy::SortLast,
        }
    }
}

impl OrderLevels {
    pub fn new(levels: Vec<Vec<String>>, unmatched: UnmatchedPolicy) -> OrderLevels {
        OrderLevels { levels, unmatched }
    }
}

fn partition(
    groups: Vec<Vec<String>>,
    levels: &[Vec<String>],
    unmatched: UnmatchedPolicy,
) -> Result<Vec<Vec<String>>, OrderError> {
    let Some((labels, coarser)) = levels.split_last() else {
        return Ok(groups);
    };
    let groups = partition(groups, coarser, unmatched)?;

    let mut res = vec![];
    for group in groups {
        let mut buckets = vec![vec![]; labels.len() + 1];
        for name in group {
            match labels.iter().position(|label| name.contains(label.as_str())) {
                Some(i) => buckets[i].push(name),
                None => match unmatched {
                    UnmatchedPolicy::SortLast => {
                        warn!("{name:?} matches none of {labels:?}, sorting it last");
                        buckets[labels.len()].push(name)
                    }
                    UnmatchedPolicy::Reject => {
                        return Err(OrderError::UnmatchedLabel {
                            name,
                            labels: labels.clone(),
                        });
                    }
                },
            }
        }
        for mut bucket in buckets {
            bucket.sort();
            res.push(bucket);
        }
    }
    Ok(res)
}

/// Names in display order. Duplicates are dropped.
pub fn order_names<S: AsRef<str>>(
    names: &[S],
    order: &OrderLevels,
) -> Result<Vec<String>, OrderError> {
    let mut group: Vec<String> = names.iter().map(|n| n.as_ref().to_string()).collect();
    group.sort();
    group.dedup();

    let groups = partition(vec![group], &order.levels, order.unmatched)?;
    Ok(groups.into_iter().flatten().collect())
}

/// Position of every name in display order, for use as a sort key.
pub fn rank_names<S: AsRef<str>>(
    names: &[S],
    order: &OrderLevels,
) -> Result<HashMap<String, usize>, OrderError> {
    Ok(order_names(names, order)?
        .into_iter()
        .enumerate()
        .map(|(rank, name)| (name, rank))
        .collect())
}
