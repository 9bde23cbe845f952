use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Deserialize;

use crate::CoreError;

/// Ranking of source codes. Position 0 is the most trusted source; codes not
/// in the table rank below every listed code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct PriorityTable {
    order: Vec<String>,
    ranks: HashMap<String, usize>,
}

impl PriorityTable {
    pub fn new(order: Vec<String>) -> Result<Self, CoreError> {
        let mut ranks = HashMap::with_capacity(order.len());
        for (rank, code) in order.iter().enumerate() {
            if code.trim().is_empty() {
                return Err(CoreError::InvalidPriorityTable(format!(
                    "empty source code at position {rank}"
                )));
            }
            if ranks.insert(code.clone(), rank).is_some() {
                return Err(CoreError::InvalidPriorityTable(format!(
                    "source code {code:?} listed more than once"
                )));
            }
        }
        Ok(Self { order, ranks })
    }

    /// Rank of `code`; lower is more trusted. Unknown codes get `len()`.
    pub fn rank(&self, code: &str) -> usize {
        self.ranks.get(code).copied().unwrap_or(self.order.len())
    }

    /// Rank of an optional code; a missing origin ranks like an unknown one.
    pub fn rank_of(&self, code: Option<&str>) -> usize {
        code.map_or(self.order.len(), |c| self.rank(c))
    }

    /// `Less` when `a` is more trusted than `b`.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }

    pub fn lowest_rank(&self) -> usize {
        self.order.len()
    }

    pub fn codes(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl TryFrom<Vec<String>> for PriorityTable {
    type Error = CoreError;

    fn try_from(order: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(order)
    }
}
