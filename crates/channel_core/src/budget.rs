/// Remaining channel resolutions allowed in the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    limit: u32,
    remaining: u32,
}

impl RateBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    /// Charges one action. Returns `false` once the budget is spent.
    pub fn try_spend(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn spent(&self) -> u32 {
        self.limit - self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Size of the next level batch: remaining budget capped at `ceiling`.
    pub fn batch_size(&self, ceiling: usize) -> usize {
        (self.remaining as usize).min(ceiling)
    }
}
