/// Source of randomness for combat rolls. The world owns one; tests swap in a script.
pub trait Roll: Send {
    fn next_u64(&mut self) -> u64;

    fn roll_range(&mut self, lo: i32, hi_inclusive: i32) -> i32 {
        if hi_inclusive <= lo {
            return lo;
        }
        let span = (hi_inclusive - lo + 1) as u64;
        let v = (self.next_u64() % span) as i32;
        lo + v
    }

    /// True with probability `pct`/100.
    fn chance(&mut self, pct: u32) -> bool {
        self.roll_range(1, 100) <= pct.min(100) as i32
    }
}

#[derive(Debug, Clone)]
pub struct Rng64 {
    state: u64,
}

impl Rng64 {
    pub fn from_seed(seed: u64) -> Self {
        let mut s = seed;
        if s == 0 {
            s = 0x9e3779b97f4a7c15;
        }
        Self { state: s }
    }
}

impl Roll for Rng64 {
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }
}

/// Replays queued roll results, clamped into the requested range. Once the queue is empty
/// every roll returns the low end, which means "hit" for `chance` and minimum damage.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ScriptedRoll {
    queue: std::collections::VecDeque<i32>,
}

#[cfg(test)]
impl ScriptedRoll {
    pub(crate) fn new(values: &[i32]) -> Self {
        Self {
            queue: values.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
impl Roll for ScriptedRoll {
    fn next_u64(&mut self) -> u64 {
        0
    }

    fn roll_range(&mut self, lo: i32, hi_inclusive: i32) -> i32 {
        match self.queue.pop_front() {
            Some(v) => v.clamp(lo, hi_inclusive.max(lo)),
            None => lo,
        }
    }
}
