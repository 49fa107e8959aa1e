/// Number of chunk operations a sender may keep in flight, hill-climbing
/// against the channel's buffered byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveWindow {
    current: usize,
    min: usize,
    max: usize,
}

impl AdaptiveWindow {
    pub fn new(initial: usize, min: usize, max: usize) -> Self {
        let min = min.max(1);
        let max = max.max(min);
        Self {
            current: initial.clamp(min, max),
            min,
            max,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Grows by one while the buffer is under a quarter of `high_water_mark`,
    /// shrinks by one once it passes half of it.
    pub fn adapt(&mut self, buffered: usize, high_water_mark: usize) -> usize {
        if buffered < high_water_mark / 4 && self.current < self.max {
            self.current += 1;
        } else if buffered > high_water_mark / 2 && self.current > self.min {
            self.current -= 1;
        }
        self.current
    }
}
