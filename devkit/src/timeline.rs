/*!
Chronologies synthétiques de timestamps (epoch secondes)

```
use palju_devkit::Timeline;

let stamps = Timeline::new(0).run(51, 100).gap(7 * 3600).run(51, 100).build();
assert_eq!(stamps.len(), 102);
assert_eq!(stamps[51], 5_000 + 7 * 3600);
```
*/

/// `count` points espacés de `step` secondes à partir de `start`
pub fn evenly_spaced(start: i64, step: i64, count: usize) -> Vec<i64> {
    (0..count as i64).map(|i| start + i * step).collect()
}

/// Suite croissante construite par séries régulières séparées de trous
#[derive(Debug, Clone)]
pub struct Timeline {
    next: i64,
    stamps: Vec<i64>,
}

impl Timeline {
    pub fn new(start: i64) -> Self {
        Self { next: start, stamps: Vec::new() }
    }

    /// Ajoute `count` points espacés de `step`
    pub fn run(mut self, count: usize, step: i64) -> Self {
        let points = evenly_spaced(self.next, step, count);
        if let Some(last) = points.last() {
            self.next = last + step;
        }
        self.stamps.extend(points);
        self
    }

    /// Le prochain point tombera `secs` après le dernier
    pub fn gap(mut self, secs: i64) -> Self {
        self.next = match self.stamps.last() {
            Some(last) => last + secs,
            None => self.next + secs,
        };
        self
    }

    pub fn build(self) -> Vec<i64> {
        self.stamps
    }
}
