use super::descriptor::PartitionStrategy;
use crate::align::div_ceil;
use crate::error::{Result, TileError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Loop count and final-iteration size for one per-core share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LoopShape {
    /// Pipeline iterations.
    pub loops: usize,
    /// Units moved by the final iteration (0 when `loops == 0`).
    pub tail_units: usize,
}

impl LoopShape {
    /// Split `units` into tiles of `tile_units`.
    pub fn for_units(units: usize, tile_units: usize) -> Self {
        if units == 0 || tile_units == 0 {
            return Self::default();
        }
        let loops = div_ceil(units, tile_units);
        Self {
            loops,
            tail_units: units - (loops - 1) * tile_units,
        }
    }

    /// Units covered by this shape for a given tile size.
    pub fn units(&self, tile_units: usize) -> usize {
        if self.loops == 0 {
            0
        } else {
            (self.loops - 1) * tile_units + self.tail_units
        }
    }
}

/// The partition computed once per invocation and read by every core.
///
/// A core's share is
/// - `units_per_core + unit_alignment` for the first `remainder_cores` cores,
/// - `tail_core_units` for core `used_core_count - 1`,
/// - `units_per_core` for every other used core,
/// - zero for cores at or beyond `used_core_count`.
///
/// Shares are laid out back to back in core order, so a core's first unit is
/// the sum of the shares before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilingPlan {
    pub total_units: usize,
    pub unit_stride: usize,
    pub element_size: usize,
    pub core_count: usize,
    pub scratchpad_bytes: usize,
    pub reserved_bytes: usize,
    pub buffer_multiplier: usize,
    /// Alignment granularity in units.
    pub unit_alignment: usize,
    pub strategy: PartitionStrategy,

    pub used_core_count: usize,
    pub units_per_core: usize,
    pub remainder_cores: usize,
    pub tail_core_units: usize,
    pub tile_units_per_loop: usize,

    /// Loop shape of a remainder core's share.
    pub remainder_loop: LoopShape,
    /// Loop shape of a common core's share.
    pub common_loop: LoopShape,
    /// Loop shape of the tail core's share.
    pub tail_loop: LoopShape,
}

impl TilingPlan {
    /// Nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.used_core_count == 0
    }

    /// Cores that early-return.
    pub fn idle_cores(&self) -> usize {
        self.core_count - self.used_core_count
    }

    /// Units assigned to `core`; zero for idle or out-of-range cores.
    pub fn core_units(&self, core: usize) -> usize {
        if core >= self.used_core_count {
            0
        } else if core + 1 == self.used_core_count {
            self.tail_core_units
        } else if core < self.remainder_cores {
            self.units_per_core.saturating_add(self.unit_alignment)
        } else {
            self.units_per_core
        }
    }

    /// First unit of `core`'s share.
    pub fn core_offset(&self, core: usize) -> usize {
        let core = core.min(self.used_core_count);
        let big = core.min(self.remainder_cores);
        let big_share = self.units_per_core.saturating_add(self.unit_alignment);
        big.saturating_mul(big_share)
            .saturating_add((core - big).saturating_mul(self.units_per_core))
    }

    fn core_loop(&self, core: usize) -> LoopShape {
        if core >= self.used_core_count {
            LoopShape::default()
        } else if core + 1 == self.used_core_count {
            self.tail_loop
        } else if core < self.remainder_cores {
            self.remainder_loop
        } else {
            self.common_loop
        }
    }

    /// The slice of the plan `core` executes.
    ///
    /// Cores in `used_core_count..core_count` get an idle assignment; cores
    /// at or beyond `core_count` are a configuration error.
    pub fn assignment(&self, core: usize) -> Result<CoreAssignment> {
        if core >= self.core_count {
            return Err(TileError::CoreIndexOutOfRange {
                core,
                core_count: self.core_count,
            });
        }
        Ok(CoreAssignment {
            core,
            first_unit: self.core_offset(core),
            units: self.core_units(core),
            shape: self.core_loop(core),
            tile_units: self.tile_units_per_loop,
        })
    }

    /// Assignments of every core, idle ones included, in core order.
    pub fn assignments(&self) -> impl Iterator<Item = CoreAssignment> + '_ {
        (0..self.core_count).map(move |core| CoreAssignment {
            core,
            first_unit: self.core_offset(core),
            units: self.core_units(core),
            shape: self.core_loop(core),
            tile_units: self.tile_units_per_loop,
        })
    }

    /// Bytes of one tile in one buffer instance.
    pub fn tile_bytes(&self) -> usize {
        self.tile_units_per_loop
            .saturating_mul(self.unit_stride)
            .saturating_mul(self.element_size)
    }

    /// Scratchpad bytes the plan budgets for tile buffers.
    pub fn budget_bytes(&self) -> usize {
        self.scratchpad_bytes.saturating_sub(self.reserved_bytes)
    }

    /// Check the coverage, fit and layout invariants.
    ///
    /// Plans from the planner always pass; this guards plans that arrived
    /// over the serialization channel.
    pub fn validate(&self) -> Result<()> {
        let malformed = |msg: String| Err(TileError::MalformedPlan(msg));

        if self.core_count == 0 {
            return malformed("zero core count".into());
        }
        if self.used_core_count > self.core_count {
            return malformed(format!(
                "{} used cores exceed {} cores",
                self.used_core_count, self.core_count
            ));
        }
        if self.unit_alignment == 0 {
            return malformed("zero unit alignment".into());
        }
        if self.used_core_count == 0 {
            if self.total_units != 0 {
                return malformed(format!("{} units but no used cores", self.total_units));
            }
            return Ok(());
        }
        if self.remainder_cores >= self.used_core_count {
            return malformed(format!(
                "{} remainder cores with {} used cores",
                self.remainder_cores, self.used_core_count
            ));
        }
        if self.tile_units_per_loop == 0 || self.tail_core_units == 0 {
            return malformed("used cores with empty tiles".into());
        }

        // Only shares some core actually receives are bounded by the total.
        let big_share = self.units_per_core.checked_add(self.unit_alignment);
        let oversized = big_share.is_none()
            || self.tail_core_units > self.total_units
            || (self.used_core_count > 1 && self.units_per_core > self.total_units)
            || (self.remainder_cores > 0 && big_share.map_or(true, |b| b > self.total_units));
        if oversized {
            return malformed(format!(
                "shares of {}+{} and tail of {} exceed {} units",
                self.units_per_core, self.unit_alignment, self.tail_core_units, self.total_units
            ));
        }

        let covered = (0..self.used_core_count)
            .try_fold(0usize, |acc, core| acc.checked_add(self.core_units(core)));
        if covered != Some(self.total_units) {
            return malformed(format!(
                "shares cover {:?} units, expected {}",
                covered, self.total_units
            ));
        }

        let fits = self
            .tile_bytes()
            .checked_mul(self.buffer_multiplier)
            .map_or(false, |b| b <= self.budget_bytes());
        if !fits {
            return malformed(format!(
                "{} tile bytes x{} exceed budget of {}",
                self.tile_bytes(),
                self.buffer_multiplier,
                self.budget_bytes()
            ));
        }

        for core in [0, self.remainder_cores, self.used_core_count - 1] {
            let shape = self.core_loop(core);
            if shape != LoopShape::for_units(self.core_units(core), self.tile_units_per_loop) {
                return malformed(format!("loop shape of core {core} does not match its share"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for TilingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TilingPlan(units={} cores={}/{} share={} remainder={} tail={} tile={} loops={}/{}/{})",
            self.total_units,
            self.used_core_count,
            self.core_count,
            self.units_per_core,
            self.remainder_cores,
            self.tail_core_units,
            self.tile_units_per_loop,
            self.remainder_loop.loops,
            self.common_loop.loops,
            self.tail_loop.loops,
        )
    }
}

/// One core's slice of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreAssignment {
    pub core: usize,
    /// Running-offset origin in units.
    pub first_unit: usize,
    pub units: usize,
    pub shape: LoopShape,
    pub tile_units: usize,
}

impl CoreAssignment {
    /// This core has nothing to do.
    pub fn is_idle(&self) -> bool {
        self.units == 0
    }

    /// One past the last unit of this share.
    pub fn end_unit(&self) -> usize {
        self.first_unit + self.units
    }

    /// Tile `index` of this core, if the share has that many.
    pub fn tile(&self, index: usize) -> Option<TileSpan> {
        if index >= self.shape.loops {
            return None;
        }
        let is_last = index + 1 == self.shape.loops;
        Some(TileSpan {
            index,
            first_unit: self.first_unit + index * self.tile_units,
            units: if is_last {
                self.shape.tail_units
            } else {
                self.tile_units
            },
            is_last,
        })
    }

    /// Iterate over this core's tiles.
    pub fn tiles(&self) -> TileIter {
        TileIter {
            next_unit: self.first_unit,
            index: 0,
            shape: self.shape,
            tile_units: self.tile_units,
        }
    }
}

/// One pipeline iteration's worth of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpan {
    /// Iteration index within the core.
    pub index: usize,
    pub first_unit: usize,
    pub units: usize,
    /// Final iteration of this core.
    pub is_last: bool,
}

/// Iterator over the tiles of one core's share.
#[derive(Debug, Clone)]
pub struct TileIter {
    next_unit: usize,
    index: usize,
    shape: LoopShape,
    tile_units: usize,
}

impl Iterator for TileIter {
    type Item = TileSpan;

    fn next(&mut self) -> Option<TileSpan> {
        if self.index >= self.shape.loops {
            return None;
        }
        let is_last = self.index + 1 == self.shape.loops;
        let units = if is_last {
            self.shape.tail_units
        } else {
            self.tile_units
        };
        let span = TileSpan {
            index: self.index,
            first_unit: self.next_unit,
            units,
            is_last,
        };
        self.next_unit += units;
        self.index += 1;
        Some(span)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.shape.loops - self.index.min(self.shape.loops);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_shape() {
        assert_eq!(
            LoopShape::for_units(100, 32),
            LoopShape {
                loops: 4,
                tail_units: 4
            }
        );
        assert_eq!(
            LoopShape::for_units(64, 32),
            LoopShape {
                loops: 2,
                tail_units: 32
            }
        );
        assert_eq!(LoopShape::for_units(0, 32), LoopShape::default());
        assert_eq!(LoopShape::for_units(5, 0), LoopShape::default());
        assert_eq!(LoopShape::for_units(100, 32).units(32), 100);
    }

    #[test]
    fn test_tile_iter() {
        let a = CoreAssignment {
            core: 1,
            first_unit: 40,
            units: 70,
            shape: LoopShape::for_units(70, 32),
            tile_units: 32,
        };
        let tiles: Vec<_> = a.tiles().collect();
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0].first_unit, 40);
        assert_eq!(tiles[1].first_unit, 72);
        assert_eq!(tiles[2].first_unit, 104);
        assert_eq!(tiles[2].units, 6);
        assert!(tiles[2].is_last);
        assert!(!tiles[0].is_last);
        assert_eq!(tiles[2].first_unit + tiles[2].units, a.end_unit());
        assert_eq!(a.tiles().len(), 3);
        assert_eq!(a.tile(1), Some(tiles[1]));
        assert_eq!(a.tile(2), Some(tiles[2]));
        assert_eq!(a.tile(3), None);
    }

    #[test]
    fn test_idle_assignment_has_no_tiles() {
        let a = CoreAssignment {
            core: 7,
            first_unit: 3,
            units: 0,
            shape: LoopShape::default(),
            tile_units: 8,
        };
        assert!(a.is_idle());
        assert_eq!(a.tiles().count(), 0);
    }
}
