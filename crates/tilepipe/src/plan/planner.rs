use super::descriptor::{KernelProfile, PartitionStrategy, WorkloadDescriptor};
use super::tiling::{LoopShape, TilingPlan};
use crate::align::{checked_ceil_align, checked_product, div_ceil, floor_align, unit_alignment};
use crate::error::{Result, TileError};

/// Computes [`TilingPlan`]s for one kernel's [`KernelProfile`].
///
/// Planning is a pure function: the same descriptor and profile always yield
/// the same plan, and nothing outside the returned value is touched.
///
/// # Example
///
/// ```
/// use tilepipe::{TilePlanner, WorkloadDescriptor};
///
/// let desc = WorkloadDescriptor::for_elements::<f32>(1000, 1)
///     .cores(8)
///     .scratchpad(8192);
/// let plan = TilePlanner::default().plan(&desc).unwrap();
/// assert_eq!(plan.used_core_count, 8);
/// assert_eq!(plan.units_per_core % 8, 0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TilePlanner {
    profile: KernelProfile,
}

impl TilePlanner {
    pub fn new(profile: KernelProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &KernelProfile {
        &self.profile
    }

    /// Plan `desc`.
    ///
    /// # Errors
    ///
    /// Planning errors only: zero cores, zero element size or stride, zero
    /// buffer multiplier, overflow, a reservation that swallows the whole
    /// scratchpad, or a scratchpad too small for one aligned tile.
    pub fn plan(&self, desc: &WorkloadDescriptor) -> Result<TilingPlan> {
        let profile = &self.profile;
        validate(desc, profile)?;

        let g = unit_alignment(desc.alignment_bytes, desc.element_size);
        let mut plan = TilingPlan {
            total_units: desc.total_units,
            unit_stride: desc.unit_stride,
            element_size: desc.element_size,
            core_count: desc.core_count,
            scratchpad_bytes: desc.scratchpad_bytes,
            reserved_bytes: profile.reserved_bytes,
            buffer_multiplier: profile.buffer_multiplier,
            unit_alignment: g,
            strategy: profile.strategy,
            used_core_count: 0,
            units_per_core: 0,
            remainder_cores: 0,
            tail_core_units: 0,
            tile_units_per_loop: 0,
            remainder_loop: LoopShape::default(),
            common_loop: LoopShape::default(),
            tail_loop: LoopShape::default(),
        };

        if desc.total_units == 0 {
            log::debug!("empty workload, all {} cores idle", desc.core_count);
            return Ok(plan);
        }

        let tile = tile_units(desc, profile, g)?;
        let split = partition(desc, profile, g)?;

        plan.used_core_count = split.used;
        plan.units_per_core = split.share;
        plan.remainder_cores = split.remainder_cores;
        plan.tail_core_units = split.tail;
        plan.tile_units_per_loop = tile;
        if split.remainder_cores > 0 {
            plan.remainder_loop = LoopShape::for_units(split.share + g, tile);
        }
        plan.common_loop = LoopShape::for_units(split.share, tile);
        plan.tail_loop = LoopShape::for_units(split.tail, tile);

        if plan.used_core_count < plan.core_count {
            log::debug!(
                "{} of {} cores idle for {} units",
                plan.idle_cores(),
                plan.core_count,
                plan.total_units
            );
        }
        log::debug!("planned {plan}");
        Ok(plan)
    }
}

/// Plan `desc` with `profile`.
pub fn plan(desc: &WorkloadDescriptor, profile: &KernelProfile) -> Result<TilingPlan> {
    TilePlanner::new(*profile).plan(desc)
}

fn validate(desc: &WorkloadDescriptor, profile: &KernelProfile) -> Result<()> {
    if desc.core_count == 0 {
        return Err(TileError::ZeroCoreCount);
    }
    if desc.element_size == 0 {
        return Err(TileError::InvalidDescriptor("element_size is zero".into()));
    }
    if desc.total_units == 0 {
        return Ok(());
    }
    if desc.unit_stride == 0 {
        return Err(TileError::InvalidDescriptor(format!(
            "unit_stride is zero for {} units",
            desc.total_units
        )));
    }
    if profile.buffer_multiplier == 0 {
        return Err(TileError::InvalidDescriptor("buffer_multiplier is zero".into()));
    }
    checked_product(
        "workload bytes",
        &[desc.total_units, desc.unit_stride, desc.element_size],
    )?;
    Ok(())
}

/// Largest aligned unit count whose buffers fit the scratchpad budget.
fn tile_units(desc: &WorkloadDescriptor, profile: &KernelProfile, g: usize) -> Result<usize> {
    let bytes_per_unit = checked_product(
        "bytes per unit",
        &[desc.unit_stride, desc.element_size, profile.buffer_multiplier],
    )?;
    let budget = desc.scratchpad_bytes.saturating_sub(profile.reserved_bytes);
    let tile = floor_align(budget / bytes_per_unit, g);
    if tile == 0 {
        return Err(TileError::DoesNotFitScratchpad {
            required: bytes_per_unit.saturating_mul(g),
            available: budget,
        });
    }
    Ok(tile)
}

struct Split {
    used: usize,
    share: usize,
    remainder_cores: usize,
    tail: usize,
}

fn partition(desc: &WorkloadDescriptor, profile: &KernelProfile, g: usize) -> Result<Split> {
    let total = desc.total_units;
    let cores = desc
        .core_count
        .min(div_ceil(total, profile.min_units_per_core.max(1)))
        .max(1);

    // Fewer units than cores and no minimum share in the way: one unit each.
    if total < desc.core_count && total <= cores {
        return Ok(Split {
            used: total,
            share: 1,
            remainder_cores: 0,
            tail: 1,
        });
    }

    match profile.strategy {
        PartitionStrategy::TailCore => {
            let share = checked_ceil_align(div_ceil(total, cores), g)?;
            let used = div_ceil(total, share);
            Ok(Split {
                used,
                share,
                remainder_cores: 0,
                tail: total - (used - 1) * share,
            })
        }
        PartitionStrategy::Balanced => {
            let aligned_total = checked_ceil_align(total, g)?;
            let groups = div_ceil(total, g);
            let used = cores.min(groups);
            let share = checked_product("balanced share", &[groups / used, g])?;
            let remainder_cores = groups % used;
            let shortfall = aligned_total - total;
            Ok(Split {
                used,
                share,
                remainder_cores,
                tail: share - shortfall,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    fn f32_desc(total: usize, cores: usize, scratch: usize) -> WorkloadDescriptor {
        WorkloadDescriptor::for_elements::<f32>(total, 1)
            .cores(cores)
            .scratchpad(scratch)
    }

    fn covered(plan: &TilingPlan) -> usize {
        (0..plan.core_count).map(|c| plan.core_units(c)).sum()
    }

    #[test]
    fn test_thousand_units_eight_cores() {
        let plan = TilePlanner::default().plan(&f32_desc(1000, 8, 8192)).unwrap();
        assert_eq!(plan.unit_alignment, 8);
        assert_eq!(plan.units_per_core, 128);
        assert_eq!(plan.used_core_count, 8);
        assert_eq!(plan.tail_core_units, 1000 - 7 * 128);
        assert_eq!(plan.tile_units_per_loop, 512);
        assert_eq!(plan.common_loop.loops, 1);
        assert_eq!(covered(&plan), 1000);
    }

    #[test]
    fn test_fewer_units_than_cores() {
        let plan = TilePlanner::default().plan(&f32_desc(3, 8, 8192)).unwrap();
        assert_eq!(plan.used_core_count, 3);
        assert_eq!(plan.idle_cores(), 5);
        for core in 0..3 {
            assert_eq!(plan.core_units(core), 1);
            assert_eq!(plan.core_offset(core), core);
        }
        for core in 3..8 {
            assert!(plan.assignment(core).unwrap().is_idle());
        }
    }

    #[test]
    fn test_empty_workload() {
        let plan = TilePlanner::default().plan(&f32_desc(0, 8, 8192)).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.used_core_count, 0);
        assert_eq!(covered(&plan), 0);
        assert!(plan.assignments().all(|a| a.is_idle() && a.tiles().count() == 0));
    }

    #[test]
    fn test_scratchpad_too_small() {
        // One aligned group of 8 units × 64 floats × 4 buffers = 8 KiB.
        let desc = WorkloadDescriptor::for_elements::<f32>(100, 64)
            .cores(4)
            .scratchpad(4096);
        let err = TilePlanner::default().plan(&desc).unwrap_err();
        assert_eq!(
            err,
            TileError::DoesNotFitScratchpad {
                required: 8192,
                available: 4096
            }
        );
        assert_eq!(err.class(), ErrorClass::Planning);
    }

    #[test]
    fn test_reserved_bytes_shrink_tile() {
        let profile = KernelProfile::default().reserve(4096);
        let plan = TilePlanner::new(profile)
            .plan(&f32_desc(1000, 8, 8192))
            .unwrap();
        assert_eq!(plan.tile_units_per_loop, 256);

        let profile = KernelProfile::default().reserve(8192);
        let err = TilePlanner::new(profile)
            .plan(&f32_desc(1000, 8, 8192))
            .unwrap_err();
        assert!(matches!(err, TileError::DoesNotFitScratchpad { available: 0, .. }));
    }

    #[test]
    fn test_zero_cores_fails() {
        let err = TilePlanner::default().plan(&f32_desc(10, 0, 8192)).unwrap_err();
        assert_eq!(err, TileError::ZeroCoreCount);
        let err = TilePlanner::default().plan(&f32_desc(0, 0, 8192)).unwrap_err();
        assert_eq!(err, TileError::ZeroCoreCount);
    }

    #[test]
    fn test_invalid_fields() {
        let desc = WorkloadDescriptor::new(10, 1, 0).cores(2).scratchpad(1024);
        assert!(matches!(
            TilePlanner::default().plan(&desc),
            Err(TileError::InvalidDescriptor(_))
        ));
        let desc = WorkloadDescriptor::new(10, 0, 4).cores(2).scratchpad(1024);
        assert!(matches!(
            TilePlanner::default().plan(&desc),
            Err(TileError::InvalidDescriptor(_))
        ));
        let profile = KernelProfile::default().buffers(0);
        assert!(matches!(
            TilePlanner::new(profile).plan(&f32_desc(10, 2, 1024)),
            Err(TileError::InvalidDescriptor(_))
        ));
        let desc = WorkloadDescriptor::new(usize::MAX, 4, 4).cores(2).scratchpad(1024);
        assert!(matches!(
            TilePlanner::default().plan(&desc),
            Err(TileError::Overflow(_))
        ));
    }

    #[test]
    fn test_zero_alignment_is_identity() {
        let desc = f32_desc(1000, 8, 8192).alignment(0);
        let plan = TilePlanner::default().plan(&desc).unwrap();
        assert_eq!(plan.unit_alignment, 1);
        assert_eq!(plan.units_per_core, 125);
        assert_eq!(plan.used_core_count, 8);
        assert_eq!(plan.tail_core_units, 125);
    }

    #[test]
    fn test_tail_core_absorbs_shortfall() {
        // ceil(100/8) = 13 → 16; ceil(100/16) = 7 cores; last gets 4.
        let plan = TilePlanner::default().plan(&f32_desc(100, 8, 8192)).unwrap();
        assert_eq!(plan.units_per_core, 16);
        assert_eq!(plan.used_core_count, 7);
        assert_eq!(plan.tail_core_units, 4);
        assert_eq!(plan.core_offset(6), 96);
        assert_eq!(covered(&plan), 100);
    }

    #[test]
    fn test_balanced_strategy() {
        let profile = KernelProfile::default().strategy(PartitionStrategy::Balanced);
        let plan = TilePlanner::new(profile)
            .plan(&f32_desc(100, 8, 8192))
            .unwrap();
        // 13 groups over 8 cores: 5 cores with 2 groups, 3 with 1.
        assert_eq!(plan.used_core_count, 8);
        assert_eq!(plan.units_per_core, 8);
        assert_eq!(plan.remainder_cores, 5);
        assert_eq!(plan.core_units(0), 16);
        assert_eq!(plan.core_units(5), 8);
        assert_eq!(plan.tail_core_units, 4);
        assert_eq!(plan.core_offset(5), 80);
        assert_eq!(plan.core_offset(7), 96);
        assert_eq!(covered(&plan), 100);
    }

    #[test]
    fn test_balanced_overflow_is_planning_failure() {
        let profile = KernelProfile::default().strategy(PartitionStrategy::Balanced);
        let desc = WorkloadDescriptor::new(usize::MAX, 1, 1).cores(1).scratchpad(1024);
        let err = TilePlanner::new(profile).plan(&desc).unwrap_err();
        assert!(matches!(err, TileError::Overflow(_)));
        assert_eq!(err.class(), ErrorClass::Planning);

        let desc = WorkloadDescriptor::new(usize::MAX - 64, 1, 1).cores(8).scratchpad(1024);
        let plan = TilePlanner::new(profile).plan(&desc).unwrap();
        assert_eq!(covered(&plan), usize::MAX - 64);
    }

    #[test]
    fn test_balanced_fewer_groups_than_cores() {
        let profile = KernelProfile::default().strategy(PartitionStrategy::Balanced);
        let plan = TilePlanner::new(profile).plan(&f32_desc(20, 8, 8192)).unwrap();
        assert_eq!(plan.used_core_count, 3);
        assert_eq!(plan.remainder_cores, 0);
        assert_eq!(plan.tail_core_units, 4);
        assert_eq!(covered(&plan), 20);
    }

    #[test]
    fn test_min_units_per_core_caps_cores() {
        let profile = KernelProfile::default().min_units_per_core(4096);
        let plan = TilePlanner::new(profile)
            .plan(&f32_desc(10_000, 8, 1 << 16))
            .unwrap();
        assert_eq!(plan.used_core_count, 3);
        assert_eq!(covered(&plan), 10_000);
    }

    #[test]
    fn test_multi_loop_shapes() {
        // 8192 / (4 floats × 4 B × 4 buffers) = 128 units per tile.
        let desc = WorkloadDescriptor::for_elements::<f32>(2000, 4)
            .cores(4)
            .scratchpad(8192);
        let plan = TilePlanner::default().plan(&desc).unwrap();
        assert_eq!(plan.tile_units_per_loop, 128);
        assert_eq!(plan.units_per_core, 504);
        assert_eq!(plan.common_loop, LoopShape { loops: 4, tail_units: 120 });
        assert_eq!(plan.tail_core_units, 2000 - 3 * 504);
        assert_eq!(plan.tail_loop, LoopShape { loops: 4, tail_units: 104 });
        plan.validate().unwrap();
    }

    #[test]
    fn test_deterministic() {
        let desc = f32_desc(12_345, 6, 16_384);
        let a = TilePlanner::default().plan(&desc).unwrap();
        let b = plan(&desc, &KernelProfile::default()).unwrap();
        assert_eq!(a, b);
    }
}
