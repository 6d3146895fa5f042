use super::kernel::{slot_layout, InputTile, OutputTile, TileKernel};
use super::queue::PipelineSlot;
use super::scratchpad::Scratchpad;
use super::sink::TileSink;
use super::trace::{PipelineTrace, Stage, StageEvent};
use crate::error::{Result, TileError};
use crate::plan::{CoreAssignment, TileSpan, TilingPlan};
use crate::types::Element;

/// What one executor did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoreReport {
    pub core: usize,
    pub units: usize,
    pub tiles: usize,
    /// Scratchpad high-water mark in bytes.
    pub scratchpad_peak: usize,
}

impl CoreReport {
    pub fn is_idle(&self) -> bool {
        self.units == 0
    }
}

/// Runs one core's share of a plan through the copy-in, compute, copy-out
/// pipeline.
///
/// The pipeline is two deep: at step `s` the executor drains tile `s - 2`,
/// loads tile `s` and computes tile `s - 1`, so the transfer of one tile is
/// in flight while its predecessor is computed.
#[derive(Debug, Clone, Copy)]
pub struct TileExecutor {
    plan: TilingPlan,
    assignment: CoreAssignment,
}

impl TileExecutor {
    /// Executor for `core`. Fails for cores the plan does not know.
    pub fn new(plan: &TilingPlan, core: usize) -> Result<Self> {
        Ok(Self {
            plan: *plan,
            assignment: plan.assignment(core)?,
        })
    }

    pub fn core(&self) -> usize {
        self.assignment.core
    }

    pub fn assignment(&self) -> &CoreAssignment {
        &self.assignment
    }

    /// Process this core's units of `input` into `sink`.
    pub fn run<K, S>(&self, kernel: &K, input: &[K::In], sink: &mut S) -> Result<CoreReport>
    where
        K: TileKernel,
        S: TileSink<K::Out> + ?Sized,
    {
        self.execute(kernel, input, sink, None)
    }

    /// Like [`TileExecutor::run`], recording every stage into `trace`.
    pub fn run_traced<K, S>(
        &self,
        kernel: &K,
        input: &[K::In],
        sink: &mut S,
        trace: &mut PipelineTrace,
    ) -> Result<CoreReport>
    where
        K: TileKernel,
        S: TileSink<K::Out> + ?Sized,
    {
        self.execute(kernel, input, sink, Some(trace))
    }

    fn execute<K, S>(
        &self,
        kernel: &K,
        input: &[K::In],
        sink: &mut S,
        mut trace: Option<&mut PipelineTrace>,
    ) -> Result<CoreReport>
    where
        K: TileKernel,
        S: TileSink<K::Out> + ?Sized,
    {
        let a = &self.assignment;
        if a.is_idle() {
            log::trace!("core {} idle", a.core);
            return Ok(CoreReport {
                core: a.core,
                ..CoreReport::default()
            });
        }
        self.check_kernel(kernel, input)?;

        let mut pad = Scratchpad::new(self.plan.budget_bytes());
        let mut slot =
            PipelineSlot::<K::In, K::Out>::new(slot_layout(&self.plan, kernel), &mut pad)?;

        let loops = a.shape.loops;
        for step in 0..loops + 2 {
            if step >= 2 {
                self.copy_out(step, step - 2, &mut slot, kernel, sink, trace.as_deref_mut())?;
            }
            if step < loops {
                self.copy_in(step, step, &mut slot, kernel, input, trace.as_deref_mut())?;
            }
            if (1..=loops).contains(&step) {
                self.compute(step, step - 1, &mut slot, kernel, trace.as_deref_mut())?;
            }
        }

        let report = CoreReport {
            core: a.core,
            units: a.units,
            tiles: loops,
            scratchpad_peak: pad.peak(),
        };
        slot.release(&mut pad);
        log::trace!(
            "core {} done: {} units in {} tiles",
            report.core,
            report.units,
            report.tiles
        );
        Ok(report)
    }

    fn check_kernel<K: TileKernel>(&self, kernel: &K, input: &[K::In]) -> Result<()> {
        let stride = kernel.unit_stride();
        if stride != self.plan.unit_stride || K::In::size() != self.plan.element_size {
            return Err(TileError::MalformedPlan(format!(
                "plan is for {} scalars of {} bytes per unit, kernel reads {} of {}",
                self.plan.unit_stride,
                self.plan.element_size,
                stride,
                K::In::size()
            )));
        }
        let required = self.assignment.end_unit().saturating_mul(stride);
        if input.len() < required {
            return Err(TileError::RegionTooSmall {
                region: "input",
                required,
                actual: input.len(),
            });
        }
        Ok(())
    }

    fn tile(&self, index: usize) -> Result<TileSpan> {
        self.assignment.tile(index).ok_or_else(|| {
            TileError::MalformedPlan(format!(
                "core {} has no tile {index}",
                self.assignment.core
            ))
        })
    }

    fn copy_in<K: TileKernel>(
        &self,
        step: usize,
        index: usize,
        slot: &mut PipelineSlot<K::In, K::Out>,
        kernel: &K,
        input: &[K::In],
        trace: Option<&mut PipelineTrace>,
    ) -> Result<()> {
        let span = self.tile(index)?;
        let stride = kernel.unit_stride();
        let start = span.first_unit * stride;
        let n = span.units * stride;
        let src = input
            .get(start..start + n)
            .ok_or(TileError::RegionTooSmall {
                region: "input",
                required: start + n,
                actual: input.len(),
            })?;

        let id = slot.input.alloc()?;
        let buf = slot.input.buffer_mut(id)?;
        if n > buf.len() {
            return Err(TileError::MalformedPlan(format!(
                "tile {index} of {} units exceeds the {}-unit buffer",
                span.units, self.plan.tile_units_per_loop
            )));
        }
        buf[..n].copy_from_slice(src);
        buf[n..].fill(<K::In as Element>::ZERO);
        slot.input.enque(id, span.units)?;

        log::trace!(
            "core {} step {step}: copy-in tile {index} ({} units) -> input[{}]",
            self.assignment.core,
            span.units,
            id.index()
        );
        if let Some(t) = trace {
            t.record(StageEvent {
                step,
                stage: Stage::CopyIn,
                tile: index,
                first_unit: span.first_unit,
                units: span.units,
                buffer: id.index(),
            });
        }
        Ok(())
    }

    fn compute<K: TileKernel>(
        &self,
        step: usize,
        index: usize,
        slot: &mut PipelineSlot<K::In, K::Out>,
        kernel: &K,
        trace: Option<&mut PipelineTrace>,
    ) -> Result<()> {
        let span = self.tile(index)?;
        let in_id = slot.input.deque()?;
        let units = slot.input.units(in_id);
        let out_id = slot.output.alloc()?;
        {
            let src = slot.input.buffer(in_id)?;
            let dst = slot.output.buffer_mut(out_id)?;
            dst.values.fill(<K::Out as Element>::ZERO);
            dst.routes.fill(None);
            let tile = InputTile::new(src, units, kernel.unit_stride(), span.first_unit);
            let mut out = OutputTile::new(
                &mut dst.values,
                &mut dst.routes,
                units,
                kernel.output_stride(),
            );
            kernel.compute(&tile, &mut out);
        }
        slot.input.free(in_id)?;
        slot.output.enque(out_id, units)?;

        log::trace!(
            "core {} step {step}: compute tile {index} input[{}] -> output[{}]",
            self.assignment.core,
            in_id.index(),
            out_id.index()
        );
        if let Some(t) = trace {
            t.record(StageEvent {
                step,
                stage: Stage::Compute,
                tile: index,
                first_unit: span.first_unit,
                units,
                buffer: out_id.index(),
            });
        }
        Ok(())
    }

    fn copy_out<K, S>(
        &self,
        step: usize,
        index: usize,
        slot: &mut PipelineSlot<K::In, K::Out>,
        kernel: &K,
        sink: &mut S,
        trace: Option<&mut PipelineTrace>,
    ) -> Result<()>
    where
        K: TileKernel,
        S: TileSink<K::Out> + ?Sized,
    {
        let span = self.tile(index)?;
        let id = slot.output.deque()?;
        let units = slot.output.units(id);
        {
            let buf = slot.output.buffer(id)?;
            let stride = kernel.output_stride();
            for u in 0..units {
                let target = if kernel.routes_output() {
                    match buf.routes[u] {
                        Some(s) => s,
                        None => continue,
                    }
                } else {
                    span.first_unit + u
                };
                sink.emit(target, &buf.values[u * stride..(u + 1) * stride])?;
            }
        }
        slot.output.free(id)?;

        log::trace!(
            "core {} step {step}: copy-out tile {index} ({units} units) from output[{}]",
            self.assignment.core,
            id.index()
        );
        if let Some(t) = trace {
            t.record(StageEvent {
                step,
                stage: Stage::CopyOut,
                tile: index,
                first_unit: span.first_unit,
                units,
                buffer: id.index(),
            });
        }
        Ok(())
    }
}
