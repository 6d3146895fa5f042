use crate::error::{Result, TileError};
use std::collections::HashMap;
use std::fmt;

/// Pipeline stage of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    CopyIn,
    Compute,
    CopyOut,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CopyIn => "copy-in",
            Stage::Compute => "compute",
            Stage::CopyOut => "copy-out",
        };
        f.write_str(name)
    }
}

/// One stage issued by an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageEvent {
    /// Pipeline step that issued the stage.
    pub step: usize,
    pub stage: Stage,
    pub tile: usize,
    pub first_unit: usize,
    pub units: usize,
    /// Buffer instance acquired or released: the input instance for
    /// CopyIn, the output instance for Compute and CopyOut.
    pub buffer: usize,
}

/// Ordered record of the stages one executor issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineTrace {
    events: Vec<StageEvent>,
}

impl PipelineTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[StageEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Position of `stage` for `tile` in issue order.
    pub fn position(&self, stage: Stage, tile: usize) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.stage == stage && e.tile == tile)
    }

    /// Check the within-core ordering: every tile goes CopyIn, Compute,
    /// CopyOut in that order, and no buffer instance is handed to a new tile
    /// before the stage that releases it ran for the previous one.
    pub fn check_fences(&self) -> Result<()> {
        let fail = |queue: &'static str, detail: String| {
            Err(TileError::FenceViolation { queue, detail })
        };

        let mut tiles: Vec<usize> = self.events.iter().map(|e| e.tile).collect();
        tiles.sort_unstable();
        tiles.dedup();
        for &tile in &tiles {
            let copy_in = self.position(Stage::CopyIn, tile);
            let compute = self.position(Stage::Compute, tile);
            let copy_out = self.position(Stage::CopyOut, tile);
            match (copy_in, compute, copy_out) {
                (Some(a), Some(b), Some(c)) if a < b && b < c => {}
                _ => {
                    return fail(
                        "pipeline",
                        format!("tile {tile} stages out of order: {copy_in:?} {compute:?} {copy_out:?}"),
                    )
                }
            }
        }

        // Last tile seen on each instance: input instances are released by
        // Compute, output instances by CopyOut.
        let mut input_owner: HashMap<usize, usize> = HashMap::new();
        let mut output_owner: HashMap<usize, usize> = HashMap::new();
        for (pos, e) in self.events.iter().enumerate() {
            let (owners, releaser, queue) = match e.stage {
                Stage::CopyIn => (&mut input_owner, Stage::Compute, "input"),
                Stage::Compute => (&mut output_owner, Stage::CopyOut, "output"),
                Stage::CopyOut => continue,
            };
            if let Some(prev) = owners.insert(e.buffer, e.tile) {
                let released = self.position(releaser, prev).map_or(false, |p| p < pos);
                if !released {
                    return fail(
                        queue,
                        format!(
                            "instance {} reused by tile {} before {releaser} of tile {prev}",
                            e.buffer, e.tile
                        ),
                    );
                }
            }
        }
        Ok(())
    }
}
