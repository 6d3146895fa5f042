//! Host-side simulated core array for tilepipe plans.
//!
//! A [`SimDevice`] stands in for an accelerator with `core_count` cores, each
//! owning a private scratchpad. Launches follow the device flow end to end:
//! plan once on the host, publish the plan as a byte block, and let every core
//! decode the block and stream its share through the tile pipeline.
//!
//! # Quick Start
//!
//! ```
//! use tilepipe_sim::{scatter_reduce, ScatterSum};
//!
//! // (slot, value) pairs
//! let data = vec![0i64, 5, 1, 7, 0, -2];
//! let sums = scatter_reduce(&ScatterSum::new(2), &data).unwrap();
//! assert_eq!(sums, vec![3, 7]);
//! ```
//!
//! # Explicit Device
//!
//! ```
//! use tilepipe_sim::{GlobalBuffer, PlatformInfo, Scale, SimDevice};
//!
//! let dev = SimDevice::new(PlatformInfo::new(8, 8192));
//! let input = GlobalBuffer::from_host(&[1.0f32, 2.0, 3.0, 4.0], 2).unwrap();
//! let mut output = GlobalBuffer::alloc(2, 2).unwrap();
//!
//! let report = dev.launch(&Scale::new(0.5f32, 2), &input, &mut output).unwrap();
//! assert_eq!(report.plan.used_core_count, 2);
//! assert_eq!(output.to_host(), vec![0.5, 1.0, 1.5, 2.0]);
//! ```
//!
//! The convenience functions share a lazily-initialized global device
//! modelled on the host machine.

mod context;
mod error;
mod kernels;
mod memory;

use once_cell::sync::OnceCell;
use tilepipe::exec::TileKernel;

pub use context::{PlatformInfo, SimConfig, SimDevice, FALLBACK_SCRATCHPAD_BYTES};
pub use error::{Result, SimError};
pub use kernels::{Reduction, Scale, ScatterMax, ScatterMin, ScatterSum, SlotKey};
pub use memory::{AtomicOutput, GlobalBuffer};

/// Global host device for convenience functions.
static GLOBAL_DEVICE: OnceCell<SimDevice> = OnceCell::new();

/// Get or initialize the global host device.
pub fn get_global_device() -> &'static SimDevice {
    GLOBAL_DEVICE.get_or_init(SimDevice::host)
}

/// One-shot scale of `data`, viewed as units of `stride` scalars.
pub fn scale<T>(data: &[T], factor: T, stride: usize) -> Result<Vec<T>>
where
    T: tilepipe::Element,
    Scale<T>: TileKernel<In = T, Out = T>,
{
    let input = GlobalBuffer::from_host(data, stride)?;
    let mut output = GlobalBuffer::alloc(input.units(), stride)?;
    get_global_device().launch(&Scale::new(factor, stride), &input, &mut output)?;
    Ok(output.into_host())
}

/// One-shot many-to-one reduction of `data` with `kernel`.
pub fn scatter_reduce<K: Reduction>(kernel: &K, data: &[K::In]) -> Result<Vec<K::Out>> {
    let input = GlobalBuffer::from_host(data, kernel.unit_stride())?;
    get_global_device().reduce(kernel, &input)
}
