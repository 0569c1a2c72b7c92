/// Scene-to-backend boundary and live-stage list.
pub mod bridge;
/// Pixel operators and filters on premultiplied RGBA8.
pub mod composite;
pub(crate) mod display_list;
/// Per-frame timing records and sinks.
pub mod metrics;
/// Backend render nodes and their handle table.
pub mod registry;
/// Presentation targets for finished stage surfaces.
pub mod screen;
/// Per-stage frame driver and time sources.
pub mod stage_loop;
/// Software render target.
pub mod surface;
/// Reusable temporary offscreen buffers.
pub mod surface_pool;
/// Fingerprinted texture store.
pub mod texture;

pub use display_list::nine_slice;
