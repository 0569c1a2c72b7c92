//! stagewire keeps a backend renderer in step with a mutable scene graph.
//!
//! Application code edits display nodes in a [`SceneGraph`]; every edit sets a dirty bit. Once per
//! frame the [`Synchronizer`] walks the changed part of the tree and writes only those changes
//! into a compact [`WireBuffer`]. The [`RenderBridge`] decodes the buffer onto backend render
//! nodes and runs each stage's [`StageRenderLoop`], which skips stages with nothing new to draw.
//!
//! - Build a scene with [`Runtime`] (or drive [`SceneGraph`] and [`RenderBridge`] directly)
//! - Call [`Runtime::advance_frame`] once per tick
//! - Read results from a [`Screen`] such as [`FrameCapture`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Backend: render nodes, stages, surfaces and the draw pass.
pub mod render;
/// Top-level frame driver.
pub mod runtime;
/// Application-side display tree.
pub mod scene;
/// Dirty tracking, wire format and the scene-to-wire flush.
pub mod sync;

pub use crate::foundation::core::{Affine, BezPath, BlendMode, Point, Rect, Rgba8Premul, Vec2};
pub use crate::foundation::error::{StageError, StageResult};
pub use crate::foundation::ids::{HandleId, NodeId};

pub use crate::render::bridge::{RenderBridge, RenderBridgeState};
pub use crate::render::metrics::{FrameStats, FrameTiming, MetricsSink, NoopMetrics, TracingMetrics};
pub use crate::render::registry::{NodeRegistry, RenderNode};
pub use crate::render::screen::{FrameCapture, NullScreen, Screen};
pub use crate::render::stage_loop::{FrameClock, ManualClock, StagePass, StageRenderLoop, SystemClock};
pub use crate::render::surface::{ImageView, RenderBuffer};
pub use crate::render::surface_pool::{DEFAULT_POOL_CAPACITY, SurfacePool, SurfacePoolStats};
pub use crate::render::texture::{Texture, TextureStore};
pub use crate::runtime::{Runtime, RuntimeOpts};
pub use crate::scene::graph::{DisplayNode, SceneGraph};
pub use crate::scene::props::{
    BitmapProps, DisplayProps, FillMode, Filter, GraphicsCommand, GraphicsProps, NodeContent,
    NodeType, StageDisplayRule, TextAlign, TextFieldProps, TextInputType, VerticalAlign,
};
pub use crate::sync::dirty::{
    BitmapDirty, DirtyMask, DirtyTracker, DisplayDirty, GraphicsDirty, StageDirty, TextFieldDirty,
};
pub use crate::sync::protocol::{
    DisplayObjectUpdate, DrawRequest, MatrixEncoding, Message, MessageReader, MessageTag, decode_all,
};
pub use crate::sync::synchronizer::{BitmapDraw, HandleSource, SyncStats, Synchronizer};
pub use crate::sync::wire::{StringTable, WireBuffer, WireCapture, WireReader};
