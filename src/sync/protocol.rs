//! Message layouts on top of [`WireBuffer`].
//!
//! Every message is: target handle (side table), tag byte, then either a `u32` dirty mask
//! followed by the fields whose bit is set in ascending bit order, or a `u32` count followed by
//! that many entries. The stream ends with [`MessageTag::EndOfFile`].

use crate::foundation::core::{Affine, BlendMode, Rect, Vec2};
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::HandleId;
use crate::scene::props::{
    BitmapProps, DisplayProps, FillMode, Filter, GraphicsCommand, StageDisplayRule, TextAlign,
    TextFieldProps, TextInputType, VerticalAlign, text_field_table,
};
use crate::sync::dirty::{BitmapDirty, DisplayDirty, StageDirty, TextFieldDirty};
use crate::sync::wire::{WireBuffer, WireReader};

/// Message kind byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum MessageTag {
    /// End of the stream.
    EndOfFile = 0,
    /// Generic display-object attributes.
    UpdateDisplayObject = 10,
    /// Full child list.
    UpdateChildren = 11,
    /// Stage display rule.
    UpdateStage = 12,
    /// Bitmap content.
    UpdateBitmap = 13,
    /// Graphics command list.
    UpdateGraphics = 14,
    /// Text field content.
    UpdateTextField = 15,
    /// Render a subtree into a texture.
    DrawToBitmap = 20,
}

impl MessageTag {
    /// Decode a tag byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::EndOfFile,
            10 => Self::UpdateDisplayObject,
            11 => Self::UpdateChildren,
            12 => Self::UpdateStage,
            13 => Self::UpdateBitmap,
            14 => Self::UpdateGraphics,
            15 => Self::UpdateTextField,
            20 => Self::DrawToBitmap,
            _ => return None,
        })
    }
}

/// Compact matrix forms, cheapest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum MatrixEncoding {
    /// `tx, ty`.
    Translation = 0,
    /// `s, tx, ty`.
    UniformScale = 1,
    /// `sx, sy, tx, ty`.
    Scale = 2,
    /// `a, b, c, d, tx, ty`.
    Affine = 3,
}

impl MatrixEncoding {
    /// Cheapest form that represents `m` exactly.
    pub fn classify(m: Affine) -> Self {
        let [a, b, c, d, _, _] = m.as_coeffs();
        if b != 0.0 || c != 0.0 {
            Self::Affine
        } else if a == 1.0 && d == 1.0 {
            Self::Translation
        } else if a == d {
            Self::UniformScale
        } else {
            Self::Scale
        }
    }

    /// Number of `f32` values following the encoding byte.
    pub fn float_count(self) -> usize {
        match self {
            Self::Translation => 2,
            Self::UniformScale => 3,
            Self::Scale => 4,
            Self::Affine => 6,
        }
    }

    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Translation,
            1 => Self::UniformScale,
            2 => Self::Scale,
            3 => Self::Affine,
            _ => return None,
        })
    }
}

/// A value with a fixed wire form.
pub(crate) trait WireField: Sized {
    fn write(&self, buf: &mut WireBuffer);
    fn read(r: &mut WireReader<'_>) -> StageResult<Self>;
}

impl WireField for f32 {
    fn write(&self, buf: &mut WireBuffer) {
        buf.write_f32(*self);
    }
    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        r.read_f32()
    }
}

impl WireField for u32 {
    fn write(&self, buf: &mut WireBuffer) {
        buf.write_u32(*self);
    }
    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        r.read_u32()
    }
}

impl WireField for bool {
    fn write(&self, buf: &mut WireBuffer) {
        buf.write_bool(*self);
    }
    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        r.read_bool()
    }
}

impl WireField for String {
    fn write(&self, buf: &mut WireBuffer) {
        buf.write_string(self);
    }
    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        r.read_string().map(str::to_owned)
    }
}

impl WireField for Vec2 {
    fn write(&self, buf: &mut WireBuffer) {
        buf.write_f32(self.x as f32);
        buf.write_f32(self.y as f32);
    }
    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        let x = r.read_f32()?;
        let y = r.read_f32()?;
        Ok(Vec2::new(f64::from(x), f64::from(y)))
    }
}

impl WireField for Rect {
    fn write(&self, buf: &mut WireBuffer) {
        buf.write_f32(self.x0 as f32);
        buf.write_f32(self.y0 as f32);
        buf.write_f32(self.width() as f32);
        buf.write_f32(self.height() as f32);
    }
    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        let x = f64::from(r.read_f32()?);
        let y = f64::from(r.read_f32()?);
        let w = f64::from(r.read_f32()?);
        let h = f64::from(r.read_f32()?);
        Ok(Rect::new(x, y, x + w, y + h))
    }
}

impl<T: WireField> WireField for Option<T> {
    fn write(&self, buf: &mut WireBuffer) {
        buf.write_bool(self.is_some());
        if let Some(v) = self {
            v.write(buf);
        }
    }
    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        if r.read_bool()? {
            Ok(Some(T::read(r)?))
        } else {
            Ok(None)
        }
    }
}

impl WireField for Affine {
    fn write(&self, buf: &mut WireBuffer) {
        let enc = MatrixEncoding::classify(*self);
        let [a, b, c, d, tx, ty] = self.as_coeffs().map(|v| v as f32);
        buf.write_u8(enc as u8);
        match enc {
            MatrixEncoding::Translation => {}
            MatrixEncoding::UniformScale => buf.write_f32(a),
            MatrixEncoding::Scale => {
                buf.write_f32(a);
                buf.write_f32(d);
            }
            MatrixEncoding::Affine => {
                for v in [a, b, c, d] {
                    buf.write_f32(v);
                }
            }
        }
        buf.write_f32(tx);
        buf.write_f32(ty);
    }

    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        let raw = r.read_u8()?;
        let enc = MatrixEncoding::from_u8(raw)
            .ok_or_else(|| StageError::protocol(format!("unknown matrix encoding {raw}")))?;
        let mut f = [0f64; 6];
        for v in f.iter_mut().take(enc.float_count()) {
            *v = f64::from(r.read_f32()?);
        }
        Ok(match enc {
            MatrixEncoding::Translation => Affine::new([1.0, 0.0, 0.0, 1.0, f[0], f[1]]),
            MatrixEncoding::UniformScale => Affine::new([f[0], 0.0, 0.0, f[0], f[1], f[2]]),
            MatrixEncoding::Scale => Affine::new([f[0], 0.0, 0.0, f[1], f[2], f[3]]),
            MatrixEncoding::Affine => Affine::new(f),
        })
    }
}

macro_rules! byte_enum_field {
    ($ty:ty, $what:literal) => {
        impl WireField for $ty {
            fn write(&self, buf: &mut WireBuffer) {
                buf.write_u8(*self as u8);
            }
            fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
                let raw = r.read_u8()?;
                <$ty>::from_u8(raw)
                    .ok_or_else(|| StageError::protocol(format!(concat!("unknown ", $what, " {}"), raw)))
            }
        }
    };
}

byte_enum_field!(BlendMode, "blend mode");
byte_enum_field!(FillMode, "fill mode");
byte_enum_field!(TextAlign, "text align");
byte_enum_field!(VerticalAlign, "vertical align");
byte_enum_field!(TextInputType, "input type");

impl WireField for Filter {
    fn write(&self, buf: &mut WireBuffer) {
        match self {
            Self::Blur { blur_x, blur_y } => {
                buf.write_u8(0);
                buf.write_f32(*blur_x);
                buf.write_f32(*blur_y);
            }
            Self::ColorMatrix { matrix } => {
                buf.write_u8(1);
                for v in matrix {
                    buf.write_f32(*v);
                }
            }
        }
    }

    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        match r.read_u8()? {
            0 => Ok(Self::Blur {
                blur_x: r.read_f32()?,
                blur_y: r.read_f32()?,
            }),
            1 => {
                let mut matrix = [0f32; 20];
                for v in &mut matrix {
                    *v = r.read_f32()?;
                }
                Ok(Self::ColorMatrix { matrix })
            }
            other => Err(StageError::protocol(format!("unknown filter kind {other}"))),
        }
    }
}

impl<T: WireField> WireField for Vec<T> {
    fn write(&self, buf: &mut WireBuffer) {
        buf.write_u32(self.len() as u32);
        for v in self {
            v.write(buf);
        }
    }
    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        let n = r.read_u32()? as usize;
        // Each entry takes at least one byte; cap the reservation by what is actually left.
        let mut out = Vec::with_capacity(n.min(r.remaining()));
        for _ in 0..n {
            out.push(T::read(r)?);
        }
        Ok(out)
    }
}

impl WireField for GraphicsCommand {
    fn write(&self, buf: &mut WireBuffer) {
        match *self {
            Self::BeginFill { color, alpha } => {
                buf.write_u8(0);
                buf.write_u32(color);
                buf.write_f32(alpha);
            }
            Self::EndFill => buf.write_u8(1),
            Self::LineStyle {
                thickness,
                color,
                alpha,
            } => {
                buf.write_u8(2);
                buf.write_f32(thickness);
                buf.write_u32(color);
                buf.write_f32(alpha);
            }
            Self::MoveTo { x, y } => {
                buf.write_u8(3);
                buf.write_f32(x);
                buf.write_f32(y);
            }
            Self::LineTo { x, y } => {
                buf.write_u8(4);
                buf.write_f32(x);
                buf.write_f32(y);
            }
            Self::CurveTo { cx, cy, x, y } => {
                buf.write_u8(5);
                for v in [cx, cy, x, y] {
                    buf.write_f32(v);
                }
            }
            Self::DrawRect { x, y, w, h } => {
                buf.write_u8(6);
                for v in [x, y, w, h] {
                    buf.write_f32(v);
                }
            }
            Self::DrawCircle { x, y, r } => {
                buf.write_u8(7);
                for v in [x, y, r] {
                    buf.write_f32(v);
                }
            }
            Self::DrawEllipse { x, y, w, h } => {
                buf.write_u8(8);
                for v in [x, y, w, h] {
                    buf.write_f32(v);
                }
            }
        }
    }

    fn read(r: &mut WireReader<'_>) -> StageResult<Self> {
        Ok(match r.read_u8()? {
            0 => Self::BeginFill {
                color: r.read_u32()?,
                alpha: r.read_f32()?,
            },
            1 => Self::EndFill,
            2 => Self::LineStyle {
                thickness: r.read_f32()?,
                color: r.read_u32()?,
                alpha: r.read_f32()?,
            },
            3 => Self::MoveTo {
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            4 => Self::LineTo {
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            5 => Self::CurveTo {
                cx: r.read_f32()?,
                cy: r.read_f32()?,
                x: r.read_f32()?,
                y: r.read_f32()?,
            },
            6 => Self::DrawRect {
                x: r.read_f32()?,
                y: r.read_f32()?,
                w: r.read_f32()?,
                h: r.read_f32()?,
            },
            7 => Self::DrawCircle {
                x: r.read_f32()?,
                y: r.read_f32()?,
                r: r.read_f32()?,
            },
            8 => Self::DrawEllipse {
                x: r.read_f32()?,
                y: r.read_f32()?,
                w: r.read_f32()?,
                h: r.read_f32()?,
            },
            other => {
                return Err(StageError::protocol(format!(
                    "unknown graphics opcode {other}"
                )));
            }
        })
    }
}

fn begin(buf: &mut WireBuffer, target: HandleId, tag: MessageTag) {
    buf.write_handle(target);
    buf.write_u8(tag as u8);
}

/// Generic attributes selected by `dirty`. `mask` is consulted only when the mask bit is set.
pub fn encode_display_object(
    buf: &mut WireBuffer,
    target: HandleId,
    dirty: DisplayDirty,
    props: &DisplayProps,
    mask: Option<HandleId>,
) {
    begin(buf, target, MessageTag::UpdateDisplayObject);
    buf.write_u32(dirty.bits());
    if dirty.contains(DisplayDirty::MATRIX) {
        props.matrix.write(buf);
    }
    if dirty.contains(DisplayDirty::SCROLL_RECT) {
        props.scroll_rect.write(buf);
    }
    if dirty.contains(DisplayDirty::FILTERS) {
        props.filters.write(buf);
    }
    if dirty.contains(DisplayDirty::VISIBLE) {
        props.visible.write(buf);
    }
    if dirty.contains(DisplayDirty::CACHE_AS_BITMAP) {
        props.cache_as_bitmap.write(buf);
    }
    if dirty.contains(DisplayDirty::ALPHA) {
        props.alpha.write(buf);
    }
    if dirty.contains(DisplayDirty::BLEND_MODE) {
        props.blend_mode.write(buf);
    }
    if dirty.contains(DisplayDirty::MASK) {
        buf.write_bool(mask.is_some());
        if let Some(m) = mask {
            buf.write_handle(m);
        }
    }
    if dirty.contains(DisplayDirty::MASK_RECT) {
        props.mask_rect.write(buf);
    }
}

/// Full ordered child list.
pub fn encode_children(buf: &mut WireBuffer, target: HandleId, children: &[HandleId]) {
    begin(buf, target, MessageTag::UpdateChildren);
    buf.write_u32(children.len() as u32);
    for &c in children {
        buf.write_handle(c);
    }
}

/// Stage display rule fields selected by `dirty`.
pub fn encode_stage(
    buf: &mut WireBuffer,
    target: HandleId,
    dirty: StageDirty,
    rule: &StageDisplayRule,
) {
    begin(buf, target, MessageTag::UpdateStage);
    buf.write_u32(dirty.bits());
    if dirty.contains(StageDirty::CONTENT_SIZE) {
        buf.write_u32(rule.stage_width);
        buf.write_u32(rule.stage_height);
    }
    if dirty.contains(StageDirty::DISPLAY_RECT) {
        rule.display_rect.write(buf);
    }
    if dirty.contains(StageDirty::CONTENT_SCALE) {
        buf.write_f32(rule.content_scale as f32);
    }
}

/// Bitmap fields selected by `dirty`.
pub fn encode_bitmap(buf: &mut WireBuffer, target: HandleId, dirty: BitmapDirty, props: &BitmapProps) {
    begin(buf, target, MessageTag::UpdateBitmap);
    buf.write_u32(dirty.bits());
    if dirty.contains(BitmapDirty::BITMAP_DATA) {
        props.texture.write(buf);
        props.size.write(buf);
    }
    if dirty.contains(BitmapDirty::FILL_MODE) {
        props.fill_mode.write(buf);
    }
    if dirty.contains(BitmapDirty::SMOOTHING) {
        props.smoothing.write(buf);
    }
    if dirty.contains(BitmapDirty::SCALE9_GRID) {
        props.scale9_grid.write(buf);
    }
}

/// Whole command list.
pub fn encode_graphics(buf: &mut WireBuffer, target: HandleId, commands: &[GraphicsCommand]) {
    begin(buf, target, MessageTag::UpdateGraphics);
    buf.write_u32(commands.len() as u32);
    for c in commands {
        c.write(buf);
    }
}

/// Text field fields selected by `dirty`.
pub fn encode_text_field(
    buf: &mut WireBuffer,
    target: HandleId,
    dirty: TextFieldDirty,
    props: &TextFieldProps,
) {
    begin(buf, target, MessageTag::UpdateTextField);
    buf.write_u32(dirty.bits());
    macro_rules! put {
        ($bit:ident, $field:ident, $how:ident) => {
            if dirty.contains(TextFieldDirty::$bit) {
                props.$field.write(buf);
            }
        };
    }
    text_field_table!(put);
}

/// Request to render a subtree into a named texture.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DrawRequest {
    /// Texture key the result is registered under.
    pub texture: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Transform applied on top of the source's own matrix.
    pub matrix: Affine,
}

/// Render `source` into the texture described by `request`.
pub fn encode_draw_to_bitmap(buf: &mut WireBuffer, source: HandleId, request: &DrawRequest) {
    begin(buf, source, MessageTag::DrawToBitmap);
    request.texture.write(buf);
    buf.write_u32(request.width);
    buf.write_u32(request.height);
    request.matrix.write(buf);
}

/// Decoded generic attributes. Only fields selected by `dirty` carry meaning.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DisplayObjectUpdate {
    /// Fields present in the message.
    pub dirty: DisplayDirty,
    /// Values, defaults elsewhere.
    pub props: DisplayProps,
    /// Mask handle, meaningful when `dirty` has the mask bit.
    pub mask: Option<HandleId>,
}

/// One decoded message.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Message {
    /// Generic attributes of `target`.
    UpdateDisplayObject {
        /// Receiving node.
        target: HandleId,
        /// Decoded fields.
        update: DisplayObjectUpdate,
    },
    /// Replacement child list of `target`, back to front.
    UpdateChildren {
        /// Receiving node.
        target: HandleId,
        /// Child handles in z-order.
        children: Vec<HandleId>,
    },
    /// Stage display rule fields.
    UpdateStage {
        /// Receiving stage.
        target: HandleId,
        /// Fields present.
        dirty: StageDirty,
        /// Values; only `dirty` fields carry meaning.
        rule: StageDisplayRule,
    },
    /// Bitmap fields.
    UpdateBitmap {
        /// Receiving bitmap.
        target: HandleId,
        /// Fields present.
        dirty: BitmapDirty,
        /// Values; only `dirty` fields carry meaning.
        props: BitmapProps,
    },
    /// Replacement command list.
    UpdateGraphics {
        /// Receiving graphics node.
        target: HandleId,
        /// Commands in submission order.
        commands: Vec<GraphicsCommand>,
    },
    /// Text field fields.
    UpdateTextField {
        /// Receiving text field.
        target: HandleId,
        /// Fields present.
        dirty: TextFieldDirty,
        /// Values; only `dirty` fields carry meaning.
        props: Box<TextFieldProps>,
    },
    /// Render `source` into a texture.
    DrawToBitmap {
        /// Subtree root.
        source: HandleId,
        /// Target texture description.
        request: DrawRequest,
    },
}

impl Message {
    /// Tag this message was decoded from.
    pub fn tag(&self) -> MessageTag {
        match self {
            Self::UpdateDisplayObject { .. } => MessageTag::UpdateDisplayObject,
            Self::UpdateChildren { .. } => MessageTag::UpdateChildren,
            Self::UpdateStage { .. } => MessageTag::UpdateStage,
            Self::UpdateBitmap { .. } => MessageTag::UpdateBitmap,
            Self::UpdateGraphics { .. } => MessageTag::UpdateGraphics,
            Self::UpdateTextField { .. } => MessageTag::UpdateTextField,
            Self::DrawToBitmap { .. } => MessageTag::DrawToBitmap,
        }
    }

    /// Handle the message applies to.
    pub fn target(&self) -> HandleId {
        match self {
            Self::UpdateDisplayObject { target, .. }
            | Self::UpdateChildren { target, .. }
            | Self::UpdateStage { target, .. }
            | Self::UpdateBitmap { target, .. }
            | Self::UpdateGraphics { target, .. }
            | Self::UpdateTextField { target, .. } => *target,
            Self::DrawToBitmap { source, .. } => *source,
        }
    }
}

fn read_mask<F>(r: &mut WireReader<'_>, from_bits: fn(u32) -> Option<F>, what: &str) -> StageResult<F> {
    let raw = r.read_u32()?;
    from_bits(raw).ok_or_else(|| StageError::protocol(format!("unknown {what} bits {raw:#x}")))
}

fn decode_display_object(r: &mut WireReader<'_>) -> StageResult<DisplayObjectUpdate> {
    let dirty = read_mask(r, DisplayDirty::from_bits, "display")?;
    let mut props = DisplayProps::default();
    let mut mask = None;
    if dirty.contains(DisplayDirty::MATRIX) {
        props.matrix = WireField::read(r)?;
    }
    if dirty.contains(DisplayDirty::SCROLL_RECT) {
        props.scroll_rect = WireField::read(r)?;
    }
    if dirty.contains(DisplayDirty::FILTERS) {
        props.filters = WireField::read(r)?;
    }
    if dirty.contains(DisplayDirty::VISIBLE) {
        props.visible = WireField::read(r)?;
    }
    if dirty.contains(DisplayDirty::CACHE_AS_BITMAP) {
        props.cache_as_bitmap = WireField::read(r)?;
    }
    if dirty.contains(DisplayDirty::ALPHA) {
        props.alpha = WireField::read(r)?;
    }
    if dirty.contains(DisplayDirty::BLEND_MODE) {
        props.blend_mode = WireField::read(r)?;
    }
    if dirty.contains(DisplayDirty::MASK) && r.read_bool()? {
        mask = Some(r.read_handle()?);
    }
    if dirty.contains(DisplayDirty::MASK_RECT) {
        props.mask_rect = WireField::read(r)?;
    }
    Ok(DisplayObjectUpdate { dirty, props, mask })
}

fn decode_stage(r: &mut WireReader<'_>) -> StageResult<(StageDirty, StageDisplayRule)> {
    let dirty = read_mask(r, StageDirty::from_bits, "stage")?;
    let mut rule = StageDisplayRule::default();
    if dirty.contains(StageDirty::CONTENT_SIZE) {
        rule.stage_width = r.read_u32()?;
        rule.stage_height = r.read_u32()?;
    }
    if dirty.contains(StageDirty::DISPLAY_RECT) {
        rule.display_rect = WireField::read(r)?;
    }
    if dirty.contains(StageDirty::CONTENT_SCALE) {
        rule.content_scale = f64::from(r.read_f32()?);
    }
    Ok((dirty, rule))
}

fn decode_bitmap(r: &mut WireReader<'_>) -> StageResult<(BitmapDirty, BitmapProps)> {
    let dirty = read_mask(r, BitmapDirty::from_bits, "bitmap")?;
    let mut props = BitmapProps::default();
    if dirty.contains(BitmapDirty::BITMAP_DATA) {
        props.texture = WireField::read(r)?;
        props.size = WireField::read(r)?;
    }
    if dirty.contains(BitmapDirty::FILL_MODE) {
        props.fill_mode = WireField::read(r)?;
    }
    if dirty.contains(BitmapDirty::SMOOTHING) {
        props.smoothing = WireField::read(r)?;
    }
    if dirty.contains(BitmapDirty::SCALE9_GRID) {
        props.scale9_grid = WireField::read(r)?;
    }
    Ok((dirty, props))
}

fn decode_text_field(r: &mut WireReader<'_>) -> StageResult<(TextFieldDirty, TextFieldProps)> {
    let dirty = read_mask(r, TextFieldDirty::from_bits, "text field")?;
    let mut props = TextFieldProps::default();
    macro_rules! get {
        ($bit:ident, $field:ident, $how:ident) => {
            if dirty.contains(TextFieldDirty::$bit) {
                props.$field = WireField::read(r)?;
            }
        };
    }
    text_field_table!(get);
    Ok((dirty, props))
}

/// Iterator over the messages of a finished buffer.
///
/// Stops after [`MessageTag::EndOfFile`]. An unknown tag, a truncated message or a stream with
/// no terminator yields one [`StageError::Protocol`] and then ends.
#[derive(Debug)]
pub struct MessageReader<'a> {
    reader: WireReader<'a>,
    done: bool,
}

impl<'a> MessageReader<'a> {
    /// Decode from the start of `buf`.
    pub fn new(buf: &'a WireBuffer) -> Self {
        Self {
            reader: buf.reader(),
            done: false,
        }
    }

    fn next_message(&mut self) -> StageResult<Option<Message>> {
        let r = &mut self.reader;
        if r.remaining() == 0 {
            return Err(StageError::protocol("stream ended without end-of-file marker"));
        }
        let at = r.position();
        let raw = r.read_u8()?;
        let tag = MessageTag::from_u8(raw)
            .ok_or_else(|| StageError::protocol(format!("unknown message tag {raw} at offset {at}")))?;
        if tag == MessageTag::EndOfFile {
            return Ok(None);
        }
        let target = r.read_handle()?;
        let msg = match tag {
            MessageTag::EndOfFile => return Ok(None),
            MessageTag::UpdateDisplayObject => Message::UpdateDisplayObject {
                target,
                update: decode_display_object(r)?,
            },
            MessageTag::UpdateChildren => {
                let n = r.read_u32()?;
                let children = (0..n).map(|_| r.read_handle()).collect::<StageResult<_>>()?;
                Message::UpdateChildren { target, children }
            }
            MessageTag::UpdateStage => {
                let (dirty, rule) = decode_stage(r)?;
                Message::UpdateStage { target, dirty, rule }
            }
            MessageTag::UpdateBitmap => {
                let (dirty, props) = decode_bitmap(r)?;
                Message::UpdateBitmap { target, dirty, props }
            }
            MessageTag::UpdateGraphics => Message::UpdateGraphics {
                target,
                commands: WireField::read(r)?,
            },
            MessageTag::UpdateTextField => {
                let (dirty, props) = decode_text_field(r)?;
                Message::UpdateTextField {
                    target,
                    dirty,
                    props: Box::new(props),
                }
            }
            MessageTag::DrawToBitmap => Message::DrawToBitmap {
                source: target,
                request: DrawRequest {
                    texture: WireField::read(r)?,
                    width: r.read_u32()?,
                    height: r.read_u32()?,
                    matrix: WireField::read(r)?,
                },
            },
        };
        Ok(Some(msg))
    }
}

impl Iterator for MessageReader<'_> {
    type Item = StageResult<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_message() {
            Ok(Some(msg)) => Some(Ok(msg)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Decode every message of `buf` up to the end marker.
pub fn decode_all(buf: &WireBuffer) -> StageResult<Vec<Message>> {
    MessageReader::new(buf).collect()
}

#[cfg(test)]
#[path = "../../tests/unit/sync/protocol.rs"]
mod tests;
