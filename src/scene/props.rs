//! Display-object attribute types shared by the scene graph and the backend render nodes.

use crate::foundation::core::{Affine, BlendMode, Rect, Vec2};
use crate::sync::dirty::{BitmapDirty, DisplayDirty, StageDirty, TextFieldDirty};

/// Node kind. The discriminants are the raw kind values accepted by
/// [`RenderBridge::make_node_raw`](crate::RenderBridge::make_node_raw).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum NodeType {
    /// Plain container.
    #[default]
    Node = 0,
    /// Root of one on-screen render target.
    Stage = 1,
    /// Textured quad.
    Bitmap = 2,
    /// Vector command list.
    Graphics = 3,
    /// Text box.
    TextField = 4,
}

impl NodeType {
    /// Map a raw kind value; anything unknown is a plain [`NodeType::Node`].
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Stage,
            2 => Self::Bitmap,
            3 => Self::Graphics,
            4 => Self::TextField,
            _ => Self::Node,
        }
    }
}

/// Post-processing filter applied to a node rendered offscreen.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Filter {
    /// Separable box blur with the given radii in pixels.
    Blur {
        /// Horizontal radius.
        blur_x: f32,
        /// Vertical radius.
        blur_y: f32,
    },
    /// 4x5 color matrix over straight RGBA in `[0, 255]`, offsets in the fifth column.
    ColorMatrix {
        /// Row-major coefficients.
        matrix: [f32; 20],
    },
}

/// Generic display-object attributes. The mask reference is kept next to these by each side,
/// since it is a node identity on the scene side and a handle on the backend side.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DisplayProps {
    /// Local transform relative to the parent.
    pub matrix: Affine,
    /// Opacity in `[0, 1]`, multiplied down the tree.
    pub alpha: f32,
    /// Hidden nodes and their subtrees are skipped by the draw pass.
    pub visible: bool,
    /// Compositing operator onto the parent.
    pub blend_mode: BlendMode,
    /// Local-space viewport; content is clipped to it and offset by its origin.
    pub scroll_rect: Option<Rect>,
    /// Filters, applied in order.
    pub filters: Vec<Filter>,
    /// Keep a rendered copy of the subtree and reuse it while nothing below changes.
    pub cache_as_bitmap: bool,
    /// Local-space rectangular clip.
    pub mask_rect: Option<Rect>,
}

impl Default for DisplayProps {
    fn default() -> Self {
        Self {
            matrix: Affine::IDENTITY,
            alpha: 1.0,
            visible: true,
            blend_mode: BlendMode::Normal,
            scroll_rect: None,
            filters: Vec::new(),
            cache_as_bitmap: false,
            mask_rect: None,
        }
    }
}

impl DisplayProps {
    /// Copy the fields selected by `dirty` from `src`. The mask bit is handled by the caller.
    pub fn apply(&mut self, dirty: DisplayDirty, src: &Self) {
        if dirty.contains(DisplayDirty::MATRIX) {
            self.matrix = src.matrix;
        }
        if dirty.contains(DisplayDirty::SCROLL_RECT) {
            self.scroll_rect = src.scroll_rect;
        }
        if dirty.contains(DisplayDirty::FILTERS) {
            self.filters.clone_from(&src.filters);
        }
        if dirty.contains(DisplayDirty::VISIBLE) {
            self.visible = src.visible;
        }
        if dirty.contains(DisplayDirty::CACHE_AS_BITMAP) {
            self.cache_as_bitmap = src.cache_as_bitmap;
        }
        if dirty.contains(DisplayDirty::ALPHA) {
            self.alpha = src.alpha;
        }
        if dirty.contains(DisplayDirty::BLEND_MODE) {
            self.blend_mode = src.blend_mode;
        }
        if dirty.contains(DisplayDirty::MASK_RECT) {
            self.mask_rect = src.mask_rect;
        }
    }
}

/// How a stage maps onto the physical screen.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageDisplayRule {
    /// Logical content width.
    pub stage_width: u32,
    /// Logical content height.
    pub stage_height: u32,
    /// Placement and size on the physical screen.
    pub display_rect: Rect,
    /// Backing-store pixels per content unit.
    pub content_scale: f64,
}

impl Default for StageDisplayRule {
    fn default() -> Self {
        Self::fixed(480, 320)
    }
}

impl StageDisplayRule {
    /// Content shown 1:1 at the screen origin.
    pub fn fixed(width: u32, height: u32) -> Self {
        Self {
            stage_width: width,
            stage_height: height,
            display_rect: Rect::new(0.0, 0.0, f64::from(width), f64::from(height)),
            content_scale: 1.0,
        }
    }

    /// Backing surface size in pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        let scale = self.content_scale.max(0.0);
        (
            (f64::from(self.stage_width) * scale).round() as u32,
            (f64::from(self.stage_height) * scale).round() as u32,
        )
    }

    /// Clip region in content units.
    pub fn content_clip(&self) -> Rect {
        Rect::new(
            0.0,
            0.0,
            f64::from(self.stage_width),
            f64::from(self.stage_height),
        )
    }

    /// Fields that differ from `other`.
    pub fn diff(&self, other: &Self) -> StageDirty {
        let mut d = StageDirty::empty();
        if self.stage_width != other.stage_width || self.stage_height != other.stage_height {
            d |= StageDirty::CONTENT_SIZE;
        }
        if self.display_rect != other.display_rect {
            d |= StageDirty::DISPLAY_RECT;
        }
        if self.content_scale != other.content_scale {
            d |= StageDirty::CONTENT_SCALE;
        }
        d
    }

    /// Copy the fields selected by `dirty` from `src`.
    pub fn apply(&mut self, dirty: StageDirty, src: &Self) {
        if dirty.contains(StageDirty::CONTENT_SIZE) {
            self.stage_width = src.stage_width;
            self.stage_height = src.stage_height;
        }
        if dirty.contains(StageDirty::DISPLAY_RECT) {
            self.display_rect = src.display_rect;
        }
        if dirty.contains(StageDirty::CONTENT_SCALE) {
            self.content_scale = src.content_scale;
        }
    }
}

/// How a bitmap's texture fills its box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum FillMode {
    /// Stretch the texture over the box.
    #[default]
    Scale = 0,
    /// Tile the texture at natural size.
    Repeat = 1,
    /// Draw at natural size, cropped to the box.
    Clip = 2,
}

impl FillMode {
    /// Decode a wire byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Scale),
            1 => Some(Self::Repeat),
            2 => Some(Self::Clip),
            _ => None,
        }
    }
}

/// Bitmap content.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BitmapProps {
    /// Texture identity in the backend texture store. `None` draws nothing and is never linked
    /// for texture invalidation.
    pub texture: Option<String>,
    /// Explicit box size; `None` uses the texture's natural size.
    pub size: Option<Vec2>,
    /// Box fill behavior.
    pub fill_mode: FillMode,
    /// Bilinear sampling when `true`, nearest otherwise.
    pub smoothing: bool,
    /// Nine-slice grid in texture pixels.
    pub scale9_grid: Option<Rect>,
}

impl Default for BitmapProps {
    fn default() -> Self {
        Self {
            texture: None,
            size: None,
            fill_mode: FillMode::Scale,
            smoothing: true,
            scale9_grid: None,
        }
    }
}

impl BitmapProps {
    /// Fields that differ from `other`.
    pub fn diff(&self, other: &Self) -> BitmapDirty {
        let mut d = BitmapDirty::empty();
        if self.texture != other.texture || self.size != other.size {
            d |= BitmapDirty::BITMAP_DATA;
        }
        if self.fill_mode != other.fill_mode {
            d |= BitmapDirty::FILL_MODE;
        }
        if self.smoothing != other.smoothing {
            d |= BitmapDirty::SMOOTHING;
        }
        if self.scale9_grid != other.scale9_grid {
            d |= BitmapDirty::SCALE9_GRID;
        }
        d
    }

    /// Copy the fields selected by `dirty` from `src`.
    pub fn apply(&mut self, dirty: BitmapDirty, src: &Self) {
        if dirty.contains(BitmapDirty::BITMAP_DATA) {
            self.texture.clone_from(&src.texture);
            self.size = src.size;
        }
        if dirty.contains(BitmapDirty::FILL_MODE) {
            self.fill_mode = src.fill_mode;
        }
        if dirty.contains(BitmapDirty::SMOOTHING) {
            self.smoothing = src.smoothing;
        }
        if dirty.contains(BitmapDirty::SCALE9_GRID) {
            self.scale9_grid = src.scale9_grid;
        }
    }
}

/// One vector drawing command. Coordinates are local to the owning node.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum GraphicsCommand {
    /// Start filling subsequent shapes.
    BeginFill {
        /// `0xRRGGBB`.
        color: u32,
        /// Fill opacity.
        alpha: f32,
    },
    /// Close the current fill.
    EndFill,
    /// Stroke subsequent shapes; zero thickness disables stroking.
    LineStyle {
        /// Stroke width.
        thickness: f32,
        /// `0xRRGGBB`.
        color: u32,
        /// Stroke opacity.
        alpha: f32,
    },
    /// Start a new subpath.
    MoveTo {
        /// X.
        x: f32,
        /// Y.
        y: f32,
    },
    /// Straight segment.
    LineTo {
        /// X.
        x: f32,
        /// Y.
        y: f32,
    },
    /// Quadratic segment.
    CurveTo {
        /// Control X.
        cx: f32,
        /// Control Y.
        cy: f32,
        /// End X.
        x: f32,
        /// End Y.
        y: f32,
    },
    /// Axis-aligned rectangle.
    DrawRect {
        /// Left.
        x: f32,
        /// Top.
        y: f32,
        /// Width.
        w: f32,
        /// Height.
        h: f32,
    },
    /// Circle by center and radius.
    DrawCircle {
        /// Center X.
        x: f32,
        /// Center Y.
        y: f32,
        /// Radius.
        r: f32,
    },
    /// Ellipse inscribed in a box.
    DrawEllipse {
        /// Left.
        x: f32,
        /// Top.
        y: f32,
        /// Width.
        w: f32,
        /// Height.
        h: f32,
    },
}

/// Vector graphics content.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphicsProps {
    /// Commands in submission order.
    pub commands: Vec<GraphicsCommand>,
}

/// Horizontal text alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum TextAlign {
    /// Left.
    #[default]
    Left = 0,
    /// Center.
    Center = 1,
    /// Right.
    Right = 2,
    /// Justify.
    Justify = 3,
}

impl TextAlign {
    /// Decode a wire byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Left),
            1 => Some(Self::Center),
            2 => Some(Self::Right),
            3 => Some(Self::Justify),
            _ => None,
        }
    }
}

/// Vertical text alignment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum VerticalAlign {
    /// Top.
    #[default]
    Top = 0,
    /// Middle.
    Middle = 1,
    /// Bottom.
    Bottom = 2,
}

impl VerticalAlign {
    /// Decode a wire byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Top),
            1 => Some(Self::Middle),
            2 => Some(Self::Bottom),
            _ => None,
        }
    }
}

/// Whether the field accepts user input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum TextInputType {
    /// Display only.
    #[default]
    Dynamic = 0,
    /// Editable.
    Input = 1,
}

impl TextInputType {
    /// Decode a wire byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Dynamic),
            1 => Some(Self::Input),
            _ => None,
        }
    }
}

/// Text field content. Layout and glyph rasterization happen in the backend's text engine.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextFieldProps {
    /// Content.
    pub text: String,
    /// Font family name.
    pub font_family: String,
    /// Font size in content units.
    pub font_size: f32,
    /// Bold face.
    pub bold: bool,
    /// Italic face.
    pub italic: bool,
    /// `0xRRGGBB`.
    pub text_color: u32,
    /// Horizontal alignment.
    pub text_align: TextAlign,
    /// Vertical alignment.
    pub vertical_align: VerticalAlign,
    /// Extra space between lines.
    pub line_spacing: f32,
    /// Glyph outline width; zero disables.
    pub stroke: f32,
    /// `0xRRGGBB`.
    pub stroke_color: u32,
    /// Fill the box behind the text.
    pub background: bool,
    /// `0xRRGGBB`.
    pub background_color: u32,
    /// Outline the box.
    pub border: bool,
    /// `0xRRGGBB`.
    pub border_color: u32,
    /// Wrap at the box width.
    pub word_wrap: bool,
    /// Input length limit; zero means unlimited.
    pub max_chars: u32,
    /// Allow line breaks.
    pub multiline: bool,
    /// Allowed-input character pattern.
    pub pattern: String,
    /// Mask characters.
    pub display_as_password: bool,
    /// Dynamic or input.
    pub input_type: TextInputType,
    /// Box size.
    pub size: Vec2,
}

impl Default for TextFieldProps {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: "Arial".to_owned(),
            font_size: 30.0,
            bold: false,
            italic: false,
            text_color: 0xffffff,
            text_align: TextAlign::Left,
            vertical_align: VerticalAlign::Top,
            line_spacing: 0.0,
            stroke: 0.0,
            stroke_color: 0x000000,
            background: false,
            background_color: 0xffffff,
            border: false,
            border_color: 0x000000,
            word_wrap: false,
            max_chars: 0,
            multiline: false,
            pattern: String::new(),
            display_as_password: false,
            input_type: TextInputType::Dynamic,
            size: Vec2::new(100.0, 100.0),
        }
    }
}

// Field-by-field table in bit order, shared by `diff`, `apply` and the wire codec.
macro_rules! text_field_table {
    ($m:ident) => {
        $m!(TEXT, text, clone);
        $m!(FONT_FAMILY, font_family, clone);
        $m!(FONT_SIZE, font_size, copy);
        $m!(BOLD, bold, copy);
        $m!(ITALIC, italic, copy);
        $m!(TEXT_COLOR, text_color, copy);
        $m!(TEXT_ALIGN, text_align, copy);
        $m!(VERTICAL_ALIGN, vertical_align, copy);
        $m!(LINE_SPACING, line_spacing, copy);
        $m!(STROKE, stroke, copy);
        $m!(STROKE_COLOR, stroke_color, copy);
        $m!(BACKGROUND, background, copy);
        $m!(BACKGROUND_COLOR, background_color, copy);
        $m!(BORDER, border, copy);
        $m!(BORDER_COLOR, border_color, copy);
        $m!(WORD_WRAP, word_wrap, copy);
        $m!(MAX_CHARS, max_chars, copy);
        $m!(MULTILINE, multiline, copy);
        $m!(PATTERN, pattern, clone);
        $m!(DISPLAY_AS_PASSWORD, display_as_password, copy);
        $m!(INPUT_TYPE, input_type, copy);
        $m!(SIZE, size, copy);
    };
}
pub(crate) use text_field_table;

impl TextFieldProps {
    /// Fields that differ from `other`.
    pub fn diff(&self, other: &Self) -> TextFieldDirty {
        let mut d = TextFieldDirty::empty();
        macro_rules! cmp {
            ($bit:ident, $field:ident, $how:ident) => {
                if self.$field != other.$field {
                    d |= TextFieldDirty::$bit;
                }
            };
        }
        text_field_table!(cmp);
        d
    }

    /// Copy the fields selected by `dirty` from `src`.
    pub fn apply(&mut self, dirty: TextFieldDirty, src: &Self) {
        macro_rules! copy_field {
            ($bit:ident, $field:ident, clone) => {
                if dirty.contains(TextFieldDirty::$bit) {
                    self.$field.clone_from(&src.$field);
                }
            };
            ($bit:ident, $field:ident, copy) => {
                if dirty.contains(TextFieldDirty::$bit) {
                    self.$field = src.$field;
                }
            };
        }
        text_field_table!(copy_field);
    }
}

/// Kind-specific content of a node.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum NodeContent {
    /// Plain container.
    Node,
    /// Stage root.
    Stage(StageDisplayRule),
    /// Bitmap.
    Bitmap(BitmapProps),
    /// Vector graphics.
    Graphics(GraphicsProps),
    /// Text field.
    TextField(TextFieldProps),
}

impl NodeContent {
    /// Default content for `kind`.
    pub fn for_type(kind: NodeType) -> Self {
        match kind {
            NodeType::Node => Self::Node,
            NodeType::Stage => Self::Stage(StageDisplayRule::default()),
            NodeType::Bitmap => Self::Bitmap(BitmapProps::default()),
            NodeType::Graphics => Self::Graphics(GraphicsProps::default()),
            NodeType::TextField => Self::TextField(TextFieldProps::default()),
        }
    }

    /// Kind tag of this content.
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Node => NodeType::Node,
            Self::Stage(_) => NodeType::Stage,
            Self::Bitmap(_) => NodeType::Bitmap,
            Self::Graphics(_) => NodeType::Graphics,
            Self::TextField(_) => NodeType::TextField,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/props.rs"]
mod tests;
