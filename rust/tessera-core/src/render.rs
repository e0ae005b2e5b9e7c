//! Render tree produced by applets.
//!
//! This is only the data model; turning a [`Root`] into pixels is the job of
//! a rendering engine outside this workspace. The tree serializes to JSON so
//! it can be handed to one.

use serde::Serialize;
use strum::{Display, EnumString};

/// Capability of a value that can be converted into a single render root.
pub trait Rootable {
    fn as_render_root(&self) -> Root;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Root {
    pub child: Widget,
    /// Frame delay in milliseconds.
    pub delay: u32,
    /// Seconds the output may be cached for. Zero means unbounded.
    pub max_age: u32,
    pub show_full_animation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MainAlign {
    #[default]
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CrossAlign {
    #[default]
    Start,
    End,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScrollDirection {
    #[default]
    Horizontal,
    Vertical,
}

/// Left, top, right, bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Insets {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Insets {
    pub fn uniform(pad: i32) -> Self {
        Self {
            left: pad,
            top: pad,
            right: pad,
            bottom: pad,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyframe {
    pub percentage: f64,
    pub transforms: Vec<Transform>,
    pub curve: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transform {
    Rotate { angle: f64 },
    Scale { x: f64, y: f64 },
    Translate { x: f64, y: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Widget {
    Box {
        child: Option<Box<Widget>>,
        width: i32,
        height: i32,
        padding: i32,
        color: Option<String>,
    },
    Text {
        content: String,
        font: String,
        color: String,
        height: i32,
        offset: i32,
    },
    WrappedText {
        content: String,
        font: String,
        color: String,
        width: i32,
        height: i32,
        linespacing: i32,
        align: String,
    },
    Row {
        children: Vec<Widget>,
        main_align: MainAlign,
        cross_align: CrossAlign,
        expanded: bool,
    },
    Column {
        children: Vec<Widget>,
        main_align: MainAlign,
        cross_align: CrossAlign,
        expanded: bool,
    },
    Stack {
        children: Vec<Widget>,
    },
    Padding {
        child: Box<Widget>,
        pad: Insets,
        expanded: bool,
        color: Option<String>,
    },
    Marquee {
        child: Box<Widget>,
        width: i32,
        height: i32,
        offset_start: i32,
        offset_end: i32,
        scroll_direction: ScrollDirection,
    },
    Circle {
        child: Option<Box<Widget>>,
        diameter: i32,
        color: String,
    },
    Image {
        #[serde(skip)]
        src: Vec<u8>,
        width: i32,
        height: i32,
    },
    Animation {
        children: Vec<Widget>,
    },
    Sequence {
        children: Vec<Widget>,
    },
    Transformation {
        child: Box<Widget>,
        keyframes: Vec<Keyframe>,
        duration: i32,
        delay: i32,
        origin: (f64, f64),
        wait_for_child: bool,
    },
}

impl Widget {
    /// Widget kind as exposed to scripts, e.g. `"Text"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Widget::Box { .. } => "Box",
            Widget::Text { .. } => "Text",
            Widget::WrappedText { .. } => "WrappedText",
            Widget::Row { .. } => "Row",
            Widget::Column { .. } => "Column",
            Widget::Stack { .. } => "Stack",
            Widget::Padding { .. } => "Padding",
            Widget::Marquee { .. } => "Marquee",
            Widget::Circle { .. } => "Circle",
            Widget::Image { .. } => "Image",
            Widget::Animation { .. } => "Animation",
            Widget::Sequence { .. } => "Sequence",
            Widget::Transformation { .. } => "Transformation",
        }
    }
}
