//! `render.star`: widget constructors.
//!
//! Constructors validate their arguments and build the render tree data
//! model from `tessera_core::render`. Only `render.Root` values carry the
//! rootable capability; the other widgets are building blocks.

use std::str::FromStr;
use tessera_core::render::{CrossAlign, Insets, MainAlign, ScrollDirection};
use tessera_core::{
    ArgParser, Arguments, Bindings, EvalError, ModuleBuilder, Object, Root, Rootable, Thread,
    Value, Widget,
};

pub const DEFAULT_FONT: &str = "tb-8";
pub const DEFAULT_COLOR: &str = "#fff";

// ---------------------------------------------------------------------------
// Script values
// ---------------------------------------------------------------------------

/// A widget as seen by scripts.
#[derive(Debug, Clone)]
pub struct WidgetValue(pub Widget);

impl Object for WidgetValue {
    fn type_name(&self) -> &str {
        match &self.0 {
            Widget::Box { .. } => "render.Box",
            Widget::Text { .. } => "render.Text",
            Widget::WrappedText { .. } => "render.WrappedText",
            Widget::Row { .. } => "render.Row",
            Widget::Column { .. } => "render.Column",
            Widget::Stack { .. } => "render.Stack",
            Widget::Padding { .. } => "render.Padding",
            Widget::Marquee { .. } => "render.Marquee",
            Widget::Circle { .. } => "render.Circle",
            Widget::Image { .. } => "render.Image",
            Widget::Animation { .. } => "render.Animation",
            Widget::Sequence { .. } => "render.Sequence",
            Widget::Transformation { .. } => "animation.Transformation",
        }
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let wrap = |w: &Widget| Value::object(WidgetValue(w.clone()));
        let wrap_all = |ws: &[Widget]| Value::List(ws.iter().map(wrap).collect());
        match (&self.0, name) {
            (Widget::Text { content, .. } | Widget::WrappedText { content, .. }, "content") => {
                Some(content.as_str().into())
            }
            (Widget::Text { font, .. } | Widget::WrappedText { font, .. }, "font") => {
                Some(font.as_str().into())
            }
            (
                Widget::Row { children, .. }
                | Widget::Column { children, .. }
                | Widget::Stack { children }
                | Widget::Animation { children }
                | Widget::Sequence { children },
                "children",
            ) => Some(wrap_all(children)),
            (
                Widget::Padding { child, .. }
                | Widget::Marquee { child, .. }
                | Widget::Transformation { child, .. },
                "child",
            ) => Some(wrap(&**child)),
            (Widget::Box { child, .. } | Widget::Circle { child, .. }, "child") => {
                Some(child.as_deref().map(wrap).unwrap_or(Value::None))
            }
            (
                Widget::Box { width, .. }
                | Widget::WrappedText { width, .. }
                | Widget::Marquee { width, .. }
                | Widget::Image { width, .. },
                "width",
            ) => Some(Value::from(*width)),
            (
                Widget::Box { height, .. }
                | Widget::Text { height, .. }
                | Widget::WrappedText { height, .. }
                | Widget::Marquee { height, .. }
                | Widget::Image { height, .. },
                "height",
            ) => Some(Value::from(*height)),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// `render.Root`, the only rootable value.
#[derive(Debug, Clone)]
pub struct RootValue(pub Root);

impl Rootable for RootValue {
    fn as_render_root(&self) -> Root {
        self.0.clone()
    }
}

impl Object for RootValue {
    fn type_name(&self) -> &str {
        "render.Root"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "child" => Some(Value::object(WidgetValue(self.0.child.clone()))),
            "delay" => Some(self.0.delay.into()),
            "max_age" => Some(self.0.max_age.into()),
            "show_full_animation" => Some(self.0.show_full_animation.into()),
            _ => None,
        }
    }

    fn attr_names(&self) -> Vec<String> {
        ["child", "delay", "max_age", "show_full_animation"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn as_rootable(&self) -> Option<&dyn Rootable> {
        Some(self)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

pub(crate) fn widget_arg(function: &str, param: &str, value: Value) -> Result<Widget, EvalError> {
    match value.downcast_ref::<WidgetValue>() {
        Some(widget) => Ok(widget.0.clone()),
        None => Err(EvalError::msg(format!(
            "{function}: for parameter {param}: got {}, want Widget",
            value.type_name()
        ))),
    }
}

pub(crate) fn required_child(p: &mut ArgParser, function: &str) -> Result<Widget, EvalError> {
    widget_arg(function, "child", p.required("child")?)
}

fn optional_child(p: &mut ArgParser, function: &str) -> Result<Option<Box<Widget>>, EvalError> {
    p.optional::<Value>("child")?
        .map(|v| widget_arg(function, "child", v).map(Box::new))
        .transpose()
}

fn children(p: &mut ArgParser, function: &str) -> Result<Vec<Widget>, EvalError> {
    let values: Vec<Value> = p.required("children")?;
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| widget_arg(function, &format!("children[{i}]"), v))
        .collect()
}

fn parse_enum<T: FromStr>(function: &str, param: &str, raw: &str) -> Result<T, EvalError> {
    T::from_str(raw).map_err(|_| EvalError::msg(format!("{function}: invalid {param} {raw:?}")))
}

fn pad_arg(function: &str, value: Option<Value>) -> Result<Insets, EvalError> {
    match value {
        None => Ok(Insets::default()),
        Some(Value::Int(pad)) => i32::try_from(pad)
            .map(Insets::uniform)
            .map_err(|_| EvalError::msg(format!("{function}: pad out of range"))),
        Some(Value::Tuple(items) | Value::List(items)) if items.len() == 4 => {
            let mut sides = [0i32; 4];
            for (side, item) in sides.iter_mut().zip(items) {
                *side = item
                    .as_int()
                    .and_then(|i| i32::try_from(i).ok())
                    .ok_or_else(|| EvalError::msg(format!("{function}: pad must contain ints")))?;
            }
            Ok(Insets {
                left: sides[0],
                top: sides[1],
                right: sides[2],
                bottom: sides[3],
            })
        }
        Some(other) => Err(EvalError::msg(format!(
            "{function}: pad must be int or 4-tuple, got {}",
            other.type_name()
        ))),
    }
}

fn widget(w: Widget) -> Value {
    Value::object(WidgetValue(w))
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

pub fn load_module() -> Bindings {
    ModuleBuilder::new("render")
        .function("Root", root)
        .function("Box", box_widget)
        .function("Text", text)
        .function("WrappedText", wrapped_text)
        .function("Row", |_t, args| vector("render.Row", args, true))
        .function("Column", |_t, args| vector("render.Column", args, false))
        .function("Stack", |_t, args| {
            let mut p = args.parser("render.Stack");
            let children = children(&mut p, "render.Stack")?;
            p.finish()?;
            Ok(widget(Widget::Stack { children }))
        })
        .function("Padding", padding)
        .function("Marquee", marquee)
        .function("Circle", circle)
        .function("Image", image)
        .function("Animation", |_t, args| {
            let mut p = args.parser("render.Animation");
            let children = children(&mut p, "render.Animation")?;
            p.finish()?;
            Ok(widget(Widget::Animation { children }))
        })
        .function("Sequence", |_t, args| {
            let mut p = args.parser("render.Sequence");
            let children = children(&mut p, "render.Sequence")?;
            p.finish()?;
            Ok(widget(Widget::Sequence { children }))
        })
        .build()
}

fn root(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("render.Root");
    let child = required_child(&mut p, "render.Root")?;
    let delay: u32 = p.or_default("delay", 0)?;
    let max_age: u32 = p.or_default("max_age", 0)?;
    let show_full_animation: bool = p.or_default("show_full_animation", false)?;
    p.finish()?;
    Ok(Value::object(RootValue(Root {
        child,
        delay,
        max_age,
        show_full_animation,
    })))
}

fn box_widget(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("render.Box");
    let child = optional_child(&mut p, "render.Box")?;
    let width: i32 = p.or_default("width", 0)?;
    let height: i32 = p.or_default("height", 0)?;
    let padding: i32 = p.or_default("padding", 0)?;
    let color: Option<String> = p.optional("color")?;
    p.finish()?;
    Ok(widget(Widget::Box {
        child,
        width,
        height,
        padding,
        color,
    }))
}

fn text(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("render.Text");
    let content: String = p.required("content")?;
    let font: String = p.or_default("font", DEFAULT_FONT.to_string())?;
    let height: i32 = p.or_default("height", 0)?;
    let offset: i32 = p.or_default("offset", 0)?;
    let color: String = p.or_default("color", DEFAULT_COLOR.to_string())?;
    p.finish()?;
    Ok(widget(Widget::Text {
        content,
        font,
        color,
        height,
        offset,
    }))
}

fn wrapped_text(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("render.WrappedText");
    let content: String = p.required("content")?;
    let font: String = p.or_default("font", DEFAULT_FONT.to_string())?;
    let height: i32 = p.or_default("height", 0)?;
    let width: i32 = p.or_default("width", 0)?;
    let linespacing: i32 = p.or_default("linespacing", 0)?;
    let color: String = p.or_default("color", DEFAULT_COLOR.to_string())?;
    let align: String = p.or_default("align", "left".to_string())?;
    p.finish()?;
    if !matches!(align.as_str(), "left" | "center" | "right") {
        return Err(EvalError::msg(format!(
            "render.WrappedText: invalid align {align:?}"
        )));
    }
    Ok(widget(Widget::WrappedText {
        content,
        font,
        color,
        width,
        height,
        linespacing,
        align,
    }))
}

fn vector(function: &str, args: Arguments, row: bool) -> Result<Value, EvalError> {
    let mut p = args.parser(function);
    let children = children(&mut p, function)?;
    let main_align: MainAlign = parse_enum(
        function,
        "main_align",
        &p.or_default("main_align", "start".to_string())?,
    )?;
    let cross_align: CrossAlign = parse_enum(
        function,
        "cross_align",
        &p.or_default("cross_align", "start".to_string())?,
    )?;
    let expanded: bool = p.or_default("expanded", false)?;
    p.finish()?;
    Ok(widget(if row {
        Widget::Row {
            children,
            main_align,
            cross_align,
            expanded,
        }
    } else {
        Widget::Column {
            children,
            main_align,
            cross_align,
            expanded,
        }
    }))
}

fn padding(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("render.Padding");
    let child = required_child(&mut p, "render.Padding")?;
    let pad = pad_arg("render.Padding", p.optional("pad")?)?;
    let expanded: bool = p.or_default("expanded", false)?;
    let color: Option<String> = p.optional("color")?;
    p.finish()?;
    Ok(widget(Widget::Padding {
        child: Box::new(child),
        pad,
        expanded,
        color,
    }))
}

fn marquee(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("render.Marquee");
    let child = required_child(&mut p, "render.Marquee")?;
    let width: i32 = p.or_default("width", 0)?;
    let height: i32 = p.or_default("height", 0)?;
    let offset_start: i32 = p.or_default("offset_start", 0)?;
    let offset_end: i32 = p.or_default("offset_end", 0)?;
    let scroll_direction: ScrollDirection = parse_enum(
        "render.Marquee",
        "scroll_direction",
        &p.or_default("scroll_direction", "horizontal".to_string())?,
    )?;
    p.finish()?;
    Ok(widget(Widget::Marquee {
        child: Box::new(child),
        width,
        height,
        offset_start,
        offset_end,
        scroll_direction,
    }))
}

fn circle(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("render.Circle");
    let child = optional_child(&mut p, "render.Circle")?;
    let diameter: i32 = p.required("diameter")?;
    let color: String = p.required("color")?;
    p.finish()?;
    if diameter <= 0 {
        return Err(EvalError::msg("render.Circle: diameter must be positive"));
    }
    Ok(widget(Widget::Circle {
        child,
        diameter,
        color,
    }))
}

fn image(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("render.Image");
    let src = match p.required::<Value>("src")? {
        Value::String(s) => s.into_bytes(),
        Value::Bytes(b) => b,
        other => {
            return Err(EvalError::msg(format!(
                "render.Image: for parameter src: got {}, want string or bytes",
                other.type_name()
            )))
        }
    };
    let width: i32 = p.or_default("width", 0)?;
    let height: i32 = p.or_default("height", 0)?;
    p.finish()?;
    Ok(widget(Widget::Image { src, width, height }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(name: &str) -> Value {
        load_module()["render"].get_attr(name).unwrap()
    }

    fn call(name: &str, args: Arguments) -> Result<Value, EvalError> {
        render(name).call(&mut Thread::new("t"), args)
    }

    #[test]
    fn root_is_rootable_and_widgets_are_not() {
        let text = call("Text", Arguments::positional(vec!["hi".into()])).unwrap();
        let root = call("Root", Arguments::none().with_named("child", text.clone())).unwrap();
        match &root {
            Value::Object(obj) => {
                let converted = obj.as_rootable().unwrap().as_render_root();
                assert_eq!(converted.child.kind(), "Text");
            }
            other => panic!("unexpected {other:?}"),
        }
        match &text {
            Value::Object(obj) => assert!(obj.as_rootable().is_none()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(text.type_name(), "render.Text");
        assert_eq!(text.attr("content"), Some(Value::from("hi")));
    }

    #[test]
    fn row_validates_alignment() {
        let child = call("Box", Arguments::none()).unwrap();
        let err = call(
            "Row",
            Arguments::positional(vec![vec![child].into()]).with_named("main_align", "middle"),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "render.Row: invalid main_align \"middle\"");
    }

    #[test]
    fn children_must_be_widgets() {
        let err = call(
            "Column",
            Arguments::positional(vec![vec![Value::Int(3)].into()]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("children[0]: got int, want Widget"));
    }

    #[test]
    fn padding_accepts_int_or_four_sides() {
        let child = call("Box", Arguments::none()).unwrap();
        let uniform = call(
            "Padding",
            Arguments::positional(vec![child.clone()]).with_named("pad", 2i64),
        )
        .unwrap();
        match &uniform.downcast_ref::<WidgetValue>().unwrap().0 {
            Widget::Padding { pad, .. } => assert_eq!(*pad, Insets::uniform(2)),
            other => panic!("unexpected {other:?}"),
        }
        let sides = Value::Tuple(vec![1i64.into(), 2i64.into(), 3i64.into(), 4i64.into()]);
        let explicit = call(
            "Padding",
            Arguments::positional(vec![child]).with_named("pad", sides),
        )
        .unwrap();
        match &explicit.downcast_ref::<WidgetValue>().unwrap().0 {
            Widget::Padding { pad, .. } => {
                assert_eq!((pad.left, pad.top, pad.right, pad.bottom), (1, 2, 3, 4))
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
