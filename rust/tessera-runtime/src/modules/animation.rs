//! `animation.star`: keyframe transformations of a child widget.

use crate::modules::render::{required_child, WidgetValue};
use tessera_core::render::{Keyframe, Transform};
use tessera_core::{Arguments, Bindings, EvalError, ModuleBuilder, Object, Thread, Value, Widget};

const CURVES: [&str; 4] = ["linear", "ease_in", "ease_out", "ease_in_out"];

#[derive(Debug, Clone)]
pub struct KeyframeValue(pub Keyframe);

impl Object for KeyframeValue {
    fn type_name(&self) -> &str {
        "animation.Keyframe"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "percentage" => Some(self.0.percentage.into()),
            "curve" => Some(self.0.curve.as_str().into()),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransformValue(pub Transform);

impl Object for TransformValue {
    fn type_name(&self) -> &str {
        match self.0 {
            Transform::Rotate { .. } => "animation.Rotate",
            Transform::Scale { .. } => "animation.Scale",
            Transform::Translate { .. } => "animation.Translate",
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OriginValue {
    pub x: f64,
    pub y: f64,
}

impl Object for OriginValue {
    fn type_name(&self) -> &str {
        "animation.Origin"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(self.x.into()),
            "y" => Some(self.y.into()),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("animation")
        .function("Transformation", transformation)
        .function("Keyframe", keyframe)
        .function("Rotate", |_t, args| {
            let mut p = args.parser("animation.Rotate");
            let angle: f64 = p.required("angle")?;
            p.finish()?;
            Ok(Value::object(TransformValue(Transform::Rotate { angle })))
        })
        .function("Scale", |_t, args| {
            let (x, y) = xy("animation.Scale", args)?;
            Ok(Value::object(TransformValue(Transform::Scale { x, y })))
        })
        .function("Translate", |_t, args| {
            let (x, y) = xy("animation.Translate", args)?;
            Ok(Value::object(TransformValue(Transform::Translate { x, y })))
        })
        .function("Origin", |_t, args| {
            let (x, y) = xy("animation.Origin", args)?;
            Ok(Value::object(OriginValue { x, y }))
        })
        .build()
}

fn xy(function: &str, args: Arguments) -> Result<(f64, f64), EvalError> {
    let mut p = args.parser(function);
    let x: f64 = p.required("x")?;
    let y: f64 = p.required("y")?;
    p.finish()?;
    Ok((x, y))
}

fn keyframe(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("animation.Keyframe");
    let percentage: f64 = p.required("percentage")?;
    let transforms: Vec<Value> = p.required("transforms")?;
    let curve: String = p.or_default("curve", "linear".to_string())?;
    p.finish()?;
    if !(0.0..=1.0).contains(&percentage) {
        return Err(EvalError::msg(format!(
            "animation.Keyframe: percentage must be between 0.0 and 1.0, got {percentage}"
        )));
    }
    if !CURVES.contains(&curve.as_str()) && !curve.starts_with("cubic-bezier(") {
        return Err(EvalError::msg(format!(
            "animation.Keyframe: unknown curve {curve:?}"
        )));
    }
    let transforms = transforms
        .into_iter()
        .map(|v| match v.downcast_ref::<TransformValue>() {
            Some(t) => Ok(t.0.clone()),
            None => Err(EvalError::msg(format!(
                "animation.Keyframe: expected transform, got {}",
                v.type_name()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::object(KeyframeValue(Keyframe {
        percentage,
        transforms,
        curve,
    })))
}

fn transformation(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("animation.Transformation");
    let child = required_child(&mut p, "animation.Transformation")?;
    let keyframes: Vec<Value> = p.required("keyframes")?;
    let duration: i32 = p.or_default("duration", 0)?;
    let delay: i32 = p.or_default("delay", 0)?;
    let origin = match p.optional::<Value>("origin")? {
        None => (0.5, 0.5),
        Some(v) => match v.downcast_ref::<OriginValue>() {
            Some(o) => (o.x, o.y),
            None => {
                return Err(EvalError::msg(format!(
                    "animation.Transformation: for parameter origin: got {}, want animation.Origin",
                    v.type_name()
                )))
            }
        },
    };
    let wait_for_child: bool = p.or_default("wait_for_child", false)?;
    p.finish()?;

    let keyframes = keyframes
        .into_iter()
        .map(|v| match v.downcast_ref::<KeyframeValue>() {
            Some(k) => Ok(k.0.clone()),
            None => Err(EvalError::msg(format!(
                "animation.Transformation: expected keyframe, got {}",
                v.type_name()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if duration < 0 || delay < 0 {
        return Err(EvalError::msg(
            "animation.Transformation: duration and delay must be non-negative",
        ));
    }
    Ok(Value::object(WidgetValue(Widget::Transformation {
        child: Box::new(child),
        keyframes,
        duration,
        delay,
        origin,
        wait_for_child,
    })))
}
