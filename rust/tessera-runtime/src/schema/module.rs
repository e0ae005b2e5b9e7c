//! `schema.star`: constructors for schema values.

use super::options::{options_from_value, OptionValue, SchemaOption};
use super::{Field, FieldKind, ReturnKind};
use std::collections::BTreeMap;
use tessera_core::{
    ArgParser, Arguments, Bindings, EvalError, Function, ModuleBuilder, Object, Struct, Thread,
    Value,
};

// ---------------------------------------------------------------------------
// Script values
// ---------------------------------------------------------------------------

/// `schema.Handler`: a function together with its declared return kind.
#[derive(Debug, Clone)]
pub struct HandlerValue {
    pub function: Function,
    pub kind: ReturnKind,
}

impl Object for HandlerValue {
    fn type_name(&self) -> &str {
        "schema.Handler"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "handler" => Some(Value::Function(self.function.clone())),
            "type" => Some(Value::Int(self.kind.as_i64())),
            _ => None,
        }
    }

    fn attr_names(&self) -> Vec<String> {
        vec!["handler".to_string(), "type".to_string()]
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A schema field, with the handler it registers if any.
#[derive(Debug, Clone)]
pub struct FieldValue {
    pub field: Field,
    pub handler: Option<HandlerValue>,
}

impl Object for FieldValue {
    fn type_name(&self) -> &str {
        qualified(self.field.kind)
    }

    fn attr(&self, name: &str) -> Option<Value> {
        let f = &self.field;
        match name {
            "id" => Some(f.id.as_str().into()),
            "name" => Some(f.name.as_str().into()),
            "desc" => Some(f.description.as_str().into()),
            "icon" => Some(f.icon.as_str().into()),
            "default" => Some(f.default.clone().into()),
            "handler" => Some(
                self.handler
                    .as_ref()
                    .map(|h| Value::Function(h.function.clone()))
                    .unwrap_or(Value::None),
            ),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// `schema.Schema` before it is validated against the defining file.
#[derive(Debug, Clone)]
pub struct SchemaValue {
    pub version: String,
    pub fields: Vec<FieldValue>,
    pub handlers: Vec<HandlerValue>,
}

impl Object for SchemaValue {
    fn type_name(&self) -> &str {
        "schema.Schema"
    }

    fn attr(&self, name: &str) -> Option<Value> {
        match name {
            "version" => Some(self.version.as_str().into()),
            "fields" => Some(Value::List(
                self.fields.iter().cloned().map(Value::object).collect(),
            )),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

pub fn load_module() -> Bindings {
    let mut handler_types = BTreeMap::new();
    for kind in [ReturnKind::Options, ReturnKind::Schema, ReturnKind::String] {
        let name = match kind {
            ReturnKind::Options => "Options",
            ReturnKind::Schema => "Schema",
            ReturnKind::String => "String",
        };
        handler_types.insert(name.to_string(), Value::Int(kind.as_i64()));
    }

    ModuleBuilder::new("schema")
        .value("HandlerType", Struct::new(handler_types))
        .function("Schema", schema)
        .function("Handler", handler)
        .function("Option", option)
        .function("Toggle", |_t, args| {
            simple(args, FieldKind::Toggle, |p| {
                Ok(Some(p.or_default("default", false)?.to_string()))
            })
        })
        .function("Text", |_t, args| {
            simple(args, FieldKind::Text, |p| p.optional::<String>("default"))
        })
        .function("Color", color)
        .function("Dropdown", dropdown)
        .function("DateTime", |_t, args| simple(args, FieldKind::DateTime, |_| Ok(None)))
        .function("Location", |_t, args| simple(args, FieldKind::Location, |_| Ok(None)))
        .function("PhotoSelect", |_t, args| {
            simple(args, FieldKind::PhotoSelect, |_| Ok(None))
        })
        .function("LocationBased", |_t, args| {
            with_handler(args, FieldKind::LocationBased, ReturnKind::Options)
        })
        .function("Typeahead", |_t, args| {
            with_handler(args, FieldKind::Typeahead, ReturnKind::Options)
        })
        .function("Generated", generated)
        .function("OAuth2", oauth2)
        .build()
}

fn qualified(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Toggle => "schema.Toggle",
        FieldKind::Text => "schema.Text",
        FieldKind::Dropdown => "schema.Dropdown",
        FieldKind::Color => "schema.Color",
        FieldKind::DateTime => "schema.DateTime",
        FieldKind::Location => "schema.Location",
        FieldKind::LocationBased => "schema.LocationBased",
        FieldKind::Typeahead => "schema.Typeahead",
        FieldKind::Generated => "schema.Generated",
        FieldKind::OAuth2 => "schema.OAuth2",
        FieldKind::PhotoSelect => "schema.PhotoSelect",
    }
}

/// Parse the `id`, `name`, `desc`, `icon` parameters shared by every
/// user-facing field.
fn common(p: &mut ArgParser, kind: FieldKind) -> Result<Field, EvalError> {
    let mut field = Field::new(kind, p.required::<String>("id")?);
    field.name = p.required("name")?;
    field.description = p.required("desc")?;
    field.icon = p.required("icon")?;
    Ok(field)
}

fn field_value(field: Field, handler: Option<HandlerValue>) -> Value {
    Value::object(FieldValue { field, handler })
}

fn simple(
    args: Arguments,
    kind: FieldKind,
    default: impl FnOnce(&mut ArgParser) -> Result<Option<String>, EvalError>,
) -> Result<Value, EvalError> {
    let mut p = args.parser(qualified(kind));
    let mut field = common(&mut p, kind)?;
    field.default = default(&mut p)?;
    p.finish()?;
    Ok(field_value(field, None))
}

fn with_handler(args: Arguments, kind: FieldKind, returns: ReturnKind) -> Result<Value, EvalError> {
    let mut p = args.parser(qualified(kind));
    let mut field = common(&mut p, kind)?;
    let function: Function = p.required("handler")?;
    p.finish()?;
    field.handler = function.name().to_string();
    Ok(field_value(
        field,
        Some(HandlerValue {
            function,
            kind: returns,
        }),
    ))
}

fn schema(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("schema.Schema");
    let version: String = p.required("version")?;
    let fields: Vec<Value> = p.or_default("fields", Vec::new())?;
    let handlers: Vec<Value> = p.or_default("handlers", Vec::new())?;
    p.finish()?;

    let fields = fields
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.downcast_ref::<FieldValue>().cloned().ok_or_else(|| {
                EvalError::msg(format!(
                    "schema.Schema: fields[{i}]: expected schema field, got {}",
                    v.type_name()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let handlers = handlers
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.downcast_ref::<HandlerValue>().cloned().ok_or_else(|| {
                EvalError::msg(format!(
                    "schema.Schema: handlers[{i}]: expected schema.Handler, got {}",
                    v.type_name()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::object(SchemaValue {
        version,
        fields,
        handlers,
    }))
}

fn handler(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("schema.Handler");
    let function: Function = p.required("handler")?;
    let raw: i64 = p.required("type")?;
    p.finish()?;
    let kind = ReturnKind::from_i64(raw)
        .ok_or_else(|| EvalError::msg(format!("schema.Handler: invalid handler type {raw}")))?;
    Ok(Value::object(HandlerValue { function, kind }))
}

fn option(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("schema.Option");
    let display: String = p.required("display")?;
    let value: String = p.required("value")?;
    p.finish()?;
    Ok(Value::object(OptionValue(SchemaOption { display, value })))
}

fn color(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("schema.Color");
    let mut field = common(&mut p, FieldKind::Color)?;
    let default: String = p.required("default")?;
    field.palette = p.or_default("palette", Vec::new())?;
    p.finish()?;
    for color in std::iter::once(&default).chain(field.palette.iter()) {
        if !is_hex_color(color) {
            return Err(EvalError::msg(format!(
                "schema.Color: invalid color {color:?}"
            )));
        }
    }
    field.default = Some(default);
    Ok(field_value(field, None))
}

fn is_hex_color(color: &str) -> bool {
    let Some(hex) = color.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

fn dropdown(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("schema.Dropdown");
    let mut field = common(&mut p, FieldKind::Dropdown)?;
    let default: String = p.required("default")?;
    let options: Value = p.required("options")?;
    p.finish()?;
    field.options = options_from_value(&options)
        .map_err(|e| EvalError::msg(format!("schema.Dropdown: {e}")))?;
    if !field.options.iter().any(|o| o.value == default) {
        return Err(EvalError::msg(format!(
            "schema.Dropdown: default {default:?} is not one of the options"
        )));
    }
    field.default = Some(default);
    Ok(field_value(field, None))
}

fn generated(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("schema.Generated");
    let id: String = p.required("id")?;
    let source: String = p.required("source")?;
    let function: Function = p.required("handler")?;
    p.finish()?;
    let mut field = Field::new(FieldKind::Generated, id);
    field.source = source;
    field.handler = function.name().to_string();
    Ok(field_value(
        field,
        Some(HandlerValue {
            function,
            kind: ReturnKind::Schema,
        }),
    ))
}

fn oauth2(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("schema.OAuth2");
    let mut field = common(&mut p, FieldKind::OAuth2)?;
    let function: Function = p.required("handler")?;
    field.client_id = p.required("client_id")?;
    field.authorization_endpoint = p.required("authorization_endpoint")?;
    field.scopes = p.required("scopes")?;
    p.finish()?;
    field.handler = function.name().to_string();
    Ok(field_value(
        field,
        Some(HandlerValue {
            function,
            kind: ReturnKind::String,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Arguments) -> Result<Value, EvalError> {
        load_module()["schema"]
            .get_attr(name)?
            .call(&mut Thread::new("t"), args)
    }

    fn foobar() -> Function {
        Function::native("foobar", |_t, _a| Ok("derp".into()))
    }

    #[test]
    fn handler_exposes_function_and_type() {
        let string_kind = load_module()["schema"]
            .get_attr("HandlerType")
            .unwrap()
            .get_attr("String")
            .unwrap();
        let f = foobar();
        let h = call(
            "Handler",
            Arguments::none()
                .with_named("handler", f.clone())
                .with_named("type", string_kind.clone()),
        )
        .unwrap();
        assert_eq!(h.attr("handler"), Some(Value::Function(f)));
        assert_eq!(h.attr("type"), Some(string_kind));
    }

    #[test]
    fn handler_rejects_bad_params() {
        let err = call(
            "Handler",
            Arguments::none()
                .with_named("handler", "foobar")
                .with_named("type", 2i64),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "schema.Handler: for parameter handler: got string, want function"
        );
        let err = call(
            "Handler",
            Arguments::none()
                .with_named("handler", foobar())
                .with_named("type", 42i64),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "schema.Handler: invalid handler type 42");
    }

    #[test]
    fn dropdown_default_must_be_an_option() {
        let opt = call(
            "Option",
            Arguments::none()
                .with_named("display", "Red")
                .with_named("value", "#f00"),
        )
        .unwrap();
        let args = |default: &str| {
            Arguments::none()
                .with_named("id", "c")
                .with_named("name", "Colour")
                .with_named("desc", "Pick")
                .with_named("icon", "brush")
                .with_named("default", default)
                .with_named("options", vec![opt.clone()])
        };
        assert!(call("Dropdown", args("#f00")).is_ok());
        assert!(call("Dropdown", args("#0f0")).is_err());
    }

    #[test]
    fn color_validates_hex() {
        assert!(is_hex_color("#a1b2c3"));
        assert!(is_hex_color("#fff"));
        assert!(!is_hex_color("red"));
        assert!(!is_hex_color("#ggg"));
    }

    #[test]
    fn field_type_names() {
        assert_eq!(qualified(FieldKind::Toggle), "schema.Toggle");
        assert_eq!(qualified(FieldKind::Typeahead), "schema.Typeahead");
        assert_eq!(qualified(FieldKind::OAuth2), "schema.OAuth2");
    }
}
