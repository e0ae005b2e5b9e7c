//! `math.star`: floating point helpers.

use tessera_core::{Arguments, Bindings, EvalError, ModuleBuilder, Thread, Value};

pub fn load_module() -> Bindings {
    let mut module = ModuleBuilder::new("math")
        .value("pi", std::f64::consts::PI)
        .value("e", std::f64::consts::E)
        .value("inf", f64::INFINITY)
        .function("ceil", |_t, args| round_to_int("math.ceil", args, f64::ceil))
        .function("floor", |_t, args| round_to_int("math.floor", args, f64::floor))
        .function("pow", pow)
        .function("log", log)
        .function("atan2", atan2)
        .function("hypot", hypot)
        .function("mod", fmod);

    let unary: [(&str, fn(f64) -> f64); 13] = [
        ("round", f64::round),
        ("sqrt", f64::sqrt),
        ("exp", f64::exp),
        ("fabs", f64::abs),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("degrees", f64::to_degrees),
        ("radians", f64::to_radians),
        ("trunc", f64::trunc),
    ];
    for (name, f) in unary {
        let qualified = format!("math.{name}");
        module = module.function(name, move |_t: &mut Thread, args: Arguments| {
            let mut p = args.parser(&qualified);
            let x: f64 = p.required("x")?;
            p.finish()?;
            Ok(Value::Float(f(x)))
        });
    }
    module.build()
}

fn round_to_int(name: &str, args: Arguments, f: fn(f64) -> f64) -> Result<Value, EvalError> {
    let mut p = args.parser(name);
    let x: f64 = p.required("x")?;
    p.finish()?;
    let rounded = f(x);
    if !rounded.is_finite() || rounded.abs() > i64::MAX as f64 {
        return Err(EvalError::msg(format!("{name}: cannot convert {x} to int")));
    }
    Ok(Value::Int(rounded as i64))
}

fn binary(name: &str, args: Arguments, a: &str, b: &str) -> Result<(f64, f64), EvalError> {
    let mut p = args.parser(name);
    let x: f64 = p.required(a)?;
    let y: f64 = p.required(b)?;
    p.finish()?;
    Ok((x, y))
}

fn pow(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let (x, y) = binary("math.pow", args, "x", "y")?;
    Ok(Value::Float(x.powf(y)))
}

fn atan2(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let (y, x) = binary("math.atan2", args, "y", "x")?;
    Ok(Value::Float(y.atan2(x)))
}

fn hypot(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let (x, y) = binary("math.hypot", args, "x", "y")?;
    Ok(Value::Float(x.hypot(y)))
}

fn fmod(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let (x, y) = binary("math.mod", args, "x", "y")?;
    Ok(Value::Float(x % y))
}

fn log(_thread: &mut Thread, args: Arguments) -> Result<Value, EvalError> {
    let mut p = args.parser("math.log");
    let x: f64 = p.required("x")?;
    let base: Option<f64> = p.optional("base")?;
    p.finish()?;
    Ok(Value::Float(match base {
        Some(base) => x.log(base),
        None => x.ln(),
    }))
}
