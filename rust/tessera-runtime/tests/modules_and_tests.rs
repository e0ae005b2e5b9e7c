//! Embedder module overrides and applet test functions.

use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::value::module_bindings;
use tessera_core::{Arguments, EvalError, NativeInterpreter, Value};
use tessera_runtime::{Applet, CancelScope, LoadError, MemoryFs, ModuleError, ModuleRegistry};

fn fs() -> MemoryFs {
    MemoryFs::new().with_file("app.star", "")
}

fn with_registry(interpreter: NativeInterpreter, registry: ModuleRegistry) -> Result<Applet, LoadError> {
    Applet::builder("app", Arc::new(interpreter))
        .registry(Arc::new(registry))
        .load(&fs())
}

fn weather_override() -> ModuleRegistry {
    ModuleRegistry::builtin().with_override(|_thread, module| {
        if module != "weather.star" {
            return Err(EvalError::msg(format!("no override for {module}")));
        }
        let mut members = BTreeMap::new();
        members.insert("version".to_string(), Value::from("1.0"));
        Ok(module_bindings("weather", members))
    })
}

// ─── overrides ───

#[test]
fn override_serves_modules_missing_from_the_table() {
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        let weather = unit.load_one("weather.star", "weather")?;
        unit.export("weather_version", weather.get_attr("version")?);
        unit.def("main", 2, 0, |_t, _a| Ok(Value::List(vec![])));
        Ok(())
    });
    let applet = with_registry(interpreter, weather_override()).unwrap();
    assert_eq!(
        applet.exports("app.star").and_then(|e| e.get("weather_version")),
        Some(&Value::from("1.0"))
    );
}

#[test]
fn failing_override_falls_through_to_builtins() {
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        let render = unit.load_one("render.star", "render")?;
        assert!(render.attr("Root").is_some());
        unit.def("main", 2, 0, |_t, _a| Ok(Value::List(vec![])));
        Ok(())
    });
    assert!(with_registry(interpreter, weather_override()).is_ok());
}

#[test]
fn names_unknown_to_both_are_invalid() {
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        unit.load_one("barcode.star", "barcode")?;
        unit.def("main", 2, 0, |_t, _a| Ok(Value::List(vec![])));
        Ok(())
    });
    let err = with_registry(interpreter, weather_override()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Module(ModuleError::Invalid(ref name)) if name == "barcode.star"
    ));
}

#[test]
fn override_applies_only_to_its_applet() {
    let interpreter = || {
        NativeInterpreter::new().program("app.star", |unit| {
            unit.load_one("weather.star", "weather")?;
            unit.def("main", 2, 0, |_t, _a| Ok(Value::List(vec![])));
            Ok(())
        })
    };
    assert!(with_registry(interpreter(), weather_override()).is_ok());
    assert!(Applet::builder("app", Arc::new(interpreter())).load(&fs()).is_err());
}

// ─── test functions ───

#[test]
fn test_functions_report_every_failed_assertion() {
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        let assert = unit.load_one("assert.star", "assert")?;
        unit.def("main", 2, 0, |_t, _a| Ok(Value::List(vec![])));

        let passing = assert.clone();
        unit.def("test_sum", 5, 0, move |thread, _args| {
            passing
                .get_attr("eq")?
                .call(thread, Arguments::positional(vec![2i64.into(), 2i64.into()]))
        });

        let failing = assert.clone();
        unit.def("test_words", 9, 0, move |thread, _args| {
            let eq = failing.get_attr("eq")?;
            eq.call(thread, Arguments::positional(vec![1i64.into(), 2i64.into()]))?;
            eq.call(
                thread,
                Arguments::positional(vec!["a".into(), "b".into()])
                    .with_named("msg", "words differ"),
            )
        });

        unit.def("test_crash", 14, 0, |_t, _a| Err(EvalError::msg("index out of range")));
        unit.def("helper", 18, 0, |_t, _a| Ok(Value::None));
        Ok(())
    });
    let applet = Applet::builder("app", Arc::new(interpreter)).load(&fs()).unwrap();
    let outcomes = applet.run_tests(&CancelScope::new());

    let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["app.star/test_crash", "app.star/test_sum", "app.star/test_words"]
    );

    assert_eq!(outcomes[0].failures.len(), 1);
    assert!(outcomes[0].failures[0].ends_with("Error in test_crash: index out of range"));
    assert!(outcomes[1].passed());
    assert_eq!(outcomes[2].failures, vec!["1 != 2".to_string(), "words differ".to_string()]);
}

#[test]
fn assertions_fail_the_call_outside_tests() {
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        let assert = unit.load_one("assert.star", "assert")?;
        unit.def("main", 4, 0, move |thread, _args| {
            assert
                .get_attr("eq")?
                .call(thread, Arguments::positional(vec![1i64.into(), 2i64.into()]))?;
            Ok(Value::List(vec![]))
        });
        Ok(())
    });
    let applet = Applet::builder("app", Arc::new(interpreter)).load(&fs()).unwrap();
    let err = applet.run(&CancelScope::new()).unwrap_err();
    assert!(err.to_string().ends_with("1 != 2"));
}
