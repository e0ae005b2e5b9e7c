//! Invoking `main`: return-value classification, failures, cancellation,
//! configuration and the capabilities attached to each execution context.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tessera_core::{Arguments, EvalError, NativeInterpreter, Thread, Value, Widget};
use tessera_runtime::{
    Applet, CallError, CancelScope, HostConfig, InMemoryCache, MemoryFs, DEADLINE_EXCEEDED,
};

fn root(thread: &mut Thread, render: &Value, content: &str) -> Result<Value, EvalError> {
    let text = render
        .get_attr("Text")?
        .call(thread, Arguments::positional(vec![content.into()]))?;
    render
        .get_attr("Root")?
        .call(thread, Arguments::none().with_named("child", text))
}

/// An applet whose `main` is `body`, with `render` loaded.
fn applet_with_main<F>(body: F) -> Applet
where
    F: Fn(&mut Thread, &Value, Arguments) -> Result<Value, EvalError> + Send + Sync + Clone + 'static,
{
    let interpreter = NativeInterpreter::new().program("app.star", move |unit| {
        let render = unit.load_one("render.star", "render")?;
        let body = body.clone();
        unit.def("main", 4, 0, move |thread, args| body(thread, &render, args));
        Ok(())
    });
    Applet::from_source("app", Arc::new(interpreter), "").expect("applet should load")
}

fn text_of(root: &tessera_core::Root) -> Option<&str> {
    match &root.child {
        Widget::Text { content, .. } => Some(content.as_str()),
        _ => None,
    }
}

// ─── return values ───

#[test]
fn single_root() {
    let applet = applet_with_main(|thread, render, _| root(thread, render, "hi"));
    let roots = applet.run(&CancelScope::new()).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(text_of(&roots[0]), Some("hi"));
}

#[test]
fn list_and_tuple_of_roots() {
    let applet = applet_with_main(|thread, render, _| {
        Ok(Value::List(vec![
            root(thread, render, "one")?,
            root(thread, render, "two")?,
        ]))
    });
    let roots = applet.run(&CancelScope::new()).unwrap();
    let texts: Vec<_> = roots.iter().filter_map(text_of).collect();
    assert_eq!(texts, vec!["one", "two"]);

    let applet = applet_with_main(|thread, render, _| {
        Ok(Value::Tuple(vec![root(thread, render, "only")?]))
    });
    assert_eq!(applet.run(&CancelScope::new()).unwrap().len(), 1);
}

#[test]
fn empty_list_is_no_frames() {
    let applet = applet_with_main(|_, _, _| Ok(Value::List(vec![])));
    assert!(applet.run(&CancelScope::new()).unwrap().is_empty());
}

#[test]
fn wrong_return_type() {
    let applet = applet_with_main(|_, _, _| Ok(Value::Int(3)));
    let err = applet.run(&CancelScope::new()).unwrap_err();
    assert!(matches!(err, CallError::UnexpectedReturn { .. }));
    assert_eq!(
        err.to_string(),
        "expected app implementation to return Root(s) but found: int"
    );
}

#[test]
fn non_root_widget_is_not_enough() {
    let applet = applet_with_main(|thread, render, _| {
        render
            .get_attr("Text")?
            .call(thread, Arguments::positional(vec!["bare".into()]))
    });
    let err = applet.run(&CancelScope::new()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "expected app implementation to return Root(s) but found: render.Text"
    );
}

#[test]
fn wrong_element_reports_its_index() {
    let applet = applet_with_main(|thread, render, _| {
        Ok(Value::List(vec![root(thread, render, "ok")?, "oops".into()]))
    });
    let err = applet.run(&CancelScope::new()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "expected app implementation to return Root(s) but found: string (at index 1)"
    );
}

// ─── failures ───

#[test]
fn script_failure_has_a_backtrace() {
    let applet = applet_with_main(|thread, render, _| {
        render.get_attr("Root")?.call(thread, Arguments::none())
    });
    let err = applet.run(&CancelScope::new()).unwrap_err();
    let text = err.to_string();
    assert!(matches!(err, CallError::Eval { .. }));
    assert!(text.contains("app.star:4:1: in main"), "{text}");
    assert!(text.contains("render.Root: missing argument for child"), "{text}");
}

#[test]
fn panics_in_main_are_recovered() {
    let applet = applet_with_main(|_, _, _| -> Result<Value, EvalError> {
        panic!("index out of range")
    });
    let err = applet.run(&CancelScope::new()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "panic while running app: panic: index out of range"
    );
    // The applet stays usable after a panic.
    assert!(applet.run(&CancelScope::new()).is_err());
}

// ─── cancellation ───

fn spinning_main(thread: &mut Thread, _: &Value, _: Arguments) -> Result<Value, EvalError> {
    loop {
        thread.checkpoint()?;
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn deadline_cancels_a_running_call() {
    let applet = applet_with_main(spinning_main);
    let scope = CancelScope::with_timeout(Duration::from_millis(20));
    let err = applet.run(&scope).unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.cancel_cause(), Some(DEADLINE_EXCEEDED));
}

#[test]
fn cancelled_scope_fails_before_running() {
    let applet = applet_with_main(|_, _, _| -> Result<Value, EvalError> {
        panic!("must not run")
    });
    let scope = CancelScope::new();
    scope.cancel("host shutting down");
    let err = applet.run(&scope).unwrap_err();
    assert_eq!(err.cancel_cause(), Some("host shutting down"));
    assert_eq!(err.to_string(), "app: main cancelled: host shutting down");
}

#[test]
fn child_scope_follows_parent() {
    let applet = applet_with_main(spinning_main);
    let parent = CancelScope::new();
    let child = parent.child();
    let canceller = parent.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        canceller.cancel("parent done");
    });
    let err = applet.run(&child).unwrap_err();
    assert_eq!(err.cancel_cause(), Some("parent done"));
}

// ─── configuration ───

#[test]
fn main_with_a_parameter_receives_config() {
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        let render = unit.load_one("render.star", "render")?;
        unit.def("main", 3, 1, move |thread, args| {
            let config = args.positional.first().cloned().unwrap_or_default();
            let who = config
                .get_attr("str")?
                .call(thread, Arguments::positional(vec!["who".into(), "world".into()]))?;
            root(thread, &render, &format!("hello {who}"))
        });
        Ok(())
    });
    let applet = Applet::from_source("app", Arc::new(interpreter), "").unwrap();

    let roots = applet.run(&CancelScope::new()).unwrap();
    assert_eq!(text_of(&roots[0]), Some("hello world"));

    let mut config = BTreeMap::new();
    config.insert("who".to_string(), "tessera".to_string());
    let roots = applet
        .run_with_config(&CancelScope::new(), Some(&config))
        .unwrap();
    assert_eq!(text_of(&roots[0]), Some("hello tessera"));
}

#[test]
fn main_without_parameters_gets_no_arguments() {
    let applet = applet_with_main(|_, _, args| {
        assert!(args.is_empty());
        Ok(Value::List(vec![]))
    });
    let mut config = BTreeMap::new();
    config.insert("ignored".to_string(), "1".to_string());
    assert!(applet
        .run_with_config(&CancelScope::new(), Some(&config))
        .is_ok());
}

// ─── execution context ───

#[test]
fn print_goes_to_the_configured_sink() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        unit.def("main", 1, 0, |thread, _| {
            thread.print("rendering");
            Ok(Value::List(vec![]))
        });
        Ok(())
    });
    let applet = Applet::builder("printer", Arc::new(interpreter))
        .print(move |thread, msg| {
            sink.lock()
                .unwrap()
                .push(format!("{}: {}", thread.name(), msg))
        })
        .load(&MemoryFs::new().with_file("app.star", ""))
        .unwrap();
    applet.run(&CancelScope::new()).unwrap();
    applet.run(&CancelScope::new()).unwrap();
    assert_eq!(
        *lines.lock().unwrap(),
        vec!["printer: rendering", "printer: rendering"]
    );
}

#[test]
fn cache_persists_between_calls() {
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        let cache = unit.load_one("cache.star", "cache")?;
        unit.def("main", 2, 0, move |thread, _| {
            let hits = cache
                .get_attr("get")?
                .call(thread, Arguments::positional(vec!["hits".into()]))?;
            let next = match hits {
                Value::String(s) => s.parse::<i64>().unwrap_or(0) + 1,
                _ => 1,
            };
            cache.get_attr("set")?.call(
                thread,
                Arguments::positional(vec!["hits".into(), next.to_string().into()]),
            )?;
            Ok(Value::List(vec![]))
        });
        Ok(())
    });
    let cache = Arc::new(InMemoryCache::new(8));
    let applet = Applet::builder("counter", Arc::new(interpreter))
        .cache(cache.clone())
        .load(&MemoryFs::new().with_file("app.star", ""))
        .unwrap();
    for _ in 0..3 {
        applet.run(&CancelScope::new()).unwrap();
    }
    use tessera_runtime::Cache;
    assert_eq!(cache.get("counter/hits"), Some(b"3".to_vec()));
}

#[test]
fn seeded_random_is_reproducible_per_call() {
    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        let random = unit.load_one("random.star", "random")?;
        unit.def("main", 2, 0, move |thread, _| {
            let n = random.get_attr("number")?.call(
                thread,
                Arguments::positional(vec![Value::Int(0), Value::Int(1_000_000)]),
            )?;
            thread.print(&n.to_string());
            Ok(Value::List(vec![]))
        });
        Ok(())
    });
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let config = HostConfig::from_str("[applet]\nrandom_seed = 7\n").unwrap();
    let applet = Applet::builder("dice", Arc::new(interpreter))
        .config(&config)
        .print(move |_, msg| sink.lock().unwrap().push(msg.to_string()))
        .load(&MemoryFs::new().with_file("app.star", ""))
        .unwrap();
    applet.run(&CancelScope::new()).unwrap();
    applet.run(&CancelScope::new()).unwrap();
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

#[test]
fn initializers_run_on_every_context() {
    #[derive(Debug)]
    struct RequestId(&'static str);

    let interpreter = NativeInterpreter::new().program("app.star", |unit| {
        unit.def("main", 1, 0, |thread, _| {
            let id = thread.local::<RequestId>().map(|r| r.0).unwrap_or("missing");
            Err(EvalError::msg(format!("request {id}")))
        });
        Ok(())
    });
    let applet = Applet::builder("app", Arc::new(interpreter))
        .initializer(|thread| thread.set_local(RequestId("abc")))
        .load(&MemoryFs::new().with_file("app.star", ""))
        .unwrap();
    let err = applet.run(&CancelScope::new()).unwrap_err();
    assert!(err.to_string().ends_with("Error in main: request abc"));
}

#[test]
fn calls_from_many_threads() {
    let applet = Arc::new(applet_with_main(|thread, render, _| root(thread, render, "x")));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let applet = Arc::clone(&applet);
            std::thread::spawn(move || applet.run(&CancelScope::new()).map(|r| r.len()))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 1);
    }
}
