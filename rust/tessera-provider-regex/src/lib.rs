//! `re.star`: regular expressions.
//!
//! - `re.match(pattern, s)`: every match as a tuple of the whole match
//!   followed by its groups (unmatched groups are `""`)
//! - `re.findall(pattern, s)`: every whole match
//! - `re.split(pattern, s, max_split=-1)`
//! - `re.sub(pattern, repl, s, count=0)`: `repl` uses `$1` / `${name}`
//!   references; `count=0` replaces all
//!
//! Patterns use the `regex` crate syntax.

use regex::Regex;
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

fn compile(function: &str, pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|e| EvalError::msg(format!("{function}: {e}")))
}

pub fn match_all(re: &Regex, s: &str) -> Vec<Vec<String>> {
    re.captures_iter(s)
        .map(|caps| {
            caps.iter()
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect()
        })
        .collect()
}

pub fn split(re: &Regex, s: &str, max_split: i64) -> Vec<String> {
    if max_split < 0 {
        re.split(s).map(str::to_string).collect()
    } else {
        re.splitn(s, max_split as usize + 1).map(str::to_string).collect()
    }
}

fn strings(items: Vec<String>) -> Value {
    Value::List(items.into_iter().map(Value::String).collect())
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("re")
        .function("match", |_thread, args| {
            let mut p = args.parser("re.match");
            let pattern: String = p.required("pattern")?;
            let s: String = p.required("str")?;
            p.finish()?;
            let re = compile("re.match", &pattern)?;
            Ok(Value::List(
                match_all(&re, &s)
                    .into_iter()
                    .map(|groups| Value::Tuple(groups.into_iter().map(Value::String).collect()))
                    .collect(),
            ))
        })
        .function("findall", |_thread, args| {
            let mut p = args.parser("re.findall");
            let pattern: String = p.required("pattern")?;
            let s: String = p.required("str")?;
            p.finish()?;
            let re = compile("re.findall", &pattern)?;
            Ok(strings(re.find_iter(&s).map(|m| m.as_str().to_string()).collect()))
        })
        .function("split", |_thread, args| {
            let mut p = args.parser("re.split");
            let pattern: String = p.required("pattern")?;
            let s: String = p.required("str")?;
            let max_split: i64 = p.or_default("max_split", -1)?;
            p.finish()?;
            let re = compile("re.split", &pattern)?;
            Ok(strings(split(&re, &s, max_split)))
        })
        .function("sub", |_thread, args| {
            let mut p = args.parser("re.sub");
            let pattern: String = p.required("pattern")?;
            let repl: String = p.required("repl")?;
            let s: String = p.required("str")?;
            let count: u32 = p.or_default("count", 0)?;
            p.finish()?;
            let re = compile("re.sub", &pattern)?;
            Ok(Value::String(
                re.replacen(&s, count as usize, repl.as_str()).into_owned(),
            ))
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Arguments, Thread};

    fn call(function: &str, args: Arguments) -> Result<Value, EvalError> {
        load_module()["re"]
            .get_attr(function)?
            .call(&mut Thread::new("t"), args)
    }

    #[test]
    fn match_returns_groups_per_match() {
        let out = call(
            "match",
            Arguments::positional(vec![r"(\w+)=(\d+)?".into(), "a=1 b=".into()]),
        )
        .unwrap();
        assert_eq!(
            out,
            Value::List(vec![
                Value::Tuple(vec!["a=1".into(), "a".into(), "1".into()]),
                Value::Tuple(vec!["b=".into(), "b".into(), "".into()]),
            ])
        );
    }

    #[test]
    fn findall_and_split() {
        let found = call("findall", Arguments::positional(vec![r"\d+".into(), "7 up, 42 down".into()]))
            .unwrap();
        assert_eq!(found, Value::List(vec!["7".into(), "42".into()]));

        let re = Regex::new(r",\s*").unwrap();
        assert_eq!(split(&re, "a, b,c", -1), vec!["a", "b", "c"]);
        assert_eq!(split(&re, "a, b,c", 1), vec!["a", "b,c"]);
    }

    #[test]
    fn sub_with_group_reference_and_count() {
        let out = call(
            "sub",
            Arguments::positional(vec![r"(\d+)".into(), "<$1>".into(), "1 2 3".into()])
                .with_named("count", 2i64),
        )
        .unwrap();
        assert_eq!(out, Value::from("<1> <2> 3"));
    }

    #[test]
    fn invalid_pattern_names_function() {
        let err = call("findall", Arguments::positional(vec!["(".into(), "x".into()])).unwrap_err();
        assert!(err.to_string().starts_with("re.findall: "));
    }
}
