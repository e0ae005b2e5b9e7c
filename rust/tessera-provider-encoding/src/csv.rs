//! `encoding/csv.star`
//!
//! `csv.read_all(source, comma=",", comment="", skip=0)` returns a list of
//! rows, each a list of strings. Every row must have as many fields as the
//! first. `csv.write_all(rows, comma=",")` is the inverse.

use crate::single_byte;
use tessera_core::{Bindings, EvalError, ModuleBuilder, Value};

pub fn read_all(
    source: &str,
    comma: u8,
    comment: Option<u8>,
    skip: usize,
) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(comma)
        .comment(comment)
        .from_reader(source.as_bytes());
    reader
        .records()
        .skip(skip)
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect()
}

pub fn write_all(rows: &[Vec<String>], comma: u8) -> Result<String, EvalError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(comma)
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| EvalError::msg(format!("csv.write_all: {e}")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| EvalError::msg(format!("csv.write_all: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn rows_arg(value: Value) -> Result<Vec<Vec<String>>, EvalError> {
    let Some(rows) = value.as_sequence() else {
        return Err(EvalError::msg(format!(
            "csv.write_all: expected a list of rows, got {}",
            value.type_name()
        )));
    };
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let Some(fields) = row.as_sequence() else {
                return Err(EvalError::msg(format!(
                    "csv.write_all: row {i}: expected a list, got {}",
                    row.type_name()
                )));
            };
            Ok(fields.iter().map(Value::to_string).collect())
        })
        .collect()
}

pub fn load_module() -> Bindings {
    ModuleBuilder::new("csv")
        .function("read_all", |_thread, args| {
            let mut p = args.parser("csv.read_all");
            let source: String = p.required("source")?;
            let comma: String = p.or_default("comma", ",".to_string())?;
            let comment: String = p.or_default("comment", String::new())?;
            let skip: u32 = p.or_default("skip", 0)?;
            p.finish()?;
            let comma = single_byte("csv.read_all", "comma", &comma)?;
            let comment = if comment.is_empty() {
                None
            } else {
                Some(single_byte("csv.read_all", "comment", &comment)?)
            };
            let rows = read_all(&source, comma, comment, skip as usize)
                .map_err(|e| EvalError::msg(format!("csv.read_all: {e}")))?;
            Ok(Value::List(
                rows.into_iter()
                    .map(|row| Value::List(row.into_iter().map(Value::String).collect()))
                    .collect(),
            ))
        })
        .function("write_all", |_thread, args| {
            let mut p = args.parser("csv.write_all");
            let rows = rows_arg(p.required("x")?)?;
            let comma: String = p.or_default("comma", ",".to_string())?;
            p.finish()?;
            let comma = single_byte("csv.write_all", "comma", &comma)?;
            write_all(&rows, comma).map(Value::String)
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_quoted_fields_and_skips() {
        let rows = read_all("name,score\n\"Doe, J\",7\nRoe,9\n", b',', None, 1).unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["Doe, J".to_string(), "7".to_string()],
                vec!["Roe".to_string(), "9".to_string()]
            ]
        );
    }

    #[test]
    fn comments_and_ragged_rows() {
        let rows = read_all("# header\na;b\n", b';', Some(b'#'), 0).unwrap();
        assert_eq!(rows, vec![vec!["a".to_string(), "b".to_string()]]);
        assert!(read_all("a,b\nc\n", b',', None, 0).is_err());
    }

    #[test]
    fn writes_with_quoting() {
        let out = write_all(&[vec!["a b".into(), "c,d".into()]], b',').unwrap();
        assert_eq!(out, "a b,\"c,d\"\n");
    }
}
