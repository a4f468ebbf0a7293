use crate::ast::Instruction;
use crate::error::QWebError;
use crate::executor::Executor;
use crate::output::OutputSink;
use qweb_expr::{CompiledExpr, Value, iterate};

/// The variables bound for `t-as="x"`.
struct LoopNames {
    item: String,
    value: String,
    index: String,
    size: String,
    first: String,
    last: String,
    odd: String,
    even: String,
    parity: String,
}

impl LoopNames {
    fn new(var: &str) -> Self {
        Self {
            item: var.to_string(),
            value: format!("{}_value", var),
            index: format!("{}_index", var),
            size: format!("{}_size", var),
            first: format!("{}_first", var),
            last: format!("{}_last", var),
            odd: format!("{}_odd", var),
            even: format!("{}_even", var),
            parity: format!("{}_parity", var),
        }
    }
}

type Entries<'v> = Box<dyn Iterator<Item = (Value, Value)> + 'v>;

fn boxed<'v>(entries: impl Iterator<Item = (Value, Value)> + 'v) -> Entries<'v> {
    Box::new(entries)
}

/// Entries of an iterable as `(item, item_value)` pairs, plus the size when known.
///
/// Integers iterate `0..n`. Mappings yield `[key, value]` items. Record sets are
/// walked lazily and may not know their size.
fn entries(value: &Value) -> Result<(Entries<'_>, Option<usize>), QWebError> {
    Ok(match value {
        Value::Null | Value::Bool(_) => {
            return Err(QWebError::evaluation(format!(
                "'{}' object is not iterable",
                value.type_name()
            )));
        }
        Value::Int(n) => {
            let n = (*n).max(0);
            let size = usize::try_from(n).unwrap_or_default();
            (boxed((0..n).map(|i| (Value::Int(i), Value::Int(i)))), Some(size))
        }
        Value::Map(map) => (
            boxed(map.iter().map(|(key, item)| {
                (
                    Value::List(vec![Value::Str(key.clone()), item.clone()]),
                    item.clone(),
                )
            })),
            Some(map.len()),
        ),
        Value::Record(record) => match record.records() {
            Some(records) => (
                boxed(records.map(|r| (r.clone(), r))),
                record.size_hint(),
            ),
            None => (
                boxed(std::iter::once((value.clone(), value.clone()))),
                Some(1),
            ),
        },
        other => {
            let items = iterate(other)?;
            let size = items.len();
            (boxed(items.into_iter().map(|v| (v.clone(), v))), Some(size))
        }
    })
}

impl Executor<'_> {
    pub(crate) fn handle_foreach(
        &mut self,
        iterable: &CompiledExpr,
        var: &str,
        body: &[Instruction],
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        let value = self.eval(iterable)?;
        let (items, size) = entries(&value).map_err(|err| match err {
            QWebError::Evaluation(message) => QWebError::evaluation(format!(
                "t-foreach=\"{}\": {}",
                iterable.source(),
                message
            )),
            other => other,
        })?;

        self.scope.push();
        let result = self.iterate_body(items, size, &LoopNames::new(var), body, sink);
        self.scope.pop();
        result
    }

    fn iterate_body(
        &mut self,
        items: Entries<'_>,
        size: Option<usize>,
        names: &LoopNames,
        body: &[Instruction],
        sink: &mut dyn OutputSink,
    ) -> Result<(), QWebError> {
        if let Some(size) = size {
            self.scope.set(names.size.as_str(), size);
        }
        for (index, (item, item_value)) in items.enumerate() {
            let even = index % 2 == 0;
            self.scope.set(names.item.as_str(), item);
            self.scope.set(names.value.as_str(), item_value);
            self.scope.set(names.index.as_str(), index);
            self.scope.set(names.first.as_str(), index == 0);
            if let Some(size) = size {
                self.scope.set(names.last.as_str(), index + 1 == size);
            }
            self.scope.set(names.even.as_str(), even);
            self.scope.set(names.odd.as_str(), !even);
            self.scope
                .set(names.parity.as_str(), if even { "even" } else { "odd" });
            self.execute(body, sink)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qweb_expr::Map;

    #[test]
    fn test_integer_is_a_range() {
        let value = Value::Int(3);
        let (items, size) = entries(&value).unwrap();
        let items: Vec<Value> = items.map(|(item, _)| item).collect();
        assert_eq!(items, vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
        assert_eq!(size, Some(3));
    }

    #[test]
    fn test_mapping_yields_pairs() {
        let mut map = Map::new();
        map.insert("a".into(), Value::Int(1));
        let value = Value::Map(map);
        let (mut items, _) = entries(&value).unwrap();
        let (item, item_value) = items.next().unwrap();
        assert_eq!(item, Value::List(vec![Value::from("a"), Value::Int(1)]));
        assert_eq!(item_value, Value::Int(1));
    }

    #[test]
    fn test_none_is_not_iterable() {
        assert!(matches!(entries(&Value::Null), Err(QWebError::Evaluation(_))));
    }
}
