use crate::common::{Document, Value};
use crate::criteria::{Expression, Predicate, Projection, QueryModel};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::model::{Pageable, Sort};
use indexmap::IndexMap;
use itertools::Itertools;
use regex::Regex;
use std::cmp::Ordering;

/// Evaluates [QueryModel]s against in-memory documents.
pub(crate) struct Evaluator<'a> {
    parameters: &'a IndexMap<String, Value>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(parameters: &'a IndexMap<String, Value>) -> Self {
        Evaluator { parameters }
    }

    pub(crate) fn value(&self, expression: &Expression, document: &Document) -> DataResult<Value> {
        match expression {
            Expression::Property(path) => Ok(document.get(path)),
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Parameter(name) => self.parameters.get(name).cloned().ok_or_else(|| {
                log::error!("No value bound for query parameter {}", name);
                DataError::new(
                    &format!("No value bound for query parameter '{}'", name),
                    ErrorKind::IllegalState,
                )
            }),
        }
    }

    pub(crate) fn matches(&self, predicate: Option<&Predicate>, document: &Document) -> DataResult<bool> {
        match predicate {
            Some(predicate) => self.test(predicate, document),
            None => Ok(true),
        }
    }

    fn test(&self, predicate: &Predicate, document: &Document) -> DataResult<bool> {
        match predicate {
            Predicate::Equal(a, b) => self.compare(a, b, document, |o| o == Ordering::Equal),
            Predicate::NotEqual(a, b) => self.compare(a, b, document, |o| o != Ordering::Equal),
            Predicate::GreaterThan(a, b) => self.compare(a, b, document, |o| o == Ordering::Greater),
            Predicate::GreaterThanOrEqual(a, b) => self.compare(a, b, document, |o| o != Ordering::Less),
            Predicate::LessThan(a, b) => self.compare(a, b, document, |o| o == Ordering::Less),
            Predicate::LessThanOrEqual(a, b) => self.compare(a, b, document, |o| o != Ordering::Greater),
            Predicate::Between(a, low, high) => Ok(self.compare(a, low, document, |o| o != Ordering::Less)?
                && self.compare(a, high, document, |o| o != Ordering::Greater)?),
            Predicate::Like(a, pattern) => {
                let value = self.value(a, document)?;
                let pattern = self.value(pattern, document)?;
                match (value.as_string(), pattern.as_string()) {
                    (Some(value), Some(pattern)) => Ok(like_regex(pattern)?.is_match(value)),
                    _ => Ok(false),
                }
            }
            Predicate::IsNull(a) => Ok(self.value(a, document)?.is_null()),
            Predicate::IsNotNull(a) => Ok(!self.value(a, document)?.is_null()),
            Predicate::In(a, values) => {
                let value = self.value(a, document)?;
                if value.is_null() {
                    return Ok(false);
                }
                for candidate in values {
                    if self.value(candidate, document)? == value {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::And(predicates) => {
                for p in predicates {
                    if !self.test(p, document)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(predicates) => {
                for p in predicates {
                    if self.test(p, document)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(inner) => Ok(!self.test(inner, document)?),
        }
    }

    // comparisons involving null are never true
    fn compare<F>(&self, a: &Expression, b: &Expression, document: &Document, accept: F) -> DataResult<bool>
    where
        F: Fn(Ordering) -> bool,
    {
        let a = self.value(a, document)?;
        let b = self.value(b, document)?;
        if a.is_null() || b.is_null() {
            return Ok(false);
        }
        Ok(accept(a.cmp(&b)))
    }

    /// Runs a select model: filter, order, project, deduplicate, paginate.
    pub(crate) fn select(&self, model: &QueryModel, pageable: &Pageable, rows: Vec<Document>) -> DataResult<Vec<Value>> {
        let mut matched = Vec::new();
        for row in rows {
            if self.matches(model.predicate(), &row)? {
                matched.push(row);
            }
        }

        match model.projection() {
            Projection::Count => return Ok(vec![Value::U64(matched.len() as u64)]),
            Projection::CountDistinct(properties) => {
                let counted = match properties.as_slice() {
                    [property] => Projection::Property(property.clone()),
                    _ => Projection::Properties(properties.clone()),
                };
                let distinct = matched.into_iter().map(|row| project(&counted, row)).unique().count();
                return Ok(vec![Value::U64(distinct as u64)]);
            }
            Projection::Exists => return Ok(vec![Value::Bool(!matched.is_empty())]),
            _ => {}
        }

        let sort = model.sort().clone().merge(pageable.sort());
        sort_documents(&mut matched, &sort);

        let projected = matched.into_iter().map(|row| project(model.projection(), row));
        let projected: Vec<Value> = if model.is_distinct() {
            projected.unique().collect()
        } else {
            projected.collect()
        };
        Ok(paginate(projected, pageable))
    }
}

fn project(projection: &Projection, row: Document) -> Value {
    match projection {
        Projection::Property(property) => row.get(property),
        Projection::Properties(properties) => Value::Document(
            properties
                .iter()
                .map(|p| (p.clone(), row.get(p)))
                .filter(|(_, v)| !v.is_null())
                .collect(),
        ),
        _ => Value::Document(row),
    }
}

pub(crate) fn paginate<T>(rows: Vec<T>, pageable: &Pageable) -> Vec<T> {
    match pageable.size() {
        Some(size) => rows
            .into_iter()
            .skip(pageable.offset() as usize)
            .take(size as usize)
            .collect(),
        None => rows,
    }
}

pub(crate) fn sort_documents(rows: &mut [Document], sort: &Sort) {
    if !sort.is_sorted() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in sort.orders() {
            let (x, y) = (a.get(order.property()), b.get(order.property()));
            let ordering = match (order.is_ignore_case(), x.as_string(), y.as_string()) {
                (true, Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
                _ => x.cmp(&y),
            };
            let ordering = if order.is_ascending() { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Translates a SQL `LIKE` pattern into an anchored regex.
fn like_regex(pattern: &str) -> DataResult<Regex> {
    let mut expression = String::with_capacity(pattern.len() + 8);
    expression.push('^');
    for c in pattern.chars() {
        match c {
            '%' => expression.push_str(".*"),
            '_' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');
    Ok(Regex::new(&expression)?)
}
