use crate::criteria::{Expression, Predicate, Projection, QueryKind, QueryModel};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::model::{Pageable, QueryParameterBinding, Sort};
use itertools::Itertools;
use std::fmt::Write;

/// Query text plus the parameters it references, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    query: String,
    bindings: Vec<QueryParameterBinding>,
}

impl QueryResult {
    pub fn new(query: String, bindings: Vec<QueryParameterBinding>) -> Self {
        QueryResult { query, bindings }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn bindings(&self) -> &[QueryParameterBinding] {
        &self.bindings
    }

    pub fn into_parts(self) -> (String, Vec<QueryParameterBinding>) {
        (self.query, self.bindings)
    }
}

/// Renders [QueryModel]s into a backend's query language.
pub trait QueryBuilder: Send + Sync {
    fn build_query(&self, model: &QueryModel) -> DataResult<QueryResult>;

    /// Clause appended to a select to fetch a single page.
    fn build_pagination(&self, pageable: &Pageable) -> String;
}

/// Renders JPQL-style text.
///
/// Literals are never inlined: each becomes a positional parameter `:p1`,
/// `:p2`, ... bound to a constant. Named parameters keep their name.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpqlQueryBuilder;

impl JpqlQueryBuilder {
    pub fn new() -> Self {
        JpqlQueryBuilder
    }
}

struct RenderState {
    alias: String,
    bindings: Vec<QueryParameterBinding>,
    positional: usize,
}

impl RenderState {
    fn expression(&mut self, expression: &Expression) -> String {
        match expression {
            Expression::Property(path) => format!("{}.{}", self.alias, path),
            Expression::Literal(value) => {
                self.positional += 1;
                let name = format!("p{}", self.positional);
                self.bindings.push(QueryParameterBinding::constant(&name, value.clone()));
                format!(":{}", name)
            }
            Expression::Parameter(name) => {
                if !self.bindings.iter().any(|b| b.name() == name) {
                    self.bindings.push(QueryParameterBinding::named(name));
                }
                format!(":{}", name)
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Equal(a, b) => self.binary(a, "=", b),
            Predicate::NotEqual(a, b) => self.binary(a, "!=", b),
            Predicate::GreaterThan(a, b) => self.binary(a, ">", b),
            Predicate::GreaterThanOrEqual(a, b) => self.binary(a, ">=", b),
            Predicate::LessThan(a, b) => self.binary(a, "<", b),
            Predicate::LessThanOrEqual(a, b) => self.binary(a, "<=", b),
            Predicate::Like(a, b) => self.binary(a, "LIKE", b),
            Predicate::Between(a, low, high) => {
                let a = self.expression(a);
                let low = self.expression(low);
                let high = self.expression(high);
                format!("{} BETWEEN {} AND {}", a, low, high)
            }
            Predicate::IsNull(a) => format!("{} IS NULL", self.expression(a)),
            Predicate::IsNotNull(a) => format!("{} IS NOT NULL", self.expression(a)),
            Predicate::In(_, values) if values.is_empty() => "1 = 0".to_string(),
            Predicate::In(a, values) => {
                let a = self.expression(a);
                let values = values.iter().map(|v| self.expression(v)).join(",");
                format!("{} IN ({})", a, values)
            }
            Predicate::And(predicates) => self.junction(predicates, " AND ", "1 = 1"),
            Predicate::Or(predicates) => self.junction(predicates, " OR ", "1 = 0"),
            Predicate::Not(inner) => format!("NOT ({})", self.predicate(inner)),
        }
    }

    fn binary(&mut self, a: &Expression, operator: &str, b: &Expression) -> String {
        let a = self.expression(a);
        let b = self.expression(b);
        format!("{} {} {}", a, operator, b)
    }

    fn junction(&mut self, predicates: &[Predicate], separator: &str, empty: &str) -> String {
        if predicates.is_empty() {
            return empty.to_string();
        }
        let rendered = predicates.iter().map(|p| self.predicate(p)).join(separator);
        format!("({})", rendered)
    }

    fn order_by(&self, sort: &Sort) -> String {
        sort.orders()
            .iter()
            .map(|order| {
                let property = format!("{}.{}", self.alias, order.property());
                if order.is_ignore_case() {
                    format!("LOWER({}) {}", property, order.direction())
                } else {
                    format!("{} {}", property, order.direction())
                }
            })
            .join(",")
    }
}

impl QueryBuilder for JpqlQueryBuilder {
    fn build_query(&self, model: &QueryModel) -> DataResult<QueryResult> {
        let entity = model.entity();
        let mut state = RenderState {
            alias: entity.alias(),
            bindings: Vec::new(),
            positional: 0,
        };
        let alias = state.alias.clone();
        let distinct = if model.is_distinct() { "DISTINCT " } else { "" };

        let mut query = String::new();
        match model.kind() {
            QueryKind::Select => {
                let selection = match model.projection() {
                    Projection::Entity => format!("{}{}", distinct, alias),
                    Projection::Count => format!("COUNT({}{})", distinct, alias),
                    Projection::CountDistinct(properties) => {
                        let columns = properties.iter().map(|p| format!("{}.{}", alias, p)).join(",");
                        format!("COUNT(DISTINCT {})", columns)
                    }
                    Projection::Exists => "TRUE".to_string(),
                    Projection::Property(property) => format!("{}{}.{}", distinct, alias, property),
                    Projection::Properties(properties) => {
                        let columns = properties.iter().map(|p| format!("{}.{}", alias, p)).join(",");
                        format!("{}{}", distinct, columns)
                    }
                };
                write!(query, "SELECT {} FROM {} {}", selection, entity.name(), alias)?;
            }
            QueryKind::Update => {
                if model.assignments().is_empty() {
                    log::error!("Update of {} has no assignments", entity.name());
                    return Err(DataError::new(
                        &format!("Update of {} has no assignments", entity.name()),
                        ErrorKind::IllegalArgument,
                    ));
                }
                let assignments = model
                    .assignments()
                    .iter()
                    .map(|(property, value)| format!("{}.{}={}", alias, property, state.expression(value)))
                    .join(",");
                write!(query, "UPDATE {} {} SET {}", entity.name(), alias, assignments)?;
            }
            QueryKind::Delete => {
                write!(query, "DELETE {} {}", entity.name(), alias)?;
            }
        }

        if let Some(predicate) = model.predicate() {
            let rendered = state.predicate(predicate);
            write!(query, " WHERE ({})", rendered)?;
        }

        if model.kind() == QueryKind::Select && model.sort().is_sorted() {
            write!(query, " ORDER BY {}", state.order_by(model.sort()))?;
        }

        Ok(QueryResult::new(query, state.bindings))
    }

    fn build_pagination(&self, pageable: &Pageable) -> String {
        match pageable.size() {
            Some(size) => format!(" LIMIT {} OFFSET {}", size, pageable.offset()),
            None => String::new(),
        }
    }
}
