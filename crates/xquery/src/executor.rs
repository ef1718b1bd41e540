//! Fetches the row sequences bindings iterate over.
//!
//! Root plans are fetched at most once per execution, on first reference,
//! and replayed from a cache afterwards. Nested sources are fetched by the
//! assembler once per parent-row instantiation through [`RowExecutor::fetch`].
//! Every cursor is dropped before the rows are returned, on success or error.

use crate::config::ExecutionConfig;
use crate::error::ExecuteError;
use crate::planner::{CompiledPlans, ResolvedBinding};
use std::rc::Rc;
use std::sync::Arc;
use xqdoc_source::{DataSource, FetchRequest, Parameter, SourceError};
use xqdoc_types::{PlanId, RowTuple, SourceHandle};

/// A materialized row sequence, shared between every position replaying it.
pub type RowSet = Rc<[RowTuple]>;

/// Rows to read before a non-repeating binding's cardinality is known.
const CARDINALITY_PROBE: usize = 2;

pub struct RowExecutor<'a> {
    plans: &'a CompiledPlans,
    source: &'a dyn DataSource,
    config: &'a ExecutionConfig,
    root_rows: Vec<Option<RowSet>>,
}

impl<'a> RowExecutor<'a> {
    pub fn new(
        plans: &'a CompiledPlans,
        source: &'a dyn DataSource,
        config: &'a ExecutionConfig,
    ) -> Self {
        Self {
            plans,
            source,
            config,
            root_rows: vec![None; plans.plans.plan_count()],
        }
    }

    /// Rows of a root plan, fetched on first use.
    ///
    /// Every binding over the plan checks its own cardinality against the
    /// shared rows, whether they were just fetched or replayed.
    pub fn root_rows(
        &mut self,
        binding: &ResolvedBinding,
        id: PlanId,
    ) -> Result<RowSet, ExecuteError> {
        if let Some(rows) = self.root_rows.get(id.index()).and_then(Option::as_ref) {
            log::trace!("Replaying {} for ${}", id, binding.variable);
            check_cardinality(binding, &binding.source, binding.repeating, rows.len())?;
            return Ok(Rc::clone(rows));
        }

        // Plans and bindings are built together, so the lookup only misses
        // for a binding from another compilation.
        let (source, plan_repeating) = match self.plans.plans.get(id) {
            Some(plan) => (Arc::clone(&plan.source), plan.repeating),
            None => (Arc::clone(&binding.source), binding.repeating),
        };

        let rows = self.fetch(&source, Vec::new(), plan_repeating || binding.repeating)?;
        check_cardinality(binding, &source, binding.repeating, rows.len())?;
        log::debug!("Fetched {} row(s) for {} ('{}')", rows.len(), id, source);

        let rows: RowSet = rows.into();
        if let Some(cached) = self.root_rows.get_mut(id.index()) {
            *cached = Some(Rc::clone(&rows));
        }
        Ok(rows)
    }

    /// Runs one fetch and materializes its rows.
    ///
    /// With `fetch_all` false, reading stops once a second row proves the
    /// source is not exactly-one; the cursor is dropped right away.
    pub fn fetch(
        &self,
        source: &SourceHandle,
        parameters: Vec<Parameter<'_>>,
        fetch_all: bool,
    ) -> Result<Vec<RowTuple>, ExecuteError> {
        let request = FetchRequest::with_parameters(source, parameters);
        let mut cursor = self
            .source
            .fetch(&request)
            .map_err(|cause| source_error(source, cause))?;

        let mut rows = Vec::new();
        while fetch_all || rows.len() < CARDINALITY_PROBE {
            let Some(row) = cursor.next_row() else {
                break;
            };
            let row = row.map_err(|cause| source_error(source, cause))?;
            if self.config.strict {
                check_declared_columns(source, &row).map_err(|cause| source_error(source, cause))?;
            }
            log::trace!("Row {} from '{}': {:?}", rows.len(), source, row);
            rows.push(row);
        }
        drop(cursor);

        Ok(rows)
    }
}

/// A non-repeating binding needs exactly one row.
pub fn check_cardinality(
    binding: &ResolvedBinding,
    source: &SourceHandle,
    repeating: bool,
    rows: usize,
) -> Result<(), ExecuteError> {
    if repeating || rows == 1 {
        return Ok(());
    }
    Err(ExecuteError::Cardinality {
        variable: binding.variable.clone(),
        source_text: source.original().to_string(),
        actual: rows.min(CARDINALITY_PROBE),
    })
}

fn source_error(source: &SourceHandle, cause: SourceError) -> ExecuteError {
    ExecuteError::Source {
        source_text: source.original().to_string(),
        cause,
    }
}

/// Strict mode: a virtual document row must carry exactly its declared
/// columns, in any order, compared case-insensitively.
fn check_declared_columns(source: &SourceHandle, row: &RowTuple) -> Result<(), SourceError> {
    let declared = source.declared_columns();
    if declared.is_empty() {
        return Ok(());
    }

    for column in row.columns() {
        if !declared.iter().any(|d| d.eq_ignore_ascii_case(&column.name)) {
            return Err(SourceError::SchemaMismatch(format!(
                "unexpected column '{}' in '{}'",
                column.name, source
            )));
        }
    }
    for name in declared {
        if !row.columns().iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            return Err(SourceError::SchemaMismatch(format!(
                "missing column '{}' in '{}'",
                name, source
            )));
        }
    }
    if row.len() != declared.len() {
        return Err(SourceError::SchemaMismatch(format!(
            "duplicate columns in '{}'",
            source
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_template;
    use crate::planner::build_plans;
    use crate::resolver::SourceResolver;
    use xqdoc_source::{InMemoryCatalog, MetadataCache, StaticDataSource};

    fn compiled(template: &str) -> CompiledPlans {
        let cache = MetadataCache::new(Arc::new(
            InMemoryCatalog::new()
                .with_document("A", ["value"], "SELECT value FROM a")
                .with_document("Pair", ["id", "name"], "SELECT id, name FROM pair"),
        ));
        let template = parse_template(template).unwrap();
        build_plans(&template, &SourceResolver::new(&cache)).unwrap()
    }

    #[test]
    fn test_root_rows_are_fetched_once() {
        let plans = compiled(
            r#"<R>{for $x in doc("A") return <I/>}{for $y in doc("a") return <J/>}</R>"#,
        );
        let source = StaticDataSource::new().with_values("SELECT value FROM a", &["1", "2", "3"]);
        let config = ExecutionConfig::default();
        let mut executor = RowExecutor::new(&plans, &source, &config);

        let first = executor.root_rows(&plans.bindings[0], PlanId::new(0)).unwrap();
        let second = executor.root_rows(&plans.bindings[1], PlanId::new(0)).unwrap();
        assert_eq!(first.len(), 3);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(source.fetch_count("SELECT value FROM a"), 1);
        assert_eq!(source.open_cursors(), 0);
    }

    #[test]
    fn test_replayed_rows_check_each_bindings_cardinality() {
        let plans = compiled(
            r#"<R>{for $x in doc("A") return <I/>}{for $y in exactly-one(doc("A")) return <J/>}</R>"#,
        );
        let source = StaticDataSource::new().with_values("SELECT value FROM a", &["1", "2", "3"]);
        let config = ExecutionConfig::default();
        let mut executor = RowExecutor::new(&plans, &source, &config);

        assert_eq!(executor.root_rows(&plans.bindings[0], PlanId::new(0)).unwrap().len(), 3);
        let err = executor.root_rows(&plans.bindings[1], PlanId::new(0)).unwrap_err();
        assert_eq!(
            err,
            ExecuteError::Cardinality {
                variable: "y".into(),
                source_text: "A".into(),
                actual: 2
            }
        );
        assert_eq!(source.fetch_count("SELECT value FROM a"), 1);
    }

    #[test]
    fn test_exactly_one_row_serves_a_later_repeating_binding() {
        let plans = compiled(
            r#"<R>{for $x in exactly-one(doc("A")) return <I/>}{for $y in doc("A") return <J/>}</R>"#,
        );
        let source = StaticDataSource::new().with_values("SELECT value FROM a", &["only"]);
        let config = ExecutionConfig::default();
        let mut executor = RowExecutor::new(&plans, &source, &config);

        let first = executor.root_rows(&plans.bindings[0], PlanId::new(0)).unwrap();
        let second = executor.root_rows(&plans.bindings[1], PlanId::new(0)).unwrap();
        assert_eq!(first.len(), 1);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(source.fetch_count("SELECT value FROM a"), 1);
    }

    #[test]
    fn test_non_repeating_probe_stops_after_two_rows() {
        let plans = compiled(r#"<R>{for $x in exactly-one(doc("A")) return <I/>}</R>"#);
        let source =
            StaticDataSource::new().with_values("SELECT value FROM a", &["1", "2", "3", "4"]);
        let config = ExecutionConfig::default();
        let mut executor = RowExecutor::new(&plans, &source, &config);

        let err = executor.root_rows(&plans.bindings[0], PlanId::new(0)).unwrap_err();
        assert_eq!(
            err,
            ExecuteError::Cardinality {
                variable: "x".into(),
                source_text: "A".into(),
                actual: 2
            }
        );
        assert_eq!(source.open_cursors(), 0);
    }

    #[test]
    fn test_non_repeating_with_no_rows() {
        let plans = compiled(r#"<R>{for $x in exactly-one(doc("A")) return <I/>}</R>"#);
        let source = StaticDataSource::new().with_rows("SELECT value FROM a", Vec::new());
        let config = ExecutionConfig::default();
        let mut executor = RowExecutor::new(&plans, &source, &config);

        let err = executor.root_rows(&plans.bindings[0], PlanId::new(0)).unwrap_err();
        assert!(matches!(err, ExecuteError::Cardinality { actual: 0, .. }));
    }

    #[test]
    fn test_source_failures_name_the_source() {
        let plans = compiled(r#"<R>{for $x in doc("A") return <I/>}</R>"#);
        let source = StaticDataSource::new().with_failure("SELECT value FROM a", "disk on fire");
        let config = ExecutionConfig::default();
        let mut executor = RowExecutor::new(&plans, &source, &config);

        let err = executor.root_rows(&plans.bindings[0], PlanId::new(0)).unwrap_err();
        assert_eq!(
            err,
            ExecuteError::Source {
                source_text: "A".into(),
                cause: SourceError::Execution("disk on fire".into())
            }
        );
    }

    #[test]
    fn test_strict_mode_checks_declared_columns() {
        let plans = compiled(r#"<R>{for $p in doc("Pair") return <I/>}</R>"#);
        let source = StaticDataSource::new().with_rows(
            "SELECT id, name FROM pair",
            vec![
                RowTuple::new().with("NAME", "a").with("id", "1"),
                RowTuple::new().with("id", "2").with("colour", "red"),
            ],
        );

        let lenient = ExecutionConfig::default();
        let mut executor = RowExecutor::new(&plans, &source, &lenient);
        assert_eq!(executor.root_rows(&plans.bindings[0], PlanId::new(0)).unwrap().len(), 2);

        let strict = ExecutionConfig {
            strict: true,
            ..Default::default()
        };
        let mut executor = RowExecutor::new(&plans, &source, &strict);
        let err = executor.root_rows(&plans.bindings[0], PlanId::new(0)).unwrap_err();
        match err {
            ExecuteError::Source {
                cause: SourceError::SchemaMismatch(reason),
                ..
            } => assert_eq!(reason, "unexpected column 'colour' in 'Pair'"),
            other => panic!("expected a schema mismatch, got {:?}", other),
        }
        assert_eq!(source.open_cursors(), 0);
    }

    #[test]
    fn test_strict_mode_ignores_sql_sources() {
        let handle = SourceHandle::sql("SELECT anything");
        let row = RowTuple::new().with("whatever", "1");
        assert!(check_declared_columns(&handle, &row).is_ok());

        let vdoc = SourceHandle::virtual_document("Pair", "Pair", vec!["id".into(), "name".into()], "q");
        let short = RowTuple::new().with("id", "1");
        assert_eq!(
            check_declared_columns(&vdoc, &short),
            Err(SourceError::SchemaMismatch("missing column 'name' in 'Pair'".into()))
        );
    }
}
