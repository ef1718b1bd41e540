//! Instantiates a compiled template against fetched rows.
//!
//! The walk uses an explicit work stack rather than recursion, so template
//! depth and row counts never grow the native call stack. Tasks are pushed
//! in reverse so they pop in document order. Each row a binding iterates
//! over becomes a `Frame` in a linked environment shared by every task of
//! that body instantiation.

use crate::ast::{DocumentTemplate, ElementTemplate, ForBinding, TemplateNode, ValuePart, ValueTemplate};
use crate::config::ExecutionConfig;
use crate::error::ExecuteError;
use crate::executor::{RowExecutor, RowSet, check_cardinality};
use crate::output::OutputBuilder;
use crate::planner::{BindingTarget, CompiledPlans, ResolvedBinding};
use std::cell::RefCell;
use std::rc::Rc;
use xqdoc_path::{PathError, PathExpr, evaluate};
use xqdoc_source::Parameter;
use xqdoc_types::{BindingId, RowTuple};

/// One row bound to a variable, plus the nested fetches made for it.
struct Frame<'t> {
    variable: &'t str,
    binding: BindingId,
    rows: RowSet,
    index: usize,
    /// Rows fetched for this instantiation, by scope slot.
    scope_rows: RefCell<Vec<Option<RowSet>>>,
    parent: Env<'t>,
}

type Env<'t> = Option<Rc<Frame<'t>>>;

impl Frame<'_> {
    fn row(&self) -> &RowTuple {
        &self.rows[self.index]
    }
}

fn frames<'e, 't>(env: &'e Env<'t>) -> impl Iterator<Item = &'e Frame<'t>> {
    std::iter::successors(env.as_deref(), |frame| frame.parent.as_deref())
}

enum Task<'t> {
    Node(&'t TemplateNode, Env<'t>),
    EndElement,
}

pub struct TemplateAssembler<'t, 'x> {
    plans: &'t CompiledPlans,
    executor: &'x mut RowExecutor<'t>,
    config: &'t ExecutionConfig,
}

impl<'t, 'x> TemplateAssembler<'t, 'x> {
    pub fn new(
        plans: &'t CompiledPlans,
        executor: &'x mut RowExecutor<'t>,
        config: &'t ExecutionConfig,
    ) -> Self {
        Self {
            plans,
            executor,
            config,
        }
    }

    pub fn assemble(
        &mut self,
        template: &'t DocumentTemplate,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecuteError> {
        let mut stack: Vec<Task<'t>> = Vec::new();
        self.open_element(&template.root, None, builder, &mut stack)?;

        while let Some(task) = stack.pop() {
            match task {
                Task::EndElement => builder.end_element(),
                Task::Node(TemplateNode::Element(el), env) => {
                    self.open_element(el, env, builder, &mut stack)?;
                }
                Task::Node(TemplateNode::Text(value), env) => {
                    let text = self.evaluate_value(value, &env)?;
                    builder.add_text(&text);
                }
                Task::Node(TemplateNode::ForBinding(fb), env) => {
                    self.expand_binding(fb, env, &mut stack)?;
                }
            }
        }
        Ok(())
    }

    fn open_element(
        &self,
        el: &'t ElementTemplate,
        env: Env<'t>,
        builder: &mut dyn OutputBuilder,
        stack: &mut Vec<Task<'t>>,
    ) -> Result<(), ExecuteError> {
        builder.start_element(&el.name);
        for attr in &el.attributes {
            let value = self.evaluate_value(&attr.value, &env)?;
            builder.set_attribute(&attr.name, &value);
        }
        stack.push(Task::EndElement);
        stack.extend(
            el.children
                .iter()
                .rev()
                .map(|child| Task::Node(child, env.clone())),
        );
        Ok(())
    }

    /// Pushes one copy of the body per row, each in its own frame.
    fn expand_binding(
        &mut self,
        fb: &'t ForBinding,
        env: Env<'t>,
        stack: &mut Vec<Task<'t>>,
    ) -> Result<(), ExecuteError> {
        let plans = self.plans;
        let binding = plans.binding(fb.id).ok_or_else(|| {
            ExecuteError::Structure(format!("no plan for binding ${} ({})", fb.variable, fb.id))
        })?;

        let rows = match binding.target {
            BindingTarget::Root(id) => self.executor.root_rows(binding, id)?,
            BindingTarget::Nested { scope, slot } => self.nested_rows(binding, scope, slot, &env)?,
        };
        log::trace!("Expanding ${} over {} row(s)", fb.variable, rows.len());

        let slot_count = plans.slots(fb.id).len();
        for index in (0..rows.len()).rev() {
            let frame = Rc::new(Frame {
                variable: &fb.variable,
                binding: fb.id,
                rows: Rc::clone(&rows),
                index,
                scope_rows: RefCell::new(vec![None; slot_count]),
                parent: env.clone(),
            });
            stack.extend(
                fb.body
                    .iter()
                    .rev()
                    .map(|node| Task::Node(node, Some(Rc::clone(&frame)))),
            );
        }
        Ok(())
    }

    /// Rows of a nested binding, shared with siblings naming the same source
    /// within this parent-row instantiation only.
    fn nested_rows(
        &mut self,
        binding: &ResolvedBinding,
        scope: BindingId,
        slot: usize,
        env: &Env<'t>,
    ) -> Result<RowSet, ExecuteError> {
        let frame = frames(env).find(|f| f.binding == scope).ok_or_else(|| {
            ExecuteError::Structure(format!(
                "binding ${} is evaluated outside {}",
                binding.variable, scope
            ))
        })?;

        let cached = frame.scope_rows.borrow().get(slot).cloned().flatten();
        let rows = match cached {
            Some(rows) => {
                log::trace!("Reusing nested rows of '{}' for ${}", binding.source, binding.variable);
                rows
            }
            None => {
                let scope_slot = self.plans.slots(scope).get(slot).ok_or_else(|| {
                    ExecuteError::Structure(format!("{} has no slot {}", scope, slot))
                })?;
                // Outermost binding first.
                let mut parameters: Vec<Parameter<'_>> = frames(env)
                    .map(|f| Parameter {
                        variable: f.variable,
                        row: f.row(),
                    })
                    .collect();
                parameters.reverse();

                let rows: RowSet = self
                    .executor
                    .fetch(&scope_slot.source, parameters, scope_slot.fetch_all)?
                    .into();
                log::debug!(
                    "Fetched {} nested row(s) from '{}' for ${}",
                    rows.len(),
                    scope_slot.source,
                    binding.variable
                );
                if let Some(entry) = frame.scope_rows.borrow_mut().get_mut(slot) {
                    *entry = Some(Rc::clone(&rows));
                }
                rows
            }
        };

        check_cardinality(binding, &binding.source, binding.repeating, rows.len())?;
        Ok(rows)
    }

    fn evaluate_value(&self, value: &ValueTemplate, env: &Env<'t>) -> Result<String, ExecuteError> {
        let mut text = String::new();
        for part in &value.0 {
            match part {
                ValuePart::Literal(literal) => text.push_str(literal),
                ValuePart::Path(path) => text.push_str(self.project(path, env)?),
            }
        }
        Ok(text)
    }

    fn project<'e>(&self, path: &PathExpr, env: &'e Env<'t>) -> Result<&'e str, ExecuteError> {
        let projection_error = |cause| ExecuteError::Projection {
            path: path.to_string(),
            cause,
        };
        let frame = frames(env)
            .find(|f| f.variable == path.variable)
            .ok_or_else(|| {
                projection_error(PathError::NotPresent {
                    path: path.to_string(),
                    step: format!("${}", path.variable),
                })
            })?;
        evaluate(path, frame.row(), self.config.bare_variable).map_err(projection_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{AssembledNode, TreeBuilder};
    use crate::parser::parse_template;
    use crate::planner::build_plans;
    use crate::resolver::SourceResolver;
    use std::sync::Arc;
    use xqdoc_path::BareVariablePolicy;
    use xqdoc_source::{DataSource, InMemoryCatalog, MetadataCache, StaticDataSource};

    fn assemble_with(
        template: &str,
        source: &dyn DataSource,
        config: &ExecutionConfig,
    ) -> Result<crate::output::AssembledDocument, ExecuteError> {
        let cache = MetadataCache::new(Arc::new(
            InMemoryCatalog::new().with_document("A", ["value"], "SELECT value FROM a"),
        ));
        let template = parse_template(template).unwrap();
        let plans = build_plans(&template, &SourceResolver::new(&cache)).unwrap();
        let mut executor = RowExecutor::new(&plans, source, config);
        let mut builder = TreeBuilder::new();
        TemplateAssembler::new(&plans, &mut executor, config).assemble(&template, &mut builder)?;
        Ok(builder.finish())
    }

    #[test]
    fn test_rows_expand_in_order() {
        let source = StaticDataSource::new().with_values("SELECT value FROM a", &["Lamp", "Screwdriver", "Goat"]);
        let doc = assemble_with(
            r#"<Items>{for $x in doc("A") return <Item>{$x/text()}</Item>}</Items>"#,
            &source,
            &ExecutionConfig::default(),
        )
        .unwrap();

        let root = doc.root().unwrap();
        assert_eq!(doc.child_element_names(root), vec!["Item", "Item", "Item"]);
        let texts: Vec<String> = doc.children(root).iter().map(|c| doc.text_content(*c)).collect();
        assert_eq!(texts, vec!["Lamp", "Screwdriver", "Goat"]);
    }

    #[test]
    fn test_empty_projection_adds_no_text_node() {
        let source = StaticDataSource::new().with_values("SELECT value FROM a", &[""]);
        let doc = assemble_with(
            r#"<Items>{for $x in doc("A") return <Item>{$x/value}</Item>}</Items>"#,
            &source,
            &ExecutionConfig::default(),
        )
        .unwrap();
        let item = doc.children(doc.root().unwrap())[0];
        assert!(doc.children(item).is_empty());
    }

    #[test]
    fn test_attribute_templates_are_evaluated() {
        let source = StaticDataSource::new().with_rows(
            "SELECT id, name FROM t",
            vec![RowTuple::new().with("id", "7").with("name", "Lamp")],
        );
        let doc = assemble_with(
            r##"<Items>{for $x in doc("SELECT id, name FROM t") return <Item ref="#{$x/@id}" label="{$x/name}"/>}</Items>"##,
            &source,
            &ExecutionConfig::default(),
        )
        .unwrap();
        let item = doc.children(doc.root().unwrap())[0];
        match doc.node(item).unwrap() {
            AssembledNode::Element { attributes, .. } => assert_eq!(
                attributes,
                &vec![
                    ("ref".to_string(), "#7".to_string()),
                    ("label".to_string(), "Lamp".to_string())
                ]
            ),
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_fetch_sees_enclosing_rows_and_is_shared_per_instantiation() {
        let source = StaticDataSource::new()
            .with_rows(
                "SELECT id FROM customers",
                vec![RowTuple::new().with("id", "1"), RowTuple::new().with("id", "2")],
            )
            .with_responder("SELECT total FROM orders", |req| {
                let id = req.parameter("c").and_then(|row| row.get("id")).unwrap_or("?");
                Ok(vec![RowTuple::new().with("total", format!("{}0", id))])
            });
        let doc = assemble_with(
            r#"<Customers>{for $c in doc("SELECT id FROM customers") return
                 <Customer>
                   {for $o in doc("SELECT total FROM orders") return <Total>{$o/total}</Total>}
                   {for $p in exactly-one(doc("select total from orders")) return <Again>{$p/total}</Again>}
                 </Customer>}
               </Customers>"#,
            &source,
            &ExecutionConfig::default(),
        )
        .unwrap();

        let root = doc.root().unwrap();
        let totals: Vec<String> = doc.children(root).iter().map(|c| doc.text_content(*c)).collect();
        assert_eq!(totals, vec!["1010", "2020"]);
        // One nested fetch per customer, shared by both sibling bindings.
        assert_eq!(source.fetch_count("SELECT total FROM orders"), 2);
        assert_eq!(source.fetch_count("SELECT id FROM customers"), 1);
    }

    #[test]
    fn test_nested_cardinality_failure() {
        let source = StaticDataSource::new()
            .with_values("SELECT value FROM a", &["x"])
            .with_values("SELECT b FROM t", &["1", "2"]);
        let err = assemble_with(
            r#"<R>{for $x in doc("A") return <X>{for $y in exactly-one(doc("SELECT b FROM t")) return <Y/>}</X>}</R>"#,
            &source,
            &ExecutionConfig::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ExecuteError::Cardinality {
                variable: "y".into(),
                source_text: "SELECT b FROM t".into(),
                actual: 2
            }
        );
        assert_eq!(source.open_cursors(), 0);
    }

    #[test]
    fn test_bare_variable_policy() {
        let source = StaticDataSource::new().with_values("SELECT value FROM a", &["Lamp"]);
        let template = r#"<Items>{for $x in doc("A") return <Item>{$x}</Item>}</Items>"#;

        let err = assemble_with(template, &source, &ExecutionConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ExecuteError::Projection {
                cause: PathError::BareVariable(_),
                ..
            }
        ));

        let coerce = ExecutionConfig {
            bare_variable: BareVariablePolicy::CoerceToText,
            ..Default::default()
        };
        let doc = assemble_with(template, &source, &coerce).unwrap();
        assert_eq!(doc.text_content(doc.root().unwrap()), "Lamp");
    }

    #[test]
    fn test_missing_column_is_a_projection_error() {
        let source = StaticDataSource::new().with_values("SELECT value FROM a", &["Lamp"]);
        let err = assemble_with(
            r#"<Items>{for $x in doc("A") return <Item>{$x/price}</Item>}</Items>"#,
            &source,
            &ExecutionConfig::default(),
        )
        .unwrap_err();
        match err {
            ExecuteError::Projection { path, .. } => assert_eq!(path, "$x/price"),
            other => panic!("expected a projection error, got {:?}", other),
        }
    }
}
