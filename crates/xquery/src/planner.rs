//! Turns the `for` bindings of a template into plans.
//!
//! Root-level bindings (those not inside another binding's body) with the
//! same normalized source text share one `Plan`, and so one fetch per
//! execution. Nested bindings are resolved here too, but are fetched per
//! parent row; they get a slot in their enclosing binding's scope so that
//! siblings naming the same source share one fetch per body instantiation.

use crate::ast::{DocumentTemplate, TemplateNode};
use crate::error::CompileError;
use crate::resolver::SourceResolver;
use std::collections::HashMap;
use std::sync::Arc;
use xqdoc_types::{BindingId, PlanId, SourceHandle};

#[derive(Debug, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub source: Arc<SourceHandle>,
    /// Taken from the first binding that introduced the plan.
    pub repeating: bool,
    /// Number of template positions referencing the plan.
    pub references: usize,
}

/// Root-level plans in first-occurrence order.
#[derive(Debug, Clone, Default)]
pub struct PlanTable {
    plans: Vec<Plan>,
}

impl PlanTable {
    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    pub fn get(&self, id: PlanId) -> Option<&Plan> {
        self.plans.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plan> {
        self.plans.iter()
    }
}

/// Where a binding's rows come from at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    /// Shared, fetched once per execution.
    Root(PlanId),
    /// Fetched per row of the enclosing `scope` binding.
    Nested { scope: BindingId, slot: usize },
}

#[derive(Debug, Clone)]
pub struct ResolvedBinding {
    pub id: BindingId,
    pub variable: String,
    pub source: Arc<SourceHandle>,
    pub repeating: bool,
    pub target: BindingTarget,
}

/// One distinct nested source inside a binding's body.
#[derive(Debug, Clone)]
pub struct ScopeSlot {
    pub source: Arc<SourceHandle>,
    /// True if any binding using the slot is repeating, so every row must be
    /// fetched. Otherwise fetching may stop once cardinality is known.
    pub fetch_all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledPlans {
    pub plans: PlanTable,
    /// Indexed by `BindingId`.
    pub bindings: Vec<ResolvedBinding>,
    /// Nested source slots, indexed by the `BindingId` owning the scope.
    pub scope_slots: Vec<Vec<ScopeSlot>>,
}

impl CompiledPlans {
    pub fn binding(&self, id: BindingId) -> Option<&ResolvedBinding> {
        self.bindings.get(id.index())
    }

    pub fn slots(&self, scope: BindingId) -> &[ScopeSlot] {
        self.scope_slots.get(scope.index()).map_or(&[], Vec::as_slice)
    }
}

/// Visits every binding in document order and assigns it a target.
pub fn build_plans(
    template: &DocumentTemplate,
    resolver: &SourceResolver<'_>,
) -> Result<CompiledPlans, CompileError> {
    let mut compiled = CompiledPlans {
        plans: PlanTable::default(),
        bindings: Vec::with_capacity(template.binding_count),
        scope_slots: vec![Vec::new(); template.binding_count],
    };
    let mut root_index: HashMap<String, PlanId> = HashMap::new();
    let mut slot_index: HashMap<(BindingId, String), usize> = HashMap::new();

    // (node, closest enclosing binding); children are pushed in reverse so
    // nodes pop in document order.
    let mut stack: Vec<(&TemplateNode, Option<BindingId>)> = template
        .root
        .children
        .iter()
        .rev()
        .map(|node| (node, None))
        .collect();

    while let Some((node, scope)) = stack.pop() {
        match node {
            TemplateNode::Text(_) => {}
            TemplateNode::Element(el) => {
                stack.extend(el.children.iter().rev().map(|child| (child, scope)));
            }
            TemplateNode::ForBinding(fb) => {
                let source = Arc::new(resolver.resolve(&fb.source_text)?);
                let key = source.normalized().to_string();

                let target = match scope {
                    None => {
                        let id = match root_index.get(&key) {
                            Some(&id) => {
                                let plan = &mut compiled.plans.plans[id.index()];
                                plan.references += 1;
                                if plan.repeating != fb.repeating {
                                    log::warn!(
                                        "Binding ${} over '{}' is {} but {} was first introduced {}; the plan keeps its first cardinality",
                                        fb.variable,
                                        fb.source_text,
                                        describe_repeating(fb.repeating),
                                        id,
                                        describe_repeating(plan.repeating)
                                    );
                                }
                                id
                            }
                            None => {
                                let id = PlanId::new(compiled.plans.plans.len());
                                log::debug!("Allocated {} for source '{}'", id, source);
                                compiled.plans.plans.push(Plan {
                                    id,
                                    source: Arc::clone(&source),
                                    repeating: fb.repeating,
                                    references: 1,
                                });
                                root_index.insert(key, id);
                                id
                            }
                        };
                        BindingTarget::Root(id)
                    }
                    Some(scope) => {
                        let slots = &mut compiled.scope_slots[scope.index()];
                        let slot = *slot_index.entry((scope, key)).or_insert_with(|| {
                            slots.push(ScopeSlot {
                                source: Arc::clone(&source),
                                fetch_all: false,
                            });
                            slots.len() - 1
                        });
                        slots[slot].fetch_all |= fb.repeating;
                        BindingTarget::Nested { scope, slot }
                    }
                };

                debug_assert_eq!(fb.id.index(), compiled.bindings.len());
                compiled.bindings.push(ResolvedBinding {
                    id: fb.id,
                    variable: fb.variable.clone(),
                    source,
                    repeating: fb.repeating,
                    target,
                });
                stack.extend(fb.body.iter().rev().map(|child| (child, Some(fb.id))));
            }
        }
    }

    log::debug!(
        "Planned {} binding(s) onto {} root plan(s)",
        compiled.bindings.len(),
        compiled.plans.plan_count()
    );
    Ok(compiled)
}

fn describe_repeating(repeating: bool) -> &'static str {
    if repeating { "repeating" } else { "exactly-one" }
}
