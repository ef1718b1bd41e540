//! The caller-facing API: `compile` once, `execute` many times.

use crate::assembler::TemplateAssembler;
use crate::ast::DocumentTemplate;
use crate::config::ExecutionConfig;
use crate::error::{CompileError, ExecuteError};
use crate::executor::RowExecutor;
use crate::output::{AssembledDocument, OutputBuilder, TreeBuilder};
use crate::parser::parse_template;
use crate::planner::{CompiledPlans, PlanTable, build_plans};
use crate::resolver::SourceResolver;
use crate::serializer::serialize;
use xqdoc_source::{DataSource, MetadataCache};

/// A parsed and planned template.
///
/// Immutable after `compile`, so it can be shared between threads and
/// executed concurrently. Per-execution state (fetched rows, the output
/// tree) is created inside each `execute` call.
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    template: DocumentTemplate,
    plans: CompiledPlans,
}

/// Parses `source` and resolves every `doc(...)` reference through `cache`.
pub fn compile(source: &str, cache: &MetadataCache) -> Result<CompiledDocument, CompileError> {
    let template = parse_template(source)?;
    let plans = build_plans(&template, &SourceResolver::new(cache))?;
    log::debug!(
        "Compiled <{}>: {} plan(s), {} binding(s)",
        template.root.name,
        plans.plans.plan_count(),
        plans.bindings.len()
    );
    Ok(CompiledDocument { template, plans })
}

impl CompiledDocument {
    /// Number of distinct root-level sources.
    pub fn plan_count(&self) -> usize {
        self.plans.plans.plan_count()
    }

    pub fn plans(&self) -> &PlanTable {
        &self.plans.plans
    }

    pub fn template(&self) -> &DocumentTemplate {
        &self.template
    }

    /// Runs the template and serializes the result.
    pub fn execute(
        &self,
        source: &dyn DataSource,
        config: &ExecutionConfig,
    ) -> Result<String, ExecuteError> {
        let document = self.assemble(source, config)?;
        serialize(&document)
    }

    /// Runs the template into an in-memory tree.
    pub fn assemble(
        &self,
        source: &dyn DataSource,
        config: &ExecutionConfig,
    ) -> Result<AssembledDocument, ExecuteError> {
        let mut builder = TreeBuilder::new();
        self.assemble_into(source, config, &mut builder)?;
        Ok(builder.finish())
    }

    /// Runs the template, reporting the output to any `OutputBuilder`.
    ///
    /// On error the builder may hold a partial tree; discard it.
    pub fn assemble_into(
        &self,
        source: &dyn DataSource,
        config: &ExecutionConfig,
        builder: &mut dyn OutputBuilder,
    ) -> Result<(), ExecuteError> {
        let mut executor = RowExecutor::new(&self.plans, source, config);
        TemplateAssembler::new(&self.plans, &mut executor, config).assemble(&self.template, builder)
    }
}
