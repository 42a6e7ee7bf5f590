use crate::catalog::CapabilityIndex;
use crate::config::{RunLimitsConfig, Settings};
use crate::executor::{ApiCall, CallExecutor};
use crate::orchestration::arguments::{ArgumentResolver, ArgumentSet};
use crate::orchestration::assembler::{assemble, persist_artifact, FinalArtifact};
use crate::orchestration::dependency::{resolve_dependencies, DependencyResolution};
use crate::orchestration::error::OrchestratorError;
use crate::orchestration::history::History;
use crate::orchestration::planner::{GoalPlanner, PlannerDecision};
use crate::orchestration::provenance::{bind_arguments, CallTree, ProvenanceTable};
use crate::orchestration::selector::{ApiDescriptor, ApiSelector, SelectionOutcome};
use crate::provider::LanguageModel;
use crate::shared::{LogLevel, RunLog};
use serde_json::{json, Value};
use std::fmt;
use std::time::{Duration, Instant};

pub const EMPTY_RESULT: &str = "[]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Planning,
    Selecting,
    Resolving,
    Executing,
    Recording,
    Replanning,
    TerminatedFinal,
    TerminatedEmpty,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Selecting => "selecting",
            Self::Resolving => "resolving",
            Self::Executing => "executing",
            Self::Recording => "recording",
            Self::Replanning => "replanning",
            Self::TerminatedFinal => "terminated_final",
            Self::TerminatedEmpty => "terminated_empty",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::TerminatedFinal | Self::TerminatedEmpty)
    }
}

/// Why a run ended with the empty result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    OutOfDomain,
    RootSelectionFailed { plan_step: String },
    ProducerSelectionFailed { argument: String },
    DependencyCycle { path: Vec<String> },
    IterationLimit { max_iterations: u32 },
    TimeBudgetExhausted { max_seconds: u64 },
}

impl AbortReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfDomain => "out_of_domain",
            Self::RootSelectionFailed { .. } => "root_selection_failed",
            Self::ProducerSelectionFailed { .. } => "producer_selection_failed",
            Self::DependencyCycle { .. } => "dependency_cycle",
            Self::IterationLimit { .. } => "iteration_limit",
            Self::TimeBudgetExhausted { .. } => "time_budget_exhausted",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfDomain => f.write_str("request is out of domain"),
            Self::RootSelectionFailed { plan_step } => {
                write!(f, "no api found for plan step `{plan_step}`")
            }
            Self::ProducerSelectionFailed { argument } => {
                write!(f, "no api produces argument `{argument}`")
            }
            Self::DependencyCycle { path } => {
                write!(f, "dependency cycle: {}", path.join(" -> "))
            }
            Self::IterationLimit { max_iterations } => {
                write!(f, "iteration limit of {max_iterations} reached")
            }
            Self::TimeBudgetExhausted { max_seconds } => {
                write!(f, "execution time budget of {max_seconds}s exhausted")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub artifact: FinalArtifact,
    pub final_answer: String,
    pub call_tree: CallTree,
    pub history: History,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbortedRun {
    pub reason: AbortReason,
    pub history: History,
    pub call_tree: CallTree,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(CompletedRun),
    Aborted(AbortedRun),
}

impl RunOutcome {
    pub fn artifact(&self) -> Option<&FinalArtifact> {
        match self {
            Self::Completed(run) => Some(&run.artifact),
            Self::Aborted(_) => None,
        }
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        match self {
            Self::Completed(_) => None,
            Self::Aborted(run) => Some(&run.reason),
        }
    }

    pub fn history(&self) -> &History {
        match self {
            Self::Completed(run) => &run.history,
            Self::Aborted(run) => &run.history,
        }
    }

    pub fn call_tree(&self) -> &CallTree {
        match self {
            Self::Completed(run) => &run.call_tree,
            Self::Aborted(run) => &run.call_tree,
        }
    }

    /// The printed result: the artifact as pretty JSON, or `[]` for an aborted run.
    pub fn render_result(&self) -> Result<String, OrchestratorError> {
        match self {
            Self::Completed(run) => run.artifact.to_pretty_json(),
            Self::Aborted(_) => Ok(EMPTY_RESULT.to_string()),
        }
    }
}

/// Mutable state of one run.
#[derive(Debug)]
pub struct RunContext {
    pub query: String,
    pub history: History,
    pub provenance: ProvenanceTable,
    pub call_tree: CallTree,
    pub iterations: u32,
    pub phase: RunPhase,
    started: Instant,
}

impl RunContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            history: History::new(),
            provenance: ProvenanceTable::new(),
            call_tree: CallTree::new(),
            iterations: 0,
            phase: RunPhase::Planning,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn transition(&mut self, next: RunPhase, log: &RunLog) {
        if self.phase != next {
            log.event(
                LogLevel::Debug,
                "run.phase",
                &[
                    ("from", json!(self.phase.as_str())),
                    ("to", json!(next.as_str())),
                    ("iteration", json!(self.iterations)),
                ],
            );
        }
        self.phase = next;
    }
}

/// Checks the run limits before a plan step is executed.
pub fn enforce_run_limits(
    limits: &RunLimitsConfig,
    iterations: u32,
    elapsed: Duration,
) -> Option<AbortReason> {
    if !limits.enforce_limits {
        return None;
    }
    if iterations >= limits.max_iterations {
        return Some(AbortReason::IterationLimit {
            max_iterations: limits.max_iterations,
        });
    }
    if elapsed > limits.max_execution_time() {
        return Some(AbortReason::TimeBudgetExhausted {
            max_seconds: limits.max_execution_time_seconds,
        });
    }
    None
}

/// The plan, select, resolve, execute, observe loop.
pub struct Orchestrator<'a> {
    settings: &'a Settings,
    model: &'a dyn LanguageModel,
    index: &'a dyn CapabilityIndex,
    executor: &'a dyn CallExecutor,
    log: &'a RunLog,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        settings: &'a Settings,
        model: &'a dyn LanguageModel,
        index: &'a dyn CapabilityIndex,
        executor: &'a dyn CallExecutor,
        log: &'a RunLog,
    ) -> Self {
        Self {
            settings,
            model,
            index,
            executor,
            log,
        }
    }

    pub fn run(&self, query: &str) -> Result<RunOutcome, OrchestratorError> {
        let mut ctx = RunContext::new(query);
        self.log.info(
            "run.started",
            &[
                ("query", json!(query)),
                ("maxIterations", json!(self.settings.run.max_iterations)),
                ("enforceLimits", json!(self.settings.run.enforce_limits)),
            ],
        );

        let result = self.drive(&mut ctx);
        if let Err(err) = &result {
            self.log.event(
                LogLevel::Error,
                "run.failed",
                &[
                    ("phase", json!(ctx.phase.as_str())),
                    ("iteration", json!(ctx.iterations)),
                    ("error", json!(err.to_string())),
                ],
            );
        }
        result
    }

    /// Runs the loop and writes the artifact when the run completed. Aborted runs write nothing.
    pub fn run_and_persist(&self, query: &str) -> Result<RunOutcome, OrchestratorError> {
        let outcome = self.run(query)?;
        if let Some(artifact) = outcome.artifact() {
            let path = &self.settings.output.artifact_path;
            persist_artifact(artifact, path)?;
            self.log.info(
                "artifact.written",
                &[
                    ("path", json!(path.display().to_string())),
                    ("entries", json!(artifact.len())),
                ],
            );
        }
        Ok(outcome)
    }

    fn drive(&self, ctx: &mut RunContext) -> Result<RunOutcome, OrchestratorError> {
        let planner = GoalPlanner::new(self.model);
        let selector = ApiSelector::new(
            self.model,
            self.index,
            self.settings.run.selection_max_retries,
        );
        let resolver = ArgumentResolver::new(self.model);

        loop {
            ctx.transition(RunPhase::Planning, self.log);
            let decision = planner.plan(&ctx.query, &ctx.history)?;
            let step = match decision {
                PlannerDecision::OutOfDomain => {
                    self.log_planner_output(ctx, "out_of_domain", "");
                    return Ok(self.abort(ctx, AbortReason::OutOfDomain));
                }
                PlannerDecision::Finished { text, answer } => {
                    self.log_planner_output(ctx, "finished", &text);
                    return Ok(self.complete(ctx, answer));
                }
                PlannerDecision::Step(step) => {
                    self.log_planner_output(ctx, "step", &step);
                    step
                }
            };

            if let Some(reason) =
                enforce_run_limits(&self.settings.run, ctx.iterations, ctx.elapsed())
            {
                self.log.warn(
                    "run.limit",
                    &[
                        ("reason", json!(reason.code())),
                        ("iterations", json!(ctx.iterations)),
                        ("elapsedMs", json!(elapsed_ms(ctx))),
                    ],
                );
                return Ok(self.abort(ctx, reason));
            }
            ctx.iterations += 1;

            ctx.transition(RunPhase::Selecting, self.log);
            let selection = selector.select_root(&step, self.settings.catalog.root_top_k)?;
            self.log.info(
                "selector.root",
                &[
                    ("planStep", json!(step)),
                    ("candidates", json!(selection.candidates)),
                    ("selected", selected_name(&selection.outcome)),
                    ("retries", json!(selection.retries_used)),
                ],
            );
            let root = match selection.outcome {
                SelectionOutcome::Found(api) => api,
                SelectionOutcome::NotFound => {
                    let reason = AbortReason::RootSelectionFailed { plan_step: step };
                    return Ok(self.abort(ctx, reason));
                }
            };

            ctx.transition(RunPhase::Resolving, self.log);
            let resolution = {
                let query = ctx.query.as_str();
                let provenance = &ctx.provenance;
                let root_arguments =
                    self.resolve_arguments(&resolver, query, provenance, &root)?;
                resolve_dependencies(
                    root,
                    &root_arguments,
                    |argument: &str| -> Result<SelectionOutcome, OrchestratorError> {
                        self.log.info("dependency.pop", &[("argument", json!(argument))]);
                        let selection = selector
                            .select_producer(argument, self.settings.catalog.producer_top_k)?;
                        self.log.info(
                            "selector.producer",
                            &[
                                ("argument", json!(argument)),
                                ("candidates", json!(selection.candidates)),
                                ("selected", selected_name(&selection.outcome)),
                                ("retries", json!(selection.retries_used)),
                            ],
                        );
                        Ok(selection.outcome)
                    },
                    |producer| self.resolve_arguments(&resolver, query, provenance, producer),
                )?
            };

            let call = match resolution {
                DependencyResolution::Ready { call, trace } => {
                    if !trace.is_empty() {
                        self.log.info(
                            "dependency.resolved",
                            &[
                                ("executed", json!(call.api.api_name)),
                                ("trace", json!(trace)),
                            ],
                        );
                    }
                    call
                }
                DependencyResolution::ProducerNotFound { argument, .. } => {
                    let reason = AbortReason::ProducerSelectionFailed { argument };
                    return Ok(self.abort(ctx, reason));
                }
                DependencyResolution::Cycle { path, .. } => {
                    return Ok(self.abort(ctx, AbortReason::DependencyCycle { path }));
                }
            };

            ctx.transition(RunPhase::Executing, self.log);
            let api_name = call.api.api_name;
            let bound = bind_arguments(&call.arguments, &ctx.provenance);
            let outcome = self.executor.run(&ApiCall {
                api_name: api_name.clone(),
                arguments: call.arguments,
            })?;
            let observation = outcome.observation(&api_name);
            self.log.info(
                "executor.call",
                &[
                    ("api", json!(api_name)),
                    ("status", json!(outcome.status)),
                    ("observation", json!(observation)),
                ],
            );

            ctx.transition(RunPhase::Recording, self.log);
            let sequence_no =
                ctx.call_tree
                    .append(api_name.clone(), bound, outcome.status, outcome.outputs.clone());
            if outcome.is_success() {
                let recorded = ctx.provenance.record_outputs(sequence_no, &outcome.outputs);
                self.log.info(
                    "provenance.recorded",
                    &[
                        ("sequenceNo", json!(sequence_no)),
                        ("api", json!(api_name)),
                        ("fields", json!(recorded)),
                    ],
                );
            }
            ctx.history.push(step, observation);
            ctx.transition(RunPhase::Replanning, self.log);
        }
    }

    fn resolve_arguments(
        &self,
        resolver: &ArgumentResolver<'_>,
        query: &str,
        provenance: &ProvenanceTable,
        api: &ApiDescriptor,
    ) -> Result<ArgumentSet, OrchestratorError> {
        let documentation = self.index.documentation(&api.data_source)?;
        let resolved = resolver.resolve(query, &documentation, provenance)?;
        if let Some(reason) = &resolved.malformed {
            self.log.warn(
                "arguments.malformed",
                &[("api", json!(api.api_name)), ("reason", json!(reason))],
            );
        }
        self.log.info(
            "arguments.resolved",
            &[
                ("api", json!(api.api_name)),
                ("arguments", Value::Object(resolved.arguments.resolved())),
                ("missing", json!(resolved.arguments.missing())),
            ],
        );
        Ok(resolved.arguments)
    }

    fn log_planner_output(&self, ctx: &RunContext, kind: &str, text: &str) {
        self.log.info(
            "planner.output",
            &[
                ("iteration", json!(ctx.iterations)),
                ("kind", json!(kind)),
                ("text", json!(text)),
            ],
        );
    }

    fn complete(&self, ctx: &mut RunContext, final_answer: String) -> RunOutcome {
        ctx.transition(RunPhase::TerminatedFinal, self.log);
        let artifact = assemble(&ctx.call_tree);
        self.log.info(
            "run.completed",
            &[
                ("calls", json!(ctx.call_tree.len())),
                ("iterations", json!(ctx.iterations)),
                ("finalAnswer", json!(final_answer)),
                ("elapsedMs", json!(elapsed_ms(ctx))),
            ],
        );
        RunOutcome::Completed(CompletedRun {
            artifact,
            final_answer,
            call_tree: std::mem::take(&mut ctx.call_tree),
            history: std::mem::take(&mut ctx.history),
        })
    }

    fn abort(&self, ctx: &mut RunContext, reason: AbortReason) -> RunOutcome {
        ctx.transition(RunPhase::TerminatedEmpty, self.log);
        self.log.warn(
            "run.aborted",
            &[
                ("reason", json!(reason.code())),
                ("detail", json!(reason.to_string())),
                ("iterations", json!(ctx.iterations)),
                ("elapsedMs", json!(elapsed_ms(ctx))),
            ],
        );
        RunOutcome::Aborted(AbortedRun {
            reason,
            history: std::mem::take(&mut ctx.history),
            call_tree: std::mem::take(&mut ctx.call_tree),
        })
    }
}

fn selected_name(outcome: &SelectionOutcome) -> Value {
    match outcome {
        SelectionOutcome::Found(api) => json!(api.api_name),
        SelectionOutcome::NotFound => Value::Null,
    }
}

fn elapsed_ms(ctx: &RunContext) -> u64 {
    u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_iterations: u32, enforce: bool) -> RunLimitsConfig {
        RunLimitsConfig {
            max_iterations,
            max_execution_time_seconds: 5,
            enforce_limits: enforce,
            selection_max_retries: 1,
        }
    }

    #[test]
    fn iteration_limit_trips_at_the_configured_count() {
        assert_eq!(enforce_run_limits(&limits(2, true), 1, Duration::ZERO), None);
        assert_eq!(
            enforce_run_limits(&limits(2, true), 2, Duration::ZERO),
            Some(AbortReason::IterationLimit { max_iterations: 2 })
        );
    }

    #[test]
    fn time_budget_trips_after_exceeding_maximum() {
        assert_eq!(
            enforce_run_limits(&limits(10, true), 0, Duration::from_secs(5)),
            None
        );
        assert_eq!(
            enforce_run_limits(&limits(10, true), 0, Duration::from_secs(6)),
            Some(AbortReason::TimeBudgetExhausted { max_seconds: 5 })
        );
    }

    #[test]
    fn disabled_limits_never_trip() {
        assert_eq!(
            enforce_run_limits(&limits(1, false), 100, Duration::from_secs(600)),
            None
        );
    }

    #[test]
    fn aborted_outcome_renders_empty_result() {
        let outcome = RunOutcome::Aborted(AbortedRun {
            reason: AbortReason::OutOfDomain,
            history: History::new(),
            call_tree: CallTree::new(),
        });
        assert_eq!(outcome.render_result().expect("render"), "[]");
        assert!(outcome.artifact().is_none());
    }

    #[test]
    fn abort_reasons_describe_themselves() {
        let reason = AbortReason::DependencyCycle {
            path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(reason.to_string(), "dependency cycle: a -> b -> a");
        assert_eq!(reason.code(), "dependency_cycle");
        assert!(RunPhase::TerminatedEmpty.is_terminal());
        assert!(!RunPhase::Replanning.is_terminal());
    }
}
