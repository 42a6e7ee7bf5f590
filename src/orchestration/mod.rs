pub mod arguments;
pub mod assembler;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod history;
pub mod planner;
pub mod prompts;
pub mod provenance;
pub mod selector;

pub use arguments::{ArgumentResolution, ArgumentResolver, ArgumentSet};
pub use assembler::{assemble, persist_artifact, ArtifactArgument, ArtifactEntry, FinalArtifact};
pub use dependency::{resolve_dependencies, DependencyResolution, DependencyStack};
pub use engine::{
    AbortReason, AbortedRun, CompletedRun, Orchestrator, RunContext, RunOutcome, RunPhase,
    EMPTY_RESULT,
};
pub use error::{ModelStage, OrchestratorError};
pub use history::History;
pub use planner::{GoalPlanner, PlannerDecision};
pub use provenance::{BackReference, CallRecord, CallTree, ProvenanceTable};
pub use selector::{ApiDescriptor, ApiSelector, SelectionOutcome};
