//! flow-core: builder incremental de pipelines de estudio
//!
//! A partir del esquema de artifacts de un estudio y de un snapshot del
//! archivo, construye el grafo de ejecución mínimo que produce los outputs
//! pedidos, conectando prerequisitos una sola vez por corrida.
pub mod archive;
pub mod assembler;
pub mod constants;
pub mod convert;
pub mod errors;
pub mod exec;
pub mod graph;
pub mod hashing;
pub mod iteration;
pub mod model;
pub mod prerequisites;
pub mod registry;
pub mod router;
pub mod selector;
pub mod step;
pub mod study;

pub use archive::{Archive, InMemoryArchive, SinkBinding, SourceBinding};
pub use assembler::{Assembly, ConnectRequest, PipelineAssembler, RunOutcome, StepTrace};
pub use convert::FormatConverter;
pub use errors::{FlowError, FlowResult};
pub use exec::{Backend, BackendSettings, ExecutionEngine, ExecutionReport, NodeOutcome};
pub use graph::{Interface, Node, NodeId, NodeKind, ReportKind, Resources, WorkflowGraph};
pub use iteration::{build_iteration_space, IterationSpace, VisitAxis};
pub use model::{ArtifactSpec, Completion, FileFormat, Multiplicity, OptionSet, Project, ReportToken, SessionRef};
pub use prerequisites::{resolve_prerequisites, RunCache};
pub use registry::{SpecTable, StepFactory, StudySchema};
pub use selector::{select_work, ReprocessMode, WorkSet};
pub use step::{InvocationState, StepBuilder, StepDeclaration, StepIdentity, StepPort, StepSpec};
pub use study::Study;
