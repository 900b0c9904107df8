//! The workflows a front end triggers.
//!
//! Each workflow runs its stages strictly in order and stops at the first
//! failure. Stages that cannot start (missing tools or inputs, another
//! process still running) abort the workflow with a [`PipelineError`] after
//! a notification has been published.

use super::result::{StageFailure, StageResult};
use super::session::PipelineSession;
use crate::core::{PipelineEvent, ProjectContext, StageKind};
use crate::diagnostics::{function_occurrences, unused_functions, FunctionOccurrence};
use crate::errors::{PipelineError, PreconditionError};
use crate::observability::SpanTimer;
use crate::project::{
    scanner, set_up_project, tracked_functions, write_trace_config, ProjectUpdate, SetupOutcome,
    Workspace,
};
use crate::stages::{
    Assemble, CompileC, CompileSpecification, PatchAssembly, RunBinary, RunInstrumentedBinary,
    RunVerificationServer, Stage, StageContext, VerificationReport,
};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Returns early from a workflow when a stage failed.
macro_rules! try_stage {
    ($result:expr) => {
        match $result? {
            StageResult::Success(value) => value,
            StageResult::Failure(failure) => return Ok(StageResult::Failure(failure)),
        }
    };
}

/// Files of the active project, split by language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SplitViewLayout {
    /// The project the files belong to.
    pub root: PathBuf,
    /// C sources, shown on the left.
    pub c_files: Vec<PathBuf>,
    /// Specifications, shown on the right.
    pub spec_files: Vec<PathBuf>,
}

/// Drives the toolchain for the active project.
pub struct Orchestrator {
    session: Arc<PipelineSession>,
    workspace: Arc<dyn Workspace>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator over `workspace`.
    #[must_use]
    pub fn new(session: Arc<PipelineSession>, workspace: Arc<dyn Workspace>) -> Self {
        Self { session, workspace }
    }

    /// The shared session.
    #[must_use]
    pub fn session(&self) -> &Arc<PipelineSession> {
        &self.session
    }

    /// Compiles the C sources natively and runs the binary.
    ///
    /// Succeeds with the program's stdout.
    pub async fn compile_and_run_c(&self) -> Result<StageResult<String>, PipelineError> {
        self.workflow("compile_and_run_c", async {
            let project = self.require_project().await?;
            ensure_output_dir(&project)?;
            self.save_all_editors();

            try_stage!(self.run_stage(&project, &CompileC::native()).await);
            let output = try_stage!(self.run_stage(&project, &RunBinary).await);
            Ok::<_, PipelineError>(StageResult::Success(output))
        })
        .await
    }

    /// Builds, instruments and runs the project, then verifies the trace.
    pub async fn compile_and_run_project(
        &self,
    ) -> Result<StageResult<VerificationReport>, PipelineError> {
        self.workflow("compile_and_run_project", async {
            let project = self.require_project().await?;
            ensure_output_dir(&project)?;
            let config = self.session.config();
            write_trace_config(&project, &config.formatting, config.mode())?;
            self.save_editors_active_last();

            try_stage!(self.run_stage(&project, &CompileC::intermediate()).await);
            try_stage!(self.run_stage(&project, &PatchAssembly).await);
            try_stage!(self.run_stage(&project, &Assemble).await);
            try_stage!(self.run_stage(&project, &RunInstrumentedBinary).await);
            try_stage!(self.run_stage(&project, &CompileSpecification).await);
            let report = try_stage!(self.run_stage(&project, &RunVerificationServer).await);

            self.session
                .emit(PipelineEvent::VerificationOutput {
                    output: report.output.clone(),
                    started_at: report.started_at,
                })
                .await;
            Ok::<_, PipelineError>(StageResult::Success(report))
        })
        .await
    }

    /// Compiles the C sources, natively or to `<bin>.bc`.
    pub async fn build_c(&self, emit_llvm: bool) -> Result<StageResult<PathBuf>, PipelineError> {
        self.workflow("build_c", async {
            let project = self.require_project().await?;
            ensure_output_dir(&project)?;
            self.run_stage(&project, &CompileC { emit_llvm }).await
        })
        .await
    }

    /// Runs the binary of an earlier native build.
    pub async fn run_binary(&self) -> Result<StageResult<String>, PipelineError> {
        self.workflow("run_binary", async {
            let project = self.require_project().await?;
            self.run_stage(&project, &RunBinary).await
        })
        .await
    }

    /// Kills the running subprocess, if any.
    pub fn cancel(&self) -> bool {
        self.session.cancel()
    }

    /// Makes the project rooted at `root` active.
    pub async fn open_project(&self, root: &Path) -> ProjectUpdate {
        let update = self.session.tracker().activate(root);
        self.publish_update(&update).await;
        update
    }

    /// The focused editor changed to `file`; `None` for an untitled buffer.
    pub async fn on_file_changed(&self, file: Option<&Path>) -> ProjectUpdate {
        let root = file.and_then(|file| self.workspace.project_root_for(file));
        let update = self.session.tracker().file_changed(root.as_deref());
        self.publish_update(&update).await;
        update
    }

    /// `file` was saved or opened.
    pub async fn on_file_saved_or_added(&self, file: &Path) -> ProjectUpdate {
        let Some(root) = self.workspace.project_root_for(file) else {
            return ProjectUpdate::Unchanged;
        };
        let update = self.session.tracker().file_saved_or_added(&root);
        self.publish_update(&update).await;
        update
    }

    /// The last editor was closed.
    pub async fn on_no_open_file(&self) -> ProjectUpdate {
        let update = self.session.tracker().no_open_file();
        self.publish_update(&update).await;
        update
    }

    /// Writes the linter configuration into the active project.
    pub async fn set_up_project_structure(&self) -> Result<SetupOutcome, PipelineError> {
        let project = self.require_project().await?;
        let outcome = set_up_project(project.root())?;
        if outcome == SetupOutcome::CompilerMissing {
            self.session
                .emit(PipelineEvent::warning(
                    "Could not set up the project",
                    "No clang compiler was found on the PATH, so no linter configuration was written.",
                ))
                .await;
        }
        Ok(outcome)
    }

    /// Finds the functions the specification tracks that no C source calls.
    ///
    /// Publishes where the specification references them.
    pub async fn highlight_unused_functions(
        &self,
    ) -> Result<Vec<FunctionOccurrence>, PipelineError> {
        let project = self.require_project().await?;
        let Some(spec) = scanner::spec_files(project.root()).into_iter().next() else {
            let err = PreconditionError::NoSpecification {
                root: project.root().to_path_buf(),
            };
            self.report_precondition(&err).await;
            return Err(err.into());
        };

        let spec_text = std::fs::read_to_string(&spec)?;
        let sources = scanner::c_sources(project.root())
            .iter()
            .map(std::fs::read_to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let unused = unused_functions(&tracked_functions(&spec_text), &sources);
        let occurrences = function_occurrences(&spec_text, &unused);
        debug!(spec = %spec.display(), unused = ?unused, "Unused tracked functions");

        self.session
            .emit(PipelineEvent::UnusedFunctions {
                file: spec,
                occurrences: occurrences.clone(),
            })
            .await;
        Ok(occurrences)
    }

    /// Splits the active editor's project into C and specification files.
    ///
    /// Returns `None`, after a warning, when there is no usable editor or the
    /// project has neither kind of file.
    pub async fn split_view_layout(&self) -> Option<SplitViewLayout> {
        let root = self
            .workspace
            .active_editor()
            .and_then(|file| self.workspace.project_root_for(&file));
        let Some(root) = root else {
            self.session
                .emit(PipelineEvent::warning(
                    "Could not set up the split view",
                    "No project is currently active. At least one file must be active to set up the split view.",
                ))
                .await;
            return None;
        };

        let update = self.session.tracker().activate(&root);
        self.publish_update(&update).await;

        let layout = SplitViewLayout {
            c_files: scanner::c_sources(&root),
            spec_files: scanner::spec_files(&root),
            root,
        };
        if layout.c_files.is_empty() && layout.spec_files.is_empty() {
            self.session
                .emit(PipelineEvent::warning(
                    "Could not set up the split view",
                    "There are no \".tessla\" and \".c\" files to put into split view in the current project.",
                ))
                .await;
            return None;
        }
        Some(layout)
    }

    async fn workflow<T, F>(
        &self,
        name: &'static str,
        steps: F,
    ) -> Result<StageResult<T>, PipelineError>
    where
        F: Future<Output = Result<StageResult<T>, PipelineError>>,
    {
        let run_id = Uuid::new_v4();
        let timer = SpanTimer::start(name);
        let span = info_span!("workflow", workflow = name, %run_id, session = %self.session.id());
        let result = steps.instrument(span).await;

        match result {
            Ok(StageResult::Success(_)) => {
                info!(workflow = name, %run_id, duration_ms = timer.finish(), "Workflow succeeded");
            }
            Ok(StageResult::Failure(ref failure)) => {
                warn!(
                    workflow = name,
                    %run_id,
                    stage = %failure.stage,
                    duration_ms = timer.finish(),
                    "Workflow stopped at failing stage"
                );
            }
            Err(ref err) => {
                warn!(workflow = name, %run_id, error = %err, "Workflow aborted");
            }
        }
        result
    }

    async fn run_stage<S: Stage>(
        &self,
        project: &ProjectContext,
        stage: &S,
    ) -> Result<StageResult<S::Artifact>, PipelineError> {
        let kind = stage.kind();
        let ctx = StageContext::new(project, self.session.config());

        let plan = match stage.plan(&ctx) {
            Ok(plan) => plan,
            Err(err) => {
                self.report_precondition(&err).await;
                return Err(err.into());
            }
        };
        for warning in &plan.warnings {
            warn!(stage = %kind, title = %warning.title, "{}", warning.detail);
            self.session
                .emit(PipelineEvent::warning(&warning.title, &warning.detail))
                .await;
        }

        let ticket = match self.session.guard().acquire(kind) {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!(stage = %kind, error = %err, "Stage rejected");
                self.session
                    .emit(PipelineEvent::warning("A process is already running", err.to_string()))
                    .await;
                return Err(err);
            }
        };
        if let Err(err) = stage.before_spawn(&ctx) {
            warn!(stage = %kind, error = %err, "Failed to prepare stage");
            self.session
                .emit(PipelineEvent::warning(
                    format!("Unable to prepare {kind}"),
                    err.to_string(),
                ))
                .await;
            return Err(err.into());
        }

        let command = plan.command.to_string();
        debug!(stage = %kind, command = %command, "Stage command");
        self.session
            .emit(PipelineEvent::StageStarted {
                stage: kind,
                command: command.clone(),
            })
            .await;
        self.session.emit(PipelineEvent::controls(true)).await;

        let outcome = self
            .session
            .runner()
            .run(ticket, &plan.command, stage.echo_stdout())
            .await;

        match stage.interpret(&ctx, &plan, &outcome) {
            Ok(artifact) => {
                let summary = stage.success_summary();
                info!(stage = %kind, command = %command, "Stage succeeded");
                self.session
                    .emit(PipelineEvent::log(&command, summary.map(str::to_string)))
                    .await;
                if let Some(summary) = summary {
                    self.session
                        .emit(PipelineEvent::StageSucceeded {
                            stage: kind,
                            summary: summary.to_string(),
                        })
                        .await;
                }
                if kind == StageKind::CompileSpecification {
                    self.session.emit(PipelineEvent::SpecErrorsCleared).await;
                }
                Ok(StageResult::Success(artifact))
            }
            Err(reason) => {
                let summary = stage.failure_summary();
                warn!(
                    stage = %kind,
                    command = %command,
                    exit_code = ?outcome.exit_code,
                    signal = ?outcome.signal,
                    "Stage failed"
                );
                if !stage.echo_stdout() && !outcome.stdout_chunks.is_empty() {
                    self.session
                        .emit(PipelineEvent::error_text(kind, outcome.stdout()))
                        .await;
                }
                self.session
                    .emit(PipelineEvent::log(&command, Some(summary.to_string())))
                    .await;
                self.session
                    .emit(PipelineEvent::StageFailed {
                        stage: kind,
                        summary: summary.to_string(),
                        detail: reason.detail.clone(),
                    })
                    .await;
                if let (Some(error), Some(file)) = (&reason.spec_error, &plan.input) {
                    self.session
                        .emit(PipelineEvent::SpecError {
                            file: file.clone(),
                            error: error.clone(),
                        })
                        .await;
                }

                Ok(StageResult::Failure(StageFailure {
                    stage: kind,
                    summary: summary.to_string(),
                    detail: reason.detail,
                    command,
                    exit_code: outcome.exit_code,
                    signal: outcome.signal,
                    spec_error: reason.spec_error,
                }))
            }
        }
    }

    async fn require_project(&self) -> Result<ProjectContext, PipelineError> {
        match self.session.project() {
            Some(project) => Ok(project),
            None => {
                let err = PreconditionError::NoActiveProject;
                self.report_precondition(&err).await;
                Err(err.into())
            }
        }
    }

    async fn report_precondition(&self, err: &PreconditionError) {
        warn!(title = err.title(), error = %err, "Precondition failed");
        self.session
            .emit(PipelineEvent::PreconditionFailed {
                title: err.title().to_string(),
                detail: err.to_string(),
            })
            .await;
    }

    async fn publish_update(&self, update: &ProjectUpdate) {
        match update {
            ProjectUpdate::Changed(project) => {
                info!(
                    root = ?project.as_ref().map(ProjectContext::root),
                    "Active project changed"
                );
                self.session
                    .emit(PipelineEvent::ActiveProjectChanged {
                        project: project.clone(),
                    })
                    .await;
                if let Some(project) = project {
                    self.set_up_quietly(project.root());
                }
            }
            ProjectUpdate::Refreshed(project) => {
                self.session
                    .emit(PipelineEvent::ProjectRefreshed {
                        project: project.clone(),
                    })
                    .await;
            }
            ProjectUpdate::Unchanged => {}
        }
    }

    fn set_up_quietly(&self, root: &Path) {
        match set_up_project(root) {
            Ok(outcome) => debug!(root = %root.display(), ?outcome, "Project setup"),
            Err(err) => warn!(root = %root.display(), error = %err, "Project setup failed"),
        }
    }

    fn save_all_editors(&self) {
        for editor in self.workspace.open_editors() {
            self.save_editor(&editor);
        }
    }

    fn save_editors_active_last(&self) {
        let active = self.workspace.active_editor();
        for editor in self.workspace.open_editors() {
            if active.as_ref() != Some(&editor) {
                self.save_editor(&editor);
            }
        }
        if let Some(active) = active {
            self.save_editor(&active);
        }
    }

    fn save_editor(&self, path: &Path) {
        if let Err(err) = self.workspace.save(path) {
            warn!(path = %path.display(), error = %err, "Failed to save editor");
        }
    }
}

fn ensure_output_dir(project: &ProjectContext) -> std::io::Result<()> {
    std::fs::create_dir_all(project.output_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolchainConfig;
    use crate::events::CollectingEventSink;
    use crate::project::MockWorkspace;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn build(workspace: MockWorkspace) -> (Orchestrator, Arc<CollectingEventSink>) {
        let sink = Arc::new(CollectingEventSink::new());
        let session = Arc::new(PipelineSession::new(ToolchainConfig::default(), sink.clone()));
        (Orchestrator::new(session, Arc::new(workspace)), sink)
    }

    #[tokio::test]
    async fn test_workflows_require_project() {
        let (orchestrator, sink) = build(MockWorkspace::new());

        let err = orchestrator.compile_and_run_project().await.unwrap_err();
        assert!(matches!(
            err.as_precondition(),
            Some(PreconditionError::NoActiveProject)
        ));
        assert!(orchestrator.compile_and_run_c().await.is_err());
        assert!(orchestrator.build_c(false).await.is_err());
        assert!(orchestrator.run_binary().await.is_err());

        assert_eq!(sink.events_of_type("precondition_failed").len(), 4);
        assert!(sink.events_of_type("stage_started").is_empty());
    }

    #[tokio::test]
    async fn test_file_changed_activates_and_sets_up() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("my app");
        std::fs::create_dir_all(&root).unwrap();
        let file = root.join("main.c");

        let mut workspace = MockWorkspace::new();
        let resolved = root.clone();
        workspace
            .expect_project_root_for()
            .with(eq(file.clone()))
            .returning(move |_| Some(resolved.clone()));
        let (orchestrator, sink) = build(workspace);

        let update = orchestrator.on_file_changed(Some(&file)).await;
        match update {
            ProjectUpdate::Changed(Some(project)) => {
                assert_eq!(project.binary_name(), "my_app");
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert_eq!(sink.events_of_type("active_project_changed").len(), 1);

        assert_eq!(
            orchestrator.on_file_changed(Some(&file)).await,
            ProjectUpdate::Unchanged
        );
        assert_eq!(orchestrator.on_file_changed(None).await, ProjectUpdate::Unchanged);

        assert!(matches!(
            orchestrator.on_file_saved_or_added(&file).await,
            ProjectUpdate::Refreshed(_)
        ));
        assert_eq!(sink.events_of_type("project_refreshed").len(), 1);

        assert_eq!(
            orchestrator.on_no_open_file().await,
            ProjectUpdate::Changed(None)
        );
        assert!(orchestrator.session().project().is_none());
    }

    #[tokio::test]
    async fn test_saved_file_outside_projects_is_ignored() {
        let mut workspace = MockWorkspace::new();
        workspace.expect_project_root_for().returning(|_| None);
        let (orchestrator, sink) = build(workspace);

        assert_eq!(
            orchestrator.on_file_saved_or_added(Path::new("/tmp/notes.txt")).await,
            ProjectUpdate::Unchanged
        );
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_project_workflow_saves_active_editor_last() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("demo");
        std::fs::create_dir_all(&root).unwrap();
        let active = root.join("spec.tessla");
        let other = root.join("main.c");

        let mut workspace = MockWorkspace::new();
        let editors = vec![active.clone(), other.clone()];
        workspace
            .expect_open_editors()
            .returning(move || editors.clone());
        let focused = active.clone();
        workspace
            .expect_active_editor()
            .returning(move || Some(focused.clone()));
        let mut seq = Sequence::new();
        workspace
            .expect_save()
            .with(eq(other.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        workspace
            .expect_save()
            .with(eq(active.clone()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let (orchestrator, _sink) = build(workspace);
        orchestrator.open_project(&root).await;

        // No C sources, so the first stage refuses to start.
        let err = orchestrator.compile_and_run_project().await.unwrap_err();
        assert!(matches!(
            err.as_precondition(),
            Some(PreconditionError::NoCSources { .. }) | Some(PreconditionError::ClangNotFound { .. })
        ));
        assert!(root.join("build").join("zlog.conf").exists());
    }

    #[tokio::test]
    async fn test_split_view_layout() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("demo");
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/main.c"), "int main() {}").unwrap();
        std::fs::write(root.join("spec.tessla"), "").unwrap();

        let mut workspace = MockWorkspace::new();
        let active = root.join("src/main.c");
        workspace
            .expect_active_editor()
            .returning(move || Some(active.clone()));
        let resolved = root.clone();
        workspace
            .expect_project_root_for()
            .returning(move |_| Some(resolved.clone()));
        let (orchestrator, _sink) = build(workspace);

        let layout = orchestrator.split_view_layout().await.unwrap();
        assert_eq!(layout.c_files, vec![root.join("src/main.c")]);
        assert_eq!(layout.spec_files, vec![root.join("spec.tessla")]);
        assert_eq!(
            orchestrator.session().project().unwrap().root(),
            root.as_path()
        );
    }

    #[tokio::test]
    async fn test_split_view_without_files_warns() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();

        let mut workspace = MockWorkspace::new();
        workspace
            .expect_active_editor()
            .returning(|| Some(PathBuf::from("/x/readme.md")));
        workspace
            .expect_project_root_for()
            .returning(move |_| Some(root.clone()));
        let (orchestrator, sink) = build(workspace);

        assert!(orchestrator.split_view_layout().await.is_none());
        assert_eq!(sink.events_of_type("warning").len(), 1);

        let mut workspace = MockWorkspace::new();
        workspace.expect_active_editor().returning(|| None);
        let (orchestrator, sink) = build(workspace);
        assert!(orchestrator.split_view_layout().await.is_none());
        assert_eq!(sink.events_of_type("warning").len(), 1);
    }

    #[tokio::test]
    async fn test_highlight_unused_functions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("demo");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(
            root.join("main.c"),
            "int add(int a, int b) { return a + b; }\nint main() { return add(1, 2); }\n",
        )
        .unwrap();
        std::fs::write(
            root.join("spec.tessla"),
            "define a := function_calls(\"add\")\ndefine s := function_calls(\"sub\")\n",
        )
        .unwrap();

        let (orchestrator, sink) = build(MockWorkspace::new());
        orchestrator.open_project(&root).await;

        let occurrences = orchestrator.highlight_unused_functions().await.unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].function, "sub");
        assert_eq!(occurrences[0].line, 1);
        assert_eq!(sink.events_of_type("unused_functions").len(), 1);
    }
}
