//! The research state machine.
//!
//! ```text
//! INITIALIZE → DECOMPOSE → SELECT_STRATEGY → EXECUTE_ITERATION → VALIDATE
//!   → SCORE_QUALITY → CHECK_STOPPING ─┬─ continue ────────────────→ SELECT_STRATEGY
//!                                      ├─ synthesize_sub_question → SELECT_STRATEGY
//!                                      └─ synthesize_final ────────→ END
//! any stage ─ unrecoverable error → ERROR → SYNTHESIZE_FINAL → END
//! ```
//!
//! One logical worker drives a session: sub-questions are researched
//! strictly one at a time, and every external call is awaited (or timed
//! out) before the next stage runs. The orchestrator is the only owner of
//! the session's counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Instrument, debug, info, info_span, warn};

use super::budget::allocate;
use super::config::ResearchConfig;
use super::evidence::{Finding, Source};
use super::executor::TaskExecutor;
use super::quality::{score_quality, validate};
use super::session::{ResearchSession, SessionStatus};
use super::stopping::{StopAction, StopReason, StoppingInput, check_stopping};
use super::strategy::{HeuristicPlanner, PlanningContext, StrategyPlanner, Task};
use crate::agent::client::create_consultant;
use crate::agent::config::{AgentConfig, TokenLimits};
use crate::agent::consultant::{ConsultationResult, ModelConsultant};
use crate::agent::decomposer::DecomposerAgent;
use crate::agent::prompt::{
    PromptSet, SessionCounters, build_decomposer_prompt, build_flat_synthesis_prompt,
    build_meta_synthesis_prompt, build_sub_synthesis_prompt,
};
use crate::agent::researcher::{ConsultantTaskExecutor, ResearchAgent};
use crate::agent::synthesizer::{
    MetaSynthesizerAgent, SubSynthesizerAgent, by_priority, concatenate_findings,
    concatenate_sub_answers, failed_synthesis_placeholder,
};
use crate::agent::traits::Agent;
use crate::error::{AgentError, ResearchError};

/// Longest accepted query, in bytes.
pub const MAX_QUERY_LEN: usize = 10_000;

/// Orchestrator states after `INITIALIZE`. `END` is the loop exit.
#[derive(Debug)]
enum Stage {
    Decompose,
    SelectStrategy,
    ExecuteIteration(Vec<Task>),
    Validate(Vec<Finding>, Vec<Source>),
    ScoreQuality { new_findings: usize },
    CheckStopping,
    SynthesizeSubQuestion,
    SynthesizeFinal,
    Error(ResearchError),
}

impl Stage {
    const fn name(&self) -> &'static str {
        match self {
            Self::Decompose => "decompose",
            Self::SelectStrategy => "select_strategy",
            Self::ExecuteIteration(_) => "execute_iteration",
            Self::Validate(..) => "validate",
            Self::ScoreQuality { .. } => "score_quality",
            Self::CheckStopping => "check_stopping",
            Self::SynthesizeSubQuestion => "synthesize_sub_question",
            Self::SynthesizeFinal => "synthesize_final",
            Self::Error(_) => "error",
        }
    }
}

/// Drives research sessions from query to final answer.
///
/// Holds the three external collaborators and the role agents. It keeps no
/// per-session state, so one orchestrator can run many sessions, including
/// concurrently.
pub struct Orchestrator {
    consultant: Arc<dyn ModelConsultant>,
    planner: Arc<dyn StrategyPlanner>,
    executor: Arc<dyn TaskExecutor>,
    decomposer: DecomposerAgent,
    sub_synthesizer: SubSynthesizerAgent,
    meta_synthesizer: MetaSynthesizerAgent,
}

impl Orchestrator {
    /// Creates an orchestrator over explicit collaborators.
    #[must_use]
    pub fn new(
        consultant: Arc<dyn ModelConsultant>,
        planner: Arc<dyn StrategyPlanner>,
        executor: Arc<dyn TaskExecutor>,
        prompts: &PromptSet,
        limits: TokenLimits,
    ) -> Self {
        Self {
            consultant,
            planner,
            executor,
            decomposer: DecomposerAgent::new(limits.decomposer, prompts.decomposer.clone()),
            sub_synthesizer: SubSynthesizerAgent::new(
                limits.synthesizer,
                prompts.sub_synthesizer.clone(),
            ),
            meta_synthesizer: MetaSynthesizerAgent::new(
                limits.synthesizer,
                prompts.meta_synthesizer.clone(),
            ),
        }
    }

    /// Creates an orchestrator backed by the configured model provider.
    ///
    /// Research tasks run as researcher consultations and are planned by
    /// the [`HeuristicPlanner`]. Prompts are loaded from
    /// [`AgentConfig::prompt_dir`], falling back to compiled-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedProvider`] for unknown providers.
    pub fn from_agent_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let consultant = create_consultant(config)?;
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let limits = config.token_limits();
        let executor = Arc::new(ConsultantTaskExecutor::new(
            Arc::clone(&consultant),
            ResearchAgent::new(limits.researcher, prompts.researcher.clone()),
        ));
        Ok(Self::new(
            consultant,
            Arc::new(HeuristicPlanner::new()),
            executor,
            &prompts,
            limits,
        ))
    }

    /// Researches `query` and returns the finished session.
    ///
    /// The session always ends with a final answer. Degraded outcomes are
    /// reported through [`ResearchSession::status`] and the session
    /// metadata, never as an error.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::InvalidQuery`] for an empty or oversized
    /// query and [`ResearchError::Config`] for an invalid configuration.
    /// No session is started in either case.
    pub async fn run(
        &self,
        query: &str,
        config: ResearchConfig,
    ) -> Result<ResearchSession, ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::InvalidQuery {
                message: "query cannot be empty".to_string(),
            });
        }
        if query.len() > MAX_QUERY_LEN {
            return Err(ResearchError::InvalidQuery {
                message: format!(
                    "query exceeds maximum length ({} bytes, max {MAX_QUERY_LEN})",
                    query.len()
                ),
            });
        }
        config.validate()?;

        // INITIALIZE
        let started = Instant::now();
        let mut session = ResearchSession::new(query, config);
        let span = info_span!(
            "research",
            session_id = %session.id(),
            hierarchical = session.hierarchical()
        );
        self.drive(&mut session, started).instrument(span).await;
        Ok(session)
    }

    async fn drive(&self, session: &mut ResearchSession, started: Instant) {
        let deadline = session.config().deadline.map(|d| started + d);
        info!(query_len = session.query().len(), "research session started");

        let mut stage = if session.hierarchical() {
            Stage::Decompose
        } else {
            Stage::SelectStrategy
        };
        loop {
            debug!(
                stage = stage.name(),
                iteration = session.global_iteration(),
                "entering stage"
            );
            stage = match stage {
                Stage::Decompose => {
                    self.decompose(session, deadline).await;
                    Stage::SelectStrategy
                }
                Stage::SelectStrategy => self.select_strategy(session, deadline).await,
                Stage::ExecuteIteration(tasks) => {
                    self.execute_iteration(session, tasks, deadline).await
                }
                Stage::Validate(findings, sources) => validate_batch(session, findings, sources),
                Stage::ScoreQuality { new_findings } => score(session, new_findings),
                Stage::CheckStopping => route(session, deadline_elapsed(deadline)),
                Stage::SynthesizeSubQuestion => {
                    self.synthesize_sub_question(session, deadline).await
                }
                Stage::SynthesizeFinal => {
                    self.synthesize_final(session).await;
                    break;
                }
                Stage::Error(e) => {
                    warn!(error = %e, "unrecoverable error, forcing final synthesis");
                    let metadata = session.metadata_mut();
                    metadata.error = Some(e.to_string());
                    metadata.stop_reason = Some(StopReason::Error);
                    Stage::SynthesizeFinal
                }
            };
        }

        let elapsed_ms = millis(started.elapsed());
        session.metadata_mut().elapsed_ms = elapsed_ms;
        info!(
            status = %session.status(),
            iterations = session.global_iteration(),
            findings = session.findings().len(),
            sources = session.sources().len(),
            cost = session.metadata().cost_spent,
            elapsed_ms,
            "research session finished"
        );
    }

    /// Runs the decomposer once. Any failure switches the session to flat
    /// mode for the rest of the run.
    async fn decompose(&self, session: &mut ResearchSession, deadline: Option<Instant>) {
        let min = session.config().min_sub_questions;
        let max = session.config().max_sub_questions;
        let prompt = build_decomposer_prompt(session.query(), min, max);
        let consultation = self
            .consult(session, &self.decomposer, prompt, deadline)
            .await;

        match DecomposerAgent::from_consultation(&consultation, min, max) {
            Ok(sub_questions) => {
                info!(count = sub_questions.len(), "query decomposed");
                session.set_sub_questions(sub_questions);
            }
            Err(e) => {
                let e = ResearchError::from(e);
                warn!(error = %e, "decomposition failed, continuing as flat research");
                session.disable_hierarchical(e.to_string());
            }
        }
    }

    async fn select_strategy(&self, session: &mut ResearchSession, deadline: Option<Instant>) -> Stage {
        // Caps may have been crossed by a synthesis call since the last check.
        let guard = check_stopping(&StoppingInput::from_session(
            session,
            deadline_elapsed(deadline),
        ));
        if guard.reason.is_global_cap() {
            return force_final(session, guard.reason);
        }

        if session.hierarchical() && session.current_sub_question_id().is_none() {
            let Some(allocation) = allocate(session) else {
                info!("all sub-questions complete");
                session.metadata_mut().stop_reason = Some(StopReason::AllSubQuestionsComplete);
                return Stage::SynthesizeFinal;
            };
            let id = allocation.sub_question_id;
            let Some(sub_question) = session.sub_question_mut(id) else {
                return Stage::Error(ResearchError::Planning {
                    message: format!("allocator selected unknown sub-question {id}"),
                });
            };
            if let Err(e) = sub_question.start_research(allocation.iteration_budget) {
                return Stage::Error(e);
            }
            info!(
                sub_question = %id,
                priority = sub_question.priority,
                budget = allocation.iteration_budget,
                raw_share = allocation.raw_share,
                "researching sub-question"
            );
            session.set_current_sub_question(Some(id));
        }

        let (scope_text, context) = planning_context(session);
        let timeout = call_timeout(session, deadline);
        match tokio::time::timeout(timeout, self.planner.plan(&scope_text, &context)).await {
            Ok(Ok(mut tasks)) => {
                tasks.truncate(context.max_tasks);
                if tasks.is_empty() {
                    return Stage::Error(ResearchError::Planning {
                        message: "planner returned no tasks".to_string(),
                    });
                }
                debug!(
                    strategy = %context.strategy(),
                    tasks = tasks.len(),
                    remaining = context.remaining_iterations,
                    "iteration planned"
                );
                Stage::ExecuteIteration(tasks)
            }
            Ok(Err(e)) => Stage::Error(e),
            Err(_) if deadline_elapsed(deadline) => force_final(session, StopReason::Deadline),
            Err(_) => Stage::Error(ResearchError::Timeout {
                operation: "planning".to_string(),
                secs: timeout.as_secs(),
            }),
        }
    }

    /// Runs one iteration's tasks and stages their output for validation.
    ///
    /// Failed tasks are logged and contribute nothing. Each task is cut
    /// short at the deadline, and no task starts after it.
    async fn execute_iteration(
        &self,
        session: &mut ResearchSession,
        tasks: Vec<Task>,
        deadline: Option<Instant>,
    ) -> Stage {
        let iteration = session.advance_iteration();
        let scope = session.current_sub_question_id();
        if let Some(id) = scope
            && let Some(sub_question) = session.sub_question_mut(id)
        {
            sub_question.iteration_count += 1;
        }

        let mut findings = Vec::new();
        let mut sources = Vec::new();
        for task in &tasks {
            if deadline_elapsed(deadline) {
                debug!(task = %task.id, "deadline reached, skipping remaining tasks");
                break;
            }
            let timeout = call_timeout(session, deadline);
            let ceiling = match reserve_call(session) {
                Ok(ceiling) => ceiling,
                Err(e) => {
                    warn!(task = %task.id, error = %e, "skipping remaining tasks");
                    record_tool_error(session, &task.id, &e);
                    break;
                }
            };

            match tokio::time::timeout(timeout, self.executor.execute(task, ceiling)).await {
                Ok(Ok(outcome)) => {
                    session.spend(outcome.cost);
                    if !outcome.success {
                        let e = ResearchError::ToolExecution {
                            task_id: task.id.clone(),
                            message: "no usable result".to_string(),
                        };
                        warn!(task = %task.id, cost = outcome.cost, "task produced no usable result");
                        record_tool_error(session, &task.id, &e);
                        continue;
                    }
                    findings.extend(outcome.findings.into_iter().map(|mut f| {
                        f.sub_question_id = scope;
                        f.iteration = iteration;
                        f
                    }));
                    sources.extend(outcome.sources.into_iter().map(|mut s| {
                        s.sub_question_id = scope;
                        s
                    }));
                }
                Ok(Err(e)) => {
                    warn!(task = %task.id, error = %e, "task failed");
                    record_tool_error(session, &task.id, &e);
                }
                Err(_) => {
                    let e = ResearchError::Timeout {
                        operation: format!("task {}", task.id),
                        secs: timeout.as_secs(),
                    };
                    warn!(task = %task.id, error = %e, "task timed out");
                    record_tool_error(session, &task.id, &e);
                }
            }
        }

        debug!(
            iteration,
            tasks = tasks.len(),
            findings = findings.len(),
            sources = sources.len(),
            "iteration executed"
        );
        Stage::Validate(findings, sources)
    }

    async fn synthesize_sub_question(
        &self,
        session: &mut ResearchSession,
        deadline: Option<Instant>,
    ) -> Stage {
        let Some(id) = session.current_sub_question_id() else {
            return Stage::SelectStrategy;
        };
        let Some(sub_question) = session.sub_question(id) else {
            return Stage::Error(ResearchError::Synthesis {
                message: format!("unknown sub-question {id}"),
            });
        };
        let findings = session.findings().scope(Some(id));
        let sources = session.sources().scope(Some(id));
        let prompt = build_sub_synthesis_prompt(sub_question, &findings, &sources);
        let quality = score_quality(&findings, sources.len(), 0).score;

        let consultation = self
            .consult(session, &self.sub_synthesizer, prompt, deadline)
            .await;
        let synthesis = if consultation.success {
            consultation.result
        } else {
            let reason = consultation.error_message();
            let e = ResearchError::Synthesis {
                message: reason.clone(),
            };
            warn!(sub_question = %id, error = %e, "sub-synthesis failed, storing placeholder");
            session
                .metadata_mut()
                .synthesis_errors
                .push(format!("{id}: {e}"));
            failed_synthesis_placeholder(&reason)
        };

        if let Some(sub_question) = session.sub_question_mut(id)
            && let Err(e) = sub_question.complete(synthesis, quality)
        {
            return Stage::Error(e);
        }
        session.set_current_sub_question(None);
        info!(sub_question = %id, quality, "sub-question complete");
        Stage::SelectStrategy
    }

    /// Produces the final answer.
    ///
    /// Integrates completed sub-answers when there are any; otherwise
    /// answers from all gathered findings. Falls back to deterministic
    /// concatenation, marking the session failed, when the call fails.
    ///
    /// This call is always attempted and is bounded only by the per-call
    /// timeout, so a session past its deadline still gets a model answer.
    async fn synthesize_final(&self, session: &mut ResearchSession) {
        let counters = SessionCounters {
            iterations: session.global_iteration(),
            findings: session.findings().len(),
            sources: session.sources().len(),
        };
        let completed = by_priority(session.sub_questions().iter().filter(|sq| sq.is_completed()));
        let (prompt, fallback) = if completed.is_empty() {
            let findings: Vec<&Finding> = session.findings().iter().collect();
            let sources: Vec<&Source> = session.sources().iter().collect();
            (
                build_flat_synthesis_prompt(session.query(), counters, &findings, &sources),
                concatenate_findings(session.query(), &findings),
            )
        } else {
            (
                build_meta_synthesis_prompt(session.query(), counters, &completed),
                concatenate_sub_answers(&completed),
            )
        };
        let partial_answers = completed.len();

        let consultation = self
            .consult(session, &self.meta_synthesizer, prompt, None)
            .await;
        if consultation.success {
            debug!(partial_answers, "final answer synthesized");
            session.finish(consultation.result, SessionStatus::Completed);
        } else {
            let e = ResearchError::Synthesis {
                message: consultation.error_message(),
            };
            warn!(error = %e, "final synthesis failed, returning concatenated answer");
            session
                .metadata_mut()
                .synthesis_errors
                .push(format!("final: {e}"));
            session.finish(fallback, SessionStatus::Failed);
        }
    }

    /// Consults the model on behalf of `agent`, charging the session.
    ///
    /// The call is refused without contacting the model when the call limit
    /// or budget is exhausted, and bounded by the configured timeout or the
    /// time left before `deadline`, whichever is shorter.
    async fn consult(
        &self,
        session: &mut ResearchSession,
        agent: &dyn Agent,
        prompt: String,
        deadline: Option<Instant>,
    ) -> ConsultationResult {
        let ceiling = match reserve_call(session) {
            Ok(ceiling) => ceiling,
            Err(e) => return ConsultationResult::failed(e.to_string(), 0.0, 0, ""),
        };
        let timeout = call_timeout(session, deadline);
        let request = agent.request(prompt, ceiling);
        let result = match tokio::time::timeout(timeout, self.consultant.consult(&request)).await {
            Ok(result) => result,
            Err(_) => {
                let e = ResearchError::Timeout {
                    operation: format!("{} consultation", agent.name()),
                    secs: timeout.as_secs(),
                };
                ConsultationResult::failed(e.to_string(), 0.0, millis(timeout), "")
            }
        };
        session.spend(result.cost);
        debug!(
            agent = agent.name(),
            success = result.success,
            cost = result.cost,
            latency_ms = result.latency_ms,
            model = %result.model_used,
            "consultation"
        );
        result
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").finish_non_exhaustive()
    }
}

/// Commits the batch's validated evidence to the session logs.
fn validate_batch(session: &mut ResearchSession, findings: Vec<Finding>, sources: Vec<Source>) -> Stage {
    let scope = session.current_sub_question_id();
    let validation = {
        let existing_findings = session.findings().scope(scope);
        let existing_sources = session.sources().scope(scope);
        validate(findings, sources, &existing_findings, &existing_sources)
    };
    if validation.rejected_findings > 0 || validation.rejected_sources > 0 {
        debug!(
            rejected_findings = validation.rejected_findings,
            rejected_sources = validation.rejected_sources,
            "validation dropped evidence"
        );
    }
    session.metadata_mut().rejected_findings += validation.rejected_findings;

    let new_findings = validation.findings.len();
    for finding in validation.findings {
        session.push_finding(finding);
    }
    for source in validation.sources {
        session.push_source(source);
    }
    Stage::ScoreQuality { new_findings }
}

/// Scores the active scope. Stopping reads the raw findings directly; the
/// signals are kept on the session for reporting.
fn score(session: &mut ResearchSession, new_findings: usize) -> Stage {
    let findings = session.scoped_findings();
    let source_count = session.sources().scope(session.current_sub_question_id()).len();
    let signals = score_quality(&findings, source_count, new_findings);
    debug!(
        score = signals.score,
        average_confidence = signals.average_confidence,
        novelty = signals.novelty,
        gaps = signals.gaps,
        findings = signals.finding_count,
        "quality scored"
    );
    session.metadata_mut().last_quality = Some(signals);
    Stage::CheckStopping
}

fn route(session: &mut ResearchSession, deadline_elapsed: bool) -> Stage {
    let decision = check_stopping(&StoppingInput::from_session(session, deadline_elapsed));
    debug!(
        action = decision.action.as_str(),
        reason = decision.reason.as_str(),
        "stopping decision"
    );
    match decision.action {
        StopAction::Continue => Stage::SelectStrategy,
        StopAction::SynthesizeSubQuestion => Stage::SynthesizeSubQuestion,
        StopAction::SynthesizeFinal => force_final(session, decision.reason),
    }
}

fn force_final(session: &mut ResearchSession, reason: StopReason) -> Stage {
    if reason.is_global_cap() {
        warn!(
            reason = reason.as_str(),
            pending = session.sub_questions().iter().filter(|sq| sq.is_pending()).count(),
            "global cap reached, forcing final synthesis"
        );
    } else {
        info!(reason = reason.as_str(), "research complete");
    }
    session.metadata_mut().stop_reason = Some(reason);
    Stage::SynthesizeFinal
}

/// Builds the planner's view of the current scope.
fn planning_context(session: &ResearchSession) -> (String, PlanningContext) {
    let config = session.config();
    let current = session
        .current_sub_question_id()
        .and_then(|id| session.sub_question(id));
    let global_left = config.max_iterations.saturating_sub(session.global_iteration());
    let (scope_text, local_iteration, local_left) = current.map_or_else(
        || (session.query().to_string(), session.global_iteration(), global_left),
        |sq| {
            let allocated = sq
                .allocated_iterations
                .unwrap_or(config.sub_question_max_iterations);
            (
                sq.question_text.clone(),
                sq.iteration_count,
                allocated.saturating_sub(sq.iteration_count),
            )
        },
    );

    let context = PlanningContext {
        query: session.query().to_string(),
        sub_question_id: current.map(|sq| sq.id),
        global_iteration: session.global_iteration() + 1,
        local_iteration,
        remaining_iterations: local_left.min(global_left),
        findings: session.scoped_findings().into_iter().cloned().collect(),
        max_tasks: config.max_tasks_per_iteration,
    };
    (scope_text, context)
}

/// Claims one external call and returns its cost ceiling.
fn reserve_call(session: &mut ResearchSession) -> Result<f64, ResearchError> {
    if session.external_calls_remaining() == 0 {
        return Err(ResearchError::BudgetExhausted {
            reason: "external call limit reached".to_string(),
        });
    }
    let ceiling = session
        .config()
        .per_call_cost_ceiling
        .min(session.budget_remaining());
    if ceiling <= 0.0 {
        return Err(ResearchError::BudgetExhausted {
            reason: "no budget left for another call".to_string(),
        });
    }
    session.consume_call();
    Ok(ceiling)
}

fn record_tool_error(session: &mut ResearchSession, task_id: &str, error: &ResearchError) {
    let message = match error {
        ResearchError::ToolExecution { .. } => error.to_string(),
        other => format!("task {task_id}: {other}"),
    };
    session.metadata_mut().tool_errors.push(message);
}

fn deadline_elapsed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// The configured call timeout, shortened to the time left before `deadline`.
fn call_timeout(session: &ResearchSession, deadline: Option<Instant>) -> Duration {
    let timeout = session.config().call_timeout;
    deadline.map_or(timeout, |d| {
        timeout.min(d.saturating_duration_since(Instant::now()))
    })
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
