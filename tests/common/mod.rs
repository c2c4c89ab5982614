//! Scripted collaborators shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hresearch::agent::{
    ConsultRequest, ConsultationResult, ModelConsultant, PromptSet, TokenLimits,
};
use hresearch::error::ResearchError;
use hresearch::research::{
    Finding, Orchestrator, PlanningContext, Source, StrategyPlanner, Task, TaskExecutor,
    TaskOutcome,
};

/// Cost charged for every scripted consultation.
pub const CONSULT_COST: f64 = 0.01;

// ── Consultant ──────────────────────────────────────────────────────────

/// A consultant that answers by role label.
pub struct ScriptedConsultant {
    /// Decomposer response; `None` makes the call fail.
    pub decomposition: Option<String>,
    /// Whether sub-synthesis calls succeed.
    pub sub_synthesis_ok: bool,
    /// Whether the final synthesis call succeeds.
    pub meta_ok: bool,
    sub_answers: AtomicUsize,
    requests: Mutex<Vec<ConsultRequest>>,
}

impl ScriptedConsultant {
    pub fn new(decomposition: Option<String>) -> Self {
        Self {
            decomposition,
            sub_synthesis_ok: true,
            meta_ok: true,
            sub_answers: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failing_meta(mut self) -> Self {
        self.meta_ok = false;
        self
    }

    pub fn with_failing_sub_synthesis(mut self) -> Self {
        self.sub_synthesis_ok = false;
        self
    }

    /// Role labels in call order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.requests.lock().unwrap().iter().map(|r| r.label).collect()
    }

    /// Prompts sent under `label`, in call order.
    pub fn prompts(&self, label: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.label == label)
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl ModelConsultant for ScriptedConsultant {
    async fn consult(&self, request: &ConsultRequest) -> ConsultationResult {
        self.requests.lock().unwrap().push(request.clone());
        match request.label {
            "decomposer" => match &self.decomposition {
                Some(text) => ConsultationResult::ok(text.clone(), CONSULT_COST, 1, "scripted"),
                None => ConsultationResult::failed("decomposer offline", CONSULT_COST, 1, "scripted"),
            },
            "sub_synthesizer" if self.sub_synthesis_ok => {
                let n = self.sub_answers.fetch_add(1, Ordering::SeqCst) + 1;
                ConsultationResult::ok(format!("sub-answer {n}"), CONSULT_COST, 1, "scripted")
            }
            "meta_synthesizer" if self.meta_ok => {
                ConsultationResult::ok("integrated final answer", CONSULT_COST, 1, "scripted")
            }
            other => ConsultationResult::failed(format!("{other} unavailable"), CONSULT_COST, 1, "scripted"),
        }
    }
}

// ── Planner ─────────────────────────────────────────────────────────────

/// A planner that returns one task per iteration, or always fails.
#[derive(Default)]
pub struct ScriptedPlanner {
    pub fail: bool,
    contexts: Mutex<Vec<(String, Option<u32>)>>,
}

impl ScriptedPlanner {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(scope_text, sub_question_id)` for each planning call.
    pub fn scopes(&self) -> Vec<(String, Option<u32>)> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StrategyPlanner for ScriptedPlanner {
    async fn plan(
        &self,
        scope_text: &str,
        context: &PlanningContext,
    ) -> Result<Vec<Task>, ResearchError> {
        let n = {
            let mut contexts = self.contexts.lock().unwrap();
            contexts.push((scope_text.to_string(), context.sub_question_id.map(|id| id.0)));
            contexts.len()
        };
        if self.fail {
            return Err(ResearchError::Planning {
                message: "no plan".to_string(),
            });
        }
        Ok(vec![Task {
            id: format!("task-{n}"),
            description: format!("look into {scope_text}"),
            strategy: context.strategy(),
            sub_question_id: context.sub_question_id,
            query: context.query.clone(),
            scope: context.sub_question_id.map(|_| scope_text.to_string()),
        }])
    }
}

// ── Executor ────────────────────────────────────────────────────────────

/// An executor that returns a fixed number of unique findings per task.
pub struct ScriptedExecutor {
    pub findings_per_task: usize,
    pub confidence: f64,
    pub cost: f64,
    pub delay: Option<Duration>,
    counter: AtomicUsize,
    tasks: Mutex<Vec<Task>>,
}

impl ScriptedExecutor {
    pub fn new(findings_per_task: usize, confidence: f64) -> Self {
        Self {
            findings_per_task,
            confidence,
            cost: 0.01,
            delay: None,
            counter: AtomicUsize::new(0),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Makes every task take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskExecutor for ScriptedExecutor {
    async fn execute(&self, task: &Task, _cost_ceiling: f64) -> Result<TaskOutcome, ResearchError> {
        self.tasks.lock().unwrap().push(task.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut findings = Vec::new();
        let mut sources = Vec::new();
        for _ in 0..self.findings_per_task {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            findings.push(Finding::new(format!("finding number {n}"), self.confidence));
            sources.push(Source::new(
                format!("source {n}"),
                format!("https://example.com/{n}"),
                0.7,
            ));
        }
        Ok(TaskOutcome::succeeded(findings, sources, self.cost))
    }
}

// ── Wiring ──────────────────────────────────────────────────────────────

/// Builds an orchestrator over the scripted collaborators.
pub fn orchestrator(
    consultant: &Arc<ScriptedConsultant>,
    planner: &Arc<ScriptedPlanner>,
    executor: &Arc<ScriptedExecutor>,
) -> Orchestrator {
    Orchestrator::new(
        Arc::clone(consultant) as Arc<dyn ModelConsultant>,
        Arc::clone(planner) as Arc<dyn StrategyPlanner>,
        Arc::clone(executor) as Arc<dyn TaskExecutor>,
        &PromptSet::defaults(),
        TokenLimits::default(),
    )
}

/// A decomposer response with the given `(question, priority)` pairs.
pub fn decomposition(questions: &[(&str, f64)]) -> String {
    let items: Vec<serde_json::Value> = questions
        .iter()
        .map(|(q, p)| serde_json::json!({ "question": q, "priority": p, "rationale": "scripted" }))
        .collect();
    serde_json::Value::Array(items).to_string()
}
