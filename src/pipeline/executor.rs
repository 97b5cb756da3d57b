// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 evalflow contributors

//! Pipeline executor
//!
//! Runs stages strictly in declared order. Each stage sees only its
//! immediate predecessor's accepted output; rejected outputs are discarded
//! whole and the stage is re-run within its attempt budget. A stage that
//! exhausts its budget fails the run fatally; later stages never execute.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use colored::Colorize;
use tracing::{debug, warn};

use crate::agents::{StageAgent, StageInput, StageOutput};
use crate::errors::EvalflowError;
use crate::guardrail::Guardrail;
use crate::pipeline::{OutputSchemaSpec, Pipeline, Role, Stage};
use crate::schema::RubricSchema;

/// Pipeline execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Only show what would be done
    pub dry_run: bool,
    /// Verbose output
    pub verbose: bool,
    /// Suppress progress output entirely
    pub quiet: bool,
}

/// Accepted result of one stage
#[derive(Debug, Clone)]
pub struct StageReport {
    /// Stage name
    pub stage: String,
    /// Attempts spent before acceptance
    pub attempts: u32,
    /// The accepted output
    pub output: StageOutput,
    /// Time spent on the stage, all attempts included
    pub duration: Duration,
}

/// Result of executing a pipeline
#[derive(Debug)]
pub struct RunReport {
    /// Per-stage reports, in execution order
    pub stages: Vec<StageReport>,
    /// The last stage's accepted output (None for a dry run)
    pub final_output: Option<StageOutput>,
    /// Total execution time
    pub duration: Duration,
}

/// Pipeline executor
pub struct PipelineExecutor {
    /// Registered agents by role
    agents: HashMap<Role, Box<dyn StageAgent>>,
    /// Resolved guardrails by stage name
    guardrails: HashMap<String, Guardrail>,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            guardrails: HashMap::new(),
        }
    }

    /// Register an agent for a role
    pub fn register_agent(&mut self, role: Role, agent: Box<dyn StageAgent>) {
        self.agents.insert(role, agent);
    }

    /// Attach guardrails resolved at pipeline-construction time
    pub fn with_guardrails(mut self, guardrails: HashMap<String, Guardrail>) -> Self {
        self.guardrails = guardrails;
        self
    }

    /// Execute a pipeline for a subject
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        subject: &str,
        options: &ExecutionOptions,
    ) -> Result<RunReport, EvalflowError> {
        let start = Instant::now();

        if !options.quiet {
            self.print_execution_plan(pipeline);
        }

        if options.dry_run {
            return Ok(RunReport {
                stages: Vec::new(),
                final_output: None,
                duration: start.elapsed(),
            });
        }

        let mut reports: Vec<StageReport> = Vec::with_capacity(pipeline.stages.len());
        let mut prior: Option<StageOutput> = None;

        // Single forward pass: nothing rewinds to an earlier stage, so an
        // accepted side-effecting stage is never re-invoked within the run.
        // Retries happen inside run_stage, before the output is accepted.
        for stage in &pipeline.stages {
            let input = match (&prior, stage.input.references_stage()) {
                (Some(output), Some(_)) => StageInput::from_prior(subject, output.clone()),
                _ => StageInput::initial(subject),
            };

            let spinner = if options.quiet {
                None
            } else {
                Some(crate::utils::create_spinner(&format!("{}...", stage.name)))
            };

            let stage_start = Instant::now();
            let result = self.run_stage(pipeline, stage, &input, options).await;
            let stage_duration = stage_start.elapsed();

            if let Some(spinner) = spinner {
                spinner.finish_and_clear();
            }

            match result {
                Ok((output, attempts)) => {
                    if !options.quiet {
                        println!(
                            "  {} {} ({} attempt{}, {:.2}s)",
                            "✓".green(),
                            stage.name.bold(),
                            attempts,
                            if attempts == 1 { "" } else { "s" },
                            stage_duration.as_secs_f64()
                        );
                    }

                    prior = Some(output.clone());
                    reports.push(StageReport {
                        stage: stage.name.clone(),
                        attempts,
                        output,
                        duration: stage_duration,
                    });
                }
                Err(err) => {
                    if !options.quiet {
                        println!("  {} {} failed", "✗".red(), stage.name.bold());
                    }
                    // Fatal: stages after this one never execute
                    return Err(err);
                }
            }
        }

        Ok(RunReport {
            final_output: prior,
            stages: reports,
            duration: start.elapsed(),
        })
    }

    /// Run a single stage through its attempt budget
    ///
    /// Returns the accepted output and the number of attempts spent. A
    /// rejected attempt's output is discarded entirely; nothing partial is
    /// carried into the next attempt.
    async fn run_stage(
        &self,
        pipeline: &Pipeline,
        stage: &Stage,
        input: &StageInput,
        options: &ExecutionOptions,
    ) -> Result<(StageOutput, u32), EvalflowError> {
        let agent = self
            .agents
            .get(&stage.role)
            .ok_or_else(|| EvalflowError::AgentNotFound {
                role: stage.role.to_string(),
            })?;

        agent.validate_stage(stage)?;

        let schema = stage.output_schema.as_ref().map(|spec| match spec {
            OutputSchemaSpec::Rubric => RubricSchema::standard(),
        });
        let guardrail = self.guardrails.get(&stage.name);
        let budget = pipeline.attempts_for(stage);

        let mut last_reason = String::from("no attempts made");

        for attempt in 1..=budget {
            debug!(stage = %stage.name, attempt, budget, "executing stage attempt");

            let raw = match agent.execute(stage, input).await {
                Ok(raw) => raw,
                Err(err) if err.is_retryable() => {
                    last_reason = err.rejection_reason();
                    warn!(stage = %stage.name, attempt, reason = %last_reason, "attempt failed");
                    continue;
                }
                Err(err) => return Err(err),
            };

            // Schema validation: mismatches are rejections, never coerced
            if let Some(schema) = &schema {
                let Some(structured) = &raw.structured else {
                    last_reason = "schema mismatch: stage produced no structured output".into();
                    warn!(stage = %stage.name, attempt, reason = %last_reason, "output rejected");
                    continue;
                };

                if let Err(violations) = schema.validate(structured) {
                    let err =
                        EvalflowError::schema_mismatch(&stage.name, violations.into_messages());
                    last_reason = err.rejection_reason();
                    warn!(stage = %stage.name, attempt, reason = %last_reason, "output rejected");
                    continue;
                }
            }

            // Guardrail over the schema-validated output
            if let Some(guardrail) = guardrail {
                let verdict = match guardrail.check(&raw).await {
                    Ok(verdict) => verdict,
                    Err(err) if err.is_retryable() => {
                        last_reason = err.rejection_reason();
                        warn!(stage = %stage.name, attempt, reason = %last_reason, "guardrail errored");
                        continue;
                    }
                    Err(err) => return Err(err),
                };

                if !verdict.accepted {
                    let err = EvalflowError::GuardrailRejected {
                        stage: stage.name.clone(),
                        reason: verdict.message,
                    };
                    last_reason = err.rejection_reason();
                    warn!(stage = %stage.name, attempt, reason = %last_reason, "guardrail rejected output");
                    if options.verbose && !options.quiet {
                        eprintln!("    {} {}", "⚠".yellow(), last_reason.dimmed());
                    }
                    continue;
                }

                debug!(stage = %stage.name, kind = guardrail.kind(), "guardrail accepted output");
            }

            return Ok((raw, attempt));
        }

        Err(EvalflowError::RetryExhausted {
            stage: stage.name.clone(),
            attempts: budget,
            reason: last_reason,
        })
    }

    /// Print the execution plan
    fn print_execution_plan(&self, pipeline: &Pipeline) {
        println!();
        println!("{}: {}", "Pipeline".bold(), pipeline.name);
        println!("{}", "═".repeat(50));
        println!(
            "Execution plan ({} stage{}):",
            pipeline.stages.len(),
            if pipeline.stages.len() == 1 { "" } else { "s" }
        );
        println!();

        for (i, stage) in pipeline.stages.iter().enumerate() {
            print!("  {}. {} ({})", i + 1, stage.name.bold(), stage.role);

            if let Some(from) = stage.input.references_stage() {
                print!(" {}", format!("[input: {from}]").dimmed());
            }
            if let Some(guardrail) = self.guardrails.get(&stage.name) {
                print!(" {}", format!("[guardrail: {}]", guardrail.kind()).dimmed());
            }

            println!();
        }

        println!();
    }

    /// Check that every role the pipeline needs has a registered agent
    pub fn check_agents(&self, pipeline: &Pipeline) -> Vec<Role> {
        let roles: std::collections::HashSet<_> =
            pipeline.stages.iter().map(|s| s.role).collect();

        roles
            .into_iter()
            .filter(|role| !self.agents.contains_key(role))
            .collect()
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrail::{resolve_guardrails, StructuralCheck};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Agent that replays scripted attempt results and counts invocations
    ///
    /// Once the script is exhausted, the last scripted success is repeated.
    struct ScriptedAgent {
        outputs: std::sync::Mutex<std::collections::VecDeque<Result<StageOutput, EvalflowError>>>,
        fallback: StageOutput,
        calls: Arc<AtomicU32>,
    }

    impl ScriptedAgent {
        fn new(outputs: Vec<Result<StageOutput, EvalflowError>>) -> (Self, Arc<AtomicU32>) {
            let fallback = outputs
                .iter()
                .rev()
                .find_map(|r| r.as_ref().ok().cloned())
                .unwrap_or_else(|| StageOutput::text("default"));
            let calls = Arc::new(AtomicU32::new(0));
            (
                Self {
                    outputs: std::sync::Mutex::new(outputs.into()),
                    fallback,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl StageAgent for ScriptedAgent {
        async fn execute(
            &self,
            _stage: &Stage,
            _input: &StageInput,
        ) -> Result<StageOutput, EvalflowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outputs.lock().unwrap().pop_front() {
                Some(result) => result,
                None => Ok(self.fallback.clone()),
            }
        }

        fn validate_stage(&self, _stage: &Stage) -> Result<(), EvalflowError> {
            Ok(())
        }
    }

    fn rubric_value() -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for name in crate::schema::RUBRIC_DIMENSIONS {
            map.insert(
                name.to_string(),
                json!({
                    "score": 8,
                    "reasoning": "well supported",
                    "evidence": ["https://example.com/source"]
                }),
            );
        }
        serde_json::Value::Object(map)
    }

    fn quiet() -> ExecutionOptions {
        ExecutionOptions {
            quiet: true,
            ..Default::default()
        }
    }

    fn delivered_message() -> StageOutput {
        StageOutput::text(
            "Report delivered to #speaker-review.\n\
             Subject expertise: https://example.com/a\n\
             Thought leadership: https://example.com/b\n\
             Speaking experience: https://example.com/c\n\
             Community engagement: https://example.com/d\n\
             Topic relevance: https://example.com/e",
        )
    }

    fn executor_for(
        pipeline: &Pipeline,
        research: ScriptedAgent,
        evaluate: ScriptedAgent,
        report: ScriptedAgent,
        notify: ScriptedAgent,
    ) -> PipelineExecutor {
        let mut executor = PipelineExecutor::new()
            .with_guardrails(resolve_guardrails(pipeline, None).unwrap());
        executor.register_agent(Role::Research, Box::new(research));
        executor.register_agent(Role::Evaluate, Box::new(evaluate));
        executor.register_agent(Role::Report, Box::new(report));
        executor.register_agent(Role::Notify, Box::new(notify));
        executor
    }

    #[tokio::test]
    async fn test_happy_path_runs_all_stages_in_order() {
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");

        let (research, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("brief"))]);
        let (evaluate, _) = ScriptedAgent::new(vec![Ok(StageOutput::structured(
            "scores",
            rubric_value(),
        ))]);
        let (report, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, _) = ScriptedAgent::new(vec![Ok(delivered_message())]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let run = executor.execute(&pipeline, "Dr. Doe", &quiet()).await.unwrap();

        assert_eq!(run.stages.len(), 4);
        let order: Vec<_> = run.stages.iter().map(|r| r.stage.as_str()).collect();
        assert_eq!(order, vec!["research", "evaluate", "report", "notify"]);
        assert!(run.final_output.unwrap().text.contains("delivered"));
    }

    #[tokio::test]
    async fn test_schema_failure_twice_then_success_proceeds() {
        // Scenario: evaluation output fails schema validation twice, passes
        // on the third attempt with a budget of 3
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");

        let mut bad = rubric_value();
        bad.as_object_mut().unwrap().remove("topic_relevance");

        let (research, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("brief"))]);
        let (evaluate, eval_calls) = ScriptedAgent::new(vec![
            Ok(StageOutput::structured("bad", bad.clone())),
            Ok(StageOutput::structured("bad", bad)),
            Ok(StageOutput::structured("good", rubric_value())),
        ]);
        let (report, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, _) = ScriptedAgent::new(vec![Ok(delivered_message())]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let run = executor.execute(&pipeline, "Dr. Doe", &quiet()).await.unwrap();

        assert_eq!(eval_calls.load(Ordering::SeqCst), 3);
        let eval_report = run.stages.iter().find(|r| r.stage == "evaluate").unwrap();
        assert_eq!(eval_report.attempts, 3);
        // Pipeline proceeded to delivery with the third attempt's output
        assert_eq!(run.stages.last().unwrap().stage, "notify");
    }

    #[tokio::test]
    async fn test_retry_exhausted_is_fatal_and_skips_later_stages() {
        // Scenario: budget exhausted at evaluation; report and notify never run
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");

        let mut bad = rubric_value();
        bad.as_object_mut().unwrap().remove("subject_expertise");
        bad.as_object_mut().unwrap().remove("topic_relevance");

        let (research, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("brief"))]);
        let (evaluate, _) =
            ScriptedAgent::new(vec![Ok(StageOutput::structured("bad", bad))]);
        let (report, report_calls) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, notify_calls) = ScriptedAgent::new(vec![Ok(delivered_message())]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let err = executor
            .execute(&pipeline, "Dr. Doe", &quiet())
            .await
            .unwrap_err();

        match err {
            EvalflowError::RetryExhausted {
                stage,
                attempts,
                reason,
            } => {
                assert_eq!(stage, "evaluate");
                assert_eq!(attempts, 3);
                // The last rejection reason names every missing dimension
                assert!(reason.contains("subject_expertise"));
                assert!(reason.contains("topic_relevance"));
            }
            other => panic!("Expected RetryExhausted, got {other}"),
        }

        assert_eq!(report_calls.load(Ordering::SeqCst), 0);
        assert_eq!(notify_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_guardrail_rejection_retries_only_the_guarded_stage() {
        // Scenario: notify output lacks evidence links; only notify is re-run
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");

        let (research, research_calls) = ScriptedAgent::new(vec![Ok(StageOutput::text("brief"))]);
        let (evaluate, eval_calls) = ScriptedAgent::new(vec![Ok(StageOutput::structured(
            "scores",
            rubric_value(),
        ))]);
        let (report, report_calls) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, notify_calls) = ScriptedAgent::new(vec![
            Ok(StageOutput::text("Sent to #speaker-review, no links though.")),
            Ok(delivered_message()),
        ]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let run = executor.execute(&pipeline, "Dr. Doe", &quiet()).await.unwrap();

        assert_eq!(research_calls.load(Ordering::SeqCst), 1);
        assert_eq!(eval_calls.load(Ordering::SeqCst), 1);
        assert_eq!(report_calls.load(Ordering::SeqCst), 1);
        assert_eq!(notify_calls.load(Ordering::SeqCst), 2);

        let notify_report = run.stages.iter().find(|r| r.stage == "notify").unwrap();
        assert_eq!(notify_report.attempts, 2);
    }

    #[tokio::test]
    async fn test_accepted_side_effecting_stage_runs_once_while_later_stage_retries() {
        // A side-effecting stage early in the pipeline must not fire again
        // when a downstream stage burns attempts
        let mut pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");
        pipeline.stages[0].side_effecting = true;

        let mut bad = rubric_value();
        bad.as_object_mut().unwrap().remove("topic_relevance");

        let (research, research_calls) = ScriptedAgent::new(vec![Ok(StageOutput::text("brief"))]);
        let (evaluate, eval_calls) = ScriptedAgent::new(vec![
            Ok(StageOutput::structured("bad", bad)),
            Ok(StageOutput::structured("good", rubric_value())),
        ]);
        let (report, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, _) = ScriptedAgent::new(vec![Ok(delivered_message())]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let run = executor.execute(&pipeline, "Dr. Doe", &quiet()).await.unwrap();

        assert_eq!(research_calls.load(Ordering::SeqCst), 1);
        assert_eq!(eval_calls.load(Ordering::SeqCst), 2);
        assert_eq!(run.stages[0].attempts, 1);
        assert_eq!(run.stages[1].attempts, 2);
    }

    #[tokio::test]
    async fn test_transient_backend_errors_consume_attempts() {
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");

        let (research, research_calls) = ScriptedAgent::new(vec![
            Err(EvalflowError::BackendRateLimited {
                message: "429".into(),
            }),
            Err(EvalflowError::BackendTimedOut {
                message: "deadline".into(),
            }),
            Ok(StageOutput::text("brief")),
        ]);
        let (evaluate, _) = ScriptedAgent::new(vec![Ok(StageOutput::structured(
            "scores",
            rubric_value(),
        ))]);
        let (report, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, _) = ScriptedAgent::new(vec![Ok(delivered_message())]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let run = executor.execute(&pipeline, "Dr. Doe", &quiet()).await.unwrap();

        assert_eq!(research_calls.load(Ordering::SeqCst), 3);
        assert_eq!(run.stages[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");

        let (research, research_calls) = ScriptedAgent::new(vec![Err(
            EvalflowError::BackendRejected {
                message: "invalid request".into(),
            },
        )]);
        let (evaluate, _) = ScriptedAgent::new(vec![Ok(StageOutput::structured(
            "scores",
            rubric_value(),
        ))]);
        let (report, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, _) = ScriptedAgent::new(vec![Ok(delivered_message())]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let err = executor
            .execute(&pipeline, "Dr. Doe", &quiet())
            .await
            .unwrap_err();

        assert!(matches!(err, EvalflowError::BackendRejected { .. }));
        assert_eq!(research_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");

        let (research, research_calls) = ScriptedAgent::new(vec![Ok(StageOutput::text("brief"))]);
        let (evaluate, _) = ScriptedAgent::new(vec![Ok(StageOutput::structured(
            "scores",
            rubric_value(),
        ))]);
        let (report, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, notify_calls) = ScriptedAgent::new(vec![Ok(delivered_message())]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let options = ExecutionOptions {
            dry_run: true,
            quiet: true,
            ..Default::default()
        };
        let run = executor.execute(&pipeline, "Dr. Doe", &options).await.unwrap();

        assert!(run.stages.is_empty());
        assert!(run.final_output.is_none());
        assert_eq!(research_calls.load(Ordering::SeqCst), 0);
        assert_eq!(notify_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_agent_is_reported() {
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");
        let executor = PipelineExecutor::new()
            .with_guardrails(resolve_guardrails(&pipeline, None).unwrap());

        let missing = executor.check_agents(&pipeline);
        assert_eq!(missing.len(), 4);

        let err = executor
            .execute(&pipeline, "Dr. Doe", &quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, EvalflowError::AgentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_structured_output_required_when_schema_declared() {
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");

        let (research, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("brief"))]);
        // Text-only output where the rubric schema is declared
        let (evaluate, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("looks great"))]);
        let (report, _) = ScriptedAgent::new(vec![Ok(StageOutput::text("# Report"))]);
        let (notify, _) = ScriptedAgent::new(vec![Ok(delivered_message())]);

        let executor = executor_for(&pipeline, research, evaluate, report, notify);
        let err = executor
            .execute(&pipeline, "Dr. Doe", &quiet())
            .await
            .unwrap_err();

        match err {
            EvalflowError::RetryExhausted { stage, reason, .. } => {
                assert_eq!(stage, "evaluate");
                assert!(reason.contains("schema mismatch"));
            }
            other => panic!("Expected RetryExhausted, got {other}"),
        }
    }

    #[test]
    fn test_structural_guardrail_is_resolved_for_notify() {
        let pipeline = Pipeline::speaker_evaluation_template("t", "#speaker-review");
        let guardrails = resolve_guardrails(&pipeline, None).unwrap();
        assert!(matches!(
            guardrails.get("notify"),
            Some(Guardrail::Structural(_))
        ));

        // Direct check: the resolved guardrail enforces the recipient
        let check = StructuralCheck::new("#speaker-review".into(), false);
        assert!(!check.check("sent somewhere else").accepted);
    }
}
