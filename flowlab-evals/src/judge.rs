//! Judge backends for the model-graded evaluators.
//!
//! The judge evaluators never score anything themselves: they hand the
//! output (or the execution trace) to a [`JudgeBackend`] and map its verdict
//! onto an evaluator result. [`HeuristicJudge`] is a deterministic stand-in
//! that needs no model; [`PromptJudge`] renders a grading prompt for any
//! [`JudgeClient`] and parses a JSON verdict out of the reply.

use crate::error::{EvalError, EvalResult};
use crate::similarity::text_similarity;
use crate::types::{EvaluatorType, ExecutionStep};
use async_trait::async_trait;
use flowlab_datasets::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Default criteria for output judging.
pub const DEFAULT_CRITERIA: [&str; 3] = ["accuracy", "relevance", "completeness"];

/// Mean step duration (ms) under which a trace earns the latency bonus.
pub const FAST_STEP_MS: f64 = 5000.0;

/// Bonus added to the reasoning score for a fast trace.
pub const LATENCY_BONUS: f64 = 0.1;

/// Reasoning score when no trace was supplied.
pub const NEUTRAL_REASONING: f64 = 0.5;

/// Reject a per-criterion scale that is not a positive finite number.
pub fn check_score_scale(scale: f64) -> EvalResult<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(EvalError::invalid_config(
            EvaluatorType::LlmJudgeOutput,
            format!("scoreScale must be a positive number, got {}", scale),
        ))
    }
}

/// What the output judge is asked to grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputJudgeRequest {
    /// Data point input.
    pub input: Record,
    /// Output under review, as text.
    pub actual: String,
    /// Reference answer, as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Criteria to score.
    pub criteria: Vec<String>,
    /// Top of the per-criterion scale.
    pub score_scale: f64,
    /// Free-form grading rubric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<String>,
}

/// A judge's verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Raw per-criterion scores on the request's scale.
    pub scores: BTreeMap<String, f64>,
    /// Overall score normalized to `[0, 1]`.
    pub overall: f64,
    /// Explanation.
    pub reasoning: String,
}

/// Something that can grade outputs and traces.
#[async_trait]
pub trait JudgeBackend: Send + Sync {
    /// Backend name, for error reporting.
    fn name(&self) -> &str;

    /// Grade an output against the request's criteria.
    async fn score_output(&self, request: &OutputJudgeRequest) -> EvalResult<JudgeVerdict>;

    /// Grade the reasoning quality of an execution trace.
    async fn score_reasoning(&self, trace: &[ExecutionStep]) -> EvalResult<JudgeVerdict>;
}

/// Deterministic placeholder judge.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicJudge;

impl HeuristicJudge {
    /// Create a heuristic judge.
    pub fn new() -> Self {
        Self
    }

    fn criterion_score(criterion: &str, request: &OutputJudgeRequest) -> f64 {
        let scale = request.score_scale;
        let actual = request.actual.trim();
        let expected = request.expected.as_deref().map(str::trim);

        let fraction = match criterion.to_lowercase().as_str() {
            "accuracy" => match expected {
                Some(e) => text_similarity(actual, e),
                None => 0.5,
            },
            "relevance" => {
                if actual.chars().count() > 10 {
                    0.8
                } else {
                    0.4
                }
            }
            "completeness" => match expected {
                Some(e) if !e.is_empty() => {
                    (actual.chars().count() as f64 / e.chars().count() as f64).min(1.0)
                }
                _ => 0.5,
            },
            "coherence" => {
                let sentences = actual
                    .split(&['.', '!', '?'][..])
                    .filter(|s| !s.trim().is_empty())
                    .count();
                if sentences >= 2 {
                    0.9
                } else {
                    0.6
                }
            }
            "safety" => 0.9,
            _ => 0.6,
        };
        fraction * scale
    }
}

#[async_trait]
impl JudgeBackend for HeuristicJudge {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn score_output(&self, request: &OutputJudgeRequest) -> EvalResult<JudgeVerdict> {
        check_score_scale(request.score_scale)?;
        let scores: BTreeMap<String, f64> = request
            .criteria
            .iter()
            .map(|c| (c.clone(), Self::criterion_score(c, request)))
            .collect();
        let overall = normalized_mean(&scores, request.score_scale);
        let reasoning = format!(
            "Heuristic scores: {}",
            scores
                .iter()
                .map(|(k, v)| format!("{}={:.2}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(JudgeVerdict {
            scores,
            overall,
            reasoning,
        })
    }

    async fn score_reasoning(&self, trace: &[ExecutionStep]) -> EvalResult<JudgeVerdict> {
        if trace.is_empty() {
            return Ok(JudgeVerdict {
                scores: BTreeMap::from([("reasoning".to_string(), NEUTRAL_REASONING)]),
                overall: NEUTRAL_REASONING,
                reasoning: "No execution trace supplied".to_string(),
            });
        }

        let with_output = trace.iter().filter(|s| s.has_output()).count();
        let completion = with_output as f64 / trace.len() as f64;
        let mean_ms = trace.iter().map(|s| s.duration_ms).sum::<f64>() / trace.len() as f64;
        let bonus = if mean_ms < FAST_STEP_MS { LATENCY_BONUS } else { 0.0 };
        let overall = (completion + bonus).clamp(0.0, 1.0);

        Ok(JudgeVerdict {
            scores: BTreeMap::from([
                ("completion".to_string(), completion),
                ("latencyBonus".to_string(), bonus),
            ]),
            overall,
            reasoning: format!(
                "{} of {} steps produced output, mean step {:.0}ms",
                with_output,
                trace.len(),
                mean_ms
            ),
        })
    }
}

fn normalized_mean(scores: &BTreeMap<String, f64>, scale: f64) -> f64 {
    if scores.is_empty() || !scale.is_finite() || scale <= 0.0 {
        return 0.0;
    }
    let mean = scores.values().sum::<f64>() / scores.len() as f64;
    (mean / scale).clamp(0.0, 1.0)
}

/// A text-completion model behind [`PromptJudge`].
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Complete `prompt`, returning the model's reply.
    async fn complete(&self, prompt: &str) -> EvalResult<String>;
}

const OUTPUT_INSTRUCTION: &str = r#"
You are an expert evaluator grading the output of an automated agent.

Score the output on each listed criterion from 0 to the given scale, where the
scale is a perfect answer. Compare against the reference answer when one is
provided.

Respond with JSON only, in the form:
{"scores": {"<criterion>": <number>, ...}, "reasoning": "<one paragraph>"}"#;

const REASONING_INSTRUCTION: &str = r#"
You are an expert evaluator grading how an automated agent reasoned
through a task.

Each line below is one executed step. Judge whether the steps were purposeful,
produced useful output, and led coherently to the result.

Respond with JSON only, in the form:
{"score": <number between 0 and 1>, "reasoning": "<one paragraph>"}"#;

#[derive(Debug, Deserialize)]
struct OutputReply {
    scores: BTreeMap<String, f64>,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
struct ReasoningReply {
    score: f64,
    #[serde(default)]
    reasoning: String,
}

/// Model-backed judge.
#[derive(Debug, Clone)]
pub struct PromptJudge<C> {
    client: C,
    name: String,
}

impl<C: JudgeClient> PromptJudge<C> {
    /// Wrap a client.
    pub fn new(client: C) -> Self {
        Self {
            client,
            name: "prompt".to_string(),
        }
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Prompt sent for an output request.
    pub fn output_prompt(request: &OutputJudgeRequest) -> String {
        let mut prompt = format!(
            "{}\n\nCriteria: {}\nScale: 0 to {}\n",
            OUTPUT_INSTRUCTION.trim_start(),
            request.criteria.join(", "),
            request.score_scale
        );
        if let Some(rubric) = &request.rubric {
            prompt.push_str(&format!("Rubric: {}\n", rubric));
        }
        prompt.push_str(&format!(
            "\nInput:\n{}\n",
            serde_json::Value::Object(request.input.clone())
        ));
        if let Some(expected) = &request.expected {
            prompt.push_str(&format!("\nReference answer:\n{}\n", expected));
        }
        prompt.push_str(&format!("\nOutput:\n{}\n", request.actual));
        prompt
    }

    /// Prompt sent for a reasoning request.
    pub fn reasoning_prompt(trace: &[ExecutionStep]) -> String {
        let steps: Vec<String> = trace
            .iter()
            .enumerate()
            .map(|(i, s)| {
                format!(
                    "{}. [{}] {} ({:.0}ms) -> {}",
                    i + 1,
                    s.node_type,
                    s.node_name,
                    s.duration_ms,
                    s.output
                )
            })
            .collect();
        format!("{}\n\nSteps:\n{}\n", REASONING_INSTRUCTION.trim_start(), steps.join("\n"))
    }

    fn parse<T: serde::de::DeserializeOwned>(&self, reply: &str) -> EvalResult<T> {
        let start = reply.find('{');
        let end = reply.rfind('}');
        let body = match (start, end) {
            (Some(s), Some(e)) if s < e => &reply[s..=e],
            _ => return Err(EvalError::judge(&self.name, "Reply contains no JSON object")),
        };
        serde_json::from_str(body).map_err(|e| EvalError::judge(&self.name, e.to_string()))
    }
}

#[async_trait]
impl<C: JudgeClient> JudgeBackend for PromptJudge<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn score_output(&self, request: &OutputJudgeRequest) -> EvalResult<JudgeVerdict> {
        check_score_scale(request.score_scale)?;
        let reply = self.client.complete(&Self::output_prompt(request)).await?;
        let parsed: OutputReply = self.parse(&reply)?;

        let mut scores = BTreeMap::new();
        for criterion in &request.criteria {
            let Some(score) = parsed.scores.get(criterion) else {
                return Err(EvalError::judge(
                    &self.name,
                    format!("Verdict is missing criterion '{}'", criterion),
                ));
            };
            scores.insert(criterion.clone(), score.clamp(0.0, request.score_scale));
        }

        debug!(backend = %self.name, criteria = scores.len(), "Parsed output verdict");
        Ok(JudgeVerdict {
            overall: normalized_mean(&scores, request.score_scale),
            scores,
            reasoning: parsed.reasoning,
        })
    }

    async fn score_reasoning(&self, trace: &[ExecutionStep]) -> EvalResult<JudgeVerdict> {
        if trace.is_empty() {
            return HeuristicJudge.score_reasoning(trace).await;
        }
        let reply = self.client.complete(&Self::reasoning_prompt(trace)).await?;
        let parsed: ReasoningReply = self.parse(&reply)?;
        let overall = parsed.score.clamp(0.0, 1.0);
        Ok(JudgeVerdict {
            scores: BTreeMap::from([("reasoning".to_string(), overall)]),
            overall,
            reasoning: parsed.reasoning,
        })
    }
}
