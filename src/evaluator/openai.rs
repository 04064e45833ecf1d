//! OpenAI / Azure OpenAI chat-completions evaluator with a forced function call.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::prompt::{build_prompt, function_schema, FUNCTION_NAME};
use super::Evaluator;
use crate::config::EvaluatorConfig;
use crate::evaluation::EvaluationResult;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    OpenAi { base_url: String },
    Azure { endpoint: String, api_version: String },
}

pub struct OpenAiEvaluator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    target: Target,
}

impl OpenAiEvaluator {
    pub fn openai(cfg: &EvaluatorConfig) -> Result<Self> {
        let base_url = cfg
            .endpoint
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
        Self::build(cfg, Target::OpenAi { base_url })
    }

    pub fn azure(cfg: &EvaluatorConfig) -> Result<Self> {
        let endpoint = cfg
            .endpoint
            .clone()
            .ok_or_else(|| anyhow!("azure evaluator needs an endpoint"))?;
        Self::build(
            cfg,
            Target::Azure {
                endpoint,
                api_version: cfg.api_version.clone(),
            },
        )
    }

    fn build(cfg: &EvaluatorConfig, target: Target) -> Result<Self> {
        if cfg.api_key.trim().is_empty() {
            bail!("evaluator api key is empty");
        }
        let http = reqwest::Client::builder()
            .user_agent("resume-ranker/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            target,
        })
    }

    fn url(&self) -> String {
        match &self.target {
            Target::OpenAi { base_url } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            Target::Azure {
                endpoint,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                self.model,
                api_version
            ),
        }
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct FunctionCallName<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    functions: Vec<Value>,
    function_call: FunctionCallName<'a>,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    arguments: String,
}

/// Pull the function-call arguments out of a chat-completions body.
fn parse_response(body: Resp) -> Result<EvaluationResult> {
    let args = body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.function_call)
        .map(|f| f.arguments)
        .ok_or_else(|| anyhow!("response carried no function call"))?;
    let value: Value = serde_json::from_str(&args).context("function arguments are not JSON")?;
    EvaluationResult::from_json(&value)
}

#[async_trait]
impl Evaluator for OpenAiEvaluator {
    async fn evaluate(
        &self,
        candidate_text: &str,
        job_description: &str,
        criteria: &[String],
    ) -> Result<EvaluationResult> {
        let prompt = build_prompt(candidate_text, job_description, criteria);
        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            functions: vec![function_schema(criteria)],
            function_call: FunctionCallName {
                name: FUNCTION_NAME,
            },
            temperature: 0.0,
        };

        let builder = self.http.post(self.url()).json(&req);
        let builder = match self.target {
            Target::OpenAi { .. } => builder.bearer_auth(&self.api_key),
            Target::Azure { .. } => builder.header("api-key", &self.api_key),
        };

        let resp = builder.send().await.context("evaluator request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("evaluator returned {status}: {}", text.chars().take(300).collect::<String>());
        }
        let body: Resp = resp.json().await.context("decoding evaluator response")?;
        let result = parse_response(body)?;
        debug!(target: "evaluator", keys = result.entries.len(), "evaluation received");
        Ok(result)
    }

    fn provider_name(&self) -> &'static str {
        match self.target {
            Target::OpenAi { .. } => "openai",
            Target::Azure { .. } => "azure",
        }
    }
}
