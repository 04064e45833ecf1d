//! Prompt text and function-call schema sent to LLM evaluators.

use serde_json::{json, Map, Value};

use crate::evaluation::SUMMARY_KEY;

pub const FUNCTION_NAME: &str = "evaluate_resume";

pub fn build_prompt(resume_text: &str, jd_text: &str, criteria: &[String]) -> String {
    format!(
        "You are a strict evaluator assessing a resume against a job description based on the following criteria: {list}.

Instructions for the JSON output:
- Use the EXACT criterion names from the list as JSON keys; do not change casing, punctuation, or spacing.
- Return ALL criteria, even if the resume has zero evidence.
- For each criterion assign an integer score between 0 and 100 and a brief explanation.
- Add a '{summary}' with an overall evaluation.
- Treat comparisons as case-insensitive. If a criterion is \".net\", also accept \".NET\", \"ASP.NET\", \"VB.NET\", \"C#.NET\" or \"Dot Net\" as evidence, but report it under the original key.

Scoring guide:
- 90-100: excellent alignment with clear, strong evidence.
- 70-89: good alignment with examples or relevant experience.
- 50-69: some alignment, may lack depth or relevance.
- 0-49: weak or no alignment.

Avoid being generous. Penalize vague phrases or lack of specifics.

Resume:
{resume_text}

Job Description:
{jd_text}",
        list = criteria.join(", "),
        summary = SUMMARY_KEY,
    )
}

/// JSON schema for the forced function call; one object property per criterion.
pub fn function_schema(criteria: &[String]) -> Value {
    let mut properties = Map::new();
    for c in criteria {
        properties.insert(
            c.clone(),
            json!({
                "type": "object",
                "properties": {
                    "score": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": 100,
                        "description": format!("Score for: {c}")
                    },
                    "comment": {
                        "type": "string",
                        "description": format!("Explanation for: {c}")
                    }
                },
                "required": ["score", "comment"]
            }),
        );
    }
    properties.insert(
        SUMMARY_KEY.to_string(),
        json!({
            "type": "string",
            "description": "Overall summary of how the resume matches the job description"
        }),
    );

    let mut required: Vec<Value> = criteria.iter().map(|c| Value::String(c.clone())).collect();
    required.push(Value::String(SUMMARY_KEY.to_string()));

    json!({
        "name": FUNCTION_NAME,
        "description": "Evaluate a resume against the job description using criteria.",
        "parameters": {
            "type": "object",
            "properties": properties,
            "required": required
        }
    })
}
