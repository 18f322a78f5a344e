//! Built-in prompts: the fallback compose prompt and the two review prompts.

use chrono::{DateTime, Local};
use std::collections::BTreeMap;

use crate::model::{PromptTestConfig, TestEmail};

const TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Compose prompt used when no operation prompt has been saved.
pub fn build_prompt(config: &PromptTestConfig, thread_email: Option<&TestEmail>) -> String {
    build_prompt_at(config, thread_email, Local::now())
}

pub fn build_prompt_at(
    config: &PromptTestConfig,
    thread_email: Option<&TestEmail>,
    now: DateTime<Local>,
) -> String {
    let sender = &config.sender_context;
    let profile = if sender.name.is_empty() {
        "Unknown Profile"
    } else {
        sender.name.as_str()
    };
    let sender_email = sender
        .email
        .as_deref()
        .filter(|e| !e.is_empty())
        .map(|e| format!(" <{}>", e))
        .unwrap_or_default();

    let mut prompt = format!(
        "### ROLE ###\n\
         You are Filo Mail's Smart Compose Assistant, an expert at turning user input into polished, professional emails that match the user's intent and style preferences.\n\
         \n\
         ### CONTEXT ###\n\
         *   Current Time: {}\n\
         *   User customized prompt: {}\n\
         *   User's profile in original thread (if any): {}\n\
         *   You are drafting an email on behalf of the user: {}{}",
        now.format(TIME_FORMAT),
        config.custom_instruction.as_deref().unwrap_or_default(),
        profile,
        sender.name,
        sender_email,
    );

    if let Some(email) = thread_email {
        let cc = email.cc.as_deref().unwrap_or_default();
        let cc_line = if cc.is_empty() {
            String::new()
        } else {
            format!("\n**Cc:** {}", cc)
        };
        prompt.push_str(&format!(
            "\n*   The recipient(s) of the email: {to}\n\
             *   Cc of the email: {cc}\n\
             *   Subject of the email: {subject}\n\
             \n\
             ### ORIGINAL EMAIL / THREAD CONTEXT ###\n\
             This is the email that the user is responding to, forwarding, or analyzing:\n\
             \n\
             **From:** {from}\n\
             **To:** {to}{cc_line}\n\
             **Date:** {date}\n\
             **Subject:** {subject}\n\
             \n\
             **Body:**\n\
             ```\n\
             {body}\n\
             ```",
            to = email.to,
            cc = cc,
            subject = email.subject,
            from = email.from,
            cc_line = cc_line,
            date = email.date,
            body = email.body,
        ));
    }

    let operation = match thread_email {
        Some(_) => format!("**Operation:** {}", config.operation_type.description()),
        None => String::new(),
    };

    prompt.push_str(&format!(
        r#"

*   User's Raw Input/Draft: {input}

*   **User Selected Style:** {style}

{operation}

Turn user's draft into polished email draft.

### CORE TASK ###
Analyze the context using the Style & Tone Strategy below, then generate a polished email draft.

#### 1. Determine Communication Style (Internal Thought Process)
Follow this prioritized strategy to decide on the tone and style.

*   **Strategy 0: Execute User-Selected Style (ABSOLUTE PRIORITY)**
    *   **Context:** The user has explicitly selected a specific writing style.
    *   **Directives:** You MUST strictly follow the style guidelines below, overriding any context-based inference.

"""
{guidelines}
"""

*   **Interaction with Custom Prompt:** If `User customized prompt` () is also provided, integrate its specific requirements (e.g., "mention the budget constraint") *within* the framework of the selected style. The custom prompt provides *what* to add, the selected style dictates *how* to say it.

*   **Strategy 1: Detect and Apply Context Cues (FALLBACK if style not explicitly selected)**
    *   Look for explicit cues from `User customized prompt` like: "keep it formal," "be brief," "sound friendly."
    *   If found, follow those instructions precisely.

*   **Strategy 2: Mirror the Thread (SECONDARY FALLBACK)**
    *   If no explicit style cues exist, analyze the conversation history.
    *   Match the established tone (formal, semi-formal, casual) and communication patterns (short replies vs. detailed explanations).

*   **Strategy 3: Apply Safe Defaults (FINAL FALLBACK)**
    *   No cues, no thread history: Aim for a tone that is professional yet warm.

#### 2. Generate the Email Draft
*   Expand the `User's Raw Input` into a well-structured message.
*   Incorporate any specific instructions from `User customized prompt`.
*   Ensure the final output aligns perfectly with the determined Style (from Strategy 0, 1, 2, or 3).

### OUTPUT FORMAT ###
Your response MUST follow this exact format:

```filomail
subject: [Email subject line]

[Email body content here]
```

### IMPORTANT NOTES ###
*   DO NOT include any explanation or commentary outside the filomail code block.
*   The subject line should be appropriate for the context.
*   Keep the email focused and aligned with user intent.
*   Respect the user's selected style absolutely."#,
        input = config.user_input,
        style = config.style_strategy,
        operation = operation,
        guidelines = config.style_strategy.guidelines(),
    ));

    prompt
}

/// Split a compose prompt into its headed sections for blame analysis.
///
/// Each `### NAME ###` section runs to the next `###` or the end of the text;
/// the style guidelines are the first `"""` block.
pub fn extract_prompt_sections(prompt: &str) -> BTreeMap<&'static str, String> {
    const HEADINGS: [(&str, &str); 4] = [
        ("role", "### ROLE ###"),
        ("context", "### CONTEXT ###"),
        ("core_task", "### CORE TASK ###"),
        ("output_format", "### OUTPUT FORMAT ###"),
    ];

    let mut sections = BTreeMap::new();
    for (name, heading) in HEADINGS {
        if let Some(start) = prompt.find(heading) {
            let rest = &prompt[start + heading.len()..];
            let end = rest.find("###").unwrap_or(rest.len());
            sections.insert(name, rest[..end].trim().to_string());
        }
    }

    if let Some((_, after)) = prompt.split_once("\"\"\"") {
        if let Some((inner, _)) = after.split_once("\"\"\"") {
            sections.insert("style_guidelines", inner.trim().to_string());
        }
    }
    sections
}

/// Ask a model why `ai_output` missed the mark described by `critique`.
pub fn build_blame_prompt(original_prompt: &str, ai_output: &str, critique: &str) -> String {
    format!(
        r#"You are an AI prompt debugging assistant. Analyze why the AI output didn't meet expectations.

## Original Prompt Sent to AI:
```
{original_prompt}
```

## AI Output:
```
{ai_output}
```

## Human Critique:
{critique}

## Your Task:
1. Analyze what went wrong - why did the AI produce output that didn't meet the human's expectations?
2. Identify which specific sections or instructions in the prompt led to the undesired behavior.
3. Suggest concrete improvements to the prompt.

## Response Format:
Provide your analysis in the following JSON format:
```json
{{
  "reasoning": "Detailed explanation of why the AI produced this output...",
  "problematicSections": [
    {{
      "section": "Name or quote of the problematic section",
      "issue": "What's wrong with this section",
      "suggestion": "How to fix it"
    }}
  ]
}}
```"#
    )
}

/// Ask a model to score `new_output` against the approved `golden_output`.
pub fn build_comparison_prompt(
    original_email: &str,
    golden_output: &str,
    new_output: &str,
    operation_type: &str,
) -> String {
    format!(
        r#"You are an expert email quality evaluator. Compare two AI-generated outputs for the same email task and score the new output.

## Task Type
{operation_type}

## Original Email Context
{original_email}

## Reference Output (User's Approved Result)
{golden_output}

## New Output (To Be Evaluated)
{new_output}

## Evaluation Criteria
1. **Accuracy**: Does it correctly address the email content and intent?
2. **Tone & Style**: Is the tone appropriate and consistent?
3. **Completeness**: Does it include all necessary information?
4. **Clarity**: Is it clear, well-structured, and easy to understand?
5. **Professionalism**: Does it maintain professional standards?

## Your Task
Compare the New Output against the Reference Output and provide:
1. A score from 1-100 where:
   - 50 = Equal quality to reference
   - 51-100 = New output is better (higher = much better)
   - 1-49 = New output is worse (lower = much worse)
2. Specific improvements in the new output
3. Specific regressions in the new output
4. Your recommendation

## Response Format
You MUST respond in this exact JSON format:
```json
{{
  "score": 65,
  "reasoning": "Brief explanation of the overall comparison...",
  "improvements": ["Improvement 1", "Improvement 2"],
  "regressions": ["Regression 1"],
  "recommendation": "keep_new"
}}
```

Where recommendation is one of:
- "keep_new": New output is significantly better, recommend updating the golden result
- "keep_old": Reference is better, keep the current golden result
- "review": Similar quality, needs human review"#
    )
}
