//! `{{PLACEHOLDER}}` substitution for operation prompts.
//!
//! Substitution is a single left-to-right pass: every `{{NAME}}` token in the
//! template is looked up once and replaced by its value. Inserted values are
//! never rescanned, so user text containing `{{MAIL}}` stays literal. Tokens
//! that are not recognised are left exactly as written.

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::model::{OperationType, PromptTestConfig, StyleStrategy, TestEmail};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_.]*)\}\}").expect("valid regex"));

const DATE_TIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";
const DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Everything a template can draw on for one request. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct VariableContext<'a> {
    pub email: Option<&'a TestEmail>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub user_input: Option<String>,
    pub style: Option<StyleStrategy>,
    pub custom_instruction: Option<String>,
    pub operation_type: Option<OperationType>,
    pub has_external_signature: bool,
    pub profiles: Option<String>,
    pub all_mails: Option<String>,
    pub locale: Option<String>,
    pub category: Option<String>,
}

impl<'a> VariableContext<'a> {
    pub fn from_config(config: &PromptTestConfig, email: Option<&'a TestEmail>) -> Self {
        Self {
            email,
            sender_name: Some(config.sender_context.name.clone()),
            sender_email: config.sender_context.email.clone(),
            user_input: Some(config.user_input.clone()),
            style: Some(config.style_strategy),
            custom_instruction: config.custom_instruction.clone(),
            operation_type: Some(config.operation_type),
            has_external_signature: config.sender_context.has_external_signature,
            profiles: config.profiles.clone(),
            all_mails: config.all_mails.clone(),
            locale: config.locale.clone(),
            category: config.category.clone(),
        }
    }

    fn all_mails(&self) -> String {
        if let Some(all) = non_empty(&self.all_mails) {
            return all.to_string();
        }
        match (non_empty(&self.sender_name), non_empty(&self.sender_email)) {
            (Some(name), Some(email)) => format!("{} <{}>", name, email),
            (_, Some(email)) => email.to_string(),
            _ => String::new(),
        }
    }

    fn resolve(&self, name: &str, now: &DateTime<Local>) -> Option<String> {
        let text = |value: &Option<String>| non_empty(value).unwrap_or_default().to_string();
        let from_email = |field: fn(&TestEmail) -> String| self.email.map(field).unwrap_or_default();

        let value = match name {
            "CURRENT_DATE_TIME" | "local_time" => now.format(DATE_TIME_FORMAT).to_string(),
            "local_date" => now.format(DATE_FORMAT).to_string(),

            "ALL_MAILS" => self.all_mails(),
            "CUSTOM_INSTRUCTION" => text(&self.custom_instruction),
            "LOCALE" => non_empty(&self.locale).unwrap_or("en-US").to_string(),
            "CATEGORY" => text(&self.category),
            "PROFILES" => text(&self.profiles),

            "EXTRA.fromName" | "sender_name" => text(&self.sender_name),
            "EXTRA.fromEmail" | "sender_email" => text(&self.sender_email),
            "EXTRA.content" | "user_input" => text(&self.user_input),
            "EXTRA.operationType" => self
                .operation_type
                .map(|op| op.label())
                .unwrap_or("NEW")
                .to_string(),
            "EXTRA.hasExternalSignature" => self.has_external_signature.to_string(),
            "style" => self.style.unwrap_or_default().as_str().to_string(),

            "EXTRA.to" | "MAIL_ENVELOPE.to" | "email_to" => from_email(|e| e.to.clone()),
            "EXTRA.cc" | "email_cc" => from_email(|e| e.cc.clone().unwrap_or_default()),
            "EXTRA.subject" | "MAIL_ENVELOPE.subject" | "email_subject" => {
                from_email(|e| e.subject.clone())
            }
            "MAIL_ENVELOPE.from" | "email_from" => from_email(|e| e.from.clone()),
            "MAIL_ENVELOPE.date" | "email_date" => from_email(|e| e.date.clone()),
            "email_body" => from_email(|e| e.body.clone()),
            "MAIL" => from_email(format_mail_content),
            "MAIL_ENVELOPE.mailPrimaryLanguage" => self
                .email
                .map(|e| detect_language(&e.body))
                .unwrap_or("English")
                .to_string(),

            _ => return None,
        };
        Some(value)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Replace every recognised placeholder in `template` using the local clock.
pub fn substitute(template: &str, ctx: &VariableContext<'_>) -> String {
    substitute_at(template, ctx, Local::now())
}

/// Same as [`substitute`] with an explicit clock reading.
pub fn substitute_at(template: &str, ctx: &VariableContext<'_>, now: DateTime<Local>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            ctx.resolve(&caps[1], &now)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Substitute, then append the selected email when the template never asked for it.
pub fn build_final_prompt(template: &str, ctx: &VariableContext<'_>) -> String {
    build_final_prompt_at(template, ctx, Local::now())
}

pub fn build_final_prompt_at(
    template: &str,
    ctx: &VariableContext<'_>,
    now: DateTime<Local>,
) -> String {
    let mut result = substitute_at(template, ctx, now);

    if let Some(email) = ctx.email {
        let has_mail_content = template.contains("{{MAIL}}")
            || template.contains("{{email_body}}")
            || result.contains(&email.body);

        if !has_mail_content {
            result.push_str("\n\n---\n<Original email begins>\n");
            result.push_str(&format_mail_content(email));
            result.push_str("\n<Original email ends>\n---");
        }
    }

    result
}

/// The `{{MAIL}}` rendering of a message.
pub fn format_mail_content(email: &TestEmail) -> String {
    let mut out = format!("From: {}\nTo: {}", email.from, email.to);
    if let Some(cc) = email.cc.as_deref().filter(|cc| !cc.is_empty()) {
        out.push_str("\nCc: ");
        out.push_str(cc);
    }
    out.push_str(&format!(
        "\nDate: {}\nSubject: {}\n\n{}",
        email.date, email.subject, email.body
    ));
    out
}

/// `Chinese` when more than 10% of the characters are CJK ideographs, else `English`.
pub fn detect_language(text: &str) -> &'static str {
    let total = text.chars().count();
    let cjk = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fa5}').contains(c))
        .count();
    if cjk > 0 && cjk * 10 > total {
        "Chinese"
    } else {
        "English"
    }
}

/// Catalogue entry describing a placeholder for UI hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DynamicVariable {
    pub name: &'static str,
    pub placeholder: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

const fn var(
    name: &'static str,
    placeholder: &'static str,
    description: &'static str,
    example: &'static str,
) -> DynamicVariable {
    DynamicVariable {
        name,
        placeholder,
        description,
        example,
    }
}

pub const DYNAMIC_VARIABLES: &[DynamicVariable] = &[
    var("CURRENT_DATE_TIME", "{{CURRENT_DATE_TIME}}", "Current local date and time", "1/7/2025, 3:30:00 PM"),
    var("ALL_MAILS", "{{ALL_MAILS}}", "User name and address list", "John Doe <john@example.com>, john.doe@work.com"),
    var("CUSTOM_INSTRUCTION", "{{CUSTOM_INSTRUCTION}}", "User's custom instruction", "Keep it brief and friendly"),
    var("LOCALE", "{{LOCALE}}", "User's preferred language", "zh-CN"),
    var("CATEGORY", "{{CATEGORY}}", "Mailbox category", "primary"),
    var("PROFILES", "{{PROFILES}}", "User profile and writing history", "Professional, concise writer"),
    var("EXTRA.fromName", "{{EXTRA.fromName}}", "Sender name", "John Doe"),
    var("EXTRA.fromEmail", "{{EXTRA.fromEmail}}", "Sender address", "john@example.com"),
    var("EXTRA.to", "{{EXTRA.to}}", "Recipients of the selected email", "jane@example.com"),
    var("EXTRA.cc", "{{EXTRA.cc}}", "Cc of the selected email", "team@example.com"),
    var("EXTRA.subject", "{{EXTRA.subject}}", "Subject of the selected email", "Re: Project Update"),
    var("EXTRA.content", "{{EXTRA.content}}", "User's raw input or draft", "Thanks for the update"),
    var("EXTRA.operationType", "{{EXTRA.operationType}}", "Operation label (NEW/REPLY/FORWARD/...)", "REPLY"),
    var("EXTRA.hasExternalSignature", "{{EXTRA.hasExternalSignature}}", "Whether an external signature is attached", "true"),
    var("MAIL", "{{MAIL}}", "Full original email", "From: sender@example.com\nSubject: Hello\n\nEmail body..."),
    var("MAIL_ENVELOPE.mailPrimaryLanguage", "{{MAIL_ENVELOPE.mailPrimaryLanguage}}", "Primary language of the email", "English"),
    var("MAIL_ENVELOPE.from", "{{MAIL_ENVELOPE.from}}", "Original sender", "sender@example.com"),
    var("MAIL_ENVELOPE.to", "{{MAIL_ENVELOPE.to}}", "Original recipients", "recipient@example.com"),
    var("MAIL_ENVELOPE.subject", "{{MAIL_ENVELOPE.subject}}", "Original subject", "Project Discussion"),
    var("MAIL_ENVELOPE.date", "{{MAIL_ENVELOPE.date}}", "Original date", "2025-01-06 10:00:00"),
];

const USER_VOICE: [&str; 5] = [
    "ALL_MAILS",
    "CUSTOM_INSTRUCTION",
    "LOCALE",
    "CATEGORY",
    "PROFILES",
];

fn is_mail_variable(name: &str) -> bool {
    name == "MAIL" || name.starts_with("MAIL_ENVELOPE.")
}

/// Variables that are meaningful for `operation`.
pub fn variables_for_operation(operation: OperationType) -> Vec<DynamicVariable> {
    DYNAMIC_VARIABLES
        .iter()
        .filter(|v| !is_mail_variable(v.name) || operation.acts_on_email())
        .copied()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableGroup {
    pub name: &'static str,
    pub variables: Vec<DynamicVariable>,
}

/// [`variables_for_operation`] split into display groups.
pub fn grouped_variables(operation: OperationType) -> Vec<VariableGroup> {
    let vars = variables_for_operation(operation);
    let pick = |pred: &dyn Fn(&str) -> bool| -> Vec<DynamicVariable> {
        vars.iter().filter(|v| pred(v.name)).copied().collect()
    };

    vec![
        VariableGroup {
            name: "Time",
            variables: pick(&|n| n == "CURRENT_DATE_TIME"),
        },
        VariableGroup {
            name: "User voice",
            variables: pick(&|n| USER_VOICE.contains(&n)),
        },
        VariableGroup {
            name: "Sender (EXTRA)",
            variables: pick(&|n| n.starts_with("EXTRA.")),
        },
        VariableGroup {
            name: "Original mail (MAIL)",
            variables: pick(&is_mail_variable),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn email() -> TestEmail {
        TestEmail {
            id: "e1".to_string(),
            subject: "Budget".to_string(),
            from: "bob@x.com".to_string(),
            to: "alice@x.com".to_string(),
            cc: None,
            date: "2024-01-01".to_string(),
            body: "Please review.".to_string(),
            body_html: None,
            raw_eml: String::new(),
            file_name: "budget.eml".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            tags: vec![],
        }
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 7, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_time_placeholders_use_locale_style_format() {
        let ctx = VariableContext::default();
        let out = substitute_at("{{CURRENT_DATE_TIME}} | {{local_date}}", &ctx, fixed_now());
        assert_eq!(out, "1/7/2025, 3:30:00 PM | 1/7/2025");
    }

    #[test]
    fn test_all_mails_fallbacks() {
        let mut ctx = VariableContext {
            sender_name: Some("Alice".to_string()),
            sender_email: Some("alice@x.com".to_string()),
            ..Default::default()
        };
        assert_eq!(substitute("{{ALL_MAILS}}", &ctx), "Alice <alice@x.com>");

        ctx.sender_name = None;
        assert_eq!(substitute("{{ALL_MAILS}}", &ctx), "alice@x.com");

        ctx.all_mails = Some("a@x.com, b@x.com".to_string());
        assert_eq!(substitute("{{ALL_MAILS}}", &ctx), "a@x.com, b@x.com");

        assert_eq!(substitute("{{ALL_MAILS}}", &VariableContext::default()), "");
    }

    #[test]
    fn test_defaults_for_absent_fields() {
        let ctx = VariableContext::default();
        let out = substitute(
            "{{LOCALE}}|{{EXTRA.operationType}}|{{EXTRA.hasExternalSignature}}|{{style}}|{{MAIL_ENVELOPE.mailPrimaryLanguage}}|{{MAIL}}|{{email_body}}",
            &ctx,
        );
        assert_eq!(out, "en-US|NEW|false|Professional|English||");
    }

    #[test]
    fn test_cc_line_only_when_present() {
        let mut e = email();
        assert!(!format_mail_content(&e).contains("Cc:"));
        e.cc = Some(String::new());
        assert!(!format_mail_content(&e).contains("Cc:"));
        e.cc = Some("carol@x.com".to_string());
        assert!(format_mail_content(&e).contains("\nCc: carol@x.com\n"));
    }

    #[test]
    fn test_inserted_values_are_not_rescanned() {
        let ctx = VariableContext {
            user_input: Some("literal {{LOCALE}}".to_string()),
            ..Default::default()
        };
        assert_eq!(substitute("{{EXTRA.content}}", &ctx), "literal {{LOCALE}}");
    }

    #[test]
    fn test_auto_append_skipped_when_body_already_present() {
        let e = email();
        let ctx = VariableContext {
            email: Some(&e),
            ..Default::default()
        };
        let out = build_final_prompt("Body was: {{email_body}}", &ctx);
        assert_eq!(out, "Body was: Please review.");

        let out = build_final_prompt("Summarize this.", &ctx);
        assert!(out.starts_with("Summarize this.\n\n---\n<Original email begins>\nFrom: bob@x.com"));
        assert!(out.ends_with("Please review.\n<Original email ends>\n---"));
    }

    #[test]
    fn test_no_append_without_email() {
        let ctx = VariableContext::default();
        assert_eq!(build_final_prompt("Write something.", &ctx), "Write something.");
    }

    #[test]
    fn test_language_heuristic() {
        assert_eq!(detect_language(""), "English");
        assert_eq!(detect_language("你好，这是一封测试邮件"), "Chinese");
        assert_eq!(detect_language("Hello world"), "English");
    }

    #[test]
    fn test_variables_for_new_email_exclude_mail() {
        let vars = variables_for_operation(OperationType::NewEmail);
        assert!(vars.iter().all(|v| !is_mail_variable(v.name)));
        assert!(vars.iter().any(|v| v.name == "EXTRA.subject"));

        let vars = variables_for_operation(OperationType::ReplyEmail);
        assert!(vars.iter().any(|v| v.name == "MAIL"));
        assert_eq!(vars.len(), DYNAMIC_VARIABLES.len());
    }

    #[test]
    fn test_grouped_variables_cover_catalogue() {
        let groups = grouped_variables(OperationType::Summarize);
        assert_eq!(groups.len(), 4);
        let total: usize = groups.iter().map(|g| g.variables.len()).sum();
        assert_eq!(total, DYNAMIC_VARIABLES.len());
        assert!(grouped_variables(OperationType::NewEmail)[3]
            .variables
            .is_empty());
    }

    #[test]
    fn test_placeholders_in_catalogue_match_names() {
        for v in DYNAMIC_VARIABLES {
            assert_eq!(v.placeholder, format!("{{{{{}}}}}", v.name));
        }
    }
}
