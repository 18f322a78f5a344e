//! Store behaviour against a real database file.

use filoprompt::llm::client::Completion;
use filoprompt::model::{
    BlameAnalysis, OperationType, ProblematicSection, PromptTestConfig, TestEmail, TestResult,
    WritingToolId,
};
use filoprompt::store::{GoldenInput, Store, TemplateInput};

fn email(id: &str) -> TestEmail {
    TestEmail {
        id: id.to_string(),
        subject: format!("Subject {}", id),
        from: "bob@x.com".to_string(),
        to: "alice@x.com".to_string(),
        cc: Some("team@x.com".to_string()),
        date: "2024-01-01T00:00:00.000Z".to_string(),
        body: "Please review.".to_string(),
        body_html: Some("<p>Please review.</p>".to_string()),
        raw_eml: "From: bob@x.com\r\n\r\nPlease review.".to_string(),
        file_name: format!("{}.eml", id),
        created_at: format!("2024-01-0{}T00:00:00Z", id.len()),
        tags: Vec::new(),
    }
}

fn test_result(id: &str, email_id: &str) -> TestResult {
    TestResult {
        id: id.to_string(),
        test_email_id: email_id.to_string(),
        config: PromptTestConfig::new(OperationType::ReplyEmail),
        generated_prompt: "system prompt".to_string(),
        ai_response: Completion {
            output: "draft".to_string(),
            model: "gpt-4o".to_string(),
            provider: "openai".to_string(),
            usage: None,
            latency_ms: 120,
        },
        human_critique: None,
        blame_analysis: None,
        created_at: "2024-02-01T00:00:00Z".to_string(),
    }
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("filoprompt.db");
    {
        let store = Store::open(&path).unwrap();
        store.insert_emails(&[email("a"), email("bb")]).unwrap();
        store
            .upsert_operation_prompt(OperationType::Summarize, "Summarize {{MAIL}}", Some("Go"))
            .unwrap();
        store
            .upsert_writing_tool(WritingToolId::Formal, "Formal: {{content}}")
            .unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.count_emails().unwrap(), 2);
    let loaded = store.get_email("a").unwrap().unwrap();
    assert_eq!(loaded, email("a"));

    let prompt = store
        .get_operation_prompt(OperationType::Summarize)
        .unwrap()
        .unwrap();
    assert_eq!(prompt.prompt, "Summarize {{MAIL}}");
    assert_eq!(prompt.user_message.as_deref(), Some("Go"));

    let overrides = store.writing_tool_overrides().unwrap();
    assert_eq!(overrides.len(), 1);
    assert_eq!(overrides[0].tool_id, WritingToolId::Formal);
}

#[test]
fn test_test_results_and_critique() {
    let store = Store::open_in_memory().unwrap();
    store.insert_emails(&[email("a")]).unwrap();
    store.save_test_result(&test_result("r1", "a")).unwrap();

    let analysis = BlameAnalysis {
        reasoning: "too long".to_string(),
        problematic_sections: vec![ProblematicSection {
            section: "CORE TASK".to_string(),
            issue: "no limit".to_string(),
            suggestion: "add one".to_string(),
        }],
    };
    assert!(store
        .update_test_result_critique("r1", "way too long", Some(&analysis))
        .unwrap());
    assert!(!store
        .update_test_result_critique("missing", "x", None)
        .unwrap());

    let results = store.test_results_for_email("a").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].human_critique.as_deref(), Some("way too long"));
    assert_eq!(results[0].blame_analysis.as_ref(), Some(&analysis));
    assert_eq!(results[0].ai_response.latency_ms, 120);
}

#[test]
fn test_deleting_email_removes_dependents() {
    let store = Store::open_in_memory().unwrap();
    store.insert_emails(&[email("a"), email("bb")]).unwrap();
    store.save_test_result(&test_result("r1", "a")).unwrap();
    store
        .upsert_golden_result(&GoldenInput {
            email_id: "a".to_string(),
            operation_type: OperationType::ReplyEmail,
            prompt: "p".to_string(),
            output: "gold".to_string(),
            notes: None,
        })
        .unwrap();

    assert!(store.delete_email("a").unwrap());
    assert!(!store.delete_email("a").unwrap());
    assert!(store.test_results_for_email("a").unwrap().is_empty());
    assert!(store.list_golden_results(None, None).unwrap().is_empty());
    assert_eq!(store.count_emails().unwrap(), 1);
}

#[test]
fn test_golden_results_filtering() {
    let store = Store::open_in_memory().unwrap();
    store.insert_emails(&[email("a"), email("bb")]).unwrap();
    for (email_id, op) in [
        ("a", OperationType::ReplyEmail),
        ("a", OperationType::Summarize),
        ("bb", OperationType::ReplyEmail),
    ] {
        store
            .upsert_golden_result(&GoldenInput {
                email_id: email_id.to_string(),
                operation_type: op,
                prompt: String::new(),
                output: format!("{} {}", email_id, op),
                notes: Some("approved".to_string()),
            })
            .unwrap();
    }

    assert_eq!(store.list_golden_results(None, None).unwrap().len(), 3);
    assert_eq!(store.list_golden_results(Some("a"), None).unwrap().len(), 2);
    let replies = store
        .list_golden_results(None, Some(OperationType::ReplyEmail))
        .unwrap();
    assert_eq!(replies.len(), 2);
    let one = store
        .list_golden_results(Some("bb"), Some(OperationType::ReplyEmail))
        .unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].output, "bb reply_email");
}

#[test]
fn test_template_update_and_delete_report_missing_rows() {
    let store = Store::open_in_memory().unwrap();
    let input = TemplateInput {
        name: "Polite reply".to_string(),
        description: None,
        template: "Reply politely to {{EXTRA.subject}}".to_string(),
        variables: vec!["EXTRA.subject".to_string()],
    };
    assert!(!store.update_template("nope", &input).unwrap());
    assert!(!store.delete_template("nope").unwrap());

    let created = store.create_template(&input).unwrap();
    assert_eq!(created.variables, vec!["EXTRA.subject".to_string()]);
    assert_eq!(store.list_templates().unwrap().len(), 1);
    assert!(store.delete_template(&created.id).unwrap());
    assert!(store.get_template(&created.id).unwrap().is_none());
}
