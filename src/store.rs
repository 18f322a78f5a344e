//! SQLite persistence for emails, prompts, golden results and run history.
//!
//! One connection behind a mutex. Handlers clone the [`Store`] handle; the
//! lock is only held inside these synchronous methods, never across an await.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::model::{
    BatchRun, BlameAnalysis, GoldenResult, OperationPrompt, OperationType, PromptTemplate,
    TestEmail, TestResult, WritingToolId,
};
use crate::util::{generate_id, now_rfc3339};

const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS test_emails (
    id TEXT PRIMARY KEY,
    subject TEXT NOT NULL,
    from_addr TEXT NOT NULL,
    to_addr TEXT NOT NULL,
    cc_addr TEXT,
    date TEXT NOT NULL,
    body TEXT NOT NULL,
    body_html TEXT,
    raw_eml TEXT NOT NULL,
    file_name TEXT NOT NULL,
    tags TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS prompt_templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    template TEXT NOT NULL,
    variables TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_results (
    id TEXT PRIMARY KEY,
    test_email_id TEXT NOT NULL,
    config TEXT NOT NULL,
    generated_prompt TEXT NOT NULL,
    ai_response TEXT NOT NULL,
    human_critique TEXT,
    blame_analysis TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY(test_email_id) REFERENCES test_emails(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS batch_tests (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    config TEXT NOT NULL,
    results TEXT NOT NULL,
    summary TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS operation_prompts (
    operation_type TEXT PRIMARY KEY,
    prompt TEXT NOT NULL DEFAULT '',
    user_message TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS writing_tools (
    tool_id TEXT PRIMARY KEY,
    prompt TEXT NOT NULL DEFAULT '',
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS golden_results (
    id TEXT PRIMARY KEY,
    email_id TEXT NOT NULL,
    operation_type TEXT NOT NULL,
    prompt TEXT NOT NULL,
    output TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(email_id, operation_type),
    FOREIGN KEY(email_id) REFERENCES test_emails(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_test_emails_created ON test_emails(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_test_results_email_id ON test_results(test_email_id);
";

const EMAIL_COLUMNS: &str = "id, subject, from_addr, to_addr, cc_addr, date, body, body_html, \
                             raw_eml, file_name, tags, created_at";

const GOLDEN_COLUMNS: &str =
    "id, email_id, operation_type, prompt, output, notes, created_at, updated_at";

const TEMPLATE_COLUMNS: &str = "id, name, description, template, variables, created_at, updated_at";

/// Fields a client supplies when creating or replacing a template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Fields a client supplies when saving a golden result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenInput {
    pub email_id: String,
    pub operation_type: OperationType,
    pub prompt: String,
    pub output: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A stored replacement for a writing tool's built-in prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritingToolOverride {
    pub tool_id: WritingToolId,
    pub prompt: String,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create db parent directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open sqlite db {}", db_path.display()))?;
        Self::init(conn)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed running migrations")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // -- emails --------------------------------------------------------------

    /// All emails, newest upload first.
    pub fn list_emails(&self) -> Result<Vec<TestEmail>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {EMAIL_COLUMNS} FROM test_emails ORDER BY created_at DESC, rowid DESC"
            ))
            .context("failed preparing email list query")?;
        let rows = stmt
            .query_map([], email_from_row)
            .context("failed querying emails")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed reading email rows")
    }

    pub fn get_email(&self, id: &str) -> Result<Option<TestEmail>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {EMAIL_COLUMNS} FROM test_emails WHERE id = ?1"),
            params![id],
            email_from_row,
        )
        .optional()
        .context("failed loading email")
    }

    /// Insert a batch of emails in one transaction.
    pub fn insert_emails(&self, emails: &[TestEmail]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("failed starting transaction")?;
        for email in emails {
            let tags = serde_json::to_string(&email.tags).context("failed encoding tags")?;
            tx.execute(
                &format!(
                    "INSERT INTO test_emails ({EMAIL_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    email.id,
                    email.subject,
                    email.from,
                    email.to,
                    email.cc,
                    email.date,
                    email.body,
                    email.body_html,
                    email.raw_eml,
                    email.file_name,
                    tags,
                    email.created_at,
                ],
            )
            .with_context(|| format!("failed inserting email {}", email.file_name))?;
        }
        tx.commit().context("failed committing emails")?;
        debug!(count = emails.len(), "Inserted emails");
        Ok(emails.len())
    }

    /// Delete an email and everything that references it. False when absent.
    pub fn delete_email(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute("DELETE FROM test_emails WHERE id = ?1", params![id])
            .context("failed deleting email")?;
        Ok(changed > 0)
    }

    pub fn count_emails(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM test_emails", [], |row| row.get(0))
            .context("failed counting emails")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn update_email_body(&self, id: &str, body: &str, body_html: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE test_emails SET body = ?1, body_html = ?2 WHERE id = ?3",
                params![body, body_html, id],
            )
            .context("failed updating email body")?;
        Ok(changed > 0)
    }

    // -- operation prompts ---------------------------------------------------

    /// One entry per operation type, in canonical order. Unsaved ones are empty.
    pub fn list_operation_prompts(&self) -> Result<Vec<OperationPrompt>> {
        let saved = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare("SELECT operation_type, prompt, user_message, updated_at FROM operation_prompts")
                .context("failed preparing operation prompt query")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .context("failed querying operation prompts")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed reading operation prompt rows")?
        };

        Ok(OperationType::ALL
            .into_iter()
            .map(|op| {
                match saved.iter().find(|(stored, ..)| stored == op.as_str()) {
                    Some((_, prompt, user_message, updated_at)) => OperationPrompt {
                        operation_type: op,
                        prompt: prompt.clone(),
                        user_message: user_message.clone(),
                        updated_at: Some(updated_at.clone()),
                    },
                    None => OperationPrompt {
                        operation_type: op,
                        prompt: String::new(),
                        user_message: None,
                        updated_at: None,
                    },
                }
            })
            .collect())
    }

    pub fn get_operation_prompt(&self, op: OperationType) -> Result<Option<OperationPrompt>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT prompt, user_message, updated_at FROM operation_prompts WHERE operation_type = ?1",
            params![op.as_str()],
            |row| {
                Ok(OperationPrompt {
                    operation_type: op,
                    prompt: row.get(0)?,
                    user_message: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            },
        )
        .optional()
        .context("failed loading operation prompt")
    }

    /// Insert or replace the prompt for `op`. `user_message: None` keeps the stored one.
    pub fn upsert_operation_prompt(
        &self,
        op: OperationType,
        prompt: &str,
        user_message: Option<&str>,
    ) -> Result<OperationPrompt> {
        let now = now_rfc3339();
        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO operation_prompts (operation_type, prompt, user_message, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(operation_type) DO UPDATE SET
                    prompt = excluded.prompt,
                    user_message = COALESCE(excluded.user_message, operation_prompts.user_message),
                    updated_at = excluded.updated_at",
                params![op.as_str(), prompt, user_message, now],
            )
            .context("failed saving operation prompt")?;
        }
        self.get_operation_prompt(op)?
            .with_context(|| format!("operation prompt {} missing after save", op))
    }

    // -- golden results ------------------------------------------------------

    /// Golden results, optionally filtered, most recently updated first.
    pub fn list_golden_results(
        &self,
        email_id: Option<&str>,
        op: Option<OperationType>,
    ) -> Result<Vec<GoldenResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {GOLDEN_COLUMNS} FROM golden_results
                 WHERE (?1 IS NULL OR email_id = ?1)
                   AND (?2 IS NULL OR operation_type = ?2)
                 ORDER BY updated_at DESC, rowid DESC"
            ))
            .context("failed preparing golden result query")?;
        let rows = stmt
            .query_map(params![email_id, op.map(|o| o.as_str())], golden_from_row)
            .context("failed querying golden results")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed reading golden result rows")
    }

    pub fn get_golden_result(
        &self,
        email_id: &str,
        op: OperationType,
    ) -> Result<Option<GoldenResult>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {GOLDEN_COLUMNS} FROM golden_results
                 WHERE email_id = ?1 AND operation_type = ?2"
            ),
            params![email_id, op.as_str()],
            golden_from_row,
        )
        .optional()
        .context("failed loading golden result")
    }

    /// Save the reference output for (email, operation). An existing row keeps
    /// its id and creation time.
    pub fn upsert_golden_result(&self, input: &GoldenInput) -> Result<GoldenResult> {
        let now = now_rfc3339();
        {
            let conn = self.conn.lock();
            conn.execute(
                &format!(
                    "INSERT INTO golden_results ({GOLDEN_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                     ON CONFLICT(email_id, operation_type) DO UPDATE SET
                        prompt = excluded.prompt,
                        output = excluded.output,
                        notes = excluded.notes,
                        updated_at = excluded.updated_at"
                ),
                params![
                    generate_id(),
                    input.email_id,
                    input.operation_type.as_str(),
                    input.prompt,
                    input.output,
                    input.notes,
                    now,
                ],
            )
            .context("failed saving golden result")?;
        }
        self.get_golden_result(&input.email_id, input.operation_type)?
            .context("golden result missing after save")
    }

    pub fn delete_golden_result(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute("DELETE FROM golden_results WHERE id = ?1", params![id])
            .context("failed deleting golden result")?;
        Ok(changed > 0)
    }

    // -- templates -----------------------------------------------------------

    pub fn list_templates(&self) -> Result<Vec<PromptTemplate>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TEMPLATE_COLUMNS} FROM prompt_templates ORDER BY updated_at DESC, rowid DESC"
            ))
            .context("failed preparing template query")?;
        let rows = stmt
            .query_map([], template_from_row)
            .context("failed querying templates")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed reading template rows")
    }

    pub fn get_template(&self, id: &str) -> Result<Option<PromptTemplate>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM prompt_templates WHERE id = ?1"),
            params![id],
            template_from_row,
        )
        .optional()
        .context("failed loading template")
    }

    pub fn create_template(&self, input: &TemplateInput) -> Result<PromptTemplate> {
        let now = now_rfc3339();
        let template = PromptTemplate {
            id: generate_id(),
            name: input.name.clone(),
            description: input.description.clone(),
            template: input.template.clone(),
            variables: input.variables.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        let variables =
            serde_json::to_string(&template.variables).context("failed encoding variables")?;
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO prompt_templates ({TEMPLATE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                template.id,
                template.name,
                template.description,
                template.template,
                variables,
                template.created_at,
                template.updated_at,
            ],
        )
        .context("failed creating template")?;
        Ok(template)
    }

    /// Replace a template's editable fields. False when the id is unknown.
    pub fn update_template(&self, id: &str, input: &TemplateInput) -> Result<bool> {
        let variables =
            serde_json::to_string(&input.variables).context("failed encoding variables")?;
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE prompt_templates
                 SET name = ?1, description = ?2, template = ?3, variables = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    input.name,
                    input.description,
                    input.template,
                    variables,
                    now_rfc3339(),
                    id,
                ],
            )
            .context("failed updating template")?;
        Ok(changed > 0)
    }

    pub fn delete_template(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn
            .execute("DELETE FROM prompt_templates WHERE id = ?1", params![id])
            .context("failed deleting template")?;
        Ok(changed > 0)
    }

    // -- test results --------------------------------------------------------

    pub fn save_test_result(&self, result: &TestResult) -> Result<()> {
        let config = serde_json::to_string(&result.config).context("failed encoding config")?;
        let response =
            serde_json::to_string(&result.ai_response).context("failed encoding response")?;
        let blame = result
            .blame_analysis
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("failed encoding blame analysis")?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO test_results
                (id, test_email_id, config, generated_prompt, ai_response,
                 human_critique, blame_analysis, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                result.id,
                result.test_email_id,
                config,
                result.generated_prompt,
                response,
                result.human_critique,
                blame,
                result.created_at,
            ],
        )
        .context("failed saving test result")?;
        Ok(())
    }

    /// Saved runs for one email, newest first.
    pub fn test_results_for_email(&self, email_id: &str) -> Result<Vec<TestResult>> {
        let raw = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, test_email_id, config, generated_prompt, ai_response,
                            human_critique, blame_analysis, created_at
                     FROM test_results WHERE test_email_id = ?1
                     ORDER BY created_at DESC, rowid DESC",
                )
                .context("failed preparing test result query")?;
            let rows = stmt
                .query_map(params![email_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                })
                .context("failed querying test results")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed reading test result rows")?
        };

        raw.into_iter()
            .map(
                |(id, test_email_id, config, generated_prompt, response, critique, blame, created_at)| {
                    Ok(TestResult {
                        config: serde_json::from_str(&config)
                            .with_context(|| format!("corrupt config on test result {}", id))?,
                        ai_response: serde_json::from_str(&response)
                            .with_context(|| format!("corrupt response on test result {}", id))?,
                        blame_analysis: blame
                            .as_deref()
                            .map(serde_json::from_str::<BlameAnalysis>)
                            .transpose()
                            .with_context(|| format!("corrupt blame on test result {}", id))?,
                        id,
                        test_email_id,
                        generated_prompt,
                        human_critique: critique,
                        created_at,
                    })
                },
            )
            .collect()
    }

    /// Attach a critique (and optionally its analysis) to a saved run.
    pub fn update_test_result_critique(
        &self,
        id: &str,
        critique: &str,
        analysis: Option<&BlameAnalysis>,
    ) -> Result<bool> {
        let blame = analysis
            .map(serde_json::to_string)
            .transpose()
            .context("failed encoding blame analysis")?;
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE test_results SET human_critique = ?1, blame_analysis = ?2 WHERE id = ?3",
                params![critique, blame, id],
            )
            .context("failed updating test result critique")?;
        Ok(changed > 0)
    }

    // -- batches -------------------------------------------------------------

    pub fn save_batch(&self, run: &BatchRun) -> Result<()> {
        let config = serde_json::to_string(&run.config).context("failed encoding batch config")?;
        let results =
            serde_json::to_string(&run.results).context("failed encoding batch results")?;
        let summary =
            serde_json::to_string(&run.summary).context("failed encoding batch summary")?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO batch_tests (id, name, config, results, summary, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                results = excluded.results,
                summary = excluded.summary,
                status = excluded.status",
            params![
                run.id,
                run.config.name,
                config,
                results,
                summary,
                run.status,
                run.created_at,
            ],
        )
        .context("failed saving batch run")?;
        Ok(())
    }

    /// Every batch run, newest first.
    pub fn list_batches(&self) -> Result<Vec<BatchRun>> {
        let raw = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, config, results, summary, status, created_at
                     FROM batch_tests ORDER BY created_at DESC, rowid DESC",
                )
                .context("failed preparing batch query")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .context("failed querying batch runs")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("failed reading batch rows")?
        };

        raw.into_iter()
            .map(|(id, config, results, summary, status, created_at)| {
                Ok(BatchRun {
                    config: serde_json::from_str(&config)
                        .with_context(|| format!("corrupt config on batch {}", id))?,
                    results: serde_json::from_str(&results)
                        .with_context(|| format!("corrupt results on batch {}", id))?,
                    summary: serde_json::from_str(&summary)
                        .with_context(|| format!("corrupt summary on batch {}", id))?,
                    id,
                    status,
                    created_at,
                })
            })
            .collect()
    }

    // -- writing tools -------------------------------------------------------

    /// Stored prompt overrides. Rows for tools this build does not know are ignored.
    pub fn writing_tool_overrides(&self) -> Result<Vec<WritingToolOverride>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT tool_id, prompt, updated_at FROM writing_tools")
            .context("failed preparing writing tool query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("failed querying writing tools")?;
        let rows = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("failed reading writing tool rows")?;
        Ok(rows
            .into_iter()
            .filter_map(|(tool_id, prompt, updated_at)| {
                let tool_id = tool_id.parse::<WritingToolId>().ok()?;
                Some(WritingToolOverride {
                    tool_id,
                    prompt,
                    updated_at,
                })
            })
            .collect())
    }

    pub fn upsert_writing_tool(&self, tool_id: WritingToolId, prompt: &str) -> Result<String> {
        let now = now_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO writing_tools (tool_id, prompt, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(tool_id) DO UPDATE SET
                prompt = excluded.prompt,
                updated_at = excluded.updated_at",
            params![tool_id.as_str(), prompt, now],
        )
        .context("failed saving writing tool")?;
        Ok(now)
    }
}

fn email_from_row(row: &Row<'_>) -> rusqlite::Result<TestEmail> {
    let tags: Option<String> = row.get(10)?;
    Ok(TestEmail {
        id: row.get(0)?,
        subject: row.get(1)?,
        from: row.get(2)?,
        to: row.get(3)?,
        cc: row.get(4)?,
        date: row.get(5)?,
        body: row.get(6)?,
        body_html: row.get(7)?,
        raw_eml: row.get(8)?,
        file_name: row.get(9)?,
        tags: tags
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_default(),
        created_at: row.get(11)?,
    })
}

fn golden_from_row(row: &Row<'_>) -> rusqlite::Result<GoldenResult> {
    let op: String = row.get(2)?;
    let operation_type = op.parse::<OperationType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(GoldenResult {
        id: row.get(0)?,
        email_id: row.get(1)?,
        operation_type,
        prompt: row.get(3)?,
        output: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<PromptTemplate> {
    let variables: Option<String> = row.get(4)?;
    Ok(PromptTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        template: row.get(3)?,
        variables: variables
            .and_then(|v| serde_json::from_str(&v).ok())
            .unwrap_or_default(),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[cfg(test)]
impl Store {
    /// Run SQL the typed API would never issue, e.g. to plant a corrupt row.
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<usize> {
        self.conn.lock().execute(sql, []).context("failed executing raw sql")
    }
}
