//! Built-in rewriting tools (expand, shorten, translate...) and their prompts.

use anyhow::Result;

use crate::model::{WritingTool, WritingToolId};
use crate::store::Store;

pub const CONTENT_PLACEHOLDER: &str = "{{content}}";

impl WritingToolId {
    pub fn display_name(&self) -> &'static str {
        match self {
            WritingToolId::Expand => "加长",
            WritingToolId::Shorten => "精简",
            WritingToolId::SpellCheck => "拼写检查",
            WritingToolId::Formal => "正式化",
            WritingToolId::Casual => "口语化",
            WritingToolId::TranslateZh => "译成中文",
            WritingToolId::TranslateEn => "译成英文",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WritingToolId::Expand => "扩展内容，增加更多细节",
            WritingToolId::Shorten => "缩短内容，保留核心信息",
            WritingToolId::SpellCheck => "检查并修正拼写和语法错误",
            WritingToolId::Formal => "转换为更正式的商务风格",
            WritingToolId::Casual => "转换为更轻松友好的风格",
            WritingToolId::TranslateZh => "翻译成中文",
            WritingToolId::TranslateEn => "翻译成英文",
        }
    }

    /// Prompt used until the user saves their own.
    pub fn default_prompt(&self) -> &'static str {
        match self {
            WritingToolId::Expand => {
                "请将以下内容扩展得更详细，添加更多细节和解释，但保持原意不变：\n\n{{content}}\n\n\
                 要求：\n- 保持原有的语气和风格\n- 增加相关的细节和背景信息\n- 不要改变核心意思"
            }
            WritingToolId::Shorten => {
                "请将以下内容精简，只保留核心信息：\n\n{{content}}\n\n\
                 要求：\n- 删除冗余和重复的内容\n- 保留关键信息和要点\n- 保持专业的语气"
            }
            WritingToolId::SpellCheck => {
                "请检查并修正以下内容中的拼写和语法错误：\n\n{{content}}\n\n\
                 要求：\n- 修正所有拼写错误\n- 修正语法错误\n- 改进标点符号使用\n- 保持原意不变\n- 如果没有错误，返回原文"
            }
            WritingToolId::Formal => {
                "请将以下内容改写为更正式的商务风格：\n\n{{content}}\n\n\
                 要求：\n- 使用正式的商务用语\n- 避免口语化表达\n- 保持专业和礼貌的语气\n- 保留原有的核心信息"
            }
            WritingToolId::Casual => {
                "请将以下内容改写为更轻松友好的风格：\n\n{{content}}\n\n\
                 要求：\n- 使用自然的口语表达\n- 保持友好和亲切的语气\n- 可以使用缩写和日常用语\n- 保留核心信息"
            }
            WritingToolId::TranslateZh => {
                "请将以下内容翻译成中文：\n\n{{content}}\n\n\
                 要求：\n- 准确传达原意\n- 使用自然流畅的中文表达\n- 保持原有的语气和风格"
            }
            WritingToolId::TranslateEn => {
                "Please translate the following content into English:\n\n{{content}}\n\n\
                 Requirements:\n- Accurate translation of the original meaning\n\
                 - Use natural and fluent English\n- Maintain the original tone and style"
            }
        }
    }
}

/// All tools with saved prompts merged over the defaults. Empty overrides are ignored.
pub fn list_tools(store: &Store) -> Result<Vec<WritingTool>> {
    let overrides = store.writing_tool_overrides()?;
    Ok(WritingToolId::ALL
        .into_iter()
        .map(|id| {
            let saved = overrides
                .iter()
                .find(|o| o.tool_id == id && !o.prompt.is_empty());
            WritingTool {
                id,
                name: id.display_name().to_string(),
                description: id.description().to_string(),
                prompt: saved
                    .map(|o| o.prompt.clone())
                    .unwrap_or_else(|| id.default_prompt().to_string()),
                updated_at: saved.map(|o| o.updated_at.clone()),
            }
        })
        .collect())
}

/// The prompt to run for `id`: `override_prompt` when non-empty, else saved, else default.
pub fn resolve_prompt(store: &Store, id: WritingToolId, override_prompt: Option<&str>) -> Result<String> {
    if let Some(prompt) = override_prompt.filter(|p| !p.trim().is_empty()) {
        return Ok(prompt.to_string());
    }
    let saved = store
        .writing_tool_overrides()?
        .into_iter()
        .find(|o| o.tool_id == id && !o.prompt.is_empty());
    Ok(saved
        .map(|o| o.prompt)
        .unwrap_or_else(|| id.default_prompt().to_string()))
}

/// Put `content` in place of every `{{content}}` token.
pub fn fill_template(template: &str, content: &str) -> String {
    template.replace(CONTENT_PLACEHOLDER, content)
}
