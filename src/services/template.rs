//! Filename templates
//!
//! Templates are literal text with `{variable}` placeholders, rendered from
//! an asset's analysis and media info. Rendered names are sanitized to a
//! safe filename stem; the executor appends the extension.

use crate::error::{Error, Result};
use crate::storage::slugify;
use chrono::{DateTime, Utc};

const KNOWN_VARIABLES: &[&str] = &[
    "description",
    "tags",
    "scene",
    "date",
    "time",
    "datetime",
    "index",
    "original",
    "width",
    "height",
    "resolution",
];

const MAX_STEM_LEN: usize = 100;

/// Values available to a template for one asset.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub scene: Option<String>,
    /// Timestamp used for the date/time variables; import time of the asset.
    pub timestamp: Option<DateTime<Utc>>,
    /// Position of the asset within a batch, for the `{index}` variable.
    pub index: usize,
    /// Original filename stem.
    pub original: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NameTemplate {
    template: String,
}

impl NameTemplate {
    /// Parse and validate a template string. Unknown variables and unbalanced
    /// braces are rejected.
    pub fn parse(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(Error::Validation("template is empty".to_string()));
        }
        for var in extract_variables(template)? {
            if !KNOWN_VARIABLES.contains(&var.as_str()) {
                return Err(Error::Validation(format!(
                    "unknown template variable: {{{}}}",
                    var
                )));
            }
        }
        Ok(Self {
            template: template.to_string(),
        })
    }

    /// Render the template to a sanitized filename stem.
    pub fn render(&self, ctx: &TemplateContext) -> String {
        let ts = ctx.timestamp.unwrap_or_else(Utc::now);
        let mut out = String::new();
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '{' {
                out.push(c);
                continue;
            }
            let mut var = String::new();
            for v in chars.by_ref() {
                if v == '}' {
                    break;
                }
                var.push(v);
            }
            out.push_str(&expand(&var, ctx, &ts));
        }

        let mut stem = slugify(&out);
        if stem.len() > MAX_STEM_LEN {
            stem.truncate(MAX_STEM_LEN);
            while stem.ends_with('_') || stem.ends_with('-') {
                stem.pop();
            }
        }
        stem
    }
}

fn expand(var: &str, ctx: &TemplateContext, ts: &DateTime<Utc>) -> String {
    match var {
        "description" => ctx
            .description
            .as_deref()
            .map(|d| first_words(d, 4))
            .unwrap_or_default(),
        "tags" => ctx.tags.iter().take(3).cloned().collect::<Vec<_>>().join(" "),
        "scene" => ctx.scene.clone().unwrap_or_default(),
        "date" => ts.format("%Y%m%d").to_string(),
        "time" => ts.format("%H%M%S").to_string(),
        "datetime" => ts.format("%Y%m%d_%H%M%S").to_string(),
        "index" => format!("{:03}", ctx.index),
        "original" => ctx.original.clone(),
        "width" => ctx.width.map(|w| w.to_string()).unwrap_or_default(),
        "height" => ctx.height.map(|h| h.to_string()).unwrap_or_default(),
        "resolution" => match (ctx.width, ctx.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

fn first_words(text: &str, count: usize) -> String {
    text.split_whitespace()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_variables(template: &str) -> Result<Vec<String>> {
    let mut vars = Vec::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                let mut var = String::new();
                let mut closed = false;
                for v in chars.by_ref() {
                    if v == '}' {
                        closed = true;
                        break;
                    }
                    if v == '{' {
                        return Err(Error::Validation("nested '{' in template".to_string()));
                    }
                    var.push(v);
                }
                if !closed {
                    return Err(Error::Validation("unclosed '{' in template".to_string()));
                }
                vars.push(var);
            }
            '}' => {
                return Err(Error::Validation("unmatched '}' in template".to_string()));
            }
            _ => {}
        }
    }
    Ok(vars)
}
