//! Worksheet rendering with Handlebars.
//!
//! Two variants:
//!   - HTML: one block per question, as many as the model returned. Values are HTML-escaped.
//!   - LaTeX: exactly `LATEX_SLOTS` question slots. Values go in verbatim since they
//!     carry LaTeX math; the question list is padded or truncated to fit first.
//!
//! Holes are named (`topic`, `statement`, `a`..`e`, ...). Substituted text is never
//! re-parsed as template source.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{ProblemSet, Question, Tier};

/// Number of question slots in the LaTeX worksheet.
pub const LATEX_SLOTS: usize = 7;

const HTML_TEMPLATE_FILE: &str = "worksheet.html.hbs";
const LATEX_TEMPLATE_FILE: &str = "worksheet.tex.hbs";
const EMBEDDED_HTML: &str = include_str!("../templates/worksheet.html.hbs");
const EMBEDDED_LATEX: &str = include_str!("../templates/worksheet.tex.hbs");
const TEMPLATE: &str = "worksheet";

#[derive(Debug, Error)]
pub enum TemplateLoadError {
    #[error("cannot read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Template(#[from] handlebars::TemplateError),
}

/// How the question list was fitted to the fixed slot count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotFit {
    Exact,
    /// Trailing slots were filled with empty questions.
    Padded { missing: usize },
    /// Questions beyond the last slot were dropped.
    Truncated { dropped: usize },
}

/// Pad with empty questions or truncate so exactly `slots` remain.
pub fn fit_slots(questions: &[Question], slots: usize) -> (Vec<Question>, SlotFit) {
    let fit = match questions.len() {
        n if n < slots => SlotFit::Padded { missing: slots - n },
        n if n > slots => SlotFit::Truncated { dropped: n - slots },
        _ => SlotFit::Exact,
    };
    let mut fitted: Vec<Question> = questions.iter().take(slots).cloned().collect();
    fitted.resize_with(slots, Question::default);
    (fitted, fit)
}

#[derive(Serialize)]
struct HtmlView<'a> {
    topic: &'a str,
    objective: &'a str,
    questions: Vec<HtmlQuestion<'a>>,
}

#[derive(Serialize)]
struct HtmlQuestion<'a> {
    number: usize,
    tier_label: &'a str,
    tier_class: &'static str,
    statement: &'a str,
    a: &'a str,
    b: &'a str,
    c: &'a str,
    d: &'a str,
    e: &'a str,
}

#[derive(Serialize)]
struct LatexView<'a> {
    topic: &'a str,
    objective: &'a str,
    slots: Vec<LatexSlot<'a>>,
}

#[derive(Serialize)]
struct LatexSlot<'a> {
    number: usize,
    statement: &'a str,
    a: &'a str,
    b: &'a str,
    c: &'a str,
    d: &'a str,
    e: &'a str,
}

/// Both worksheet templates, compiled once at startup.
pub struct Renderer {
    html: Handlebars<'static>,
    latex: Handlebars<'static>,
}

impl Renderer {
    /// Compile the embedded templates, preferring files from `template_dir` when present.
    pub fn load(template_dir: Option<&Path>) -> Result<Self, TemplateLoadError> {
        let html_src = template_source(template_dir, HTML_TEMPLATE_FILE, EMBEDDED_HTML)?;
        let latex_src = template_source(template_dir, LATEX_TEMPLATE_FILE, EMBEDDED_LATEX)?;
        Self::from_sources(&html_src, &latex_src)
    }

    pub fn from_sources(html_src: &str, latex_src: &str) -> Result<Self, TemplateLoadError> {
        let mut html = Handlebars::new();
        html.set_strict_mode(true);
        html.register_template_string(TEMPLATE, html_src)?;

        let mut latex = Handlebars::new();
        latex.set_strict_mode(true);
        latex.register_escape_fn(handlebars::no_escape);
        latex.register_template_string(TEMPLATE, latex_src)?;

        Ok(Self { html, latex })
    }

    /// HTML worksheet with one block per question (0..N).
    pub fn render_html(&self, set: &ProblemSet) -> Result<String, handlebars::RenderError> {
        let questions = set
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let tier_label = q.tier.as_deref().unwrap_or_default();
                HtmlQuestion {
                    number: i + 1,
                    tier_label,
                    tier_class: Tier::from_label(tier_label).css_class(),
                    statement: &q.statement,
                    a: &q.a,
                    b: &q.b,
                    c: &q.c,
                    d: &q.d,
                    e: &q.e,
                }
            })
            .collect();
        let view = HtmlView {
            topic: &set.topic,
            objective: &set.objective,
            questions,
        };
        self.html.render(TEMPLATE, &view)
    }

    /// LaTeX worksheet with exactly `LATEX_SLOTS` questions. A mismatch is logged and returned.
    pub fn render_latex(&self, set: &ProblemSet) -> Result<(String, SlotFit), handlebars::RenderError> {
        let (fitted, fit) = fit_slots(&set.questions, LATEX_SLOTS);
        match fit {
            SlotFit::Exact => {}
            SlotFit::Padded { missing } => {
                warn!(target: "worksheet", returned = set.questions.len(), missing, "Model returned too few questions; padding empty slots")
            }
            SlotFit::Truncated { dropped } => {
                warn!(target: "worksheet", returned = set.questions.len(), dropped, "Model returned too many questions; truncating")
            }
        }
        let slots = fitted
            .iter()
            .enumerate()
            .map(|(i, q)| LatexSlot {
                number: i + 1,
                statement: &q.statement,
                a: &q.a,
                b: &q.b,
                c: &q.c,
                d: &q.d,
                e: &q.e,
            })
            .collect();
        let view = LatexView {
            topic: &set.topic,
            objective: &set.objective,
            slots,
        };
        Ok((self.latex.render(TEMPLATE, &view)?, fit))
    }
}

fn template_source(dir: Option<&Path>, file: &str, embedded: &str) -> Result<String, TemplateLoadError> {
    let Some(path) = dir.map(|d| d.join(file)).filter(|p| p.is_file()) else {
        return Ok(embedded.to_string());
    };
    let src = std::fs::read_to_string(&path).map_err(|source| TemplateLoadError::Io {
        path: path.clone(),
        source,
    })?;
    info!(target: "worksheet_backend", path = %path.display(), "Using template override");
    Ok(src)
}
