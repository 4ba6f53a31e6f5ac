//! Domain models: the problem set returned by the model and its questions.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn default_topic() -> String { "Matematik".into() }
fn default_objective() -> String { "Genel".into() }

/// Scalar as display text: strings as-is, numbers and bools formatted, null empty.
/// Models often answer math choices with bare numbers (`"A": 3`).
fn value_text(value: Value) -> Option<String> {
  match value {
    Value::Null => None,
    Value::String(s) => Some(s),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    other => Some(other.to_string()),
  }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(value_text(Value::deserialize(d)?).unwrap_or_default())
}

fn lenient_tier<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
  Ok(value_text(Value::deserialize(d)?))
}

fn topic_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(value_text(Value::deserialize(d)?).unwrap_or_else(default_topic))
}

fn objective_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(value_text(Value::deserialize(d)?).unwrap_or_else(default_objective))
}

fn questions_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Question>, D::Error> {
  Ok(Option::<Vec<Question>>::deserialize(d)?.unwrap_or_default())
}

/// Structured result of one inference call.
///
/// Wire keys follow the instruction prompts (`konu`, `kazanim`, `sorular`);
/// English aliases are accepted for prompts overridden in TOML.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProblemSet {
  #[serde(rename = "konu", alias = "topic", default = "default_topic", deserialize_with = "topic_or_default")]
  pub topic: String,
  #[serde(rename = "kazanim", alias = "objective", default = "default_objective", deserialize_with = "objective_or_default")]
  pub objective: String,
  #[serde(rename = "sorular", alias = "questions", default, deserialize_with = "questions_or_empty")]
  pub questions: Vec<Question>,
}

impl Default for ProblemSet {
  fn default() -> Self {
    Self { topic: default_topic(), objective: default_objective(), questions: Vec::new() }
  }
}

/// One generated multiple-choice question. Every field may be missing, null or
/// a bare number in the model output; missing text renders as an empty string.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Question {
  #[serde(rename = "seviye", alias = "tier", default, deserialize_with = "lenient_tier", skip_serializing_if = "Option::is_none")]
  pub tier: Option<String>,
  #[serde(rename = "metin", alias = "statement", default, deserialize_with = "lenient_text")]
  pub statement: String,
  #[serde(rename = "A", default, deserialize_with = "lenient_text")] pub a: String,
  #[serde(rename = "B", default, deserialize_with = "lenient_text")] pub b: String,
  #[serde(rename = "C", default, deserialize_with = "lenient_text")] pub c: String,
  #[serde(rename = "D", default, deserialize_with = "lenient_text")] pub d: String,
  #[serde(rename = "E", default, deserialize_with = "lenient_text")] pub e: String,
}

/// Shape of the JSON the model is asked to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseShape {
  /// Each question carries a difficulty label (HTML worksheet).
  Tiered,
  /// Fixed list of untiered questions (PDF worksheet).
  Flat,
}

impl ResponseShape {
  /// Drop whatever the shape does not ask for.
  pub fn conform(self, mut set: ProblemSet) -> ProblemSet {
    if self == ResponseShape::Flat {
      for q in &mut set.questions {
        q.tier = None;
      }
    }
    set
  }
}

/// Ranked difficulty tiers used for badge colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
  Basic,
  Intermediate,
  NewGeneration,
}

impl Tier {
  /// Classify a free-form label by substring ("Yeni Nesil" wins over "Orta").
  pub fn from_label(label: &str) -> Self {
    if label.contains("Yeni") {
      Tier::NewGeneration
    } else if label.contains("Orta") {
      Tier::Intermediate
    } else {
      Tier::Basic
    }
  }

  /// CSS class of the badge in the HTML worksheet.
  pub fn css_class(self) -> &'static str {
    match self {
      Tier::Basic => "temel",
      Tier::Intermediate => "orta",
      Tier::NewGeneration => "yeni",
    }
  }
}
