//! Units of work - one LLM-backed step of the writing workflow per task kind.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scriptflow_core::{Episode, TaskKind, TaskParams};
use scriptflow_execution::{DispatchTable, UnitOfWork};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::LlmClient;
use crate::prompts::{self, ScriptFormat};

/// Episode count used when a breakdown has to be invented.
const FALLBACK_EPISODES: u32 = 5;

/// Build a dispatch table with a [`ScriptWriter`] for every task kind.
pub fn dispatch_table(llm: Arc<dyn LlmClient>) -> DispatchTable {
    let mut table = DispatchTable::new();
    for kind in TaskKind::ALL {
        table.register(kind, Arc::new(ScriptWriter::new(kind, Arc::clone(&llm))));
    }
    table
}

/// Unit of work that turns typed params into a prompt and shapes the reply.
pub struct ScriptWriter {
    kind: TaskKind,
    llm: Arc<dyn LlmClient>,
}

impl ScriptWriter {
    /// Create a writer for one kind.
    pub fn new(kind: TaskKind, llm: Arc<dyn LlmClient>) -> Self {
        Self { kind, llm }
    }

    fn params<T: DeserializeOwned>(&self, params: &TaskParams) -> Result<T> {
        serde_json::from_value(Value::Object(params.clone()))
            .with_context(|| format!("invalid parameters for {}", self.kind))
    }

    async fn ask(&self, prompt: String) -> Result<String> {
        debug!(kind = %self.kind, "Requesting completion");
        self.llm.complete(&prompt).await
    }
}

#[async_trait]
impl UnitOfWork for ScriptWriter {
    async fn perform(&self, params: &TaskParams) -> Result<Value> {
        match self.kind {
            TaskKind::GenerateLoglines => {
                let p: LoglinesParams = self.params(params)?;
                let reply = self
                    .ask(prompts::loglines(&p.keywords, &p.script_type, p.episode_count))
                    .await?;
                let loglines: Vec<&str> = reply
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect();
                Ok(json!({ "loglines": loglines }))
            }
            TaskKind::GenerateOutline => {
                let p: OutlineParams = self.params(params)?;
                let outline = self.ask(prompts::outline(&p.logline, &p.script_type)).await?;
                Ok(json!({ "outline": outline }))
            }
            TaskKind::GenerateEpisodes => {
                let p: EpisodesParams = self.params(params)?;
                let reply = self
                    .ask(prompts::episodes(&p.outline, &p.script_type, p.episode_count))
                    .await?;
                let episodes = parse_episodes(&reply).unwrap_or_else(|| {
                    warn!("Episode breakdown was not valid JSON, using placeholders");
                    placeholder_episodes(&p.script_type, p.episode_count)
                });
                Ok(json!({ "episodes": episodes }))
            }
            TaskKind::GenerateScript => {
                let p: ScriptParams = self.params(params)?;
                let episodes: Vec<Episode> = p.episodes.into_iter().map(Episode::from).collect();
                let script = self
                    .ask(prompts::script(&p.outline, &episodes, &p.script_type, p.word_count))
                    .await?;
                Ok(json!({ "script": script }))
            }
            TaskKind::AnalyzeText => {
                let p: AnalyzeParams = self.params(params)?;
                let reply = self.ask(prompts::analysis(&p.text, &p.script_type)).await?;
                let analysis = parse_json_object(&reply).unwrap_or_else(|| {
                    warn!("Text analysis was not a JSON object, using placeholder");
                    placeholder_analysis(&p.script_type)
                });
                Ok(json!({ "analysis": analysis }))
            }
            TaskKind::GenerateAdaptedOutline => {
                let p: AdaptedOutlineParams = self.params(params)?;
                let outline = self
                    .ask(prompts::adapted_outline(&p.analysis, &p.rules, &p.script_type))
                    .await?;
                Ok(json!({ "outline": outline }))
            }
            TaskKind::RewriteSection => {
                let p: EditParams = self.params(params)?;
                let rewritten = self
                    .ask(prompts::rewrite(&p.content, &p.instruction, &p.script_type))
                    .await?;
                Ok(json!({ "rewrittenContent": rewritten }))
            }
            TaskKind::ContinueScript => {
                let p: EditParams = self.params(params)?;
                let continued = self
                    .ask(prompts::continuation(&p.content, &p.instruction, &p.script_type))
                    .await?;
                Ok(json!({ "continuedContent": continued }))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoglinesParams {
    #[serde(deserialize_with = "text_or_list")]
    keywords: String,
    script_type: String,
    #[serde(deserialize_with = "count")]
    episode_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlineParams {
    logline: String,
    script_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodesParams {
    outline: String,
    script_type: String,
    #[serde(deserialize_with = "count")]
    episode_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptParams {
    outline: String,
    episodes: Vec<WireEpisode>,
    script_type: String,
    #[serde(deserialize_with = "count")]
    word_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeParams {
    text: String,
    script_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdaptedOutlineParams {
    analysis: Value,
    rules: String,
    script_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditParams {
    content: String,
    instruction: String,
    script_type: String,
}

/// Episode as produced by the model or echoed back by the front end; the
/// number may arrive as a JSON number.
#[derive(Deserialize)]
struct WireEpisode {
    #[serde(deserialize_with = "text_or_number")]
    id: String,
    summary: String,
    #[serde(default)]
    cliffhanger: String,
}

impl From<WireEpisode> for Episode {
    fn from(e: WireEpisode) -> Self {
        Episode {
            id: e.id,
            summary: e.summary,
            cliffhanger: e.cliffhanger,
        }
    }
}

fn text_or_list<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrList {
        Text(String),
        List(Vec<String>),
    }
    Ok(match TextOrList::deserialize(de)? {
        TextOrList::Text(text) => text,
        TextOrList::List(items) => items.join(", "),
    })
}

fn text_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match TextOrNumber::deserialize(de)? {
        TextOrNumber::Text(text) => text,
        TextOrNumber::Number(n) => n.to_string(),
    })
}

/// Counts arrive as numbers or as numeric strings from form inputs.
fn count<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    let text = text_or_number(de)?;
    text.trim().parse().map_err(serde::de::Error::custom)
}

/// Drop a surrounding Markdown code fence, if any.
fn strip_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.split_once('\n').map_or("", |(_, rest)| rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn parse_episodes(reply: &str) -> Option<Vec<Episode>> {
    let episodes: Vec<WireEpisode> = serde_json::from_str(strip_fence(reply)).ok()?;
    Some(episodes.into_iter().map(Episode::from).collect())
}

fn parse_json_object(reply: &str) -> Option<Value> {
    serde_json::from_str::<Value>(strip_fence(reply))
        .ok()
        .filter(Value::is_object)
}

fn placeholder_episodes(script_type: &str, episode_count: u32) -> Vec<Episode> {
    let count = if episode_count == 0 {
        FALLBACK_EPISODES
    } else {
        episode_count
    };
    (1..=count)
        .map(|n| Episode {
            id: n.to_string(),
            summary: format!(
                "{script_type} episode {n}: the protagonist faces a new challenge and the story moves forward."
            ),
            cliffhanger: "The episode ends on an unexpected turn, leaving the question open...".to_string(),
        })
        .collect()
}

fn placeholder_analysis(script_type: &str) -> Value {
    let mut analysis = json!({
        "title": "Source analysis",
        "mainCharacters": ["Protagonist", "Supporting character A", "Supporting character B"],
        "mainPlotLines": [
            "Main plot: the protagonist's growth",
            "Subplot: the protagonist's relationship with A",
        ],
        "keyScenes": [
            "Scene 1: opening",
            "Scene 2: the conflict breaks out",
            "Scene 3: climax",
            "Scene 4: resolution",
        ],
        "themes": ["family", "friendship", "growing up", "identity"],
        "style": "Realist, emotionally nuanced, with deep characterisation",
    });

    let tailored = match ScriptFormat::classify(script_type) {
        ScriptFormat::Film => Some((
            "Tight cinematic storytelling with strong visuals and well-judged emotion",
            [
                "Tighten the plot around the core conflict",
                "Add visual scene description",
                "Sharpen character motivation",
            ],
        )),
        ScriptFormat::Television => Some((
            "Long-form series pacing that develops relationships and plants plot threads",
            [
                "Expand the supporting storylines",
                "Add twists and suspense",
                "End every episode on a hook",
            ],
        )),
        ScriptFormat::WebSeries => Some((
            "Fast, youthful storytelling for online audiences",
            [
                "Speed up the pacing",
                "Add pop-culture touches",
                "Design shareable standout scenes",
            ],
        )),
        ScriptFormat::ShortDrama | ScriptFormat::Other => None,
    };

    if let (Some((style, suggestions)), Some(fields)) = (tailored, analysis.as_object_mut()) {
        fields.insert("style".into(), json!(style));
        fields.insert("adaptationSuggestions".into(), json!(suggestions));
    }
    analysis
}
