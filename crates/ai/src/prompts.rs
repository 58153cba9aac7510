//! Prompt templates for each step of the writing workflow.

use scriptflow_core::Episode;

/// Broad script format, derived from the free-form `scriptType` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    /// Vertical or horizontal short drama
    ShortDrama,
    /// Feature film
    Film,
    /// Television series
    Television,
    /// Web series
    WebSeries,
    /// Anything else
    Other,
}

impl ScriptFormat {
    /// Classify a `scriptType` label. Accepts English and Chinese labels.
    pub fn classify(script_type: &str) -> Self {
        let label = script_type.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| label.contains(n));

        if has(&["short", "短剧"]) {
            ScriptFormat::ShortDrama
        } else if has(&["film", "movie", "电影"]) {
            ScriptFormat::Film
        } else if has(&["web", "网络剧"]) {
            ScriptFormat::WebSeries
        } else if has(&["tv", "television", "电视剧"]) {
            ScriptFormat::Television
        } else {
            ScriptFormat::Other
        }
    }
}

const SHORT_DRAMA_CRAFT: &str = "\
Short drama rules:
1. Golden three seconds: every episode opens on a hook, either starting at a climax or putting the mystery up front.
2. Extreme characters with strong contrast: give characters hidden identities and visible growth arcs.
3. Dense payoffs: plan a medium payoff every 5-10 episodes and a major payoff every 20-30 episodes.";

const SHORT_DRAMA_FORMAT: &str = "\
Short drama format:
1. Scene heading: `episode-scene TIME INT/EXT LOCATION`, e.g. `31-1 NIGHT EXT MUSEUM PLAZA`.
2. Action lines start with a triangle `△` on their own paragraph and describe only what can be seen or heard. Mark effects as [VFX], cross-cutting as (CROSS-CUT), inner monologue as OS and voice-over as VO.
3. Characters: list who appears (`Characters: Ye Lai, Gu Yun`), then dialogue as `Gu Yun: (voice shaking) ...fine.` Keep parentheticals to the bare emotion or gesture.";

fn craft_notes(script_type: &str, with_format: bool) -> String {
    if ScriptFormat::classify(script_type) != ScriptFormat::ShortDrama {
        return String::new();
    }
    if with_format {
        format!("\n\n{SHORT_DRAMA_FORMAT}\n\n{SHORT_DRAMA_CRAFT}")
    } else {
        format!("\n\n{SHORT_DRAMA_CRAFT}")
    }
}

/// Five story ideas, one per line.
pub fn loglines(keywords: &str, script_type: &str, episode_count: u32) -> String {
    format!(
        "You are a professional script development consultant. Generate 5 story ideas in different directions \
from the keywords, script type and episode count below. Each idea must state its genre, core conflict and main \
characters, and suit the conventions of a {script_type}. Put each idea on its own line, starting with its number.\n\n\
Keywords: \"{keywords}\"\nScript type: {script_type}\nEpisodes: {episode_count}"
    )
}

/// Detailed outline for a chosen logline.
pub fn outline(logline: &str, script_type: &str) -> String {
    format!(
        "You are a professional screenwriter. Write a detailed story outline for the idea below. Divide it into \
titled chapters with full content, covering the complete arc: setup, development, climax and resolution. \
Make it suit a {script_type}.{notes}\n\nStory idea: \"{logline}\"",
        notes = craft_notes(script_type, false),
    )
}

/// Episode breakdown as a JSON array of `{id, summary, cliffhanger}`.
pub fn episodes(outline: &str, script_type: &str, episode_count: u32) -> String {
    format!(
        "You are a professional screenwriter. Break the outline below into {episode_count} episodes of a \
{script_type}. Every episode needs its number, a content summary and a cliffhanger ending.{notes}\n\n\
Reply with only a JSON array of objects with the fields \"id\", \"summary\" and \"cliffhanger\".\n\n\
Outline: \"{outline}\"",
        notes = craft_notes(script_type, true),
    )
}

/// Full script text.
pub fn script(outline: &str, episodes: &[Episode], script_type: &str, word_count: u32) -> String {
    let episodes = serde_json::to_string(episodes).unwrap_or_default();
    format!(
        "You are a professional screenwriter. Write the full script for the outline and episode breakdown \
below in proper script format. Keep it vivid and professional, matching the pacing of a {script_type}, at about \
{word_count} words per episode.{notes}\n\nOutline: {outline}\n\nEpisodes: {episodes}",
        notes = craft_notes(script_type, true),
    )
}

/// Analysis of a source text as a JSON object.
pub fn analysis(text: &str, script_type: &str) -> String {
    format!(
        "You are a literary analyst. Analyse the source text below and extract its main characters, core plot \
lines and key scenes, with an eye to adapting it as a {script_type}. Reply with only a JSON object with the \
fields \"title\", \"mainCharacters\", \"mainPlotLines\" and \"keyScenes\".\n\nSource text:\n{text}"
    )
}

/// Adapted outline from an analysis and the user's adaptation rules.
pub fn adapted_outline(analysis: &serde_json::Value, rules: &str, script_type: &str) -> String {
    format!(
        "You are a professional adaptation screenwriter. Write a detailed adapted outline from the analysis \
and adaptation rules below. Divide it into chapters with content summaries, follow the rules, and match the \
conventions and format of a {script_type}.\n\nAnalysis: {analysis}\nAdaptation rules: {rules}"
    )
}

/// Rewrite of a section under an instruction.
pub fn rewrite(content: &str, instruction: &str, script_type: &str) -> String {
    format!(
        "You are a professional script editor. Rewrite the {script_type} content below according to the \
instruction. Keep the overall style consistent.\n\nInstruction: {instruction}\nContent to rewrite: {content}"
    )
}

/// Continuation of existing content under an instruction.
pub fn continuation(content: &str, instruction: &str, script_type: &str) -> String {
    format!(
        "You are a professional screenwriter. Continue the {script_type} below according to the instruction. \
The continuation must follow on naturally from the existing content and keep its pacing.\n\n\
Instruction: {instruction}\nExisting content: {content}"
    )
}
