//! Game template discovery.
//!
//! Templates are repositories of the platform organisation tagged with the
//! template topic. Their per-template data (`_assets.json`, `_styles.json`,
//! `_prompt.md`) is read through the contents API. Everything is cached for
//! the configured TTL; failed fetches are never cached.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::github::{CommandError, GitHub};
use crate::sprites::VALID_CATEGORIES;

const NAME_PREFIX: &str = "game-template-";

pub const ASSETS_FILE: &str = "_assets.json";
pub const STYLES_FILE: &str = "_styles.json";
pub const PROMPT_FILE: &str = "_prompt.md";

/// One discovered template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateInfo {
    pub key: String,
    /// `owner/name` of the template repository
    pub repo: String,
    pub name: String,
    pub description: String,
    pub styles: Vec<String>,
    #[serde(rename = "defaultStyle")]
    pub default_style: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CategoryGuide {
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub sprites: Vec<String>,
}

/// `_assets.json`: art direction and required sprites of a template.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssetGuide {
    #[serde(default)]
    pub style: String,
    #[serde(default, rename = "gridSize")]
    pub grid_size: Value,
    #[serde(default)]
    pub palette: BTreeMap<String, String>,
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryGuide>,
}

/// `_styles.json`: named style presets and the default one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StyleSet {
    #[serde(default)]
    pub styles: Map<String, Value>,
    #[serde(default)]
    pub default: Option<String>,
}

/// Template key from repo topics, falling back to the repo name.
fn template_key(name: &str, topics: &[String], template_topic: &str) -> String {
    topics
        .iter()
        .find(|t| t.as_str() != template_topic)
        .cloned()
        .unwrap_or_else(|| name.trim_start_matches(NAME_PREFIX).to_string())
}

/// Pick template repos out of a `/orgs/{org}/repos` listing.
pub fn parse_template_repos(repos: &Value, template_topic: &str) -> Vec<TemplateInfo> {
    let Some(repos) = repos.as_array() else {
        return Vec::new();
    };
    repos
        .iter()
        .filter_map(|repo| {
            let topics: Vec<String> = repo
                .get("topics")
                .and_then(Value::as_array)
                .map(|t| t.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            if !topics.iter().any(|t| t == template_topic) {
                return None;
            }
            let name = repo.get("name").and_then(Value::as_str)?;
            let full_name = repo.get("full_name").and_then(Value::as_str)?;
            let description = repo
                .get("description")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            Some(TemplateInfo {
                key: template_key(name, &topics, template_topic),
                repo: full_name.to_string(),
                name: description.clone().unwrap_or_else(|| name.to_string()),
                description: description.unwrap_or_default(),
                styles: Vec::new(),
                default_style: None,
            })
        })
        .collect()
}

/// Decode the base64 `content` field of a contents API response.
pub fn decode_contents(body: &Value) -> Result<String, String> {
    let encoded = body
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| "response has no content field".to_string())?;
    // the API wraps the payload at 60 columns
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| format!("invalid base64: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))
}

/// TTL-cached view of the organisation's templates.
#[derive(Debug)]
pub struct TemplateCatalog {
    org: String,
    template_topic: String,
    templates: TtlCache<(), Arc<Vec<TemplateInfo>>>,
    assets: TtlCache<String, Arc<AssetGuide>>,
    styles: TtlCache<String, Arc<StyleSet>>,
    prompts: TtlCache<String, Arc<String>>,
}

impl TemplateCatalog {
    pub fn new(org: &str, template_topic: &str, ttl: Duration) -> Self {
        Self::with_clock(org, template_topic, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(org: &str, template_topic: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            org: org.to_string(),
            template_topic: template_topic.to_string(),
            templates: TtlCache::with_clock(ttl, clock.clone()),
            assets: TtlCache::with_clock(ttl, clock.clone()),
            styles: TtlCache::with_clock(ttl, clock.clone()),
            prompts: TtlCache::with_clock(ttl, clock),
        }
    }

    /// All templates, with their style presets.
    pub fn list(&self, gh: &GitHub<'_>) -> Result<Arc<Vec<TemplateInfo>>, CommandError> {
        self.templates.get_or_try_insert_with(&(), || {
            let repos = gh.api_json(&format!("/orgs/{}/repos?per_page=100", self.org))?;
            let mut templates = parse_template_repos(&repos, &self.template_topic);
            for template in &mut templates {
                if let Some(styles) = self.styles_for(gh, &template.key, &template.repo) {
                    template.styles = styles.styles.keys().cloned().collect();
                    template.default_style = styles.default.clone();
                }
            }
            tracing::info!(count = templates.len(), "discovered templates");
            Ok(Arc::new(templates))
        })
    }

    pub fn get(&self, gh: &GitHub<'_>, key: &str) -> Result<Option<TemplateInfo>, CommandError> {
        Ok(self.list(gh)?.iter().find(|t| t.key == key).cloned())
    }

    /// Fetch and parse one file of a template repo. Failures are logged and yield `None`.
    fn fetch_file<T>(
        &self,
        gh: &GitHub<'_>,
        key: &str,
        repo: &str,
        file: &str,
        parse: impl FnOnce(String) -> Result<T, String>,
    ) -> Option<T> {
        let fetched = gh
            .api_json(&format!("/repos/{}/contents/{}", repo, file))
            .map_err(|e| e.to_string())
            .and_then(|body| decode_contents(&body))
            .and_then(parse);
        match fetched {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(template = key, file, error = %e, "failed to fetch template file");
                None
            }
        }
    }

    fn styles_for(&self, gh: &GitHub<'_>, key: &str, repo: &str) -> Option<Arc<StyleSet>> {
        let key = key.to_string();
        self.styles
            .get_or_try_insert_with(&key, || {
                self.fetch_file(gh, &key, repo, STYLES_FILE, |text| {
                    serde_json::from_str(&text).map(Arc::new).map_err(|e| e.to_string())
                })
                .ok_or(())
            })
            .ok()
    }

    /// `_assets.json` of a template, `None` when the template or file is unavailable.
    pub fn assets(&self, gh: &GitHub<'_>, key: &str) -> Result<Option<Arc<AssetGuide>>, CommandError> {
        let owned = key.to_string();
        if let Some(guide) = self.assets.get(&owned) {
            return Ok(Some(guide));
        }
        let Some(template) = self.get(gh, key)? else {
            return Ok(None);
        };
        let guide = self.fetch_file(gh, key, &template.repo, ASSETS_FILE, |text| {
            serde_json::from_str::<AssetGuide>(&text).map(Arc::new).map_err(|e| e.to_string())
        });
        if let Some(guide) = &guide {
            self.assets.insert(owned, guide.clone());
        }
        Ok(guide)
    }

    /// `_prompt.md` of a template.
    pub fn prompt(&self, gh: &GitHub<'_>, key: &str) -> Result<Option<Arc<String>>, CommandError> {
        let owned = key.to_string();
        if let Some(prompt) = self.prompts.get(&owned) {
            return Ok(Some(prompt));
        }
        let Some(template) = self.get(gh, key)? else {
            return Ok(None);
        };
        let prompt = self.fetch_file(gh, key, &template.repo, PROMPT_FILE, |text| Ok(Arc::new(text)));
        if let Some(prompt) = &prompt {
            self.prompts.insert(owned, prompt.clone());
        }
        Ok(prompt)
    }

    /// Sprite categories of a template, or the generic set when it has no asset guide.
    pub fn categories(&self, gh: &GitHub<'_>, key: &str) -> Vec<String> {
        match self.assets(gh, key) {
            Ok(Some(guide)) if !guide.categories.is_empty() => {
                guide.categories.keys().cloned().collect()
            }
            _ => VALID_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn clear(&self) {
        self.templates.clear();
        self.assets.clear();
        self.styles.clear();
        self.prompts.clear();
    }
}

/// Markdown asset guide for a template.
pub fn render_asset_guide(template_name: &str, guide: &AssetGuide) -> String {
    let grid_size = match &guide.grid_size {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    };

    let mut out = format!("# Asset Guide: {}\n\n", template_name);
    out.push_str(&format!("## Style\n{}\n\n", guide.style));
    out.push_str(&format!("## Sprite Size\n{}\n\n", grid_size));
    out.push_str("## Color Palette\n");
    for (name, color) in &guide.palette {
        out.push_str(&format!("- `{}`: {}\n", color, name));
    }
    out.push_str("\n## Required Sprites\n\n");
    for (category, info) in &guide.categories {
        out.push_str(&format!("### {}\n{}\n", category, info.desc));
        out.push_str(&format!("Sprites: {}\n\n", info.sprites.join(", ")));
    }
    out.push_str(SPRITE_FORMAT_SECTION);
    out
}

const SPRITE_FORMAT_SECTION: &str = r##"## Sprite Format
```json
{
  "w": 8, "h": 8,
  "palette": { "1": "#a86", "2": "#d9a" },
  "frames": [[
    "..1..1..",
    ".11..11.",
    ".122221.",
    "11222211",
    "11222211",
    ".112211.",
    ".1....1.",
    ".1....1."
  ]],
  "origin": [0, 0]
}
```

## Renderer Integration
```js
var sprite = typeof getSprite === 'function' && getSprite('enemies', enemy.type)
if (sprite) {
  drawSprite(ctx, sprite, sx, sy, T)
} else {
  ctx.fillText(enemy.char, sx + T/2, sy + T/2)
}
```

Use the `create_sprite` tool to create sprites. Call it again with `frame` to add animation frames.
"##;
