//! Game lifecycle tools: templates, scaffolding, SDK, validation and deletion.

use std::fs;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{check_slug, ToolContext, ToolError, ToolOutput, ToolResult};
use crate::game::{
    self, check_game_files, local_sdk_version, mcp_config_json, read_sdk, GameConfig, SdkInfo,
};
use crate::sprites::{save_sheet, SpriteSheet};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InitGameInput {
    #[schemars(description = "Unique game name (lowercase, hyphens), e.g. \"dark-dungeon\"")]
    pub slug: String,

    #[schemars(description = "Template key (GitHub topic, e.g. strategy-rpg, roguelike)")]
    pub template: String,

    #[schemars(description = "Display name of the game")]
    pub title: String,

    #[serde(default)]
    #[schemars(description = "Short game description")]
    pub description: Option<String>,

    #[serde(default)]
    #[schemars(
        description = "Style preset key (e.g. dark-neon, retro-green). Uses the template default if not specified"
    )]
    pub style: Option<String>,
}

/// Input of the template-scoped tools.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct TemplateInput {
    #[serde(default)]
    #[schemars(
        description = "Template key (GitHub topic, e.g. strategy-rpg, roguelike). Defaults to the current game's template"
    )]
    pub template: Option<String>,
}

/// Input of the tools that only need a game directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct PathInput {
    #[schemars(description = "Path to the game directory")]
    pub path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteGameInput {
    #[schemars(description = "Game slug (repo name) to delete")]
    pub slug: String,

    #[serde(default)]
    #[schemars(description = "Must be true; deletion cannot be undone")]
    pub confirm: bool,
}

fn canonical_sdk(ctx: &ToolContext) -> Result<SdkInfo, ToolError> {
    let path = &ctx.config.paths.sdk_path;
    read_sdk(path).map_err(|e| {
        ToolError::invalid(format!("Cannot read canonical SDK {}: {}", path.display(), e))
    })
}

/// Template from the input, or from the game the server runs in.
pub(crate) fn template_or_context(ctx: &ToolContext, template: Option<String>) -> Option<String> {
    template.filter(|t| !t.is_empty()).or_else(|| ctx.game_context().map(|g| g.template))
}

pub fn list_templates(ctx: &ToolContext) -> ToolResult {
    let templates = ctx.catalog.list(&ctx.github())?;
    Ok(ToolOutput::json(json!(*templates)))
}

pub fn init_game(ctx: &ToolContext, input: InitGameInput) -> ToolResult {
    check_slug(&input.slug)?;
    let gh = ctx.github();
    let platform = &ctx.config.platform;

    let Some(template) = ctx.catalog.get(&gh, &input.template)? else {
        let available: Vec<String> =
            ctx.catalog.list(&gh)?.iter().map(|t| t.key.clone()).collect();
        return Err(ToolError::invalid(format!(
            "Unknown template: {}. Available: {}",
            input.template,
            available.join(", ")
        )));
    };

    let style = match input.style.filter(|s| !s.is_empty()) {
        Some(style) if !template.styles.is_empty() && !template.styles.contains(&style) => {
            return Err(ToolError::invalid(format!(
                "Unknown style: {}. Available for {}: {}",
                style,
                template.key,
                template.styles.join(", ")
            )));
        }
        Some(style) => Some(style),
        None => template.default_style.clone(),
    };

    let sdk = canonical_sdk(ctx)?;
    let game_dir = ctx.games.game_dir(&input.slug);
    if game_dir.exists() {
        return Err(ToolError::invalid(format!(
            "Directory already exists: {}",
            game_dir.display()
        )));
    }

    fs::create_dir_all(ctx.games_root())?;
    gh.create_from_template(&input.slug, &template.repo, ctx.games_root())?;
    if let Some(description) = input.description.as_deref().filter(|d| !d.is_empty()) {
        gh.set_description(&input.slug, description)?;
    }
    gh.add_topics(&input.slug, &[platform.game_topic.as_str(), template.key.as_str()])?;

    fs::create_dir_all(&game_dir)?;
    fs::write(game_dir.join(game::SDK_FILE), &sdk.content)?;
    let config = GameConfig {
        template: template.key.clone(),
        slug: input.slug.clone(),
        title: input.title.clone(),
        style,
        sdk_version: sdk.version,
        ..Default::default()
    };
    game::save_game_config(&game_dir, &config)?;

    let mcp = mcp_config_json(&ctx.config.paths.server_command, &["serve".to_string()]);
    let mcp = serde_json::to_string_pretty(&mcp).unwrap_or_else(|_| mcp.to_string());
    fs::write(game_dir.join(game::MCP_CONFIG), mcp + "\n")?;
    save_sheet(&game_dir, &SpriteSheet::default())?;

    tracing::info!(slug = %input.slug, template = %template.key, "created game");
    Ok(ToolOutput::json(json!({
        "ok": true,
        "message": format!("Game \"{}\" created from template {}", input.title, template.name),
        "repo": gh.repo(&input.slug),
        "local_path": game_dir.display().to_string(),
        "next_steps": [
            format!("cd {}", input.slug),
            "Edit game.js to implement your game",
            "Use get_game_prompt tool to get design guidance",
            "Use get_asset_guide tool to see what sprites to create",
            "Use create_sprite tool to build pixel art assets",
            "Use validate_game before publishing",
            "Use publish_game when ready",
        ],
    })))
}

pub fn get_sdk_docs() -> ToolOutput {
    ToolOutput::text(SDK_DOCS)
}

pub fn get_game_prompt(ctx: &ToolContext, input: TemplateInput) -> ToolResult {
    let template = template_or_context(ctx, input.template).unwrap_or_default();
    match ctx.catalog.prompt(&ctx.github(), &template)? {
        Some(prompt) => Ok(ToolOutput::text(prompt.as_str())),
        None => Err(ToolError::invalid(format!("No prompt found for template: {}", template))),
    }
}

pub fn validate_game(ctx: &ToolContext, input: PathInput) -> ToolResult {
    let game_dir = ctx.game_path(&input.path)?;
    let latest = canonical_sdk(ctx).ok().map(|sdk| sdk.version);
    let report = check_game_files(&game_dir, latest);
    Ok(ToolOutput::json(json!({
        "valid": report.valid,
        "issues": report.issues,
        "warnings": report.warnings,
        "path": game_dir.display().to_string(),
    })))
}

pub fn update_sdk(ctx: &ToolContext, input: PathInput) -> ToolResult {
    let game_dir = ctx.game_path(&input.path)?;
    if !game_dir.is_dir() {
        return Err(ToolError::invalid(format!(
            "Game directory not found: {}",
            game_dir.display()
        )));
    }
    let sdk = canonical_sdk(ctx)?;
    let old = local_sdk_version(&game_dir);
    if old >= sdk.version {
        return Ok(ToolOutput::json(json!({
            "ok": true,
            "message": format!("SDK already at latest version (v{})", sdk.version),
        })));
    }

    fs::write(game_dir.join(game::SDK_FILE), &sdk.content)?;
    match game::load_game_config(&game_dir) {
        Ok(mut config) => {
            config.sdk_version = sdk.version;
            game::save_game_config(&game_dir, &config)?;
        }
        Err(game::GameError::Missing(_)) => {}
        Err(e) => tracing::warn!(error = %e, "SDK updated but game config left unchanged"),
    }

    Ok(ToolOutput::json(json!({
        "ok": true,
        "message": format!("SDK updated from v{} to v{}", old, sdk.version),
        "version": sdk.version,
    })))
}

pub fn delete_game(ctx: &ToolContext, input: DeleteGameInput) -> ToolResult {
    check_slug(&input.slug)?;
    if !input.confirm {
        return Err(ToolError::invalid(format!(
            "Refusing to delete {} without confirm: true",
            input.slug
        )));
    }
    let gh = ctx.github();
    let mut results = Vec::new();

    gh.delete_repo(&input.slug)?;
    results.push(format!("Deleted GitHub repo {}", gh.repo(&input.slug)));

    let game_dir = ctx.games.game_dir(&input.slug);
    if game_dir.is_dir() {
        if let Err(e) = fs::remove_dir_all(&game_dir) {
            return Err(ToolError::Partial {
                message: format!("Cannot remove {}: {}", game_dir.display(), e),
                results,
            });
        }
        results.push(format!("Deleted local directory {}", game_dir.display()));
    } else {
        results.push("No local directory".to_string());
    }
    ctx.sprites.invalidate(&game_dir);

    tracing::info!(slug = %input.slug, "deleted game");
    Ok(ToolOutput::json(json!({ "ok": true, "results": results })))
}

const SDK_DOCS: &str = r#"# ForkArcade SDK Documentation

## How it works
The SDK talks to the ForkArcade platform through postMessage.
Games run in an iframe on the platform; the SDK sends messages to the parent
window, which handles authentication and API calls.

## Include in your game
`init_game` copies `forkarcade-sdk.js` into the game directory.
Use the `update_sdk` tool to refresh it later.
```html
<script src="forkarcade-sdk.js"></script>
```

## API

### ForkArcade.onReady(callback)
Called once the SDK has connected to the platform.
```js
ForkArcade.onReady(function(ctx) {
  console.log('Game slug:', ctx.slug);
  startGame();
});
```

### ForkArcade.submitScore(score) → Promise
Submit a numeric score to the leaderboard after game over or a finished level.
```js
await ForkArcade.submitScore(1250);
```

### ForkArcade.getPlayer() → Promise
Current player info. Rejects when nobody is logged in.
```js
const player = await ForkArcade.getPlayer();
// { login: 'username', sub: 12345 }
```

### ForkArcade.updateNarrative(data)
Report narrative state to the platform. Fire-and-forget, returns nothing.
```js
ForkArcade.updateNarrative({
  variables: { karma: 3, has_key: true },
  currentNode: 'dark-cellar',
  graph: {
    nodes: [
      { id: 'intro', label: 'Start', type: 'scene' },
      { id: 'choice-1', label: 'Help NPC?', type: 'choice' },
    ],
    edges: [
      { from: 'intro', to: 'choice-1' },
    ]
  },
  event: 'Entered dark cellar'
});
```
Node types: `scene`, `choice`, `condition`.

## Assets
`sprites.js` defines `getSprite(category, name)` and `drawSprite(ctx, sprite, x, y, size, frame)`.
`maps.js` defines `getMap(name)`, `getMapGrid(name)`, `getMapObjects(name)` and `getMapZones(name)`.
"#;
