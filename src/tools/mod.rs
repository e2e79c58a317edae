//! The tool registry: names, descriptions, input schemas and dispatch.
//!
//! Handlers are transport independent. The MCP server and the `call` CLI
//! command both go through [`dispatch`], and every failure is rendered as a
//! `{"error": "..."}` payload by [`ToolError::to_json`].

pub mod assets;
pub mod context;
pub mod evolve;
pub mod publish;
pub mod thumbnail;
pub mod workflow;

use std::fmt;
use std::io;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

pub use context::ToolContext;

use crate::game::GameError;
use crate::github::CommandError;
use crate::maps::MapError;
use crate::paths::PathError;
use crate::sprites::SpriteError;
use crate::thumbnail::ThumbnailError;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: &'static str, message: String },
    /// Input rejected by a handler before any write
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Sprite(#[from] SpriteError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A multi-step operation stopped partway; `results` lists the steps that ran
    #[error("{message}")]
    Partial { message: String, results: Vec<String> },
}

impl ToolError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ToolError::Invalid(message.into())
    }

    pub fn to_json(&self) -> Value {
        match self {
            ToolError::Partial { message, results } => json!({ "error": message, "results": results }),
            other => json!({ "error": other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolBody {
    Json(Value),
    Text(String),
}

/// Successful tool result. Thumbnails also carry the encoded PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub body: ToolBody,
    pub image_png: Option<Vec<u8>>,
}

impl ToolOutput {
    pub fn json(value: Value) -> Self {
        Self { body: ToolBody::Json(value), image_png: None }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self { body: ToolBody::Text(text.into()), image_png: None }
    }

    pub fn with_image(mut self, png: Vec<u8>) -> Self {
        self.image_png = Some(png);
        self
    }

    /// Body as sent to the caller: pretty JSON or the raw text.
    pub fn render(&self) -> String {
        match &self.body {
            ToolBody::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ToolBody::Text(text) => text.clone(),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match &self.body {
            ToolBody::Json(value) => Some(value),
            ToolBody::Text(_) => None,
        }
    }
}

pub type ToolResult = Result<ToolOutput, ToolError>;

/// Input of tools that take no arguments.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct NoInput {}

/// Every tool the backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    ListTemplates,
    InitGame,
    GetSdkDocs,
    GetGamePrompt,
    GetAssetGuide,
    ValidateGame,
    PublishGame,
    UpdateSdk,
    CreateSprite,
    CreateMap,
    ValidateAssets,
    PreviewAssets,
    GetVersions,
    CreateThumbnail,
    ListEvolveIssues,
    ApplyDataPatch,
    DeleteGame,
}

impl ToolName {
    pub const ALL: [ToolName; 17] = [
        ToolName::ListTemplates,
        ToolName::InitGame,
        ToolName::GetSdkDocs,
        ToolName::GetGamePrompt,
        ToolName::GetAssetGuide,
        ToolName::ValidateGame,
        ToolName::PublishGame,
        ToolName::UpdateSdk,
        ToolName::CreateSprite,
        ToolName::CreateMap,
        ToolName::ValidateAssets,
        ToolName::PreviewAssets,
        ToolName::GetVersions,
        ToolName::CreateThumbnail,
        ToolName::ListEvolveIssues,
        ToolName::ApplyDataPatch,
        ToolName::DeleteGame,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolName::ListTemplates => "list_templates",
            ToolName::InitGame => "init_game",
            ToolName::GetSdkDocs => "get_sdk_docs",
            ToolName::GetGamePrompt => "get_game_prompt",
            ToolName::GetAssetGuide => "get_asset_guide",
            ToolName::ValidateGame => "validate_game",
            ToolName::PublishGame => "publish_game",
            ToolName::UpdateSdk => "update_sdk",
            ToolName::CreateSprite => "create_sprite",
            ToolName::CreateMap => "create_map",
            ToolName::ValidateAssets => "validate_assets",
            ToolName::PreviewAssets => "preview_assets",
            ToolName::GetVersions => "get_versions",
            ToolName::CreateThumbnail => "create_thumbnail",
            ToolName::ListEvolveIssues => "list_evolve_issues",
            ToolName::ApplyDataPatch => "apply_data_patch",
            ToolName::DeleteGame => "delete_game",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolName::ListTemplates => "List available ForkArcade game templates with descriptions and style presets",
            ToolName::InitGame => {
                "Create a new game: create a repo from a template in the ForkArcade org and clone it locally"
            }
            ToolName::GetSdkDocs => "ForkArcade SDK documentation: how a game talks to the platform",
            ToolName::GetGamePrompt => {
                "Engineering prompt for a game template: mechanics, code patterns and structure"
            }
            ToolName::GetAssetGuide => {
                "Asset guide for a game template: which sprites to create, color palette and style"
            }
            ToolName::ValidateGame => {
                "Check that a game is set up correctly: SDK included, index.html present, submitScore called"
            }
            ToolName::PublishGame => {
                "Publish a game: push to GitHub, enable GitHub Pages and record a version snapshot"
            }
            ToolName::UpdateSdk => "Update forkarcade-sdk.js in a game to the latest platform version",
            ToolName::CreateSprite => {
                "Create a pixel art sprite frame: validate, save to _sprites.json and regenerate sprites.js. \
                 Call again with frame to build animations."
            }
            ToolName::CreateMap => {
                "Create or replace a named tile map: validate the grid, save to _maps.json and regenerate maps.js"
            }
            ToolName::ValidateAssets => "Check that a game has all sprites its template requires",
            ToolName::PreviewAssets => "Generate _preview.html showing every sprite at several scales",
            ToolName::GetVersions => "Version history of a game from .forkarcade.json",
            ToolName::CreateThumbnail => thumbnail::DESCRIPTION,
            ToolName::ListEvolveIssues => {
                "List open issues labelled 'evolve'. Covers the current game in a game directory, \
                 otherwise every game under the games root."
            }
            ToolName::ApplyDataPatch => {
                "Apply the ```json:data-patch block of an evolve issue: write sprite or map data and \
                 regenerate the matching script"
            }
            ToolName::DeleteGame => {
                "Delete a game: remove its GitHub repository and local directory. Admin operation."
            }
        }
    }

    /// JSON schema of the tool's input, derived from its input type.
    pub fn input_schema(self) -> Value {
        let schema = match self {
            ToolName::ListTemplates | ToolName::GetSdkDocs => schemars::schema_for!(NoInput),
            ToolName::InitGame => schemars::schema_for!(workflow::InitGameInput),
            ToolName::GetGamePrompt => schemars::schema_for!(workflow::TemplateInput),
            ToolName::GetAssetGuide => schemars::schema_for!(workflow::TemplateInput),
            ToolName::ValidateGame | ToolName::UpdateSdk | ToolName::PreviewAssets | ToolName::GetVersions => {
                schemars::schema_for!(workflow::PathInput)
            }
            ToolName::PublishGame => schemars::schema_for!(publish::PublishGameInput),
            ToolName::CreateSprite => schemars::schema_for!(assets::CreateSpriteInput),
            ToolName::CreateMap => schemars::schema_for!(assets::CreateMapInput),
            ToolName::ValidateAssets => schemars::schema_for!(assets::ValidateAssetsInput),
            ToolName::CreateThumbnail => schemars::schema_for!(thumbnail::CreateThumbnailInput),
            ToolName::ListEvolveIssues => schemars::schema_for!(evolve::ListEvolveIssuesInput),
            ToolName::ApplyDataPatch => schemars::schema_for!(evolve::ApplyDataPatchInput),
            ToolName::DeleteGame => schemars::schema_for!(workflow::DeleteGameInput),
        };
        schema.to_value()
    }

    /// Tools that only make sense outside a game directory.
    pub fn platform_only(self) -> bool {
        matches!(self, ToolName::ListTemplates | ToolName::InitGame)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// Registry entry as listed to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Tools available from the context's working directory.
///
/// Inside a game directory the platform-level tools are hidden.
pub fn list_tools(ctx: &ToolContext) -> Vec<ToolInfo> {
    let in_game = ctx.game_context().is_some();
    ToolName::ALL
        .into_iter()
        .filter(|t| !(in_game && t.platform_only()))
        .map(|t| ToolInfo { name: t.as_str(), description: t.description(), input_schema: t.input_schema() })
        .collect()
}

fn parse_args<T: DeserializeOwned>(tool: ToolName, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|e| ToolError::InvalidArguments { tool: tool.as_str(), message: e.to_string() })
}

/// Run a tool by name with JSON arguments.
pub fn dispatch(ctx: &ToolContext, name: &str, args: Value) -> ToolResult {
    let tool: ToolName = name.parse()?;
    let _span = tracing::info_span!("tool", name = tool.as_str()).entered();
    tracing::info!("tool call");

    let args = if args.is_null() { json!({}) } else { args };
    match tool {
        ToolName::ListTemplates => workflow::list_templates(ctx),
        ToolName::InitGame => workflow::init_game(ctx, parse_args(tool, args)?),
        ToolName::GetSdkDocs => Ok(workflow::get_sdk_docs()),
        ToolName::GetGamePrompt => workflow::get_game_prompt(ctx, parse_args(tool, args)?),
        ToolName::GetAssetGuide => assets::get_asset_guide(ctx, parse_args(tool, args)?),
        ToolName::ValidateGame => workflow::validate_game(ctx, parse_args(tool, args)?),
        ToolName::PublishGame => publish::publish_game(ctx, parse_args(tool, args)?),
        ToolName::UpdateSdk => workflow::update_sdk(ctx, parse_args(tool, args)?),
        ToolName::CreateSprite => assets::create_sprite(ctx, parse_args(tool, args)?),
        ToolName::CreateMap => assets::create_map(ctx, parse_args(tool, args)?),
        ToolName::ValidateAssets => assets::validate_assets(ctx, parse_args(tool, args)?),
        ToolName::PreviewAssets => assets::preview_assets(ctx, parse_args(tool, args)?),
        ToolName::GetVersions => publish::get_versions(ctx, parse_args(tool, args)?),
        ToolName::CreateThumbnail => thumbnail::create_thumbnail(ctx, parse_args(tool, args)?),
        ToolName::ListEvolveIssues => evolve::list_evolve_issues(ctx, parse_args(tool, args)?),
        ToolName::ApplyDataPatch => evolve::apply_data_patch(ctx, parse_args(tool, args)?),
        ToolName::DeleteGame => workflow::delete_game(ctx, parse_args(tool, args)?),
    }
}

/// [`dispatch`], with failures rendered as error payloads.
pub fn call(ctx: &ToolContext, name: &str, args: Value) -> ToolOutput {
    dispatch(ctx, name, args).unwrap_or_else(|e| {
        tracing::warn!(tool = name, error = %e, "tool failed");
        ToolOutput::json(e.to_json())
    })
}

/// Validate a game slug: lowercase letters, digits and hyphens.
pub fn check_slug(slug: &str) -> Result<(), ToolError> {
    let ok = !slug.is_empty()
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ToolError::invalid("Slug must be lowercase alphanumeric with hyphens"))
    }
}
