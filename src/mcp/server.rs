//! Core MCP server implementation.

use std::sync::Arc;

use base64::Engine;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};

use crate::tools::assets::{self, CreateMapInput, CreateSpriteInput, ValidateAssetsInput};
use crate::tools::evolve::{self, ApplyDataPatchInput, ListEvolveIssuesInput};
use crate::tools::publish::{self, PublishGameInput};
use crate::tools::thumbnail::{self, CreateThumbnailInput};
use crate::tools::workflow::{self, DeleteGameInput, InitGameInput, PathInput, TemplateInput};
use crate::tools::{ToolContext, ToolName, ToolOutput, ToolResult};

/// The ForkArcade MCP server
///
/// Every tool runs its handler on the blocking pool, since handlers shell out
/// to `gh`/`git` and touch the filesystem.
#[derive(Debug, Clone)]
pub struct ForkArcadeMcpServer {
    ctx: Arc<ToolContext>,
    tool_router: ToolRouter<Self>,
}

fn to_call_result(output: ToolResult) -> CallToolResult {
    match output {
        Ok(output) => {
            let mut content = vec![Content::text(output.render())];
            if let Some(png) = &output.image_png {
                let data = base64::engine::general_purpose::STANDARD.encode(png);
                content.push(Content::image(data, "image/png"));
            }
            CallToolResult::success(content)
        }
        Err(e) => {
            let payload = ToolOutput::json(e.to_json());
            CallToolResult::error(vec![Content::text(payload.render())])
        }
    }
}

#[tool_router]
impl ForkArcadeMcpServer {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx, tool_router: Self::described_router() }
    }

    /// The generated router with descriptions taken from the tool registry,
    /// so MCP clients and `forkarcade tools` see the same text.
    fn described_router() -> ToolRouter<Self> {
        let mut router = Self::tool_router();
        for route in router.map.values_mut() {
            if let Ok(tool) = route.attr.name.parse::<ToolName>() {
                route.attr.description = Some(tool.description().into());
            }
        }
        router
    }

    async fn run<F>(&self, tool: ToolName, handler: F) -> Result<CallToolResult, ErrorData>
    where
        F: FnOnce(&ToolContext) -> ToolResult + Send + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        let output = tokio::task::spawn_blocking(move || {
            let _span = tracing::info_span!("tool", name = tool.as_str()).entered();
            tracing::info!("tool call");
            let output = handler(&ctx);
            if let Err(e) = &output {
                tracing::warn!(error = %e, "tool failed");
            }
            output
        })
        .await
        .map_err(|e| ErrorData::internal_error(format!("{} did not complete: {}", tool, e), None))?;
        Ok(to_call_result(output))
    }

    #[tool(name = "list_templates")]
    async fn list_templates(&self) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::ListTemplates, workflow::list_templates).await
    }

    #[tool(name = "init_game")]
    async fn init_game(
        &self,
        Parameters(input): Parameters<InitGameInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::InitGame, move |ctx| workflow::init_game(ctx, input)).await
    }

    #[tool(name = "get_sdk_docs")]
    async fn get_sdk_docs(&self) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::GetSdkDocs, |_| Ok(workflow::get_sdk_docs())).await
    }

    #[tool(name = "get_game_prompt")]
    async fn get_game_prompt(
        &self,
        Parameters(input): Parameters<TemplateInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::GetGamePrompt, move |ctx| workflow::get_game_prompt(ctx, input)).await
    }

    #[tool(name = "get_asset_guide")]
    async fn get_asset_guide(
        &self,
        Parameters(input): Parameters<TemplateInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::GetAssetGuide, move |ctx| assets::get_asset_guide(ctx, input)).await
    }

    #[tool(name = "validate_game")]
    async fn validate_game(
        &self,
        Parameters(input): Parameters<PathInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::ValidateGame, move |ctx| workflow::validate_game(ctx, input)).await
    }

    #[tool(name = "publish_game")]
    async fn publish_game(
        &self,
        Parameters(input): Parameters<PublishGameInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::PublishGame, move |ctx| publish::publish_game(ctx, input)).await
    }

    #[tool(name = "update_sdk")]
    async fn update_sdk(
        &self,
        Parameters(input): Parameters<PathInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::UpdateSdk, move |ctx| workflow::update_sdk(ctx, input)).await
    }

    #[tool(name = "create_sprite")]
    async fn create_sprite(
        &self,
        Parameters(input): Parameters<CreateSpriteInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::CreateSprite, move |ctx| assets::create_sprite(ctx, input)).await
    }

    #[tool(name = "create_map")]
    async fn create_map(
        &self,
        Parameters(input): Parameters<CreateMapInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::CreateMap, move |ctx| assets::create_map(ctx, input)).await
    }

    #[tool(name = "validate_assets")]
    async fn validate_assets(
        &self,
        Parameters(input): Parameters<ValidateAssetsInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::ValidateAssets, move |ctx| assets::validate_assets(ctx, input)).await
    }

    #[tool(name = "preview_assets")]
    async fn preview_assets(
        &self,
        Parameters(input): Parameters<PathInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::PreviewAssets, move |ctx| assets::preview_assets(ctx, input)).await
    }

    #[tool(name = "get_versions")]
    async fn get_versions(
        &self,
        Parameters(input): Parameters<PathInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::GetVersions, move |ctx| publish::get_versions(ctx, input)).await
    }

    #[tool(name = "create_thumbnail")]
    async fn create_thumbnail(
        &self,
        Parameters(input): Parameters<CreateThumbnailInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::CreateThumbnail, move |ctx| thumbnail::create_thumbnail(ctx, input)).await
    }

    #[tool(name = "list_evolve_issues")]
    async fn list_evolve_issues(
        &self,
        Parameters(input): Parameters<ListEvolveIssuesInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::ListEvolveIssues, move |ctx| evolve::list_evolve_issues(ctx, input))
            .await
    }

    #[tool(name = "apply_data_patch")]
    async fn apply_data_patch(
        &self,
        Parameters(input): Parameters<ApplyDataPatchInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::ApplyDataPatch, move |ctx| evolve::apply_data_patch(ctx, input)).await
    }

    #[tool(name = "delete_game")]
    async fn delete_game(
        &self,
        Parameters(input): Parameters<DeleteGameInput>,
    ) -> Result<CallToolResult, ErrorData> {
        self.run(ToolName::DeleteGame, move |ctx| workflow::delete_game(ctx, input)).await
    }
}

#[tool_handler]
impl ServerHandler for ForkArcadeMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "forkarcade".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "ForkArcade game backend. Use list_templates and init_game to start a game, \
                 get_game_prompt and get_asset_guide for design guidance, create_sprite, \
                 create_map and create_thumbnail for assets, then validate_game and \
                 publish_game."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server on stdin/stdout
pub async fn run_server(ctx: ToolContext) -> Result<(), Box<dyn std::error::Error>> {
    let in_game = ctx.game_context().is_some();
    tracing::info!(cwd = %ctx.cwd.display(), in_game, "starting MCP server");
    let server = ForkArcadeMcpServer::new(Arc::new(ctx));
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolError;
    use serde_json::json;

    #[test]
    fn test_success_result_carries_image() {
        let output = ToolOutput::json(json!({"ok": true})).with_image(vec![1, 2, 3]);
        let result = to_call_result(Ok(output));
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.content.len(), 2);
    }

    #[test]
    fn test_router_matches_registry() {
        let router = ForkArcadeMcpServer::described_router();
        let tools = router.list_all();
        assert_eq!(tools.len(), ToolName::ALL.len());
        for name in ToolName::ALL {
            let tool = tools
                .iter()
                .find(|t| t.name == name.as_str())
                .unwrap_or_else(|| panic!("{} not routed", name));
            assert_eq!(tool.description.as_deref(), Some(name.description()), "{}", name);
        }
    }

    #[test]
    fn test_error_result_is_flagged() {
        let result = to_call_result(Err(ToolError::invalid("bad slug")));
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.content.len(), 1);
    }
}
