//! Tool registry integration tests.
//!
//! Every tool runs against a temporary games root with a scripted command
//! runner standing in for `gh` and `git`, so no network or repository is
//! touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::Engine;
use forkarcade::config::ForkArcadeConfig;
use forkarcade::github::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use forkarcade::tools::{self, ToolContext, ToolError};
use serde_json::{json, Value};
use tempfile::TempDir;

// ============================================================================
// Scripted runner
// ============================================================================

/// Answers commands by command-line prefix; unmatched commands succeed with
/// empty output.
#[derive(Default)]
struct ScriptedRunner {
    rules: Vec<(String, Result<String, String>)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn reply(mut self, prefix: &str, stdout: impl Into<String>) -> Self {
        self.rules.push((prefix.to_string(), Ok(stdout.into())));
        self
    }

    fn fail(mut self, prefix: &str, stderr: &str) -> Self {
        self.rules.push((prefix.to_string(), Err(stderr.to_string())));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let command = spec.command_line();
        self.calls.lock().unwrap().push(command.clone());
        let rule = self.rules.iter().find(|(prefix, _)| command.starts_with(prefix.as_str()));
        match rule.map(|(_, result)| result) {
            Some(Ok(stdout)) => Ok(CommandOutput { stdout: stdout.clone(), stderr: String::new() }),
            Some(Err(stderr)) => {
                Err(CommandError::Failed { command, code: Some(1), message: stderr.clone() })
            }
            None => Ok(CommandOutput::default()),
        }
    }
}

struct Fixture {
    _temp: TempDir,
    root: PathBuf,
    games: PathBuf,
    runner: Arc<ScriptedRunner>,
    ctx: ToolContext,
}

fn fixture(runner: ScriptedRunner) -> Fixture {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    let games = root.join("games");
    fs::create_dir_all(&games).unwrap();
    fs::write(root.join("forkarcade-sdk.js"), "// ForkArcade SDK v3\nvar ForkArcade = {};\n")
        .unwrap();

    let mut config = ForkArcadeConfig::default();
    config.paths.games_dir = games.clone();
    config.paths.sdk_path = root.join("forkarcade-sdk.js");

    let runner = Arc::new(runner);
    let ctx = ToolContext::new(config, runner.clone()).with_cwd(&root);
    Fixture { _temp: temp, root, games, runner, ctx }
}

/// A complete game checkout named `slug`.
fn make_game(games: &Path, slug: &str) -> PathBuf {
    let dir = games.join(slug);
    fs::create_dir_all(&dir).unwrap();
    let config = json!({
        "template": "roguelike",
        "slug": slug,
        "title": "Dark Cave",
        "currentVersion": 0,
        "versions": [],
        "sdkVersion": 3
    });
    fs::write(dir.join(".forkarcade.json"), serde_json::to_string_pretty(&config).unwrap()).unwrap();
    fs::write(
        dir.join("index.html"),
        "<canvas id=\"c\"></canvas>\n<script src=\"forkarcade-sdk.js\"></script>\n\
         <script src=\"sprites.js\"></script>\n<script src=\"game.js\"></script>\n",
    )
    .unwrap();
    fs::write(dir.join("game.js"), "ForkArcade.onReady(() => ForkArcade.submitScore(1));\n").unwrap();
    fs::write(dir.join("style.css"), "body { background: #000; }\n").unwrap();
    fs::write(dir.join("forkarcade-sdk.js"), "// ForkArcade SDK v3\n").unwrap();
    dir
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn call_ok(ctx: &ToolContext, tool: &str, args: Value) -> Value {
    match tools::dispatch(ctx, tool, args) {
        Ok(output) => output.as_json().cloned().unwrap_or_else(|| json!(output.render())),
        Err(e) => panic!("{} failed: {}", tool, e),
    }
}

fn path_arg(dir: &Path) -> String {
    dir.display().to_string()
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_unknown_tool_renders_error_payload() {
    let fx = fixture(ScriptedRunner::default());
    let out = tools::call(&fx.ctx, "summon_dragon", json!({}));
    assert_eq!(out.as_json(), Some(&json!({"error": "Unknown tool: summon_dragon"})));
    assert!(fx.runner.calls().is_empty());
}

#[test]
fn test_missing_required_argument() {
    let fx = fixture(ScriptedRunner::default());
    let err = tools::dispatch(&fx.ctx, "create_sprite", json!({"path": "games/cave"})).unwrap_err();
    assert!(matches!(err, ToolError::InvalidArguments { tool: "create_sprite", .. }));
}

#[test]
fn test_platform_tools_hidden_inside_game() {
    let fx = fixture(ScriptedRunner::default());
    let all: Vec<&str> = tools::list_tools(&fx.ctx).iter().map(|t| t.name).collect();
    assert_eq!(all.len(), 17);
    assert!(all.contains(&"init_game"));

    let game = make_game(&fx.games, "cave");
    let ctx = ToolContext::new(fx.ctx.config.clone(), fx.runner.clone()).with_cwd(&game);
    let in_game: Vec<&str> = tools::list_tools(&ctx).iter().map(|t| t.name).collect();
    assert_eq!(in_game.len(), 15);
    assert!(!in_game.contains(&"init_game"));
    assert!(!in_game.contains(&"list_templates"));
    assert!(in_game.contains(&"create_thumbnail"));
}

// ============================================================================
// Path containment
// ============================================================================

#[test]
fn test_path_outside_games_root_is_rejected_before_io() {
    let fx = fixture(ScriptedRunner::default());
    let outside = fx.root.join("outside");
    fs::create_dir_all(&outside).unwrap();

    for path in [path_arg(&outside), "games/../outside".to_string(), "/etc".to_string()] {
        let err = tools::dispatch(
            &fx.ctx,
            "create_sprite",
            json!({
                "path": path,
                "category": "enemies",
                "name": "rat",
                "palette": {"1": "#a86"},
                "pixels": ["1"]
            }),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Path(_)), "{}: {}", path, err);
    }
    assert!(!outside.join("_sprites.json").exists());
    assert!(fx.runner.calls().is_empty());
}

#[test]
fn test_relative_path_resolves_against_cwd() {
    let fx = fixture(ScriptedRunner::default());
    make_game(&fx.games, "cave");
    let out = call_ok(&fx.ctx, "get_versions", json!({"path": "games/cave"}));
    assert_eq!(out["slug"], "cave");
    assert_eq!(out["currentVersion"], 0);
}

// ============================================================================
// Sprites and maps
// ============================================================================

#[test]
fn test_create_sprite_appends_and_replaces_frames() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");
    let args = |frame: Value, row: &str| {
        json!({
            "path": path_arg(&game),
            "category": "enemies",
            "name": "rat",
            "palette": {"1": "#a86", "2": "#fff"},
            "pixels": [row, row],
            "frame": frame,
            "origin": [1, 1]
        })
    };

    let first = call_ok(&fx.ctx, "create_sprite", args(Value::Null, "1.2"));
    assert_eq!(first["ok"], true);
    assert_eq!(first["frame"], 0);
    assert_eq!(first["total_sprites"], 1);
    assert_eq!(first["preview"], "1.2\n1.2");

    let second = call_ok(&fx.ctx, "create_sprite", args(Value::Null, "2.1"));
    assert_eq!((second["frame"].clone(), second["frames"].clone()), (json!(1), json!(2)));

    let replaced = call_ok(&fx.ctx, "create_sprite", args(json!(0), "111"));
    assert_eq!((replaced["frame"].clone(), replaced["frames"].clone()), (json!(0), json!(2)));

    let saved = read_json(&game.join("_sprites.json"));
    let rat = &saved["enemies"]["rat"];
    assert_eq!(rat["frames"], json!([["111", "111"], ["2.1", "2.1"]]));
    assert_eq!(rat["origin"], json!([1, 1]));
    let js = fs::read_to_string(game.join("sprites.js")).unwrap();
    assert!(js.contains("drawSprite"));
    assert!(js.contains("\"rat\""));
}

#[test]
fn test_create_sprite_validation_leaves_files_untouched() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");

    let ragged = tools::dispatch(
        &fx.ctx,
        "create_sprite",
        json!({
            "path": path_arg(&game),
            "category": "enemies",
            "name": "rat",
            "palette": {"1": "#a86"},
            "pixels": ["11", "1"]
        }),
    )
    .unwrap_err();
    assert_eq!(ragged.to_string(), "Row 1 has 1 chars, expected 2");

    let category = tools::dispatch(
        &fx.ctx,
        "create_sprite",
        json!({
            "path": path_arg(&game),
            "category": "weather",
            "name": "rain",
            "palette": {"1": "#00f"},
            "pixels": ["1"]
        }),
    )
    .unwrap_err();
    assert!(category.to_string().starts_with("Invalid category: weather"));
    assert!(!game.join("_sprites.json").exists());
}

#[test]
fn test_create_map_and_reject_ragged_grid() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");

    let out = call_ok(
        &fx.ctx,
        "create_map",
        json!({
            "path": path_arg(&game),
            "name": "level1",
            "grid": ["1111", "1001", "1111"],
            "objects": [{"type": "chest", "x": 1, "y": 1}]
        }),
    );
    assert_eq!(out["message"], "Map 'level1' saved (4x3)");
    assert_eq!(out["total_maps"], 1);
    let saved = read_json(&game.join("_maps.json"));
    assert_eq!(saved["level1"]["grid"][1], "1001");
    assert!(fs::read_to_string(game.join("maps.js")).unwrap().contains("getMapGrid"));

    let err = tools::dispatch(
        &fx.ctx,
        "create_map",
        json!({"path": path_arg(&game), "name": "level2", "grid": ["11", "1"]}),
    )
    .unwrap_err();
    assert!(matches!(err, ToolError::Map(_)));
    assert!(read_json(&game.join("_maps.json")).get("level2").is_none());
}

#[test]
fn test_preview_assets() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");

    let err = tools::dispatch(&fx.ctx, "preview_assets", json!({"path": path_arg(&game)})).unwrap_err();
    assert!(err.to_string().starts_with("No _sprites.json found"));

    call_ok(
        &fx.ctx,
        "create_sprite",
        json!({
            "path": path_arg(&game),
            "category": "tiles",
            "name": "wall",
            "palette": {"1": "#555"},
            "pixels": ["11", "11"]
        }),
    );
    let out = call_ok(&fx.ctx, "preview_assets", json!({"path": path_arg(&game)}));
    assert_eq!(out["message"], "Preview generated with 1 sprites");
    assert!(game.join("_preview.html").exists());
}

#[test]
fn test_validate_assets_against_template_guide() {
    let repos = json!([{
        "name": "game-template-roguelike",
        "full_name": "ForkArcade/game-template-roguelike",
        "description": "Roguelike",
        "topics": ["forkarcade-template", "roguelike"]
    }]);
    let guide = json!({
        "style": "dark fantasy",
        "categories": {
            "tiles": {"desc": "Map tiles", "sprites": ["wall", "floor"]},
            "enemies": {"desc": "Monsters", "sprites": ["rat"]}
        }
    });
    let encoded = base64::engine::general_purpose::STANDARD.encode(guide.to_string());
    let runner = ScriptedRunner::default()
        .reply("gh api /orgs/ForkArcade/repos", repos.to_string())
        .reply(
            "gh api /repos/ForkArcade/game-template-roguelike/contents/_assets.json",
            json!({"content": encoded}).to_string(),
        )
        .fail("gh api /repos/ForkArcade/game-template-roguelike/contents/_styles.json", "Not Found");
    let fx = fixture(runner);
    let game = make_game(&fx.games, "cave");

    call_ok(
        &fx.ctx,
        "create_sprite",
        json!({
            "path": path_arg(&game),
            "category": "tiles",
            "name": "wall",
            "palette": {"1": "#555"},
            "pixels": ["1"]
        }),
    );

    let out = call_ok(&fx.ctx, "validate_assets", json!({"path": path_arg(&game)}));
    assert_eq!(out["template"], "roguelike");
    assert_eq!(out["categories"]["tiles"]["found"], json!(["wall"]));
    assert_eq!(out["categories"]["tiles"]["missing"], json!(["floor"]));
    assert_eq!(out["categories"]["enemies"]["missing"], json!(["rat"]));
    assert_eq!((out["total_found"].clone(), out["total_required"].clone()), (json!(1), json!(3)));
    assert_eq!(out["complete"], false);
    assert_eq!(out["included_in_html"], true);
}

#[test]
fn test_init_game_from_template() {
    let repos = json!([{
        "name": "game-template-roguelike",
        "full_name": "ForkArcade/game-template-roguelike",
        "description": "Roguelike",
        "topics": ["forkarcade-template", "roguelike"]
    }]);
    let styles = json!({"styles": {"dark": {}, "pastel": {}}, "default": "dark"});
    let encoded = base64::engine::general_purpose::STANDARD.encode(styles.to_string());
    let runner = ScriptedRunner::default()
        .reply("gh api /orgs/ForkArcade/repos", repos.to_string())
        .reply(
            "gh api /repos/ForkArcade/game-template-roguelike/contents/_styles.json",
            json!({"content": encoded}).to_string(),
        );
    let fx = fixture(runner);

    let out = call_ok(
        &fx.ctx,
        "init_game",
        json!({"slug": "cave", "template": "roguelike", "title": "Dark Cave", "description": "Crawl"}),
    );
    assert_eq!(out["ok"], true);
    assert_eq!(out["repo"], "ForkArcade/cave");

    let game = fx.games.join("cave");
    let config = read_json(&game.join(".forkarcade.json"));
    assert_eq!(config["template"], "roguelike");
    assert_eq!(config["style"], "dark");
    assert_eq!(config["sdkVersion"], 3);
    assert!(fs::read_to_string(game.join("forkarcade-sdk.js")).unwrap().starts_with("// ForkArcade SDK v3"));
    assert_eq!(read_json(&game.join(".mcp.json"))["mcpServers"]["forkarcade"]["command"], "forkarcade");

    let calls = fx.runner.calls();
    assert!(calls.contains(
        &"gh repo create ForkArcade/cave --template ForkArcade/game-template-roguelike --public --clone"
            .to_string()
    ));
    assert!(calls.contains(&"gh repo edit ForkArcade/cave --description Crawl".to_string()));
    assert!(calls.contains(
        &"gh repo edit ForkArcade/cave --add-topic forkarcade-game --add-topic roguelike".to_string()
    ));

    let again = tools::dispatch(
        &fx.ctx,
        "init_game",
        json!({"slug": "cave", "template": "roguelike", "title": "Dark Cave"}),
    );
    assert!(matches!(again, Err(ToolError::Invalid(msg)) if msg.starts_with("Directory already exists")));

    let bad_style = tools::dispatch(
        &fx.ctx,
        "init_game",
        json!({"slug": "forest", "template": "roguelike", "title": "Forest", "style": "neon"}),
    );
    assert!(matches!(bad_style, Err(ToolError::Invalid(msg)) if msg.starts_with("Unknown style: neon")));
    assert!(!fx.games.join("forest").exists());
}

// ============================================================================
// Evolve
// ============================================================================

#[test]
fn test_apply_sprite_patch_merges() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");
    call_ok(
        &fx.ctx,
        "create_sprite",
        json!({
            "path": path_arg(&game),
            "category": "tiles",
            "name": "wall",
            "palette": {"1": "#555"},
            "pixels": ["1"]
        }),
    );

    let patch = json!({
        "type": "sprites",
        "data": {"enemies": {"rat": {"w": 2, "h": 1, "palette": {"1": "#a86"}, "frames": [["1."]], "origin": [0, 0]}}}
    });
    let body = format!("Sprite changes proposed from the editor.\n\n```json:data-patch\n{}\n```", patch);
    let out = call_ok(&fx.ctx, "apply_data_patch", json!({"path": path_arg(&game), "issue_body": body}));
    assert_eq!(out["changed"], json!(["enemies/rat"]));
    assert_eq!(out["total_sprites"], 2);

    let saved = read_json(&game.join("_sprites.json"));
    assert!(saved["tiles"]["wall"].is_object());
    assert_eq!(saved["enemies"]["rat"]["frames"], json!([["1."]]));
}

#[test]
fn test_apply_invalid_patch_writes_nothing() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");
    let patch = json!({
        "type": "sprites",
        "data": {"enemies": {"rat": {"w": 2, "h": 1, "palette": {"1": "#a86"}, "frames": [["1x"]]}}}
    });
    let body = format!("```json:data-patch\n{}\n```", patch);
    let err = tools::dispatch(&fx.ctx, "apply_data_patch", json!({"path": path_arg(&game), "issue_body": body}))
        .unwrap_err();
    assert!(matches!(err, ToolError::Sprite(_)));
    assert!(!game.join("_sprites.json").exists());
}

#[test]
fn test_list_evolve_issues_for_every_game() {
    let runner = ScriptedRunner::default()
        .reply(
            "gh issue list --repo ForkArcade/cave",
            json!([{"number": 4, "title": "Add bats"}]).to_string(),
        )
        .fail("gh issue list --repo ForkArcade/forest", "HTTP 404");
    let fx = fixture(runner);
    make_game(&fx.games, "cave");
    make_game(&fx.games, "forest");

    let out = call_ok(&fx.ctx, "list_evolve_issues", json!({}));
    assert_eq!(out["total"], 1);
    let games = out["games"].as_array().unwrap();
    assert_eq!(games[0]["slug"], "cave");
    assert_eq!(games[0]["issues"][0]["number"], 4);
    assert_eq!(games[1]["slug"], "forest");
    assert_eq!(games[1]["error"], "HTTP 404");
}

// ============================================================================
// Game lifecycle
// ============================================================================

#[test]
fn test_validate_game_reports_issues() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");

    let out = call_ok(&fx.ctx, "validate_game", json!({"path": path_arg(&game)}));
    assert_eq!(out["valid"], true, "{}", out);

    fs::write(game.join("game.js"), "console.log('hi');\n").unwrap();
    fs::remove_file(game.join("index.html")).unwrap();
    let out = call_ok(&fx.ctx, "validate_game", json!({"path": path_arg(&game)}));
    assert_eq!(out["valid"], false);
    let issues: Vec<&str> = out["issues"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert!(issues.contains(&"Missing index.html"));
    assert_eq!(issues.len(), 3);
}

#[test]
fn test_update_sdk_copies_newer_canonical() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");
    fs::write(game.join("forkarcade-sdk.js"), "// ForkArcade SDK v1\n").unwrap();

    let out = call_ok(&fx.ctx, "update_sdk", json!({"path": path_arg(&game)}));
    assert_eq!(out["message"], "SDK updated from v1 to v3");
    assert_eq!(read_json(&game.join(".forkarcade.json"))["sdkVersion"], 3);

    let again = call_ok(&fx.ctx, "update_sdk", json!({"path": path_arg(&game)}));
    assert_eq!(again["message"], "SDK already at latest version (v3)");
}

#[test]
fn test_publish_records_version_snapshot() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");

    let out = call_ok(&fx.ctx, "publish_game", json!({"path": path_arg(&game), "description": "A cave"}));
    assert_eq!(out["ok"], true);
    let results: Vec<&str> = out["results"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(results, ["Pushed to GitHub", "GitHub Pages enabled", "Version v1 snapshot created"]);
    assert_eq!(out["game_url"], "https://forkarcade.github.io/cave/");

    let config = read_json(&game.join(".forkarcade.json"));
    assert_eq!(config["currentVersion"], 1);
    assert_eq!(config["versions"].as_array().unwrap().len(), 1);
    assert_eq!(config["versions"][0]["version"], 1);
    assert!(game.join("versions/v1/index.html").exists());
    assert!(game.join("versions/v1/game.js").exists());

    let calls = fx.runner.calls();
    assert!(calls.contains(&"git push -u origin main".to_string()));
    assert!(calls.contains(&"gh repo edit ForkArcade/cave --description A cave".to_string()));
    assert!(calls.contains(&"git commit -m Version v1".to_string()));
}

#[test]
fn test_publish_push_failure_reports_partial_results() {
    let runner = ScriptedRunner::default().fail("git push", "! [rejected] main -> main");
    let fx = fixture(runner);
    let game = make_game(&fx.games, "cave");

    let out = tools::call(&fx.ctx, "publish_game", json!({"path": path_arg(&game)}));
    assert_eq!(
        out.as_json(),
        Some(&json!({"error": "! [rejected] main -> main", "results": []}))
    );
    assert_eq!(read_json(&game.join(".forkarcade.json"))["currentVersion"], 0);
    assert!(!game.join("versions").exists());
}

#[test]
fn test_pages_already_enabled_is_not_an_error() {
    let runner = ScriptedRunner::default().fail("gh api repos/ForkArcade/cave/pages", "409: already exists");
    let fx = fixture(runner);
    let game = make_game(&fx.games, "cave");

    let out = call_ok(&fx.ctx, "publish_game", json!({"path": path_arg(&game)}));
    assert!(out["results"].as_array().unwrap().contains(&json!("GitHub Pages already enabled")));
}

#[test]
fn test_get_versions_without_config() {
    let fx = fixture(ScriptedRunner::default());
    let dir = fx.games.join("empty");
    fs::create_dir_all(&dir).unwrap();
    let err = tools::dispatch(&fx.ctx, "get_versions", json!({"path": path_arg(&dir)})).unwrap_err();
    assert_eq!(err.to_string(), "No .forkarcade.json found");
}

#[test]
fn test_delete_game_requires_confirm() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");

    let err = tools::dispatch(&fx.ctx, "delete_game", json!({"slug": "cave"})).unwrap_err();
    assert!(err.to_string().contains("confirm"));
    assert!(game.exists());
    assert!(fx.runner.calls().is_empty());

    let out = call_ok(&fx.ctx, "delete_game", json!({"slug": "cave", "confirm": true}));
    assert_eq!(out["ok"], true);
    assert!(!game.exists());
    assert_eq!(fx.runner.calls(), ["gh repo delete ForkArcade/cave --yes"]);
}

// ============================================================================
// Thumbnail
// ============================================================================

#[test]
fn test_create_thumbnail_writes_png_and_commits() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");

    let output = tools::dispatch(
        &fx.ctx,
        "create_thumbnail",
        json!({
            "path": path_arg(&game),
            "w": 8,
            "h": 4,
            "layers": [
                {"res": [2, 1], "ops": [{"fill": "#102030"}]},
                {"ops": [{"sprite": {"category": "enemies", "name": "ghost"}}]}
            ]
        }),
    )
    .unwrap();

    let png = output.image_png.clone().expect("thumbnail image");
    assert_eq!(&png[1..4], b"PNG");
    let body = output.as_json().unwrap();
    assert_eq!(body["size"], json!([8, 4]));
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);

    let image = image::open(game.join("_thumbnail.png")).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (8, 4));
    assert_eq!(image.get_pixel(7, 3).0, [16, 32, 48, 255]);
    assert!(game.join("_thumbnail.json").exists());
    assert!(fx.runner.calls().contains(&"git commit -m Update thumbnail".to_string()));
}

#[test]
fn test_create_thumbnail_rejects_oversized_request() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");
    let err = tools::dispatch(
        &fx.ctx,
        "create_thumbnail",
        json!({"path": path_arg(&game), "w": 100000, "h": 4, "layers": [], "commit": false}),
    )
    .unwrap_err();
    assert!(matches!(err, ToolError::Thumbnail(_)));
    assert!(!game.join("_thumbnail.png").exists());
}

#[test]
fn test_create_thumbnail_survives_unreadable_sprite_sheet() {
    let fx = fixture(ScriptedRunner::default());
    let game = make_game(&fx.games, "cave");
    let legacy = json!({"ui": {"heart": {"w": 2, "h": 1, "palette": {"1": "#f00"}, "pixels": ["1."]}}});
    fs::write(game.join("_sprites.json"), legacy.to_string()).unwrap();

    let plain = call_ok(
        &fx.ctx,
        "create_thumbnail",
        json!({"path": path_arg(&game), "w": 4, "h": 2, "layers": [{"ops": [{"fill": "#102030"}]}], "commit": false}),
    );
    assert_eq!(plain["ok"], true);
    assert_eq!(plain["warnings"], json!([]));
    let image = image::open(game.join("_thumbnail.png")).unwrap().to_rgba8();
    assert_eq!(image.get_pixel(3, 1).0, [16, 32, 48, 255]);

    let with_sprite = call_ok(
        &fx.ctx,
        "create_thumbnail",
        json!({
            "path": path_arg(&game),
            "w": 4, "h": 2,
            "layers": [{"ops": [{"fill": "#102030"}, {"sprite": {"category": "ui", "name": "heart"}}]}],
            "commit": false
        }),
    );
    let warnings: Vec<&str> =
        with_sprite["warnings"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert_eq!(warnings.len(), 2, "{:?}", warnings);
    assert!(warnings[0].starts_with("Sprites unavailable: "));
    assert_eq!(warnings[1], "Sprite not found: ui/heart");
}
