//! `tools` and `call`: the tool registry from the command line.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use serde_json::Value;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::tools::{self, ToolContext, ToolError, ToolOutput};

/// Execute the tools command
pub fn run_tools(ctx: &ToolContext, json: bool) -> ExitCode {
    let listed = tools::list_tools(ctx);
    if json {
        let value = serde_json::to_value(&listed).unwrap_or(Value::Null);
        println!("{}", ToolOutput::json(value).render());
        return ExitCode::from(EXIT_SUCCESS);
    }

    let width = listed.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for tool in &listed {
        let summary = tool.description.lines().next().unwrap_or_default();
        println!("{:width$}  {}", tool.name, summary, width = width);
    }
    ExitCode::from(EXIT_SUCCESS)
}

fn read_args(args: Option<&str>, args_file: Option<&Path>) -> Result<Value, String> {
    let text = match (args, args_file) {
        (_, Some(path)) => fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?,
        (Some(args), None) => args.to_string(),
        (None, None) => return Ok(Value::Object(Default::default())),
    };
    serde_json::from_str(&text).map_err(|e| format!("Arguments are not valid JSON: {}", e))
}

/// Execute the call command
pub fn run_call(
    ctx: &ToolContext,
    tool: &str,
    args: Option<&str>,
    args_file: Option<&Path>,
    image_out: Option<&Path>,
) -> ExitCode {
    let args = match read_args(args, args_file) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    match tools::dispatch(ctx, tool, args) {
        Ok(output) => {
            println!("{}", output.render());
            if let (Some(path), Some(png)) = (image_out, &output.image_png) {
                if let Err(e) = fs::write(path, png) {
                    eprintln!("Error: Failed to write '{}': {}", path.display(), e);
                    return ExitCode::from(EXIT_ERROR);
                }
                eprintln!("Saved: {}", path.display());
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            println!("{}", ToolOutput::json(e.to_json()).render());
            match e {
                ToolError::UnknownTool(_) | ToolError::InvalidArguments { .. } => {
                    ExitCode::from(EXIT_INVALID_ARGS)
                }
                _ => ExitCode::from(EXIT_ERROR),
            }
        }
    }
}
