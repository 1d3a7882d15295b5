//! MCP Client Test
//!
//! Spawns the code sandbox server over stdio and drives `copy_project`
//! against a running container named by `CONTAINER_ID`.

use anyhow::{bail, Result};
use rmcp::{
    ServiceExt,
    model::CallToolRequestParam,
    transport::{TokioChildProcess, ConfigureCommandExt},
};
use serde_json::json;
use tokio::process::Command;
use tracing::{info, error, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Helper to call a tool and print the result
async fn call_tool(
    client: &rmcp::service::RunningService<rmcp::service::RoleClient, ()>,
    name: &str,
    args: serde_json::Value,
) -> Result<String> {
    info!("📤 Calling tool: {}", name);
    info!("   Arguments: {}", serde_json::to_string_pretty(&args)?);

    let result = client
        .call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: args.as_object().cloned(),
        })
        .await?;

    let content = result
        .content
        .first()
        .and_then(|c| c.raw.as_text())
        .map(|t| t.text.clone())
        .unwrap_or_else(|| "No content".into());

    if result.is_error.unwrap_or(false) {
        error!("❌ Tool error: {}", content);
    } else {
        info!("✅ Result:\n{}", content);
    }

    Ok(content)
}

/// Fail unless the tool text starts with `prefix`
fn expect_prefix(step: &str, content: &str, prefix: &str) -> Result<()> {
    if !content.starts_with(prefix) {
        bail!("{}: expected '{}...', got: {}", step, prefix, content);
    }
    Ok(())
}

/// Small project with a nested directory
fn fixture_project() -> Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("README.md"), "# fixture\n")?;
    std::fs::create_dir_all(dir.path().join("src"))?;
    std::fs::write(dir.path().join("src/main.sh"), "echo hello from fixture\n")?;
    Ok(dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    info!("🚀 Starting MCP Client Test");
    info!("================================");

    let container_id = match std::env::var("CONTAINER_ID") {
        Ok(id) => id,
        Err(_) => bail!("CONTAINER_ID must name a running container"),
    };

    // Get the path to the server binary
    let server_path = std::env::var("MCP_SERVER_PATH")
        .unwrap_or_else(|_| "../../../target/debug/code-sandbox-server".to_string());

    info!("📡 Connecting to MCP server: {}", server_path);

    let transport = TokioChildProcess::new(
        Command::new(&server_path).configure(|cmd| {
            cmd.env("CODE_SANDBOX_MCP_MODE", "stdio");
        })
    )?;

    let client = ().serve(transport).await?;

    info!("✅ Connected to MCP server");
    info!("");

    // ========================================================================
    // Test 1: List available tools
    // ========================================================================
    info!("📋 Test 1: List available tools");
    info!("--------------------------------");

    let tools = client.list_tools(None).await?;
    info!("Available tools ({}):", tools.tools.len());
    for tool in &tools.tools {
        info!("  - {} : {}", tool.name, tool.description.as_deref().unwrap_or(""));
    }
    if !tools.tools.iter().any(|t| t.name == "copy_project") {
        bail!("copy_project tool is not advertised");
    }
    info!("");

    let project = fixture_project()?;
    let src = project.path().to_string_lossy().to_string();

    // ========================================================================
    // Test 2: Copy into the default destination
    // ========================================================================
    info!("📦 Test 2: Copy into default destination");
    info!("--------------------------------");

    let content = call_tool(
        &client,
        "copy_project",
        json!({
            "container_id": container_id,
            "local_src_dir": src,
        }),
    )
    .await?;
    expect_prefix("default copy", &content, "Successfully copied")?;
    info!("");

    // ========================================================================
    // Test 3: Copy into an explicit destination and run a command there
    // ========================================================================
    info!("⚙️  Test 3: Copy with command");
    info!("--------------------------------");

    let content = call_tool(
        &client,
        "copy_project",
        json!({
            "container_id": container_id,
            "local_src_dir": src,
            "dest_dir": "/tmp/mcp-test/project",
            "command": "cat README.md && sh src/main.sh",
            "timeout": 30,
        }),
    )
    .await?;
    expect_prefix("copy with command", &content, "Successfully copied")?;
    if !content.contains("hello from fixture") {
        bail!("command output missing from result: {}", content);
    }
    info!("");

    // ========================================================================
    // Test 4: Failures come back as text
    // ========================================================================
    info!("🚫 Test 4: In-band errors");
    info!("--------------------------------");

    let content = call_tool(
        &client,
        "copy_project",
        json!({
            "container_id": container_id,
            "local_src_dir": "/definitely/not/here",
        }),
    )
    .await?;
    expect_prefix("missing source", &content, "Error")?;

    let content = call_tool(
        &client,
        "copy_project",
        json!({
            "container_id": "no-such-container-for-mcp-test",
            "local_src_dir": src,
        }),
    )
    .await?;
    expect_prefix("missing container", &content, "Error")?;

    let content = call_tool(
        &client,
        "copy_project",
        json!({
            "container_id": container_id,
            "local_src_dir": src,
            "dest_dir": "/tmp/mcp-test/failing",
            "command": "exit 7",
        }),
    )
    .await?;
    expect_prefix("failing command", &content, "Error")?;
    info!("");

    // Remove what Test 3 left behind
    call_tool(
        &client,
        "copy_project",
        json!({
            "container_id": container_id,
            "local_src_dir": src,
            "dest_dir": "/tmp/mcp-test/cleanup",
            "command": "rm -rf /tmp/mcp-test",
        }),
    )
    .await?;

    // ========================================================================
    // Done
    // ========================================================================
    info!("");
    info!("================================");
    info!("✅ All MCP tests completed successfully!");
    info!("================================");

    client.cancel().await?;

    Ok(())
}
