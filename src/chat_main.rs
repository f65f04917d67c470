//! Interactive chat front end. Spawns the MCP binary as a child process and
//! drives the agent loop against it.

use std::io::Write;
use std::path::PathBuf;

use tokio::io::AsyncBufReadExt;

use kbase_backend::chat::{ChatAgent, McpToolInvoker};
use kbase_backend::config::{AppConfig, AppPaths};
use kbase_backend::llm::OpenAiCompatProvider;
use kbase_backend::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let paths = AppPaths::new();
    logging::init(&paths);

    let provider = OpenAiCompatProvider::new(&config)?;

    let mcp_bin = mcp_bin_path()?;
    let command = tokio::process::Command::new(mcp_bin);
    let invoker = McpToolInvoker::spawn(command).await?;

    let mut agent = ChatAgent::new(&provider, &invoker, config.max_agent_steps);

    println!("Chatbot initialized. Type 'exit' to quit.");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") {
            println!("Exiting...");
            break;
        }
        if input.eq_ignore_ascii_case("clear") {
            println!("Clearing conversation history...");
            agent.clear_history();
            continue;
        }

        match agent.run(input).await {
            Ok(answer) => println!("\nAssistant: {}", answer),
            Err(err) => println!("Error: {}", err),
        }
    }

    drop(agent);
    invoker.shutdown().await?;
    Ok(())
}

/// The MCP binary ships next to this one; `KBASE_MCP_BIN` overrides.
fn mcp_bin_path() -> anyhow::Result<PathBuf> {
    if let Ok(bin) = std::env::var("KBASE_MCP_BIN") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    path.push("kbase-mcp");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
