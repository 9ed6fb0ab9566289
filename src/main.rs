//! chef-agent —— ChefGenius 命令行对话
//!
//! ```bash
//! GOOGLE_API_KEY=... EXA_API_KEY=... cargo run -- --config chef.yaml
//! ```

use chef_agent::agent::persona::{AGENT_NAME, QUICK_PROMPTS};
use chef_agent::assistant::ChefAssistant;
use chef_agent::config::{AppConfig, Credentials, MODEL_KEY_ENV, SEARCH_KEY_ENV};
use chef_agent::error::{ChefError, Result};
use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

#[derive(Parser, Debug)]
#[command(name = "chef-agent", version, about = "ChefGenius: recipe assistant with memory")]
struct Args {
    /// YAML 配置文件路径
    #[arg(short, long, env = "CHEF_CONFIG")]
    config: Option<String>,

    /// 覆盖配置中的 user_id
    #[arg(short, long)]
    user: Option<String>,

    /// 启动时恢复指定会话
    #[arg(short, long)]
    session: Option<String>,

    /// 关闭长期记忆
    #[arg(long)]
    no_memory: bool,
}

enum Command<'a> {
    Reset,
    Export(Option<&'a str>),
    Ideas,
    Idea(&'a str),
    Info,
    Sessions,
    Quit,
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let rest = line.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((n, a)) => (n, Some(a.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    Some(match name {
        "reset" | "new" => Command::Reset,
        "export" => Command::Export(arg),
        "ideas" => Command::Ideas,
        "idea" => Command::Idea(arg.unwrap_or("")),
        "info" => Command::Info,
        "sessions" => Command::Sessions,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "chef_agent=info".into()),
        )
        .init();

    let args = Args::parse();

    let credentials = match Credentials::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Missing API Keys: {e}");
            eprintln!("   Please set {MODEL_KEY_ENV} and {SEARCH_KEY_ENV} (environment or .env file).");
            std::process::exit(1);
        }
    };

    let mut config = AppConfig::load_or_default(args.config.as_deref())?;
    if let Some(user) = args.user {
        config.user_id = user;
    }
    if args.no_memory {
        config.enable_memory = false;
    }

    let mut assistant = ChefAssistant::from_config(&config, &credentials)?;
    if let Some(session_id) = args.session.as_deref() {
        let count = assistant.resume(session_id).await;
        println!("📂 Resumed {session_id} ({count} messages)");
    }

    print_banner();
    let mut rl = DefaultEditor::new().map_err(|e| ChefError::Other(e.to_string()))?;

    loop {
        let line = match rl.readline("👤 You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(ChefError::Other(e.to_string())),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let message = match parse_command(line) {
            None => line.to_string(),
            Some(Command::Quit) => break,
            Some(Command::Reset) => {
                let id = assistant.reset();
                println!("🔄 New chat started: {id}\n");
                continue;
            }
            Some(Command::Export(path)) => {
                let path = path
                    .map(str::to_string)
                    .unwrap_or_else(|| assistant.export_file_name());
                match tokio::fs::write(&path, assistant.export()).await {
                    Ok(()) => println!("💾 Exported to {path}\n"),
                    Err(e) => println!("⚠️ Export failed: {e}\n"),
                }
                continue;
            }
            Some(Command::Ideas) => {
                for (i, prompt) in QUICK_PROMPTS.iter().enumerate() {
                    println!("  {}. {prompt}", i + 1);
                }
                println!();
                continue;
            }
            Some(Command::Idea(n)) => {
                match n
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| QUICK_PROMPTS.get(i))
                {
                    Some(prompt) => {
                        println!("👤 You: {prompt}");
                        prompt.to_string()
                    }
                    None => {
                        println!("⚠️ Pick an idea between 1 and {}\n", QUICK_PROMPTS.len());
                        continue;
                    }
                }
            }
            Some(Command::Info) => {
                let info = assistant.info();
                println!("  Session: {}", info.session_id);
                println!("  User:    {}", info.user_id);
                println!("  Messages: {}", info.message_count);
                println!("  Memory:  {}\n", if info.memory_enabled { "on" } else { "off" });
                continue;
            }
            Some(Command::Sessions) => {
                let sessions = assistant.sessions().await;
                if sessions.is_empty() {
                    println!("  (no saved sessions)\n");
                }
                for s in sessions {
                    println!(
                        "  {}  {} messages  {}",
                        s.session_id,
                        s.messages.len(),
                        s.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!();
                continue;
            }
            Some(Command::Unknown(name)) => {
                println!("⚠️ Unknown command /{name}\n");
                continue;
            }
        };

        println!("🤔 Thinking...");
        let outcome = assistant.submit(&message).await;
        let tag = if outcome.used_tools { " 🔍" } else { "" };
        println!("\n🍳 {AGENT_NAME}{tag}:\n{}\n", outcome.reply);
    }

    assistant.wait_for_memory().await;
    println!("👋 Bye!");
    Ok(())
}

fn print_banner() {
    println!("{}", "═".repeat(62));
    println!("  👨‍🍳 {AGENT_NAME}: your AI cooking companion");
    println!("{}", "═".repeat(62));
    println!("  /ideas  /idea <n>  /reset  /export [path]  /info  /sessions  /quit");
    println!();
}
