use std::sync::{Arc, Mutex};
use toolgate_core::{AuthorizationStatus, Conversation, Gateway, Role, Sensitivity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    /// Parse a verbosity level from a string
    ///
    /// Returns Some(Verbosity) for valid inputs, None for invalid.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quiet" => Some(Self::Quiet),
            "normal" => Some(Self::Normal),
            "verbose" => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// Classify an input line as a special command type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandType<'a> {
    /// Leave the console
    Exit,
    /// Slash command with name and arguments
    Slash {
        command: &'a str,
        args: Vec<&'a str>,
    },
    /// A tool call to dispatch
    Regular,
}

impl<'a> CommandType<'a> {
    /// Parse an input line into a command type
    pub fn parse(input: &'a str) -> Self {
        if input == "exit" || input == "quit" {
            return Self::Exit;
        }

        if input.starts_with('/') {
            let parts: Vec<&str> = input.split_whitespace().collect();
            if !parts.is_empty() {
                return Self::Slash {
                    command: parts[0],
                    args: parts[1..].to_vec(),
                };
            }
        }

        Self::Regular
    }
}

pub enum SpecialCommandResult {
    Exit,
    Continue,
}

/// Handle `exit` and slash commands
///
/// Returns Some(result) if this was a special command,
/// None if it should be dispatched as a tool call.
pub fn handle_special_command(
    input: &str,
    gateway: &Gateway,
    conversation: &Conversation,
    verbosity: &Arc<Mutex<Verbosity>>,
) -> Option<SpecialCommandResult> {
    match CommandType::parse(input) {
        CommandType::Exit => Some(SpecialCommandResult::Exit),
        CommandType::Slash { command, args } => {
            match command {
                "/exit" | "/quit" => return Some(SpecialCommandResult::Exit),
                "/help" => show_help(),
                "/tools" => println!("{}", render_tools(gateway)),
                "/history" => println!("{}", render_history(conversation, args.first().copied())),
                "/auth" => println!("{}", render_authorizations(gateway)),
                "/verbosity" => update_verbosity(verbosity, &args),
                _ => eprintln!(
                    "Unknown command: {}. Type /help for available commands.",
                    command
                ),
            }
            Some(SpecialCommandResult::Continue)
        }
        CommandType::Regular => None,
    }
}

fn show_help() {
    println!("\n📖 Commands:");
    println!("  <Tool> {{json}}          Call a tool, e.g. GoogleNews_SearchNewsStories {{\"keywords\": \"rust\"}}");
    println!("  /tools                 List loaded tools");
    println!("  /history [n]           Show the last n conversation messages (default: 10)");
    println!("  /auth                  Show authorization status per tool");
    println!("  /verbosity [level]     Set output level: quiet, normal, verbose");
    println!("  /help                  Show this help");
    println!("  exit                   Leave the console");
    println!();
}

/// Loaded tools with their sensitivity and grant requirement
pub fn render_tools(gateway: &Gateway) -> String {
    let catalog = gateway.catalog();
    if catalog.is_empty() {
        return "\nNo tools loaded.\n".to_string();
    }

    let gate = gateway.confirmation_gate();
    let mut out = format!("\n🛠️  Tools ({}):\n", catalog.len());
    for tool in catalog.iter() {
        let confirm = if gate.requires_confirmation(tool) {
            "confirm"
        } else {
            match tool.sensitivity() {
                Sensitivity::Sensitive => "exempt",
                Sensitivity::Routine => "routine",
            }
        };
        let grant = if tool.requires_authorization() {
            ", grant"
        } else {
            ""
        };
        out.push_str(&format!("  {} \x1b[2m[{}{}]\x1b[0m\n", tool.name(), confirm, grant));
        if !tool.description().is_empty() {
            out.push_str(&format!("    {}\n", tool.description()));
        }
    }
    out
}

/// The last `count` messages of the conversation
pub fn render_history(conversation: &Conversation, count: Option<&str>) -> String {
    let limit = count.and_then(|n| n.parse::<usize>().ok()).unwrap_or(10);
    let messages = conversation.messages();
    if messages.is_empty() {
        return "\nNo history yet.\n".to_string();
    }

    let start = messages.len().saturating_sub(limit);
    let mut out = format!("\n📜 Last {} messages:\n", messages.len() - start);
    for message in &messages[start..] {
        let role = match message.role {
            Role::User => "👤 You",
            Role::Assistant => "🤖 Assistant",
        };
        out.push_str(&format!("  {}: {}\n", role, message.content));
    }
    out
}

/// Grant state of every (user, tool) pair seen this run
pub fn render_authorizations(gateway: &Gateway) -> String {
    let records = gateway.authorizations().records();
    if records.is_empty() {
        return "\nNo authorizations requested yet.\n".to_string();
    }

    let mut out = String::from("\n🔑 Authorizations:\n");
    for (user, tool, record) in records {
        let status = match record.status {
            AuthorizationStatus::Authorized => "\x1b[32mauthorized\x1b[0m".to_string(),
            AuthorizationStatus::PendingGrant => match record.grant_challenge_url {
                Some(url) => format!("\x1b[33mpending\x1b[0m ({})", url),
                None => "\x1b[33mpending\x1b[0m".to_string(),
            },
            AuthorizationStatus::Unauthorized => match record.refusal {
                Some(reason) => format!("\x1b[31mrefused\x1b[0m ({})", reason),
                None => "unauthorized".to_string(),
            },
        };
        out.push_str(&format!("  {} · {}: {}\n", user, tool, status));
    }
    out
}

fn update_verbosity(verbosity: &Arc<Mutex<Verbosity>>, args: &[&str]) {
    let Ok(mut current) = verbosity.lock() else {
        return;
    };
    match args.first() {
        None => println!("Verbosity: {:?}", *current),
        Some(level) => match Verbosity::parse(level) {
            Some(level) => {
                *current = level;
                println!("Verbosity set to {:?}", level);
            }
            None => eprintln!("Unknown verbosity: {}. Use quiet, normal, or verbose.", level),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_core::test_utils::{tool_spec, MockToolProvider};
    use toolgate_core::{ConfirmationPolicy, GatewayConfig, Message, ToolSpec};

    #[test]
    fn test_parse_commands() {
        assert_eq!(CommandType::parse("exit"), CommandType::Exit);
        assert_eq!(
            CommandType::parse("/history 5"),
            CommandType::Slash {
                command: "/history",
                args: vec!["5"],
            }
        );
        assert_eq!(
            CommandType::parse("SearchNews {}"),
            CommandType::Regular
        );
    }

    #[test]
    fn test_verbosity_parse() {
        assert_eq!(Verbosity::parse("quiet"), Some(Verbosity::Quiet));
        assert_eq!(Verbosity::parse("loud"), None);
    }

    #[test]
    fn test_render_history_limits_messages() {
        let mut conversation = Conversation::new();
        for i in 0..5 {
            conversation.push(Message::user(format!("message {}", i)));
        }

        let out = render_history(&conversation, Some("2"));
        assert!(out.contains("Last 2 messages"));
        assert!(out.contains("message 4"));
        assert!(!out.contains("message 2"));

        assert!(render_history(&Conversation::new(), None).contains("No history"));
    }

    async fn gateway(config: GatewayConfig, tools: Vec<ToolSpec>) -> Gateway {
        let provider = tools
            .into_iter()
            .fold(MockToolProvider::new(), |p, spec| p.with_tool(spec));
        Gateway::builder()
            .provider(provider)
            .config(config)
            .user("u1")
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_render_tools() {
        let mut config = GatewayConfig::default();
        config.confirmation = ConfirmationPolicy::default().with_exempt("TrendingTopics");
        let mut routine = tool_spec("Weather");
        routine.sensitivity = Some(Sensitivity::Routine);
        routine.requires_authorization = false;

        let gateway = gateway(
            config,
            vec![tool_spec("SearchNews"), tool_spec("TrendingTopics"), routine],
        )
        .await;
        let out = render_tools(&gateway);

        assert!(out.contains("Tools (3)"));
        assert!(out.contains("SearchNews \x1b[2m[confirm, grant]"));
        assert!(out.contains("TrendingTopics \x1b[2m[exempt, grant]"));
        assert!(out.contains("Weather \x1b[2m[routine]"));
    }

    #[tokio::test]
    async fn test_render_authorizations_before_any_call() {
        let gateway = gateway(GatewayConfig::default(), vec![tool_spec("SearchNews")]).await;
        assert!(render_authorizations(&gateway).contains("No authorizations"));
    }
}
