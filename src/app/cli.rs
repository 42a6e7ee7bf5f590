#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Run,
    Search,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "run" => CliVerb::Run,
        "search" => CliVerb::Search,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  run [--query Q] [--config P] [--fixtures P] [--output P]".to_string(),
        "                                       Plan and execute api calls for a query".to_string(),
        "  search <text> [--config P] [--top-k N]".to_string(),
        "                                       Rank catalog apis against text".to_string(),
        "  help                                 Show this help".to_string(),
    ]
}

pub fn config_help_lines() -> Vec<String> {
    vec![
        "Config:".to_string(),
        "  --config, then $REVCHAIN_CONFIG, then ./revchain.yaml".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    let mut lines = cli_help_lines();
    lines.push(String::new());
    lines.extend(config_help_lines());
    lines.join("\n")
}
