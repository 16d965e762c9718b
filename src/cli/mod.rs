mod key;

use std::sync::Arc;

use anyhow::Result;
use console::style;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::core::client::AgentClient;
use crate::core::config::Config;
use crate::core::error::ClientError;
use crate::core::prompts;
use crate::core::terminal::{GuideSection, print_error, print_status, print_warn};
use crate::core::vault::CredentialVault;

fn print_help() {
    GuideSection::new("Account")
        .command("key set [value]", "Save the agent API key (prompts if omitted)")
        .command("key status", "Show whether a key is stored")
        .command("key clear", "Remove the stored key")
        .print();

    GuideSection::new("Markets")
        .command("balances", "Wallet balances")
        .command("search <term>", "Search prediction markets")
        .command("odds <market>", "Current odds for a market")
        .print();

    GuideSection::new("Trading")
        .command("positions", "Open positions")
        .command("bet <amount> <position> <market>", "Place a bet (asks first; --yes to skip)")
        .command("redeem", "Redeem winning positions (asks first; --yes to skip)")
        .print();

    GuideSection::new("Agent")
        .command("ask <prompt> [--thread <id>]", "Free-form instruction to the agent")
        .print();

    println!(
        "\n {} {} <command> [args]\n",
        style("Usage:").bold(),
        style("punter").green()
    );
}

fn init_logging() {
    let level = std::env::var("PUNTER_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

pub async fn run_main() -> Result<()> {
    init_logging();
    let args: Vec<String> = std::env::args().collect();

    let Some(cmd) = args.get(1).map(|s| s.as_str()) else {
        print_help();
        return Ok(());
    };

    match cmd {
        "key" => key::run_key_command(&args).await,
        "balances" => run_prompt(prompts::BALANCES.to_string(), None, false).await,
        "positions" => run_prompt(prompts::POSITIONS.to_string(), None, false).await,
        "search" => {
            let term = joined_positional(&args, 2);
            if term.is_empty() {
                print_error("Usage: punter search <term>");
                std::process::exit(2);
            }
            run_prompt(prompts::search_markets(&term), None, false).await
        }
        "odds" => {
            let market = joined_positional(&args, 2);
            if market.is_empty() {
                print_error("Usage: punter odds <market>");
                std::process::exit(2);
            }
            run_prompt(prompts::market_odds(&market), None, false).await
        }
        "bet" => {
            let (amount, position, market) = match parse_bet_args(&args, 2) {
                Ok(parsed) => parsed,
                Err(msg) => {
                    print_error(&msg);
                    print_error("Usage: punter bet <amount> <position> <market>");
                    std::process::exit(2);
                }
            };
            let question = format!("Bet ${} on {} for {}?", amount, position, market);
            if !confirm(&question, wants_yes(&args))? {
                return Ok(());
            }
            run_prompt(prompts::place_bet(amount, &position, &market), None, false).await
        }
        "redeem" => {
            if !confirm("Redeem all winning positions?", wants_yes(&args))? {
                return Ok(());
            }
            run_prompt(prompts::REDEEM_WINNINGS.to_string(), None, false).await
        }
        "ask" => {
            let (prompt, thread_id) = parse_ask_args(&args, 2);
            if prompt.is_empty() {
                print_error("Usage: punter ask <prompt> [--thread <id>]");
                std::process::exit(2);
            }
            run_prompt(prompt, thread_id, true).await
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            std::process::exit(2);
        }
    }
}

fn build_client() -> Result<AgentClient> {
    let config = Config::from_env();
    config.ensure_data_dir()?;
    let vault = CredentialVault::open(&config.vault_path())?;
    Ok(AgentClient::new(config.api_url, Arc::new(vault)))
}

/// Run one prompt to completion and print the agent's answer.
/// `show_thread` prints the correlation token so a follow-up `ask --thread`
/// can continue the conversation.
async fn run_prompt(prompt: String, thread_id: Option<String>, show_thread: bool) -> Result<()> {
    let client = build_client()?;
    match client.execute(&prompt, thread_id.as_deref()).await {
        Ok(outcome) => {
            println!("{}", outcome.text);
            if show_thread && let Some(thread) = outcome.thread_id {
                print_status("thread", &thread);
            }
            Ok(())
        }
        Err(err) => {
            report_client_error(&err);
            std::process::exit(1);
        }
    }
}

fn report_client_error(err: &ClientError) {
    match err {
        ClientError::MissingCredential => {
            print_error("No API key configured. Run 'punter key set' first.");
        }
        ClientError::TimedOut { .. } => {
            // Unknown outcome, not a rejection: the action may still have
            // gone through on the remote side.
            print_warn("The agent did not answer in time. Check your positions before retrying.");
        }
        ClientError::JobFailed(message) => {
            print_error(&format!("The agent rejected the request: {}", message));
        }
        other => print_error(&format!("{}", other)),
    }
}

pub(crate) fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    Ok(inquire::Confirm::new(question)
        .with_default(false)
        .prompt()?)
}

fn wants_yes(args: &[String]) -> bool {
    args.iter().any(|a| a == "--yes" || a == "-y")
}

/// Non-flag arguments from `start` on, joined with spaces so market names
/// can be given unquoted.
pub(crate) fn joined_positional(args: &[String], start: usize) -> String {
    args[start.min(args.len())..]
        .iter()
        .filter(|a| !a.starts_with('-'))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn parse_bet_args(args: &[String], start: usize) -> Result<(f64, String, String), String> {
    let positional: Vec<&String> = args[start.min(args.len())..]
        .iter()
        .filter(|a| !a.starts_with('-'))
        .collect();

    let [amount_raw, position, market @ ..] = positional.as_slice() else {
        return Err("Missing bet arguments.".to_string());
    };
    let amount: f64 = amount_raw
        .trim_start_matches('$')
        .parse()
        .map_err(|_| format!("Invalid amount: {}", amount_raw))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(format!("Amount must be positive, got {}", amount_raw));
    }
    if market.is_empty() {
        return Err("Missing market name.".to_string());
    }

    let market = market
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Ok((amount, position.to_string(), market))
}

pub(crate) fn parse_ask_args(args: &[String], start: usize) -> (String, Option<String>) {
    let mut thread_id = None;
    let mut words = Vec::new();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--thread" | "-t" => {
                if i + 1 < args.len() {
                    thread_id = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--yes" | "-y" => i += 1,
            word => {
                words.push(word);
                i += 1;
            }
        }
    }
    (words.join(" "), thread_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn joined_positional_skips_flags() {
        let args = argv(&["punter", "search", "rate", "cuts", "--yes"]);
        assert_eq!(joined_positional(&args, 2), "rate cuts");
    }

    #[test]
    fn bet_args_parse_amount_position_and_multiword_market() {
        let args = argv(&["punter", "bet", "25", "Yes", "Will", "BTC", "hit", "100k"]);
        let (amount, position, market) = parse_bet_args(&args, 2).unwrap();
        assert_eq!(amount, 25.0);
        assert_eq!(position, "Yes");
        assert_eq!(market, "Will BTC hit 100k");
    }

    #[test]
    fn bet_args_accept_dollar_prefix() {
        let args = argv(&["punter", "bet", "$12.50", "No", "Rain"]);
        let (amount, _, _) = parse_bet_args(&args, 2).unwrap();
        assert_eq!(amount, 12.5);
    }

    #[test]
    fn bet_args_reject_nonpositive_and_missing() {
        let args = argv(&["punter", "bet", "0", "Yes", "Market"]);
        assert!(parse_bet_args(&args, 2).is_err());
        let args = argv(&["punter", "bet", "ten", "Yes", "Market"]);
        assert!(parse_bet_args(&args, 2).is_err());
        let args = argv(&["punter", "bet", "5", "Yes"]);
        assert!(parse_bet_args(&args, 2).is_err());
    }

    #[test]
    fn ask_args_split_thread_flag_from_prompt() {
        let args = argv(&["punter", "ask", "and", "double", "it", "--thread", "t-42"]);
        let (prompt, thread) = parse_ask_args(&args, 2);
        assert_eq!(prompt, "and double it");
        assert_eq!(thread.as_deref(), Some("t-42"));
    }

    #[test]
    fn ask_args_without_thread() {
        let args = argv(&["punter", "ask", "what", "are", "my", "balances?"]);
        let (prompt, thread) = parse_ask_args(&args, 2);
        assert_eq!(prompt, "what are my balances?");
        assert!(thread.is_none());
    }
}
