use anyhow::Result;

use crate::core::config::Config;
use crate::core::terminal::{print_error, print_info, print_status, print_success};
use crate::core::vault::{CredentialStore, CredentialVault};

pub async fn run_key_command(args: &[String]) -> Result<()> {
    let config = Config::from_env();
    config.ensure_data_dir()?;
    let vault = CredentialVault::open(&config.vault_path())?;

    let sub_cmd = args.get(2).map(|s| s.as_str()).unwrap_or("status");
    match sub_cmd {
        "set" => {
            let value = match args.get(3) {
                Some(value) => value.clone(),
                None => inquire::Password::new("API key:")
                    .without_confirmation()
                    .with_help_message("Stored encrypted on this machine; sent only to the agent API")
                    .prompt()?,
            };
            let value = value.trim();
            if value.is_empty() {
                print_error("API key cannot be empty.");
                std::process::exit(2);
            }
            vault.set(value).await?;
            print_success("API key saved.");
            Ok(())
        }
        "status" => {
            match vault.get().await? {
                Some(key) => print_status("API key", &mask_key(&key)),
                None => print_info("No API key configured. Run 'punter key set'."),
            }
            Ok(())
        }
        "clear" => {
            if !vault.has().await? {
                print_info("No API key to clear.");
                return Ok(());
            }
            let assume_yes = args.iter().any(|a| a == "--yes" || a == "-y");
            if !super::confirm(
                "Clear the API key? You will need to re-enter it to use punter.",
                assume_yes,
            )? {
                return Ok(());
            }
            vault.clear().await?;
            print_success("API key cleared.");
            Ok(())
        }
        other => {
            print_error(&format!("Unknown key subcommand: {}", other));
            print_info("Available: key set [value], key status, key clear");
            std::process::exit(2);
        }
    }
}

/// Show only the last 8 characters of a stored key.
pub(crate) fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(8)..].iter().collect();
    format!("••••••••{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_shows_only_last_eight_chars() {
        assert_eq!(mask_key("bk-live-0123456789abcdef"), "••••••••89abcdef");
    }

    #[test]
    fn mask_handles_short_keys() {
        assert_eq!(mask_key("short"), "••••••••short");
    }
}
