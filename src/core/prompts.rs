//! The canonical natural-language prompts the agent understands. Each is a
//! plain string handed to `AgentClient::execute` unmodified; the agent does
//! the interpretation.

pub const BALANCES: &str = "what are my balances?";
pub const POSITIONS: &str = "show my polymarket positions";
pub const REDEEM_WINNINGS: &str = "redeem my winning polymarket positions";

pub fn search_markets(term: &str) -> String {
    format!("search polymarket for {}", term)
}

pub fn market_odds(market: &str) -> String {
    format!("what are the odds for {} on polymarket?", market)
}

pub fn place_bet(amount: f64, position: &str, market: &str) -> String {
    format!("bet ${} on {} for {}", amount, position, market)
}
