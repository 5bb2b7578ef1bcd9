/// Track id list input
use anyhow::{Context, Result};
use soul_queue::TrackId;
use std::path::Path;

/// Parse ids separated by whitespace or commas; `#` starts a comment
pub fn parse_ids(text: &str) -> Result<Vec<TrackId>> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(|line| line.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<i64>()
                .map(TrackId)
                .with_context(|| format!("Invalid track id {:?}", token))
        })
        .collect()
}

pub fn read_ids(path: &Path) -> Result<Vec<TrackId>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_ids(&text)
}
