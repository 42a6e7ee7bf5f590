use crate::app::command_support::{load_cli_settings, parse_options};
use crate::catalog::{CapabilityIndex, DocumentIndex, RetrievedApi};

const SEARCH_FLAGS: &[&str] = &["--config", "--top-k"];

pub fn cmd_search(args: &[String]) -> Result<String, String> {
    let options = parse_options(args, SEARCH_FLAGS)?;
    let text = options.positional.join(" ");
    if text.trim().is_empty() {
        return Err("usage: search <text> [--config P] [--top-k N]".to_string());
    }
    let settings = load_cli_settings(&options)?;
    let top_k = match options.value("--top-k") {
        Some(raw) => parse_top_k(raw)?,
        None => settings.catalog.root_top_k,
    };

    let index =
        DocumentIndex::load_dir(&settings.catalog.docs_path).map_err(|err| err.to_string())?;
    let hits = index.retrieve(&text, top_k).map_err(|err| err.to_string())?;
    Ok(render_hits(&hits))
}

fn parse_top_k(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(format!("--top-k must be a positive integer, got `{raw}`")),
    }
}

pub fn render_hits(hits: &[RetrievedApi]) -> String {
    if hits.is_empty() {
        return "no matching apis".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(rank, hit)| {
            format!(
                "{:>2}. {:<32} {:.3}  {}",
                rank + 1,
                hit.api_name,
                hit.similarity,
                hit.source
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
