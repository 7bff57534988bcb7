//! Plain-text rendering of command results.

use lmdash_model::{
    ComparisonReport, ContextTurn, LocalModel, ModelUpdate, RunOutcome, UpdateOutcome,
    extract_code_blocks,
};
use lmdash_rag::{CorpusManifest, SearchHit};

/// Render rows as left-aligned columns separated by two spaces.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let mut out = render_row(headers.iter().copied(), &widths);
    for row in rows {
        out.push_str(&render_row(row.iter().map(String::as_str), &widths));
    }
    out
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line: Vec<String> =
        cells.zip(widths).map(|(cell, &width)| format!("{cell:<width$}")).collect();
    let mut line = line.join("  ").trim_end().to_string();
    line.push('\n');
    line
}

pub fn models(models: &[LocalModel]) -> String {
    if models.is_empty() {
        return "No models installed.\n".into();
    }
    let rows: Vec<Vec<String>> = models
        .iter()
        .map(|m| {
            vec![
                m.name.clone(),
                format!("{:.2}", m.size_gb()),
                m.modified_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();
    table(&["NAME", "SIZE (GB)", "MODIFIED"], &rows)
}

pub fn updates(updates: &[ModelUpdate]) -> String {
    let rows: Vec<Vec<String>> = updates
        .iter()
        .map(|u| {
            let outcome = match &u.outcome {
                UpdateOutcome::Skipped => "skipped (custom)".to_string(),
                UpdateOutcome::Updated => "updated".to_string(),
                UpdateOutcome::Failed(message) => format!("failed: {message}"),
            };
            vec![u.name.clone(), outcome]
        })
        .collect();
    table(&["MODEL", "RESULT"], &rows)
}

/// Summary table followed by each model's response.
pub fn comparison(report: &ComparisonReport, code_only: bool) -> String {
    let rows: Vec<Vec<String>> = report
        .runs
        .iter()
        .map(|run| match &run.outcome {
            RunOutcome::Completed(m) => vec![
                run.model.clone(),
                format!("{:.2}", m.elapsed.as_secs_f64()),
                m.eval_count.map_or_else(|| "-".into(), |c| c.to_string()),
                format!("{:.2}", m.tokens_per_second),
            ],
            RunOutcome::Failed(_) => {
                vec![run.model.clone(), "error".into(), "-".into(), "-".into()]
            }
        })
        .collect();

    let mut out = table(&["MODEL", "TIME (s)", "TOKENS", "TOKENS/s"], &rows);
    for run in &report.runs {
        out.push_str(&format!("\n=== {} ===\n", run.model));
        match &run.outcome {
            RunOutcome::Completed(m) if code_only => {
                let blocks = extract_code_blocks(&m.response);
                if blocks.is_empty() {
                    out.push_str("(no code blocks)\n");
                }
                for block in blocks {
                    out.push_str(&block);
                    out.push_str("\n\n");
                }
            }
            RunOutcome::Completed(m) => {
                out.push_str(m.response.trim_end());
                out.push('\n');
            }
            RunOutcome::Failed(message) => {
                out.push_str(&format!("error: {message}\n"));
            }
        }
    }
    out
}

pub fn contextual(model: &str, turns: &[ContextTurn]) -> String {
    let rows: Vec<Vec<String>> = turns
        .iter()
        .enumerate()
        .map(|(i, turn)| {
            vec![
                (i + 1).to_string(),
                format!("{:.2}", turn.metrics.elapsed.as_secs_f64()),
                format!("{:.2}", turn.metrics.tokens_per_second),
            ]
        })
        .collect();

    let mut out = format!("Model: {model}\n");
    out.push_str(&table(&["TURN", "TIME (s)", "TOKENS/s"], &rows));
    for (i, turn) in turns.iter().enumerate() {
        out.push_str(&format!("\n[{}] > {}\n{}\n", i + 1, turn.prompt, turn.metrics.response.trim_end()));
    }
    out
}

pub fn probe(model: &str, json: bool, function_calling: bool) -> String {
    let mark = |ok: bool| if ok { "yes" } else { "no" };
    table(
        &["MODEL", "JSON", "FUNCTION CALLING"],
        &[vec![model.to_string(), mark(json).into(), mark(function_calling).into()]],
    )
}

pub fn corpora(manifests: &[CorpusManifest]) -> String {
    if manifests.is_empty() {
        return "No corpora found.\n".into();
    }
    let rows: Vec<Vec<String>> = manifests
        .iter()
        .map(|m| {
            vec![
                m.name.clone(),
                m.embedding_model.clone(),
                m.segment_count.to_string(),
                m.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    table(&["NAME", "EMBEDDING MODEL", "SEGMENTS", "CREATED"], &rows)
}

pub fn hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No matching segments.\n".into();
    }
    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "[{}] score {:.3}  document {} offset {}\n{}\n\n",
            i + 1,
            hit.score,
            hit.segment.document_index + 1,
            hit.segment.source_offset,
            hit.segment.text.trim()
        ));
    }
    out
}
