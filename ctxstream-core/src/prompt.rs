//! Rendering of the messages sent to the endpoint.

use crate::context::{ContextFile, FileChunk, Part};

/// Header line for a chunk: the path, plus the line range for partial chunks.
pub fn chunk_header(chunk: &FileChunk) -> String {
    match (chunk.line_range(), chunk.total_lines) {
        (Some((start, end)), Some(total)) => format!(
            "--- File: {} (lines {}-{} of {}) ---",
            chunk.path, start, end, total
        ),
        (Some((start, end)), None) => {
            format!("--- File: {} (lines {}-{}) ---", chunk.path, start, end)
        }
        _ => format!("--- File: {} ---", chunk.path),
    }
}

fn push_body(out: &mut String, content: &str) {
    out.push_str(content);
    if !content.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
}

/// The single-shot message: the prompt followed by every file inline.
pub fn single_message(prompt: &str, files: &[ContextFile]) -> String {
    if files.is_empty() {
        return prompt.to_string();
    }

    let mut out = String::with_capacity(
        prompt.len() + files.iter().map(|f| f.content.len() + f.path.len() + 32).sum::<usize>(),
    );
    out.push_str(prompt);
    out.push_str("\n\nContext files:\n\n");
    for file in files {
        out.push_str(&format!("--- File: {} ---\n", file.path));
        push_body(&mut out, &file.content);
    }
    out
}

/// Message for part `index` (1-based) of `total`.
///
/// Part 1 opens with the multi-part instructions and, when given, the
/// context summary.
pub fn part_message(part: &Part, index: usize, total: usize, summary: Option<&str>) -> String {
    let mut out = String::new();

    if index == 1 {
        out.push_str(&format!(
            "I will provide the context for my request in {} parts. \
             Please acknowledge each part briefly and wait for my question, \
             which will follow once all parts have been sent.\n\n",
            total
        ));
        if let Some(summary) = summary {
            out.push_str(summary.trim_end());
            out.push_str("\n\n");
        }
    }

    out.push_str(&format!("=== PART {}/{} ===\n\n", index, total));
    for chunk in &part.files {
        out.push_str(&chunk_header(chunk));
        out.push('\n');
        push_body(&mut out, &chunk.content);
    }
    out.push_str(&format!("=== END OF PART {}/{} ===\n\n", index, total));

    if index < total {
        out.push_str(&format!(
            "Please acknowledge receipt of part {}/{}. Do not answer yet; more parts follow.",
            index, total
        ));
    } else {
        out.push_str(&format!(
            "This was the final part ({}/{}). Please acknowledge receipt; my question follows.",
            index, total
        ));
    }
    out
}

/// The question asked after all `total` parts were acknowledged.
pub fn final_question(prompt: &str, total: usize) -> String {
    format!(
        "All {} parts of the context have been delivered. \
         Using the complete context from those parts, please answer the following:\n\n{}",
        total, prompt
    )
}
