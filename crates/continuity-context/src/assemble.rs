//! Session context rendering.
//!
//! Results are grouped by category and rendered in a fixed section order,
//! each section capped. `general` chunks are retrievable but never rendered
//! here.

use continuity_core::types::{Category, RetrievalResult};

pub const HEADER: &str = "=== CONTINUITY CONTEXT ===\n";
pub const FOOTER: &str = "\n=== END CONTEXT ===";

/// Rendered sections: category, heading, maximum results shown.
pub const SECTIONS: [(Category, &str, usize); 4] = [
    (Category::Portfolio, "Portfolio Context", 2),
    (Category::Project, "Project Context", 3),
    (Category::Session, "Recent Sessions", 3),
    (Category::Theory, "Continuity Principles", 2),
];

pub fn default_query(project: Option<&str>) -> String {
    match project {
        Some(name) => format!(
            "What do I need to know about the {name} project? What was the recent work and current state?"
        ),
        None => "What are the active projects and recent work? What is the current state?".to_string(),
    }
}

/// Render ranked results into the prompt-ready context block.
///
/// Within a section, results keep the order they arrive in (best first).
pub fn render_context(results: &[RetrievalResult]) -> String {
    let mut parts: Vec<String> = vec![HEADER.to_string()];
    for (category, heading, cap) in SECTIONS {
        let mut section = results
            .iter()
            .filter(|r| r.chunk.category() == category)
            .take(cap)
            .peekable();
        if section.peek().is_none() {
            continue;
        }
        parts.push(format!("\n## {heading}:"));
        parts.extend(section.map(|r| format!("\n{}\n", r.chunk.text)));
    }
    parts.push(FOOTER.to_string());
    parts.join("\n")
}
