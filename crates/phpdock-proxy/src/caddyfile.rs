//! Caddyfile rendering.
//!
//! The document is regenerated in full on every sync; it is never patched
//! incrementally. Projects are ordered by display order, then name, so the
//! output is deterministic for a given project set.

use phpdock_core::Project;

/// Renders the complete routing configuration for the given projects.
pub fn render(projects: &[Project]) -> String {
    let mut ordered: Vec<&Project> = projects.iter().collect();
    ordered.sort_by(|a, b| {
        a.display_order
            .cmp(&b.display_order)
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut doc = String::from(
        "# Generated by phpdock. Do not edit; the file is rewritten on every sync.\n\n\
         :80 {\n\trespond \"phpdock\" 200\n}\n",
    );

    for project in ordered {
        doc.push('\n');
        doc.push_str(&format!(
            "{} {{\n\treverse_proxy {}\n}}\n",
            project.domain,
            project.upstream_addr()
        ));
    }

    doc
}
