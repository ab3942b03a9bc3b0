// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments appended to those prompts.

/// Appended to every system prompt that expects a LaTeX document back.
pub const LATEX_ONLY_SYSTEM: &str = "Return ONLY the LaTeX code. No explanations.";

/// Structural rules shared by the tailoring and correction prompts.
pub const STRUCTURE_INSTRUCTION: &str = "\
- Keep 3 experiences, 2 projects structure\n\
- Each experience should have 2-3 bullets\n\
- Each project should have 1-2 bullets\n\
- Keep the document compilable. Don't break formatting commands.";

/// Target band quoted back to the model in correction prompts.
pub fn target_band(min_fill: f64, max_fill: f64) -> String {
    format!("{min_fill:.2}-{max_fill:.2}")
}
