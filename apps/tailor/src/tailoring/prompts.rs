//! LLM prompt constants for tailoring and page-fill correction.
//!
//! All prompts ask for raw LaTeX only. The model does not reliably comply, so
//! every reply goes through `extractor::extract_document`.
//!
//! Templates use `{placeholder}` slots filled by `fill_template`.

// ────────────────────────────────────────────────────────────────────────────
// Initial tailoring
// ────────────────────────────────────────────────────────────────────────────

pub const TAILOR_SYSTEM: &str = "\
You are a resume tailoring assistant optimizing for BOTH ATS systems AND human recruiters. \
Your goal is to make the candidate appear as a strong fit for the role. You can reframe \
experiences generously, but stay grounded in the candidate's actual background.\n\
\n\
CORE DIRECTIVES:\n\
1. QUALIFICATIONS THROUGHOUT: every required qualification from the job description should \
feel DEMONSTRATED through the bullet points, not just listed in skills.\n\
2. THEME SATURATION: the job's dominant theme should run through every bullet point.\n\
3. FILL ONE PAGE COMPLETELY: the resume MUST be exactly one page - no more, no less.\n\
4. ATS OPTIMIZATION: use exact keywords from the job description, standard section headers \
(Experience, Education, Skills, Projects), a comma-separated Skills section, and no tables, \
multi-column layouts or text boxes.\n\
5. RESUME STRUCTURE (STRICT): exactly 3 experience roles with 2-3 bullets each and exactly \
2 projects with 1-2 bullets each. Each bullet: ACTION VERB -> what you did -> IMPACT.\n\
6. CONFIDENT LANGUAGE: strong, assertive phrasing. Never hedge.\n\
7. QUANTIFY STRATEGICALLY: metrics on roughly half of the bullets.\n\
8. MAINTAIN BELIEVABILITY: do not invent roles, projects or coursework. Only list courses \
that appear in the original resume or the additional background.\n\
9. DO NOT COMBINE PROJECTS: keep projects separate.\n\
10. PRESERVE LATEX STRUCTURE: keep the document compilable.";

pub const TAILOR_PROMPT_TEMPLATE: &str = "\
## Current Resume:\n\
{resume}\n\
\n\
## Additional Background Information (use this to swap in relevant experiences/skills):\n\
{background}\n\
\n\
## Job Description to Tailor For:\n\
{job_description}\n\
\n\
## Instructions:\n\
Rewrite this resume so every qualification from the job description feels DEMONSTRATED \
through the narrative.\n\
\n\
STRICT STRUCTURE:\n\
- 3 Experience entries with 2-4 bullets each\n\
- 2 Project entries with 1-2 bullets each\n\
\n\
Fill the entire page, add metrics selectively, and upgrade weak language to confident \
assertions. Use the additional background to pull in relevant details.\n\
\n\
CRITICAL OUTPUT FORMAT: Return ONLY the raw LaTeX code starting with \\documentclass and \
ending with \\end{document}. No markdown, no explanations, no code fences. Just valid, \
compilable LaTeX that fits on ONE page.";

pub const NO_BACKGROUND: &str = "No additional context provided.";

// ────────────────────────────────────────────────────────────────────────────
// Shorten (page too dense, or more than one page)
// ────────────────────────────────────────────────────────────────────────────

pub const SHORTEN_SYSTEM: &str = "\
You are a resume editor. The resume is too dense/long and needs to be shortened slightly.\n\
\n\
Make SMALL targeted cuts - don't dramatically change the resume.\n\
\n\
CUTTING PRIORITY:\n\
1. Tighten verbose phrases - remove filler words\n\
2. Shorten the longest bullet points\n\
3. Remove redundant details\n\
4. Cut least relevant skills\n\
\n\
PRESERVE:\n\
- All job-relevant qualifications and keywords\n\
- Key achievements and metrics\n\
- Overall structure (3 experiences, 2 projects)\n\
\n";

pub const SHORTEN_PROMPT_TEMPLATE: &str = "\
This resume needs to be SLIGHTLY shorter. {status} (target fill ratio: {target_band})\n\
\n\
Make small cuts to reduce length by about 5-10%.\n\
\n\
Job Description (keep these qualifications):\n\
{job_description}\n\
\n\
Current LaTeX:\n\
{latex}\n\
\n\
Return slightly shortened LaTeX. Keep all sections, just tighten the content.";

// ────────────────────────────────────────────────────────────────────────────
// Expand (page too sparse)
// ────────────────────────────────────────────────────────────────────────────

pub const EXPAND_SYSTEM: &str = "\
You are a resume editor. The resume has too much whitespace and needs more content.\n\
\n\
EXPAND by:\n\
1. Add more detail to existing bullet points - elaborate on impact, context, technologies\n\
2. Add an additional bullet to experiences that only have 2\n\
3. Expand project descriptions with more technical detail\n\
4. Add relevant skills that match the job description\n\
\n\
RULES:\n\
{structure}\n\
- Stay grounded in the candidate's background - embellish but don't fabricate\n\
\n";

pub const EXPAND_PROMPT_TEMPLATE: &str = "\
This resume has too much whitespace. {status} (target fill ratio: {target_band})\n\
\n\
Add more content to fill the page better - about 10-15% more content.\n\
\n\
Job Description (emphasize these qualifications):\n\
{job_description}\n\
\n\
Current LaTeX (too sparse):\n\
{latex}\n\
\n\
Return expanded LaTeX with more detail. Fill the page better while keeping it professional.";

/// Fills `{key}` slots in a single pass over `template`.
///
/// Substituted values are never rescanned, so a résumé or job description that
/// happens to contain `{latex}` is left alone.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let candidate = &rest[open..];
        let hit = values.iter().find_map(|(key, value)| {
            candidate
                .strip_prefix('{')
                .and_then(|s| s.strip_prefix(key))
                .and_then(|s| s.strip_prefix('}'))
                .map(|tail| (*value, tail))
        });
        match hit {
            Some((value, tail)) => {
                out.push_str(value);
                rest = tail;
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template_replaces_known_keys() {
        let out = fill_template("a {x} b {y}", &[("x", "1"), ("y", "2")]);
        assert_eq!(out, "a 1 b 2");
    }

    #[test]
    fn test_fill_template_leaves_unknown_braces() {
        let out = fill_template("\\end{document} {x}", &[("x", "1")]);
        assert_eq!(out, "\\end{document} 1");
    }

    #[test]
    fn test_fill_template_does_not_rescan_values() {
        let out = fill_template("{a}|{b}", &[("a", "{b}"), ("b", "B")]);
        assert_eq!(out, "{b}|B");
    }

    #[test]
    fn test_fill_template_repeated_key() {
        assert_eq!(fill_template("{x}{x}", &[("x", "z")]), "zz");
    }

    #[test]
    fn test_tailor_template_has_all_slots() {
        for slot in ["{resume}", "{background}", "{job_description}"] {
            assert!(TAILOR_PROMPT_TEMPLATE.contains(slot), "missing {slot}");
        }
    }

    #[test]
    fn test_correction_templates_have_all_slots() {
        for template in [SHORTEN_PROMPT_TEMPLATE, EXPAND_PROMPT_TEMPLATE] {
            for slot in ["{status}", "{target_band}", "{job_description}", "{latex}"] {
                assert!(template.contains(slot), "missing {slot}");
            }
        }
    }
}
