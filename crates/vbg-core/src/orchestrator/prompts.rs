//! Prompt construction
//!
//! Prompts list file paths, never file contents: agents run in the project
//! directory and read what they need themselves.

use super::types::TaskMode;
use crate::project::ProjectType;
use crate::selector::FileCandidate;
use crate::session::ContextEntry;
use std::fmt::Write as _;

/// Inputs shared by every task prompt
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    /// Task mode
    pub mode: TaskMode,
    /// Question, task or idea
    pub text: &'a str,
    /// Project name (new-project mode)
    pub project_name: Option<&'a str>,
    /// Detected project type
    pub project_type: ProjectType,
    /// Selected files
    pub files: &'a [FileCandidate],
    /// Recent session history, oldest first
    pub history: &'a [ContextEntry],
}

/// Build the prompt sent to the agents for a task
#[must_use]
pub fn build_task_prompt(input: &PromptInput<'_>) -> String {
    let mut out = String::new();

    if !input.history.is_empty() {
        out.push_str("[Previous conversation in this session]\n");
        for entry in input.history {
            let _ = writeln!(
                out,
                "({}) {}: {}",
                entry.command(),
                entry.speaker(),
                entry.content().trim()
            );
        }
        out.push('\n');
    }

    let project = input.project_type;
    let text = input.text.trim();
    match input.mode {
        TaskMode::Analyze => {
            let _ = writeln!(
                out,
                "Answer the following question by analyzing this {} project.\n",
                project
            );
            let _ = writeln!(out, "[Question]\n{}\n", text);
            push_files(&mut out, "Project files", input.files);
            out.push_str(
                "Answer as an analysis report:\n\
                 1. Summary\n\
                 2. Detailed analysis\n\
                 3. Relevant code and file locations\n\
                 4. Further recommendations, if any\n\n\
                 Do not modify any code; analyze only.",
            );
        }
        TaskMode::Refactor => {
            let _ = writeln!(
                out,
                "Analyze this {} project and propose refactorings that improve performance.\n",
                project
            );
            push_focus(&mut out, text);
            push_files(&mut out, "Key files", input.files);
            out.push_str(
                "Cover:\n\
                 1. Performance (execution time, memory use)\n\
                 2. Removal of duplicated code\n\
                 3. Removal of unnecessary dependencies\n\
                 4. Adoption of current language idioms\n\n\
                 Show the concrete code change for every suggestion.",
            );
        }
        TaskMode::Recommend => {
            let _ = writeln!(
                out,
                "Review this {} project and recommend improvements.\n",
                project
            );
            push_focus(&mut out, text);
            push_files(&mut out, "Project files", input.files);
            out.push_str(
                "Cover:\n\
                 1. Architecture: current weaknesses and recommended patterns\n\
                 2. New features for users and for developers\n\
                 3. Dependency upgrades and libraries worth adopting\n\
                 4. Testing and CI improvements\n\n\
                 Rank the recommendations by expected impact.",
            );
        }
        TaskMode::UiReview => {
            let _ = writeln!(
                out,
                "Review the UI/UX of this {} project and propose improvements.\n",
                project
            );
            push_focus(&mut out, text);
            push_files(&mut out, "UI files", input.files);
            out.push_str(
                "Cover:\n\
                 1. Component structure: reuse, splitting and merging\n\
                 2. Styling: duplicated CSS, a consistent design system\n\
                 3. UX flow: user journeys, loading and error states\n\
                 4. Accessibility: semantics, keyboard navigation, contrast\n\n\
                 Include example code for each proposal.",
            );
        }
        TaskMode::Plan => {
            out.push_str("Write a detailed implementation plan for the following task.\n\n");
            let _ = writeln!(out, "[Task]\n{}\n", text);
            let _ = writeln!(out, "[Project type]\n{}\n", project);
            push_files(&mut out, "Existing files", input.files);
            out.push_str(
                "Use this structure:\n\n\
                 # Implementation Plan\n\
                 ## 1. Overview (goal, scope)\n\
                 ## 2. Technical approach (patterns, libraries)\n\
                 ## 3. Files to create or change\n\
                 ## 4. Implementation steps\n\
                 ## 5. Testing strategy\n\
                 ## 6. Risks and open questions",
            );
        }
        TaskMode::NewProject => {
            out.push_str("Design a new project from the following idea.\n\n");
            if let Some(name) = input.project_name.filter(|n| !n.trim().is_empty()) {
                let _ = writeln!(out, "[Project name]\n{}\n", name.trim());
            }
            let _ = writeln!(out, "[Idea]\n{}\n", text);
            out.push_str(
                "Include:\n\
                 1. Recommended stack (frontend, backend, database, tooling)\n\
                 2. Folder structure\n\
                 3. Contents of the essential configuration files\n\
                 4. Setup commands\n\
                 5. A getting-started guide (install, run, develop)",
            );
        }
    }

    out
}

/// Build the auditor prompt for the sequential cross-check
#[must_use]
pub fn build_review_prompt(task_prompt: &str, primary_id: &str, primary_output: &str) -> String {
    format!(
        "You are reviewing a solution proposed by another assistant ({primary}).\n\n\
         [Original request]\n{task}\n\n\
         [Proposed solution from {primary}]\n{output}\n\n\
         Review it for:\n\
         1. Code quality and readability\n\
         2. Potential bugs and security issues\n\
         3. Performance improvements\n\
         4. Adherence to best practices\n\n\
         Where something is wrong, give a concrete correction.",
        primary = primary_id,
        task = task_prompt.trim(),
        output = primary_output.trim(),
    )
}

fn push_focus(out: &mut String, text: &str) {
    if !text.is_empty() {
        let _ = writeln!(out, "[Focus]\n{}\n", text);
    }
}

fn push_files(out: &mut String, title: &str, files: &[FileCandidate]) {
    if files.is_empty() {
        return;
    }
    let _ = writeln!(out, "[{}]", title);
    for file in files {
        let _ = writeln!(out, "{}", file.path.display());
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn input<'a>(
        mode: TaskMode,
        text: &'a str,
        files: &'a [FileCandidate],
        history: &'a [ContextEntry],
    ) -> PromptInput<'a> {
        PromptInput {
            mode,
            text,
            project_name: None,
            project_type: ProjectType::Rust,
            files,
            history,
        }
    }

    #[test]
    fn test_analysis_prompt_lists_files_and_question() {
        let files = vec![FileCandidate::new("src/lib.rs", 10, Utc::now())];
        let prompt = build_task_prompt(&input(TaskMode::Analyze, "Why is it slow?", &files, &[]));

        assert!(prompt.contains("rust project"));
        assert!(prompt.contains("[Question]\nWhy is it slow?"));
        assert!(prompt.contains("[Project files]\nsrc/lib.rs\n"));
        assert!(!prompt.contains("Previous conversation"));
    }

    #[test]
    fn test_history_is_quoted_first() {
        let history = vec![
            ContextEntry::task("What does main do?", "analyze"),
            ContextEntry::agent("claude", "It parses args.", "analyze"),
        ];
        let prompt = build_task_prompt(&input(TaskMode::Analyze, "And then?", &[], &history));

        assert!(prompt.starts_with("[Previous conversation in this session]"));
        assert!(prompt.contains("(analyze) user: What does main do?"));
        assert!(prompt.contains("(analyze) claude: It parses args."));
    }

    #[test]
    fn test_refactor_without_focus() {
        let prompt = build_task_prompt(&input(TaskMode::Refactor, "  ", &[], &[]));
        assert!(!prompt.contains("[Focus]"));
        assert!(prompt.contains("refactorings"));
    }

    #[test]
    fn test_new_project_includes_name() {
        let mut i = input(TaskMode::NewProject, "a todo app", &[], &[]);
        i.project_name = Some("todo-rs");
        let prompt = build_task_prompt(&i);
        assert!(prompt.contains("[Project name]\ntodo-rs"));
        assert!(prompt.contains("[Idea]\na todo app"));
    }

    #[test]
    fn test_review_prompt_embeds_primary_output() {
        let prompt = build_review_prompt("do X", "claude", "OK-A\n");
        assert!(prompt.contains("[Original request]\ndo X"));
        assert!(prompt.contains("[Proposed solution from claude]\nOK-A"));
    }
}
