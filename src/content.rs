use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};

use crate::schema::{QuizContent, ReelManifest, QUESTIONS_PER_QUIZ};

/// Minimum line count for a quiz text: background ref, topic, main question,
/// then the question/answer pairs.
const HEADER_LINES: usize = 3;

pub fn load_and_validate_manifest(path: &Path) -> Result<ReelManifest> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read reel manifest {}", path.display()))?;
    let mut manifest: ReelManifest = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(
            "failed to parse yaml in {} at {}: {}",
            path.display(),
            location,
            error
        )
    })?;
    manifest.validate()?;

    let manifest_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    manifest.quiz = resolve_and_validate_path(&manifest_dir, &manifest.quiz, "quiz")?;
    manifest.font = resolve_and_validate_path(&manifest_dir, &manifest.font, "font")?;

    Ok(manifest)
}

pub fn load_quiz_content(manifest: &ReelManifest) -> Result<QuizContent> {
    let raw = fs::read_to_string(&manifest.quiz)
        .with_context(|| format!("failed to read quiz text {}", manifest.quiz.display()))?;
    let mut content = parse_quiz_text(&raw)
        .with_context(|| format!("invalid quiz text in {}", manifest.quiz.display()))?;

    // The background ref is authored relative to the quiz file.
    let quiz_dir = manifest
        .quiz
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let background = resolve_and_validate_path(
        &quiz_dir,
        Path::new(&content.background_image),
        "background image",
    )?;
    content.background_image = background.to_string_lossy().into_owned();

    Ok(content)
}

/// Parses the raw authoring format: one line each for background ref, topic
/// and main question, then `question | answer` lines. Lines missing either
/// half of the pair are skipped; exactly 8 complete pairs must remain.
pub fn parse_quiz_text(text: &str) -> Result<QuizContent> {
    let lines = text.trim().lines().collect::<Vec<_>>();
    if lines.len() < HEADER_LINES + QUESTIONS_PER_QUIZ {
        bail!(
            "quiz text needs at least {} lines (background, topic, main question, {} question|answer pairs), got {}",
            HEADER_LINES + QUESTIONS_PER_QUIZ,
            QUESTIONS_PER_QUIZ,
            lines.len()
        );
    }

    let background_image = lines[0].trim().to_owned();
    let topic = lines[1].trim().to_owned();
    let main_question = lines[2].trim().to_owned();
    if background_image.is_empty() {
        bail!("background image reference (line 1) cannot be empty");
    }
    if topic.is_empty() {
        bail!("topic (line 2) cannot be empty");
    }
    if main_question.is_empty() {
        bail!("main question (line 3) cannot be empty");
    }

    let mut questions = Vec::new();
    let mut answers = Vec::new();
    for line in &lines[HEADER_LINES..] {
        let Some((question, answer)) = line.split_once('|') else {
            continue;
        };
        let question = question.trim();
        let answer = answer.trim();
        if question.is_empty() || answer.is_empty() {
            continue;
        }
        questions.push(question.to_owned());
        answers.push(answer.to_owned());
    }

    if questions.len() != QUESTIONS_PER_QUIZ {
        bail!(
            "expected exactly {} question|answer pairs, found {}",
            QUESTIONS_PER_QUIZ,
            questions.len()
        );
    }

    Ok(QuizContent {
        background_image,
        topic,
        main_question,
        questions,
        answers,
    })
}

fn resolve_and_validate_path(base_dir: &Path, raw: &Path, field_name: &str) -> Result<PathBuf> {
    let resolved = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        base_dir.join(raw)
    };

    if !resolved.exists() {
        bail!("{} does not exist: {}", field_name, resolved.display());
    }
    if !resolved.is_file() {
        bail!("{} is not a file: {}", field_name, resolved.display());
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quiz(pairs: usize) -> String {
        let mut text = String::from("sky.jpg\nFamous Cities\nCan you name the city?\n");
        for index in 0..pairs {
            text.push_str(&format!("Question {index}? | Answer {index}\n"));
        }
        text
    }

    #[test]
    fn parses_a_complete_quiz() {
        let content = parse_quiz_text(&sample_quiz(8)).expect("quiz should parse");
        assert_eq!(content.background_image, "sky.jpg");
        assert_eq!(content.topic, "Famous Cities");
        assert_eq!(content.main_question, "Can you name the city?");
        assert_eq!(content.questions.len(), 8);
        assert_eq!(content.answers.len(), 8);
        assert_eq!(content.questions[3], "Question 3?");
        assert_eq!(content.answers[3], "Answer 3");
    }

    #[test]
    fn rejects_wrong_pair_count() {
        let error = parse_quiz_text(&sample_quiz(9)).expect_err("9 pairs should fail");
        assert!(error.to_string().contains("found 9"));

        let mut text = sample_quiz(8);
        text.push_str("Question 8? | Answer 8\n");
        assert!(parse_quiz_text(&text).is_err());
    }

    #[test]
    fn rejects_too_few_lines() {
        let error = parse_quiz_text("sky.jpg\nTopic\n").expect_err("short quiz should fail");
        assert!(error.to_string().contains("at least 11 lines"));
    }

    #[test]
    fn skips_lines_missing_either_half() {
        let mut text = String::from("sky.jpg\nTopic\nMain?\n");
        text.push_str("no delimiter here\n");
        text.push_str(" | orphan answer\n");
        text.push_str("orphan question | \n");
        for index in 0..8 {
            text.push_str(&format!("Q{index} | A{index}\n"));
        }
        let content = parse_quiz_text(&text).expect("filler lines should be skipped");
        assert_eq!(content.questions[0], "Q0");
    }
}
