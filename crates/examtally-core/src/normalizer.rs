//! Answer normalizer.
//!
//! Reconciles the in-progress and finalized views of a single answer into one
//! [`CanonicalAnswer`]. The finalized event, when it carries a response, is
//! used in full and fields are never merged across the two sources. A
//! finalized event holding only a verdict grades the in-progress response.

use crate::export::AnswerEvent;
use crate::model::{
    AudioAnswer, CanonicalAnswer, Category, Correctness, Modality, PresentationType,
    QuestionDefinition, Transcript,
};

/// Which source an answer was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnswerSource {
    InProgress,
    Result,
}

/// Produce the canonical answer for one question.
///
/// Returns `None` when neither event exists, or when no event holds a
/// response (no audio URL and no text).
pub fn normalize(
    question_id: &str,
    in_progress: Option<&AnswerEvent>,
    result: Option<&AnswerEvent>,
    definition: Option<&QuestionDefinition>,
) -> Option<CanonicalAnswer> {
    let graded_progress: AnswerEvent;
    let (event, source) = match (result, in_progress) {
        (Some(result), Some(progress)) if !has_response(result) => {
            graded_progress = AnswerEvent {
                grading: result.grading.clone(),
                ..progress.clone()
            };
            (&graded_progress, AnswerSource::Result)
        }
        (Some(event), _) => (event, AnswerSource::Result),
        (None, Some(event)) => (event, AnswerSource::InProgress),
        (None, None) => return None,
    };

    let audio_url = event.audio_url.as_deref().filter(|url| !url.is_empty());
    let (modality, user_response_text, audio) = match (audio_url, &event.text_response) {
        (Some(url), _) => {
            let transcript = Transcript::from_raw(event.transcription_text.as_deref());
            let text = transcript.text().unwrap_or_default().to_string();
            let audio = AudioAnswer {
                url: url.to_string(),
                duration_ms: event
                    .audio_duration_ms
                    .and_then(|ms| u64::try_from(ms).ok()),
                transcript,
            };
            (Modality::Audio, text, Some(audio))
        }
        (None, Some(text)) => (Modality::Text, text.clone(), None),
        (None, None) => {
            tracing::debug!("{question_id}: no response in {source:?} event, treating as unanswered");
            return None;
        }
    };

    if definition.is_none() {
        tracing::warn!("{question_id}: no question definition in catalog");
    }

    let grading = event.grading.as_ref();
    let is_correct = grading
        .map(|g| Correctness::from(g.is_correct))
        .unwrap_or_default();
    let expected_answers = match grading {
        Some(g) if !g.expected_answers.is_empty() => g.expected_answers.clone(),
        _ => definition
            .map(|d| d.expected_answers.clone())
            .unwrap_or_default(),
    };

    Some(CanonicalAnswer {
        question_id: question_id.to_string(),
        question_text: definition.map(|d| d.prompt_text.clone()),
        presentation_type: definition
            .map(|d| d.presentation_type)
            .unwrap_or(PresentationType::Unknown),
        category: Category::from_question_id(question_id),
        modality,
        user_response_text,
        time_to_answer_ms: clamp_ms(event.time_to_answer_ms),
        is_correct,
        expected_answers,
        tts_text: definition.and_then(|d| d.tts_text.clone()),
        audio,
        answered_at: event.answered_at,
        question_displayed_at: event.question_displayed_at,
    })
}

fn has_response(event: &AnswerEvent) -> bool {
    event.audio_url.as_deref().is_some_and(|url| !url.is_empty()) || event.text_response.is_some()
}

/// Negative and missing durations become zero.
fn clamp_ms(value: Option<i64>) -> u64 {
    value.map_or(0, |v| v.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::GradingOutcome;
    use crate::model::TRANSCRIPTION_FAILED;

    fn definition() -> QuestionDefinition {
        QuestionDefinition {
            id: "section2_standard_Q1".into(),
            prompt_text: "What is 2^3?".into(),
            presentation_type: PresentationType::FreeText,
            tts_text: None,
            expected_answers: vec!["8".into()],
            options: Vec::new(),
        }
    }

    fn text_event(text: &str, time: i64) -> AnswerEvent {
        AnswerEvent {
            text_response: Some(text.into()),
            time_to_answer_ms: Some(time),
            ..Default::default()
        }
    }

    #[test]
    fn neither_event_yields_nothing() {
        assert!(normalize("section2_standard_Q1", None, None, Some(&definition())).is_none());
    }

    #[test]
    fn in_progress_only_is_ungraded() {
        let event = text_event("8", 4000);
        let answer = normalize("section2_standard_Q1", Some(&event), None, Some(&definition()))
            .unwrap();
        assert_eq!(answer.modality, Modality::Text);
        assert_eq!(answer.is_correct, Correctness::Unknown);
        assert_eq!(answer.expected_answers, vec!["8"]);
        assert_eq!(answer.question_text.as_deref(), Some("What is 2^3?"));
        assert_eq!(answer.category, Some(Category::Standard));
    }

    #[test]
    fn result_event_is_authoritative() {
        let result = AnswerEvent {
            grading: Some(GradingOutcome {
                is_correct: Some(true),
                expected_answers: vec!["8".into(), "eight".into()],
            }),
            ..text_event("eight", 1500)
        };
        let garbage = AnswerEvent {
            text_response: Some("garbage".into()),
            audio_url: Some("https://cdn/garbage.webm".into()),
            time_to_answer_ms: Some(-99_999),
            transcription_text: Some("noise".into()),
            answered_at: Some(1),
            ..Default::default()
        };

        let alone = normalize("section2_standard_Q1", None, Some(&result), Some(&definition()));
        let with_garbage = normalize(
            "section2_standard_Q1",
            Some(&garbage),
            Some(&result),
            Some(&definition()),
        );
        assert_eq!(alone, with_garbage);

        let answer = alone.unwrap();
        assert_eq!(answer.user_response_text, "eight");
        assert_eq!(answer.is_correct, Correctness::Correct);
        assert_eq!(answer.expected_answers, vec!["8", "eight"]);
        assert_eq!(answer.time_to_answer_ms, 1500);
    }

    #[test]
    fn verdict_only_result_grades_progress_answer() {
        let progress = text_event("8", 4000);
        let verdict = AnswerEvent {
            grading: Some(GradingOutcome {
                is_correct: Some(true),
                expected_answers: vec!["8".into(), "eight".into()],
            }),
            ..Default::default()
        };
        let answer = normalize(
            "section2_standard_Q1",
            Some(&progress),
            Some(&verdict),
            Some(&definition()),
        )
        .unwrap();
        assert_eq!(answer.user_response_text, "8");
        assert_eq!(answer.modality, Modality::Text);
        assert_eq!(answer.is_correct, Correctness::Correct);
        assert_eq!(answer.expected_answers, vec!["8", "eight"]);
        assert_eq!(answer.time_to_answer_ms, 4000);
    }

    #[test]
    fn empty_result_event_keeps_progress_answer() {
        let progress = text_event("8", 10);
        let result = AnswerEvent::default();
        let answer = normalize("section2_standard_Q1", Some(&progress), Some(&result), None)
            .unwrap();
        assert_eq!(answer.user_response_text, "8");
        assert_eq!(answer.is_correct, Correctness::Unknown);

        assert!(normalize("section2_standard_Q1", None, Some(&result), None).is_none());
    }

    #[test]
    fn audio_takes_precedence_over_text() {
        let event = AnswerEvent {
            text_response: Some("typed".into()),
            audio_url: Some("https://cdn/a.webm".into()),
            audio_duration_ms: Some(3100),
            transcription_text: Some(" a linked list ".into()),
            ..Default::default()
        };
        let answer = normalize("section3_standard_Q2", Some(&event), None, None).unwrap();
        assert_eq!(answer.modality, Modality::Audio);
        assert_eq!(answer.user_response_text, "a linked list");
        let audio = answer.audio.unwrap();
        assert_eq!(audio.duration_ms, Some(3100));
        assert_eq!(audio.transcript, Transcript::Available("a linked list".into()));
    }

    #[test]
    fn empty_audio_url_falls_back_to_text() {
        let event = AnswerEvent {
            audio_url: Some(String::new()),
            ..text_event("typed", 5)
        };
        let answer = normalize("section2_control_Q4", Some(&event), None, None).unwrap();
        assert_eq!(answer.modality, Modality::Text);
        assert!(answer.audio.is_none());
    }

    #[test]
    fn failed_transcription_leaves_response_empty() {
        let event = AnswerEvent {
            audio_url: Some("https://cdn/a.webm".into()),
            transcription_text: Some(TRANSCRIPTION_FAILED.into()),
            ..Default::default()
        };
        let answer = normalize("section3_control_Q1", None, Some(&event), None).unwrap();
        assert_eq!(answer.user_response_text, "");
        assert_eq!(answer.audio.unwrap().transcript, Transcript::Failed);
    }

    #[test]
    fn time_is_never_negative() {
        for raw in [Some(-1), Some(i64::MIN), None, Some(0), Some(250)] {
            let event = AnswerEvent {
                time_to_answer_ms: raw,
                ..text_event("x", 0)
            };
            let answer = normalize("section2_standard_Q3", Some(&event), None, None).unwrap();
            assert_eq!(answer.time_to_answer_ms, raw.map_or(0, |v| v.max(0) as u64));
        }
    }

    #[test]
    fn unknown_question_degrades_gracefully() {
        let event = text_event("hello", 100);
        let answer = normalize("not_a_question", Some(&event), None, None).unwrap();
        assert_eq!(answer.question_text, None);
        assert_eq!(answer.presentation_type, PresentationType::Unknown);
        assert_eq!(answer.category, None);
        assert!(answer.expected_answers.is_empty());
    }

    #[test]
    fn grading_without_expected_answers_uses_catalog() {
        let result = AnswerEvent {
            grading: Some(GradingOutcome {
                is_correct: Some(false),
                expected_answers: Vec::new(),
            }),
            ..text_event("9", 1)
        };
        let answer =
            normalize("section2_standard_Q1", None, Some(&result), Some(&definition())).unwrap();
        assert_eq!(answer.is_correct, Correctness::Incorrect);
        assert_eq!(answer.expected_answers, vec!["8"]);
    }
}
