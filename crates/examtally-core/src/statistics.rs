//! Scoring engine and aggregate statistics.
//!
//! Accuracy is always computed over graded answers only (`Correctness` other
//! than `Unknown`) and never over accommodation questions. Timing averages
//! cover every answer in a slice, graded or not. A ratio with an empty
//! denominator is `None`, rendered as `N/A`.

use serde::{Deserialize, Serialize};

use crate::model::{CanonicalAnswer, Category, Correctness, Modality, UserRecord};

/// Placeholder for values that are undefined.
pub const NOT_APPLICABLE: &str = "N/A";

pub const BUCKET_COUNT: usize = 7;

/// Lower edges of the per-user accuracy histogram buckets, in percent.
/// The last bucket is closed at 100.
pub const ACCURACY_BUCKETS: [f64; BUCKET_COUNT] = [0.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0];

/// Correct / incorrect counts over graded answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyTally {
    pub correct: u64,
    pub incorrect: u64,
}

impl AccuracyTally {
    pub fn record(&mut self, outcome: Correctness) {
        match outcome {
            Correctness::Correct => self.correct += 1,
            Correctness::Incorrect => self.incorrect += 1,
            Correctness::Unknown => {}
        }
    }

    pub fn graded(&self) -> u64 {
        self.correct + self.incorrect
    }

    /// Fraction in `[0, 1]`, or `None` when nothing was graded.
    pub fn accuracy(&self) -> Option<f64> {
        match self.graded() {
            0 => None,
            graded => Some(self.correct as f64 / graded as f64),
        }
    }
}

/// Answer count and summed time-to-answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingTally {
    pub answers: u64,
    pub total_ms: u64,
}

impl TimingTally {
    pub fn record(&mut self, time_to_answer_ms: u64) {
        self.answers += 1;
        self.total_ms = self.total_ms.saturating_add(time_to_answer_ms);
    }

    pub fn mean_ms(&self) -> Option<f64> {
        match self.answers {
            0 => None,
            n => Some(self.total_ms as f64 / n as f64),
        }
    }
}

/// Accuracy and timing for one slice of the answers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceStats {
    pub accuracy: AccuracyTally,
    pub timing: TimingTally,
}

/// Focus-loss statistics across users.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TabChangeStats {
    pub mean: f64,
    pub max: u32,
    pub min: u32,
    pub users_without: usize,
    pub users_with: usize,
}

/// Scoring output over a set of users.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub total_users: usize,
    pub submitted_users: usize,
    pub in_progress_users: usize,
    pub overall: SliceStats,
    pub text: SliceStats,
    pub audio: SliceStats,
    pub standard: SliceStats,
    pub control: SliceStats,
    /// `None` when there are no users.
    pub tab_changes: Option<TabChangeStats>,
    /// Sum of the exam application's answered counts.
    pub total_answered: u64,
    pub total_time_spent_seconds: f64,
    /// Users contributing to `total_time_spent_seconds`.
    pub users_with_time_spent: usize,
}

/// Score a collection of users.
pub fn score<'a>(users: impl IntoIterator<Item = &'a UserRecord>) -> ScoreSummary {
    let mut summary = ScoreSummary::default();
    let mut tab_counts = Vec::new();

    for user in users {
        summary.total_users += 1;
        if user.is_submitted() {
            summary.submitted_users += 1;
        } else {
            summary.in_progress_users += 1;
        }
        tab_counts.push(user.tab_change_count);
        summary.total_answered += u64::from(user.answered_count.unwrap_or(0));
        if let Some(seconds) = user.time_spent_seconds {
            summary.total_time_spent_seconds += seconds;
            summary.users_with_time_spent += 1;
        }

        for answer in user.answers.values() {
            summary.tally(answer);
        }
    }

    summary.tab_changes = tab_change_stats(&tab_counts);
    summary
}

impl ScoreSummary {
    fn tally(&mut self, answer: &CanonicalAnswer) {
        let scored = answer.is_scored();
        let mut slices = vec![&mut self.overall];
        slices.push(match answer.modality {
            Modality::Text => &mut self.text,
            Modality::Audio => &mut self.audio,
        });
        match answer.category {
            Some(Category::Standard) => slices.push(&mut self.standard),
            Some(Category::Control) => slices.push(&mut self.control),
            Some(Category::Accommodation) | None => {}
        }

        for slice in slices {
            slice.timing.record(answer.time_to_answer_ms);
            if scored {
                slice.accuracy.record(answer.is_correct);
            }
        }
    }

    /// Text answers per audio answer.
    pub fn text_to_audio_ratio(&self) -> Option<f64> {
        match self.audio.timing.answers {
            0 => None,
            audio => Some(self.text.timing.answers as f64 / audio as f64),
        }
    }

    /// How much longer (in ms) audio answers take than text answers on average.
    pub fn audio_minus_text_ms(&self) -> Option<f64> {
        Some(self.audio.timing.mean_ms()? - self.text.timing.mean_ms()?)
    }

    pub fn audio_text_time_ratio(&self) -> Option<f64> {
        let text = self.text.timing.mean_ms().filter(|t| *t > 0.0)?;
        Some(self.audio.timing.mean_ms()? / text)
    }

    pub fn mean_time_spent_seconds(&self) -> Option<f64> {
        match self.users_with_time_spent {
            0 => None,
            n => Some(self.total_time_spent_seconds / n as f64),
        }
    }

    /// Slices in display order, paired with their table labels.
    pub fn labelled_slices(&self) -> [(&'static str, &SliceStats); 5] {
        [
            ("Overall", &self.overall),
            ("Text", &self.text),
            ("Audio", &self.audio),
            ("Standard", &self.standard),
            ("Control", &self.control),
        ]
    }

    /// Flatten into the `Metric`/`Value` table written to `summary.csv`.
    ///
    /// Accuracies are percentages with two decimals.
    pub fn to_table(&self) -> SummaryTable {
        let mut table = SummaryTable::default();
        table.push("Total Users (Count)", self.total_users);
        table.push("Submitted Users (Count)", self.submitted_users);
        table.push("In Progress Users (Count)", self.in_progress_users);

        table.push("Total Answers (Count)", self.overall.timing.answers);
        table.push("Total Text Answers (Count)", self.text.timing.answers);
        table.push("Total Audio Answers (Count)", self.audio.timing.answers);
        table.push(
            "Text vs Audio Ratio",
            optional(self.text_to_audio_ratio(), |r| format!("{r:.2}:1")),
        );

        for (label, slice) in self.labelled_slices() {
            table.push(format!("{label} Correct (Count)"), slice.accuracy.correct);
            table.push(format!("{label} Incorrect (Count)"), slice.accuracy.incorrect);
            table.push(format!("{label} Graded (Count)"), slice.accuracy.graded());
            table.push(
                format!("{label} Accuracy (%)"),
                optional(slice.accuracy.accuracy(), |a| format!("{:.2}", a * 100.0)),
            );
        }

        for (label, slice) in self.labelled_slices() {
            table.push(
                format!("Average Time to Answer - {label} (mm:ss)"),
                optional(slice.timing.mean_ms(), format_clock_ms),
            );
        }
        table.push(
            "Audio takes longer than Text by (mm:ss)",
            optional(self.audio_minus_text_ms(), format_clock_ms),
        );
        table.push(
            "Audio/Text Time Ratio",
            optional(self.audio_text_time_ratio(), |r| format!("{r:.2}")),
        );

        if let Some(tabs) = &self.tab_changes {
            table.push("Average Tab Changes per User (Count)", format!("{:.2}", tabs.mean));
            table.push("Max Tab Changes (Count)", tabs.max);
            table.push("Min Tab Changes (Count)", tabs.min);
            table.push("Users with 0 Tab Changes (Count)", tabs.users_without);
            table.push("Users with Tab Changes (Count)", tabs.users_with);
        }

        table.push("Total Answered Questions (Count)", self.total_answered);
        table.push(
            "Total Time Spent by All Users (mm:ss)",
            format_clock_secs(self.total_time_spent_seconds),
        );
        table.push(
            "Average Time Spent per User (mm:ss)",
            optional(self.mean_time_spent_seconds(), format_clock_secs),
        );
        table
    }
}

fn tab_change_stats(counts: &[u32]) -> Option<TabChangeStats> {
    let max = *counts.iter().max()?;
    let min = *counts.iter().min()?;
    let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
    let users_without = counts.iter().filter(|&&c| c == 0).count();
    Some(TabChangeStats {
        mean: total as f64 / counts.len() as f64,
        max,
        min,
        users_without,
        users_with: counts.len() - users_without,
    })
}

fn optional<T>(value: Option<T>, render: impl FnOnce(T) -> String) -> String {
    value.map_or_else(|| NOT_APPLICABLE.to_string(), render)
}

/// Ordered `Metric`/`Value` rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryTable {
    pub rows: Vec<(String, String)>,
}

impl SummaryTable {
    pub fn push(&mut self, metric: impl Into<String>, value: impl ToString) {
        self.rows.push((metric.into(), value.to_string()));
    }

    pub fn get(&self, metric: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|(m, _)| m == metric)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows.iter().map(|(m, v)| (m.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for SummaryTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Re-derive a slice's counts from its graded count and rounded percentage.
///
/// Exact while the graded count stays below the resolution of the two-decimal
/// percentage (10 000 answers). Returns `None` when the slice is absent or
/// its accuracy is `N/A` with a non-zero graded count.
pub fn recover_counts(table: &SummaryTable, label: &str) -> Option<AccuracyTally> {
    let graded: u64 = table
        .get(&format!("{label} Graded (Count)"))?
        .trim()
        .parse()
        .ok()?;
    let percent = table.get(&format!("{label} Accuracy (%)"))?.trim();
    if percent == NOT_APPLICABLE {
        return (graded == 0).then_some(AccuracyTally::default());
    }
    let percent: f64 = percent.parse().ok()?;
    let correct = ((percent * graded as f64) / 100.0).round() as u64;
    Some(AccuracyTally {
        correct: correct.min(graded),
        incorrect: graded - correct.min(graded),
    })
}

/// One user's accuracy over all scored, graded answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserScore {
    pub user_id: String,
    pub email: Option<String>,
    pub tally: AccuracyTally,
}

impl UserScore {
    pub fn accuracy_percent(&self) -> Option<f64> {
        self.tally.accuracy().map(|a| a * 100.0)
    }
}

/// Per-user accuracy, best first. Users with no graded answers are omitted.
pub fn user_scores<'a>(users: impl IntoIterator<Item = &'a UserRecord>) -> Vec<UserScore> {
    let mut scores: Vec<UserScore> = users
        .into_iter()
        .filter_map(|user| {
            let mut tally = AccuracyTally::default();
            for answer in user.answers.values().filter(|a| a.is_scored()) {
                tally.record(answer.is_correct);
            }
            (tally.graded() > 0).then(|| UserScore {
                user_id: user.user_id.clone(),
                email: user.email.clone(),
                tally,
            })
        })
        .collect();

    scores.sort_by(|a, b| {
        let a_acc = a.tally.accuracy().unwrap_or(0.0);
        let b_acc = b.tally.accuracy().unwrap_or(0.0);
        b_acc
            .total_cmp(&a_acc)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    scores
}

/// Count users per accuracy bucket (see [`ACCURACY_BUCKETS`]).
pub fn accuracy_histogram(scores: &[UserScore]) -> [usize; BUCKET_COUNT] {
    let mut counts = [0usize; BUCKET_COUNT];
    for percent in scores.iter().filter_map(UserScore::accuracy_percent) {
        let bucket = ACCURACY_BUCKETS
            .iter()
            .rposition(|&lower| percent >= lower)
            .unwrap_or(0);
        counts[bucket] += 1;
    }
    counts
}

/// Standard-category accuracy of one user, split by modality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardAccuracy {
    pub user_id: String,
    pub text: AccuracyTally,
    pub audio: AccuracyTally,
}

pub fn standard_accuracy_per_user<'a>(
    users: impl IntoIterator<Item = &'a UserRecord>,
) -> Vec<StandardAccuracy> {
    users
        .into_iter()
        .map(|user| {
            let mut text = AccuracyTally::default();
            let mut audio = AccuracyTally::default();
            for answer in user
                .answers
                .values()
                .filter(|a| a.category == Some(Category::Standard))
            {
                match answer.modality {
                    Modality::Text => text.record(answer.is_correct),
                    Modality::Audio => audio.record(answer.is_correct),
                }
            }
            StandardAccuracy {
                user_id: user.user_id.clone(),
                text,
                audio,
            }
        })
        .collect()
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Render milliseconds as `m:ss`.
pub fn format_clock_ms(ms: f64) -> String {
    format_clock_secs(ms / 1000.0)
}

/// Render seconds as `m:ss`. Fractions of a second are truncated.
pub fn format_clock_secs(seconds: f64) -> String {
    if !seconds.is_finite() {
        return NOT_APPLICABLE.to_string();
    }
    let sign = if seconds < 0.0 { "-" } else { "" };
    let whole = seconds.abs().trunc() as u64;
    format!("{sign}{}:{:02}", whole / 60, whole % 60)
}
