//! Manual grade overrides.
//!
//! Reviewers mark answers correct or wrong after the fact. Applying the marks
//! yields new [`UserRecord`]s; the aggregated records are left untouched.

use std::collections::BTreeMap;

use crate::model::{Correctness, UserRecord};

/// Reviewer verdicts keyed by user id, then question id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualGrades {
    by_user: BTreeMap<String, BTreeMap<String, bool>>,
}

impl ManualGrades {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verdict, replacing any earlier one for the same answer.
    pub fn insert(&mut self, user_id: &str, question_id: &str, correct: bool) {
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(question_id.to_string(), correct);
    }

    pub fn get(&self, user_id: &str, question_id: &str) -> Option<bool> {
        self.by_user.get(user_id)?.get(question_id).copied()
    }

    /// Total number of verdicts.
    pub fn len(&self) -> usize {
        self.by_user.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn users(&self) -> impl Iterator<Item = &String> {
        self.by_user.keys()
    }

    /// A copy of `user` with reviewer verdicts applied.
    ///
    /// Only answers the user actually gave are regraded; verdicts for
    /// unanswered questions are ignored. Returns the number of answers changed.
    pub fn apply_to(&self, user: &UserRecord) -> (UserRecord, usize) {
        let mut graded = user.clone();
        let Some(verdicts) = self.by_user.get(&user.user_id) else {
            return (graded, 0);
        };

        let mut changed = 0;
        for (question_id, &correct) in verdicts {
            match graded.answers.get_mut(question_id) {
                Some(answer) => {
                    let verdict = Correctness::from(Some(correct));
                    if answer.is_correct != verdict {
                        answer.is_correct = verdict;
                        changed += 1;
                    }
                }
                None => tracing::debug!(
                    "{}: grade for unanswered question {question_id} ignored",
                    user.user_id
                ),
            }
        }
        (graded, changed)
    }
}

/// Apply reviewer verdicts to every user. Returns the regraded records and the
/// number of answers whose correctness changed.
pub fn apply_manual_grades(
    users: &BTreeMap<String, UserRecord>,
    grades: &ManualGrades,
) -> (BTreeMap<String, UserRecord>, usize) {
    let mut total = 0;
    let regraded = users
        .iter()
        .map(|(id, user)| {
            let (graded, changed) = grades.apply_to(user);
            total += changed;
            (id.clone(), graded)
        })
        .collect();

    let unknown = grades.users().filter(|id| !users.contains_key(*id)).count();
    if unknown > 0 {
        tracing::warn!("{unknown} graded user(s) are not in the export");
    }
    (regraded, total)
}
