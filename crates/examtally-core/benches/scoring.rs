use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examtally_core::aggregator::aggregate_export;
use examtally_core::catalog::QuestionCatalog;
use examtally_core::export::ExamExport;
use examtally_core::statistics::{score, user_scores};
use serde_json::{json, Map, Value};

/// An export with `users` submitted users answering every catalog question.
fn make_export(catalog: &QuestionCatalog, users: usize) -> Value {
    let mut progress = Map::new();
    let mut results = Map::new();

    for u in 0..users {
        let user_id = format!("user-{u:04}");
        let mut answers = Map::new();
        let mut analysis = Map::new();
        for (i, question) in catalog.iter().enumerate() {
            let answer = if question.tts_text.is_some() {
                json!({"audioUrl": format!("https://cdn/{user_id}/{}.webm", question.id),
                       "transcription": "a binary search tree", "timeToAnswerMs": 9000 + i})
            } else {
                json!({"text": "8", "timeToAnswerMs": 3000 + i})
            };
            answers.insert(question.id.clone(), answer);
            analysis.insert(
                question.id.clone(),
                json!({"correct": (u + i) % 3 != 0, "expectedAnswers": question.expected_answers}),
            );
        }
        progress.insert(
            user_id.clone(),
            json!({"submitted": true, "tabChangeCount": u % 5, "answers": answers.clone()}),
        );
        results.insert(
            user_id,
            json!({"-N1": {"email": format!("u{u}@example.com"), "timeSpent": 900,
                           "answers": answers, "analysis": analysis}}),
        );
    }

    json!({"examProgress": progress, "examResults": results})
}

fn bench_aggregate(c: &mut Criterion) {
    let catalog = QuestionCatalog::builtin();
    let mut group = c.benchmark_group("aggregate_export");

    for users in [10, 100] {
        let export = ExamExport::from_value(&make_export(&catalog, users)).unwrap();
        group.bench_function(format!("users={users}"), |b| {
            b.iter(|| aggregate_export(black_box(&export), black_box(&catalog)))
        });
    }

    group.finish();
}

fn bench_score(c: &mut Criterion) {
    let catalog = QuestionCatalog::builtin();
    let export = ExamExport::from_value(&make_export(&catalog, 200)).unwrap();
    let users: BTreeMap<_, _> = aggregate_export(&export, &catalog);
    let mut group = c.benchmark_group("score");

    group.bench_function("summary", |b| b.iter(|| score(black_box(users.values()))));
    group.bench_function("summary_table", |b| {
        let summary = score(users.values());
        b.iter(|| black_box(&summary).to_table())
    });
    group.bench_function("user_scores", |b| {
        b.iter(|| user_scores(black_box(users.values())))
    });

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_score);
criterion_main!(benches);
