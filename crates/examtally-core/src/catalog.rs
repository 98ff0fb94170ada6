//! The question catalog: an immutable lookup from question id to metadata.
//!
//! Catalogs are explicit values passed into the normalizer and aggregator so
//! that tests can substitute fixtures. `QuestionCatalog::builtin()` carries the
//! exam the exports were recorded against.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{Category, PresentationType, QuestionDefinition, QuestionRef};

/// Prefix of every spoken-response prompt in the built-in exam.
pub const SPOKEN_PROMPT_PREFIX: &str = "Record yourself answering the next audio question: ";

/// An immutable set of question definitions keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionCatalog {
    questions: BTreeMap<String, QuestionDefinition>,
}

/// On-disk catalog layouts.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    /// `{"questions": [{"id": ..., "question": ..., "type": ...}, ...]}`
    List { questions: Vec<QuestionDefinition> },
    /// `{"section2_standard_Q1": {...} | "prompt text", ...}`
    Map(BTreeMap<String, CatalogValue>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogValue {
    Text(String),
    Full(QuestionDefinition),
}

impl QuestionCatalog {
    /// Build a catalog from definitions. Later duplicates replace earlier ones.
    pub fn new(definitions: impl IntoIterator<Item = QuestionDefinition>) -> Self {
        let questions = definitions
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect();
        Self { questions }
    }

    pub fn get(&self, id: &str) -> Option<&QuestionDefinition> {
        self.questions.get(id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionDefinition> {
        self.questions.values()
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("failed to parse catalog: {}", path.display()))
    }

    /// Parse either catalog layout from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let parsed: CatalogFile =
            serde_json::from_str(content).context("catalog is neither a question list nor a map")?;

        let definitions = match parsed {
            CatalogFile::List { questions } => {
                if let Some(missing) = questions.iter().position(|q| q.id.trim().is_empty()) {
                    anyhow::bail!("question #{} has no id", missing + 1);
                }
                questions
            }
            CatalogFile::Map(map) => map
                .into_iter()
                .map(|(id, value)| match value {
                    CatalogValue::Text(prompt_text) => QuestionDefinition {
                        id,
                        prompt_text,
                        presentation_type: PresentationType::Unknown,
                        tts_text: None,
                        expected_answers: Vec::new(),
                        options: Vec::new(),
                    },
                    CatalogValue::Full(mut definition) => {
                        definition.id = id;
                        definition
                    }
                })
                .collect(),
        };

        Ok(Self::new(definitions))
    }

    /// Serialize as the list layout.
    pub fn to_json_pretty(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Out<'a> {
            questions: Vec<&'a QuestionDefinition>,
        }
        serde_json::to_string_pretty(&Out {
            questions: self.questions.values().collect(),
        })
        .context("failed to serialize catalog")
    }

    /// The exam the exports were recorded against.
    pub fn builtin() -> Self {
        let mut definitions = vec![
            free_text("section1_accomodation_Q1", "What is your age?", &[]),
            QuestionDefinition {
                id: "section1_accomodation_Q2".into(),
                prompt_text: "Choose what best describes you:".into(),
                presentation_type: PresentationType::MultipleChoice,
                tts_text: None,
                expected_answers: Vec::new(),
                options: [
                    "student",
                    "employee",
                    "working student",
                    "freelancer",
                    "entrepreneur",
                    "other",
                ]
                .map(String::from)
                .to_vec(),
            },
            spoken("section1_accomodation_Q3", "What day is it today?", &[]),
            QuestionDefinition {
                id: "section1_accomodation_Q4".into(),
                prompt_text: "Would you say you remember information better when you hear it or when you see it (for example, by reading or looking at images)?".into(),
                presentation_type: PresentationType::MultipleChoice,
                tts_text: None,
                expected_answers: Vec::new(),
                options: [
                    "I remember better when I read.",
                    "I remember better when I hear.",
                ]
                .map(String::from)
                .to_vec(),
            },
            free_text(
                "section1_accomodation_Q5",
                "Can you remember what the first question was? Write it down.",
                &[],
            ),
        ];

        for (n, (prompt, answers)) in SECTION2_STANDARD.iter().enumerate() {
            definitions.push(free_text(
                &format!("section2_standard_Q{}", n + 1),
                prompt,
                answers,
            ));
        }
        for (n, (prompt, answers)) in SECTION2_CONTROL.iter().enumerate() {
            definitions.push(free_text(
                &format!("section2_control_Q{}", n + 1),
                prompt,
                answers,
            ));
        }
        for (n, (tts, answers)) in SECTION3_STANDARD.iter().enumerate() {
            definitions.push(spoken(
                &format!("section3_standard_Q{}", n + 1),
                tts,
                answers,
            ));
        }
        for (n, (tts, answers)) in SECTION3_CONTROL.iter().enumerate() {
            definitions.push(spoken(
                &format!("section3_control_Q{}", n + 1),
                tts,
                answers,
            ));
        }

        Self::new(definitions)
    }
}

fn free_text(id: &str, prompt: &str, answers: &[&str]) -> QuestionDefinition {
    QuestionDefinition {
        id: id.to_string(),
        prompt_text: prompt.to_string(),
        presentation_type: PresentationType::FreeText,
        tts_text: None,
        expected_answers: answers.iter().map(|a| a.to_string()).collect(),
        options: Vec::new(),
    }
}

fn spoken(id: &str, tts: &str, answers: &[&str]) -> QuestionDefinition {
    QuestionDefinition {
        id: id.to_string(),
        prompt_text: format!("{SPOKEN_PROMPT_PREFIX}{tts}"),
        presentation_type: PresentationType::SpokenResponse,
        tts_text: Some(tts.to_string()),
        expected_answers: answers.iter().map(|a| a.to_string()).collect(),
        options: Vec::new(),
    }
}

type Entry = (&'static str, &'static [&'static str]);

const SECTION2_STANDARD: [Entry; 12] = [
    ("How many bits are there in one byte?", &["8", "eight"]),
    ("Which type of memory is volatile and temporarily stores data during execution?", &["RAM", "Random Access Memory"]),
    ("Which component performs arithmetic and logical operations?", &["ALU", "Arithmetic Logic Unit"]),
    ("Which device forwards packets based on IP addresses?", &["Router"]),
    ("Which logic gate outputs true only when all inputs are true?", &["AND", "AND gate"]),
    ("Which layer of the OSI model handles routing and IP addressing?", &["Network layer"]),
    ("Which protocol is used for secure file transfer over SSH?", &["SFTP", "Secure File Transfer Protocol"]),
    ("Which port number is used by HTTP?", &["80"]),
    ("Which data structure uses hierarchical parent-child relationships?", &["Tree"]),
    ("Which SQL clause filters query results?", &["WHERE"]),
    ("Which component controls data flow within the CPU?", &["Control Unit"]),
    ("What is the Big O time complexity of linear search?", &["O(n)"]),
];

const SECTION2_CONTROL: [Entry; 12] = [
    ("Which number system uses base 2?", &["Binary"]),
    ("Which type of memory retains data even when power is off?", &["ROM", "Read Only Memory"]),
    ("What does the acronym ISA stand for?", &["Instruction Set Architecture"]),
    ("Which device connects computers within the same network using MAC addresses?", &["Switch"]),
    ("Which logic gate outputs the opposite of its input?", &["NOT", "NOT gate"]),
    ("Which OSI layer ensures reliable data delivery?", &["Transport layer"]),
    ("Which protocol secures web communication?", &["HTTPS"]),
    ("Which port number is used by HTTPS?", &["443"]),
    ("Which data structure uses nodes connected by edges?", &["Graph"]),
    ("Which command in SQL removes all table data but keeps the structure?", &["TRUNCATE"]),
    ("Which CPU part temporarily stores instructions and data?", &["Cache"]),
    ("What is the Big O time complexity of binary search?", &["O(log n)", "O(logn)"]),
];

const SECTION3_STANDARD: [Entry; 12] = [
    ("What does the acronym D R A M stand for?", &["Dynamic Random Access Memory"]),
    ("What does the acronym M A C stand for?", &["Media Access Control"]),
    ("Which software manages computer hardware?", &["Operating system", "OS"]),
    ("What does the acronym W A N stand for?", &["Wide Area Network"]),
    ("Which programming language keyword is used to create an object in C++?", &["new"]),
    ("Which OOP concept allows the same method name with different parameters?", &["Overloading", "Function overloading"]),
    ("Which OOP concept hides implementation details from users?", &["Encapsulation"]),
    ("Which Linux command changes the current directory?", &["cd"]),
    ("Which data structure operates on a First In First Out basis?", &["Queue"]),
    ("Which scheduling algorithm executes the shortest job next?", &["Shortest Job First", "SJF"]),
    ("Which sorting algorithm builds the final sorted array one item at a time?", &["Insertion Sort"]),
    ("Which algorithm finds the shortest path in a weighted graph?", &["Dijkstra's algorithm", "Dijkstra algorithm"]),
];

const SECTION3_CONTROL: [Entry; 12] = [
    ("What does the acronym S R A M stand for?", &["Static Random Access Memory"]),
    ("What does the acronym V P N stand for?", &["Virtual Private Network"]),
    ("Which type of software translates high-level code to machine code?", &["Compiler"]),
    ("What does the acronym L A N stand for?", &["Local Area Network"]),
    ("Which keyword is used to destroy an object in C++?", &["delete"]),
    ("Which OOP concept allows subclasses to reuse parent methods?", &["Inheritance"]),
    ("Which OOP concept allows one interface to be used for different data types?", &["Polymorphism"]),
    ("Which command in Linux lists files and directories?", &["ls"]),
    ("Which data structure operates on a Last In First Out basis?", &["Stack"]),
    ("Which scheduling algorithm gives equal CPU time to all processes?", &["Round Robin"]),
    ("Which algorithm uses divide and conquer for sorting?", &["Merge Sort"]),
    ("Which algorithm uses a greedy approach to find the minimum spanning tree?", &["Prim's algorithm", "Prim algorithm"]),
];

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub question_id: String,
    pub message: String,
}

/// Check a catalog for definitions the pipeline cannot use well.
pub fn validate_catalog(catalog: &QuestionCatalog) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut seen_prompts = HashSet::new();

    for q in catalog.iter() {
        let warn = |message: String| ValidationWarning {
            question_id: q.id.clone(),
            message,
        };

        match QuestionRef::parse(&q.id) {
            None => warnings.push(warn(
                "id does not follow section{n}_{category}_{Qk}; it will not be sliced by category"
                    .into(),
            )),
            Some(r) if r.category != Category::Accommodation && q.expected_answers.is_empty() => {
                warnings.push(warn(format!(
                    "{} question has no expected answers",
                    r.category
                )))
            }
            Some(_) => {}
        }

        if q.presentation_type == PresentationType::SpokenResponse && q.tts_text.is_none() {
            warnings.push(warn("spoken-response question has no tts_text".into()));
        }

        if q.presentation_type == PresentationType::Unknown {
            warnings.push(warn("presentation type is unknown".into()));
        }

        if q.prompt_text.trim().is_empty() {
            warnings.push(warn("prompt text is empty".into()));
        } else if !seen_prompts.insert(q.prompt_text.trim().to_lowercase()) {
            warnings.push(warn("prompt text duplicates another question".into()));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_shape() {
        let catalog = QuestionCatalog::builtin();
        assert_eq!(catalog.len(), 53);

        let q = catalog.get("section2_standard_Q1").unwrap();
        assert_eq!(q.prompt_text, "How many bits are there in one byte?");
        assert_eq!(q.expected_answers, vec!["8", "eight"]);
        assert_eq!(q.presentation_type, PresentationType::FreeText);

        let q = catalog.get("section3_control_Q12").unwrap();
        assert_eq!(q.presentation_type, PresentationType::SpokenResponse);
        assert!(q.prompt_text.starts_with(SPOKEN_PROMPT_PREFIX));
        assert_eq!(
            q.tts_text.as_deref(),
            Some("Which algorithm uses a greedy approach to find the minimum spanning tree?")
        );
        assert_eq!(q.category(), Some(Category::Control));
    }

    #[test]
    fn builtin_catalog_validates_clean() {
        let warnings = validate_catalog(&QuestionCatalog::builtin());
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn parse_list_layout() {
        let json = r#"{
            "questions": [
                {"id": "section2_standard_Q1", "question": "Bits per byte?", "type": "blank",
                 "correct_answers": ["8", "eight"]},
                {"id": "section3_control_Q1", "prompt_text": "Say SRAM", "type": "spoken-response",
                 "tts_text": "What does S R A M stand for?"}
            ]
        }"#;
        let catalog = QuestionCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);
        let q = catalog.get("section2_standard_Q1").unwrap();
        assert_eq!(q.presentation_type, PresentationType::FreeText);
        assert_eq!(q.expected_answers, vec!["8", "eight"]);
        assert!(catalog.get("section3_control_Q1").unwrap().tts_text.is_some());
    }

    #[test]
    fn parse_legacy_text_map() {
        let json = r#"{
            "section2_standard_Q1": "How many bits are there in one byte?",
            "section3_standard_Q2": {"question": "Say MAC", "type": "audio", "tts_text": "MAC?"}
        }"#;
        let catalog = QuestionCatalog::from_json_str(json).unwrap();
        let q = catalog.get("section2_standard_Q1").unwrap();
        assert_eq!(q.id, "section2_standard_Q1");
        assert_eq!(q.presentation_type, PresentationType::Unknown);
        let q = catalog.get("section3_standard_Q2").unwrap();
        assert_eq!(q.presentation_type, PresentationType::SpokenResponse);
    }

    #[test]
    fn list_layout_requires_ids() {
        let json = r#"{"questions": [{"question": "No id", "type": "blank"}]}"#;
        let err = QuestionCatalog::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("no id"));
    }

    #[test]
    fn json_roundtrip_through_file() {
        let catalog = QuestionCatalog::builtin();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, catalog.to_json_pretty().unwrap()).unwrap();

        let loaded = QuestionCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn validation_flags_unusable_definitions() {
        let catalog = QuestionCatalog::new([
            QuestionDefinition {
                id: "bonus".into(),
                prompt_text: "Anything".into(),
                presentation_type: PresentationType::FreeText,
                tts_text: None,
                expected_answers: vec![],
                options: vec![],
            },
            QuestionDefinition {
                id: "section2_standard_Q1".into(),
                prompt_text: "Bits?".into(),
                presentation_type: PresentationType::SpokenResponse,
                tts_text: None,
                expected_answers: vec![],
                options: vec![],
            },
        ]);
        let warnings = validate_catalog(&catalog);
        assert!(warnings.iter().any(|w| w.question_id == "bonus"));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("no expected answers")));
        assert!(warnings.iter().any(|w| w.message.contains("tts_text")));
    }
}
