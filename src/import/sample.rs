use super::{ImportDataset, TopicSeed};
use crate::catalog::{Bilingual, OptionKey, QuestionOptions, QuestionRecord};

fn question(text: (&str, &str), options: [(&str, &str); 4], correct: OptionKey) -> QuestionRecord {
    let [a, b, c, d] = options.map(|(en, hi)| Bilingual::new(en, hi));
    QuestionRecord {
        text: Bilingual::new(text.0, text.1),
        options: QuestionOptions { a, b, c, d },
        correct_option: correct,
    }
}

/// Seed catalog used by `quiz-admin import --sample`.
pub fn sample_dataset() -> ImportDataset {
    ImportDataset {
        topics: vec![
            TopicSeed {
                name: Bilingual::new("General Knowledge", "सामान्य ज्ञान"),
                questions: vec![
                    question(
                        ("What is the capital of India?", "भारत की राजधानी क्या है?"),
                        [
                            ("New Delhi", "नई दिल्ली"),
                            ("Mumbai", "मुंबई"),
                            ("Kolkata", "कोलकाता"),
                            ("Chennai", "चेन्नई"),
                        ],
                        OptionKey::A,
                    ),
                    question(
                        (
                            "Which is the largest planet in our solar system?",
                            "हमारे सौर मंडल का सबसे बड़ा ग्रह कौन सा है?",
                        ),
                        [
                            ("Mars", "मंगल"),
                            ("Jupiter", "बृहस्पति"),
                            ("Saturn", "शनि"),
                            ("Neptune", "नेपच्यून"),
                        ],
                        OptionKey::B,
                    ),
                ],
            },
            TopicSeed {
                name: Bilingual::new("Science", "विज्ञान"),
                questions: vec![question(
                    ("What is the chemical formula for water?", "पानी का रासायनिक सूत्र क्या है?"),
                    [("CO2", "CO2"), ("H2O", "H2O"), ("NaCl", "NaCl"), ("O2", "O2")],
                    OptionKey::B,
                )],
            },
        ],
    }
}
