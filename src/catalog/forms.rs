//! Form state for the admin editors.
//!
//! Every form is a plain value driven by a reducer: `apply` takes the current
//! state and one field update and returns the next state. Validation never
//! stops at the first problem, it reports every missing field at once.

use super::{ArticleRecord, Bilingual, OptionKey, QuestionOptions, QuestionRecord, TopicRecord};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Hi,
}

impl Lang {
    fn name(&self) -> &'static str {
        match self {
            Lang::En => "English",
            Lang::Hi => "Hindi",
        }
    }
}

fn set_lang(text: &mut Bilingual, lang: Lang, value: String) {
    match lang {
        Lang::En => text.en = value,
        Lang::Hi => text.hi = value,
    }
}

/// A field the user must fill before the form can be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Missing { field: String, lang: Lang },
    MissingImage,
}

impl Violation {
    fn missing(field: impl Into<String>, lang: Lang) -> Self {
        Violation::Missing {
            field: field.into(),
            lang,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Missing { field, lang } => {
                write!(f, "Please enter the {} in {}", field, lang.name())
            }
            Violation::MissingImage => f.write_str("Please select an image for the article"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicUpdate {
    Name(Lang, String),
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicForm {
    pub name: Bilingual,
}

impl TopicForm {
    pub fn edit(record: &TopicRecord) -> Self {
        Self {
            name: record.name.clone(),
        }
    }

    pub fn apply(mut self, update: TopicUpdate) -> Self {
        match update {
            TopicUpdate::Name(lang, value) => set_lang(&mut self.name, lang, value),
            TopicUpdate::Reset => self = Self::default(),
        }
        self
    }

    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if !self.name.has_en() {
            violations.push(Violation::missing("topic name", Lang::En));
        }
        violations
    }

    pub fn to_record(&self) -> TopicRecord {
        TopicRecord {
            name: self.name.normalized(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionUpdate {
    Text(Lang, String),
    Option(OptionKey, Lang, String),
    Correct(OptionKey),
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionForm {
    pub text: Bilingual,
    pub options: QuestionOptions,
    pub correct_option: OptionKey,
}

impl QuestionForm {
    pub fn edit(record: &QuestionRecord) -> Self {
        Self {
            text: record.text.clone(),
            options: record.options.clone(),
            correct_option: record.correct_option,
        }
    }

    pub fn apply(mut self, update: QuestionUpdate) -> Self {
        match update {
            QuestionUpdate::Text(lang, value) => set_lang(&mut self.text, lang, value),
            QuestionUpdate::Option(key, lang, value) => {
                set_lang(self.options.get_mut(key), lang, value)
            }
            QuestionUpdate::Correct(key) => self.correct_option = key,
            QuestionUpdate::Reset => self = Self::default(),
        }
        self
    }

    /// English text and all four English options are required; Hindi falls
    /// back to English on save.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if !self.text.has_en() {
            violations.push(Violation::missing("question", Lang::En));
        }
        for key in OptionKey::ALL {
            if !self.options.get(key).has_en() {
                violations.push(Violation::missing(format!("option {}", key), Lang::En));
            }
        }
        violations
    }

    pub fn to_record(&self) -> QuestionRecord {
        let mut options = QuestionOptions::default();
        for key in OptionKey::ALL {
            *options.get_mut(key) = self.options.get(key).normalized();
        }
        QuestionRecord {
            text: self.text.normalized(),
            options,
            correct_option: self.correct_option,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleUpdate {
    Title(Lang, String),
    Description(Lang, String),
    ReferenceLink(String),
    /// Raw bytes of a newly picked image.
    SelectImage(Vec<u8>),
    ClearImage,
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleForm {
    pub title: Bilingual,
    pub description: Bilingual,
    pub reference_link: String,
    /// URL of the image already stored for the article being edited.
    pub image_url: Option<String>,
    pub new_image: Option<Vec<u8>>,
}

impl ArticleForm {
    pub fn edit(record: &ArticleRecord) -> Self {
        Self {
            title: record.title.clone(),
            description: record.description.clone(),
            reference_link: record.reference_link.clone().unwrap_or_default(),
            image_url: record.image_url.clone(),
            new_image: None,
        }
    }

    pub fn apply(mut self, update: ArticleUpdate) -> Self {
        match update {
            ArticleUpdate::Title(lang, value) => set_lang(&mut self.title, lang, value),
            ArticleUpdate::Description(lang, value) => set_lang(&mut self.description, lang, value),
            ArticleUpdate::ReferenceLink(value) => self.reference_link = value,
            ArticleUpdate::SelectImage(bytes) => self.new_image = Some(bytes),
            ArticleUpdate::ClearImage => self.new_image = None,
            ArticleUpdate::Reset => self = Self::default(),
        }
        self
    }

    /// Articles need both languages for title and description. A new article
    /// also needs an image; an edited one may keep its stored image.
    pub fn validate(&self, editing: bool) -> Vec<Violation> {
        let mut violations = Vec::new();
        if !self.title.has_en() {
            violations.push(Violation::missing("article title", Lang::En));
        }
        if !self.title.has_hi() {
            violations.push(Violation::missing("article title", Lang::Hi));
        }
        if !self.description.has_en() {
            violations.push(Violation::missing("article description", Lang::En));
        }
        if !self.description.has_hi() {
            violations.push(Violation::missing("article description", Lang::Hi));
        }
        let has_image = self.new_image.is_some() || (editing && self.image_url.is_some());
        if !has_image {
            violations.push(Violation::MissingImage);
        }
        violations
    }

    /// Builds the stored record. A blank reference link is stored as absent.
    pub fn to_record(&self, image_url: Option<String>) -> ArticleRecord {
        let link = self.reference_link.trim();
        ArticleRecord {
            title: self.title.normalized(),
            description: self.description.normalized(),
            image_url,
            reference_link: (!link.is_empty()).then(|| link.to_string()),
            created_at: None,
            updated_at: None,
        }
    }
}
