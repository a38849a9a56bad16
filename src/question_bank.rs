use crate::error::BankError;
use crate::models::{Category, OptionSet, Question, OPTION_COUNT};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

const BUILTIN_DATASET: &str = include_str!("../data/countries.json");
const DATASET_SCHEMA: &str = include_str!("../contracts/question_bank.schema.json");

#[derive(Debug, Clone, Deserialize)]
pub struct CountryRecord {
    pub name: String,
    pub code: String,
    pub tld: String,
}

impl CountryRecord {
    /// Flag emoji built from the regional indicator symbols of the country code.
    pub fn flag(&self) -> String {
        self.code
            .chars()
            .filter_map(|c| char::from_u32(0x1F1E6 + (c.to_ascii_uppercase() as u32).checked_sub('A' as u32)?))
            .collect()
    }

    fn prompt_for(&self, category: Category) -> String {
        match category {
            Category::Tld => self.tld.clone(),
            Category::Flags => self.flag(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    countries: Vec<CountryRecord>,
}

#[derive(Debug, Clone)]
struct Deck {
    questions: Vec<Question>,
    countries: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QuestionBank {
    decks: HashMap<Category, Deck>,
}

impl QuestionBank {
    pub fn builtin() -> Result<Self, BankError> {
        Self::from_json(BUILTIN_DATASET)
    }

    /// Parses and validates a dataset. Every category must offer at least
    /// [`OPTION_COUNT`] distinct countries so option sets can always be built.
    pub fn from_json(raw: &str) -> Result<Self, BankError> {
        let schema: serde_json::Value = serde_json::from_str(DATASET_SCHEMA)?;
        let validator = jsonschema::validator_for(&schema).map_err(|e| BankError::Schema(e.to_string()))?;
        let instance: serde_json::Value = serde_json::from_str(raw)?;
        let issues: Vec<String> = validator
            .iter_errors(&instance)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        if !issues.is_empty() {
            return Err(BankError::Invalid(issues));
        }

        let dataset: RawDataset = serde_json::from_value(instance)?;
        Self::from_records(dataset.countries)
    }

    pub fn from_records(records: Vec<CountryRecord>) -> Result<Self, BankError> {
        let mut issues = Vec::new();
        let mut names = HashSet::new();
        let mut codes = HashSet::new();
        for (i, record) in records.iter().enumerate() {
            if !names.insert(record.name.to_lowercase()) {
                issues.push(format!("countries[{i}].name `{}` is duplicated", record.name));
            }
            if !codes.insert(record.code.to_uppercase()) {
                issues.push(format!("countries[{i}].code `{}` is duplicated", record.code));
            }
        }
        if !issues.is_empty() {
            return Err(BankError::Invalid(issues));
        }

        let mut decks = HashMap::new();
        for category in Category::ALL {
            let questions: Vec<Question> = records
                .iter()
                .map(|r| Question {
                    category,
                    prompt: r.prompt_for(category),
                    answer: r.name.clone(),
                })
                .collect();
            let mut seen = HashSet::new();
            let countries: Vec<String> = questions
                .iter()
                .filter(|q| seen.insert(q.answer.clone()))
                .map(|q| q.answer.clone())
                .collect();
            if countries.len() < OPTION_COUNT {
                return Err(BankError::TooFewCountries {
                    category,
                    available: countries.len(),
                    required: OPTION_COUNT,
                });
            }
            decks.insert(category, Deck { questions, countries });
        }
        Ok(Self { decks })
    }

    fn deck(&self, category: Category) -> Result<&Deck, BankError> {
        self.decks.get(&category).ok_or(BankError::MissingCategory(category))
    }

    pub fn question_count(&self, category: Category) -> usize {
        self.decks.get(&category).map(|d| d.questions.len()).unwrap_or(0)
    }

    pub fn draw_question<R: Rng + ?Sized>(&self, category: Category, rng: &mut R) -> Result<Question, BankError> {
        self.deck(category)?
            .questions
            .choose(rng)
            .cloned()
            .ok_or(BankError::MissingCategory(category))
    }

    pub fn draw_options<R: Rng + ?Sized>(
        &self,
        category: Category,
        correct: &str,
        size: usize,
        rng: &mut R,
    ) -> Result<OptionSet, BankError> {
        let deck = self.deck(category)?;
        let target = size.min(deck.countries.len());

        let mut options = vec![correct.to_string()];
        while options.len() < target {
            let Some(candidate) = deck.countries.choose(rng) else { break; };
            if !options.contains(candidate) {
                options.push(candidate.clone());
            }
        }
        options.shuffle(rng);
        Ok(OptionSet::new(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(name: &str, code: &str) -> CountryRecord {
        CountryRecord {
            name: name.into(),
            code: code.into(),
            tld: format!(".{}", code.to_lowercase()),
        }
    }

    #[test]
    fn builtin_dataset_loads() {
        let bank = QuestionBank::builtin().unwrap();
        assert!(bank.question_count(Category::Tld) > 150);
        assert_eq!(bank.question_count(Category::Tld), bank.question_count(Category::Flags));
    }

    #[test]
    fn prompts_follow_category() {
        let france = record("France", "FR");
        assert_eq!(france.prompt_for(Category::Tld), ".fr");
        assert_eq!(france.prompt_for(Category::Flags), "🇫🇷");
    }

    #[test]
    fn builtin_tld_for_uk_is_not_gb() {
        let raw: RawDataset = serde_json::from_str(BUILTIN_DATASET).unwrap();
        let uk = raw.countries.iter().find(|c| c.name == "United Kingdom").unwrap();
        assert_eq!(uk.tld, ".uk");
        assert_eq!(uk.flag(), "🇬🇧");
    }

    #[test]
    fn option_sets_are_distinct_and_contain_answer() {
        let bank = QuestionBank::builtin().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            for category in Category::ALL {
                let q = bank.draw_question(category, &mut rng).unwrap();
                assert_eq!(q.category, category);
                let options = bank.draw_options(category, &q.answer, OPTION_COUNT, &mut rng).unwrap();
                assert_eq!(options.len(), OPTION_COUNT);
                let distinct: HashSet<_> = options.as_slice().iter().collect();
                assert_eq!(distinct.len(), OPTION_COUNT);
                assert_eq!(options.as_slice().iter().filter(|o| **o == q.answer).count(), 1);
            }
        }
    }

    #[test]
    fn option_set_of_minimal_deck_terminates() {
        let bank = QuestionBank::from_records(vec![
            record("France", "FR"),
            record("Spain", "ES"),
            record("Italy", "IT"),
            record("Chile", "CL"),
            record("Peru", "PE"),
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let options = bank.draw_options(Category::Flags, "Peru", OPTION_COUNT, &mut rng).unwrap();
        assert_eq!(options.len(), 5);
        assert!(options.contains("Peru"));
    }

    #[test]
    fn too_few_countries_is_rejected() {
        let err = QuestionBank::from_records(vec![record("France", "FR"), record("Spain", "ES")]).unwrap_err();
        assert!(matches!(err, BankError::TooFewCountries { available: 2, required: 5, .. }));
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = QuestionBank::from_records(vec![
            record("France", "FR"),
            record("France", "FX"),
            record("Italy", "IT"),
            record("Chile", "CL"),
            record("Peru", "PE"),
        ])
        .unwrap_err();
        assert!(matches!(err, BankError::Invalid(_)));
    }

    #[test]
    fn schema_violations_are_reported() {
        let err = QuestionBank::from_json(r#"{"countries":[{"name":"France","code":"fra","tld":"fr"}]}"#).unwrap_err();
        match err {
            BankError::Invalid(issues) => assert!(issues.len() >= 2),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
