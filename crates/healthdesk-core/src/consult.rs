//! Consultation options and prompt construction.

use crate::error::{DeskError, DeskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsultationMode {
    GeneralHealth,
    MedicineInfo,
    NutritionDiet,
    MentalHealth,
}

impl ConsultationMode {
    pub fn all() -> Vec<ConsultationMode> {
        vec![
            ConsultationMode::GeneralHealth,
            ConsultationMode::MedicineInfo,
            ConsultationMode::NutritionDiet,
            ConsultationMode::MentalHealth,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ConsultationMode::GeneralHealth => "General Health",
            ConsultationMode::MedicineInfo => "Medicine Info",
            ConsultationMode::NutritionDiet => "Nutrition & Diet",
            ConsultationMode::MentalHealth => "Mental Health Support",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(|c: char| c == '-' || c == '_', " ").as_str() {
            "general health" | "general" => Some(ConsultationMode::GeneralHealth),
            "medicine info" | "medicine" => Some(ConsultationMode::MedicineInfo),
            "nutrition & diet" | "nutrition" | "diet" => Some(ConsultationMode::NutritionDiet),
            "mental health support" | "mental health" | "mental" => Some(ConsultationMode::MentalHealth),
            _ => None,
        }
    }
}

/// Response language: UI label to the code used by Gemini prompts and TTS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Hindi,
    Spanish,
    French,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Spanish => "es",
            Language::French => "fr",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" => Some(Language::English),
            "hi" => Some(Language::Hindi),
            "es" => Some(Language::Spanish),
            "fr" => Some(Language::French),
            _ => None,
        }
    }

    pub fn all() -> Vec<Language> {
        vec![Language::English, Language::Hindi, Language::Spanish, Language::French]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Spanish => "Spanish",
            Language::French => "French",
        }
    }
}

pub fn medical_prompt(mode: ConsultationMode, language: Language, question: &str) -> String {
    let mut prompt = format!(
        "You are a medical information assistant (mode: {}).\n\
         Provide safe, factual, and general health guidance. DO NOT diagnose or prescribe medications.\n",
        mode.display_name()
    );
    if language != Language::English {
        prompt.push_str(&format!("Respond in {}.\n", language.display_name()));
    }
    prompt.push_str(&format!(
        "User question: {}\n\nPlease respond clearly and concisely.",
        question.trim()
    ));
    prompt
}

/// Pick the question to ask: microphone transcript, then uploaded audio transcript, then typed text.
pub fn resolve_question(
    recorded: Option<&str>,
    uploaded: Option<&str>,
    typed: &str,
) -> DeskResult<String> {
    [recorded, uploaded, Some(typed)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|q| !q.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DeskError::validation("Speak, upload audio, or type a question first."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes() {
        for lang in Language::all() {
            assert_eq!(Language::from_code(lang.as_str()), Some(lang));
        }
        assert_eq!(Language::from_code("de"), None);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ConsultationMode::from_str("nutrition"), Some(ConsultationMode::NutritionDiet));
        assert_eq!(ConsultationMode::from_str("Mental-Health"), Some(ConsultationMode::MentalHealth));
        assert_eq!(ConsultationMode::from_str("surgery"), None);
    }

    #[test]
    fn test_prompt_contents() {
        let prompt = medical_prompt(ConsultationMode::MedicineInfo, Language::English, " what is ibuprofen? ");
        assert!(prompt.contains("(mode: Medicine Info)"));
        assert!(prompt.contains("DO NOT diagnose"));
        assert!(prompt.contains("User question: what is ibuprofen?\n"));
        assert!(!prompt.contains("Respond in"));

        let prompt = medical_prompt(ConsultationMode::GeneralHealth, Language::Hindi, "q");
        assert!(prompt.contains("Respond in Hindi."));
    }

    #[test]
    fn test_question_precedence() {
        assert_eq!(resolve_question(Some("spoken"), Some("file"), "typed").unwrap(), "spoken");
        assert_eq!(resolve_question(Some("  "), Some("file"), "typed").unwrap(), "file");
        assert_eq!(resolve_question(None, None, " typed ").unwrap(), "typed");
        assert!(resolve_question(None, Some(""), "   ").is_err());
    }
}
