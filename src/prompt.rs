//! Prompt rendering for analyses and follow-up questions.
//!
//! One parameterized template covers every persona/section combination; the
//! fixed text lives under `prompts/` and is embedded at compile time. The
//! builder never computes figures itself, it only tells the LM what to
//! compute and how to lay the answer out.
use crate::error::{ForecastError, Result};
use crate::templates;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_HORIZON: u8 = 1;
pub const MAX_HORIZON: u8 = 20;
pub const DEFAULT_HORIZON: u8 = 5;

/// Sentence embedded when the user gives no trends.
pub const NO_TRENDS_PLACEHOLDER: &str = "No additional trends were provided.";
pub const NO_TRENDS_PLACEHOLDER_ES: &str = "No se proporcionaron tendencias adicionales.";

/// Number of future years to project, always within
/// `MIN_HORIZON..=MAX_HORIZON`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Horizon(u8);

impl Horizon {
    /// Strict constructor; out-of-range values are a caller error.
    pub fn new(years: u32) -> Result<Self> {
        if (u32::from(MIN_HORIZON)..=u32::from(MAX_HORIZON)).contains(&years) {
            // Range checked above, fits in u8.
            Ok(Self(years as u8))
        } else {
            Err(ForecastError::InvalidArgument(format!(
                "horizon must be between {MIN_HORIZON} and {MAX_HORIZON} years (got {years})"
            )))
        }
    }

    /// Clamp raw user input into the supported range.
    pub fn clamped(years: i64) -> Self {
        let years = years.clamp(i64::from(MIN_HORIZON), i64::from(MAX_HORIZON));
        Self(years as u8)
    }

    pub fn years(self) -> u8 {
        self.0
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self(DEFAULT_HORIZON)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Language of the fixed prompt text. User text is embedded as given.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum PromptLanguage {
    #[default]
    En,
    Es,
}

impl PromptLanguage {
    fn analysis_template(self) -> &'static str {
        match self {
            Self::En => templates::ANALYSIS_BASE_MD,
            Self::Es => templates::ANALYSIS_BASE_ES_MD,
        }
    }

    fn followup_template(self) -> &'static str {
        match self {
            Self::En => templates::FOLLOWUP_MD,
            Self::Es => templates::FOLLOWUP_ES_MD,
        }
    }

    pub fn no_trends(self) -> &'static str {
        match self {
            Self::En => NO_TRENDS_PLACEHOLDER,
            Self::Es => NO_TRENDS_PLACEHOLDER_ES,
        }
    }
}

/// Role framing placed at the top of the analysis prompt.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Senior predictive-analytics researcher (long form).
    #[default]
    SeniorResearcher,
    /// Institutional research analyst (short form).
    Analyst,
}

impl Persona {
    fn template(self, language: PromptLanguage) -> &'static str {
        match (self, language) {
            (Self::SeniorResearcher, PromptLanguage::En) => templates::PERSONA_SENIOR_RESEARCHER_MD,
            (Self::SeniorResearcher, PromptLanguage::Es) => {
                templates::PERSONA_SENIOR_RESEARCHER_ES_MD
            }
            (Self::Analyst, PromptLanguage::En) => templates::PERSONA_ANALYST_MD,
            (Self::Analyst, PromptLanguage::Es) => templates::PERSONA_ANALYST_ES_MD,
        }
    }
}

/// Sections the LM is required to produce, in the order they are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSection {
    HistoricalAnalysis,
    ExternalFactors,
    ProjectionTable,
    Assumptions,
    ExecutiveConclusion,
}

impl OutputSection {
    pub const ALL: [OutputSection; 5] = [
        Self::HistoricalAnalysis,
        Self::ExternalFactors,
        Self::ProjectionTable,
        Self::Assumptions,
        Self::ExecutiveConclusion,
    ];

    fn title(self, language: PromptLanguage) -> &'static str {
        if language == PromptLanguage::Es {
            return match self {
                Self::HistoricalAnalysis => "Análisis estadístico del historial",
                Self::ExternalFactors => "Factores externos relevantes",
                Self::ProjectionTable => "Tabla de proyección (año -> demanda esperada)",
                Self::Assumptions => "Supuestos del modelo",
                Self::ExecutiveConclusion => "Conclusión ejecutiva",
            };
        }
        match self {
            Self::HistoricalAnalysis => "Statistical analysis of the history",
            Self::ExternalFactors => "Relevant external factors",
            Self::ProjectionTable => "Projection table (year -> expected demand)",
            Self::Assumptions => "Model assumptions",
            Self::ExecutiveConclusion => "Executive conclusion",
        }
    }

    fn body(self, horizon: Horizon, language: PromptLanguage) -> String {
        if language == PromptLanguage::Es {
            return self.body_es(horizon);
        }
        match self {
            Self::HistoricalAnalysis => "Clear, technical text covering: overall trend, \
average annual growth (CAGR), seasonality or patterns, noise or variability, \
outliers or anomalous points."
                .to_string(),
            Self::ExternalFactors => "Explain how global higher-education trends, \
enrollment behavior in similar programs, demographic and technological changes, \
and labor demand in the program's field affect the projection. General trends \
only, no invented figures."
                .to_string(),
            Self::ProjectionTable => format!(
                "Project year by year with smooth adjustments inspired by the trends. \
The table must contain exactly {horizon} rows, one per projected year, starting \
with the year after the last historical year.\n\n\
Example:\n\
Year | Estimated demand\n\
-----|-----------------\n\
YYYY | X"
            ),
            Self::Assumptions => "Technical justification of the method used.".to_string(),
            Self::ExecutiveConclusion => "Clear, objective and actionable.".to_string(),
        }
    }

    fn body_es(self, horizon: Horizon) -> String {
        match self {
            Self::HistoricalAnalysis => "Texto claro y técnico que cubra: tendencia general, \
crecimiento promedio anual (CAGR), estacionalidad o patrones, ruido o variabilidad, \
outliers o puntos anómalos."
                .to_string(),
            Self::ExternalFactors => "Explica cómo afectan la proyección las tendencias \
globales de educación superior, el comportamiento de la matrícula en programas \
similares, los cambios demográficos y tecnológicos y la demanda laboral del área del \
programa. Solo tendencias generales, sin cifras inventadas."
                .to_string(),
            Self::ProjectionTable => format!(
                "Proyecta año por año con ajustes suaves inspirados en las tendencias. \
La tabla debe tener exactamente {horizon} filas, una por año proyectado, empezando \
por el año siguiente al último año histórico.\n\n\
Ejemplo:\n\
Año | Demanda estimada\n\
----|-----------------\n\
AAAA | X"
            ),
            Self::Assumptions => "Justificación técnica del método usado.".to_string(),
            Self::ExecutiveConclusion => "Clara, objetiva y accionable.".to_string(),
        }
    }
}

fn default_sections() -> Vec<OutputSection> {
    OutputSection::ALL.to_vec()
}

/// Template selection shared by every analysis prompt in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOptions {
    #[serde(default)]
    pub language: PromptLanguage,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default = "default_sections")]
    pub sections: Vec<OutputSection>,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            language: PromptLanguage::default(),
            persona: Persona::default(),
            sections: default_sections(),
        }
    }
}

/// Render the analysis prompt.
///
/// Sections appear in fixed order: persona, echoed parameters, the table
/// verbatim, the trimmed trends (or the language's no-trends sentence), then the
/// required output sections.
pub fn build_analysis_prompt(
    options: &PromptOptions,
    program: &str,
    horizon: Horizon,
    trends: &str,
    table: &str,
) -> String {
    let language = options.language;
    let trends = trends.trim();
    let trends = if trends.is_empty() {
        language.no_trends()
    } else {
        trends
    };
    let horizon_text = horizon.to_string();
    let sections = render_sections(&options.sections, horizon, language);
    fill_template(
        language.analysis_template(),
        &[
            ("persona", options.persona.template(language).trim_end()),
            ("program", program),
            ("horizon", &horizon_text),
            ("table", table),
            ("trends", trends),
            ("sections", &sections),
        ],
    )
}

/// Render the follow-up prompt that embeds the prior analysis verbatim.
pub fn build_followup_prompt(language: PromptLanguage, analysis: &str, question: &str) -> String {
    fill_template(
        language.followup_template(),
        &[("analysis", analysis), ("question", question.trim())],
    )
}

fn render_sections(
    sections: &[OutputSection],
    horizon: Horizon,
    language: PromptLanguage,
) -> String {
    let mut out = String::new();
    for (idx, section) in sections.iter().enumerate() {
        out.push_str(&format!(
            "#### {}. {}\n{}\n\n",
            idx + 1,
            section.title(language),
            section.body(horizon, language)
        ));
    }
    out
}

/// Substitute `{key}` placeholders in a single pass, so user text that
/// happens to contain a placeholder is never expanded.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let replacement = tail.find('}').and_then(|end| {
            let key = &tail[..end];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });
        match replacement {
            Some((value, end)) => {
                out.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "programa  anio  demanda\nCS        2020      100";

    fn prompt_with_trends(trends: &str) -> String {
        build_analysis_prompt(
            &PromptOptions::default(),
            "CS",
            Horizon::new(3).expect("horizon"),
            trends,
            TABLE,
        )
    }

    #[test]
    fn horizon_rejects_out_of_range() {
        assert!(matches!(
            Horizon::new(0),
            Err(ForecastError::InvalidArgument(_))
        ));
        assert!(matches!(
            Horizon::new(21),
            Err(ForecastError::InvalidArgument(_))
        ));
        assert_eq!(Horizon::new(20).expect("max").years(), 20);
    }

    #[test]
    fn horizon_clamps_user_input() {
        assert_eq!(Horizon::clamped(0).years(), 1);
        assert_eq!(Horizon::clamped(-4).years(), 1);
        assert_eq!(Horizon::clamped(25).years(), 20);
        assert_eq!(Horizon::clamped(7).years(), 7);
        assert_eq!(Horizon::default().years(), 5);
    }

    #[test]
    fn analysis_prompt_echoes_parameters_and_table() {
        let prompt = prompt_with_trends("AI demand keeps growing");
        assert!(prompt.contains("**CS**"));
        assert!(prompt.contains("Years to project: **3**"));
        assert!(prompt.contains(TABLE));
        assert!(prompt.contains("AI demand keeps growing"));
        assert!(prompt.contains("exactly 3 rows"));
        assert!(!prompt.contains(NO_TRENDS_PLACEHOLDER));
    }

    #[test]
    fn placeholder_only_for_blank_trends() {
        assert!(prompt_with_trends("").contains(NO_TRENDS_PLACEHOLDER));
        assert!(prompt_with_trends("  \n\t ").contains(NO_TRENDS_PLACEHOLDER));
        assert!(!prompt_with_trends(" remote work ").contains(NO_TRENDS_PLACEHOLDER));
    }

    #[test]
    fn sections_follow_fixed_order() {
        let prompt = prompt_with_trends("");
        let persona = prompt.find("senior researcher").expect("persona");
        let params = prompt.find("PROGRAM TO ANALYZE").expect("params");
        let table = prompt.find(TABLE).expect("table");
        let trends = prompt.find(NO_TRENDS_PLACEHOLDER).expect("trends");
        let scaffold = prompt.find("Mandatory response format").expect("scaffold");
        assert!(persona < params && params < table && table < trends && trends < scaffold);

        let titles = OutputSection::ALL
            .iter()
            .map(|section| {
                prompt
                    .find(section.title(PromptLanguage::En))
                    .expect("section title")
            })
            .collect::<Vec<_>>();
        assert!(titles.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn options_select_persona_and_sections() {
        let options = PromptOptions {
            language: PromptLanguage::En,
            persona: Persona::Analyst,
            sections: vec![OutputSection::ProjectionTable, OutputSection::ExecutiveConclusion],
        };
        let prompt = build_analysis_prompt(
            &options,
            "Nursing",
            Horizon::new(10).expect("horizon"),
            "",
            TABLE,
        );
        assert!(prompt.contains("institutional research analyst"));
        assert!(!prompt.contains("senior researcher"));
        assert!(prompt.contains("#### 1. Projection table"));
        assert!(prompt.contains("#### 2. Executive conclusion"));
        assert!(!prompt.contains("Model assumptions"));
        assert!(prompt.contains("exactly 10 rows"));
    }

    #[test]
    fn user_text_with_braces_is_not_expanded() {
        let prompt = prompt_with_trends("growth of {program} and {table} markers");
        assert!(prompt.contains("growth of {program} and {table} markers"));
    }

    #[test]
    fn followup_prompt_embeds_analysis_and_question() {
        let prompt = build_followup_prompt(
            PromptLanguage::En,
            "Demand grows 5% a year.",
            "  Why 5%?  ",
        );
        assert!(prompt.contains("Demand grows 5% a year."));
        assert!(prompt.contains("Why 5%?"));
        assert!(prompt.contains("Do not contradict"));
        let analysis = prompt.find("Demand grows").expect("analysis");
        let question = prompt.find("Why 5%?").expect("question");
        assert!(analysis < question);
    }

    #[test]
    fn spanish_prompts_use_spanish_fixed_text() {
        let options = PromptOptions {
            language: PromptLanguage::Es,
            ..PromptOptions::default()
        };
        let prompt = build_analysis_prompt(
            &options,
            "Enfermería",
            Horizon::new(4).expect("horizon"),
            " ",
            TABLE,
        );
        assert!(prompt.contains("investigador senior"));
        assert!(prompt.contains("Programa académico: **Enfermería**"));
        assert!(prompt.contains("Años a proyectar: **4**"));
        assert!(prompt.contains(TABLE));
        assert!(prompt.contains(NO_TRENDS_PLACEHOLDER_ES));
        assert!(prompt.contains("#### 3. Tabla de proyección"));
        assert!(prompt.contains("exactamente 4 filas"));
        assert!(!prompt.contains("Mandatory response format"));

        let followup = build_followup_prompt(PromptLanguage::Es, "Análisis previo.", "¿Por qué?");
        assert!(followup.contains("Análisis previo."));
        assert!(followup.contains("¿Por qué?"));
        assert!(followup.contains("No contradigas"));
    }

    #[test]
    fn fill_template_leaves_unknown_placeholders() {
        assert_eq!(fill_template("{a} {b} {", &[("a", "x")]), "x {b} {");
    }
}
