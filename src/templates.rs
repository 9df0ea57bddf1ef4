pub const ANALYSIS_BASE_MD: &str = include_str!("../prompts/analysis_base.md");
pub const FOLLOWUP_MD: &str = include_str!("../prompts/followup.md");
pub const PERSONA_SENIOR_RESEARCHER_MD: &str =
    include_str!("../prompts/persona_senior_researcher.md");
pub const PERSONA_ANALYST_MD: &str = include_str!("../prompts/persona_analyst.md");

pub const ANALYSIS_BASE_ES_MD: &str = include_str!("../prompts/es/analysis_base.md");
pub const FOLLOWUP_ES_MD: &str = include_str!("../prompts/es/followup.md");
pub const PERSONA_SENIOR_RESEARCHER_ES_MD: &str =
    include_str!("../prompts/es/persona_senior_researcher.md");
pub const PERSONA_ANALYST_ES_MD: &str = include_str!("../prompts/es/persona_analyst.md");
