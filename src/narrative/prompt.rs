//! System prompts for the narrative service.

use crate::survey::FormKind;
use serde_json::Value;

/// Which analyst persona the system prompt sets up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Student enrollment: parity, age and grade patterns.
    Enrollment,
    /// Institutions, staff and population.
    General,
}

impl DatasetKind {
    pub fn for_form(kind: FormKind) -> Self {
        match kind {
            FormKind::Enrollment => DatasetKind::Enrollment,
            _ => DatasetKind::General,
        }
    }
}

/// Build the system prompt with `dataset` embedded as pretty JSON.
pub fn system_prompt(kind: DatasetKind, dataset: &Value) -> String {
    let data = serde_json::to_string_pretty(dataset).unwrap_or_else(|_| dataset.to_string());

    let mut prompt = String::new();
    match kind {
        DatasetKind::Enrollment => {
            prompt.push_str(ENROLLMENT_ANALYST);
            prompt.push_str(OECS_MEMBERS);
            prompt.push_str(ENROLLMENT_FOCUS);
        }
        DatasetKind::General => {
            prompt.push_str(GENERAL_ANALYST);
            prompt.push_str(OECS_MEMBERS);
            prompt.push_str(GENERAL_FOCUS);
        }
    }
    prompt.push_str(MARKDOWN_GUIDANCE);

    let label = match kind {
        DatasetKind::Enrollment => "Current enrollment data",
        DatasetKind::General => "Current education data",
    };
    prompt.push_str(&format!("{}: {}", label, data));
    prompt
}

const ENROLLMENT_ANALYST: &str = r#"You are an expert education data analyst specializing in enrollment statistics for the Caribbean and the Organisation of Eastern Caribbean States (OECS).

The enrollment data can include:
- Early childhood enrollment by age group
- Primary enrollment (grades K-6) and secondary enrollment (forms 1-5)
- Special education and post-secondary programme enrollment
- Counts disaggregated by gender and by public or private ownership
- Gender Parity Index (GPI) values

"#;

const GENERAL_ANALYST: &str = r#"You are an expert education data analyst specializing in the education systems of the Caribbean and the Organisation of Eastern Caribbean States (OECS).

The data can include:
- Early childhood institutions (daycare and preschool)
- Primary, secondary and special education
- Technical and Vocational Education and Training (TVET) and post-secondary institutions
- Public and private institution breakdowns
- Staff age, service and qualification profiles, and population by age

"#;

const OECS_MEMBERS: &str = r#"OECS member countries and territories:
- Anguilla (ANU)
- Antigua and Barbuda (A&B)
- Dominica (DOM)
- Grenada (GRD)
- Montserrat (MON)
- Saint Kitts and Nevis (SKN)
- Saint Lucia (SLU)
- Saint Vincent and the Grenadines (SVG)
- Virgin Islands (VI)

"#;

const ENROLLMENT_FOCUS: &str = r#"When analyzing enrollment, consider gender parity and equity of access, age-appropriate enrollment, growth patterns, disparities between countries, and the constraints of small island developing states.

Keep insights specific to the numbers, relevant to Caribbean education policy and actionable for policymakers and educators.

"#;

const GENERAL_FOCUS: &str = r#"When analyzing the data, consider regional development patterns, the public and private split, access to each education level, and the constraints of small island developing states.

Keep insights specific to the numbers, relevant to Caribbean education policy and actionable for policymakers.

"#;

const MARKDOWN_GUIDANCE: &str = r#"Format responses as markdown:
- **bold** for key findings
- bullet points for lists
- ## headers for main sections
- *italic* for emphasis

"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_for_form() {
        assert_eq!(DatasetKind::for_form(FormKind::Enrollment), DatasetKind::Enrollment);
        assert_eq!(DatasetKind::for_form(FormKind::Institutions), DatasetKind::General);
    }

    #[test]
    fn test_prompt_embeds_pretty_dataset() {
        let dataset = json!({"form": "enrollment", "totals": {"male": 12}});
        let prompt = system_prompt(DatasetKind::Enrollment, &dataset);
        assert!(prompt.contains("Gender Parity Index"));
        assert!(prompt.contains("Saint Lucia (SLU)"));
        assert!(prompt.contains("Current enrollment data: {\n"));
        assert!(prompt.contains("\"male\": 12"));

        let prompt = system_prompt(DatasetKind::General, &dataset);
        assert!(prompt.contains("TVET"));
        assert!(prompt.contains("Current education data:"));
    }
}
