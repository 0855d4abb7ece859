// Prompt constants and the single prompt builder for cold-email generation.

/// Reference email the model mirrors for tone and structure only.
pub const STYLE_REFERENCE_EMAIL: &str = r#"Subject: Backend Engineer application - distributed systems experience

Hi [Hiring Manager],

I've followed [Company]'s work on [product or initiative] and would love to contribute as a [Role]. Over the past three years I built and operated services handling millions of requests a day, most recently cutting p99 latency by 40% through a caching redesign. The problems your team describes are exactly the ones I enjoy solving.

I've attached my resume and would welcome a 15-minute call to discuss how I could help. Thank you for your time.

Best regards,
[Name]"#;

/// Output contract: exactly two keys, JSON only.
pub const OUTPUT_FORMAT_INSTRUCTION: &str = r#"Format your response as a JSON object with exactly two fields:
- "subject": the subject line
- "content": the full email body

Respond with the JSON object only. Do NOT include any text outside the JSON object."#;

/// Builds the completion prompt for one request.
///
/// Pure and deterministic. `required_skills` adds a skills section, an emphasis
/// instruction, and widens the "highlight experience" bullet to reference them.
pub fn build_prompt(
    resume_text: &str,
    company_name: &str,
    job_title: &str,
    required_skills: Option<&str>,
) -> String {
    let required_skills = required_skills.map(str::trim).filter(|s| !s.is_empty());

    let skills_section = required_skills
        .map(|skills| format!("\nRequired Skills for this role:\n{skills}\n"))
        .unwrap_or_default();

    let highlight_instruction = if required_skills.is_some() {
        "Highlights relevant skills and experiences from the resume, especially those matching the required skills"
    } else {
        "Highlights relevant skills and experiences from the resume"
    };

    let emphasis_instruction = if required_skills.is_some() {
        "\n   - Emphasizes the candidate's skills that match the required skills listed above"
    } else {
        ""
    };

    format!(
        r#"Based on the following resume content, create a professional cold email for applying to a {job_title} position at {company_name}.

Resume Content:
{resume_text}
{skills_section}
Please generate:
1. A compelling subject line
2. A professional email body that:
   - Is personalized and specific to the company and role
   - {highlight_instruction}
   - Shows genuine interest in the company
   - Includes a clear call to action
   - Is concise but impactful (1-2 paragraphs max)
   - Uses a professional but friendly tone{emphasis_instruction}

Use the example email below as a reference for tone and structure ONLY. Do NOT copy its wording or details; personalize everything to the resume, the company, and the role.

--- EXAMPLE EMAIL ---
{STYLE_REFERENCE_EMAIL}
--- END EXAMPLE ---

{OUTPUT_FORMAT_INSTRUCTION}

Make it compelling and authentic, avoiding generic templates."#
    )
}
