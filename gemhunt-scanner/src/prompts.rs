// Prompt templates for the chat-completion collaborators

use crate::collaborator::LeafContext;

pub fn keyword_prompt(context: &LeafContext) -> String {
    format!(
        r#"You are helping build a dataset of rare annotated images (images with text embedded in them).
Suggest 3 to 5 short, specific image search phrases for:

- Domain: {domain}
- Subdomain: {subdomain}
- Language shown in the images: {language}

Answer with a JSON array of strings only, for example:
["{language} optics manuscripts", "historical lens diagrams with {language} labels"]"#,
        domain = context.domain(),
        subdomain = context.subdomain(),
        language = context.language,
    )
}

pub fn link_prompt(query: &str, language: &str, count: usize) -> String {
    format!(
        r#"You are helping build a dataset of rare annotated images (images with text embedded in them).
Return up to {count} direct URLs of images, galleries or archives matching the search "{query}".
The images should show {language} text.

Answer in JSON only:
[
  {{"url": "https://example.com/page", "desc": "Short description"}}
]"#
    )
}

pub fn sources_prompt(context: &LeafContext) -> String {
    format!(
        r#"You are a research assistant helping a team collect hard-to-find annotated images (text embedded in the image) for training data.

Return 3 to 5 rare or under-used websites, galleries or archives for:
- Domain: {domain}
- Subdomain: {subdomain}
- Language focus: {language}

Each entry needs a direct URL, a one-line description and why it is an uncommon visual source.
Answer in JSON only:
[
  {{"url": "https://example.com", "desc": "Archived chemistry diagrams from the 1960s", "reason": "Not indexed by mainstream search engines"}}
]"#,
        domain = context.domain(),
        subdomain = context.subdomain(),
        language = context.language,
    )
}
