//! Prompt template for discipline tagging.

use scholartag_core::{TAG_DELIMITER, UNCERTAIN};

/// Instruction text shared by every publication.
pub fn instructions() -> String {
    format!(
        "\
You classify academic publications into academic disciplines and subdisciplines.

Read the title and abstract below and reply with the discipline tags that best describe the paper.

Style guide:
- Reply with the tags only, separated by a pipe character, e.g.: psychiatry{d}mental health care{d}nursing
- Use lowercase for every tag.
- Use British English spelling (e.g. behavioural, organisation, paediatrics).
- Give as many tags as apply, most relevant first.
- Do not explain your answer, do not number the tags, and do not use quotation marks.
- If you are uncertain, reply with exactly: {UNCERTAIN}",
        d = TAG_DELIMITER,
    )
}

/// Build the full prompt for one publication.
pub fn build_prompt(title: &str, r#abstract: &str) -> String {
    format!(
        "{instructions}\n\
         \n\
         Title: {title}\n\
         \n\
         Abstract:\n\
         {abstract_text}\n\
         \n\
         Tags:",
        instructions = instructions(),
        abstract_text = r#abstract,
    )
}
