//! Prompt template handed to the text generator

/// Instruction placed above the retrieved context by default
pub const DEFAULT_INSTRUCTION: &str = "Using ONLY the information below, answer the question:";

/// Fixed layout: instruction, `Context:` block, `Question:` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    instruction: String,
}

impl PromptTemplate {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        format!(
            "{}\n\nContext:\n{}\n\nQuestion:\n{}\n",
            self.instruction, context, question
        )
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_INSTRUCTION)
    }
}
