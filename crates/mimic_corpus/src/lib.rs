pub mod learning;
pub mod store;

pub use learning::{LearnOutcome, LearningEngine, MessageClass};
pub use store::{CorpusError, CorpusStats, CorpusStore, MAX_PATTERNS};

/// Greetings every corpus starts with.
pub const BUILTIN_GREETINGS: &[&str] = &[
    "ку",
    "ку бро",
    "привет",
    "хай",
    "здарова",
    "йоу",
    "хеллоу",
    "салют",
    "здравствуйте",
    "приветик",
    "дороу",
    "хола",
    "приветствую",
    "здрасьте",
];

/// Small talk used to seed a thin message archive.
pub const BUILTIN_PHRASES: &[&str] = &[
    "норм",
    "как сам",
    "че каво",
    "как дела",
    "что нового",
    "что делаешь",
    "понятно",
    "ясно",
    "согласен",
    "точно",
    "реально",
    "зачет",
    "круто",
    "да ладно",
    "серьезно",
    "жесть",
    "капец",
    "ну и ну",
    "офигеть",
    "ого",
];

#[cfg(test)]
mod tests;
