pub mod db;
pub mod memory;
pub mod translate_llm;

pub use db::DbAdapter;
pub use memory::MemoryDocumentStore;
pub use translate_llm::OpenAiTranslationAdapter;
